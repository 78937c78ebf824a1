use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::str::FromStr;

/// Stored USD/ARS quote for one calendar date. Re-fetching a date replaces
/// the quote in place, keeping the original row id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRate {
    pub id: i64,
    pub rate_date: NaiveDate,
    pub buy_rate: Decimal,
    pub sell_rate: Decimal,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExchangeRate {
    pub rate_date: NaiveDate,
    pub buy_rate: Decimal,
    pub sell_rate: Decimal,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

type RateRow = (i64, NaiveDate, String, String, String, DateTime<Utc>);

fn decode_rate(row: RateRow) -> Result<ExchangeRate, sqlx::Error> {
    Ok(ExchangeRate {
        id: row.0,
        rate_date: row.1,
        buy_rate: parse_rate(&row.2, "buy_rate")?,
        sell_rate: parse_rate(&row.3, "sell_rate")?,
        source: row.4,
        fetched_at: row.5,
    })
}

fn parse_rate(raw: &str, column: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

pub async fn upsert_rate(
    conn: &mut SqliteConnection,
    rate: &NewExchangeRate,
) -> Result<ExchangeRate, sqlx::Error> {
    let row = sqlx::query_as::<_, RateRow>(
        r#"
        INSERT INTO exchange_rates (rate_date, buy_rate, sell_rate, source, fetched_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(rate_date) DO UPDATE SET
            buy_rate = excluded.buy_rate,
            sell_rate = excluded.sell_rate,
            source = excluded.source,
            fetched_at = excluded.fetched_at
        RETURNING id, rate_date, buy_rate, sell_rate, source, fetched_at
        "#,
    )
    .bind(rate.rate_date)
    .bind(rate.buy_rate.to_string())
    .bind(rate.sell_rate.to_string())
    .bind(&rate.source)
    .bind(rate.fetched_at)
    .fetch_one(&mut *conn)
    .await?;

    decode_rate(row)
}

pub async fn get_rate_for_date(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> Result<Option<ExchangeRate>, sqlx::Error> {
    let row = sqlx::query_as::<_, RateRow>(
        "SELECT id, rate_date, buy_rate, sell_rate, source, fetched_at FROM exchange_rates WHERE rate_date = ?"
    )
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(decode_rate).transpose()
}

/// Finds the quote dated closest to `target`, looking both backward and
/// forward. A quote on `target` itself always wins; an exact tie in distance
/// goes to the earlier date.
pub async fn get_closest_rate(
    conn: &mut SqliteConnection,
    target: NaiveDate,
) -> Result<Option<ExchangeRate>, sqlx::Error> {
    let before = sqlx::query_as::<_, RateRow>(
        "SELECT id, rate_date, buy_rate, sell_rate, source, fetched_at FROM exchange_rates WHERE rate_date <= ? ORDER BY rate_date DESC LIMIT 1"
    )
    .bind(target)
    .fetch_optional(&mut *conn)
    .await?
    .map(decode_rate)
    .transpose()?;

    let after = sqlx::query_as::<_, RateRow>(
        "SELECT id, rate_date, buy_rate, sell_rate, source, fetched_at FROM exchange_rates WHERE rate_date > ? ORDER BY rate_date ASC LIMIT 1"
    )
    .bind(target)
    .fetch_optional(&mut *conn)
    .await?
    .map(decode_rate)
    .transpose()?;

    Ok(pick_nearest(target, before, after))
}

/// Distance is whole days. `before` is at or before `target`, `after` strictly
/// after; on equal distance `before` wins.
fn pick_nearest(
    target: NaiveDate,
    before: Option<ExchangeRate>,
    after: Option<ExchangeRate>,
) -> Option<ExchangeRate> {
    match (before, after) {
        (Some(b), Some(a)) => {
            let to_before = (target - b.rate_date).num_days();
            let to_after = (a.rate_date - target).num_days();
            if to_before <= to_after {
                Some(b)
            } else {
                Some(a)
            }
        }
        (b, a) => b.or(a),
    }
}

pub async fn get_latest_rate(
    conn: &mut SqliteConnection,
) -> Result<Option<ExchangeRate>, sqlx::Error> {
    let row = sqlx::query_as::<_, RateRow>(
        "SELECT id, rate_date, buy_rate, sell_rate, source, fetched_at FROM exchange_rates ORDER BY rate_date DESC LIMIT 1"
    )
    .fetch_optional(&mut *conn)
    .await?;

    row.map(decode_rate).transpose()
}

/// Quotes with `start <= rate_date <= end`, ascending by date.
pub async fn get_rates_in_range(
    conn: &mut SqliteConnection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ExchangeRate>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RateRow>(
        "SELECT id, rate_date, buy_rate, sell_rate, source, fetched_at FROM exchange_rates WHERE rate_date >= ? AND rate_date <= ? ORDER BY rate_date ASC"
    )
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(decode_rate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_db, DbPool};
    use tempfile::TempDir;

    async fn open_test_db() -> (TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("saldo.db")).await.unwrap();
        (dir, pool)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quote(rate_date: NaiveDate, sell: &str) -> NewExchangeRate {
        let sell_rate: Decimal = sell.parse().unwrap();
        NewExchangeRate {
            rate_date,
            buy_rate: sell_rate - Decimal::from(20),
            sell_rate,
            source: "test".to_string(),
            fetched_at: Utc::now(),
        }
    }

    fn stub_rate(rate_date: NaiveDate) -> ExchangeRate {
        ExchangeRate {
            id: 0,
            rate_date,
            buy_rate: Decimal::from(980),
            sell_rate: Decimal::from(1000),
            source: "test".to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn nearest_tie_goes_to_earlier_date() {
        let before = stub_rate(date(2026, 3, 10));
        let after = stub_rate(date(2026, 3, 14));

        let picked = pick_nearest(date(2026, 3, 12), Some(before.clone()), Some(after)).unwrap();
        assert_eq!(picked.rate_date, before.rate_date);
    }

    #[test]
    fn nearest_single_side_is_returned() {
        let only = stub_rate(date(2026, 3, 10));

        let picked = pick_nearest(date(2026, 3, 20), Some(only.clone()), None).unwrap();
        assert_eq!(picked.rate_date, only.rate_date);

        let picked = pick_nearest(date(2026, 3, 1), None, Some(only.clone())).unwrap();
        assert_eq!(picked.rate_date, only.rate_date);

        assert!(pick_nearest(date(2026, 3, 1), None, None).is_none());
    }

    #[tokio::test]
    async fn upsert_then_fetch_by_date() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let inserted = upsert_rate(&mut conn, &quote(date(2026, 3, 10), "1000"))
            .await
            .unwrap();
        assert_eq!(inserted.sell_rate, Decimal::from(1000));
        assert_eq!(inserted.buy_rate, Decimal::from(980));

        let found = get_rate_for_date(&mut conn, date(2026, 3, 10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, inserted.id);
        assert_eq!(found.rate_date, inserted.rate_date);
        assert_eq!(found.sell_rate, inserted.sell_rate);

        let missing = get_rate_for_date(&mut conn, date(2026, 3, 11)).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_quote_in_place() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = upsert_rate(&mut conn, &quote(date(2026, 3, 10), "1000"))
            .await
            .unwrap();

        let mut refreshed = quote(date(2026, 3, 10), "1050");
        refreshed.source = "retry".to_string();
        let second = upsert_rate(&mut conn, &refreshed).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.sell_rate, Decimal::from(1050));
        assert_eq!(second.source, "retry");

        let rows = get_rates_in_range(&mut conn, date(2026, 3, 1), date(2026, 3, 31))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn closest_rate_empty_table_is_none() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let found = get_closest_rate(&mut conn, date(2026, 3, 10)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn closest_rate_prefers_nearer_side() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        upsert_rate(&mut conn, &quote(date(2026, 3, 10), "1000"))
            .await
            .unwrap();
        upsert_rate(&mut conn, &quote(date(2026, 3, 20), "1100"))
            .await
            .unwrap();

        let found = get_closest_rate(&mut conn, date(2026, 3, 12))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.rate_date, date(2026, 3, 10));

        let found = get_closest_rate(&mut conn, date(2026, 3, 18))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.rate_date, date(2026, 3, 20));
    }

    #[tokio::test]
    async fn closest_rate_tie_resolves_backward() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        upsert_rate(&mut conn, &quote(date(2026, 3, 10), "1000"))
            .await
            .unwrap();
        upsert_rate(&mut conn, &quote(date(2026, 3, 14), "1100"))
            .await
            .unwrap();

        let found = get_closest_rate(&mut conn, date(2026, 3, 12))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.rate_date, date(2026, 3, 10));
    }

    #[tokio::test]
    async fn closest_rate_exact_date_wins() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        upsert_rate(&mut conn, &quote(date(2026, 3, 9), "990"))
            .await
            .unwrap();
        upsert_rate(&mut conn, &quote(date(2026, 3, 10), "1000"))
            .await
            .unwrap();
        upsert_rate(&mut conn, &quote(date(2026, 3, 11), "1010"))
            .await
            .unwrap();

        let found = get_closest_rate(&mut conn, date(2026, 3, 10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.rate_date, date(2026, 3, 10));
    }

    #[tokio::test]
    async fn closest_rate_works_with_only_later_quotes() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        upsert_rate(&mut conn, &quote(date(2026, 3, 20), "1100"))
            .await
            .unwrap();
        upsert_rate(&mut conn, &quote(date(2026, 3, 25), "1150"))
            .await
            .unwrap();

        let found = get_closest_rate(&mut conn, date(2026, 3, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.rate_date, date(2026, 3, 20));
    }

    #[tokio::test]
    async fn latest_rate_is_max_date() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        upsert_rate(&mut conn, &quote(date(2026, 3, 10), "1000"))
            .await
            .unwrap();
        upsert_rate(&mut conn, &quote(date(2026, 3, 25), "1150"))
            .await
            .unwrap();
        upsert_rate(&mut conn, &quote(date(2026, 3, 20), "1100"))
            .await
            .unwrap();

        let found = get_latest_rate(&mut conn).await.unwrap().unwrap();
        assert_eq!(found.rate_date, date(2026, 3, 25));
    }

    #[tokio::test]
    async fn range_is_inclusive_and_ascending() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        for (day, sell) in [(5, "950"), (10, "1000"), (15, "1050"), (20, "1100")] {
            upsert_rate(&mut conn, &quote(date(2026, 3, day), sell))
                .await
                .unwrap();
        }

        let rows = get_rates_in_range(&mut conn, date(2026, 3, 10), date(2026, 3, 20))
            .await
            .unwrap();
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.rate_date).collect();
        assert_eq!(
            dates,
            vec![date(2026, 3, 10), date(2026, 3, 15), date(2026, 3, 20)]
        );
    }

    #[tokio::test]
    async fn stored_rates_keep_decimal_precision() {
        let (_dir, pool) = open_test_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut q = quote(date(2026, 3, 10), "1047.3333");
        q.buy_rate = "1007.1250".parse().unwrap();
        upsert_rate(&mut conn, &q).await.unwrap();

        let found = get_rate_for_date(&mut conn, date(2026, 3, 10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.sell_rate.to_string(), "1047.3333");
        assert_eq!(found.buy_rate.to_string(), "1007.1250");
    }
}
