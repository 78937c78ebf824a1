use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use saldo_core::{ExtractedStatement, StatementError};

use crate::prompts::{statement_prompt, strip_code_fence, OCR_PROMPT};
use crate::provider::{ExtractionPipeline, ExtractionProvider, ProviderError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Statement output is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("Statement JSON does not match the expected shape: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("Statement failed validation: {0}")]
    InvalidStatement(#[from] StatementError),
}

/// Outcome of one extraction run, shaped for serialization. `data` is present
/// exactly when `success` is true; on failure `error` holds the last
/// pipeline's diagnostic and `partial_data` the most recent JSON object that
/// parsed but did not make a valid statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractedStatement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

impl ExtractionResult {
    pub fn success(data: ExtractedStatement, model_used: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            partial_data: None,
            error: None,
            model_used: Some(model_used),
        }
    }

    pub fn failure(
        error: String,
        model_used: Option<String>,
        partial_data: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            partial_data,
            error: Some(error),
            model_used,
        }
    }
}

struct FailedAttempt {
    error: ExtractError,
    partial: Option<Map<String, Value>>,
}

impl FailedAttempt {
    fn new(error: ExtractError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

/// Runs the provider's ordered pipeline list against a PDF until one yields a
/// valid statement. Pipelines are attempted strictly sequentially, cheapest
/// first; a recoverable failure logs a warning and moves on to the next.
pub struct StatementExtractor<P: ExtractionProvider> {
    provider: P,
}

impl<P: ExtractionProvider> StatementExtractor<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub async fn extract(&self, pdf: &[u8]) -> ExtractionResult {
        let span = tracing::info_span!(
            "statement_extract",
            id = %Uuid::new_v4(),
            provider = self.provider.name(),
        );
        self.extract_inner(pdf).instrument(span).await
    }

    async fn extract_inner(&self, pdf: &[u8]) -> ExtractionResult {
        let mut last_error: Option<String> = None;
        let mut last_descriptor: Option<String> = None;
        let mut partial: Option<Map<String, Value>> = None;

        for pipeline in self.provider.pipelines() {
            let descriptor = pipeline.to_string();
            tracing::info!(pipeline = %descriptor, "attempting extraction pipeline");

            match self.attempt(pipeline, pdf).await {
                Ok(statement) => {
                    tracing::info!(pipeline = %descriptor, "extraction succeeded");
                    return ExtractionResult::success(statement, descriptor);
                }
                Err(failed) => {
                    tracing::warn!(
                        pipeline = %descriptor,
                        error = %failed.error,
                        "pipeline failed, falling back to next"
                    );
                    if failed.partial.is_some() {
                        partial = failed.partial;
                    }
                    last_error = Some(failed.error.to_string());
                    last_descriptor = Some(descriptor);
                }
            }
        }

        let error =
            last_error.unwrap_or_else(|| "No extraction pipelines were attempted".to_string());
        ExtractionResult::failure(error, last_descriptor, partial)
    }

    /// One pipeline: OCR the PDF, structure the transcription, parse and
    /// validate the statement JSON.
    async fn attempt(
        &self,
        pipeline: &ExtractionPipeline,
        pdf: &[u8],
    ) -> Result<ExtractedStatement, FailedAttempt> {
        let ocr_text = self
            .provider
            .run_ocr(&pipeline.ocr_model, OCR_PROMPT, pdf)
            .await
            .map_err(|e| FailedAttempt::new(e.into()))?;

        let raw = self
            .provider
            .run_statement(&pipeline.statement_model, &statement_prompt(&ocr_text))
            .await
            .map_err(|e| FailedAttempt::new(e.into()))?;

        let value: Value = serde_json::from_str(strip_code_fence(&raw))
            .map_err(|e| FailedAttempt::new(ExtractError::Json(e)))?;
        let parsed_object = value.as_object().cloned();

        let statement: ExtractedStatement =
            serde_json::from_value(value).map_err(|e| FailedAttempt {
                error: ExtractError::Shape(e),
                partial: parsed_object.clone(),
            })?;

        statement.validate().map_err(|e| FailedAttempt {
            error: ExtractError::InvalidStatement(e),
            partial: parsed_object,
        })?;

        Ok(statement)
    }
}
