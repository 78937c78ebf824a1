use base64::Engine as _;
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};

use crate::provider::{
    build_pipelines, message_content, ExtractionPipeline, ExtractionProvider, ProviderError,
};

/// Vendor speaking the OpenAI chat-completions dialect. Works against any
/// endpoint exposing `POST <base_url>/chat/completions` with that wire shape.
#[derive(Debug)]
pub struct ChatCompletionsProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    ocr_models: Vec<String>,
    statement_models: Vec<String>,
    pipelines: Vec<ExtractionPipeline>,
}

impl ChatCompletionsProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        ocr_models: Vec<String>,
        statement_models: Vec<String>,
    ) -> Result<Self, ProviderError> {
        let pipelines = build_pipelines(&ocr_models, &statement_models);
        if pipelines.is_empty() {
            return Err(ProviderError::NoPipelines);
        }

        let base_url: String = base_url.into();
        Ok(Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            ocr_models,
            statement_models,
            pipelines,
        })
    }

    async fn chat(&self, body: Value) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        message_content(&payload)
    }
}

/// OCR request: the prompt plus the PDF inlined as a base64 data URL in a
/// `file` content part.
fn ocr_request_body(model: &str, prompt: &str, pdf: &[u8]) -> Value {
    let encoded = base64::engine::general_purpose::STANDARD.encode(pdf);
    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": prompt},
                {"type": "file", "file": {
                    "filename": "statement.pdf",
                    "file_data": format!("data:application/pdf;base64,{encoded}")
                }}
            ]
        }]
    })
}

/// Statement request: plain text-only user message, deterministic sampling.
fn statement_request_body(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": 0
    })
}

impl ExtractionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn ocr_models(&self) -> &[String] {
        &self.ocr_models
    }

    fn statement_models(&self) -> &[String] {
        &self.statement_models
    }

    fn pipelines(&self) -> &[ExtractionPipeline] {
        &self.pipelines
    }

    async fn run_ocr(
        &self,
        model: &str,
        prompt: &str,
        pdf: &[u8],
    ) -> Result<String, ProviderError> {
        tracing::debug!(provider = %self.name, %model, pdf_bytes = pdf.len(), "running OCR stage");
        self.chat(ocr_request_body(model, prompt, pdf)).await
    }

    async fn run_statement(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        tracing::debug!(provider = %self.name, %model, "running statement stage");
        self.chat(statement_request_body(model, prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn constructor_zips_pipelines() {
        let p = ChatCompletionsProvider::new(
            "openai",
            "https://api.openai.com/v1/",
            "sk-test",
            models(&["gpt-4o-mini", "gpt-4o"]),
            models(&["gpt-4o"]),
        )
        .unwrap();

        assert_eq!(p.name(), "openai");
        assert_eq!(p.pipelines().len(), 1);
        assert_eq!(p.pipelines()[0].to_string(), "gpt-4o-mini+gpt-4o");
    }

    #[test]
    fn constructor_rejects_empty_model_side() {
        let err = ChatCompletionsProvider::new(
            "openai",
            "https://api.openai.com/v1",
            "sk-test",
            models(&["gpt-4o-mini"]),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::NoPipelines));
    }

    #[test]
    fn ocr_body_carries_pdf_as_data_url() {
        let body = ocr_request_body("gpt-4o-mini", "transcribe", b"%PDF-1.7 fake");

        assert_eq!(body["model"], "gpt-4o-mini");
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "transcribe");
        assert_eq!(parts[1]["type"], "file");
        assert_eq!(parts[1]["file"]["filename"], "statement.pdf");

        let data = parts[1]["file"]["file_data"].as_str().unwrap();
        assert!(data.starts_with("data:application/pdf;base64,"));
        let encoded = data.trim_start_matches("data:application/pdf;base64,");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(decoded, b"%PDF-1.7 fake");
    }

    #[test]
    fn statement_body_is_text_only_and_deterministic() {
        let body = statement_request_body("gpt-4o", "parse this");

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "parse this");
        assert_eq!(body["temperature"], 0);
    }
}
