use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider has no usable pipelines (empty model list)")]
    NoPipelines,
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("Provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

/// One (OCR model, statement model) pairing, attempted as a unit. Attempt
/// order is construction order and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPipeline {
    pub ocr_model: String,
    pub statement_model: String,
}

impl fmt::Display for ExtractionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.ocr_model, self.statement_model)
    }
}

/// Pairs models by index; the longer list's tail is dropped.
pub fn build_pipelines(
    ocr_models: &[String],
    statement_models: &[String],
) -> Vec<ExtractionPipeline> {
    ocr_models
        .iter()
        .zip(statement_models.iter())
        .map(|(ocr, statement)| ExtractionPipeline {
            ocr_model: ocr.clone(),
            statement_model: statement.clone(),
        })
        .collect()
}

/// Abstraction over a vendor that can run the two LLM stages of statement
/// extraction: transcribing a PDF and structuring the transcription.
#[allow(async_fn_in_trait)]
pub trait ExtractionProvider: Send + Sync {
    fn name(&self) -> &str;
    fn ocr_models(&self) -> &[String];
    fn statement_models(&self) -> &[String];
    /// Ordered attempt sequence; guaranteed non-empty by construction.
    fn pipelines(&self) -> &[ExtractionPipeline];

    /// Sends the PDF plus an instruction prompt to a vision-capable model and
    /// returns the raw text of the first response choice.
    async fn run_ocr(&self, model: &str, prompt: &str, pdf: &[u8])
        -> Result<String, ProviderError>;

    /// Sends a text-only prompt to a language model and returns the raw text
    /// of the first response choice.
    async fn run_statement(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Extracts `choices[0].message.content` from a chat-completions response
/// body. Content may be a plain string (returned verbatim) or a list of part
/// objects whose non-empty `text` fields are joined with newlines. Every
/// other shape is malformed; the diagnostic names the stage that failed.
pub fn message_content(body: &Value) -> Result<String, ProviderError> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".to_string()))?;

    if !choice.is_object() {
        return Err(ProviderError::MalformedResponse(
            "Choice is not an object".to_string(),
        ));
    }

    let message = choice
        .get("message")
        .filter(|m| m.is_object())
        .ok_or_else(|| ProviderError::MalformedResponse("Choice has no message object".to_string()))?;

    let content = message
        .get("content")
        .ok_or_else(|| ProviderError::MalformedResponse("Message has no content".to_string()))?;

    match content {
        Value::String(text) => Ok(text.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .filter(|text| !text.is_empty())
                .collect();
            if texts.is_empty() {
                return Err(ProviderError::MalformedResponse(
                    "Content parts carry no text".to_string(),
                ));
            }
            Ok(texts.join("\n"))
        }
        _ => Err(ProviderError::MalformedResponse(
            "Unsupported content type".to_string(),
        )),
    }
}

// ── Mock provider (always available, used for tests) ──────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scripted provider for exercising the extraction flow without a network.
/// Outcomes are consumed front-to-back, one per call; an exhausted script
/// reports a malformed response.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    ocr_models: Vec<String>,
    statement_models: Vec<String>,
    pipelines: Vec<ExtractionPipeline>,
    ocr_script: Mutex<VecDeque<Result<String, ProviderError>>>,
    statement_script: Mutex<VecDeque<Result<String, ProviderError>>>,
    ocr_calls: AtomicUsize,
    statement_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(models: &[&str]) -> Result<Self, ProviderError> {
        Self::named("mock", models)
    }

    pub fn named(name: &str, models: &[&str]) -> Result<Self, ProviderError> {
        let models: Vec<String> = models.iter().map(|m| m.to_string()).collect();
        let pipelines = build_pipelines(&models, &models);
        if pipelines.is_empty() {
            return Err(ProviderError::NoPipelines);
        }
        Ok(Self {
            name: name.to_string(),
            ocr_models: models.clone(),
            statement_models: models,
            pipelines,
            ocr_script: Mutex::new(VecDeque::new()),
            statement_script: Mutex::new(VecDeque::new()),
            ocr_calls: AtomicUsize::new(0),
            statement_calls: AtomicUsize::new(0),
        })
    }

    pub fn script_ocr(&self, outcome: Result<&str, ProviderError>) {
        lock(&self.ocr_script).push_back(outcome.map(str::to_string));
    }

    pub fn script_statement(&self, outcome: Result<&str, ProviderError>) {
        lock(&self.statement_script).push_back(outcome.map(str::to_string));
    }

    pub fn ocr_calls(&self) -> usize {
        self.ocr_calls.load(Ordering::SeqCst)
    }

    pub fn statement_calls(&self) -> usize {
        self.statement_calls.load(Ordering::SeqCst)
    }
}

impl ExtractionProvider for MockProvider {
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
        _model: &str,
        _prompt: &str,
        _pdf: &[u8],
    ) -> Result<String, ProviderError> {
        self.ocr_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.ocr_script)
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::MalformedResponse("Mock script exhausted".to_string())))
    }

    async fn run_statement(&self, _model: &str, _prompt: &str) -> Result<String, ProviderError> {
        self.statement_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.statement_script)
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::MalformedResponse("Mock script exhausted".to_string())))
    }
}
