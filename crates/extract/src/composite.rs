use crate::provider::{build_pipelines, ExtractionPipeline, ExtractionProvider, ProviderError};

/// Serves the two extraction stages from two independently configured
/// vendors, e.g. a cheap OCR vendor paired with a stronger parsing vendor.
/// Calls delegate unchanged; the halves share no state.
pub struct CompositeProvider<O: ExtractionProvider, S: ExtractionProvider> {
    name: String,
    ocr: O,
    statement: S,
    pipelines: Vec<ExtractionPipeline>,
}

impl<O: ExtractionProvider, S: ExtractionProvider> CompositeProvider<O, S> {
    /// Re-zips the OCR half's OCR models against the statement half's
    /// statement models, so the composite pairing can differ from either
    /// half's own pipelines.
    pub fn new(ocr: O, statement: S) -> Result<Self, ProviderError> {
        let pipelines = build_pipelines(ocr.ocr_models(), statement.statement_models());
        if pipelines.is_empty() {
            return Err(ProviderError::NoPipelines);
        }

        Ok(Self {
            name: format!("ocr={};statement={}", ocr.name(), statement.name()),
            ocr,
            statement,
            pipelines,
        })
    }
}

impl<O: ExtractionProvider, S: ExtractionProvider> ExtractionProvider for CompositeProvider<O, S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn ocr_models(&self) -> &[String] {
        self.ocr.ocr_models()
    }

    fn statement_models(&self) -> &[String] {
        self.statement.statement_models()
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
        self.ocr.run_ocr(model, prompt, pdf).await
    }

    async fn run_statement(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        self.statement.run_statement(model, prompt).await
    }
}
