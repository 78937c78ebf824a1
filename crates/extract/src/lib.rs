pub mod chat;
pub mod composite;
pub mod config;
pub mod prompts;
pub mod provider;
pub mod service;

pub use chat::ChatCompletionsProvider;
pub use composite::CompositeProvider;
pub use config::{
    split_models, ConfigError, ExtractionSettings, ProviderMode, ProviderSettings,
    DEFAULT_OCR_MODELS, DEFAULT_STATEMENT_MODELS,
};
pub use provider::{
    build_pipelines, message_content, ExtractionPipeline, ExtractionProvider, MockProvider,
    ProviderError,
};
pub use service::{ExtractError, ExtractionResult, StatementExtractor};
