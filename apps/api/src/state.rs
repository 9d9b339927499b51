use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::CompletionClient;
use crate::screening::contract::ResponseContract;
use crate::screening::registry::SessionRegistry;
use crate::storage::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The only path to the generation API. Default: Gemini `LlmClient`.
    pub llm: Arc<dyn CompletionClient>,
    /// Prompt templates plus matching parsers. Swap via RESPONSE_FORMAT.
    pub contract: Arc<dyn ResponseContract>,
    /// Write-once record persistence. Swap via RECORD_STORE.
    pub records: Arc<dyn RecordStore>,
    pub sessions: SessionRegistry,
    pub config: Config,
}
