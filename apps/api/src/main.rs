mod config;
mod errors;
mod llm_client;
mod routes;
mod screening;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::screening::contract::build_contract;
use crate::screening::registry::{spawn_sweeper, SessionRegistry};
use crate::state::AppState;
use crate::storage::build_record_store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on a missing GEMINI_API_KEY)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(&config)?;
    info!(
        "LLM client initialized (model: {}, timeout: {:?}, max concurrent calls: {})",
        config.gemini_model, config.generation_timeout, config.generation_max_concurrency
    );
    info!("Generation endpoint: {}", llm.endpoint());

    // Prompt templates + parsers (validated here so bad overrides never reach a session)
    let contract = build_contract(config.response_format, config.prompts_dir.as_deref())?;
    info!("Response contract: {}", contract.name());

    // Record store
    let records = build_record_store(&config.record_store).await;
    info!("Record store initialized ({})", records.backend());

    // Session registry + background eviction of settled and idle sessions
    let sessions = SessionRegistry::default();
    spawn_sweeper(
        sessions.clone(),
        config.session_retention,
        config.session_idle_timeout,
    );
    info!(
        "Session registry initialized (retention: {:?}, idle timeout: {:?})",
        config.session_retention, config.session_idle_timeout
    );

    // Build app state
    let state = AppState {
        llm: Arc::new(llm),
        contract,
        records,
        sessions,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the screening UI has a fixed host
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
