#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use axum::http::{Method, header};
use tower_http::cors::CorsLayer;

use chatrelay::api::{self, AppState};
use chatrelay::config::RelayConfig;
use chatrelay::llm::OpenAiClient;
use chatrelay::relay::{CancellationRegistry, StreamRelay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing logger
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatrelay=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    let config = RelayConfig::from_env();
    tracing::info!(
        upstream = %config.upstream_url,
        model = %config.model,
        "Starting chatrelay server"
    );

    let upstream = Arc::new(
        OpenAiClient::new(config.api_key.clone())
            .with_model(config.model.clone())
            .with_base_url(config.upstream_url.clone()),
    );
    let registry = Arc::new(CancellationRegistry::new());
    let relay = Arc::new(StreamRelay::new(
        upstream,
        registry,
        config.system_prompt.clone(),
    ));
    let state = AppState::new(relay);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = api::router(state).layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    tracing::info!("chatrelay listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
