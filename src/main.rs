use tracing_subscriber::EnvFilter;

use statute_search::api;
use statute_search::config::Config;
use statute_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Corpus directory: {}", config.corpus_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let state = AppState::new(config.clone())?;

    // Serve even if the embedding provider is down; keyword search still works
    match state.index_corpus_if_empty().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Indexed {n} statute sections"),
        Err(e) => tracing::warn!("Initial indexing failed: {e:#}"),
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
