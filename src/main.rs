use anyhow::Context;
use tracing_subscriber::EnvFilter;

use book_search::api;
use book_search::config::Config;
use book_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        "{} sources, {:?} per source, early stop at {} matches",
        config.sources.len(),
        config.search.timeout_per_source,
        config.search.max_total_matches
    );
    for source in &config.sources {
        tracing::debug!("Source {} ({:?})", source.id, source.kind);
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config).context("Failed to build application state")?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
