use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptden::config::Config;
use scriptden::router::build_router;
use scriptden::services::rate_limit::COUNTER_RETENTION_SECS;
use scriptden::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(config).await?;
    tracing::info!("✅ AppState initialized");

    let app = build_router(state.clone());

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            tracing::info!("🧹 Purging stale rate counters...");
            let cutoff = chrono::Utc::now().timestamp() - COUNTER_RETENTION_SECS;
            match cleanup_state.rates.purge_stale(cutoff).await {
                Ok(purged) => {
                    tracing::info!("✅ Purged {} stale rate counters", purged);
                }
                Err(e) => {
                    tracing::error!("❌ Rate counter purge failed: {}", e);
                }
            }
        }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("✅ Background counter purge started (runs every hour)");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
