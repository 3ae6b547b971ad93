//! Depo Orders - warehouse order tracking service

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use depo_orders::{http::{router, AppState}, Config, DepoError, EntegraClient, Warehouse};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const FIRST_REFRESH_DELAY: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let warehouse = Arc::new(Warehouse::from_config(&config)?);
    let client = Arc::new(EntegraClient::new(&config.fetch).map_err(DepoError::from)?);

    if let Some(period) = config.refresh_interval {
        let (warehouse, client, page_size) = (warehouse.clone(), client.clone(), config.fetch.page_size);
        tokio::spawn(async move {
            tokio::time::sleep(FIRST_REFRESH_DELAY).await;
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let fetched = warehouse.fetch_and_merge(client.as_ref(), page_size).await;
                tracing::info!(fetched, "scheduled refresh done");
            }
        });
    }

    let state = AppState { warehouse, source: client, page_size: config.fetch.page_size, retention_days: config.archive_retention_days };
    let app = router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    let addr = config.socket_addr();
    tracing::info!("📦 Depo Orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
