use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod error;
mod models;
mod routes;
mod store;
mod tracker;

use config::Config;
use store::{MemoryStore, PgStore, RecordStore};
use tracker::Tracker;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.max_connections).await?;
            store.migrate().await?;
            tracing::info!("🐘 Connected to PostgreSQL");
            Arc::new(store)
        }
        None => {
            tracing::warn!("⚠️ DATABASE_URL not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let tracker = Tracker::load(store, config.clock).await?;
    let app = routes::app(tracker);

    let addr = config.bind_addr;
    tracing::info!("🧠 Server running at {}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}
