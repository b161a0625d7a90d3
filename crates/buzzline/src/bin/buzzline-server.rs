//! Runs a Buzzline server configured from the environment.

use std::sync::Arc;

use buzzline::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BuzzlineError> {
    if let Err(e) = dotenvy::dotenv() {
        // a missing .env is fine
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    if config.pin_generated {
        tracing::warn!(pin = %config.host_pin, "BUZZLINE_HOST_PIN not set, generated a host PIN");
    }

    let catalog = match &config.catalog_path {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| BuzzlineError::Config(format!("cannot read {}: {e}", path.display())))?;
            let catalog = MemoryCatalog::from_json(&json)?;
            tracing::info!(path = %path.display(), questions = catalog.len(), "question catalog loaded");
            catalog
        }
        None => {
            tracing::warn!("BUZZLINE_CATALOG not set, starting with an empty question catalog");
            MemoryCatalog::new()
        }
    };

    let server = BuzzlineServer::builder()
        .bind(&config.bind)
        .session_config(config.session.clone())
        .build(PinAuthenticator::new(config.host_pin.clone()), Arc::new(catalog), Arc::new(MemoryStore::new()))
        .await?;

    server.run().await
}
