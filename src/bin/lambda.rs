//! AWS Lambda entry point for catalog-sync
//!
//! Deploy with `cargo lambda build --release --features lambda`.
//! Serves the trigger facade behind a function URL.

use std::sync::Arc;

use catalog_sync::facade::Facade;
use catalog_sync::lambda::{UrlRequest, handler};
use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config_path =
        std::env::var("CATALOG_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let facade = Arc::new(Facade::from_path(&config_path)?);

    info!("catalog-sync Lambda starting (config {})", config_path);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<UrlRequest>| {
        let facade = Arc::clone(&facade);
        async move { handler(&facade, event).await }
    }))
    .await
}
