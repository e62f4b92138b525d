//! Content Unroller - expansion service for editorial content

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_unroller::config::Args;
use content_unroller::reader::{ContentReader, Reader, ReaderConfig};
use content_unroller::server::{self, AppState};
use content_unroller::unroller::UniversalUnroller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("content_unroller={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Content Unroller");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!(
        "Content store: {} ({})",
        args.content_store_host, args.content_store_app_name
    );
    info!("API host: {}", args.api_host);
    info!("Component unroll depth: {}", args.component_unroll_depth);
    info!("======================================");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(args.request_timeout_ms))
        .pool_max_idle_per_host(args.max_idle_conns_per_host)
        .build()
        .context("failed to build content store HTTP client")?;

    let reader = Arc::new(ContentReader::new(
        ReaderConfig {
            content_store_app_name: args.content_store_app_name.clone(),
            content_store_host: args.content_store_host.clone(),
            content_path_endpoint: args.content_path_endpoint.clone(),
            internal_content_path_endpoint: args.internal_content_path_endpoint.clone(),
        },
        client,
    ));

    let unroller = Arc::new(
        UniversalUnroller::new(Arc::clone(&reader) as Arc<dyn Reader>, args.api_host.clone())
            .with_component_unroll_depth(args.component_unroll_depth),
    );

    let state = Arc::new(AppState::new(args, reader, unroller));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
