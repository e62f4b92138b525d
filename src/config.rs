//! Configuration for the unroller service
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// Content Unroller - unroll images and dynamic content for a given content
#[derive(Parser, Debug, Clone)]
#[command(name = "content-unroller")]
#[command(about = "Content expansion service for editorial content")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:9090")]
    pub listen: SocketAddr,

    /// Base URL of the downstream content store
    #[arg(
        long,
        env = "CONTENT_STORE_HOST",
        default_value = "http://localhost:8080/__content-public-read"
    )]
    pub content_store_host: String,

    /// Name of the content store application (used in health reporting)
    #[arg(long, env = "CONTENT_STORE_APP_NAME", default_value = "content-public-read")]
    pub content_store_app_name: String,

    /// Path of the content endpoint on the content store
    #[arg(long, env = "CONTENT_PATH", default_value = "/content")]
    pub content_path_endpoint: String,

    /// Path of the internal content endpoint on the content store
    #[arg(long, env = "INTERNAL_CONTENT_PATH", default_value = "/internalcontent")]
    pub internal_content_path_endpoint: String,

    /// API host used when synthesising identifiers in responses
    #[arg(long, env = "API_HOST", default_value = "test.api.ft.com")]
    pub api_host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Downstream request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections kept per downstream host
    #[arg(long, env = "MAX_IDLE_CONNS_PER_HOST", default_value = "100")]
    pub max_idle_conns_per_host: usize,

    /// How many levels of nested component bodies to expand.
    /// One level expands the bodies of directly embedded components only.
    #[arg(long, env = "COMPONENT_UNROLL_DEPTH", default_value = "1")]
    pub component_unroll_depth: usize,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.content_store_host.is_empty() {
            return Err("CONTENT_STORE_HOST must not be empty".to_string());
        }

        if !self.content_store_host.starts_with("http://")
            && !self.content_store_host.starts_with("https://")
        {
            return Err(format!(
                "CONTENT_STORE_HOST must be an http(s) URL, got {}",
                self.content_store_host
            ));
        }

        if self.api_host.is_empty() {
            return Err("API_HOST must not be empty".to_string());
        }

        if self.component_unroll_depth == 0 {
            return Err("COMPONENT_UNROLL_DEPTH must be at least 1".to_string());
        }

        Ok(())
    }
}
