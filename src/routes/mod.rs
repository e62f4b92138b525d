//! HTTP route handlers

mod content;
mod health;

pub use content::{post_content, post_internal_content};
pub use health::{health_check, readiness_check, version_info};
