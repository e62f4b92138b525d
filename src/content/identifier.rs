//! Resource identifier handling
//!
//! Identifiers arriving in content documents are URL-shaped strings with a
//! UUID somewhere inside. Extraction only needs the UUID-shaped substring,
//! not a well-formed URL.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{Result, UnrollError};

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("UUID pattern is valid")
});

/// Extract the first UUID-shaped substring from an identifier.
pub fn extract_uuid(identifier: &str) -> Result<String> {
    UUID_PATTERN
        .find(identifier)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| UnrollError::UuidExtraction(identifier.to_string()))
}

/// Build a stable resource identifier for content that could not be fetched.
pub fn build_id(api_host: &str, resource_kind: &str, uuid: &str) -> String {
    format!("http://{}/{}/{}", api_host, resource_kind, uuid)
}
