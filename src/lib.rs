//! Content Unroller - expansion service for editorial content
//!
//! Takes a JSON content document and recursively resolves the references it
//! embeds (images, clips, dynamic content, nested components) against a
//! downstream content store, substituting each reference with the fetched
//! representation.
//!
//! ## Services
//!
//! - **Unroller**: type-dispatched expansion engine (`POST /content`)
//! - **Internal unroller**: richer expansion for internal consumers,
//!   resolving lead images and dynamic content (`POST /internalcontent`)
//! - **Reader**: batched fetch client for the content store
//! - **Health**: liveness/readiness probes backed by the content store

pub mod config;
pub mod content;
pub mod reader;
pub mod routes;
pub mod server;
pub mod types;
pub mod unroller;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, UnrollError};
