//! Shared types for the unroller service

mod error;

pub use error::{Result, UnrollError};
