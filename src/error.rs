// src/error.rs

//! Crate-wide error type
//!
//! Resolution faults are never reported through this type; they are
//! accumulated as warnings in the [`ResolveStatus`](crate::ResolveStatus)
//! returned by `resolve`. `Error` covers the strict edges of the public
//! API: version parsing and registry lookups.

use thiserror::Error;

/// Errors returned by the strict public API
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid plugin version '{0}': expected up to three dot-separated numeric components")]
    VersionParse(String),

    #[error("Plugin '{0}' not found in registry")]
    PluginNotFound(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;
