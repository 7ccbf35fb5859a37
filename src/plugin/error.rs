//! Plugin system error types.

use std::path::PathBuf;
use thiserror::Error;

use super::types::{SYSINFO_RC_ERROR, SYSINFO_RC_NO_SUCH_INSTANCE, SYSINFO_RC_UNSUPPORTED};

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur while loading plugins or running their handlers.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Archive file not found.
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    /// Invalid archive manifest.
    #[error("Invalid plugin manifest: {0}")]
    InvalidManifest(String),

    /// Plugin loading failed.
    #[error("Failed to load plugin: {0}")]
    LoadError(String),

    /// Type name not present in the resolution scope.
    #[error("Unknown plugin type: {0}")]
    UnknownType(String),

    /// Plugin API version incompatible.
    #[error("Plugin '{name}' requires API version {required}, but host provides {available}")]
    IncompatibleVersion { name: String, required: String, available: String },

    /// Plugin factory failed.
    #[error("Failed to construct plugin '{type_name}'")]
    Construction {
        type_name: String,
        #[source]
        source: Box<PluginError>,
    },

    /// Capability handler failed.
    #[error("Handler failed: {0}")]
    Handler(String),

    /// Metric exists but the requested instance does not.
    #[error("No such instance: {0}")]
    NoSuchInstance(String),

    /// Request is not supported by the handler.
    #[error("Unsupported request: {0}")]
    Unsupported(String),

    /// Plugin code panicked.
    #[error("Plugin code panicked: {0}")]
    Panicked(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error (e.g., checksum mismatch).
    #[error("Validation error: {0}")]
    Validation(String),
}

impl PluginError {
    /// Shorthand for a handler failure.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// Agent result code reported to the host for this error.
    pub fn result_code(&self) -> u32 {
        match self {
            Self::NoSuchInstance(_) => SYSINFO_RC_NO_SUCH_INSTANCE,
            Self::Unsupported(_) => SYSINFO_RC_UNSUPPORTED,
            _ => SYSINFO_RC_ERROR,
        }
    }
}
