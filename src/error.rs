//! Error types for card rendering and capture

use thiserror::Error;

/// Result type alias for cardsmith operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, editing or capturing a card
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to start a browser context
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load a card page
    #[error("Failed to load page: {0}")]
    LoadError(String),

    /// Failed to capture or render content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to execute JavaScript in the page
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Rejected request input, naming the offending field
    #[error("Invalid value for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Geometry component that is negative or not finite
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Field id not present in the template
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Pointer interaction before the template image reported its size
    #[error("Template image has not finished loading")]
    TemplateNotLoaded,

    /// The element flagged for screenshotting is absent from the page
    #[error("Capture target not found: {0}")]
    CaptureTargetMissing(String),

    /// Record search collaborator failed
    #[error("Search failed")]
    SearchFailed,

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a validation failure on `field`
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error stems from caller input rather than a backend fault
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
