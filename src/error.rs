//! Error types for catalog normalization operations

use std::time::Duration;
use thiserror::Error;

/// Result type alias for catalog normalization operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Error taxonomy for the normalization pipeline
///
/// Item-level variants (`Fetch`, `BackgroundRemoval`, `Composition`, `BatchTimeout`)
/// never abort a run; the scheduler converts them into per-item outcomes.
/// `Validation` fails a run before any processing starts.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Malformed job input, rejected before processing
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote source unreachable after all retry attempts
    #[error("Failed to fetch '{url}' after {attempts} attempt(s): {message}")]
    Fetch {
        url: String,
        attempts: u32,
        message: String,
    },

    /// Foreground extraction failed on every strategy
    #[error("Background removal failed: {0}")]
    BackgroundRemoval(String),

    /// Codec or geometry failure on a single item
    #[error("Composition error: {0}")]
    Composition(String),

    /// A whole batch exceeded its time budget
    #[error("Batch {batch} exceeded its time budget of {}s", .timeout.as_secs_f64())]
    BatchTimeout { batch: usize, timeout: Duration },

    /// Session was already consumed, expired, or never existed
    #[error("Session '{0}' is expired or was already consumed")]
    SessionExpired(String),

    /// Headless label rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode/encode errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new background removal error
    pub fn background_removal<S: Into<String>>(msg: S) -> Self {
        Self::BackgroundRemoval(msg.into())
    }

    /// Create a new composition error
    pub fn composition<S: Into<String>>(msg: S) -> Self {
        Self::Composition(msg.into())
    }

    /// Create a new render error
    pub fn render<S: Into<String>>(msg: S) -> Self {
        Self::Render(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a fetch error carrying the last underlying failure
    pub fn fetch<U: Into<String>, M: std::fmt::Display>(url: U, attempts: u32, last: M) -> Self {
        Self::Fetch {
            url: url.into(),
            attempts,
            message: last.to_string(),
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Create composition error with stage context
    pub fn composition_stage_error(stage: &str, identifier: &str, details: &str) -> Self {
        Self::Composition(format!(
            "Composition failed at stage '{}' (item: {}): {}",
            stage, identifier, details
        ))
    }

    /// Whether the pipeline may continue with a fallback after this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BackgroundRemoval(_) | Self::Render(_) | Self::Composition(_)
        )
    }

    /// Whether this error is scoped to a single item rather than the whole run
    #[must_use]
    pub fn is_item_level(&self) -> bool {
        !matches!(
            self,
            Self::Validation(_) | Self::InvalidConfig(_) | Self::SessionExpired(_)
        )
    }
}
