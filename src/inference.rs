//! Foreground extraction abstraction
//!
//! The AI model that separates product from background runs outside this
//! crate. Implementations of [`ForegroundExtractor`] wrap whatever engine is
//! available; see [`crate::backends`].

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Options forwarded to the extraction engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Model identifier understood by the engine
    pub model: Option<String>,
    /// Model precision variant, e.g. `fp16`
    pub variant: Option<String>,
}

/// Engine returning an image with its background made transparent
///
/// Both entry points return encoded PNG bytes with an alpha channel.
#[async_trait]
pub trait ForegroundExtractor: Send + Sync {
    /// Extract from an in-memory encoded image
    ///
    /// # Errors
    /// - Engine unavailable or crashed
    /// - Output missing or not an image
    async fn extract_from_buffer(&self, input: &[u8], options: &ExtractionOptions)
        -> Result<Vec<u8>>;

    /// Extract from an image file on disk
    ///
    /// # Errors
    /// - Engine unavailable or crashed
    /// - File unreadable by the engine
    async fn extract_from_path(&self, path: &Path, options: &ExtractionOptions) -> Result<Vec<u8>>;

    /// Engine name for logs
    fn name(&self) -> &str;
}
