//! Small runtime helpers shared across the pipeline

use crate::error::{CatalogError, Result};

/// Run CPU-bound work on the blocking pool and flatten join failures
pub async fn run_blocking<T, F>(task: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CatalogError::internal(format!("{} task failed to complete: {}", task, e)))?
}
