//! Delivery archives and the text artifacts written into them
//!
//! A download writes every asset, then `ERROR_REPORT.txt` when anything
//! failed, then the optional `updated_data.csv` manifest.

use crate::error::{CatalogError, Result};
use crate::types::{ItemError, ProcessingJob};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Name of the per-run error report entry
pub const ERROR_REPORT_NAME: &str = "ERROR_REPORT.txt";

/// Name of the manifest entry
pub const MANIFEST_NAME: &str = "updated_data.csv";

/// Sink for named delivery entries
#[async_trait]
pub trait ArchiveWriter: Send {
    /// Add one entry; names may contain `/` for nested folders
    async fn append(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Flush and close; no appends are accepted afterwards
    async fn finalize(&mut self) -> Result<()>;
}

fn check_entry_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(CatalogError::validation(format!(
            "Archive entry name '{}' must be a relative path",
            name
        )));
    }
    Ok(())
}

/// Gzip-compressed tarball written to a file
pub struct TarGzArchive {
    path: PathBuf,
    builder: Option<tar::Builder<GzEncoder<File>>>,
}

impl std::fmt::Debug for TarGzArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarGzArchive")
            .field("path", &self.path)
            .field("open", &self.builder.is_some())
            .finish()
    }
}

impl TarGzArchive {
    /// Create the archive file, truncating any existing one
    ///
    /// # Errors
    /// - The file cannot be created
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .map_err(|e| CatalogError::file_io_error("create archive", &path, &e))?;
        let builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        Ok(Self {
            path,
            builder: Some(builder),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn builder(&mut self) -> Result<&mut tar::Builder<GzEncoder<File>>> {
        self.builder
            .as_mut()
            .ok_or_else(|| CatalogError::internal("Archive already finalized"))
    }
}

#[async_trait]
impl ArchiveWriter for TarGzArchive {
    async fn append(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        check_entry_name(name)?;
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
        let path = self.path.clone();
        self.builder()?
            .append_data(&mut header, name, bytes)
            .map_err(|e| CatalogError::file_io_error("append archive entry", &path, &e))
    }

    async fn finalize(&mut self) -> Result<()> {
        let builder = self
            .builder
            .take()
            .ok_or_else(|| CatalogError::internal("Archive already finalized"))?;
        let encoder = builder
            .into_inner()
            .map_err(|e| CatalogError::file_io_error("finish archive", &self.path, &e))?;
        encoder
            .finish()
            .map_err(|e| CatalogError::file_io_error("finish archive", &self.path, &e))?;
        log::info!("Wrote archive {}", self.path.display());
        Ok(())
    }
}

/// Plain output directory, one file per entry
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
    written: usize,
}

impl DirectoryArchive {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            written: 0,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArchiveWriter for DirectoryArchive {
    async fn append(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        check_entry_name(name)?;
        let target = self.root.join(name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CatalogError::file_io_error("create output directory", parent, &e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| CatalogError::file_io_error("write output file", &target, &e))?;
        self.written += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        log::info!("Wrote {} files to {}", self.written, self.root.display());
        Ok(())
    }
}

/// In-memory entries, for callers that serve the archive themselves
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Vec<(String, Vec<u8>)>,
    finalized: bool,
}

impl MemoryArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[async_trait]
impl ArchiveWriter for MemoryArchive {
    async fn append(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(CatalogError::internal("Archive already finalized"));
        }
        check_entry_name(name)?;
        self.entries.push((name.to_string(), bytes.to_vec()));
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}

/// Plain-text summary of a run's failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub total: usize,
    pub errors: Vec<ItemError>,
}

impl ErrorReport {
    #[must_use]
    pub fn new(total: usize, errors: Vec<ItemError>) -> Self {
        Self { total, errors }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Render the report text
    #[must_use]
    pub fn render(&self) -> String {
        let failed = self.errors.len();
        let mut text = String::new();
        text.push_str("Processing Report\n");
        text.push_str(&"=".repeat(50));
        text.push_str("\n\n");
        let _ = writeln!(text, "Total rows: {}", self.total);
        let _ = writeln!(
            text,
            "Successfully processed: {}",
            self.total.saturating_sub(failed)
        );
        let _ = writeln!(text, "Failed: {}", failed);
        text.push_str("\nErrors:\n");
        for (index, error) in self.errors.iter().enumerate() {
            let _ = writeln!(text, "{}. SKU {}: {}", index + 1, error.identifier, error.message);
        }
        text
    }
}

/// Quote characters accepted around a subline: straight and curly double quotes
const SUBTITLE_QUOTES: [char; 3] = ['"', '\u{201C}', '\u{201D}'];

/// Split `Name "Subline"` into title and subtitle
///
/// The subtitle keeps its quotes, normalized to straight ones, so
/// `Nike Dunk “Panda”` becomes `("Nike Dunk", "\"Panda\"")`.
#[must_use]
pub fn split_title(product_name: &str) -> (String, String) {
    let trimmed = product_name.trim();
    if let Some(stripped) = trimmed.strip_suffix(&SUBTITLE_QUOTES[..]) {
        if let Some((open, quote)) = stripped.char_indices().rfind(|(_, c)| SUBTITLE_QUOTES.contains(c)) {
            let inner = &stripped[open + quote.len_utf8()..];
            if !inner.is_empty() {
                return (stripped[..open].trim().to_string(), format!("\"{}\"", inner));
            }
        }
    }
    (trimmed.to_string(), String::new())
}

/// Build `updated_data.csv` with one row per job, in job order
///
/// Rows are written whether or not the job delivered an asset.
///
/// # Errors
/// - CSV serialization failure
pub fn render_manifest(jobs: &[ProcessingJob], asset_prefix: &str) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_err = |e: csv::Error| CatalogError::internal(format!("Failed to write manifest: {}", e));

    writer
        .write_record(["sku", "title", "subtitle", "date", "image_url"])
        .map_err(to_err)?;
    for job in jobs {
        let decorations = job.decorations();
        let (title, subtitle) = decorations
            .product_name
            .as_deref()
            .map(split_title)
            .unwrap_or_default();
        let date = decorations
            .date_label
            .map(|label| label.to_string())
            .unwrap_or_default();
        writer
            .write_record([
                job.identifier(),
                title.as_str(),
                subtitle.as_str(),
                date.as_str(),
                job.asset_filename(asset_prefix).as_str(),
            ])
            .map_err(to_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| CatalogError::internal(format!("Failed to flush manifest: {}", e)))
}
