//! Core data model for normalization runs

use crate::error::{CatalogError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Release date shown in the date label overlay, parsed from `MM/DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateLabel {
    month: u8,
    day: u8,
}

impl DateLabel {
    /// Parse a `MM/DD` string
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || CatalogError::validation(format!("Invalid date label '{}', expected MM/DD", input));

        let (month, day) = input.trim().split_once('/').ok_or_else(invalid)?;
        let month: u8 = month.trim().parse().map_err(|_| invalid())?;
        let day: u8 = day.trim().parse().map_err(|_| invalid())?;

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(invalid());
        }
        Ok(Self { month, day })
    }

    #[must_use]
    pub fn month(&self) -> u8 {
        self.month
    }

    #[must_use]
    pub fn day(&self) -> u8 {
        self.day
    }

    /// Zero-padded day, e.g. `05`
    #[must_use]
    pub fn day_text(&self) -> String {
        format!("{:02}", self.day)
    }

    /// Three-letter upper-case month, e.g. `MAR`
    #[must_use]
    pub fn month_text(&self) -> &'static str {
        MONTHS
            .get(usize::from(self.month.saturating_sub(1)))
            .copied()
            .unwrap_or("JAN")
    }
}

impl std::fmt::Display for DateLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.day)
    }
}

/// Where a job's source bytes come from
#[derive(Debug, Clone)]
pub enum JobSource {
    /// Bytes supplied directly by the caller
    Upload { bytes: Arc<[u8]>, filename: String },
    /// Bytes fetched from a URL with retries
    Remote { url: String },
}

/// Optional overlays and backgrounds for a job
#[derive(Debug, Clone, Default)]
pub struct Decorations {
    /// Product name used for brand detection and the manifest
    pub product_name: Option<String>,
    /// Explicit logo file, bypassing brand detection
    pub logo: Option<PathBuf>,
    pub date_label: Option<DateLabel>,
    /// Per-job destination background, overriding the run default
    pub background: Option<PathBuf>,
}

/// A single normalization job
///
/// Jobs are validated on construction and not mutated once handed to the
/// scheduler.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    identifier: String,
    source: JobSource,
    remove_background: bool,
    decorations: Decorations,
}

impl ProcessingJob {
    /// Job for directly uploaded bytes; the identifier is the file stem
    pub fn upload<S: Into<String>>(filename: S, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let filename = filename.into();
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CatalogError::validation(format!(
                "Upload '{}' is empty",
                filename
            )));
        }
        let identifier = std::path::Path::new(&filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        validate_identifier(&identifier)?;

        Ok(Self {
            identifier,
            source: JobSource::Upload { bytes, filename },
            remove_background: false,
            decorations: Decorations::default(),
        })
    }

    /// Job for a remote source URL
    pub fn remote<I: Into<String>, U: Into<String>>(identifier: I, url: U) -> Result<Self> {
        let identifier = identifier.into().trim().to_string();
        let url = url.into().trim().to_string();
        validate_identifier(&identifier)?;

        let parsed = reqwest::Url::parse(&url).map_err(|e| {
            CatalogError::validation(format!("Invalid image URL '{}' for {}: {}", url, identifier, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CatalogError::validation(format!(
                "Unsupported URL scheme '{}' for {}",
                parsed.scheme(),
                identifier
            )));
        }

        Ok(Self {
            identifier,
            source: JobSource::Remote { url },
            remove_background: false,
            decorations: Decorations::default(),
        })
    }

    #[must_use]
    pub fn with_background_removal(mut self, enabled: bool) -> Self {
        self.remove_background = enabled;
        self
    }

    #[must_use]
    pub fn with_product_name<S: Into<String>>(mut self, name: S) -> Self {
        let name = name.into();
        self.decorations.product_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    #[must_use]
    pub fn with_logo<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.decorations.logo = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_date_label(mut self, label: DateLabel) -> Self {
        self.decorations.date_label = Some(label);
        self
    }

    #[must_use]
    pub fn with_background<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.decorations.background = Some(path.into());
        self
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn source(&self) -> &JobSource {
        &self.source
    }

    #[must_use]
    pub fn remove_background(&self) -> bool {
        self.remove_background
    }

    #[must_use]
    pub fn decorations(&self) -> &Decorations {
        &self.decorations
    }

    /// Uploaded bytes, if this job did not come from a URL
    #[must_use]
    pub fn upload_bytes(&self) -> Option<&Arc<[u8]>> {
        match &self.source {
            JobSource::Upload { bytes, .. } => Some(bytes),
            JobSource::Remote { .. } => None,
        }
    }

    /// Name of the delivered asset inside an archive
    #[must_use]
    pub fn asset_filename(&self, prefix: &str) -> String {
        format!("{}{}.jpg", prefix, self.identifier)
    }
}

fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(CatalogError::validation("Job identifier must not be empty"));
    }
    if identifier.contains(['/', '\\']) || identifier == "." || identifier == ".." {
        return Err(CatalogError::validation(format!(
            "Job identifier '{}' must not contain path separators",
            identifier
        )));
    }
    Ok(())
}

/// An encoded, delivered image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedAsset {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl ProcessedAsset {
    #[must_use]
    pub fn new(filename: String, bytes: Vec<u8>) -> Self {
        Self {
            filename,
            bytes,
            created_at: Utc::now(),
        }
    }
}

/// Per-item failure entry shown to callers and written to the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub identifier: String,
    pub message: String,
}

/// Result of one job within a scheduler run
#[derive(Debug)]
pub enum ItemOutcome {
    /// Normalized successfully
    Processed(ProcessedAsset),
    /// Processing failed; the asset is a re-encoded copy of the original
    Degraded {
        identifier: String,
        asset: ProcessedAsset,
        error: CatalogError,
    },
    /// Processing failed and no fallback could be produced
    Failed {
        identifier: String,
        error: CatalogError,
    },
}

impl ItemOutcome {
    #[must_use]
    pub fn asset(&self) -> Option<&ProcessedAsset> {
        match self {
            Self::Processed(asset) | Self::Degraded { asset, .. } => Some(asset),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<ItemError> {
        match self {
            Self::Processed(_) => None,
            Self::Degraded {
                identifier, error, ..
            }
            | Self::Failed { identifier, error } => Some(ItemError {
                identifier: identifier.clone(),
                message: error.to_string(),
            }),
        }
    }
}

/// Everything a scheduler invocation produced
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per job, batches in order, completion order within a batch
    pub outcomes: Vec<ItemOutcome>,
    pub batches_run: usize,
    pub timed_out_batches: usize,
}

impl BatchReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn processed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Processed(_)))
            .count()
    }

    #[must_use]
    pub fn degraded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Degraded { .. }))
            .count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Failed { .. }))
            .count()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<ItemError> {
        self.outcomes.iter().filter_map(ItemOutcome::error).collect()
    }

    /// Split into delivered assets and error entries
    #[must_use]
    pub fn into_parts(self) -> (Vec<ProcessedAsset>, Vec<ItemError>) {
        let errors = self.errors();
        let assets = self
            .outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                ItemOutcome::Processed(asset) | ItemOutcome::Degraded { asset, .. } => Some(asset),
                ItemOutcome::Failed { .. } => None,
            })
            .collect();
        (assets, errors)
    }
}

/// Lightweight preview of one delivered asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub filename: String,
    /// `data:image/jpeg;base64,...` thumbnail
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// Response of a preview run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPreview {
    pub session_id: String,
    pub previews: Vec<Preview>,
    pub errors: Vec<ItemError>,
    pub total: usize,
}
