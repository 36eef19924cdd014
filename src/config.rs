//! Configuration types for catalog normalization runs

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Side length of the delivered canvas
pub const CANVAS_SIZE: u32 = 800;

/// Side length of the neutral working canvas used for alignment
pub const WORKING_CANVAS_SIZE: u32 = 2000;

/// Environment variable selecting the deployment profile
pub const DEPLOYMENT_ENV_VAR: &str = "CATALOG_ALIGNER_DEPLOYMENT";

/// Product category controlling alignment constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductCategory {
    /// Sneakers and shoes, single removal pass
    Footwear,
    /// Generic catalog items on a branded background
    Catalog,
    /// Upcoming releases with logo and date label, double removal pass
    ComingSoon,
    /// Pharmacy products, height-first fit
    Pharma,
}

impl Default for ProductCategory {
    fn default() -> Self {
        Self::Catalog
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Footwear => write!(f, "footwear"),
            Self::Catalog => write!(f, "catalog"),
            Self::ComingSoon => write!(f, "coming-soon"),
            Self::Pharma => write!(f, "pharma"),
        }
    }
}

impl FromStr for ProductCategory {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "footwear" | "sneakers" => Ok(Self::Footwear),
            "catalog" | "generic" => Ok(Self::Catalog),
            "coming-soon" | "coming_soon" | "comingsoon" => Ok(Self::ComingSoon),
            "pharma" => Ok(Self::Pharma),
            other => Err(CatalogError::invalid_config(format!(
                "Unknown product category '{}'. Expected footwear, catalog, coming-soon or pharma",
                other
            ))),
        }
    }
}

/// Deployment profile controlling batch sizing and cache lifetimes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentProfile {
    /// Long-running host with generous limits
    Standard,
    /// Resource-constrained host with a hard request deadline
    Constrained,
}

impl Default for DeploymentProfile {
    fn default() -> Self {
        Self::Standard
    }
}

impl std::fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Constrained => write!(f, "constrained"),
        }
    }
}

impl FromStr for DeploymentProfile {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "development" => Ok(Self::Standard),
            "constrained" | "production" | "serverless" => Ok(Self::Constrained),
            other => Err(CatalogError::invalid_config(format!(
                "Unknown deployment profile '{}'. Expected standard or constrained",
                other
            ))),
        }
    }
}

impl DeploymentProfile {
    /// Read the profile from `CATALOG_ALIGNER_DEPLOYMENT`, falling back to the default
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(DEPLOYMENT_ENV_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Removal profile matching this deployment
    #[must_use]
    pub fn removal_profile(self) -> RemovalProfile {
        match self {
            Self::Standard => RemovalProfile::Batch,
            Self::Constrained => RemovalProfile::Interactive,
        }
    }

    /// Session lifetime for this deployment
    #[must_use]
    pub fn session_ttl(self) -> Duration {
        match self {
            Self::Standard => Duration::from_secs(30 * 60),
            Self::Constrained => Duration::from_secs(10 * 60),
        }
    }
}

/// Quality/latency trade-off for the foreground extractor input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalProfile {
    /// Lower latency, slightly lossier input
    Interactive,
    /// Higher fidelity input, slower
    Batch,
}

impl Default for RemovalProfile {
    fn default() -> Self {
        Self::Batch
    }
}

impl std::fmt::Display for RemovalProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interactive => write!(f, "interactive"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

impl RemovalProfile {
    /// JPEG quality used when re-encoding input for the extractor
    #[must_use]
    pub fn encode_quality(self) -> u8 {
        match self {
            Self::Interactive => 85,
            Self::Batch => 98,
        }
    }

    /// Model variant hint passed to the extractor
    #[must_use]
    pub fn model_variant(self) -> Option<&'static str> {
        match self {
            Self::Interactive => Some("fp16"),
            Self::Batch => None,
        }
    }
}

/// Thresholds for the three-rule background classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Alpha below this value is background
    pub transparency_threshold: u8,
    /// All RGB channels at or above this value is background
    pub white_threshold: u8,
    /// Maximum spread between channels for the light-grey rule
    pub grey_tolerance: u8,
    /// All RGB channels at or above this floor (with low spread) is background
    pub near_white_floor: u8,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            transparency_threshold: 128,
            white_threshold: 220,
            grey_tolerance: 10,
            near_white_floor: 240,
        }
    }
}

impl ClassifierThresholds {
    /// Thresholds with a custom white cutoff
    #[must_use]
    pub fn with_white_threshold(white_threshold: u8) -> Self {
        Self {
            white_threshold,
            ..Self::default()
        }
    }
}

/// How a crop is scaled onto the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "policy")]
pub enum FitPolicy {
    /// Scale to a target width, falling back to the height cap
    WidthFirst { target_width: u32, max_height: u32 },
    /// Scale to a target height, falling back to the width cap
    HeightFirst { target_height: u32, max_width: u32 },
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self::WidthFirst {
            target_width: 700,
            max_height: CANVAS_SIZE,
        }
    }
}

/// Named alignment constants for one product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryProfile {
    pub category: ProductCategory,
    pub fit: FitPolicy,
    /// Distance from the canvas bottom to the product baseline
    pub baseline_inset: u32,
    pub thresholds: ClassifierThresholds,
    /// Run the extractor again on the aligned crop
    pub double_removal: bool,
    /// Synthesize a drop shadow after removal
    pub shadow: bool,
    /// Apply EXIF orientation when decoding
    pub auto_orient: bool,
    /// JPEG quality of the delivered asset
    pub delivery_quality: u8,
    /// Path prefix for asset names inside the archive
    pub asset_prefix: String,
    /// Emit `updated_data.csv` alongside the assets
    pub write_manifest: bool,
}

impl Default for CategoryProfile {
    fn default() -> Self {
        Self::for_category(ProductCategory::default())
    }
}

impl CategoryProfile {
    /// Preset constants for a category
    #[must_use]
    pub fn for_category(category: ProductCategory) -> Self {
        let base = Self {
            category,
            fit: FitPolicy::default(),
            baseline_inset: 212,
            thresholds: ClassifierThresholds::default(),
            double_removal: false,
            shadow: false,
            auto_orient: false,
            delivery_quality: 95,
            asset_prefix: String::new(),
            write_manifest: false,
        };

        match category {
            ProductCategory::Footwear => Self {
                delivery_quality: 90,
                ..base
            },
            ProductCategory::Catalog => Self {
                shadow: true,
                ..base
            },
            ProductCategory::ComingSoon => Self {
                fit: FitPolicy::WidthFirst {
                    target_width: 650,
                    max_height: CANVAS_SIZE,
                },
                baseline_inset: 207,
                double_removal: true,
                shadow: true,
                asset_prefix: "coming-soon-image/".to_string(),
                write_manifest: true,
                ..base
            },
            ProductCategory::Pharma => Self {
                fit: FitPolicy::HeightFirst {
                    target_height: 700,
                    max_width: CANVAS_SIZE,
                },
                baseline_inset: 110,
                thresholds: ClassifierThresholds::with_white_threshold(235),
                auto_orient: true,
                delivery_quality: 90,
                ..base
            },
        }
    }

    /// Validate constants against the fixed canvas
    pub fn validate(&self) -> Result<()> {
        let (primary, cap) = match self.fit {
            FitPolicy::WidthFirst {
                target_width,
                max_height,
            } => (target_width, max_height),
            FitPolicy::HeightFirst {
                target_height,
                max_width,
            } => (target_height, max_width),
        };
        if primary == 0 || primary > CANVAS_SIZE {
            return Err(CatalogError::config_value_error(
                "fit target",
                primary,
                "1-800",
            ));
        }
        if cap == 0 || cap > CANVAS_SIZE {
            return Err(CatalogError::config_value_error("fit cap", cap, "1-800"));
        }
        if self.baseline_inset > CANVAS_SIZE {
            return Err(CatalogError::config_value_error(
                "baseline inset",
                self.baseline_inset,
                "0-800",
            ));
        }
        if self.delivery_quality == 0 || self.delivery_quality > 100 {
            return Err(CatalogError::config_value_error(
                "delivery quality",
                self.delivery_quality,
                "1-100",
            ));
        }
        Ok(())
    }
}

/// Scheduler limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Jobs per batch
    pub batch_size: usize,
    /// Jobs running concurrently within a batch
    pub max_in_flight: usize,
    /// Start delay added per item index within a batch
    pub stagger_interval_ms: u64,
    /// Time budget for a whole batch
    pub batch_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::for_deployment(DeploymentProfile::default())
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn for_deployment(deployment: DeploymentProfile) -> Self {
        match deployment {
            DeploymentProfile::Standard => Self {
                batch_size: 5,
                max_in_flight: 5,
                stagger_interval_ms: 200,
                batch_timeout_secs: 120,
            },
            DeploymentProfile::Constrained => Self {
                batch_size: 2,
                max_in_flight: 2,
                stagger_interval_ms: 500,
                batch_timeout_secs: 50,
            },
        }
    }

    #[must_use]
    pub fn stagger_interval(&self) -> Duration {
        Duration::from_millis(self.stagger_interval_ms)
    }

    #[must_use]
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CatalogError::config_value_error(
                "batch size",
                self.batch_size,
                ">= 1",
            ));
        }
        if self.max_in_flight == 0 {
            return Err(CatalogError::config_value_error(
                "max in flight",
                self.max_in_flight,
                ">= 1",
            ));
        }
        if self.batch_timeout_secs == 0 {
            return Err(CatalogError::config_value_error(
                "batch timeout",
                self.batch_timeout_secs,
                ">= 1 second",
            ));
        }
        Ok(())
    }
}

/// Retry settings for remote sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff unit; attempt `n` waits `n` units
    pub base_delay_ms: u64,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 2000,
            request_timeout_secs: 30,
        }
    }
}

/// Complete configuration for a normalization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub deployment: DeploymentProfile,
    pub profile: CategoryProfile,
    pub scheduler: SchedulerConfig,
    pub fetch: FetchConfig,
    pub removal_profile: RemovalProfile,
    /// Session lifetime before the sweep discards it
    pub session_ttl_secs: u64,
    /// Default destination background for jobs without their own
    pub background: Option<PathBuf>,
    /// Directory holding `{brand}.png` logo files
    pub logo_dir: Option<PathBuf>,
    /// Font file used by the date label template
    pub font_path: Option<PathBuf>,
    /// Longest side of preview thumbnails
    pub preview_max_dimension: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_deployment(DeploymentProfile::default(), ProductCategory::default())
    }
}

impl PipelineConfig {
    /// Defaults for a deployment and category
    #[must_use]
    pub fn for_deployment(deployment: DeploymentProfile, category: ProductCategory) -> Self {
        Self {
            deployment,
            profile: CategoryProfile::for_category(category),
            scheduler: SchedulerConfig::for_deployment(deployment),
            fetch: FetchConfig::default(),
            removal_profile: deployment.removal_profile(),
            session_ttl_secs: deployment.session_ttl().as_secs(),
            background: None,
            logo_dir: None,
            font_path: None,
            preview_max_dimension: 400,
        }
    }

    /// Create a builder for `PipelineConfig`
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::file_io_error("read config", path, &e))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            CatalogError::invalid_config(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.profile.validate()?;
        self.scheduler.validate()?;
        if self.fetch.max_attempts == 0 {
            return Err(CatalogError::config_value_error(
                "fetch attempts",
                self.fetch.max_attempts,
                ">= 1",
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err(CatalogError::config_value_error(
                "session TTL",
                self.session_ttl_secs,
                ">= 1 second",
            ));
        }
        if self.preview_max_dimension < 16 || self.preview_max_dimension > CANVAS_SIZE {
            return Err(CatalogError::config_value_error(
                "preview dimension",
                self.preview_max_dimension,
                "16-800",
            ));
        }
        Ok(())
    }
}

/// Builder for `PipelineConfig`
///
/// Category and deployment pick the presets; the remaining setters override
/// individual values on top of them.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    category: ProductCategory,
    deployment: DeploymentProfile,
    batch_size: Option<usize>,
    max_in_flight: Option<usize>,
    stagger_interval: Option<Duration>,
    batch_timeout: Option<Duration>,
    session_ttl: Option<Duration>,
    removal_profile: Option<RemovalProfile>,
    fetch: Option<FetchConfig>,
    double_removal: Option<bool>,
    shadow: Option<bool>,
    background: Option<PathBuf>,
    logo_dir: Option<PathBuf>,
    font_path: Option<PathBuf>,
    preview_max_dimension: Option<u32>,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn category(mut self, category: ProductCategory) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn deployment(mut self, deployment: DeploymentProfile) -> Self {
        self.deployment = deployment;
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    #[must_use]
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight);
        self
    }

    #[must_use]
    pub fn stagger_interval(mut self, interval: Duration) -> Self {
        self.stagger_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn removal_profile(mut self, profile: RemovalProfile) -> Self {
        self.removal_profile = Some(profile);
        self
    }

    #[must_use]
    pub fn fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = Some(fetch);
        self
    }

    #[must_use]
    pub fn double_removal(mut self, enabled: bool) -> Self {
        self.double_removal = Some(enabled);
        self
    }

    #[must_use]
    pub fn shadow(mut self, enabled: bool) -> Self {
        self.shadow = Some(enabled);
        self
    }

    #[must_use]
    pub fn background<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.background = Some(path.into());
        self
    }

    #[must_use]
    pub fn logo_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.logo_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn font_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.font_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn preview_max_dimension(mut self, dimension: u32) -> Self {
        self.preview_max_dimension = Some(dimension);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::for_deployment(self.deployment, self.category);

        if let Some(batch_size) = self.batch_size {
            config.scheduler.batch_size = batch_size;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.scheduler.max_in_flight = max_in_flight;
        }
        if let Some(interval) = self.stagger_interval {
            config.scheduler.stagger_interval_ms = interval.as_millis() as u64;
        }
        if let Some(timeout) = self.batch_timeout {
            config.scheduler.batch_timeout_secs = timeout.as_secs();
        }
        if let Some(ttl) = self.session_ttl {
            config.session_ttl_secs = ttl.as_secs();
        }
        if let Some(profile) = self.removal_profile {
            config.removal_profile = profile;
        }
        if let Some(fetch) = self.fetch {
            config.fetch = fetch;
        }
        if let Some(double_removal) = self.double_removal {
            config.profile.double_removal = double_removal;
        }
        if let Some(shadow) = self.shadow {
            config.profile.shadow = shadow;
        }
        if let Some(dimension) = self.preview_max_dimension {
            config.preview_max_dimension = dimension;
        }
        config.background = self.background;
        config.logo_dir = self.logo_dir;
        config.font_path = self.font_path;

        config.validate()?;
        Ok(config)
    }
}
