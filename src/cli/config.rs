//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{CategoryProfile, DeploymentProfile, PipelineConfig, SchedulerConfig};
use anyhow::{Context, Result};

/// Convert CLI arguments to a validated `PipelineConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the pipeline configuration
    ///
    /// A `--config` file is the base; explicit flags override it. Without a
    /// file the presets come from `--category` and `--deployment` (falling
    /// back to `CATALOG_ALIGNER_DEPLOYMENT`).
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let mut config = match &cli.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => {
                let deployment = cli.deployment.unwrap_or_else(DeploymentProfile::from_env);
                PipelineConfig::builder()
                    .category(cli.category.unwrap_or_default())
                    .deployment(deployment)
                    .build()
                    .context("Invalid configuration")?
            },
        };

        if cli.config.is_some() {
            if let Some(category) = cli.category {
                config.profile = CategoryProfile::for_category(category);
            }
            if let Some(deployment) = cli.deployment {
                config.deployment = deployment;
                config.scheduler = SchedulerConfig::for_deployment(deployment);
                config.removal_profile = deployment.removal_profile();
                config.session_ttl_secs = deployment.session_ttl().as_secs();
            }
        }

        if let Some(background) = &cli.background {
            config.background = Some(background.clone());
        }
        if let Some(logos) = &cli.logos {
            config.logo_dir = Some(logos.clone());
        }
        if let Some(font) = &cli.font {
            config.font_path = Some(font.clone());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.input.is_empty() && cli.sheet.is_none() {
            anyhow::bail!("Provide at least one input path or --sheet");
        }
        if cli.archive.is_some() && cli.output.is_some() {
            anyhow::bail!("--archive and --output are mutually exclusive");
        }
        if cli.preview_only && (cli.archive.is_some() || cli.output.is_some()) {
            anyhow::bail!("--preview-only produces no delivery; drop --archive/--output");
        }
        for (flag, path) in [
            ("--background", cli.background.as_ref()),
            ("--font", cli.font.as_ref()),
            ("--config", cli.config.as_ref()),
            ("--sheet", cli.sheet.as_ref()),
        ] {
            if let Some(path) = path {
                if !path.is_file() {
                    anyhow::bail!("{} file not found: {}", flag, path.display());
                }
            }
        }
        if let Some(logos) = &cli.logos {
            if !logos.is_dir() {
                anyhow::bail!("--logos directory not found: {}", logos.display());
            }
        }
        Ok(())
    }
}
