//! Tracing configuration module for structured logging and observability
//!
//! The library only emits events; the CLI (or an embedding service) picks a
//! subscriber here.

use tracing_subscriber::{
    fmt, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BaseSubscriber = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<BaseSubscriber> + Send + Sync>;

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default for CLI)
    Console,
    /// Compact console output for CI environments
    Compact,
    /// JSON structured logging for production environments
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Configuration for tracing output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Output to stderr (default)
    Console,
    /// Output to a file
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
    /// Output to both console and a daily-rolled file
    #[cfg(feature = "tracing-files")]
    Both(std::path::PathBuf),
}

/// Keeps background log writers alive; drop it last
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct TracingGuard {
    #[cfg(feature = "tracing-files")]
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Output destination
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Run identifier logged once the subscriber is installed
    pub run_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
            run_id: None,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set run ID for log correlation
    pub fn with_run_id<S: Into<String>>(mut self, run_id: S) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    ///
    /// Third-party HTTP internals stay at `warn` unless the filter is
    /// overridden explicitly.
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info,hyper=warn,reqwest=warn",
            1 => "debug,hyper=warn,reqwest=warn",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    pub fn init(self) -> anyhow::Result<TracingGuard> {
        let filter = match &self.env_filter {
            Some(env_filter) => EnvFilter::try_new(env_filter)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };

        #[allow(unused_mut)]
        let mut guard = TracingGuard::default();
        let layers: Vec<BoxedLayer> = match &self.output {
            TracingOutput::Console => vec![console_layer(self.format)],

            #[cfg(feature = "tracing-files")]
            TracingOutput::File(path) => {
                let appender = tracing_appender::rolling::never(log_dir(path), log_file_name(path));
                let (writer, file_guard) = tracing_appender::non_blocking(appender);
                guard._file = Some(file_guard);
                vec![file_layer(self.format, writer)]
            },

            #[cfg(feature = "tracing-files")]
            TracingOutput::Both(path) => {
                let appender = tracing_appender::rolling::daily(log_dir(path), log_file_name(path));
                let (writer, file_guard) = tracing_appender::non_blocking(appender);
                guard._file = Some(file_guard);
                vec![console_layer(self.format), file_layer(self.format, writer)]
            },
        };

        Registry::default().with(filter).with(layers).try_init()?;

        if let Some(run_id) = &self.run_id {
            tracing::info!(run_id = %run_id, "Catalog alignment run started");
        }

        Ok(guard)
    }
}

fn console_layer(format: TracingFormat) -> BoxedLayer {
    match format {
        TracingFormat::Console => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .with_level(true)
            .compact()
            .boxed(),
        TracingFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .compact()
            .boxed(),
        #[cfg(feature = "tracing-json")]
        TracingFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    }
}

#[cfg(feature = "tracing-files")]
fn file_layer(format: TracingFormat, writer: tracing_appender::non_blocking::NonBlocking) -> BoxedLayer {
    match format {
        TracingFormat::Console | TracingFormat::Compact => {
            fmt::layer().with_ansi(false).with_writer(writer).compact().boxed()
        },
        #[cfg(feature = "tracing-json")]
        TracingFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    }
}

#[cfg(feature = "tracing-files")]
fn log_dir(path: &std::path::Path) -> &std::path::Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."))
}

#[cfg(feature = "tracing-files")]
fn log_file_name(path: &std::path::Path) -> &std::ffi::OsStr {
    path.file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("catalog-aligner.log"))
}

/// Initialize tracing with CLI-friendly defaults
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<TracingGuard> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Console)
        .with_run_id(uuid::Uuid::new_v4().to_string())
        .init()
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one CLI invocation
    pub fn run(category: &str, deployment: &str, job_count: usize) -> Span {
        tracing::span!(
            Level::INFO,
            "run",
            category = %category,
            deployment = %deployment,
            job_count = job_count
        )
    }

    /// Job discovery from directories, globs or a sheet
    pub fn discovery(input_count: usize) -> Span {
        tracing::span!(Level::INFO, "discovery", inputs = input_count)
    }

    /// One scheduler batch
    pub fn batch(index: usize, size: usize) -> Span {
        tracing::span!(Level::INFO, "batch", index = index, size = size)
    }

    /// One job inside a batch
    pub fn item(identifier: &str) -> Span {
        tracing::span!(Level::DEBUG, "item", identifier = %identifier)
    }

    /// Remote source retrieval
    pub fn fetch(url: &str, max_attempts: u32) -> Span {
        tracing::span!(Level::DEBUG, "fetch", url = %url, max_attempts = max_attempts)
    }

    /// One pass through the foreground extractor
    pub fn removal(identifier: &str, profile: &str) -> Span {
        tracing::span!(Level::DEBUG, "removal", identifier = %identifier, profile = %profile)
    }

    /// Delivery of a cached session into an archive
    pub fn session(session_id: &str, destination: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            destination = %destination.display()
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use tracing::{error, info, warn};

    /// Log a user-facing progress update
    pub fn progress(message: &str) {
        info!("{}", message);
    }

    /// Log an error with context
    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!(error = %error, context = %context, "Operation failed");
    }

    /// Log a warning with recommendation
    pub fn warning_with_recommendation(message: &str, recommendation: &str) {
        warn!(message = %message, recommendation = %recommendation, "Warning");
    }

    /// Final counts for a run
    pub fn run_summary(total: usize, processed: usize, errors: usize, elapsed_ms: u64) {
        info!(total, processed, errors, elapsed_ms, "Run complete");
    }
}
