//! Foreground extraction through an external command-line engine
//!
//! Drives any executable with the `imgly-bgremove` calling convention:
//! `<exe> <input|-> --output - --format png [--model M] [--variant V]`,
//! reading the input from stdin when `-` is given and writing PNG to stdout.

use crate::error::{CatalogError, Result};
use crate::inference::{ExtractionOptions, ForegroundExtractor};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Extractor spawning an external background-removal command per call
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    executable: PathBuf,
    extra_args: Vec<OsString>,
    timeout: Duration,
}

impl Default for CommandExtractor {
    fn default() -> Self {
        Self::new("imgly-bgremove")
    }
}

impl CommandExtractor {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
            extra_args: Vec::new(),
            timeout: Duration::from_secs(90),
        }
    }

    /// Append an argument passed on every invocation
    #[must_use]
    pub fn with_arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, input: &std::ffi::OsStr, options: &ExtractionOptions) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg(input)
            .args(["--output", "-", "--format", "png"])
            .args(&self.extra_args);
        if let Some(model) = &options.model {
            command.args(["--model", model.as_str()]);
        }
        if let Some(variant) = &options.variant {
            command.args(["--variant", variant.as_str()]);
        }
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, mut command: Command, stdin: Option<&[u8]>) -> Result<Vec<u8>> {
        command.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command.spawn().map_err(|e| {
            CatalogError::background_removal(format!(
                "Failed to launch '{}': {}",
                self.executable.display(),
                e
            ))
        })?;

        // Stdin is fed concurrently with draining stdout/stderr.
        let feeder = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_vec();
                Some(tokio::spawn(async move {
                    let result = pipe.write_all(&input).await;
                    drop(pipe);
                    result
                }))
            },
            _ => None,
        };

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                CatalogError::background_removal(format!(
                    "Extractor timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| CatalogError::background_removal(format!("Extractor I/O: {}", e)))?;

        if let Some(feeder) = feeder {
            match feeder.await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => log::debug!("Extractor closed stdin early: {}", e),
                Err(e) => log::debug!("Stdin feeder task failed: {}", e),
            }
        }

        if !output.status.success() {
            return Err(CatalogError::background_removal(format!(
                "Extractor exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !output.stdout.starts_with(&PNG_SIGNATURE) {
            return Err(CatalogError::background_removal(
                "Extractor output is not a PNG image",
            ));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl ForegroundExtractor for CommandExtractor {
    async fn extract_from_buffer(
        &self,
        input: &[u8],
        options: &ExtractionOptions,
    ) -> Result<Vec<u8>> {
        let command = self.command(std::ffi::OsStr::new("-"), options);
        self.run(command, Some(input)).await
    }

    async fn extract_from_path(&self, path: &Path, options: &ExtractionOptions) -> Result<Vec<u8>> {
        let command = self.command(path.as_os_str(), options);
        self.run(command, None).await
    }

    fn name(&self) -> &str {
        "command"
    }
}
