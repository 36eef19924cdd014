//! Date label rendering through a headless browser
//!
//! The label is a small HTML fragment (day over month) rendered into a
//! transparent 800x800 screenshot and laid over the finished canvas.

use crate::error::{CatalogError, Result};
use crate::types::DateLabel;
use async_trait::async_trait;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Renders an HTML fragment into a transparent raster
#[async_trait]
pub trait LabelRenderer: Send + Sync {
    /// Render `html` at the given viewport size, preserving transparency
    ///
    /// # Errors
    /// - Renderer process unavailable or failed
    /// - Screenshot missing or undecodable
    async fn render(&self, html: &str, viewport: (u32, u32)) -> Result<RgbaImage>;

    fn name(&self) -> &str;
}

/// Build the date label markup
///
/// When `font_path` is given the template embeds it as `GothamPro-Bold`;
/// otherwise the browser falls back to a bold sans-serif.
#[must_use]
pub fn date_label_html(label: &DateLabel, font_path: Option<&Path>) -> String {
    let font_face = font_path
        .map(|path| {
            format!(
                "@font-face {{ font-family: 'GothamPro-Bold'; src: url('file://{}'); }}",
                path.display()
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<style>
{font_face}
html, body {{ margin: 0; padding: 0; width: 800px; height: 800px; background: transparent; }}
.date-container {{
  position: absolute; right: 45px; top: 22px; width: 120px;
  text-align: center; color: #ffffff;
  font-family: 'GothamPro-Bold', 'Helvetica Neue', Arial, sans-serif; font-weight: bold;
}}
.day {{ font-size: 83.16px; line-height: 0.85; margin-bottom: 9px; }}
.month {{ font-size: 42.99px; line-height: 1; transform: translateY(-5px); }}
</style>
</head>
<body>
<div class="date-container"><div class="day">{day}</div><div class="month">{month}</div></div>
</body>
</html>
"#,
        font_face = font_face,
        day = label.day_text(),
        month = label.month_text(),
    )
}

/// Headless Chromium screenshot renderer
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    executable: PathBuf,
    timeout: Duration,
}

impl Default for ChromiumRenderer {
    fn default() -> Self {
        Self::new("chromium")
    }
}

impl ChromiumRenderer {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl LabelRenderer for ChromiumRenderer {
    async fn render(&self, html: &str, viewport: (u32, u32)) -> Result<RgbaImage> {
        let workdir = tempfile::Builder::new().prefix("label_").tempdir()?;
        let page = workdir.path().join("label.html");
        let screenshot = workdir.path().join("label.png");
        tokio::fs::write(&page, html)
            .await
            .map_err(|e| CatalogError::file_io_error("write label page", &page, &e))?;

        let mut command = Command::new(&self.executable);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg("--default-background-color=00000000")
            .arg(format!("--window-size={},{}", viewport.0, viewport.1))
            .arg(format!("--screenshot={}", screenshot.display()))
            .arg(format!("file://{}", page.display()))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!("Rendering label with {}", self.executable.display());
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| CatalogError::render(format!("Renderer timed out after {:?}", self.timeout)))?
            .map_err(|e| {
                CatalogError::render(format!(
                    "Failed to launch '{}': {}",
                    self.executable.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(CatalogError::render(format!(
                "Renderer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let bytes = tokio::fs::read(&screenshot)
            .await
            .map_err(|e| CatalogError::file_io_error("read label screenshot", &screenshot, &e))?;
        let image = image::load_from_memory(&bytes)?.to_rgba8();
        Ok(image)
    }

    fn name(&self) -> &str {
        "chromium"
    }
}
