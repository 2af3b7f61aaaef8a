// Tesseract CLI recognition engine.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::OcrEngine;
use crate::config::OcrConfig;
use crate::error::{Result, TsujiError};

/// Shells out to the tesseract binary for text extraction. Remote image
/// sources are downloaded to a temp file first.
pub struct TesseractEngine {
    binary: String,
    languages: String,
    client: reqwest::Client,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("HTTP client creation should not fail");

        Self {
            binary: config.binary_path.clone(),
            languages: config.languages.clone(),
            client,
        }
    }

    /// Resolve an image source to a local path, downloading http(s) sources.
    /// The returned temp path keeps the downloaded file alive.
    async fn materialize(&self, source: &str) -> Result<(PathBuf, Option<tempfile::TempPath>)> {
        if !source.starts_with("http://") && !source.starts_with("https://") {
            return Ok((PathBuf::from(source), None));
        }

        let response = self.client.get(source).send().await?;
        if !response.status().is_success() {
            return Err(TsujiError::Ocr(format!(
                "image download returned status {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;

        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&bytes)?;
        let temp = file.into_temp_path();
        Ok((temp.to_path_buf(), Some(temp)))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn prepare(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                TsujiError::Ocr(format!(
                    "failed to run {} (is tesseract installed?): {}",
                    self.binary, e
                ))
            })?;

        if !output.status.success() {
            return Err(TsujiError::Ocr(format!(
                "{} --version exited with {}",
                self.binary, output.status
            )));
        }

        debug!("tesseract binary available: {}", self.binary);
        Ok(())
    }

    async fn recognize(&self, source: &str) -> Result<String> {
        let (path, _downloaded) = self.materialize(source).await?;

        let output = Command::new(&self.binary)
            .arg(&path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .output()
            .await
            .map_err(|e| TsujiError::Ocr(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TsujiError::Ocr(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
