//! Digit recognition for CAPTCHA images
//!
//! The gate's challenge is a short run of digits rendered as an image.
//! [`TesseractOcr`] shells out to the `tesseract` binary restricted to the
//! digits charset. When the binary is absent the recogniser reports
//! [`OcrError::Unavailable`] instead of failing the whole resolution.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// OCR failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    /// The OCR engine is not installed or not usable in this environment.
    #[error("OCR unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but produced nothing usable.
    #[error("OCR failed: {0}")]
    Failed(String),
}

/// Capability mapping an image to the digits it shows.
#[async_trait]
pub trait DigitRecognizer: Send + Sync {
    /// Whether the engine can run at all.
    fn is_available(&self) -> bool;

    /// Recognise digits in the image; the result contains only `0-9`.
    async fn recognize_digits(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Keep only ASCII digits from raw OCR output.
#[must_use]
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// tesseract-based recogniser
pub struct TesseractOcr {
    /// Path to tesseract binary, `None` when not found
    binary: Option<PathBuf>,
}

impl TesseractOcr {
    /// Search `PATH` for the tesseract binary
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: which::which("tesseract").ok(),
        }
    }

    /// Use an explicit binary, falling back to `PATH` when `None`
    #[must_use]
    pub fn with_binary(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self { binary: Some(path) },
            None => Self::new(),
        }
    }

    /// tesseract arguments: read stdin, write stdout, digits only
    fn args() -> [&'static str; 7] {
        ["stdin", "stdout", "--oem", "3", "--psm", "6", "digits"]
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DigitRecognizer for TesseractOcr {
    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    async fn recognize_digits(&self, image: &[u8]) -> Result<String, OcrError> {
        let Some(binary) = &self.binary else {
            warn!("tesseract binary missing; install tesseract-ocr to solve CAPTCHA gates");
            return Err(OcrError::Unavailable("tesseract binary not found".into()));
        };
        if image.is_empty() {
            return Err(OcrError::Failed("empty image".into()));
        }

        let mut child = Command::new(binary)
            .args(Self::args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OcrError::Unavailable(format!("cannot run {}: {e}", binary.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| OcrError::Failed(format!("writing image: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OcrError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!("tesseract failed: {}", stderr.trim())));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        debug!(raw = %raw.trim(), "OCR raw result");
        Ok(digits_only(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_only_strips_noise() {
        assert_eq!(digits_only(" 4 8-1 9\n\x0c"), "4819");
        assert_eq!(digits_only("abc"), "");
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let ocr = TesseractOcr { binary: None };
        assert!(!ocr.is_available());
        let err = ocr.recognize_digits(b"png").await.unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unspawnable_binary_is_unavailable() {
        let ocr = TesseractOcr::with_binary(Some(PathBuf::from(
            "/nonexistent/esolve-test/tesseract",
        )));
        assert!(ocr.is_available());
        let err = ocr.recognize_digits(b"png").await.unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)));
    }

    #[test]
    fn args_restrict_to_digits() {
        let args = TesseractOcr::args();
        assert_eq!(args[0], "stdin");
        assert_eq!(args[1], "stdout");
        assert_eq!(args.last(), Some(&"digits"));
    }
}
