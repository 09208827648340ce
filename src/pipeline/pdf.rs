//! DOCX → PDF conversion through LibreOffice in headless mode.
//!
//! ## Why a private user profile?
//!
//! `soffice` refuses to start a second instance against a profile that is
//! already in use and silently exits 0 without output. Pointing
//! `-env:UserInstallation` at the scratch directory makes every conversion
//! independent of any desktop LibreOffice the user has open.

use crate::config::ReportConfig;
use crate::error::ReportError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

/// Converts a DOCX document to PDF.
#[allow(async_fn_in_trait)]
pub trait PdfConverter {
    async fn convert(&self, docx: &[u8]) -> Result<Vec<u8>, ReportError>;
}

/// Runs `soffice --headless --convert-to pdf` in a scratch directory.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    program: PathBuf,
    timeout_secs: u64,
}

impl SofficeConverter {
    pub fn new(program: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.soffice_program.clone(), config.conversion_timeout_secs)
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl PdfConverter for SofficeConverter {
    async fn convert(&self, docx: &[u8]) -> Result<Vec<u8>, ReportError> {
        // Removed on drop, including every early return below.
        let scratch = TempDir::new()
            .map_err(|e| ReportError::Internal(format!("scratch dir: {}", e)))?;
        let input = scratch.path().join("report.docx");
        let output = scratch.path().join("report.pdf");
        let profile = scratch.path().join("profile");

        tokio::fs::write(&input, docx)
            .await
            .map_err(|e| ReportError::Internal(format!("Failed to write temp file: {}", e)))?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless")
            .arg("--norestore")
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch.path())
            .arg(&input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {:?}", cmd);
        let child = cmd.spawn().map_err(|e| ReportError::ConverterUnavailable {
            program: self.program_name(),
            detail: e.to_string(),
        })?;

        let result = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            warn!("{} timed out after {}s", self.program_name(), self.timeout_secs);
            ReportError::ConversionTimeout {
                secs: self.timeout_secs,
            }
        })?
        .map_err(|e| ReportError::ConversionFailed {
            detail: e.to_string(),
        })?;

        if !result.status.success() {
            return Err(ReportError::ConversionFailed {
                detail: format!(
                    "{} exited with {}: {}",
                    self.program_name(),
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            });
        }

        let pdf = tokio::fs::read(&output)
            .await
            .map_err(|e| ReportError::ConversionFailed {
                detail: format!("no PDF produced ({}): {}", e, stderr_hint(&result.stderr)),
            })?;
        if !pdf.starts_with(b"%PDF") {
            return Err(ReportError::ConversionFailed {
                detail: "output does not start with %PDF".into(),
            });
        }
        debug!("Converted {} bytes of DOCX to {} bytes of PDF", docx.len(), pdf.len());
        Ok(pdf)
    }
}

fn stderr_hint(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        "soffice printed nothing".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let conv = SofficeConverter::new("/nonexistent/bin/soffice-xyz", 5);
        let err = conv.convert(b"PK\x03\x04").await.unwrap_err();
        assert!(
            matches!(err, ReportError::ConverterUnavailable { .. }),
            "got: {err}"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn program_without_output_fails() {
        // `true` accepts any arguments and writes nothing.
        let conv = SofficeConverter::new("true", 5);
        let err = conv.convert(b"PK\x03\x04").await.unwrap_err();
        assert!(matches!(err, ReportError::ConversionFailed { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_reports_status() {
        let conv = SofficeConverter::new("false", 5);
        let err = conv.convert(b"PK\x03\x04").await.unwrap_err();
        assert!(err.to_string().contains("exited with"), "got: {err}");
    }

    #[test]
    fn from_config_uses_settings() {
        let config = ReportConfig::builder()
            .soffice_program("/opt/lo/soffice")
            .conversion_timeout_secs(30)
            .build()
            .unwrap();
        let conv = SofficeConverter::from_config(&config);
        assert_eq!(conv.program, PathBuf::from("/opt/lo/soffice"));
        assert_eq!(conv.timeout_secs, 30);
    }
}
