//! Configuration types for report generation.
//!
//! All generation behaviour is controlled through [`ReportConfig`], built via
//! its [`ReportConfigBuilder`]. Keeping every knob in one struct makes it easy
//! to log a run's settings and to build the image fetcher and the PDF
//! converter from the same source.

use crate::error::ReportError;
use crate::form::FormKind;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Configuration for a report run.
///
/// Built via [`ReportConfig::builder()`] or using [`ReportConfig::default()`].
///
/// # Example
/// ```rust
/// use reportgen::{FormKind, ReportConfig};
///
/// let config = ReportConfig::builder()
///     .form(FormKind::Incident)
///     .image_timeout_secs(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.date_field, "Date of Incident");
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Form the records come from. Default: [`FormKind::Monitoring`].
    pub form: FormKind,

    /// Field used as the first part of each report filename. Default: "Site Name".
    pub site_field: String,

    /// Field used as the date part of each report filename. Default: the form's date column.
    pub date_field: String,

    /// Placeholder names that take the image-embedding path instead of text
    /// substitution. Each one is resolved independently.
    /// Default: `["EVIDENCE & ATTACHMENTS - Photos", "Images"]`.
    pub image_placeholders: Vec<String>,

    /// Per-image HTTP timeout in seconds. Default: 10.
    pub image_timeout_secs: u64,

    /// Images wider than this are scaled down (aspect kept). Default: 800 px.
    pub max_image_width: u32,

    /// JPEG quality of normalised images, 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// Display width of images inserted after a body paragraph. Default: 5.0 in.
    pub body_image_width_inches: f64,

    /// Display width of images inserted inside a table cell. Default: 3.0 in.
    pub cell_image_width_inches: f64,

    /// LibreOffice executable used for DOCX → PDF. Default: "soffice".
    pub soffice_program: PathBuf,

    /// Timeout for one DOCX → PDF conversion in seconds. Default: 120.
    pub conversion_timeout_secs: u64,

    /// Timeout for template and sheet downloads in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Optional per-record progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            form: FormKind::Monitoring,
            site_field: "Site Name".to_string(),
            date_field: FormKind::Monitoring.date_field().to_string(),
            image_placeholders: vec![
                FormKind::Incident.image_field().to_string(),
                FormKind::Monitoring.image_field().to_string(),
            ],
            image_timeout_secs: 10,
            max_image_width: 800,
            jpeg_quality: 85,
            body_image_width_inches: 5.0,
            cell_image_width_inches: 3.0,
            soffice_program: PathBuf::from("soffice"),
            conversion_timeout_secs: 120,
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("form", &self.form)
            .field("site_field", &self.site_field)
            .field("date_field", &self.date_field)
            .field("image_placeholders", &self.image_placeholders)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("max_image_width", &self.max_image_width)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("soffice_program", &self.soffice_program)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ReportProgressCallback>"),
            )
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when `placeholder` is one of the reserved image placeholders.
    pub fn is_image_placeholder(&self, placeholder: &str) -> bool {
        self.image_placeholders.iter().any(|p| p == placeholder)
    }
}

/// Builder for [`ReportConfig`].
#[derive(Debug)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    /// Select the form; also points `date_field` at the form's date column.
    pub fn form(mut self, form: FormKind) -> Self {
        self.config.form = form;
        self.config.date_field = form.date_field().to_string();
        self
    }

    pub fn site_field(mut self, field: impl Into<String>) -> Self {
        self.config.site_field = field.into();
        self
    }

    pub fn date_field(mut self, field: impl Into<String>) -> Self {
        self.config.date_field = field.into();
        self
    }

    pub fn image_placeholders<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.image_placeholders = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs.max(1);
        self
    }

    pub fn max_image_width(mut self, px: u32) -> Self {
        self.config.max_image_width = px.max(16);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn body_image_width_inches(mut self, inches: f64) -> Self {
        self.config.body_image_width_inches = inches;
        self
    }

    pub fn cell_image_width_inches(mut self, inches: f64) -> Self {
        self.config.cell_image_width_inches = inches;
        self
    }

    pub fn soffice_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.soffice_program = program.into();
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        if c.site_field.trim().is_empty() || c.date_field.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "site and date fields must be non-empty".into(),
            ));
        }
        for (name, inches) in [
            ("body image width", c.body_image_width_inches),
            ("cell image width", c.cell_image_width_inches),
        ] {
            if !(0.5..=8.5).contains(&inches) {
                return Err(ReportError::InvalidConfig(format!(
                    "{name} must be 0.5–8.5 inches, got {inches}"
                )));
            }
        }
        if c.conversion_timeout_secs == 0 {
            return Err(ReportError::InvalidConfig(
                "conversion timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_monitoring_form() {
        let c = ReportConfig::default();
        assert_eq!(c.date_field, "Date");
        assert_eq!(c.site_field, "Site Name");
        assert!(c.is_image_placeholder("Images"));
        assert!(c.is_image_placeholder("EVIDENCE & ATTACHMENTS - Photos"));
        assert!(!c.is_image_placeholder("Site Name"));
    }

    #[test]
    fn form_switches_date_field() {
        let c = ReportConfig::builder().form(FormKind::Incident).build().unwrap();
        assert_eq!(c.form, FormKind::Incident);
        assert_eq!(c.date_field, "Date of Incident");
    }

    #[test]
    fn explicit_date_field_after_form_wins() {
        let c = ReportConfig::builder()
            .form(FormKind::Incident)
            .date_field("Reported On")
            .build()
            .unwrap();
        assert_eq!(c.date_field, "Reported On");
    }

    #[test]
    fn setters_clamp() {
        let c = ReportConfig::builder()
            .jpeg_quality(0)
            .image_timeout_secs(0)
            .max_image_width(1)
            .build()
            .unwrap();
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.image_timeout_secs, 1);
        assert_eq!(c.max_image_width, 16);
    }

    #[test]
    fn rejects_bad_image_width() {
        let err = ReportConfig::builder()
            .body_image_width_inches(20.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_blank_site_field() {
        assert!(ReportConfig::builder().site_field("  ").build().is_err());
    }
}
