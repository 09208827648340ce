//! Error types for the reportgen library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ReportError`] — **Fatal**: the run cannot proceed (empty record set,
//!   unreadable template, converter missing) or one record's report failed,
//!   which aborts the whole batch. Returned as `Err(ReportError)` from the
//!   generator entry points.
//!
//! * [`ImageError`] — **Non-fatal**: a single image reference could not be
//!   downloaded or decoded. The image is skipped and the error is kept in
//!   [`crate::output::FillStats`] so callers can list what was left out.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the reportgen library.
///
/// Image-level failures use [`ImageError`] and never abort a report.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The filtered record set has no rows.
    #[error("No records to generate reports for.\nCheck the date, shift and site filters.")]
    EmptyRecordSet,

    /// The record set is not rectangular or has no columns.
    #[error("Invalid record set: {detail}")]
    InvalidRecordSet { detail: String },

    /// A record index outside the table was requested.
    #[error("Record {index} is out of range (table has {total} records)")]
    RecordIndexOutOfRange { index: usize, total: usize },

    /// Template file was not found at the given path.
    #[error("Template not found: '{path}'\nCheck the path exists and is readable.")]
    TemplateNotFound { path: PathBuf },

    /// Process does not have read permission on the template.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The template bytes are not a ZIP container, so cannot be a DOCX.
    #[error("Template '{name}' is not a DOCX file\nFirst bytes: {magic:?}")]
    NotADocx { name: String, magic: [u8; 4] },

    /// The template is a ZIP but the document part could not be parsed.
    #[error("Template '{name}' could not be parsed: {detail}")]
    InvalidTemplate { name: String, detail: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The spreadsheet export could not be fetched.
    #[error("Failed to read sheet from '{url}': {reason}\nIs the sheet shared as \"anyone with the link\"?")]
    SheetFetchFailed { url: String, reason: String },

    /// The CSV export is malformed.
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The filled document could not be serialised back to DOCX.
    #[error("DOCX write failed: {0}")]
    DocxWrite(String),

    /// The external PDF renderer could not be started.
    #[error(
        "PDF converter '{program}' is not available: {detail}\n\
Install LibreOffice or pass --soffice /path/to/soffice."
    )]
    ConverterUnavailable { program: String, detail: String },

    /// The external PDF renderer ran but did not produce a PDF.
    #[error("PDF conversion failed: {detail}")]
    ConversionFailed { detail: String },

    /// The external PDF renderer exceeded the configured timeout.
    #[error("PDF conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    /// Packaging reports into the ZIP archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// One record's report failed; the whole batch was aborted.
    #[error("Report for record {index} ('{filename}') failed: {source}")]
    RecordFailed {
        index: usize,
        filename: String,
        #[source]
        source: Box<ReportError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    /// Index of the record that aborted the batch, if this is a per-record failure.
    pub fn record_index(&self) -> Option<usize> {
        match self {
            ReportError::RecordFailed { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for ReportError {
    fn from(e: zip::result::ZipError) -> Self {
        ReportError::Archive(e.to_string())
    }
}

/// A non-fatal error for a single image reference.
///
/// Collected in [`crate::output::FillStats`]; the report is still produced
/// without the image.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The reference is not an HTTP(S) URL.
    #[error("'{reference}' is not an http(s) image link")]
    InvalidReference { reference: String },

    /// A Google Drive link without a recognisable file id.
    #[error("No Drive file id found in '{url}'")]
    DriveIdMissing { url: String },

    /// Transport-level failure.
    #[error("Download of '{url}' failed: {detail}")]
    DownloadFailed { url: String, detail: String },

    /// The request exceeded the image timeout.
    #[error("Download of '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Server answered with a non-success status.
    #[error("Download of '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The body could not be decoded as an image.
    #[error("'{url}' is not a valid image: {detail}")]
    NotAnImage { url: String, detail: String },

    /// Re-encoding the normalised image failed.
    #[error("Could not encode image from '{url}': {detail}")]
    EncodeFailed { url: String, detail: String },
}

impl ImageError {
    /// The reference the error is about.
    pub fn url(&self) -> &str {
        match self {
            ImageError::InvalidReference { reference } => reference,
            ImageError::DriveIdMissing { url }
            | ImageError::DownloadFailed { url, .. }
            | ImageError::Timeout { url, .. }
            | ImageError::HttpStatus { url, .. }
            | ImageError::NotAnImage { url, .. }
            | ImageError::EncodeFailed { url, .. } => url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_failed_display_names_index_and_cause() {
        let e = ReportError::RecordFailed {
            index: 2,
            filename: "Plaza_2024-01-15_Report.pdf".into(),
            source: Box::new(ReportError::ConversionTimeout { secs: 120 }),
        };
        let msg = e.to_string();
        assert!(msg.contains("record 2"), "got: {msg}");
        assert!(msg.contains("Plaza_2024-01-15_Report.pdf"), "got: {msg}");
        assert!(msg.contains("120s"), "got: {msg}");
        assert_eq!(e.record_index(), Some(2));
    }

    #[test]
    fn empty_record_set_is_descriptive() {
        let msg = ReportError::EmptyRecordSet.to_string();
        assert!(msg.contains("No records"));
        assert_eq!(ReportError::EmptyRecordSet.record_index(), None);
    }

    #[test]
    fn image_error_carries_url() {
        let e = ImageError::HttpStatus {
            url: "https://example.com/a.jpg".into(),
            status: 404,
        };
        assert_eq!(e.url(), "https://example.com/a.jpg");
        assert!(e.to_string().contains("404"));
    }

    #[test]
    fn image_error_serialises() {
        let e = ImageError::Timeout {
            url: "https://example.com/b.png".into(),
            secs: 10,
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("Timeout"));
        assert!(json.contains("example.com"));
    }

    #[test]
    fn fill_stats_compare_image_errors_by_value() {
        let failed = ImageError::HttpStatus {
            url: "https://example.com/a.jpg".into(),
            status: 404,
        };
        let stats = crate::output::FillStats {
            substitutions: 3,
            images_embedded: 1,
            image_errors: vec![failed.clone()],
        };
        assert_eq!(stats.clone(), stats);
        assert_eq!(stats.image_errors[0], failed);
        assert_ne!(stats, crate::output::FillStats::default());
    }
}
