//! Result types returned by the generator.

use crate::error::ImageError;
use crate::pipeline::matcher::MatchResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the filler did to one record's document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillStats {
    /// Text placeholder occurrences replaced.
    pub substitutions: usize,
    /// Images inserted into the document.
    pub images_embedded: usize,
    /// Image references that were skipped, with the reason.
    pub image_errors: Vec<ImageError>,
}

/// One rendered report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedReport {
    /// 0-based position of the record in the filtered table.
    pub record_index: usize,
    /// Collision-free filename within the batch.
    pub filename: String,
    /// PDF bytes.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub stats: FillStats,
}

/// Per-record summary kept after the PDF bytes moved into the archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub record_index: usize,
    pub filename: String,
    pub pdf_len: usize,
    pub stats: FillStats,
}

/// A packaged batch: one PDF per record inside a DEFLATE ZIP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// ZIP bytes.
    #[serde(skip)]
    pub archive: Vec<u8>,
    /// Number of records processed (equals the number of archive entries).
    pub report_count: usize,
    /// Archive entry names in record order.
    pub filenames: Vec<String>,
    pub reports: Vec<RecordSummary>,
}

/// Either a single PDF (exactly one record) or an archive (more than one).
#[derive(Debug, Clone)]
pub enum ReportOutput {
    Single(GeneratedReport),
    Archive(BatchOutput),
}

impl ReportOutput {
    /// The bytes to write: the PDF or the ZIP.
    pub fn bytes(&self) -> &[u8] {
        match self {
            ReportOutput::Single(r) => &r.pdf,
            ReportOutput::Archive(b) => &b.archive,
        }
    }

    /// Number of reports produced.
    pub fn report_count(&self) -> usize {
        match self {
            ReportOutput::Single(_) => 1,
            ReportOutput::Archive(b) => b.report_count,
        }
    }

    /// Names of the generated PDFs.
    pub fn filenames(&self) -> Vec<&str> {
        match self {
            ReportOutput::Single(r) => vec![r.filename.as_str()],
            ReportOutput::Archive(b) => b.filenames.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, ReportOutput::Archive(_))
    }
}

/// Placeholders found in a template and how they map onto the data columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInspection {
    pub placeholders: BTreeSet<String>,
    pub matches: MatchResult,
    /// Reserved image placeholders present in the template.
    pub image_placeholders: Vec<String>,
}

impl TemplateInspection {
    pub fn all_matched(&self) -> bool {
        self.matches.unmatched.is_empty()
    }
}
