//! Batch report generation entry points.
//!
//! [`ReportGenerator`] drives the pipeline for every record of a filtered
//! table: fresh template parse, text and image filling, PDF conversion,
//! collision-free naming, ZIP packaging. Records are processed one at a time;
//! the first failing record aborts the batch and no archive is produced.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::filter::RecordFilter;
use crate::naming::{internal_report_filename, report_filename, FilenameAllocator};
use crate::internal;
use crate::output::{
    BatchOutput, FillStats, GeneratedReport, RecordSummary, ReportOutput, TemplateInspection,
};
use crate::pipeline::fill::{fill_document, pack_docx, skipped_images, takes_images};
use crate::pipeline::images::{HttpImageFetcher, ImageSource};
use crate::pipeline::matcher::{match_placeholders, MatchResult};
use crate::pipeline::pdf::{PdfConverter, SofficeConverter};
use crate::pipeline::template::Template;
use crate::record::{Record, RecordTable};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// The fixed-layout internal report, rendered.
#[derive(Debug, Clone)]
pub struct InternalReport {
    pub filename: String,
    pub pdf: Vec<u8>,
    pub record_count: usize,
}

/// Drives report generation with a given image source and PDF converter.
pub struct ReportGenerator<I = HttpImageFetcher, C = SofficeConverter> {
    config: ReportConfig,
    images: I,
    converter: C,
    today: Option<NaiveDate>,
}

impl ReportGenerator<HttpImageFetcher, SofficeConverter> {
    /// HTTP image fetching and LibreOffice conversion, both from `config`.
    pub fn from_config(config: ReportConfig) -> Result<Self, ReportError> {
        let images = HttpImageFetcher::from_config(&config)?;
        let converter = SofficeConverter::from_config(&config);
        Ok(Self::new(config, images, converter))
    }
}

impl<I: ImageSource, C: PdfConverter> ReportGenerator<I, C> {
    pub fn new(config: ReportConfig, images: I, converter: C) -> Self {
        Self {
            config,
            images,
            converter,
            today: None,
        }
    }

    /// Pin the date used when a record has no date (defaults to the local date).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Placeholders of `template` and how they map onto `columns`.
    pub fn inspect<S: AsRef<str>>(
        &self,
        template: &Template,
        columns: &[S],
    ) -> Result<TemplateInspection, ReportError> {
        let placeholders = template.placeholders()?;
        let matches = match_placeholders(&placeholders, columns);
        let image_placeholders = placeholders
            .iter()
            .filter(|p| takes_images(p, &matches, &self.config))
            .cloned()
            .collect();
        if !matches.unmatched.is_empty() {
            info!(
                "{} placeholder(s) have no matching column: {:?}",
                matches.unmatched.len(),
                matches.unmatched
            );
        }
        Ok(TemplateInspection {
            placeholders,
            matches,
            image_placeholders,
        })
    }

    /// Generate the report for one record of `table`.
    pub async fn generate_report(
        &self,
        template: &Template,
        table: &RecordTable,
        index: usize,
    ) -> Result<GeneratedReport, ReportError> {
        if table.is_empty() {
            return Err(ReportError::EmptyRecordSet);
        }
        let record = table.get(index).ok_or(ReportError::RecordIndexOutOfRange {
            index,
            total: table.len(),
        })?;
        let matches = self.matches_for(template, table)?;
        let filename = report_filename(
            record,
            index,
            &self.config.site_field,
            &self.config.date_field,
            self.today(),
        );
        self.render_record(template, record, index, 1, filename, &matches)
            .await
    }

    /// Generate one PDF per record and package them into a ZIP archive.
    ///
    /// # Errors
    /// [`ReportError::EmptyRecordSet`] before any work for an empty table;
    /// [`ReportError::RecordFailed`] as soon as one record fails.
    pub async fn generate_archive(
        &self,
        template: &Template,
        table: &RecordTable,
    ) -> Result<BatchOutput, ReportError> {
        let reports = self.generate_all(template, table).await?;
        let archive = build_archive(&reports)?;
        info!(
            "Packaged {} report(s) into {} byte archive",
            reports.len(),
            archive.len()
        );
        Ok(BatchOutput {
            archive,
            report_count: reports.len(),
            filenames: reports.iter().map(|r| r.filename.clone()).collect(),
            reports: reports
                .into_iter()
                .map(|r| RecordSummary {
                    record_index: r.record_index,
                    filename: r.filename,
                    pdf_len: r.pdf.len(),
                    stats: r.stats,
                })
                .collect(),
        })
    }

    /// A single PDF for exactly one record, an archive for more.
    pub async fn generate(
        &self,
        template: &Template,
        table: &RecordTable,
    ) -> Result<ReportOutput, ReportError> {
        if table.len() == 1 {
            let mut reports = self.generate_all(template, table).await?;
            return reports
                .pop()
                .map(ReportOutput::Single)
                .ok_or_else(|| ReportError::Internal("single report missing".into()));
        }
        self.generate_archive(template, table)
            .await
            .map(ReportOutput::Archive)
    }

    /// Render the fixed-layout internal report for `table`.
    ///
    /// `filter` only feeds the file name; apply it to the table beforehand.
    pub async fn generate_internal(
        &self,
        table: &RecordTable,
        filter: &RecordFilter,
        generated_at: NaiveDateTime,
    ) -> Result<InternalReport, ReportError> {
        if table.is_empty() {
            return Err(ReportError::EmptyRecordSet);
        }
        let start = Instant::now();
        let kind = self.config.form;
        let image_field = kind.image_field();

        let mut images = Vec::with_capacity(table.len());
        for (i, record) in table.records().iter().enumerate() {
            let batch = match record.non_empty(image_field) {
                Some(cell) => self.images.fetch_all(&cell).await,
                None => Default::default(),
            };
            self.report_skipped(i, &FillStats {
                image_errors: batch.errors,
                ..FillStats::default()
            });
            images.push(batch.images);
        }

        let docx = internal::build_internal_report(table, kind, &images, &self.config, generated_at);
        let pdf = self.converter.convert(&pack_docx(docx)?).await?;
        let filename = internal_report_filename(
            kind,
            filter.start,
            filter.end,
            filter.shift.as_deref(),
            generated_at,
        );
        info!(
            "Internal report {} ({} records, {} bytes) in {}ms",
            filename,
            table.len(),
            pdf.len(),
            start.elapsed().as_millis()
        );
        Ok(InternalReport {
            filename,
            pdf,
            record_count: table.len(),
        })
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn matches_for(
        &self,
        template: &Template,
        table: &RecordTable,
    ) -> Result<MatchResult, ReportError> {
        let placeholders = template.placeholders()?;
        let matches = match_placeholders(&placeholders, table.columns());
        debug!(
            "Template '{}': {} matched, {} unmatched",
            template.name(),
            matches.matched.len(),
            matches.unmatched.len()
        );
        Ok(matches)
    }

    async fn generate_all(
        &self,
        template: &Template,
        table: &RecordTable,
    ) -> Result<Vec<GeneratedReport>, ReportError> {
        if table.is_empty() {
            return Err(ReportError::EmptyRecordSet);
        }
        let total = table.len();
        let started = Instant::now();
        info!("Generating {} report(s) from '{}'", total, template.name());

        // Same template and columns for every record.
        let matches = self.matches_for(template, table)?;
        let today = self.today();
        let mut names = FilenameAllocator::new();

        if let Some(cb) = &self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let mut reports = Vec::with_capacity(total);
        for (index, record) in table.records().iter().enumerate() {
            let base = report_filename(
                record,
                index,
                &self.config.site_field,
                &self.config.date_field,
                today,
            );
            let filename = names.allocate(&base);
            let report = self
                .render_record(template, record, index, total, filename, &matches)
                .await?;
            reports.push(report);
        }

        if let Some(cb) = &self.config.progress_callback {
            cb.on_batch_complete(total);
        }
        info!(
            "Generated {} report(s) in {}ms",
            total,
            started.elapsed().as_millis()
        );
        Ok(reports)
    }

    async fn render_record(
        &self,
        template: &Template,
        record: &Record,
        index: usize,
        total: usize,
        filename: String,
        matches: &MatchResult,
    ) -> Result<GeneratedReport, ReportError> {
        if let Some(cb) = &self.config.progress_callback {
            cb.on_record_start(index, total, &filename);
        }
        debug!("Record {}/{} → {}", index + 1, total, filename);

        match self.render_pdf(template, record, index, matches).await {
            Ok((pdf, stats)) => {
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_record_complete(index, total, &filename, pdf.len());
                }
                Ok(GeneratedReport {
                    record_index: index,
                    filename,
                    pdf,
                    stats,
                })
            }
            Err(e) => {
                warn!("Record {} ('{}') failed: {}", index, filename, e);
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_record_error(index, total, &e.to_string());
                }
                Err(ReportError::RecordFailed {
                    index,
                    filename,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn render_pdf(
        &self,
        template: &Template,
        record: &Record,
        index: usize,
        matches: &MatchResult,
    ) -> Result<(Vec<u8>, FillStats), ReportError> {
        let docx = template.open()?;
        let filled = fill_document(docx, record, matches, &self.images, &self.config).await;
        self.report_skipped(index, &filled.stats);
        let stats = filled.stats.clone();
        let bytes = filled.to_bytes()?;
        let pdf = self.converter.convert(&bytes).await?;
        Ok((pdf, stats))
    }

    fn report_skipped(&self, index: usize, stats: &FillStats) {
        if let Some(cb) = &self.config.progress_callback {
            for (url, reason) in skipped_images(stats) {
                cb.on_image_skipped(index, url, &reason);
            }
        }
    }
}

/// ZIP (DEFLATE) with one entry per report, in record order.
pub fn build_archive(reports: &[GeneratedReport]) -> Result<Vec<u8>, ReportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for report in reports {
        zip.start_file(report.filename.as_str(), options)?;
        zip.write_all(&report.pdf)
            .map_err(|e| ReportError::Archive(format!("{}: {}", report.filename, e)))?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Write bytes to `path`, creating parent directories.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_output(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), ReportError> {
    let path = path.as_ref();
    let fail = |source: std::io::Error| ReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp, path).await.map_err(fail)?;
    Ok(())
}

/// Synchronous wrapper around [`ReportGenerator::generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync<I: ImageSource, C: PdfConverter>(
    generator: &ReportGenerator<I, C>,
    template: &Template,
    table: &RecordTable,
) -> Result<ReportOutput, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generator.generate(template, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, body: &[u8]) -> GeneratedReport {
        GeneratedReport {
            record_index: 0,
            filename: name.to_string(),
            pdf: body.to_vec(),
            stats: FillStats::default(),
        }
    }

    #[test]
    fn archive_entries_in_order() {
        let bytes = build_archive(&[report("b.pdf", b"%PDF-b"), report("a.pdf", b"%PDF-a")]).unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 2);
        assert_eq!(zip.by_index(0).unwrap().name(), "b.pdf");
        let entry = zip.by_name("a.pdf").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
    }

    #[tokio::test]
    async fn write_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/report.pdf");
        write_output(&path, b"%PDF-1.7").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
        assert!(!dir.path().join("nested/out/report.pdf.tmp").exists());
    }
}
