//! # reportgen
//!
//! Turn inspection and incident form responses into PDF reports.
//!
//! ## Why this crate?
//!
//! Field supervisors record site visits and incidents in a spreadsheet-backed
//! form. Clients want one polished PDF per visit in *their* layout; the office
//! wants one audit report covering a date range. This crate fills a
//! user-supplied DOCX template per record (text placeholders and embedded
//! photos), renders it with LibreOffice, and packages the batch into a ZIP
//! with collision-free names.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CSV / Google Sheet
//!  │
//!  ├─ 1. Source    parse rows into a RecordTable, filter by date/shift/site
//!  ├─ 2. Template  load DOCX once, extract {Name} placeholders
//!  ├─ 3. Match     placeholders → columns (exact, then case-insensitive)
//!  ├─ 4. Fill      per record: substitute values, embed Drive photos
//!  ├─ 5. Convert   DOCX → PDF via soffice --headless
//!  └─ 6. Package   one PDF, or a ZIP of PDFs named {site}_{date}_Report.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reportgen::{parse_csv, ReportConfig, ReportGenerator, ReportOutput, Template};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = parse_csv(&std::fs::read("responses.csv")?)?;
//!     let template = Template::load("client_template.docx", 60).await?;
//!     let generator = ReportGenerator::from_config(ReportConfig::default())?;
//!
//!     match generator.generate(&template, &table).await? {
//!         ReportOutput::Single(r) => std::fs::write(&r.filename, &r.pdf)?,
//!         ReportOutput::Archive(b) => std::fs::write("reports.zip", &b.archive)?,
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `reportgen` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! reportgen = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod filter;
pub mod form;
pub mod generate;
pub mod internal;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod sheets;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ReportConfig, ReportConfigBuilder};
pub use error::{ImageError, ReportError};
pub use filter::{parse_date, RecordFilter};
pub use form::FormKind;
pub use generate::{build_archive, generate_sync, write_output, InternalReport, ReportGenerator};
pub use output::{
    BatchOutput, FillStats, GeneratedReport, RecordSummary, ReportOutput, TemplateInspection,
};
pub use pipeline::images::{EncodedImage, HttpImageFetcher, ImageBatch, ImageSource};
pub use pipeline::matcher::{match_placeholders, MatchResult};
pub use pipeline::pdf::{PdfConverter, SofficeConverter};
pub use pipeline::template::{extract_placeholders, Template};
pub use progress::{NoopProgressCallback, ProgressCallback, ReportProgressCallback};
pub use record::{Record, RecordTable, Value};
pub use sheets::{fetch_sheet, missing_columns, parse_csv, read_csv_file, SheetSource};
