//! Pipeline stages for template-driven report generation.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the two I/O-bound stages (image fetching, PDF
//! conversion) can be swapped behind a trait.
//!
//! ## Data Flow
//!
//! ```text
//! template ──▶ matcher ──▶ fill ──────────▶ pdf
//! (DOCX)       (names)     (text, images)   (soffice)
//!                            ▲
//!                          images
//!                          (HTTP, Drive)
//! ```
//!
//! 1. [`template`] — load the DOCX once, extract `{Name}` placeholders
//! 2. [`matcher`]  — reconcile placeholders with the record's field names
//! 3. [`fill`]     — substitute values and embed images in a fresh parse
//! 4. [`images`]   — fetch and normalise image references; the only stage
//!    with per-record network I/O
//! 5. [`pdf`]      — render the filled DOCX to PDF with LibreOffice
//!
//! [`walk`] holds the paragraph and table traversal shared by the others.

pub mod fill;
pub mod images;
pub mod matcher;
pub mod pdf;
pub mod template;
pub mod walk;
