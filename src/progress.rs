//! Progress-callback trait for per-record generation events.
//!
//! Inject an [`Arc<dyn ReportProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to receive events
//! as the generator works through a batch. The CLI uses it to drive a
//! terminal progress bar; a service could forward the same events to a
//! websocket or a job table.
//!
//! # Example
//!
//! ```rust
//! use reportgen::{ReportConfig, ReportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ReportProgressCallback for CountingCallback {
//!     fn on_record_complete(&self, index: usize, total: usize, filename: &str, pdf_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} bytes)", index + 1, total, filename, pdf_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ReportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the generator as it processes each record.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Record indices are 0-based positions in the filtered
/// table.
pub trait ReportProgressCallback: Send + Sync {
    /// Called once before the first record, after input validation passed.
    fn on_batch_start(&self, total_records: usize) {
        let _ = total_records;
    }

    /// Called before a record's document is filled.
    fn on_record_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called after a record's PDF was produced.
    fn on_record_complete(&self, index: usize, total: usize, filename: &str, pdf_len: usize) {
        let _ = (index, total, filename, pdf_len);
    }

    /// Called when a record fails; the batch aborts right after.
    fn on_record_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called for every image reference that was skipped.
    fn on_image_skipped(&self, index: usize, url: &str, error: &str) {
        let _ = (index, url, error);
    }

    /// Called once after the last record succeeded.
    fn on_batch_complete(&self, total_records: usize) {
        let _ = total_records;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn ReportProgressCallback>;
