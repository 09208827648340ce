//! Record source: CSV exports of the form-response spreadsheet.
//!
//! Google Sheets publishes any sheet shared as "anyone with the link" at a CSV
//! export URL, so no API credentials are needed. Local CSV files (a manual
//! "Download as CSV") go through the same parser.

use crate::error::ReportError;
use crate::form::FormKind;
use crate::record::{RecordTable, Value};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A published Google Sheet tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSource {
    pub sheet_id: String,
    /// Tab id; `"0"` is the first tab.
    pub gid: String,
}

impl SheetSource {
    pub fn new(sheet_id: impl Into<String>, gid: impl Into<String>) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            gid: gid.into(),
        }
    }

    /// The public CSV export URL.
    pub fn csv_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
            self.sheet_id, self.gid
        )
    }
}

/// Download and parse a sheet's CSV export.
pub async fn fetch_sheet(source: &SheetSource, timeout_secs: u64) -> Result<RecordTable, ReportError> {
    let url = source.csv_url();
    info!("Reading sheet {} (gid {})", source.sheet_id, source.gid);

    let fail = |reason: String| ReportError::SheetFetchFailed {
        url: url.clone(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client.get(&url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReportError::DownloadTimeout {
                url: url.clone(),
                secs: timeout_secs,
            }
        } else {
            fail(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let body = response.bytes().await.map_err(|e| fail(e.to_string()))?;

    // A private sheet redirects to the sign-in page, which is HTML.
    if body.trim_ascii_start().starts_with(b"<") {
        return Err(fail("received an HTML page instead of CSV".into()));
    }
    parse_csv(&body)
}

/// Read a CSV export from disk.
pub async fn read_csv_file(path: &Path) -> Result<RecordTable, ReportError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ReportError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ReportError::CsvParse(format!("{}: {}", path.display(), e)),
    })?;
    parse_csv(&bytes)
}

/// Parse CSV bytes: first row is the header, cell types are inferred.
///
/// Short rows are padded with empty values and long rows truncated, as
/// spreadsheet exports drop trailing empty cells inconsistently. Repeated
/// header names get a `.1`, `.2`, … suffix.
pub fn parse_csv(bytes: &[u8]) -> Result<RecordTable, ReportError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ReportError::CsvParse(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();
    let columns = dedupe_columns(headers);

    let mut rows = Vec::new();
    for result in reader.records() {
        let rec = result.map_err(|e| ReportError::CsvParse(e.to_string()))?;
        if rec.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let mut row: Vec<Value> = rec.iter().take(columns.len()).map(Value::infer).collect();
        row.resize(columns.len(), Value::Empty);
        rows.push(row);
    }
    debug!("Parsed {} rows x {} columns", rows.len(), columns.len());
    RecordTable::new(columns, rows)
}

fn dedupe_columns(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|h| {
            let n = seen.entry(h.clone()).or_insert(0);
            let name = if *n == 0 { h } else { format!("{}.{}", h, n) };
            *n += 1;
            name
        })
        .collect()
}

/// Expected columns of `kind` that the table lacks; each one is logged.
pub fn missing_columns(table: &RecordTable, kind: FormKind) -> Vec<String> {
    let missing: Vec<String> = kind
        .expected_columns()
        .iter()
        .filter(|c| !table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        warn!("Missing columns for {} form: {:?}", kind, missing);
    }
    missing
}
