//! Record filters: date range, shift, site.
//!
//! Filters run in that order. `None` or `"All"` means "no constraint". A
//! missing shift or site column is logged and the table passes through
//! unchanged; a date range drops every row whose date does not parse.

use crate::record::{RecordTable, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which records to keep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub shift: Option<String>,
    pub site: Option<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn shift(mut self, shift: impl Into<String>) -> Self {
        self.shift = Some(shift.into());
        self
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Apply every constraint to `table`.
    pub fn apply(
        &self,
        table: &RecordTable,
        date_field: &str,
        shift_field: &str,
        site_field: &str,
    ) -> RecordTable {
        let mut out = table.clone();
        if self.start.is_some() || self.end.is_some() {
            out = filter_by_date_range(&out, date_field, self.start, self.end);
        }
        if let Some(shift) = active(&self.shift) {
            out = filter_by_value(&out, shift_field, shift);
        }
        if let Some(site) = active(&self.site) {
            out = filter_by_value(&out, site_field, site);
        }
        debug!("Filter kept {} of {} records", out.len(), table.len());
        out
    }
}

fn active(v: &Option<String>) -> Option<&str> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "All")
}

/// Keep rows whose date lies in `[start, end]` (either bound optional).
pub fn filter_by_date_range(
    table: &RecordTable,
    date_field: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> RecordTable {
    if !table.has_column(date_field) {
        warn!("'{}' column not found; date filter matches nothing", date_field);
    }
    table.retain(|r| {
        let Some(date) = r.get(date_field).and_then(value_date) else {
            return false;
        };
        start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
    })
}

/// Keep rows whose `field` equals `wanted` exactly.
pub fn filter_by_value(table: &RecordTable, field: &str, wanted: &str) -> RecordTable {
    if !table.has_column(field) {
        warn!("'{}' column not found; filter ignored", field);
        return table.clone();
    }
    table.retain(|r| r.text(field) == wanted)
}

fn value_date(v: &Value) -> Option<NaiveDate> {
    match v {
        Value::Date(d) => Some(*d),
        Value::Text(s) => parse_date(s),
        _ => None,
    }
}

/// Parse the date formats form exports use.
///
/// `YYYY-MM-DD`, `YYYY/MM/DD`, then `M/D/YYYY` (falling back to `D/M/YYYY`),
/// each optionally followed by a time after a space or `T`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw
        .trim()
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or("");
    ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
