//! Tabular record model: one [`Record`] per inspection or incident event.
//!
//! Values keep the little type information a spreadsheet export carries
//! (integers, floats, dates, free text) so callers can format them, but every
//! consumer in this crate ultimately renders them with [`Value`]'s `Display`,
//! which never produces `None`, `NaN`, or `null` for a missing cell.

use crate::error::ReportError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Blank cell.
    #[default]
    Empty,
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    /// Infer a value from a raw CSV cell.
    ///
    /// Blank (after trimming) → `Empty`. A cell becomes `Integer` or `Float`
    /// only when the number prints back exactly as written; phone numbers,
    /// zero-padded codes, trailing zeros and exponents stay `Text`, as do
    /// dates, so the sheet's own formatting survives into the report.
    pub fn infer(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            if i.to_string() == trimmed {
                return Value::Integer(i);
            }
        } else if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() && f.to_string() == trimmed {
                return Value::Float(f);
            }
        }
        Value::Text(raw.to_string())
    }

    /// True for blank cells, whitespace-only text, and NaN/inf floats.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Float(f) => !f.is_finite(),
            Value::Text(s) => s.trim().is_empty(),
            Value::Integer(_) | Value::Date(_) => false,
        }
    }

    /// The rendered text, or `None` when the value is empty.
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_finite() => write!(f, "{x}"),
            Value::Float(_) => Ok(()),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// One row: an ordered mapping from field name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Build a record from `(field, value)` pairs, keeping their order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a field by exact name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v)
    }

    /// Rendered text of a field; missing and empty fields render as `""`.
    pub fn text(&self, field: &str) -> String {
        self.get(field).map(Value::to_string).unwrap_or_default()
    }

    /// Non-empty rendered text of a field.
    pub fn non_empty(&self, field: &str) -> Option<String> {
        self.get(field).and_then(Value::as_text)
    }

    /// Fields in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A rectangular table of records sharing one column list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordTable {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RecordTable {
    /// Build a table from a header and value rows.
    ///
    /// # Errors
    /// [`ReportError::InvalidRecordSet`] when there are rows but no columns,
    /// a column name repeats, or a row's width differs from the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ReportError> {
        if columns.is_empty() && !rows.is_empty() {
            return Err(ReportError::InvalidRecordSet {
                detail: "rows present but the table has no columns".into(),
            });
        }
        let mut seen = BTreeSet::new();
        for c in &columns {
            if !seen.insert(c.as_str()) {
                return Err(ReportError::InvalidRecordSet {
                    detail: format!("duplicate column '{c}'"),
                });
            }
        }
        let mut records = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ReportError::InvalidRecordSet {
                    detail: format!(
                        "row {i} has {} values but there are {} columns",
                        row.len(),
                        columns.len()
                    ),
                });
            }
            records.push(Record {
                fields: columns.iter().cloned().zip(row).collect(),
            });
        }
        Ok(Self { columns, records })
    }

    /// Build a table from records that were constructed independently.
    ///
    /// The column list is the first record's field order; every record must
    /// carry exactly the same fields.
    pub fn from_records(records: Vec<Record>) -> Result<Self, ReportError> {
        let columns: Vec<String> = records
            .first()
            .map(|r| r.iter().map(|(k, _)| k.to_string()).collect())
            .unwrap_or_default();
        let rows = records
            .into_iter()
            .map(|r| {
                let names: Vec<&str> = r.iter().map(|(k, _)| k).collect();
                if names != columns.iter().map(String::as_str).collect::<Vec<_>>() {
                    return Err(ReportError::InvalidRecordSet {
                        detail: format!("record fields {names:?} differ from columns {columns:?}"),
                    });
                }
                Ok(r.fields.into_iter().map(|(_, v)| v).collect())
            })
            .collect::<Result<Vec<Vec<Value>>, _>>()?;
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Keep only the records for which `keep` returns true.
    pub fn retain(&self, mut keep: impl FnMut(&Record) -> bool) -> RecordTable {
        RecordTable {
            columns: self.columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Sorted distinct non-empty values of a column (e.g. sites or shifts).
    ///
    /// Returns an empty list when the column does not exist.
    pub fn unique_values(&self, column: &str) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.non_empty(column))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_types() {
        assert_eq!(Value::infer(""), Value::Empty);
        assert_eq!(Value::infer("   "), Value::Empty);
        assert_eq!(Value::infer("42"), Value::Integer(42));
        assert_eq!(Value::infer("3.5"), Value::Float(3.5));
        assert_eq!(Value::infer("2024/01/15"), Value::Text("2024/01/15".into()));
        assert_eq!(Value::infer("NaN"), Value::Text("NaN".into()));
    }

    #[test]
    fn numeric_looking_cells_render_as_written() {
        for cell in ["+919876543210", "007", "4.50", "1e3", "4.0", "99999999999999999999"] {
            assert_eq!(Value::infer(cell), Value::Text(cell.into()), "cell {cell}");
            assert_eq!(Value::infer(cell).to_string(), cell);
        }
        assert_eq!(Value::infer("-12"), Value::Integer(-12));
        assert_eq!(Value::infer(" 7 "), Value::Integer(7));
    }

    #[test]
    fn empty_values_render_blank() {
        assert_eq!(Value::Empty.to_string(), "");
        assert_eq!(Value::Float(f64::NAN).to_string(), "");
        assert!(Value::Float(f64::NAN).is_empty());
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()).to_string(),
            "2024-01-15"
        );
    }

    #[test]
    fn record_lookup() {
        let r = Record::from_pairs([("Site Name", Value::from("Plaza")), ("Shift", Value::Empty)]);
        assert_eq!(r.text("Site Name"), "Plaza");
        assert_eq!(r.text("Shift"), "");
        assert_eq!(r.text("Missing"), "");
        assert_eq!(r.non_empty("Shift"), None);
    }

    #[test]
    fn table_rejects_ragged_rows() {
        let err = RecordTable::new(
            vec!["A".into(), "B".into()],
            vec![vec![Value::from("x")]],
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecordSet { .. }));
    }

    #[test]
    fn table_rejects_duplicate_columns() {
        let err = RecordTable::new(vec!["A".into(), "A".into()], vec![]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn from_records_requires_same_fields() {
        let a = Record::from_pairs([("A", "1")]);
        let b = Record::from_pairs([("B", "2")]);
        assert!(RecordTable::from_records(vec![a.clone(), b]).is_err());
        let t = RecordTable::from_records(vec![a.clone(), a]).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.columns(), ["A".to_string()]);
    }

    #[test]
    fn unique_values_sorted_and_non_empty() {
        let t = RecordTable::new(
            vec!["Shift".into()],
            vec![
                vec![Value::from("Night")],
                vec![Value::Empty],
                vec![Value::from("Day")],
                vec![Value::from("Night")],
            ],
        )
        .unwrap();
        assert_eq!(t.unique_values("Shift"), vec!["Day", "Night"]);
        assert!(t.unique_values("Nope").is_empty());
    }
}
