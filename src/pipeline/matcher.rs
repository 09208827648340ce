//! Reconcile template placeholders with data field names.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Placeholder → field mapping for one template and one column list.
///
/// Depends only on names, never on record values, so it is computed once per
/// batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: BTreeMap<String, String>,
    /// Sorted.
    pub unmatched: Vec<String>,
}

impl MatchResult {
    /// The field a placeholder resolves to.
    pub fn field_for(&self, placeholder: &str) -> Option<&str> {
        self.matched.get(placeholder).map(String::as_str)
    }
}

/// Exact match first, then the first field whose lowercase form equals the
/// placeholder's lowercase form.
pub fn match_placeholders<S: AsRef<str>>(
    placeholders: &BTreeSet<String>,
    field_names: &[S],
) -> MatchResult {
    let mut result = MatchResult::default();
    for placeholder in placeholders {
        let exact = field_names.iter().find(|f| f.as_ref() == placeholder);
        let hit = exact.or_else(|| {
            let lower = placeholder.to_lowercase();
            field_names.iter().find(|f| f.as_ref().to_lowercase() == lower)
        });
        match hit {
            Some(field) => {
                result
                    .matched
                    .insert(placeholder.clone(), field.as_ref().to_string());
            }
            None => result.unmatched.push(placeholder.clone()),
        }
    }
    debug!(
        "Matched {} placeholders, {} unmatched",
        result.matched.len(),
        result.unmatched.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_then_case_insensitive() {
        let r = match_placeholders(
            &set(&["Site Name", "date", "Foo"]),
            &["Site Name", "Date", "Shift"],
        );
        assert_eq!(r.field_for("Site Name"), Some("Site Name"));
        assert_eq!(r.field_for("date"), Some("Date"));
        assert_eq!(r.unmatched, vec!["Foo"]);
    }

    #[test]
    fn exact_wins_over_case_variant() {
        let r = match_placeholders(&set(&["shift"]), &["Shift", "shift"]);
        assert_eq!(r.field_for("shift"), Some("shift"));
    }

    #[test]
    fn first_case_variant_in_field_order() {
        let r = match_placeholders(&set(&["SHIFT"]), &["Shift", "shift"]);
        assert_eq!(r.field_for("SHIFT"), Some("Shift"));
    }

    #[test]
    fn partitions_the_placeholder_set() {
        let placeholders = set(&["A", "b", "C", "d", "Zed"]);
        let r = match_placeholders(&placeholders, &["a", "B", "d"]);
        let mut all: BTreeSet<String> = r.matched.keys().cloned().collect();
        for u in &r.unmatched {
            assert!(!r.matched.contains_key(u));
            all.insert(u.clone());
        }
        assert_eq!(all, placeholders);
        assert_eq!(r.unmatched, vec!["C", "Zed"]);
    }

    #[test]
    fn empty_inputs() {
        let r = match_placeholders(&BTreeSet::new(), &["A"]);
        assert_eq!(r, MatchResult::default());
        let r = match_placeholders(&set(&["A"]), &[] as &[&str]);
        assert_eq!(r.unmatched, vec!["A"]);
    }
}
