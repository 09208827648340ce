//! Report and archive file names.
//!
//! Per-record names are `{site}_{date}_Report.pdf`. Several visits to the same
//! site on the same day are common, so [`FilenameAllocator`] suffixes repeats
//! with `_1`, `_2`, … before the extension.

use crate::form::FormKind;
use crate::record::Record;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;

const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace characters that are illegal in file names with `_`, then trim.
pub fn sanitize_filename(s: &str) -> String {
    s.chars()
        .map(|c| if ILLEGAL.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Base file name for one record, before collision handling.
///
/// A blank or missing site falls back to `Site_{index+1}`; a blank or missing
/// date falls back to `today`. Slashes in the date become dashes.
pub fn report_filename(
    record: &Record,
    index: usize,
    site_field: &str,
    date_field: &str,
    today: NaiveDate,
) -> String {
    let site = record
        .non_empty(site_field)
        .map(|s| sanitize_filename(&s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Site_{}", index + 1));
    let date = record
        .non_empty(date_field)
        .map(|d| sanitize_filename(&d.trim().replace('/', "-")))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    format!("{}_{}_Report.pdf", site, date)
}

/// Hands out names that are unique within one batch.
#[derive(Debug, Default)]
pub struct FilenameAllocator {
    used: HashSet<String>,
}

impl FilenameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `base` if unused, else `stem_1.ext`, `stem_2.ext`, … whichever is free first.
    pub fn allocate(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let (stem, ext) = match base.rfind('.') {
            Some(dot) => base.split_at(dot),
            None => (base, ""),
        };
        let mut counter = 1usize;
        loop {
            let candidate = format!("{}_{}{}", stem, counter, ext);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Name of the fixed-layout internal report.
///
/// `SGV_{label}_{YYYYMMDD}_to_{YYYYMMDD}{_shift}_{YYYYMMDD_HHMMSS}.pdf`, with
/// `all_dates` in place of the range when either end is missing.
pub fn internal_report_filename(
    kind: FormKind,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    shift: Option<&str>,
    now: NaiveDateTime,
) -> String {
    let range = match (start, end) {
        (Some(s), Some(e)) => format!("{}_to_{}", s.format("%Y%m%d"), e.format("%Y%m%d")),
        _ => "all_dates".to_string(),
    };
    let shift = shift
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
        .map(|s| format!("_{}", sanitize_filename(s)))
        .unwrap_or_default();
    format!(
        "SGV_{}_{}{}_{}.pdf",
        kind.report_label(),
        range,
        shift,
        now.format("%Y%m%d_%H%M%S")
    )
}

/// Name of the ZIP holding per-record client reports.
pub fn archive_filename(kind: FormKind, now: NaiveDateTime) -> String {
    format!("{}_{}.zip", kind.archive_prefix(), now.format("%Y%m%d_%H%M%S"))
}

/// Site label split into its parts: `"4-311-DLF SCO-84"` → zone `4`, unit
/// `311`, site `DLF SCO-84`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteName {
    pub zone: String,
    pub unit: String,
    pub site: String,
}

/// Split a site label on the first two dashes.
///
/// `"4-Plaza"` has a zone but no unit; a label without dashes is all site.
pub fn parse_site_name(label: &str) -> SiteName {
    let parts: Vec<&str> = label.splitn(3, '-').collect();
    match parts.as_slice() {
        [zone, unit, site] => SiteName {
            zone: zone.trim().to_string(),
            unit: unit.trim().to_string(),
            site: site.trim().to_string(),
        },
        [zone, site] => SiteName {
            zone: zone.trim().to_string(),
            unit: String::new(),
            site: site.trim().to_string(),
        },
        _ => SiteName {
            zone: String::new(),
            unit: String::new(),
            site: label.trim().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_filename(" A<B>C:D\"E/F\\G|H?I*J "), "A_B_C_D_E_F_G_H_I_J");
    }

    #[test]
    fn basic_report_filename() {
        let r = Record::from_pairs([
            ("Site Name", Value::from("DLF SCO-84")),
            ("Date", Value::from("2024-01-15")),
        ]);
        assert_eq!(
            report_filename(&r, 0, "Site Name", "Date", today()),
            "DLF SCO-84_2024-01-15_Report.pdf"
        );
    }

    #[test]
    fn slashes_and_fallbacks() {
        let r = Record::from_pairs([
            ("Site Name", Value::from("Tower A/B")),
            ("Date", Value::from("1/15/2024")),
        ]);
        assert_eq!(
            report_filename(&r, 0, "Site Name", "Date", today()),
            "Tower A_B_1-15-2024_Report.pdf"
        );

        let blank = Record::from_pairs([("Site Name", Value::Empty), ("Date", Value::Empty)]);
        assert_eq!(
            report_filename(&blank, 4, "Site Name", "Date", today()),
            "Site_5_2024-03-01_Report.pdf"
        );
        assert_eq!(
            report_filename(&Record::default(), 0, "Site Name", "Date", today()),
            "Site_1_2024-03-01_Report.pdf"
        );
    }

    #[test]
    fn collisions_get_numbered() {
        let mut alloc = FilenameAllocator::new();
        let names: Vec<String> = (0..3)
            .map(|_| alloc.allocate("Plaza_2024-01-15_Report.pdf"))
            .collect();
        assert_eq!(
            names,
            vec![
                "Plaza_2024-01-15_Report.pdf",
                "Plaza_2024-01-15_Report_1.pdf",
                "Plaza_2024-01-15_Report_2.pdf",
            ]
        );
    }

    #[test]
    fn collision_skips_names_taken_by_other_records() {
        let mut alloc = FilenameAllocator::new();
        alloc.allocate("A_Report_1.pdf");
        alloc.allocate("A_Report.pdf");
        assert_eq!(alloc.allocate("A_Report.pdf"), "A_Report_2.pdf");
    }

    #[test]
    fn internal_names() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1);
        let end = NaiveDate::from_ymd_opt(2024, 1, 31);
        assert_eq!(
            internal_report_filename(FormKind::Monitoring, start, end, Some("Night"), now),
            "SGV_Vigilance_Report_20240101_to_20240131_Night_20240131_140509.pdf"
        );
        assert_eq!(
            internal_report_filename(FormKind::Incident, None, end, Some("All"), now),
            "SGV_Incident_Report_all_dates_20240131_140509.pdf"
        );
        assert_eq!(
            archive_filename(FormKind::Incident, now),
            "SGV_Incident_Reports_20240131_140509.zip"
        );
    }

    #[test]
    fn site_name_parts() {
        assert_eq!(
            parse_site_name("4-311-DLF SCO-84"),
            SiteName {
                zone: "4".into(),
                unit: "311".into(),
                site: "DLF SCO-84".into()
            }
        );
        assert_eq!(parse_site_name("Plaza").site, "Plaza");
        assert_eq!(parse_site_name("Plaza").zone, "");
        let two = parse_site_name("4-Plaza");
        assert_eq!((two.zone.as_str(), two.unit.as_str(), two.site.as_str()), ("4", "", "Plaza"));
    }
}
