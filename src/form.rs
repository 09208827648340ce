//! The two form types records come from.
//!
//! Monitoring visits and incident reports are collected by different forms
//! whose exports use different date and photo columns. Everything that
//! depends on the form type is answered here so the rest of the crate can
//! stay form-agnostic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which form a record table was exported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormKind {
    /// Vigilance & monitoring inspection visits. (default)
    #[default]
    Monitoring,
    /// Incident reports with photo evidence.
    Incident,
}

impl FormKind {
    /// Column holding the event date.
    pub fn date_field(self) -> &'static str {
        match self {
            FormKind::Monitoring => "Date",
            FormKind::Incident => "Date of Incident",
        }
    }

    /// Column holding comma-separated image links; also the image placeholder name.
    pub fn image_field(self) -> &'static str {
        match self {
            FormKind::Monitoring => "Images",
            FormKind::Incident => "EVIDENCE & ATTACHMENTS - Photos",
        }
    }

    /// Columns the export is expected to have. Missing ones are only warned about.
    pub fn expected_columns(self) -> &'static [&'static str] {
        match self {
            FormKind::Monitoring => &[
                "Timestamp",
                "Date",
                "Time",
                "Site Name",
                "Documentation Check [Attendance Register]",
                "Documentation Check [Handling / Taking Over Register]",
                "Documentation Check [Visitor Log Register]",
                "Performance Check [Grooming]",
                "Performance Check [Alertness]",
                "Performance Check [Post Discipline]",
                "Performance Check [Overall Rating]",
                "Observation",
                "Inspected By",
                "Images",
                "Email Address",
                "Shift",
                "Incident Report",
                "Action Taken",
            ],
            FormKind::Incident => &[
                "Timestamp",
                "Date of Incident",
                "Time of Incident",
                "Site Name",
                "Category of Incident",
                "Status",
                "Full Name of Reporting Person",
                "EVIDENCE & ATTACHMENTS - Photos",
            ],
        }
    }

    /// Columns shown when previewing filtered records.
    pub fn preview_columns(self) -> &'static [&'static str] {
        match self {
            FormKind::Monitoring => &[
                "Date",
                "Time",
                "Site Name",
                "Shift",
                "Performance Check [Grooming]",
                "Performance Check [Alertness]",
                "Performance Check [Post Discipline]",
                "Inspected By",
            ],
            FormKind::Incident => &[
                "Date of Incident",
                "Time of Incident",
                "Site Name",
                "Category of Incident",
                "Status",
                "Full Name of Reporting Person",
            ],
        }
    }

    /// Heading of the internal report.
    pub fn report_title(self) -> &'static str {
        match self {
            FormKind::Monitoring => "VIGILANCE & MONITORING INSPECTION REPORT",
            FormKind::Incident => "INCIDENT REPORT",
        }
    }

    /// Label used in internal-report filenames.
    pub fn report_label(self) -> &'static str {
        match self {
            FormKind::Monitoring => "Vigilance_Report",
            FormKind::Incident => "Incident_Report",
        }
    }

    /// Prefix of the ZIP archive holding per-record client reports.
    pub fn archive_prefix(self) -> &'static str {
        match self {
            FormKind::Monitoring => "SGV_Client_Reports",
            FormKind::Incident => "SGV_Incident_Reports",
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormKind::Monitoring => f.write_str("monitoring"),
            FormKind::Incident => f.write_str("incident"),
        }
    }
}

impl FromStr for FormKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monitoring" | "monitor" | "vigilance" => Ok(FormKind::Monitoring),
            "incident" | "incidents" => Ok(FormKind::Incident),
            other => Err(format!("unknown form kind '{other}' (expected monitoring or incident)")),
        }
    }
}
