//! Template loading and placeholder extraction.
//!
//! A [`Template`] keeps the raw DOCX bytes and hands out a freshly parsed
//! [`Docx`] on every [`Template::open`], so filling one record can never leak
//! into the next. Local paths and HTTP(S) URLs are both accepted; the bytes
//! are checked for the ZIP signature and parsed once up front so a broken
//! template fails before any record is processed.

use crate::error::ReportError;
use crate::pipeline::walk::{escape_text_nodes, for_each_paragraph, paragraph_text};
use docx_rs::{read_docx, Docx};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// `{Name}`: anything but a closing brace between braces.
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]+)\}").unwrap());

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// A user-supplied DOCX template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    bytes: Vec<u8>,
}

impl Template {
    /// Wrap DOCX bytes, validating that they parse.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ReportError> {
        let name = name.into();
        if bytes.len() < 4 || &bytes[..4] != ZIP_MAGIC {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            return Err(ReportError::NotADocx { name, magic });
        }
        let template = Self { name, bytes };
        template.open()?;
        Ok(template)
    }

    /// Load a template from a local path or an HTTP(S) URL.
    pub async fn load(input: &str, timeout_secs: u64) -> Result<Self, ReportError> {
        if is_url(input) {
            let bytes = download(input, timeout_secs).await?;
            Self::from_bytes(url_file_name(input), bytes)
        } else {
            let path = PathBuf::from(input);
            let bytes = read_local(&path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.to_string());
            Self::from_bytes(name, bytes)
        }
    }

    /// Parse a fresh document from the template bytes, with every text node
    /// escaped so it can be written back out.
    pub fn open(&self) -> Result<Docx, ReportError> {
        let mut docx = read_docx(&self.bytes).map_err(|e| ReportError::InvalidTemplate {
            name: self.name.clone(),
            detail: e.to_string(),
        })?;
        escape_text_nodes(&mut docx);
        Ok(docx)
    }

    /// Distinct placeholder names in the template.
    pub fn placeholders(&self) -> Result<BTreeSet<String>, ReportError> {
        Ok(extract_placeholders(&self.open()?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Collect every `{Name}` token in body and table-cell paragraphs.
pub fn extract_placeholders(docx: &Docx) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for_each_paragraph(docx, |p| {
        let text = paragraph_text(p);
        for cap in PLACEHOLDER_RE.captures_iter(&text) {
            found.insert(cap[1].to_string());
        }
    });
    debug!("Found {} distinct placeholders", found.len());
    found
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

async fn read_local(path: &Path) -> Result<Vec<u8>, ReportError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read template {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ReportError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(ReportError::TemplateNotFound {
            path: path.to_path_buf(),
        }),
    }
}

async fn download(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ReportError> {
    info!("Downloading template from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReportError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ReportError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ReportError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(bytes.to_vec())
}

/// Last path segment of a URL, or `template.docx`.
fn url_file_name(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "template.docx".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Paragraph, Run, Table, TableCell, TableRow};
    use std::io::Cursor;

    fn para(parts: &[&str]) -> Paragraph {
        parts
            .iter()
            .fold(Paragraph::new(), |p, s| p.add_run(Run::new().add_text(*s)))
    }

    fn pack(docx: Docx) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn extracts_from_body_and_cells() {
        let docx = Docx::new()
            .add_paragraph(para(&["Site: {Site Name} on {Date}"]))
            .add_paragraph(para(&["{Site Name} again"]))
            .add_table(Table::new(vec![TableRow::new(vec![
                TableCell::new().add_paragraph(para(&["Shift: {Shift}"])),
                TableCell::new().add_paragraph(para(&["{Images}"])),
            ])]));
        let found = extract_placeholders(&docx);
        let expected: BTreeSet<String> = ["Date", "Images", "Shift", "Site Name"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn finds_tokens_split_across_runs() {
        let docx = Docx::new().add_paragraph(para(&["{Inspec", "ted ", "By}"]));
        assert!(extract_placeholders(&docx).contains("Inspected By"));
    }

    #[test]
    fn empty_document_has_no_placeholders() {
        assert!(extract_placeholders(&Docx::new()).is_empty());
    }

    #[test]
    fn unbalanced_braces_are_ignored() {
        let docx = Docx::new().add_paragraph(para(&["{} and { open"]));
        assert!(extract_placeholders(&docx).is_empty());
    }

    #[test]
    fn template_round_trips_through_bytes() {
        let bytes = pack(Docx::new().add_paragraph(para(&["{Observation}"])));
        let template = Template::from_bytes("t.docx", bytes).unwrap();
        assert_eq!(template.name(), "t.docx");
        let found = template.placeholders().unwrap();
        assert!(found.contains("Observation"));
    }

    #[test]
    fn opened_template_writes_valid_xml_for_markup_text() {
        let bytes = pack(
            Docx::new()
                .add_paragraph(para(&["Terms & Conditions <v2>"]))
                .add_paragraph(para(&["{Site Name}"])),
        );
        let template = Template::from_bytes("t.docx", bytes).unwrap();
        let rewritten = pack(template.open().unwrap());
        let reread = Template::from_bytes("rewritten.docx", rewritten).unwrap();
        let mut seen = Vec::new();
        for_each_paragraph(&reread.open().unwrap(), |p| seen.push(paragraph_text(p)));
        assert_eq!(seen, vec!["Terms & Conditions <v2>", "{Site Name}"]);
    }

    #[test]
    fn rejects_non_zip_bytes() {
        let err = Template::from_bytes("notes.txt", b"hello".to_vec()).unwrap_err();
        match err {
            ReportError::NotADocx { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = Template::load("/definitely/not/here.docx", 5).await.unwrap_err();
        assert!(matches!(err, ReportError::TemplateNotFound { .. }));
    }

    #[test]
    fn url_detection_and_names() {
        assert!(is_url("https://example.com/t.docx"));
        assert!(!is_url("/tmp/t.docx"));
        assert_eq!(url_file_name("https://example.com/a/b/client.docx"), "client.docx");
        assert_eq!(url_file_name("https://example.com/"), "template.docx");
    }
}
