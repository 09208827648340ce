//! Per-record document filling: text substitution and image embedding.
//!
//! Text placeholders are replaced in place wherever they occur. Image
//! placeholders are different: the images go *after* the first paragraph that
//! carries the token (body paragraphs first, then table cells), each followed
//! by an `Image N` caption, and every occurrence of the token is removed. A
//! placeholder is an image placeholder when its own name or the column it
//! resolves to is reserved, so `{images}` matched to `Images` embeds too.

use crate::config::ReportConfig;
use crate::error::{ImageError, ReportError};
use crate::output::FillStats;
use crate::pipeline::images::{EncodedImage, ImageSource};
use crate::pipeline::matcher::MatchResult;
use crate::pipeline::walk::{
    for_each_paragraph, for_each_paragraph_mut, insert_after_first, paragraph_text,
    replace_in_paragraph, Anchor,
};
use crate::record::Record;
use docx_rs::{Docx, Paragraph, Pic, Run};
use std::io::Cursor;
use tracing::{debug, info, warn};

const EMU_PER_INCH: f64 = 914_400.0;

/// A filled document, not yet serialised.
#[derive(Debug)]
pub struct FilledDocument {
    pub docx: Docx,
    pub stats: FillStats,
}

impl FilledDocument {
    /// Serialise to DOCX bytes.
    pub fn to_bytes(self) -> Result<Vec<u8>, ReportError> {
        pack_docx(self.docx)
    }
}

/// Fill a freshly parsed template with one record.
pub async fn fill_document<I: ImageSource>(
    mut docx: Docx,
    record: &Record,
    matches: &MatchResult,
    images: &I,
    config: &ReportConfig,
) -> FilledDocument {
    let mut stats = FillStats {
        substitutions: substitute_text(&mut docx, record, matches, config),
        ..FillStats::default()
    };

    for (name, field) in image_placeholders(matches, config) {
        let token = format!("{{{}}}", name);
        if !contains_token(&docx, &token) {
            continue;
        }
        let Some(cell) = record.non_empty(field) else {
            debug!("'{}' is empty; removing {}", field, token);
            strip_token(&mut docx, &token);
            continue;
        };

        let batch = images.fetch_all(&cell).await;
        stats.image_errors.extend(batch.errors);

        let mut prepared = Vec::with_capacity(batch.images.len());
        for img in batch.images {
            match img.to_png() {
                Ok(png) => prepared.push((img, png)),
                Err(e) => {
                    warn!("Skipping image: {}", e);
                    stats.image_errors.push(e);
                }
            }
        }

        if prepared.is_empty() {
            debug!("No usable images for {}; removing token", token);
            strip_token(&mut docx, &token);
            continue;
        }

        let anchor = insert_after_first(&mut docx, &token, |anchor| {
            let width = match anchor {
                Anchor::Body => config.body_image_width_inches,
                Anchor::Cell => config.cell_image_width_inches,
            };
            image_paragraphs(&prepared, width)
        });
        if anchor.is_some() {
            stats.images_embedded += prepared.len();
        }
        strip_token(&mut docx, &token);
        info!(
            "Embedded {} image(s) for {} ({:?})",
            prepared.len(),
            token,
            anchor
        );
    }

    FilledDocument { docx, stats }
}

/// Image placeholders paired with the column they read: every reserved
/// name, then matched placeholders whose column is reserved.
pub fn image_placeholders<'a>(
    matches: &'a MatchResult,
    config: &'a ReportConfig,
) -> Vec<(&'a str, &'a str)> {
    let mut out: Vec<(&str, &str)> = config
        .image_placeholders
        .iter()
        .map(|name| (name.as_str(), matches.field_for(name).unwrap_or(name)))
        .collect();
    for (placeholder, field) in &matches.matched {
        if !config.is_image_placeholder(placeholder) && config.is_image_placeholder(field) {
            out.push((placeholder.as_str(), field.as_str()));
        }
    }
    out
}

/// True when `placeholder` is filled with images rather than text.
pub fn takes_images(placeholder: &str, matches: &MatchResult, config: &ReportConfig) -> bool {
    config.is_image_placeholder(placeholder)
        || matches
            .field_for(placeholder)
            .is_some_and(|field| config.is_image_placeholder(field))
}

/// Replace every matched, non-image placeholder with the record's value.
///
/// Returns the number of replaced occurrences.
pub fn substitute_text(
    docx: &mut Docx,
    record: &Record,
    matches: &MatchResult,
    config: &ReportConfig,
) -> usize {
    let mut count = 0;
    for (placeholder, field) in &matches.matched {
        if takes_images(placeholder, matches, config) {
            continue;
        }
        let token = format!("{{{}}}", placeholder);
        let value = record.text(field);
        for_each_paragraph_mut(docx, |p| count += replace_in_paragraph(p, &token, &value));
    }
    count
}

fn contains_token(docx: &Docx, token: &str) -> bool {
    let mut found = false;
    for_each_paragraph(docx, |p| {
        if !found && paragraph_text(p).contains(token) {
            found = true;
        }
    });
    found
}

fn strip_token(docx: &mut Docx, token: &str) {
    for_each_paragraph_mut(docx, |p| {
        replace_in_paragraph(p, token, "");
    });
}

/// One picture paragraph plus one caption paragraph per image.
fn image_paragraphs(images: &[(EncodedImage, Vec<u8>)], width_inches: f64) -> Vec<Paragraph> {
    let mut out = Vec::with_capacity(images.len() * 2);
    for (i, (img, png)) in images.iter().enumerate() {
        let w_emu = (width_inches * EMU_PER_INCH).round() as u32;
        let h_emu = (img.scaled_height(width_inches) * EMU_PER_INCH).round() as u32;
        let pic = Pic::new_with_dimensions(png.clone(), img.width, img.height).size(w_emu, h_emu);
        out.push(Paragraph::new().add_run(Run::new().add_image(pic)));
        out.push(
            Paragraph::new()
                .add_run(Run::new().add_text(format!("Image {}", i + 1)))
                .style("Caption"),
        );
    }
    out
}

/// Serialise a document to DOCX bytes.
pub fn pack_docx(docx: Docx) -> Result<Vec<u8>, ReportError> {
    let mut cursor = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut cursor)
        .map_err(|e| ReportError::DocxWrite(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Images skipped while filling, as `(url, reason)` pairs.
pub fn skipped_images(stats: &FillStats) -> impl Iterator<Item = (&str, String)> {
    stats
        .image_errors
        .iter()
        .map(|e: &ImageError| (e.url(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::matcher::match_placeholders;
    use crate::pipeline::template::extract_placeholders;
    use crate::record::Value;
    use docx_rs::{DocumentChild, ParagraphChild, RunChild, Table, TableCell, TableRow};

    fn para(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    struct StubImages;

    impl ImageSource for StubImages {
        async fn fetch(&self, reference: &str) -> Result<EncodedImage, ImageError> {
            if reference.contains("broken") {
                return Err(ImageError::HttpStatus {
                    url: reference.to_string(),
                    status: 404,
                });
            }
            let img = image::RgbImage::from_pixel(20, 10, image::Rgb([90, 90, 90]));
            let mut bytes = Vec::new();
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
                .unwrap();
            Ok(EncodedImage {
                url: reference.to_string(),
                bytes,
                width: 20,
                height: 10,
            })
        }
    }

    fn all_text(docx: &Docx) -> Vec<String> {
        let mut out = Vec::new();
        for_each_paragraph(docx, |p| out.push(paragraph_text(p)));
        out
    }

    fn drawings(docx: &Docx) -> usize {
        docx.document
            .children
            .iter()
            .filter_map(|c| match c {
                DocumentChild::Paragraph(p) => Some(p),
                _ => None,
            })
            .flat_map(|p| p.children.iter())
            .filter_map(|c| match c {
                ParagraphChild::Run(r) => Some(r),
                _ => None,
            })
            .flat_map(|r| r.children.iter())
            .filter(|rc| matches!(rc, RunChild::Drawing(_)))
            .count()
    }

    async fn fill(docx: Docx, record: Record) -> FilledDocument {
        let config = ReportConfig::default();
        let columns: Vec<String> = record.iter().map(|(k, _)| k.to_string()).collect();
        let matches = match_placeholders(&extract_placeholders(&docx), &columns);
        fill_document(docx, &record, &matches, &StubImages, &config).await
    }

    #[tokio::test]
    async fn substitutes_text_in_body_and_cells() {
        let docx = Docx::new()
            .add_paragraph(para("Site: {site name}"))
            .add_table(Table::new(vec![TableRow::new(vec![TableCell::new()
                .add_paragraph(para("Rating {Performance Check [Overall Rating]}"))])]));
        let record = Record::from_pairs([
            ("Site Name", Value::from("Plaza")),
            ("Performance Check [Overall Rating]", Value::Integer(4)),
        ]);
        let filled = fill(docx, record).await;
        assert_eq!(all_text(&filled.docx), vec!["Site: Plaza", "Rating 4"]);
        assert_eq!(filled.stats.substitutions, 2);
    }

    #[tokio::test]
    async fn empty_values_render_blank_and_unmatched_stay() {
        let docx = Docx::new().add_paragraph(para("[{Observation}] {Unknown}"));
        let record = Record::from_pairs([("Observation", Value::Empty)]);
        let filled = fill(docx, record).await;
        assert_eq!(all_text(&filled.docx), vec!["[] {Unknown}"]);
    }

    #[tokio::test]
    async fn images_inserted_after_first_occurrence_with_captions() {
        let docx = Docx::new()
            .add_paragraph(para("Photos {Images}"))
            .add_paragraph(para("Footer {Images}"));
        let record = Record::from_pairs([(
            "Images",
            Value::from("https://a/1.jpg, https://b/broken.jpg, https://c/3.jpg"),
        )]);
        let filled = fill(docx, record).await;
        assert_eq!(
            all_text(&filled.docx),
            vec!["Photos ", "", "Image 1", "", "Image 2", "Footer "]
        );
        assert_eq!(drawings(&filled.docx), 2);
        assert_eq!(filled.stats.images_embedded, 2);
        assert_eq!(filled.stats.image_errors.len(), 1);
        assert_eq!(skipped_images(&filled.stats).count(), 1);
    }

    #[tokio::test]
    async fn empty_image_cell_strips_token() {
        let docx = Docx::new().add_paragraph(para("Evidence: {EVIDENCE & ATTACHMENTS - Photos}"));
        let record = Record::from_pairs([("EVIDENCE & ATTACHMENTS - Photos", Value::Empty)]);
        let filled = fill(docx, record).await;
        assert_eq!(all_text(&filled.docx), vec!["Evidence: "]);
        assert_eq!(drawings(&filled.docx), 0);
    }

    #[tokio::test]
    async fn all_images_failing_strips_token() {
        let docx = Docx::new().add_paragraph(para("{Images}"));
        let record = Record::from_pairs([("Images", Value::from("https://x/broken.png"))]);
        let filled = fill(docx, record).await;
        assert_eq!(all_text(&filled.docx), vec![""]);
        assert_eq!(filled.stats.images_embedded, 0);
        assert_eq!(filled.stats.image_errors.len(), 1);
    }

    #[tokio::test]
    async fn images_go_into_table_cell_when_body_lacks_token() {
        let docx = Docx::new().add_paragraph(para("Report")).add_table(Table::new(vec![
            TableRow::new(vec![TableCell::new().add_paragraph(para("{Images}"))]),
        ]));
        let record = Record::from_pairs([("Images", Value::from("https://a/1.jpg"))]);
        let filled = fill(docx, record).await;
        assert_eq!(all_text(&filled.docx), vec!["Report", "", "", "Image 1"]);
        assert_eq!(filled.stats.images_embedded, 1);
    }

    #[tokio::test]
    async fn lowercase_image_placeholder_embeds_instead_of_listing_urls() {
        let docx = Docx::new().add_paragraph(para("Photos: {images}"));
        let record = Record::from_pairs([(
            "Images",
            Value::from("https://a/1.jpg, https://b/2.jpg"),
        )]);
        let filled = fill(docx, record).await;
        assert_eq!(
            all_text(&filled.docx),
            vec!["Photos: ", "", "Image 1", "", "Image 2"]
        );
        assert_eq!(drawings(&filled.docx), 2);
        assert_eq!(filled.stats.substitutions, 0);
        assert_eq!(filled.stats.images_embedded, 2);
    }

    #[test]
    fn image_placeholders_follow_resolved_column() {
        let config = ReportConfig::default();
        let placeholders = ["images", "Site Name"].map(String::from).into_iter().collect();
        let matches = match_placeholders(&placeholders, &["Images", "Site Name"]);
        assert!(takes_images("images", &matches, &config));
        assert!(!takes_images("Site Name", &matches, &config));
        assert!(image_placeholders(&matches, &config).contains(&("images", "Images")));
    }

    #[tokio::test]
    async fn packs_to_docx_bytes() {
        let docx = Docx::new().add_paragraph(para("{Images}"));
        let record = Record::from_pairs([("Images", Value::from("https://a/1.jpg"))]);
        let bytes = fill(docx, record).await.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"PK\x03\x04");
    }
}
