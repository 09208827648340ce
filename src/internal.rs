//! Fixed-layout internal report: every field of every filtered record.
//!
//! Client reports follow the user's template; the internal report is the
//! company's own audit copy, so its layout is built here with docx-rs and
//! rendered through the same PDF converter.

use crate::config::ReportConfig;
use crate::form::FormKind;
use crate::naming::parse_site_name;
use crate::pipeline::images::EncodedImage;
use crate::record::RecordTable;
use chrono::NaiveDateTime;
use docx_rs::{
    AlignmentType, BreakType, Docx, Paragraph, Pic, Run, Style, StyleType, Table, TableCell,
    TableRow,
};
use tracing::{debug, warn};

pub const COMPANY_NAME: &str = "SGV SUPER SECURITY SERVICE PVT. LTD";

const EMU_PER_INCH: f64 = 914_400.0;

/// Label and value column widths in twentieths of a point.
const FIELD_GRID: [usize; 2] = [3200, 6200];

/// Build the internal report document.
///
/// `images[i]` holds the already fetched images of record `i`; a shorter
/// slice simply means no images for the remaining records.
pub fn build_internal_report(
    table: &RecordTable,
    kind: FormKind,
    images: &[Vec<EncodedImage>],
    config: &ReportConfig,
    generated_at: NaiveDateTime,
) -> Docx {
    let mut docx = Docx::new()
        .add_style(heading_style("Title", "Title", 20))
        .add_style(heading_style("Heading1", "heading 1", 16))
        .add_style(heading_style("Heading2", "heading 2", 13))
        .add_style(Style::new("Caption", StyleType::Paragraph).name("caption").size(18));

    docx = docx
        .add_paragraph(centered(COMPANY_NAME, "Title"))
        .add_paragraph(centered(kind.report_title(), "Heading1"))
        .add_paragraph(
            Paragraph::new().align(AlignmentType::Center).add_run(Run::new().add_text(format!(
                "Generated on {} at {}",
                generated_at.format("%B %d, %Y"),
                generated_at.format("%I:%M %p")
            ))),
        )
        .add_paragraph(
            Paragraph::new()
                .align(AlignmentType::Center)
                .add_run(Run::new().add_text(format!("Total records: {}", table.len())).bold()),
        );

    let image_field = kind.image_field();
    for (i, record) in table.records().iter().enumerate() {
        if i > 0 {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
        }

        let label = record.text(&config.site_field);
        let site = parse_site_name(&label);
        let heading = if site.site.is_empty() {
            format!("{}. Record {}", i + 1, i + 1)
        } else {
            format!("{}. {}", i + 1, site.site)
        };
        docx = docx.add_paragraph(
            Paragraph::new()
                .style("Heading2")
                .add_run(Run::new().add_text(heading)),
        );
        if !site.zone.is_empty() || !site.unit.is_empty() {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!(
                "Zone: {}    Unit: {}",
                or_dash(&site.zone),
                or_dash(&site.unit)
            ))));
        }

        let rows: Vec<TableRow> = record
            .iter()
            .filter(|(name, _)| *name != image_field && !config.is_image_placeholder(name))
            .map(|(name, value)| field_row(name, &value.to_string()))
            .collect();
        if !rows.is_empty() {
            docx = docx.add_table(Table::new(rows).set_grid(FIELD_GRID.to_vec()));
        }

        let record_images = images.get(i).map(Vec::as_slice).unwrap_or(&[]);
        if !record_images.is_empty() {
            docx = docx.add_paragraph(
                Paragraph::new()
                    .style("Heading2")
                    .add_run(Run::new().add_text("Photos")),
            );
        }
        let mut n = 0;
        for img in record_images {
            let png = match img.to_png() {
                Ok(png) => png,
                Err(e) => {
                    warn!("Skipping image in internal report: {}", e);
                    continue;
                }
            };
            n += 1;
            let width = config.body_image_width_inches;
            let pic = Pic::new_with_dimensions(png, img.width, img.height).size(
                (width * EMU_PER_INCH).round() as u32,
                (img.scaled_height(width) * EMU_PER_INCH).round() as u32,
            );
            docx = docx
                .add_paragraph(
                    Paragraph::new()
                        .align(AlignmentType::Center)
                        .add_run(Run::new().add_image(pic)),
                )
                .add_paragraph(
                    Paragraph::new()
                        .style("Caption")
                        .align(AlignmentType::Center)
                        .add_run(Run::new().add_text(format!("Image {}", n))),
                );
        }
        debug!("Internal report: record {} with {} image(s)", i + 1, n);
    }

    docx
}

fn heading_style(style_id: &str, name: &str, size_pt: usize) -> Style {
    Style::new(style_id, StyleType::Paragraph)
        .name(name)
        .size(size_pt * 2) // OOXML uses half-points
        .bold()
}

fn centered(text: &str, style_id: &str) -> Paragraph {
    Paragraph::new()
        .style(style_id)
        .align(AlignmentType::Center)
        .add_run(Run::new().add_text(text))
}

fn field_row(label: &str, value: &str) -> TableRow {
    TableRow::new(vec![
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(label).bold())),
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(value))),
    ])
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}
