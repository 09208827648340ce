//! Structured traversal of a parsed DOCX: paragraphs, table cells, text nodes.
//!
//! Word splits text into runs wherever formatting, spell-check state or edit
//! history changes, so a token typed as `{Site Name}` can arrive as three runs
//! `{Site`, ` `, `Name}`. Everything that looks for tokens therefore works on
//! a paragraph's *flattened* text, and the replacement path merges the runs a
//! token spans into the run where it starts.
//!
//! The docx-rs reader hands back `w:t` content unescaped while its writer
//! emits [`Text::text`] verbatim. [`escape_text_nodes`] re-escapes a freshly
//! read document once; from then on every stored text is escaped, readers here
//! go through [`xml_unescape`] and writers through [`Text::new`].

use docx_rs::{
    Break, BreakType, Docx, DocumentChild, FooterChild, HeaderChild, InsertChild, MoveFromChild,
    MoveToChild, Paragraph, ParagraphChild, Run, RunChild, StructuredDataTag,
    StructuredDataTagChild, Table, TableCellContent, TableChild, TableRowChild, Text,
};

/// Stored form of a line feed inside an escaped text node.
const ESCAPED_NEWLINE: &str = "&#xA;";

/// Undo the XML escaping docx-rs applies to stored text.
pub fn xml_unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace(ESCAPED_NEWLINE, "\n")
        .replace("&amp;", "&")
}

/// Re-escape every text node of a document returned by `read_docx`.
///
/// Covers the body, tables, content controls, hyperlinks, tracked insertions
/// and moves, and all header and footer variants. Deleted text keeps its
/// private field and is left alone; comments and footnotes are not visited.
pub fn escape_text_nodes(docx: &mut Docx) {
    for child in docx.document.children.iter_mut() {
        match child {
            DocumentChild::Paragraph(p) => escape_paragraph(p),
            DocumentChild::Table(t) => escape_table(t),
            DocumentChild::StructuredDataTag(sdt) => escape_sdt(sdt),
            _ => {}
        }
    }

    let section = &mut docx.document.section_property;
    let headers = [
        &mut section.header,
        &mut section.first_header,
        &mut section.even_header,
    ];
    for (_, header) in headers.into_iter().flatten() {
        for child in header.children.iter_mut() {
            match child {
                HeaderChild::Paragraph(p) => escape_paragraph(p),
                HeaderChild::Table(t) => escape_table(t),
                HeaderChild::StructuredDataTag(sdt) => escape_sdt(sdt),
            }
        }
    }
    let footers = [
        &mut section.footer,
        &mut section.first_footer,
        &mut section.even_footer,
    ];
    for (_, footer) in footers.into_iter().flatten() {
        for child in footer.children.iter_mut() {
            match child {
                FooterChild::Paragraph(p) => escape_paragraph(p),
                FooterChild::Table(t) => escape_table(t),
                FooterChild::StructuredDataTag(sdt) => escape_sdt(sdt),
            }
        }
    }
}

fn escape_run(run: &mut Run) {
    for rc in run.children.iter_mut() {
        if let RunChild::Text(t) = rc {
            let preserve_space = t.preserve_space;
            *t = Text::new(std::mem::take(&mut t.text));
            t.preserve_space = preserve_space;
        }
    }
}

fn escape_paragraph(paragraph: &mut Paragraph) {
    escape_paragraph_children(&mut paragraph.children);
}

fn escape_paragraph_children(children: &mut [ParagraphChild]) {
    for child in children.iter_mut() {
        match child {
            ParagraphChild::Run(run) => escape_run(run),
            ParagraphChild::Hyperlink(link) => escape_paragraph_children(&mut link.children),
            ParagraphChild::Insert(ins) => {
                for c in ins.children.iter_mut() {
                    if let InsertChild::Run(run) = c {
                        escape_run(run);
                    }
                }
            }
            ParagraphChild::MoveTo(mv) => {
                for c in mv.children.iter_mut() {
                    if let MoveToChild::Run(run) = c {
                        escape_run(run);
                    }
                }
            }
            ParagraphChild::MoveFrom(mv) => {
                for c in mv.children.iter_mut() {
                    if let MoveFromChild::Run(run) = c {
                        escape_run(run);
                    }
                }
            }
            ParagraphChild::StructuredDataTag(sdt) => escape_sdt(sdt),
            _ => {}
        }
    }
}

fn escape_sdt(sdt: &mut StructuredDataTag) {
    for child in sdt.children.iter_mut() {
        match child {
            StructuredDataTagChild::Run(run) => escape_run(run),
            StructuredDataTagChild::Paragraph(p) => escape_paragraph(p),
            StructuredDataTagChild::Table(t) => escape_table(t),
            StructuredDataTagChild::StructuredDataTag(nested) => escape_sdt(nested),
            _ => {}
        }
    }
}

#[allow(irrefutable_let_patterns)]
fn escape_table(table: &mut Table) {
    for row in table.rows.iter_mut() {
        let TableChild::TableRow(row) = row else {
            continue;
        };
        for cell in row.cells.iter_mut() {
            let TableRowChild::TableCell(cell) = cell else {
                continue;
            };
            for content in cell.children.iter_mut() {
                match content {
                    TableCellContent::Paragraph(p) => escape_paragraph(p),
                    TableCellContent::Table(nested) => escape_table(nested),
                    TableCellContent::StructuredDataTag(sdt) => escape_sdt(sdt),
                    _ => {}
                }
            }
        }
    }
}

/// Concatenated plain text of a paragraph, including hyperlink runs.
pub fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    push_children_text(&paragraph.children, &mut out);
    out
}

fn push_children_text(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for rc in &run.children {
                    if let RunChild::Text(t) = rc {
                        out.push_str(&xml_unescape(&t.text));
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_children_text(&link.children, out),
            _ => {}
        }
    }
}

fn collect_texts_mut<'a>(children: &'a mut [ParagraphChild], out: &mut Vec<&'a mut Text>) {
    for child in children.iter_mut() {
        match child {
            ParagraphChild::Run(run) => {
                for rc in run.children.iter_mut() {
                    if let RunChild::Text(t) = rc {
                        out.push(t);
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_texts_mut(&mut link.children, out),
            _ => {}
        }
    }
}

/// Replace every occurrence of `token` in a paragraph with `value`.
///
/// Returns the number of occurrences replaced. Tokens that sit inside a
/// single text node are replaced there, keeping every run's formatting. An
/// occurrence that spans nodes is merged into the node where it starts; text
/// nodes outside that span, and non-text run children such as tabs, stay
/// where they are. Line feeds in `value` become text-wrapping breaks.
pub fn replace_in_paragraph(paragraph: &mut Paragraph, token: &str, value: &str) -> usize {
    if token.is_empty() {
        return 0;
    }

    let mut texts = Vec::new();
    collect_texts_mut(&mut paragraph.children, &mut texts);

    let plains: Vec<String> = texts.iter().map(|t| xml_unescape(&t.text)).collect();
    let mut starts = Vec::with_capacity(plains.len());
    let mut full = String::new();
    for plain in &plains {
        starts.push(full.len());
        full.push_str(plain);
    }
    let total = full.matches(token).count();
    if total == 0 {
        return 0;
    }

    // Node holding byte `pos` of the flattened text.
    let node_at = |pos: usize| starts.iter().rposition(|&s| s <= pos).unwrap_or(0);
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for (pos, _) in full.match_indices(token) {
        let (first, last) = (node_at(pos), node_at(pos + token.len() - 1));
        if first == last {
            continue;
        }
        match spans.last_mut() {
            Some(span) if first <= span.1 => span.1 = span.1.max(last),
            _ => spans.push((first, last)),
        }
    }
    for (first, last) in spans {
        *texts[first] = Text::new(plains[first..=last].concat());
        for t in texts[first + 1..=last].iter_mut() {
            **t = Text::new("");
        }
    }

    for t in texts.iter_mut() {
        let plain = xml_unescape(&t.text);
        if plain.contains(token) {
            **t = Text::new(plain.replace(token, value));
        }
    }
    if value.contains('\n') {
        split_line_breaks(&mut paragraph.children);
    }
    total
}

/// Turn stored line feeds into `w:br` run children.
fn split_line_breaks(children: &mut [ParagraphChild]) {
    for child in children.iter_mut() {
        match child {
            ParagraphChild::Run(run) => {
                let has_newline = run
                    .children
                    .iter()
                    .any(|rc| matches!(rc, RunChild::Text(t) if t.text.contains(ESCAPED_NEWLINE)));
                if !has_newline {
                    continue;
                }
                for rc in std::mem::take(&mut run.children) {
                    match rc {
                        RunChild::Text(t) if t.text.contains(ESCAPED_NEWLINE) => {
                            for (i, line) in t.text.split(ESCAPED_NEWLINE).enumerate() {
                                if i > 0 {
                                    run.children
                                        .push(RunChild::Break(Break::new(BreakType::TextWrapping)));
                                }
                                if !line.is_empty() {
                                    run.children.push(RunChild::Text(Text::new(xml_unescape(line))));
                                }
                            }
                        }
                        other => run.children.push(other),
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => split_line_breaks(&mut link.children),
            _ => {}
        }
    }
}

/// Visit every paragraph: body paragraphs in document order, then every
/// table cell paragraph (tables in order, rows, cells, nested tables).
pub fn for_each_paragraph(docx: &Docx, mut f: impl FnMut(&Paragraph)) {
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(p) = child {
            f(&**p);
        }
    }
    for child in &docx.document.children {
        if let DocumentChild::Table(table) = child {
            visit_table(table, &mut f);
        }
    }
}

#[allow(irrefutable_let_patterns)]
fn visit_table(table: &Table, f: &mut impl FnMut(&Paragraph)) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row else {
            continue;
        };
        for cell in &row.cells {
            if let TableRowChild::TableCell(cell) = cell {
                for content in &cell.children {
                    match content {
                        TableCellContent::Paragraph(p) => f(p),
                        TableCellContent::Table(nested) => visit_table(nested, f),
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Mutable counterpart of [`for_each_paragraph`], same order.
pub fn for_each_paragraph_mut(docx: &mut Docx, mut f: impl FnMut(&mut Paragraph)) {
    for child in docx.document.children.iter_mut() {
        if let DocumentChild::Paragraph(p) = child {
            f(&mut **p);
        }
    }
    for child in docx.document.children.iter_mut() {
        if let DocumentChild::Table(table) = child {
            visit_table_mut(table, &mut f);
        }
    }
}

#[allow(irrefutable_let_patterns)]
fn visit_table_mut(table: &mut Table, f: &mut impl FnMut(&mut Paragraph)) {
    for row in table.rows.iter_mut() {
        let TableChild::TableRow(row) = row else {
            continue;
        };
        for cell in row.cells.iter_mut() {
            if let TableRowChild::TableCell(cell) = cell {
                for content in cell.children.iter_mut() {
                    match content {
                        TableCellContent::Paragraph(p) => f(p),
                        TableCellContent::Table(nested) => visit_table_mut(nested, f),
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Where a token was found and new content was inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// A body paragraph.
    Body,
    /// A paragraph inside a table cell.
    Cell,
}

/// Find the first paragraph containing `token` (body first, then tables),
/// strip the token from it and insert the paragraphs built by `make` right
/// after it. `make` receives the anchor kind so cell content can be sized
/// differently.
///
/// Returns `None` when the token occurs nowhere.
pub fn insert_after_first(
    docx: &mut Docx,
    token: &str,
    make: impl Fn(Anchor) -> Vec<Paragraph>,
) -> Option<Anchor> {
    let children = &mut docx.document.children;
    let body_hit = children.iter().position(|c| {
        matches!(c, DocumentChild::Paragraph(p) if paragraph_text(p).contains(token))
    });
    if let Some(idx) = body_hit {
        if let DocumentChild::Paragraph(p) = &mut children[idx] {
            replace_in_paragraph(p, token, "");
        }
        for (offset, para) in make(Anchor::Body).into_iter().enumerate() {
            children.insert(idx + 1 + offset, DocumentChild::Paragraph(Box::new(para)));
        }
        return Some(Anchor::Body);
    }

    for child in children.iter_mut() {
        if let DocumentChild::Table(table) = child {
            if insert_in_table(table, token, &make) {
                return Some(Anchor::Cell);
            }
        }
    }
    None
}

#[allow(irrefutable_let_patterns)]
fn insert_in_table(table: &mut Table, token: &str, make: &impl Fn(Anchor) -> Vec<Paragraph>) -> bool {
    for row in table.rows.iter_mut() {
        let TableChild::TableRow(row) = row else {
            continue;
        };
        for cell in row.cells.iter_mut() {
            let TableRowChild::TableCell(cell) = cell else {
                continue;
            };
            let mut i = 0;
            while i < cell.children.len() {
                let hit = match &mut cell.children[i] {
                    TableCellContent::Paragraph(p) if paragraph_text(p).contains(token) => {
                        replace_in_paragraph(p, token, "");
                        true
                    }
                    TableCellContent::Table(nested) => {
                        if insert_in_table(nested, token, make) {
                            return true;
                        }
                        false
                    }
                    _ => false,
                };
                if hit {
                    for (offset, para) in make(Anchor::Cell).into_iter().enumerate() {
                        cell.children.insert(
                            i + 1 + offset,
                            TableCellContent::Paragraph(Box::new(para)),
                        );
                    }
                    return true;
                }
                i += 1;
            }
        }
    }
    false
}
