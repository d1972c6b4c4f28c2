//! `word/document.xml` parsing.
//!
//! Builds the body model from WordprocessingML. Anything the model does not
//! edit is sliced out of the source text verbatim, which stays valid because
//! the original `<w:document>` start tag (with all its namespace
//! declarations) is written back unchanged.

use roxmltree::Node;

use super::{DOCUMENT_PART, W_NS};
use crate::engine::document::{
    Block, Document, DrawingSource, InlineDrawing, Paragraph, Run, RunContent, RunProps, Table,
    TableCell, TableRow,
};
use crate::engine::{EngineError, EngineResult};

/// Parse a `word/document.xml` string.
pub(crate) fn parse_document_xml(xml: &str) -> EngineResult<Document> {
    let parsed = roxmltree::Document::parse(xml)
        .map_err(|e| EngineError::malformed_xml(DOCUMENT_PART, format!("XML parse error: {}", e)))?;

    let root = parsed.root_element();
    if root.tag_name().name() != "document" || root.tag_name().namespace() != Some(W_NS) {
        return Err(EngineError::malformed_xml(
            DOCUMENT_PART,
            "Root element must be <w:document>",
        ));
    }
    if root.lookup_prefix(W_NS) != Some("w") {
        return Err(EngineError::malformed_xml(
            DOCUMENT_PART,
            "WordprocessingML namespace must be bound to the 'w' prefix",
        ));
    }

    let body = element_child(root, "body")
        .ok_or_else(|| EngineError::malformed_xml(DOCUMENT_PART, "Missing <w:body>"))?;

    let mut document = Document::new();
    document.root_open = xml[root.range().start..body.range().start].to_string();

    for node in body.children().filter(Node::is_element) {
        match node.tag_name().name() {
            "sectPr" => document.section = Some(raw(xml, node)),
            _ => document.blocks.push(parse_block(xml, node)),
        }
    }

    Ok(document)
}

fn parse_block(xml: &str, node: Node) -> Block {
    match node.tag_name().name() {
        "p" if is_w(node) => Block::Paragraph(parse_paragraph(xml, node)),
        "tbl" if is_w(node) => Block::Table(parse_table(xml, node)),
        _ => Block::Raw(raw(xml, node)),
    }
}

fn parse_paragraph(xml: &str, node: Node) -> Paragraph {
    let mut para = Paragraph::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "pPr" => para.props = Some(raw(xml, child)),
            "r" if is_w(child) => parse_run(xml, child, &mut para.runs),
            // Spelling/grammar marks only split runs; dropping them lets
            // neighbouring runs merge back into contiguous text.
            "proofErr" => {}
            _ => para.runs.push(Run::new(
                RunProps::default(),
                RunContent::Element(raw(xml, child)),
            )),
        }
    }

    para.merge_text_runs();
    para
}

/// Parse one `<w:r>`, splitting mixed content into one run per piece.
fn parse_run(xml: &str, node: Node, runs: &mut Vec<Run>) {
    let props = element_child(node, "rPr")
        .map(|rpr| parse_run_props(xml, rpr))
        .unwrap_or_default();

    for child in node.children().filter(Node::is_element) {
        let content = match child.tag_name().name() {
            "rPr" | "lastRenderedPageBreak" => continue,
            "t" => RunContent::Text(child.text().unwrap_or_default().to_string()),
            "br" => match child.attribute((W_NS, "type")) {
                Some("page") => RunContent::PageBreak,
                Some("column") => RunContent::Raw(raw(xml, child)),
                _ => RunContent::LineBreak,
            },
            "cr" => RunContent::LineBreak,
            "drawing" => RunContent::Drawing(parse_drawing(xml, child)),
            _ => RunContent::Raw(raw(xml, child)),
        };
        runs.push(Run::new(props.clone(), content));
    }
}

fn parse_run_props(xml: &str, node: Node) -> RunProps {
    let mut props = RunProps::default();
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "b" => props.bold = is_on(child),
            "color" => props.color = child.attribute((W_NS, "val")).map(str::to_string),
            name => props.push_other(name, raw(xml, child)),
        }
    }
    props
}

fn parse_drawing(xml: &str, node: Node) -> InlineDrawing {
    let extent = node
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "extent");
    let dimension = |attr: &str| {
        extent
            .and_then(|e| e.attribute(attr))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };

    InlineDrawing {
        width_emu: dimension("cx"),
        height_emu: dimension("cy"),
        source: DrawingSource::Existing(raw(xml, node)),
    }
}

fn parse_table(xml: &str, node: Node) -> Table {
    let mut props = String::new();
    let mut rows = Vec::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "tr" => rows.push(parse_row(xml, child)),
            _ => props.push_str(&raw(xml, child)),
        }
    }

    let mut table = Table::new(rows);
    table.props = (!props.is_empty()).then_some(props);
    table
}

fn parse_row(xml: &str, node: Node) -> TableRow {
    let mut props = String::new();
    let mut cells = Vec::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "tc" => cells.push(parse_cell(xml, child)),
            _ => props.push_str(&raw(xml, child)),
        }
    }

    let mut row = TableRow::new(cells);
    row.props = (!props.is_empty()).then_some(props);
    row
}

fn parse_cell(xml: &str, node: Node) -> TableCell {
    let mut props = None;
    let mut width_twips = None;
    let mut blocks = Vec::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "tcPr" => {
                width_twips = element_child(child, "tcW").and_then(cell_width_twips);
                props = Some(raw(xml, child));
            }
            _ => blocks.push(parse_block(xml, child)),
        }
    }

    let mut cell = TableCell::new(width_twips, blocks);
    cell.props = props;
    cell
}

/// Width of a `<w:tcW>` in twips; only absolute (`dxa`) widths count.
fn cell_width_twips(node: Node) -> Option<u32> {
    match node.attribute((W_NS, "type")) {
        None | Some("dxa") => node.attribute((W_NS, "w"))?.parse().ok(),
        _ => None,
    }
}

/// Toggle properties are on unless `w:val` says otherwise.
fn is_on(node: Node) -> bool {
    !matches!(
        node.attribute((W_NS, "val")),
        Some("0") | Some("false") | Some("off")
    )
}

fn is_w(node: Node) -> bool {
    node.tag_name().namespace() == Some(W_NS)
}

fn element_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && is_w(*n) && n.tag_name().name() == name)
}

fn raw(xml: &str, node: Node) -> String {
    xml[node.range()].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="{}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
                "<w:body>{}</w:body></w:document>"
            ),
            W_NS, body
        )
    }

    #[test]
    fn parses_paragraphs_and_merges_split_markers() {
        let xml = wrap(concat!(
            "<w:p><w:pPr><w:jc w:val=\"center\"/></w:pPr>",
            "<w:r><w:t>%%PIC</w:t></w:r><w:proofErr w:type=\"spellStart\"/>",
            "<w:r><w:t>TURE%%</w:t></w:r></w:p>",
            "<w:sectPr><w:pgSz w:w=\"11906\" w:h=\"16838\"/></w:sectPr>"
        ));

        let doc = parse_document_xml(&xml).unwrap();
        assert_eq!(doc.blocks.len(), 1);
        match &doc.blocks[0] {
            Block::Paragraph(para) => {
                assert_eq!(para.runs.len(), 1);
                assert_eq!(para.text(), "%%PICTURE%%");
                assert!(para.props.as_deref().unwrap().contains("w:jc"));
            }
            other => panic!("expected paragraph, got {:?}", other),
        }
        assert!(doc.section.as_deref().unwrap().starts_with("<w:sectPr>"));
        assert!(doc.root_open.starts_with("<w:document"));
    }

    #[test]
    fn parses_tables_with_cell_widths() {
        let xml = wrap(concat!(
            "<w:tbl><w:tblPr><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr>",
            "<w:tblGrid><w:gridCol w:w=\"4500\"/></w:tblGrid>",
            "<w:tr><w:tc><w:tcPr><w:tcW w:w=\"4500\" w:type=\"dxa\"/></w:tcPr>",
            "<w:p><w:r><w:t>%%PICTURE%%</w:t></w:r></w:p></w:tc>",
            "<w:tc><w:tcPr><w:tcW w:w=\"50\" w:type=\"pct\"/></w:tcPr><w:p/></w:tc></w:tr>",
            "</w:tbl>"
        ));

        let doc = parse_document_xml(&xml).unwrap();
        let Block::Table(table) = &doc.blocks[0] else {
            panic!("expected table");
        };
        assert!(table.props.as_deref().unwrap().contains("w:tblGrid"));
        assert_eq!(table.rows[0].cells[0].width_twips, Some(4500));
        assert_eq!(table.rows[0].cells[1].width_twips, None);
    }

    #[test]
    fn parses_run_content_kinds() {
        let xml = wrap(concat!(
            "<w:p><w:bookmarkStart w:id=\"0\" w:name=\"x\"/>",
            "<w:r><w:rPr><w:rFonts w:ascii=\"Arial\"/><w:b/><w:color w:val=\"FF0000\"/></w:rPr>",
            "<w:t xml:space=\"preserve\">A &amp; B </w:t><w:tab/><w:br/><w:br w:type=\"page\"/></w:r></w:p>"
        ));

        let doc = parse_document_xml(&xml).unwrap();
        let runs = doc.runs();
        assert!(matches!(runs[0].content, RunContent::Element(_)));
        assert_eq!(runs[1].as_text(), Some("A & B "));
        assert!(runs[1].props.bold);
        assert_eq!(runs[1].props.color.as_deref(), Some("FF0000"));
        assert!(matches!(runs[2].content, RunContent::Raw(ref r) if r == "<w:tab/>"));
        assert!(matches!(runs[3].content, RunContent::LineBreak));
        assert!(matches!(runs[4].content, RunContent::PageBreak));
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn bold_off_is_respected() {
        let xml = wrap("<w:p><w:r><w:rPr><w:b w:val=\"0\"/></w:rPr><w:t>x</w:t></w:r></w:p>");
        let doc = parse_document_xml(&xml).unwrap();
        assert!(!doc.runs()[0].props.bold);
    }

    #[test]
    fn rejects_non_document_root() {
        let err = parse_document_xml("<root/>").unwrap_err();
        assert!(err.to_string().contains("w:document"));
    }
}
