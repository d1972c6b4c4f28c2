//! `word/document.xml` serialization.

use crate::engine::document::{
    Block, Document, DrawingSource, InlineDrawing, MediaPart, Paragraph, Run, RunContent, Table,
    TableCell,
};

/// First `wp:docPr` id handed to pictures embedded by this crate.
const FIRST_DRAWING_ID: u32 = 1000;

/// Serialize the document body.
///
/// `media_rel_ids[i]` is the relationship id of `document.media[i]`.
pub(crate) fn write_document_xml(document: &Document, media_rel_ids: &[String]) -> String {
    let mut writer = BodyWriter {
        out: String::with_capacity(16 * 1024),
        media: &document.media,
        media_rel_ids,
        next_drawing_id: FIRST_DRAWING_ID,
    };

    writer
        .out
        .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
    writer.out.push_str(&document.root_open);
    writer.out.push_str("<w:body>");
    writer.blocks(&document.blocks);
    if let Some(section) = &document.section {
        writer.out.push_str(section);
    }
    writer.out.push_str("</w:body>");
    writer.out.push_str(&root_close(&document.root_open));
    writer.out
}

/// Closing tag matching the raw root start tag.
fn root_close(root_open: &str) -> String {
    let name: String = root_open
        .trim_start()
        .trim_start_matches('<')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect();
    format!("</{}>", name)
}

struct BodyWriter<'a> {
    out: String,
    media: &'a [MediaPart],
    media_rel_ids: &'a [String],
    next_drawing_id: u32,
}

impl BodyWriter<'_> {
    fn blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(para) => self.paragraph(para),
                Block::Table(table) => self.table(table),
                Block::Raw(raw) => self.out.push_str(raw),
            }
        }
    }

    fn paragraph(&mut self, para: &Paragraph) {
        self.out.push_str("<w:p>");
        if let Some(props) = &para.props {
            self.out.push_str(props);
        }
        for run in &para.runs {
            self.run(run);
        }
        self.out.push_str("</w:p>");
    }

    fn run(&mut self, run: &Run) {
        if let RunContent::Element(raw) = &run.content {
            self.out.push_str(raw);
            return;
        }

        self.out.push_str("<w:r>");
        self.out.push_str(&run.props.to_xml());
        match &run.content {
            RunContent::Text(text) => {
                self.out.push_str("<w:t xml:space=\"preserve\">");
                self.out.push_str(&escape_xml(text));
                self.out.push_str("</w:t>");
            }
            RunContent::LineBreak => self.out.push_str("<w:br/>"),
            RunContent::PageBreak => self.out.push_str("<w:br w:type=\"page\"/>"),
            RunContent::Drawing(drawing) => self.drawing(drawing),
            RunContent::Raw(raw) => self.out.push_str(raw),
            RunContent::Element(_) => {}
        }
        self.out.push_str("</w:r>");
    }

    fn drawing(&mut self, drawing: &InlineDrawing) {
        let index = match &drawing.source {
            DrawingSource::Existing(raw) => {
                self.out.push_str(raw);
                return;
            }
            DrawingSource::Media(index) => *index,
        };
        let (Some(part), Some(rel_id)) = (self.media.get(index), self.media_rel_ids.get(index))
        else {
            return;
        };

        let id = self.next_drawing_id;
        self.next_drawing_id += 1;
        let name = escape_xml(&part.file_name);
        let (cx, cy) = (drawing.width_emu, drawing.height_emu);

        self.out.push_str(&format!(
            concat!(
                "<w:drawing>",
                "<wp:inline distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\" ",
                "xmlns:wp=\"http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing\">",
                "<wp:extent cx=\"{cx}\" cy=\"{cy}\"/>",
                "<wp:docPr id=\"{id}\" name=\"Picture {id}\" descr=\"{name}\"/>",
                "<wp:cNvGraphicFramePr>",
                "<a:graphicFrameLocks xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" noChangeAspect=\"1\"/>",
                "</wp:cNvGraphicFramePr>",
                "<a:graphic xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\">",
                "<a:graphicData uri=\"http://schemas.openxmlformats.org/drawingml/2006/picture\">",
                "<pic:pic xmlns:pic=\"http://schemas.openxmlformats.org/drawingml/2006/picture\">",
                "<pic:nvPicPr><pic:cNvPr id=\"{id}\" name=\"{name}\"/><pic:cNvPicPr/></pic:nvPicPr>",
                "<pic:blipFill>",
                "<a:blip r:embed=\"{rel}\" xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"/>",
                "<a:stretch><a:fillRect/></a:stretch>",
                "</pic:blipFill>",
                "<pic:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>",
                "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></pic:spPr>",
                "</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"
            ),
            cx = cx,
            cy = cy,
            id = id,
            name = name,
            rel = rel_id,
        ));
    }

    fn table(&mut self, table: &Table) {
        self.out.push_str("<w:tbl>");
        match &table.props {
            Some(props) => self.out.push_str(props),
            None => self.default_table_props(table),
        }
        for row in &table.rows {
            self.out.push_str("<w:tr>");
            if let Some(props) = &row.props {
                self.out.push_str(props);
            }
            for cell in &row.cells {
                self.cell(cell);
            }
            self.out.push_str("</w:tr>");
        }
        self.out.push_str("</w:tbl>");
    }

    /// Table properties and grid for tables built in code.
    fn default_table_props(&mut self, table: &Table) {
        self.out.push_str(concat!(
            "<w:tblPr><w:tblW w:w=\"0\" w:type=\"auto\"/>",
            "<w:tblBorders>",
            "<w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "<w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>",
            "</w:tblBorders></w:tblPr>"
        ));
        self.out.push_str("<w:tblGrid>");
        if let Some(first) = table.rows.first() {
            for cell in &first.cells {
                self.out.push_str(&format!(
                    "<w:gridCol w:w=\"{}\"/>",
                    cell.width_twips.unwrap_or(0)
                ));
            }
        }
        self.out.push_str("</w:tblGrid>");
    }

    fn cell(&mut self, cell: &TableCell) {
        self.out.push_str("<w:tc>");
        match (&cell.props, cell.width_twips) {
            (Some(props), _) => self.out.push_str(props),
            (None, Some(width)) => self.out.push_str(&format!(
                "<w:tcPr><w:tcW w:w=\"{}\" w:type=\"dxa\"/></w:tcPr>",
                width
            )),
            (None, None) => {}
        }
        self.blocks(&cell.blocks);
        // A cell must end with a paragraph.
        if !matches!(cell.blocks.last(), Some(Block::Paragraph(_))) {
            self.out.push_str("<w:p/>");
        }
        self.out.push_str("</w:tc>");
    }
}

/// Escape XML special characters.
pub(crate) fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}
