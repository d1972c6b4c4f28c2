//! In-memory model of a WordprocessingML body.
//!
//! The model keeps only what the assembly edits (paragraphs, runs, tables,
//! page breaks, drawings) and carries everything else through as raw XML
//! so a round trip does not lose template content.
//!
//! Pages are counted by explicit page breaks: page `n` is the content that
//! follows the `(n - 1)`-th page break.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{find_ignore_case, AnchorId, TextSpan, TextStyle, TWIPS_PER_POINT};

/// Default `<w:document>` start tag for documents built in code.
const DEFAULT_ROOT_OPEN: &str = concat!(
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#
);

/// Run property element order from the WordprocessingML schema (CT_RPr).
const RUN_PROPERTY_ORDER: &[&str] = &[
    "rStyle", "rFonts", "b", "bCs", "i", "iCs", "caps", "smallCaps", "strike", "dstrike",
    "outline", "shadow", "emboss", "imprint", "noProof", "snapToGrid", "vanish", "webHidden",
    "color", "spacing", "w", "kern", "position", "sz", "szCs", "highlight", "u", "effect", "bdr",
    "shd", "fitText", "vertAlign", "rtl", "cs", "em", "lang", "eastAsianLayout", "specVanish",
    "oMath", "rPrChange",
];

/// Allocate a process-unique node id.
pub(crate) fn next_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// A WordprocessingML document body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Raw markup from the `<w:document>` start tag up to `<w:body>`.
    pub(crate) root_open: String,
    /// Body content in order.
    pub blocks: Vec<Block>,
    /// Raw trailing `<w:sectPr>`, kept last on write.
    pub section: Option<String>,
    /// Images embedded during this session.
    pub media: Vec<MediaPart>,
}

/// Body-level content.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    /// Unmodelled element, written back verbatim.
    Raw(String),
}

/// A paragraph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    /// Raw `<w:pPr>` element.
    pub props: Option<String>,
    pub runs: Vec<Run>,
}

/// A run: one piece of uniformly formatted content.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub id: u64,
    pub props: RunProps,
    pub content: RunContent,
}

/// What a run holds.
#[derive(Debug, Clone, PartialEq)]
pub enum RunContent {
    Text(String),
    LineBreak,
    PageBreak,
    Drawing(InlineDrawing),
    /// Unmodelled run content (tabs, fields, symbols), written back verbatim
    /// inside a `<w:r>`.
    Raw(String),
    /// Unmodelled paragraph child (bookmarks, hyperlinks), written back
    /// verbatim in place of a run.
    Element(String),
}

/// An inline picture.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineDrawing {
    pub width_emu: u64,
    pub height_emu: u64,
    pub source: DrawingSource,
}

/// Where the picture markup comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingSource {
    /// Picture already present in the template (raw `<w:drawing>`).
    Existing(String),
    /// Picture embedded in this session; index into [`Document::media`].
    Media(usize),
}

/// Image bytes stored in the package under `word/media/`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPart {
    pub file_name: String,
    pub extension: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Run formatting: bold and colour are modelled, the rest kept raw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunProps {
    pub bold: bool,
    pub color: Option<String>,
    /// Other `<w:rPr>` children as (local name, raw markup).
    pub(crate) others: Vec<(String, String)>,
}

/// A table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub id: u64,
    /// Raw `<w:tblPr>` and `<w:tblGrid>` markup.
    pub props: Option<String>,
    pub rows: Vec<TableRow>,
}

/// A table row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    /// Raw `<w:tblPrEx>`/`<w:trPr>` markup.
    pub props: Option<String>,
    pub cells: Vec<TableCell>,
}

/// A table cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub id: u64,
    /// Raw `<w:tcPr>` markup.
    pub props: Option<String>,
    /// Declared width in twips (`w:tcW` of type `dxa`).
    pub width_twips: Option<u32>,
    pub blocks: Vec<Block>,
}

/// Position state while walking the body in reading order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor {
    pub page: u32,
    pub offset: usize,
    pub cell: Option<u64>,
}

impl Cursor {
    fn start() -> Self {
        Self {
            page: 1,
            offset: 0,
            cell: None,
        }
    }

    /// Step over a run.
    fn advance(&mut self, run: &Run) {
        match &run.content {
            RunContent::Text(text) => self.offset += text.len(),
            RunContent::PageBreak => {
                self.offset += 1;
                self.page += 1;
            }
            _ => self.offset += 1,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            root_open: DEFAULT_ROOT_OPEN.to_string(),
            blocks: Vec::new(),
            section: None,
            media: Vec::new(),
        }
    }

    /// Append a block (builder pattern).
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Append a block.
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Flattened text, one line per paragraph.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.blocks, &mut out);
        out
    }

    /// All runs in reading order.
    pub fn runs(&self) -> Vec<&Run> {
        let mut runs = Vec::new();
        collect_runs(&self.blocks, &mut runs);
        runs
    }

    /// All drawings in reading order.
    pub fn drawings(&self) -> Vec<&InlineDrawing> {
        self.runs()
            .into_iter()
            .filter_map(|run| match &run.content {
                RunContent::Drawing(drawing) => Some(drawing),
                _ => None,
            })
            .collect()
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        let mut cursor = Cursor::start();
        let _ = visit_runs(&self.blocks, &mut cursor, &mut |_, _| ControlFlow::<()>::Continue(()));
        cursor.page
    }

    /// Where a run sits.
    pub(crate) fn locate(&self, anchor: AnchorId) -> Option<Cursor> {
        let mut cursor = Cursor::start();
        match visit_runs(&self.blocks, &mut cursor, &mut |run, at| {
            if run.id == anchor.0 {
                ControlFlow::Break(*at)
            } else {
                ControlFlow::Continue(())
            }
        }) {
            ControlFlow::Break(found) => Some(found),
            ControlFlow::Continue(()) => None,
        }
    }

    /// Locate every occurrence of `literal`, isolating each into its own run.
    ///
    /// A hit that already fills a whole run keeps that run's id, so a repeated
    /// search over an unchanged document returns identical spans.
    pub fn find_all(&mut self, literal: &str, page: Option<u32>) -> Vec<TextSpan> {
        let mut spans = Vec::new();
        if literal.is_empty() {
            return spans;
        }

        let mut cursor = Cursor::start();
        walk_paragraphs_mut(&mut self.blocks, &mut cursor, &mut |para, cursor| {
            let mut rebuilt = Vec::with_capacity(para.runs.len());
            for run in para.runs.drain(..) {
                let in_scope = page.map_or(true, |p| p == cursor.page);
                let text = match &run.content {
                    RunContent::Text(text) if in_scope => text.clone(),
                    _ => {
                        cursor.advance(&run);
                        rebuilt.push(run);
                        continue;
                    }
                };

                let hits = find_ignore_case(&text, literal);
                let base = cursor.offset;
                cursor.offset += text.len();

                if hits.is_empty() {
                    rebuilt.push(run);
                    continue;
                }
                if hits.len() == 1 && hits[0] == (0, text.len()) {
                    spans.push(TextSpan {
                        anchor: AnchorId(run.id),
                        start: base,
                        end: base + text.len(),
                    });
                    rebuilt.push(run);
                    continue;
                }

                let mut last = 0;
                for (start, end) in hits {
                    if start > last {
                        rebuilt.push(run.split_off_text(&text[last..start]));
                    }
                    let piece = run.split_off_text(&text[start..end]);
                    spans.push(TextSpan {
                        anchor: AnchorId(piece.id),
                        start: base + start,
                        end: base + end,
                    });
                    rebuilt.push(piece);
                    last = end;
                }
                if last < text.len() {
                    rebuilt.push(run.split_off_text(&text[last..]));
                }
            }
            para.runs = rebuilt;
            cursor.offset += 1;
        });

        spans
    }

    /// Replace every occurrence of `literal` in text runs.
    pub fn replace_all(&mut self, literal: &str, replacement: &str) -> usize {
        if literal.is_empty() {
            return 0;
        }

        let mut replaced = 0;
        let mut cursor = Cursor::start();
        walk_paragraphs_mut(&mut self.blocks, &mut cursor, &mut |para, _| {
            for run in &mut para.runs {
                if let RunContent::Text(text) = &mut run.content {
                    let hits = find_ignore_case(text, literal);
                    if hits.is_empty() {
                        continue;
                    }
                    let mut out = String::with_capacity(text.len());
                    let mut last = 0;
                    for (start, end) in &hits {
                        out.push_str(&text[last..*start]);
                        out.push_str(replacement);
                        last = *end;
                    }
                    out.push_str(&text[last..]);
                    *text = out;
                    replaced += hits.len();
                }
            }
        });
        replaced
    }

    /// First table (in reading order, outer before nested) containing `literal`.
    pub fn find_table_containing(&self, literal: &str) -> Option<u64> {
        let mut tables = Vec::new();
        collect_tables(&self.blocks, &mut tables);
        tables.into_iter().find_map(|table| {
            let mut text = String::new();
            table_text(table, &mut text);
            (!find_ignore_case(&text, literal).is_empty()).then_some(table.id)
        })
    }

    /// Occurrences of `literal` inside a table, or `None` if the table is gone.
    pub fn count_in_table(&self, table: u64, literal: &str) -> Option<usize> {
        let table = self.table(table)?;
        let mut count = 0;
        let mut runs = Vec::new();
        for row in &table.rows {
            for cell in &row.cells {
                collect_runs(&cell.blocks, &mut runs);
            }
        }
        for run in runs {
            if let RunContent::Text(text) = &run.content {
                count += find_ignore_case(text, literal).len();
            }
        }
        Some(count)
    }

    /// Look up a table by id.
    pub fn table(&self, id: u64) -> Option<&Table> {
        let mut tables = Vec::new();
        collect_tables(&self.blocks, &mut tables);
        tables.into_iter().find(|t| t.id == id)
    }

    /// Look up a cell by id.
    pub fn cell(&self, id: u64) -> Option<&TableCell> {
        find_cell(&self.blocks, id)
    }

    /// Append a paragraph holding a single page break.
    pub fn append_page_break(&mut self) {
        self.blocks.push(Block::Paragraph(Paragraph {
            props: None,
            runs: vec![Run::page_break()],
        }));
    }

    /// Append a fresh copy of a table followed by an empty paragraph.
    ///
    /// Returns `false` if the table does not exist.
    pub fn duplicate_table_at_end(&mut self, id: u64) -> bool {
        let Some(table) = self.table(id) else {
            return false;
        };
        let mut copy = table.clone();
        copy.refresh_ids();
        self.blocks.push(Block::Table(copy));
        self.blocks.push(Block::Paragraph(Paragraph::default()));
        true
    }

    /// Insert runs immediately before the anchor run.
    pub fn insert_before(&mut self, anchor: AnchorId, runs: Vec<Run>) -> bool {
        match locate_run_mut(&mut self.blocks, anchor.0) {
            Some((siblings, index)) => {
                siblings.splice(index..index, runs);
                true
            }
            None => false,
        }
    }

    /// Mutable access to a run by anchor.
    pub fn run_mut(&mut self, anchor: AnchorId) -> Option<&mut Run> {
        locate_run_mut(&mut self.blocks, anchor.0).map(|(siblings, index)| &mut siblings[index])
    }

    /// Store image bytes; returns the media index.
    pub fn add_media(&mut self, part: MediaPart) -> usize {
        self.media.push(part);
        self.media.len() - 1
    }
}

impl Paragraph {
    /// Empty paragraph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paragraph with one plain text run.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            props: None,
            runs: vec![Run::text(text)],
        }
    }

    /// Append a run (builder pattern).
    pub fn with_run(mut self, run: Run) -> Self {
        self.runs.push(run);
        self
    }

    /// Concatenated text of the paragraph's text runs.
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .filter_map(|run| match &run.content {
                RunContent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Merge neighbouring text runs that share formatting.
    pub(crate) fn merge_text_runs(&mut self) {
        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if let (Some(prev), RunContent::Text(text)) = (merged.last_mut(), &run.content) {
                if prev.props == run.props {
                    if let RunContent::Text(prev_text) = &mut prev.content {
                        prev_text.push_str(text);
                        continue;
                    }
                }
            }
            merged.push(run);
        }
        self.runs = merged;
    }
}

impl Run {
    /// Plain text run.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(RunProps::default(), RunContent::Text(text.into()))
    }

    /// Styled text run.
    pub fn styled(text: impl Into<String>, style: &TextStyle) -> Self {
        Self::new(RunProps::from_style(style), RunContent::Text(text.into()))
    }

    /// Line break run.
    pub fn line_break() -> Self {
        Self::new(RunProps::default(), RunContent::LineBreak)
    }

    /// Page break run.
    pub fn page_break() -> Self {
        Self::new(RunProps::default(), RunContent::PageBreak)
    }

    /// Run with a fresh id.
    pub fn new(props: RunProps, content: RunContent) -> Self {
        Self {
            id: next_id(),
            props,
            content,
        }
    }

    /// Text of this run, if it is a text run.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            RunContent::Text(text) => Some(text),
            _ => None,
        }
    }

    /// New text run carrying this run's formatting.
    fn split_off_text(&self, text: &str) -> Run {
        Run::new(self.props.clone(), RunContent::Text(text.to_string()))
    }
}

impl RunProps {
    /// Properties for a text style.
    pub fn from_style(style: &TextStyle) -> Self {
        let mut props = Self::default();
        props.apply(style);
        props
    }

    /// Overlay a text style.
    pub fn apply(&mut self, style: &TextStyle) {
        self.bold = style.bold;
        if style.color.is_some() {
            self.color = style.color.clone();
        }
    }

    /// Add a raw property element.
    pub(crate) fn push_other(&mut self, name: impl Into<String>, raw: impl Into<String>) {
        self.others.push((name.into(), raw.into()));
    }

    /// Whether there is nothing to write.
    pub fn is_empty(&self) -> bool {
        !self.bold && self.color.is_none() && self.others.is_empty()
    }

    /// Serialize as `<w:rPr>` with children in schema order.
    pub fn to_xml(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut items: Vec<(&str, String)> = self
            .others
            .iter()
            .map(|(name, raw)| (name.as_str(), raw.clone()))
            .collect();
        if self.bold {
            items.push(("b", "<w:b/>".to_string()));
        }
        if let Some(color) = &self.color {
            items.push(("color", format!(r#"<w:color w:val="{}"/>"#, color)));
        }
        items.sort_by_key(|(name, _)| property_rank(name));

        let mut out = String::from("<w:rPr>");
        for (_, raw) in items {
            out.push_str(&raw);
        }
        out.push_str("</w:rPr>");
        out
    }
}

fn property_rank(name: &str) -> usize {
    RUN_PROPERTY_ORDER
        .iter()
        .position(|known| *known == name)
        .unwrap_or(RUN_PROPERTY_ORDER.len())
}

impl Table {
    /// Table from rows.
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self {
            id: next_id(),
            props: None,
            rows,
        }
    }

    /// Give the table and everything inside it fresh ids.
    fn refresh_ids(&mut self) {
        self.id = next_id();
        for row in &mut self.rows {
            for cell in &mut row.cells {
                cell.id = next_id();
                refresh_block_ids(&mut cell.blocks);
            }
        }
    }
}

impl TableRow {
    /// Row from cells.
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { props: None, cells }
    }
}

impl TableCell {
    /// Cell holding the given blocks.
    pub fn new(width_twips: Option<u32>, blocks: Vec<Block>) -> Self {
        Self {
            id: next_id(),
            props: None,
            width_twips,
            blocks,
        }
    }

    /// Cell holding one paragraph of text.
    pub fn with_text(width_twips: Option<u32>, text: impl Into<String>) -> Self {
        Self::new(width_twips, vec![Block::Paragraph(Paragraph::with_text(text))])
    }

    /// Declared width in points.
    pub fn width_points(&self) -> Option<f32> {
        self.width_twips
            .filter(|w| *w > 0)
            .map(|w| w as f32 / TWIPS_PER_POINT)
    }
}

fn refresh_block_ids(blocks: &mut [Block]) {
    for block in blocks {
        match block {
            Block::Paragraph(para) => {
                for run in &mut para.runs {
                    run.id = next_id();
                }
            }
            Block::Table(table) => table.refresh_ids(),
            Block::Raw(_) => {}
        }
    }
}

/// Visit every run in reading order with the cursor positioned before it.
fn visit_runs<B, F>(blocks: &[Block], cursor: &mut Cursor, f: &mut F) -> ControlFlow<B>
where
    F: FnMut(&Run, &Cursor) -> ControlFlow<B>,
{
    for block in blocks {
        match block {
            Block::Paragraph(para) => {
                for run in &para.runs {
                    f(run, cursor)?;
                    cursor.advance(run);
                }
                cursor.offset += 1;
            }
            Block::Table(table) => {
                for row in &table.rows {
                    for cell in &row.cells {
                        let outer = cursor.cell.replace(cell.id);
                        visit_runs(&cell.blocks, cursor, f)?;
                        cursor.cell = outer;
                    }
                }
            }
            Block::Raw(_) => {}
        }
    }
    ControlFlow::Continue(())
}

/// Visit every paragraph mutably. The callback advances the cursor.
fn walk_paragraphs_mut<F>(blocks: &mut [Block], cursor: &mut Cursor, f: &mut F)
where
    F: FnMut(&mut Paragraph, &mut Cursor),
{
    for block in blocks {
        match block {
            Block::Paragraph(para) => f(para, cursor),
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        let outer = cursor.cell.replace(cell.id);
                        walk_paragraphs_mut(&mut cell.blocks, cursor, f);
                        cursor.cell = outer;
                    }
                }
            }
            Block::Raw(_) => {}
        }
    }
}

fn locate_run_mut(blocks: &mut [Block], id: u64) -> Option<(&mut Vec<Run>, usize)> {
    for block in blocks {
        match block {
            Block::Paragraph(para) => {
                if let Some(index) = para.runs.iter().position(|run| run.id == id) {
                    return Some((&mut para.runs, index));
                }
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        if let Some(found) = locate_run_mut(&mut cell.blocks, id) {
                            return Some(found);
                        }
                    }
                }
            }
            Block::Raw(_) => {}
        }
    }
    None
}

fn find_cell(blocks: &[Block], id: u64) -> Option<&TableCell> {
    for block in blocks {
        if let Block::Table(table) = block {
            for row in &table.rows {
                for cell in &row.cells {
                    if cell.id == id {
                        return Some(cell);
                    }
                    if let Some(found) = find_cell(&cell.blocks, id) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn collect_tables<'a>(blocks: &'a [Block], out: &mut Vec<&'a Table>) {
    for block in blocks {
        if let Block::Table(table) = block {
            out.push(table);
            for row in &table.rows {
                for cell in &row.cells {
                    collect_tables(&cell.blocks, out);
                }
            }
        }
    }
}

fn collect_runs<'a>(blocks: &'a [Block], out: &mut Vec<&'a Run>) {
    for block in blocks {
        match block {
            Block::Paragraph(para) => out.extend(para.runs.iter()),
            Block::Table(table) => {
                for row in &table.rows {
                    for cell in &row.cells {
                        collect_runs(&cell.blocks, out);
                    }
                }
            }
            Block::Raw(_) => {}
        }
    }
}

fn collect_text(blocks: &[Block], out: &mut String) {
    for block in blocks {
        match block {
            Block::Paragraph(para) => {
                for run in &para.runs {
                    match &run.content {
                        RunContent::Text(text) => out.push_str(text),
                        RunContent::LineBreak => out.push('\n'),
                        _ => {}
                    }
                }
                out.push('\n');
            }
            Block::Table(table) => table_text(table, out),
            Block::Raw(_) => {}
        }
    }
}

fn table_text(table: &Table, out: &mut String) {
    for row in &table.rows {
        for cell in &row.cells {
            collect_text(&cell.blocks, out);
        }
    }
}
