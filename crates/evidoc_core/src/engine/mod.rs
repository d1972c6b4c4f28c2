//! Document engine abstraction.
//!
//! The assembly code never touches a file format directly. It talks to a
//! [`DocumentEngine`], which opens a template and hands back an exclusive
//! [`DocumentSession`]. Sessions expose the small set of editing primitives
//! the assembly needs: literal search and replace, table lookup and
//! duplication, page breaks, styled text and image embedding, save-as.
//!
//! # Architecture
//!
//! ```text
//! DocumentEngine ──open──▶ Box<dyn DocumentSession> ──▶ SessionGuard (closes on drop)
//!       │
//!       └── DocxEngine (Office Open XML packages)
//! ```
//!
//! Locations inside a session are expressed with [`TextSpan`], whose
//! [`AnchorId`] stays valid across later edits of the same session.

mod document;
pub mod docx;
mod errors;

pub use document::{
    Block, Document, DrawingSource, InlineDrawing, MediaPart, Paragraph, Run, RunContent,
    RunProps, Table, TableCell, TableRow,
};
pub use docx::{DocxEngine, DocxSession};
pub use errors::{EngineError, EngineResult};

use std::path::Path;

/// Points to EMU (English Metric Units) conversion factor.
pub const EMU_PER_POINT: f64 = 12_700.0;

/// Twips (twentieths of a point) per point.
pub const TWIPS_PER_POINT: f32 = 20.0;

/// Stable identifier of an editable location inside one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u64);

/// Reference to a table cell inside one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef(pub u64);

/// Reference to a table (structural unit) inside one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableRef(pub u64);

/// A located literal: its anchor plus the text offsets it covered when found.
///
/// `start`/`end` are offsets into the document's flattened text at the time
/// of the search; they order spans top-to-bottom but are not updated by
/// later edits. Edits always go through `anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub anchor: AnchorId,
    pub start: usize,
    pub end: usize,
}

/// Character styling applied to inserted or rewritten text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub bold: bool,
    /// Hex RGB colour such as `FF0000`.
    pub color: Option<String>,
}

impl TextStyle {
    /// Plain text.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Bold text.
    pub fn bold() -> Self {
        Self {
            bold: true,
            color: None,
        }
    }

    /// Set the colour.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Display size of an embedded image, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: f32,
    pub height: f32,
}

impl ImageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Width in EMU.
    pub fn width_emu(&self) -> u64 {
        (f64::from(self.width) * EMU_PER_POINT).round() as u64
    }

    /// Height in EMU.
    pub fn height_emu(&self) -> u64 {
        (f64::from(self.height) * EMU_PER_POINT).round() as u64
    }
}

/// A capability that can open templates for editing.
///
/// Implementations must be shareable across threads; the sessions they
/// produce are exclusively owned by one job.
pub trait DocumentEngine: Send + Sync {
    /// Engine name (for logging).
    fn name(&self) -> &str;

    /// Open a document for editing.
    fn open(&self, template: &Path) -> EngineResult<Box<dyn DocumentSession>>;
}

/// An open, editable document.
///
/// All matching is case-insensitive on literal text.
pub trait DocumentSession: Send {
    /// Replace every occurrence of `literal`; returns the number replaced.
    fn replace_all(&mut self, literal: &str, replacement: &str) -> EngineResult<usize>;

    /// Locate every occurrence of `literal` in document order, optionally
    /// restricted to one page (1-based).
    fn find_all(&mut self, literal: &str, page: Option<u32>) -> EngineResult<Vec<TextSpan>>;

    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Page (1-based) the anchor sits on.
    fn page_of(&self, anchor: AnchorId) -> EngineResult<u32>;

    /// First table whose text contains `literal`.
    fn find_table_containing(&self, literal: &str) -> Option<TableRef>;

    /// Number of occurrences of `literal` inside a table.
    fn count_in_table(&self, table: TableRef, literal: &str) -> EngineResult<usize>;

    /// Append a page break at the end of the document.
    fn insert_page_break_at_end(&mut self) -> EngineResult<()>;

    /// Append a copy of a table at the end of the document.
    fn duplicate_table_at_end(&mut self, table: TableRef) -> EngineResult<()>;

    /// Innermost table cell containing the anchor, if any.
    fn containing_cell(&self, anchor: AnchorId) -> Option<CellRef>;

    /// Width of a cell in points, when the document declares one.
    fn cell_width(&self, cell: CellRef) -> EngineResult<Option<f32>>;

    /// Insert styled text immediately before the anchor.
    fn insert_text_before(
        &mut self,
        anchor: AnchorId,
        text: &str,
        style: &TextStyle,
    ) -> EngineResult<()>;

    /// Insert a line break immediately before the anchor.
    fn insert_line_break_before(&mut self, anchor: AnchorId) -> EngineResult<()>;

    /// Replace the anchor's content with text, optionally restyling it.
    fn set_text(
        &mut self,
        anchor: AnchorId,
        text: &str,
        style: Option<&TextStyle>,
    ) -> EngineResult<()>;

    /// Replace the anchor's content with an embedded copy of an image file.
    fn embed_image(&mut self, anchor: AnchorId, image: &Path, size: ImageSize)
        -> EngineResult<()>;

    /// Persist the document to `path`.
    fn save_as(&mut self, path: &Path) -> EngineResult<()>;

    /// Release the session. Further calls fail with [`EngineError::Closed`].
    fn close(&mut self, discard_changes: bool);
}

/// Exclusive owner of an open session.
///
/// Closes the session (discarding unsaved changes) when dropped, so every
/// exit path releases engine resources.
pub struct SessionGuard {
    session: Option<Box<dyn DocumentSession>>,
}

impl SessionGuard {
    /// Take ownership of an open session.
    pub fn new(session: Box<dyn DocumentSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Access the session.
    pub fn session(&mut self) -> EngineResult<&mut (dyn DocumentSession + 'static)> {
        self.session.as_deref_mut().ok_or(EngineError::Closed)
    }

    /// Close the session now. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close(true);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Find every case-insensitive occurrence of `needle` in `haystack`.
///
/// Returns byte ranges into `haystack`. Only ASCII letters are folded, so
/// byte offsets are identical in both strings.
pub(crate) fn find_ignore_case(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return Vec::new();
    }
    let hay = haystack.to_ascii_lowercase();
    let pat = needle.to_ascii_lowercase();
    hay.match_indices(&pat)
        .map(|(start, m)| (start, start + m.len()))
        .collect()
}
