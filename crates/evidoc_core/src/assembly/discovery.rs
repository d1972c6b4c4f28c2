//! Picture slot discovery.

use crate::engine::{CellRef, DocumentSession, EngineResult, TextSpan};

/// One unconsumed picture marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureSlot {
    /// Where the marker sits.
    pub span: TextSpan,
    /// Table cell bounding the slot's display area, if any.
    pub container: Option<CellRef>,
    /// Page (1-based) the marker was found on.
    pub page: u32,
}

/// Locate every picture marker in document order.
///
/// With `page` set, only that page is scanned. Nothing is cached: each call
/// reflects the document as it is now, and an empty result is not an error.
pub fn find_picture_slots(
    session: &mut dyn DocumentSession,
    marker: &str,
    page: Option<u32>,
) -> EngineResult<Vec<PictureSlot>> {
    let spans = session.find_all(marker, page)?;
    let mut slots = Vec::with_capacity(spans.len());
    for span in spans {
        slots.push(PictureSlot {
            span,
            container: session.containing_cell(span.anchor),
            page: session.page_of(span.anchor)?,
        });
    }
    Ok(slots)
}
