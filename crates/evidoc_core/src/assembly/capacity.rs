//! Capacity planning: grow the template until every photo has a slot.
//!
//! The growable unit is the first table holding a picture marker. Each
//! added unit is a page break followed by a copy of that table, and only
//! the new page is searched afterwards so existing slots keep their order.

use crate::engine::{DocumentSession, EngineResult, TableRef};
use crate::models::Condition;

use super::discovery::{find_picture_slots, PictureSlot};

/// Number of units to add so `photos` fit into `available` slots.
///
/// Zero when everything already fits or `per_unit` is zero.
pub fn extra_units_needed(available: usize, photos: usize, per_unit: usize) -> usize {
    if photos <= available || per_unit == 0 {
        return 0;
    }
    (photos - available).div_ceil(per_unit)
}

/// The table cloned to add capacity, with its slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowableUnit {
    pub table: TableRef,
    pub slots: usize,
}

/// Find the first table holding `marker` and count its markers.
pub fn measure_unit(
    session: &dyn DocumentSession,
    marker: &str,
) -> EngineResult<Option<GrowableUnit>> {
    let Some(table) = session.find_table_containing(marker) else {
        return Ok(None);
    };
    let slots = session.count_in_table(table, marker)?;
    Ok(Some(GrowableUnit { table, slots }))
}

/// What growth did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Growth {
    /// Units appended.
    pub units_added: usize,
    /// Slot density used for planning.
    pub slots_per_unit: Option<usize>,
    /// Degraded conditions encountered.
    pub conditions: Vec<Condition>,
}

/// Add units until `slots` can hold `photo_count` photos.
///
/// New slots are appended to `slots` in document order. `configured`
/// overrides the measured density for planning only; a disagreement is
/// reported as a condition. `on_unit(done, total)` is called after each
/// unit is added.
pub fn grow_to_fit(
    session: &mut dyn DocumentSession,
    slots: &mut Vec<PictureSlot>,
    photo_count: usize,
    marker: &str,
    configured: Option<usize>,
    mut on_unit: impl FnMut(usize, usize),
) -> EngineResult<Growth> {
    let mut growth = Growth::default();

    if slots.is_empty() {
        tracing::warn!("Template has no picture slots");
        growth.conditions.push(Condition::NoSlots);
        return Ok(growth);
    }
    if photo_count <= slots.len() {
        return Ok(growth);
    }

    let Some(unit) = measure_unit(session, marker)? else {
        tracing::warn!(
            photos = photo_count,
            slots = slots.len(),
            "No table holds a picture slot; surplus photos will be skipped"
        );
        growth.conditions.push(Condition::NoCloneableUnit {
            photos: photo_count,
            slots: slots.len(),
        });
        return Ok(growth);
    };

    let per_unit = match configured.filter(|n| *n > 0) {
        Some(configured) if configured != unit.slots => {
            tracing::warn!(
                configured,
                measured = unit.slots,
                "Configured slots per unit differs from template"
            );
            growth.conditions.push(Condition::SlotDensityMismatch {
                configured,
                measured: unit.slots,
            });
            configured
        }
        Some(configured) => configured,
        None => unit.slots,
    };
    growth.slots_per_unit = Some(per_unit);

    let total = extra_units_needed(slots.len(), photo_count, per_unit);
    tracing::debug!(
        slots = slots.len(),
        photos = photo_count,
        per_unit,
        units = total,
        "Planning extra units"
    );

    for done in 1..=total {
        session.insert_page_break_at_end()?;
        session.duplicate_table_at_end(unit.table)?;

        let page = session.page_count();
        let added = find_picture_slots(session, marker, Some(page))?;
        if added.len() < unit.slots {
            tracing::warn!(
                page,
                expected = unit.slots,
                found = added.len(),
                "Cloned unit has fewer slots than the template unit"
            );
            growth.conditions.push(Condition::CloneShortfall {
                page,
                expected: unit.slots,
                found: added.len(),
            });
        }
        growth.units_added = done;
        on_unit(done, total);

        // further clones would only add empty pages
        if added.is_empty() {
            break;
        }
        slots.extend(added);
    }

    Ok(growth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        AnchorId, Block, CellRef, Document, DocxSession, ImageSize, Paragraph, Table, TableCell,
        TableRow, TextSpan, TextStyle,
    };
    use std::path::Path;

    const MARKER: &str = "%%PICTURE%%";

    fn grid(rows: usize, cols: usize) -> Block {
        Block::Table(Table::new(
            (0..rows)
                .map(|_| {
                    TableRow::new(
                        (0..cols)
                            .map(|_| TableCell::with_text(Some(4800), MARKER))
                            .collect(),
                    )
                })
                .collect(),
        ))
    }

    fn session_with(blocks: Vec<Block>) -> DocxSession {
        let mut doc = Document::new();
        for block in blocks {
            doc.push(block);
        }
        DocxSession::from_document(doc)
    }

    fn discover(session: &mut DocxSession) -> Vec<PictureSlot> {
        find_picture_slots(session, MARKER, None).unwrap()
    }

    #[test]
    fn extra_units_round_up() {
        assert_eq!(extra_units_needed(3, 8, 2), 3);
        assert_eq!(extra_units_needed(4, 8, 4), 1);
        assert_eq!(extra_units_needed(4, 9, 4), 2);
        assert_eq!(extra_units_needed(4, 4, 4), 0);
        assert_eq!(extra_units_needed(6, 2, 4), 0);
        assert_eq!(extra_units_needed(1, 5, 0), 0);
    }

    #[test]
    fn measures_first_table_with_marker() {
        let session = session_with(vec![
            Block::Table(Table::new(vec![TableRow::new(vec![TableCell::with_text(
                None, "Header",
            )])])),
            grid(2, 2),
        ]);
        let unit = measure_unit(&session, MARKER).unwrap().unwrap();
        assert_eq!(unit.slots, 4);
    }

    #[test]
    fn grows_by_whole_units() {
        let mut session = session_with(vec![grid(2, 2)]);
        let mut slots = discover(&mut session);
        let mut calls = Vec::new();

        let growth =
            grow_to_fit(&mut session, &mut slots, 9, MARKER, None, |d, t| calls.push((d, t)))
                .unwrap();

        assert_eq!(growth.units_added, 2);
        assert_eq!(growth.slots_per_unit, Some(4));
        assert!(growth.conditions.is_empty());
        assert_eq!(slots.len(), 12);
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
        assert_eq!(session.page_count(), 3);

        // appended slots follow the originals, page by page
        let pages: Vec<u32> = slots.iter().map(|s| s.page).collect();
        assert_eq!(pages, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
        assert!(slots.windows(2).all(|w| w[0].span.start < w[1].span.start));
    }

    #[test]
    fn configured_density_drives_planning() {
        // three slots: one loose paragraph plus a two-cell table
        let mut session = session_with(vec![
            Block::Paragraph(Paragraph::with_text(MARKER)),
            grid(1, 2),
        ]);
        let mut slots = discover(&mut session);
        assert_eq!(slots.len(), 3);

        let growth =
            grow_to_fit(&mut session, &mut slots, 8, MARKER, Some(2), |_, _| {}).unwrap();

        assert_eq!(growth.units_added, 3);
        assert_eq!(slots.len(), 9);
        assert!(growth.conditions.is_empty());
    }

    #[test]
    fn density_mismatch_is_reported() {
        let mut session = session_with(vec![grid(2, 2)]);
        let mut slots = discover(&mut session);

        let growth =
            grow_to_fit(&mut session, &mut slots, 6, MARKER, Some(1), |_, _| {}).unwrap();

        assert_eq!(growth.units_added, 2);
        assert_eq!(slots.len(), 12);
        assert_eq!(
            growth.conditions,
            vec![Condition::SlotDensityMismatch {
                configured: 1,
                measured: 4
            }]
        );
    }

    #[test]
    fn no_growth_when_everything_fits() {
        let mut session = session_with(vec![grid(2, 2)]);
        let mut slots = discover(&mut session);
        let growth =
            grow_to_fit(&mut session, &mut slots, 4, MARKER, None, |_, _| {}).unwrap();
        assert_eq!(growth, Growth::default());
        assert_eq!(session.page_count(), 1);
    }

    #[test]
    fn empty_template_reports_no_slots() {
        let mut session =
            session_with(vec![Block::Paragraph(Paragraph::with_text("No pictures"))]);
        let mut slots = discover(&mut session);
        let growth =
            grow_to_fit(&mut session, &mut slots, 3, MARKER, None, |_, _| {}).unwrap();
        assert_eq!(growth.conditions, vec![Condition::NoSlots]);
        assert!(slots.is_empty());
    }

    #[test]
    fn loose_slots_cannot_grow() {
        let mut session = session_with(vec![
            Block::Paragraph(Paragraph::with_text(MARKER)),
            Block::Paragraph(Paragraph::with_text(MARKER)),
        ]);
        let mut slots = discover(&mut session);
        let growth =
            grow_to_fit(&mut session, &mut slots, 5, MARKER, None, |_, _| {}).unwrap();
        assert_eq!(
            growth.conditions,
            vec![Condition::NoCloneableUnit {
                photos: 5,
                slots: 2
            }]
        );
        assert_eq!(slots.len(), 2);
        assert_eq!(session.page_count(), 1);
    }

    /// Session whose table duplication appends nothing.
    struct BarrenClone(DocxSession);

    impl DocumentSession for BarrenClone {
        fn replace_all(&mut self, literal: &str, replacement: &str) -> EngineResult<usize> {
            self.0.replace_all(literal, replacement)
        }
        fn find_all(&mut self, literal: &str, page: Option<u32>) -> EngineResult<Vec<TextSpan>> {
            self.0.find_all(literal, page)
        }
        fn page_count(&self) -> u32 {
            self.0.page_count()
        }
        fn page_of(&self, anchor: AnchorId) -> EngineResult<u32> {
            self.0.page_of(anchor)
        }
        fn find_table_containing(&self, literal: &str) -> Option<TableRef> {
            self.0.find_table_containing(literal)
        }
        fn count_in_table(&self, table: TableRef, literal: &str) -> EngineResult<usize> {
            self.0.count_in_table(table, literal)
        }
        fn insert_page_break_at_end(&mut self) -> EngineResult<()> {
            self.0.insert_page_break_at_end()
        }
        fn duplicate_table_at_end(&mut self, _table: TableRef) -> EngineResult<()> {
            Ok(())
        }
        fn containing_cell(&self, anchor: AnchorId) -> Option<CellRef> {
            self.0.containing_cell(anchor)
        }
        fn cell_width(&self, cell: CellRef) -> EngineResult<Option<f32>> {
            self.0.cell_width(cell)
        }
        fn insert_text_before(
            &mut self,
            anchor: AnchorId,
            text: &str,
            style: &TextStyle,
        ) -> EngineResult<()> {
            self.0.insert_text_before(anchor, text, style)
        }
        fn insert_line_break_before(&mut self, anchor: AnchorId) -> EngineResult<()> {
            self.0.insert_line_break_before(anchor)
        }
        fn set_text(
            &mut self,
            anchor: AnchorId,
            text: &str,
            style: Option<&TextStyle>,
        ) -> EngineResult<()> {
            self.0.set_text(anchor, text, style)
        }
        fn embed_image(
            &mut self,
            anchor: AnchorId,
            image: &Path,
            size: ImageSize,
        ) -> EngineResult<()> {
            self.0.embed_image(anchor, image, size)
        }
        fn save_as(&mut self, path: &Path) -> EngineResult<()> {
            self.0.save_as(path)
        }
        fn close(&mut self, discard_changes: bool) {
            self.0.close(discard_changes)
        }
    }

    #[test]
    fn empty_clone_stops_growth() {
        let mut session = BarrenClone(session_with(vec![grid(2, 2)]));
        let mut slots = find_picture_slots(&mut session, MARKER, None).unwrap();
        let mut calls = Vec::new();

        let growth =
            grow_to_fit(&mut session, &mut slots, 12, MARKER, None, |d, t| calls.push((d, t)))
                .unwrap();

        assert_eq!(growth.units_added, 1);
        assert_eq!(calls, vec![(1, 2)]);
        assert_eq!(slots.len(), 4);
        assert_eq!(session.page_count(), 2);
        assert_eq!(
            growth.conditions,
            vec![Condition::CloneShortfall {
                page: 2,
                expected: 4,
                found: 0
            }]
        );
    }
}
