//! Office Open XML (`.docx`) engine.
//!
//! Opening a template reads the whole package into memory and parses
//! `word/document.xml` into a [`Document`]. Every session edit happens on
//! that model; `save_as` serializes it back into a copy of the package.

mod package;
pub(crate) mod reader;
mod writer;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use image::ImageFormat;

use self::package::Package;
use super::document::{Document, DrawingSource, InlineDrawing, MediaPart, Run, RunContent};
use super::{
    AnchorId, CellRef, DocumentEngine, DocumentSession, EngineError, EngineResult, ImageSize,
    TableRef, TextSpan, TextStyle,
};

/// Main document part inside the package.
pub(crate) const DOCUMENT_PART: &str = "word/document.xml";

/// WordprocessingML main namespace.
pub(crate) const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Engine for `.docx` templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxEngine;

impl DocxEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parse a document without opening an editing session.
    pub fn read_document(&self, path: &Path) -> EngineResult<Document> {
        load(path).map(|(_, document)| document)
    }
}

/// Read a package and parse its main document part.
fn load(path: &Path) -> EngineResult<(Package, Document)> {
    let bytes = fs::read(path).map_err(|e| EngineError::open_failed(path, e.to_string()))?;
    let package =
        package::read_bytes(bytes).map_err(|e| EngineError::open_failed(path, e.to_string()))?;
    let document = reader::parse_document_xml(package.part_text(DOCUMENT_PART)?)?;
    Ok((package, document))
}

impl DocumentEngine for DocxEngine {
    fn name(&self) -> &str {
        "docx"
    }

    fn open(&self, template: &Path) -> EngineResult<Box<dyn DocumentSession>> {
        let (package, document) = load(template)?;

        tracing::debug!(
            template = %template.display(),
            blocks = document.blocks.len(),
            "Opened docx template"
        );

        Ok(Box::new(DocxSession {
            inner: Some(Loaded { package, document }),
            #[cfg(test)]
            close_hook: None,
        }))
    }
}

struct Loaded {
    package: Package,
    document: Document,
}

/// An open `.docx` document.
pub struct DocxSession {
    inner: Option<Loaded>,
    #[cfg(test)]
    close_hook: Option<Box<dyn FnOnce() + Send>>,
}

impl DocxSession {
    /// Session over an in-memory document, saved into a minimal package.
    pub fn from_document(document: Document) -> Self {
        Self {
            inner: Some(Loaded {
                package: Package::blank(),
                document,
            }),
            #[cfg(test)]
            close_hook: None,
        }
    }

    /// The document model, while the session is open.
    pub fn document(&self) -> Option<&Document> {
        self.inner.as_ref().map(|loaded| &loaded.document)
    }

    #[cfg(test)]
    pub(crate) fn with_close_hook(mut self, hook: Box<dyn FnOnce() + Send>) -> Self {
        self.close_hook = Some(hook);
        self
    }

    fn doc(&self) -> EngineResult<&Document> {
        self.document().ok_or(EngineError::Closed)
    }

    fn doc_mut(&mut self) -> EngineResult<&mut Document> {
        self.inner
            .as_mut()
            .map(|loaded| &mut loaded.document)
            .ok_or(EngineError::Closed)
    }

    /// Insert one run before the anchor, carrying the anchor's formatting.
    fn insert_inherited(
        &mut self,
        anchor: AnchorId,
        content: RunContent,
        style: Option<&TextStyle>,
    ) -> EngineResult<()> {
        let doc = self.doc_mut()?;
        let mut props = doc
            .run_mut(anchor)
            .map(|run| run.props.clone())
            .ok_or(EngineError::UnknownAnchor(anchor.0))?;
        if let Some(style) = style {
            props.apply(style);
        }
        doc.insert_before(anchor, vec![Run::new(props, content)]);
        Ok(())
    }
}

impl DocumentSession for DocxSession {
    fn replace_all(&mut self, literal: &str, replacement: &str) -> EngineResult<usize> {
        Ok(self.doc_mut()?.replace_all(literal, replacement))
    }

    fn find_all(&mut self, literal: &str, page: Option<u32>) -> EngineResult<Vec<TextSpan>> {
        Ok(self.doc_mut()?.find_all(literal, page))
    }

    fn page_count(&self) -> u32 {
        self.document().map_or(0, Document::page_count)
    }

    fn page_of(&self, anchor: AnchorId) -> EngineResult<u32> {
        self.doc()?
            .locate(anchor)
            .map(|cursor| cursor.page)
            .ok_or(EngineError::UnknownAnchor(anchor.0))
    }

    fn find_table_containing(&self, literal: &str) -> Option<TableRef> {
        self.document()?.find_table_containing(literal).map(TableRef)
    }

    fn count_in_table(&self, table: TableRef, literal: &str) -> EngineResult<usize> {
        self.doc()?
            .count_in_table(table.0, literal)
            .ok_or(EngineError::UnknownTable(table.0))
    }

    fn insert_page_break_at_end(&mut self) -> EngineResult<()> {
        self.doc_mut()?.append_page_break();
        Ok(())
    }

    fn duplicate_table_at_end(&mut self, table: TableRef) -> EngineResult<()> {
        if self.doc_mut()?.duplicate_table_at_end(table.0) {
            Ok(())
        } else {
            Err(EngineError::UnknownTable(table.0))
        }
    }

    fn containing_cell(&self, anchor: AnchorId) -> Option<CellRef> {
        self.document()?.locate(anchor)?.cell.map(CellRef)
    }

    fn cell_width(&self, cell: CellRef) -> EngineResult<Option<f32>> {
        self.doc()?
            .cell(cell.0)
            .map(|c| c.width_points())
            .ok_or(EngineError::UnknownCell(cell.0))
    }

    fn insert_text_before(
        &mut self,
        anchor: AnchorId,
        text: &str,
        style: &TextStyle,
    ) -> EngineResult<()> {
        self.insert_inherited(anchor, RunContent::Text(text.to_string()), Some(style))
    }

    fn insert_line_break_before(&mut self, anchor: AnchorId) -> EngineResult<()> {
        self.insert_inherited(anchor, RunContent::LineBreak, None)
    }

    fn set_text(
        &mut self,
        anchor: AnchorId,
        text: &str,
        style: Option<&TextStyle>,
    ) -> EngineResult<()> {
        let run = self
            .doc_mut()?
            .run_mut(anchor)
            .ok_or(EngineError::UnknownAnchor(anchor.0))?;
        run.content = RunContent::Text(text.to_string());
        if let Some(style) = style {
            run.props.apply(style);
        }
        Ok(())
    }

    fn embed_image(&mut self, anchor: AnchorId, image: &Path, size: ImageSize) -> EngineResult<()> {
        let bytes = fs::read(image)
            .map_err(|e| EngineError::io(format!("reading image {}", image.display()), e))?;
        let (extension, content_type) = media_type(&bytes).ok_or_else(|| {
            EngineError::UnsupportedImage {
                path: image.to_path_buf(),
            }
        })?;

        let doc = self.doc_mut()?;
        if doc.locate(anchor).is_none() {
            return Err(EngineError::UnknownAnchor(anchor.0));
        }

        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("image.{}", extension));
        let index = doc.add_media(MediaPart {
            file_name,
            extension: extension.to_string(),
            content_type: content_type.to_string(),
            bytes,
        });

        if let Some(run) = doc.run_mut(anchor) {
            run.content = RunContent::Drawing(InlineDrawing {
                width_emu: size.width_emu(),
                height_emu: size.height_emu(),
                source: DrawingSource::Media(index),
            });
        }
        Ok(())
    }

    fn save_as(&mut self, path: &Path) -> EngineResult<()> {
        let loaded = self.inner.as_ref().ok_or(EngineError::Closed)?;
        let file = File::create(path)
            .map_err(|e| EngineError::io(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        loaded.package.write(&loaded.document, &mut writer)?;
        writer
            .flush()
            .map_err(|e| EngineError::io(format!("writing {}", path.display()), e))?;

        tracing::debug!(
            path = %path.display(),
            media = loaded.document.media.len(),
            "Saved docx document"
        );
        Ok(())
    }

    fn close(&mut self, discard_changes: bool) {
        if self.inner.take().is_some() {
            tracing::trace!(discard_changes, "Closed docx session");
        }
        #[cfg(test)]
        if let Some(hook) = self.close_hook.take() {
            hook();
        }
    }
}

/// Package extension and content type for supported image bytes.
fn media_type(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some(("png", "image/png")),
        ImageFormat::Jpeg => Some(("jpeg", "image/jpeg")),
        ImageFormat::Gif => Some(("gif", "image/gif")),
        ImageFormat::Bmp => Some(("bmp", "image/bmp")),
        ImageFormat::Tiff => Some(("tiff", "image/tiff")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Block, Paragraph, Table, TableCell, TableRow};
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);
        img.save(&path).unwrap();
        path
    }

    fn template() -> Document {
        Document::new()
            .with_block(Block::Paragraph(Paragraph::with_text("Unit %%UNIT%%")))
            .with_block(Block::Table(Table::new(vec![TableRow::new(vec![
                TableCell::with_text(Some(8000), "%%PICTURE%%"),
                TableCell::with_text(Some(8000), "%%PICTURE%%"),
            ])])))
    }

    #[test]
    fn saves_and_reopens_edited_template() {
        let dir = TempDir::new().unwrap();
        let photo = write_png(dir.path(), "scene.png", 40, 30);

        let mut session = DocxSession::from_document(template());
        assert_eq!(session.replace_all("%%unit%%", "Patrol 7").unwrap(), 1);

        let spans = session.find_all("%%PICTURE%%", None).unwrap();
        assert_eq!(spans.len(), 2);
        let cell = session.containing_cell(spans[0].anchor).unwrap();
        assert_eq!(session.cell_width(cell).unwrap(), Some(400.0));

        session
            .insert_text_before(spans[0].anchor, "Front door", &TextStyle::bold())
            .unwrap();
        session.insert_line_break_before(spans[0].anchor).unwrap();
        session
            .embed_image(spans[0].anchor, &photo, ImageSize::new(320.0, 240.0))
            .unwrap();
        session
            .set_text(
                spans[1].anchor,
                "[Photo error: missing]",
                Some(&TextStyle::bold().with_color("FF0000")),
            )
            .unwrap();

        let out = dir.path().join("out.docx");
        session.save_as(&out).unwrap();
        session.close(false);

        let mut reopened = DocxEngine::new().open(&out).unwrap();
        assert!(reopened.find_all("%%PICTURE%%", None).unwrap().is_empty());
        assert_eq!(reopened.find_all("Patrol 7", None).unwrap().len(), 1);
        assert_eq!(reopened.find_all("Front door", None).unwrap().len(), 1);
        assert_eq!(reopened.find_all("[Photo error:", None).unwrap().len(), 1);
        reopened.close(true);

        let document = DocxEngine::new().read_document(&out).unwrap();
        assert_eq!(document.drawings().len(), 1);
        assert_eq!(document.drawings()[0].width_emu, 4_064_000);
    }

    #[test]
    fn caption_inherits_anchor_formatting() {
        let mut session = DocxSession::from_document(template());
        let spans = session.find_all("%%PICTURE%%", None).unwrap();
        session
            .doc_mut()
            .unwrap()
            .run_mut(spans[0].anchor)
            .unwrap()
            .props
            .push_other("sz", r#"<w:sz w:val="20"/>"#);

        session
            .insert_text_before(spans[0].anchor, "Caption", &TextStyle::bold())
            .unwrap();

        let doc = session.document().unwrap();
        let caption = doc.runs().into_iter().find(|r| r.as_text() == Some("Caption")).unwrap();
        assert!(caption.props.bold);
        assert!(caption.props.to_xml().contains("w:sz"));
    }

    #[test]
    fn rejects_unsupported_images() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("notes.png");
        fs::write(&bogus, b"not an image").unwrap();

        let mut session = DocxSession::from_document(template());
        let spans = session.find_all("%%PICTURE%%", None).unwrap();
        let err = session
            .embed_image(spans[0].anchor, &bogus, ImageSize::new(10.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedImage { .. }));
        assert!(session.document().unwrap().media.is_empty());
    }

    #[test]
    fn closed_session_rejects_edits() {
        let mut session = DocxSession::from_document(template());
        session.close(true);
        assert!(matches!(
            session.replace_all("%%UNIT%%", "x"),
            Err(EngineError::Closed)
        ));
        assert_eq!(session.page_count(), 0);
    }

    #[test]
    fn open_reports_missing_template() {
        let dir = TempDir::new().unwrap();
        let result = DocxEngine::new().open(&dir.path().join("absent.docx"));
        assert!(matches!(result, Err(EngineError::OpenFailed { .. })));
    }
}
