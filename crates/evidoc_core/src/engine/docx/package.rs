//! Office Open XML package (zip container) handling.
//!
//! Parts are held in memory in archive order. Saving rewrites the main
//! document part, registers any media embedded during the session in the
//! document relationships and content types, and writes a fresh archive.

use std::io::{Cursor, Read, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::writer::{escape_xml, write_document_xml};
use super::DOCUMENT_PART;
use crate::engine::document::{Document, MediaPart};
use crate::engine::{EngineError, EngineResult};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const BLANK_CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" "#,
    r#"ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#
);

const BLANK_ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" "#,
    r#"Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" "#,
    r#"Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

const BLANK_DOCUMENT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"</Relationships>"#
);

/// An opened package: every part's name and bytes.
#[derive(Debug, Clone)]
pub(crate) struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Read every part of a package.
    pub fn read<R: Read + Seek>(reader: R) -> EngineResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)
                .map_err(|e| EngineError::io(format!("reading part {}", name), e))?;
            parts.push((name, bytes));
        }

        Ok(Self { parts })
    }

    /// Minimal package holding only an (empty) main document.
    pub fn blank() -> Self {
        Self {
            parts: vec![
                (CONTENT_TYPES_PART.to_string(), BLANK_CONTENT_TYPES.as_bytes().to_vec()),
                ("_rels/.rels".to_string(), BLANK_ROOT_RELS.as_bytes().to_vec()),
                (DOCUMENT_RELS_PART.to_string(), BLANK_DOCUMENT_RELS.as_bytes().to_vec()),
                (DOCUMENT_PART.to_string(), Vec::new()),
            ],
        }
    }

    /// Bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// A part decoded as UTF-8 text.
    pub fn part_text(&self, name: &str) -> EngineResult<&str> {
        let bytes = self
            .part(name)
            .ok_or_else(|| EngineError::MissingPart(name.to_string()))?;
        std::str::from_utf8(bytes)
            .map_err(|e| EngineError::malformed_xml(name, format!("not UTF-8: {}", e)))
    }

    fn set_part(&mut self, name: &str, bytes: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = bytes,
            None => self.parts.push((name.to_string(), bytes)),
        }
    }

    /// Write the package with `document` as its main part.
    pub fn write<W: Write + Seek>(&self, document: &Document, writer: W) -> EngineResult<()> {
        let mut out = self.clone();

        let mut rels = match self.part(DOCUMENT_RELS_PART) {
            Some(_) => self.part_text(DOCUMENT_RELS_PART)?.to_string(),
            None => BLANK_DOCUMENT_RELS.to_string(),
        };
        let mut content_types = self.part_text(CONTENT_TYPES_PART)?.to_string();

        let mut rel_ids = Vec::with_capacity(document.media.len());
        for media in &document.media {
            let target = out.free_media_name(&media.extension);
            let rel_id = next_relationship_id(&rels);
            rels = insert_before_close(
                &rels,
                "</Relationships>",
                &format!(
                    r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
                    rel_id,
                    IMAGE_REL_TYPE,
                    escape_xml(&target)
                ),
            )?;
            content_types = ensure_default_content_type(&content_types, media)?;
            out.set_part(&format!("word/{}", target), media.bytes.clone());
            rel_ids.push(rel_id);
        }

        out.set_part(
            DOCUMENT_PART,
            write_document_xml(document, &rel_ids).into_bytes(),
        );
        if !document.media.is_empty() {
            out.set_part(DOCUMENT_RELS_PART, rels.into_bytes());
            out.set_part(CONTENT_TYPES_PART, content_types.into_bytes());
        }

        out.write_parts(writer)
    }

    /// Serialize parts, content types first.
    fn write_parts<W: Write + Seek>(&self, writer: W) -> EngineResult<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(writer);

        let ordered = self
            .parts
            .iter()
            .filter(|(name, _)| name == CONTENT_TYPES_PART)
            .chain(self.parts.iter().filter(|(name, _)| name != CONTENT_TYPES_PART));

        for (name, bytes) in ordered {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)
                .map_err(|e| EngineError::io(format!("writing part {}", name), e))?;
        }

        zip.finish()?;
        Ok(())
    }

    /// `media/evidocN.ext` not yet used by any part.
    fn free_media_name(&self, extension: &str) -> String {
        (1..)
            .map(|n| format!("media/evidoc{}.{}", n, extension))
            .find(|candidate| self.part(&format!("word/{}", candidate)).is_none())
            .unwrap_or_else(|| format!("media/evidoc.{}", extension))
    }
}

/// Read a package from bytes in memory.
pub(crate) fn read_bytes(bytes: Vec<u8>) -> EngineResult<Package> {
    Package::read(Cursor::new(bytes))
}

/// First `rIdN` not used in a relationships part.
fn next_relationship_id(rels: &str) -> String {
    let used: Vec<u32> = rels
        .match_indices("Id=\"rId")
        .filter_map(|(start, m)| {
            let digits: String = rels[start + m.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        })
        .collect();
    let next = used.iter().max().map_or(1, |max| max + 1);
    format!("rId{}", next)
}

/// Register an image extension in `[Content_Types].xml` if missing.
fn ensure_default_content_type(content_types: &str, media: &MediaPart) -> EngineResult<String> {
    let needle = format!("Extension=\"{}\"", media.extension);
    if content_types.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()) {
        return Ok(content_types.to_string());
    }
    insert_before_close(
        content_types,
        "</Types>",
        &format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            media.extension, media.content_type
        ),
    )
}

fn insert_before_close(xml: &str, close: &str, element: &str) -> EngineResult<String> {
    let at = xml
        .rfind(close)
        .ok_or_else(|| EngineError::malformed_xml(close, format!("missing {}", close)))?;
    let mut out = String::with_capacity(xml.len() + element.len());
    out.push_str(&xml[..at]);
    out.push_str(element);
    out.push_str(&xml[at..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::docx::reader::parse_document_xml;
    use crate::engine::{Block, Paragraph};

    fn png_part() -> MediaPart {
        MediaPart {
            file_name: "scene.png".to_string(),
            extension: "png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn picks_next_relationship_id() {
        let rels = r#"<Relationships><Relationship Id="rId1"/><Relationship Id="rId7"/></Relationships>"#;
        assert_eq!(next_relationship_id(rels), "rId8");
        assert_eq!(next_relationship_id(BLANK_DOCUMENT_RELS), "rId1");
    }

    #[test]
    fn adds_content_type_once() {
        let once = ensure_default_content_type(BLANK_CONTENT_TYPES, &png_part()).unwrap();
        assert!(once.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        let twice = ensure_default_content_type(&once, &png_part()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn blank_package_round_trips_with_media() {
        let mut doc = Document::new().with_block(Block::Paragraph(Paragraph::with_text("Report")));
        doc.add_media(png_part());
        doc.add_media(png_part());

        let mut buffer = Cursor::new(Vec::new());
        Package::blank().write(&doc, &mut buffer).unwrap();

        let package = read_bytes(buffer.into_inner()).unwrap();
        assert_eq!(package.parts[0].0, CONTENT_TYPES_PART);
        assert!(package.part("word/media/evidoc1.png").is_some());
        assert!(package.part("word/media/evidoc2.png").is_some());

        let rels = package.part_text(DOCUMENT_RELS_PART).unwrap();
        assert!(rels.contains(r#"Id="rId1""#));
        assert!(rels.contains(r#"Id="rId2""#));
        assert!(rels.contains("media/evidoc2.png"));

        let parsed = parse_document_xml(package.part_text(DOCUMENT_PART).unwrap()).unwrap();
        assert_eq!(parsed.text(), "Report\n");
    }

    #[test]
    fn media_names_avoid_existing_parts() {
        let mut package = Package::blank();
        package.set_part("word/media/evidoc1.png", vec![1]);
        assert_eq!(package.free_media_name("png"), "media/evidoc2.png");
    }
}
