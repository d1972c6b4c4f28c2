//! Photo placement: size, caption and embed one photo into one slot.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::LayoutSettings;
use crate::engine::{DocumentSession, EngineError, ImageSize, TextStyle};
use crate::models::PhotoItem;

use super::discovery::PictureSlot;

/// Why a single photo could not be placed.
#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("file not found: {0}")]
    MissingFile(PathBuf),

    #[error("cannot read image {path}: {message}")]
    UnreadableImage { path: PathBuf, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Bounding box for a photo in a container of the given width (points).
///
/// Unknown or non-positive widths use the configured fallback box. The
/// result never drops below the configured floor.
pub fn compute_bounds(container_width: Option<f32>, layout: &LayoutSettings) -> ImageSize {
    let (width, height) = match container_width.filter(|w| w.is_finite() && *w > 0.0) {
        Some(cell) => {
            let width = cell * layout.usable_width_ratio;
            (width, width * layout.height_ratio)
        }
        None => (layout.fallback_width, layout.fallback_height),
    };
    ImageSize::new(width.max(layout.min_width), height.max(layout.min_height))
}

/// Scale native pixel dimensions into `bounds`, preserving aspect ratio.
///
/// Images are never upscaled. Unknown dimensions fill the bounds.
pub fn fit_within(native: (u32, u32), bounds: ImageSize) -> ImageSize {
    let (width, height) = native;
    if width == 0 || height == 0 {
        return bounds;
    }
    let (width, height) = (width as f32, height as f32);
    let ratio = (bounds.width / width).min(bounds.height / height).min(1.0);
    ImageSize::new(width * ratio, height * ratio)
}

/// Outcome of one placement attempt.
#[derive(Debug)]
pub enum Placement {
    /// The photo was embedded at this size.
    Placed(ImageSize),
    /// The slot shows an error annotation instead.
    Failed(PlacementError),
}

/// Place one photo into one slot.
///
/// Writes the bold caption and a line break before the marker, clears the
/// marker text, then embeds the image at the fitted size.
pub fn place_photo(
    session: &mut dyn DocumentSession,
    slot: &PictureSlot,
    photo: &PhotoItem,
    layout: &LayoutSettings,
) -> Result<ImageSize, PlacementError> {
    if !photo.path.is_file() {
        return Err(PlacementError::MissingFile(photo.path.clone()));
    }
    let native = image::image_dimensions(&photo.path).map_err(|e| {
        PlacementError::UnreadableImage {
            path: photo.path.clone(),
            message: e.to_string(),
        }
    })?;

    let container_width = match slot.container {
        Some(cell) => session.cell_width(cell)?,
        None => None,
    };
    let size = fit_within(native, compute_bounds(container_width, layout));

    let anchor = slot.span.anchor;
    if !photo.caption.is_empty() {
        session.insert_text_before(anchor, &photo.caption, &TextStyle::bold())?;
        session.insert_line_break_before(anchor)?;
    }
    session.set_text(anchor, "", None)?;
    session.embed_image(anchor, &photo.path, size)?;

    Ok(size)
}

/// Place one photo, turning any failure into an annotation in its slot.
///
/// Never returns an error: the failure is reported in the outcome and the
/// slot reads `[Photo error: ...]` in bold, error-coloured text.
pub fn place_photo_isolated(
    session: &mut dyn DocumentSession,
    slot: &PictureSlot,
    photo: &PhotoItem,
    layout: &LayoutSettings,
) -> Placement {
    match place_photo(session, slot, photo, layout) {
        Ok(size) => Placement::Placed(size),
        Err(err) => {
            let note = format!("[Photo error: {}]", err);
            let style = TextStyle::bold().with_color(layout.error_color.clone());
            if let Err(annotate) = session.set_text(slot.span.anchor, &note, Some(&style)) {
                tracing::warn!(error = %annotate, "Could not annotate failed photo slot");
            }
            Placement::Failed(err)
        }
    }
}
