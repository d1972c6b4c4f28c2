//! Template assembly primitives.
//!
//! Each step of building a report from a template lives here as a plain
//! function over a [`DocumentSession`](crate::engine::DocumentSession):
//!
//! 1. [`substitute_fields`] fills the scalar placeholders
//! 2. [`find_picture_slots`] locates picture markers
//! 3. [`grow_to_fit`] clones the picture table until every photo has a slot
//! 4. [`place_photo_isolated`] captions and embeds one photo per slot
//!
//! The orchestrator sequences these; they hold no state of their own.

mod capacity;
mod discovery;
mod placement;
mod substitute;

pub use capacity::{extra_units_needed, grow_to_fit, measure_unit, GrowableUnit, Growth};
pub use discovery::{find_picture_slots, PictureSlot};
pub use placement::{
    compute_bounds, fit_within, place_photo, place_photo_isolated, Placement, PlacementError,
};
pub use substitute::substitute_fields;
