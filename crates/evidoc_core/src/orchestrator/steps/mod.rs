//! Pipeline step implementations.
//!
//! Each step handles one phase of building a report from a template.

mod discover;
mod expand;
mod open;
mod place;
mod save;
mod substitute;
mod validate;

pub use discover::DiscoverStep;
pub use expand::ExpandStep;
pub use open::OpenStep;
pub use place::PlaceStep;
pub use save::SaveStep;
pub use substitute::SubstituteStep;
pub use validate::ValidateStep;
