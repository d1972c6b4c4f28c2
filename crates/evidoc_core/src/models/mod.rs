//! Data models for evidoc.
//!
//! - Scalar case fields and their placeholders
//! - Photo records, photo sources, and the TOML photo manifest
//! - Generation requests and reports

mod fields;
mod job;
mod photo;

pub use fields::{FieldSet, Placeholder};
pub use job::{Condition, GenerationReport, GenerationRequest, PhotoFailure};
pub use photo::{ManifestError, PhotoItem, PhotoManifest, PhotoSource};
