//! evidoc core - photo evidence report assembly
//!
//! Fills a document template with case details and a sequence of photos:
//! placeholder substitution, picture slot discovery, page growth when the
//! template runs out of slots, and per-photo placement with error
//! isolation. Everything here is UI free; the `evidoc` binary is a thin
//! shell around [`orchestrator::Generator`].

pub mod assembly;
pub mod config;
pub mod engine;
pub mod logging;
pub mod models;
pub mod orchestrator;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
