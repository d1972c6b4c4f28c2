//! Pipeline orchestrator for coordinating report generation.
//!
//! A generation job is a sequence of steps that validate, execute, and
//! record their results into a shared [`JobState`]. The [`Generator`]
//! wraps the pipeline with logging, the single-job lock and session
//! release.
//!
//! # Architecture
//!
//! ```text
//! Pipeline                          progress
//!     ├── Step: Validate            10
//!     ├── Step: Open                20 / 25
//!     ├── Step: Substitute          30
//!     ├── Step: Discover            40
//!     ├── Step: Expand              40..45
//!     ├── Step: Place               50..90
//!     └── Step: Save                95 / 100
//! ```
//!
//! # Example
//!
//! ```ignore
//! use evidoc_core::config::Settings;
//! use evidoc_core::models::{FieldSet, GenerationRequest, PhotoManifest, Placeholder};
//! use evidoc_core::orchestrator::Generator;
//!
//! let photos = PhotoManifest::load("scene/photos.toml")?;
//! let fields = FieldSet::new().with(Placeholder::Unit, "Patrol 7");
//! let request = GenerationRequest::new("template.docx", "reports/case.docx", fields, &photos);
//!
//! let result = Generator::with_docx(Settings::default()).generate(request, None, None);
//! println!("{:?}", result.report);
//! ```

mod errors;
mod generator;
mod pipeline;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use generator::{Generator, JobResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{
    DiscoverStep, ExpandStep, OpenStep, PlaceStep, SaveStep, SubstituteStep, ValidateStep,
};
pub use types::{Context, JobState, ProgressCallback, StepOutcome};

/// Create the standard generation pipeline with all steps in order.
///
/// 1. Validate - template exists, output path usable
/// 2. Open - load the template into a session
/// 3. Substitute - fill the scalar placeholders
/// 4. Discover - find picture slots
/// 5. Expand - clone the picture table for surplus photos
/// 6. Place - embed photos, annotating failures
/// 7. Save - write the report atomically
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(ValidateStep::new())
        .with_step(OpenStep::new())
        .with_step(SubstituteStep::new())
        .with_step(DiscoverStep::new())
        .with_step(ExpandStep::new())
        .with_step(PlaceStep::new())
        .with_step(SaveStep::new())
}
