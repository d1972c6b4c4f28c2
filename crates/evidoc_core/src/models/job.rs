//! Generation job inputs and results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::fields::FieldSet;
use super::photo::{PhotoItem, PhotoSource};

/// Everything one generation job needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Template document.
    pub template: PathBuf,
    /// Where the finished report is written.
    pub output: PathBuf,
    /// Scalar field values.
    pub fields: FieldSet,
    /// Photo snapshot in placement order.
    pub photos: Vec<PhotoItem>,
    /// Slots per cloned unit; derived from the template when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots_per_unit: Option<usize>,
}

impl GenerationRequest {
    /// Create a request, snapshotting the photo source.
    pub fn new<S: PhotoSource + ?Sized>(
        template: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        fields: FieldSet,
        photos: &S,
    ) -> Self {
        Self {
            template: template.into(),
            output: output.into(),
            fields,
            photos: photos.snapshot(),
            slots_per_unit: None,
        }
    }

    /// Override the slot density.
    pub fn with_slots_per_unit(mut self, slots: usize) -> Self {
        self.slots_per_unit = Some(slots);
        self
    }

    /// Short job name for logs (output file stem).
    pub fn job_name(&self) -> String {
        self.output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "evidence_report".to_string())
    }
}

/// Non-fatal condition observed during a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// The template has no picture markers; nothing was placed.
    NoSlots,
    /// More photos than slots, but no table holds the marker to clone.
    NoCloneableUnit { photos: usize, slots: usize },
    /// The configured slot density differs from the template's.
    SlotDensityMismatch { configured: usize, measured: usize },
    /// A cloned unit came up with fewer slots than the template unit.
    CloneShortfall {
        page: u32,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::NoSlots => write!(f, "template has no picture slots"),
            Condition::NoCloneableUnit { photos, slots } => write!(
                f,
                "{} photos but only {} slots and no table to clone",
                photos, slots
            ),
            Condition::SlotDensityMismatch {
                configured,
                measured,
            } => write!(
                f,
                "configured {} slots per unit but template unit holds {}",
                configured, measured
            ),
            Condition::CloneShortfall {
                page,
                expected,
                found,
            } => write!(
                f,
                "page {} received {} of {} expected slots",
                page, found, expected
            ),
        }
    }
}

/// A photo that could not be placed; its slot shows an error annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoFailure {
    /// 1-based position in the photo sequence.
    pub index: usize,
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a successful job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Report written.
    pub output: PathBuf,
    /// Slots found before any cloning.
    pub initial_slots: usize,
    /// Slots after cloning.
    pub final_slots: usize,
    /// Slots per cloned unit in effect.
    pub slots_per_unit: Option<usize>,
    /// Units cloned onto new pages.
    pub units_added: usize,
    /// Photos embedded.
    pub photos_placed: usize,
    /// Photos whose slot shows an error annotation instead.
    pub failures: Vec<PhotoFailure>,
    /// Photos left out for lack of a slot.
    pub photos_skipped: usize,
    /// Degraded conditions.
    pub conditions: Vec<Condition>,
}

impl GenerationReport {
    /// One-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} placed, {} failed, {} skipped ({} slots, {} units added)",
            self.photos_placed,
            self.failures.len(),
            self.photos_skipped,
            self.final_slots,
            self.units_added
        )
    }
}
