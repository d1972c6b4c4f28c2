//! Save step - writes the finished report.
//!
//! The document is saved to a hidden temporary file next to the output
//! and renamed into place, so an interrupted save never leaves a partial
//! report at the output path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::DocumentSession;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

pub struct SaveStep;

impl SaveStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SaveStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for SaveStep {
    fn name(&self) -> &str {
        "Save"
    }

    fn description(&self) -> &str {
        "Save report"
    }

    fn milestone(&self) -> Option<(u32, &str)> {
        Some((100, "Document saved"))
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if ctx.request.output.file_name().is_none() {
            return Err(StepError::invalid_input("Output path has no file name"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        ctx.report_progress(95, "Saving document");

        let output = &ctx.request.output;
        save_atomically(state.session()?, output)?;

        ctx.logger.info(&format!("Saved {}", output.display()));
        state.report.output = output.clone();
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if !ctx.request.output.is_file() {
            return Err(StepError::invalid_output(format!(
                "Report not found after save: {}",
                ctx.request.output.display()
            )));
        }
        Ok(())
    }
}

/// Save via a sibling temp file and rename, creating the parent directory.
fn save_atomically(session: &mut dyn DocumentSession, output: &Path) -> StepResult<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            StepError::io_error(format!("creating directory {}", parent.display()), e)
        })?;
    }

    let temp = temp_path(output);
    if let Err(e) = session.save_as(&temp) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp, output) {
        let _ = fs::remove_file(&temp);
        return Err(StepError::io_error(
            format!("moving report into {}", output.display()),
            e,
        ));
    }
    Ok(())
}

/// `dir/report.docx` → `dir/.report.docx.tmp`
fn temp_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{}.tmp", name))
}
