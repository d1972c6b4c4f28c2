//! Validate step - checks the request before any document is opened.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

/// Checks that the template exists and the output path is usable.
///
/// Missing photo files and empty fields are only warned about here: each
/// missing photo becomes an annotation in its slot later on.
pub struct ValidateStep;

impl ValidateStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ValidateStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ValidateStep {
    fn name(&self) -> &str {
        "Validate"
    }

    fn description(&self) -> &str {
        "Validate template and request"
    }

    fn milestone(&self) -> Option<(u32, &str)> {
        Some((10, "Inputs validated"))
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        let template = &ctx.request.template;
        if !template.is_file() {
            return Err(StepError::file_not_found(template.display().to_string()));
        }
        if ctx.request.output.file_name().is_none() {
            return Err(StepError::invalid_input(format!(
                "Output path has no file name: {}",
                ctx.request.output.display()
            )));
        }
        if ctx.request.output == *template {
            return Err(StepError::invalid_input(
                "Output path must differ from the template",
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
        let request = &ctx.request;
        ctx.logger
            .info(&format!("Template: {}", request.template.display()));
        ctx.logger.info(&format!("Output: {}", request.output.display()));

        for field in request.fields.missing_required() {
            ctx.logger
                .warn(&format!("Field {} is empty; its marker will be blanked", field));
        }

        let missing = request
            .photos
            .iter()
            .filter(|photo| !photo.path.is_file())
            .count();
        ctx.logger
            .info(&format!("Photos: {} in request", request.photos.len()));
        if missing > 0 {
            ctx.logger.warn(&format!(
                "{} photo file(s) not found; their slots will show an error",
                missing
            ));
        }

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
        Ok(())
    }
}
