//! Substitute step - fills the scalar placeholders.

use crate::assembly::substitute_fields;
use crate::orchestrator::errors::StepResult;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

pub struct SubstituteStep;

impl SubstituteStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubstituteStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for SubstituteStep {
    fn name(&self) -> &str {
        "Substitute"
    }

    fn description(&self) -> &str {
        "Fill case fields"
    }

    fn milestone(&self) -> Option<(u32, &str)> {
        Some((30, "Fields filled"))
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let counts = substitute_fields(state.session()?, &ctx.request.fields)?;

        let mut total = 0;
        for (field, replaced) in counts {
            if replaced > 0 {
                ctx.logger
                    .debug(&format!("{}: {} occurrence(s)", field.marker(), replaced));
            }
            total += replaced;
        }
        ctx.logger.info(&format!("Replaced {} placeholder(s)", total));

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
        Ok(())
    }
}
