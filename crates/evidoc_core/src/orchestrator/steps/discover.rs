//! Discover step - finds the picture slots in the template.

use crate::assembly::find_picture_slots;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

pub struct DiscoverStep;

impl DiscoverStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DiscoverStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for DiscoverStep {
    fn name(&self) -> &str {
        "Discover"
    }

    fn description(&self) -> &str {
        "Find picture slots"
    }

    fn milestone(&self) -> Option<(u32, &str)> {
        Some((40, "Picture slots found"))
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if ctx.picture_marker().is_empty() {
            return Err(StepError::invalid_input("Picture marker is empty"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let slots = find_picture_slots(state.session()?, ctx.picture_marker(), None)?;

        ctx.logger.info(&format!(
            "Found {} picture slot(s) for {} photo(s)",
            slots.len(),
            ctx.request.photos.len()
        ));

        state.report.initial_slots = slots.len();
        state.report.final_slots = slots.len();
        state.slots = slots;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
        Ok(())
    }
}
