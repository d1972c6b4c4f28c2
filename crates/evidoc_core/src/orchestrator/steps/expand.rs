//! Expand step - clones the picture table until every photo has a slot.

use crate::assembly::grow_to_fit;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

/// Progress at the start of expansion; each added unit moves toward the
/// step's milestone.
const EXPAND_START: u32 = 40;
const EXPAND_SPAN: u32 = 5;

pub struct ExpandStep;

impl ExpandStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExpandStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ExpandStep {
    fn name(&self) -> &str {
        "Expand"
    }

    fn description(&self) -> &str {
        "Add capacity for surplus photos"
    }

    fn milestone(&self) -> Option<(u32, &str)> {
        Some((EXPAND_START + EXPAND_SPAN, "Capacity planned"))
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let photos = ctx.request.photos.len();
        let mut slots = std::mem::take(&mut state.slots);

        let grown = grow_to_fit(
            state.session()?,
            &mut slots,
            photos,
            ctx.picture_marker(),
            ctx.slots_per_unit(),
            |done, total| {
                ctx.logger
                    .debug(&format!("Added unit {}/{} on a new page", done, total));
                let percent = EXPAND_START + (EXPAND_SPAN * done as u32) / total.max(1) as u32;
                ctx.report_progress(percent, &format!("Added page {}/{}", done, total));
            },
        );
        state.slots = slots;
        let growth = grown?;

        for condition in &growth.conditions {
            ctx.logger.warn(&condition.to_string());
        }

        let report = &mut state.report;
        report.final_slots = state.slots.len();
        report.slots_per_unit = growth.slots_per_unit;
        report.units_added = growth.units_added;
        report.conditions.extend(growth.conditions);

        if growth.units_added == 0 {
            return Ok(StepOutcome::Skipped(format!(
                "{} slot(s) for {} photo(s); no pages added",
                state.slots.len(),
                photos
            )));
        }

        ctx.logger.info(&format!(
            "Added {} page(s); {} slot(s) available",
            growth.units_added,
            state.slots.len()
        ));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        // growth is best effort; surplus photos are skipped by placement
        if state.slots.len() < state.report.initial_slots {
            return Err(StepError::invalid_output(format!(
                "Expansion lost slots: {} before, {} after",
                state.report.initial_slots,
                state.slots.len()
            )));
        }
        Ok(())
    }
}
