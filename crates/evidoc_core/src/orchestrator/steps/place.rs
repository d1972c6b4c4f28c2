//! Place step - embeds each photo into its slot.
//!
//! Photo *i* goes into slot *i*. A photo that cannot be placed leaves an
//! error annotation in its slot and the job carries on. Cancellation is
//! checked before every photo.

use crate::assembly::{place_photo_isolated, Placement};
use crate::models::PhotoFailure;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

const PLACE_START: u32 = 50;
const PLACE_SPAN: u32 = 40;

pub struct PlaceStep;

impl PlaceStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlaceStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PlaceStep {
    fn name(&self) -> &str {
        "Place"
    }

    fn description(&self) -> &str {
        "Place photos"
    }

    fn milestone(&self) -> Option<(u32, &str)> {
        Some((PLACE_START + PLACE_SPAN, "Photos placed"))
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let photos = &ctx.request.photos;
        if photos.is_empty() {
            return Ok(StepOutcome::Skipped("No photos to place".to_string()));
        }

        let slots = std::mem::take(&mut state.slots);
        let usable = photos.len().min(slots.len());
        if usable < photos.len() {
            ctx.logger.warn(&format!(
                "{} photo(s) have no slot and will be left out",
                photos.len() - usable
            ));
        }
        state.report.photos_skipped = photos.len() - usable;
        state.slots = slots[usable..].to_vec();

        ctx.report_progress(PLACE_START, "Placing photos");

        for (i, (photo, slot)) in photos.iter().zip(&slots).enumerate() {
            ctx.check_cancelled()?;

            let number = i + 1;
            match place_photo_isolated(state.session()?, slot, photo, &ctx.settings.layout) {
                Placement::Placed(size) => {
                    state.report.photos_placed += 1;
                    ctx.logger.debug(&format!(
                        "Photo {} ({}) placed at {:.0}x{:.0}pt",
                        number,
                        photo.file_name(),
                        size.width,
                        size.height
                    ));
                }
                Placement::Failed(err) => {
                    ctx.logger.warn(&format!(
                        "Photo {} ({}) failed: {}",
                        number,
                        photo.file_name(),
                        err
                    ));
                    state.report.failures.push(PhotoFailure {
                        index: number,
                        path: photo.path.clone(),
                        reason: err.to_string(),
                    });
                }
            }

            let percent = PLACE_START + (PLACE_SPAN * number as u32) / usable as u32;
            ctx.report_progress(percent, &format!("Photo {}/{}", number, usable));
        }

        ctx.logger.info(&format!(
            "Placed {} photo(s), {} failed",
            state.report.photos_placed,
            state.report.failures.len()
        ));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let report = &state.report;
        let accounted = report.photos_placed + report.failures.len() + report.photos_skipped;
        if accounted != ctx.request.photos.len() {
            return Err(StepError::invalid_output(format!(
                "{} of {} photo(s) accounted for",
                accounted,
                ctx.request.photos.len()
            )));
        }
        Ok(())
    }
}
