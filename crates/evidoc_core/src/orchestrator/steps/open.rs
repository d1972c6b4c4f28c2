//! Open step - loads the template into an exclusive document session.

use crate::engine::SessionGuard;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

/// Opens the template through the context's document engine.
///
/// The session is stored in the job state inside a [`SessionGuard`], so it
/// is released on every exit path.
pub struct OpenStep;

impl OpenStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OpenStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for OpenStep {
    fn name(&self) -> &str {
        "Open"
    }

    fn description(&self) -> &str {
        "Open template document"
    }

    fn milestone(&self) -> Option<(u32, &str)> {
        Some((25, "Template loaded"))
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if state.has_session() {
            return Err(StepError::precondition_failed(
                "A document session is already open for this job",
            ));
        }

        ctx.report_progress(20, "Initialising document engine");
        ctx.logger.debug(&format!("Using '{}' engine", ctx.engine.name()));

        let session = ctx.engine.open(&ctx.request.template)?;
        let pages = session.page_count();
        state.session = Some(SessionGuard::new(session));

        ctx.logger.info(&format!("Template opened ({} page(s))", pages));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if !state.has_session() {
            return Err(StepError::invalid_output("Template session was not opened"));
        }
        Ok(())
    }
}
