//! Pipeline runner that executes steps in sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult, StepError};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};

/// Pipeline that runs a sequence of steps.
///
/// The pipeline executes steps in order, running validation before
/// and after each step. It handles cancellation, reports each step's
/// milestone and tracks which steps were executed.
pub struct Pipeline {
    /// Steps to execute in order.
    steps: Vec<Box<dyn PipelineStep>>,
    /// Cancellation flag.
    cancel: CancelHandle,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Add a step to the pipeline.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Use an existing cancellation handle.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    /// Get a cancellation handle.
    ///
    /// Call `cancel()` on the returned handle to stop the pipeline at the
    /// next step boundary (or the next photo, during placement).
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Check if pipeline has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run the pipeline with the given context and state.
    ///
    /// Executes each step in order:
    /// 1. Check for cancellation
    /// 2. Run `validate_input`
    /// 3. Run `execute`
    /// 4. Run `validate_output` (if execute returned Success)
    /// 5. Report the step's milestone
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult {
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        };

        for step in &self.steps {
            if self.is_cancelled() {
                ctx.logger.warn(&format!(
                    "Pipeline cancelled before step '{}'",
                    step.name()
                ));
                return Err(PipelineError::cancelled(&ctx.job_name));
            }

            let step_name = step.name();
            ctx.logger.phase(step.description());

            ctx.logger.debug(&format!("Validating input for '{}'", step_name));
            if let Err(e) = step.validate_input(ctx) {
                ctx.logger.error(&format!("Input validation failed: {}", e));
                return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
            }

            ctx.logger.debug(&format!("Executing '{}'", step_name));
            let outcome = match step.execute(ctx, state) {
                Ok(outcome) => outcome,
                Err(StepError::Cancelled) => {
                    ctx.logger
                        .warn(&format!("Pipeline cancelled during step '{}'", step_name));
                    return Err(PipelineError::cancelled(&ctx.job_name));
                }
                Err(e) => {
                    ctx.logger.error(&format!("Execution failed: {}", e));
                    return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
                }
            };

            match outcome {
                StepOutcome::Success => {
                    ctx.logger
                        .debug(&format!("Validating output for '{}'", step_name));
                    if let Err(e) = step.validate_output(ctx, state) {
                        ctx.logger.error(&format!("Output validation failed: {}", e));
                        return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
                    }

                    ctx.logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger
                        .info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
            }

            if let Some((percent, label)) = step.milestone() {
                ctx.report_progress(percent, label);
            }
        }

        ctx.logger.success("Pipeline completed successfully");
        Ok(result)
    }

    /// Get the number of steps in the pipeline.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for cancelling a running job.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a handle that is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRunResult {
    /// Steps that completed successfully.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
}

impl PipelineRunResult {
    /// Check if all steps completed (none skipped).
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty()
    }

    /// Total number of steps that ran.
    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::engine::DocxEngine;
    use crate::logging::{JobLogger, LogConfig};
    use crate::models::{FieldSet, GenerationRequest, PhotoItem};
    use crate::orchestrator::errors::StepResult;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct CountingStep {
        name: &'static str,
        milestone: Option<u32>,
        execute_count: Arc<AtomicUsize>,
        fail_with: Option<fn() -> StepError>,
    }

    impl CountingStep {
        fn new(name: &'static str, milestone: Option<u32>, count: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                milestone,
                execute_count: Arc::clone(count),
                fail_with: None,
            }
        }
    }

    impl PipelineStep for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn milestone(&self) -> Option<(u32, &str)> {
            self.milestone.map(|p| (p, self.name))
        }

        fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
            self.execute_count.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(make) => Err(make()),
                None => Ok(StepOutcome::Success),
            }
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    fn context() -> Context {
        let request = GenerationRequest::new(
            "template.docx",
            "out.docx",
            FieldSet::new(),
            &Vec::<PhotoItem>::new(),
        );
        let logger = Arc::new(JobLogger::detached("out", LogConfig::default(), None));
        Context::new(request, Settings::default(), Arc::new(DocxEngine::new()), logger)
    }

    #[test]
    fn pipeline_builds_correctly() {
        let count = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::new("Step1", None, &count))
            .with_step(CountingStep::new("Step2", None, &count));

        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Step1", "Step2"]);
    }

    #[test]
    fn runs_steps_and_reports_milestones() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = context().with_progress_callback(Box::new({
            let seen = Arc::clone(&seen);
            move |percent: u32, _: &str| seen.lock().push(percent)
        }));

        let pipeline = Pipeline::new()
            .with_step(CountingStep::new("Open", Some(25), &count))
            .with_step(CountingStep::new("Quiet", None, &count))
            .with_step(CountingStep::new("Save", Some(100), &count));

        let mut state = JobState::new("job-1");
        let result = pipeline.run(&ctx, &mut state).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(result.total_steps(), 3);
        assert!(result.all_completed());
        assert_eq!(*seen.lock(), vec![25, 100]);
    }

    #[test]
    fn step_failure_stops_pipeline() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut failing = CountingStep::new("Open", None, &count);
        failing.fail_with = Some(|| StepError::file_not_found("template.docx"));

        let pipeline = Pipeline::new()
            .with_step(failing)
            .with_step(CountingStep::new("Save", None, &count));

        let err = pipeline
            .run(&context(), &mut JobState::new("job-2"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { ref step_name, .. } if step_name == "Open"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_inside_step_maps_to_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut cancelling = CountingStep::new("Place", None, &count);
        cancelling.fail_with = Some(|| StepError::Cancelled);

        let pipeline = Pipeline::new().with_step(cancelling);
        let err = pipeline
            .run(&context(), &mut JobState::new("job-3"))
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn cancel_handle_works() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = CancelHandle::new();
        let pipeline = Pipeline::new()
            .with_step(CountingStep::new("Open", None, &count))
            .with_cancel_handle(handle.clone());

        assert!(!pipeline.is_cancelled());
        handle.cancel();
        assert!(pipeline.is_cancelled());
        assert!(pipeline.cancel_handle().is_cancelled());

        let err = pipeline
            .run(&context(), &mut JobState::new("job-4"))
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
