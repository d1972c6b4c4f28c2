//! Core types for the orchestrator pipeline.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::assembly::PictureSlot;
use crate::config::Settings;
use crate::engine::{DocumentEngine, DocumentSession, SessionGuard};
use crate::logging::JobLogger;
use crate::models::{GenerationReport, GenerationRequest};

use super::errors::{StepError, StepResult};
use super::pipeline::CancelHandle;

/// Progress callback type for reporting job progress.
///
/// Arguments: (percent_complete, stage_label). Percentages never decrease
/// within one job.
pub type ProgressCallback = Box<dyn Fn(u32, &str) + Send + Sync>;

/// Read-only context passed to pipeline steps.
///
/// Contains job configuration and shared resources that steps can read
/// but not modify. Mutable state goes in `JobState`.
pub struct Context {
    /// What to generate.
    pub request: GenerationRequest,
    /// Application settings.
    pub settings: Settings,
    /// Job name/identifier.
    pub job_name: String,
    /// Engine used to open the template.
    pub engine: Arc<dyn DocumentEngine>,
    /// Per-job logger.
    pub logger: Arc<JobLogger>,
    /// Progress sink.
    progress: ProgressTracker,
    /// Cancellation flag shared with the pipeline.
    cancel: CancelHandle,
}

impl Context {
    /// Create a new context for a job.
    pub fn new(
        request: GenerationRequest,
        settings: Settings,
        engine: Arc<dyn DocumentEngine>,
        logger: Arc<JobLogger>,
    ) -> Self {
        Self {
            job_name: request.job_name(),
            request,
            settings,
            engine,
            logger,
            progress: ProgressTracker::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress.callback = Some(callback);
        self
    }

    /// Share a cancellation handle.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    /// Report progress to the logger and callback.
    ///
    /// Values are clamped to 100 and never fall below a value already
    /// reported.
    pub fn report_progress(&self, percent: u32, label: &str) {
        let percent = self.progress.advance(percent);
        self.logger.progress(percent, label);
        if let Some(ref callback) = self.progress.callback {
            callback(percent, label);
        }
    }

    /// Highest progress reported so far.
    pub fn progress(&self) -> u32 {
        *self.progress.last.lock()
    }

    /// Fail with [`StepError::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> StepResult<()> {
        if self.cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        Ok(())
    }

    /// Marker text identifying picture slots.
    pub fn picture_marker(&self) -> &str {
        &self.settings.template.picture_marker
    }

    /// Configured slot density; the request overrides settings.
    pub fn slots_per_unit(&self) -> Option<usize> {
        self.request
            .slots_per_unit
            .or(self.settings.template.slots_per_unit)
    }
}

/// Monotonic progress state.
#[derive(Default)]
struct ProgressTracker {
    last: Mutex<u32>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    /// Record a new value and return the one to publish.
    fn advance(&self, percent: u32) -> u32 {
        let mut last = self.last.lock();
        let next = percent.min(100).max(*last);
        *last = next;
        next
    }
}

/// Mutable job state that accumulates results from pipeline steps.
pub struct JobState {
    /// Unique job identifier.
    pub job_id: String,
    /// When the job started.
    pub started_at: Option<String>,
    /// The open document, owned by this job until released.
    pub session: Option<SessionGuard>,
    /// Unconsumed picture slots in document order.
    pub slots: Vec<PictureSlot>,
    /// Outcome counters, filled in as steps run.
    pub report: GenerationReport,
}

impl JobState {
    /// Create a new job state with the given ID.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            session: None,
            slots: Vec::new(),
            report: GenerationReport::default(),
        }
    }

    /// Whether a document session is open.
    pub fn has_session(&self) -> bool {
        self.session.as_ref().is_some_and(SessionGuard::is_open)
    }

    /// The open document session.
    pub fn session(&mut self) -> StepResult<&mut (dyn DocumentSession + 'static)> {
        let guard = self
            .session
            .as_mut()
            .ok_or_else(|| StepError::precondition_failed("No document session is open"))?;
        Ok(guard.session()?)
    }

    /// Close the document session, discarding unsaved changes.
    ///
    /// Returns whether a session was open.
    pub fn release_session(&mut self) -> bool {
        match self.session.take() {
            Some(mut guard) => {
                let was_open = guard.is_open();
                guard.release();
                was_open
            }
            None => false,
        }
    }
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Document, DocxEngine, DocxSession};
    use crate::logging::LogConfig;
    use crate::models::{FieldSet, PhotoItem};

    fn context() -> Context {
        let request = GenerationRequest::new(
            "template.docx",
            "reports/case_17.docx",
            FieldSet::new(),
            &Vec::<PhotoItem>::new(),
        );
        let logger = Arc::new(JobLogger::detached("case_17", LogConfig::default(), None));
        Context::new(request, Settings::default(), Arc::new(DocxEngine::new()), logger)
    }

    #[test]
    fn progress_never_decreases() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = context().with_progress_callback(Box::new({
            let seen = Arc::clone(&seen);
            move |percent: u32, _: &str| seen.lock().push(percent)
        }));

        ctx.report_progress(30, "Fields filled");
        ctx.report_progress(20, "Late report");
        ctx.report_progress(150, "Overshoot");

        assert_eq!(*seen.lock(), vec![30, 30, 100]);
        assert_eq!(ctx.progress(), 100);
    }

    #[test]
    fn context_takes_name_from_output() {
        let ctx = context();
        assert_eq!(ctx.job_name, "case_17");
        assert_eq!(ctx.picture_marker(), "%%PICTURE%%");
        assert!(ctx.check_cancelled().is_ok());
    }

    #[test]
    fn request_density_overrides_settings() {
        let mut ctx = context();
        ctx.settings.template.slots_per_unit = Some(4);
        assert_eq!(ctx.slots_per_unit(), Some(4));
        ctx.request.slots_per_unit = Some(2);
        assert_eq!(ctx.slots_per_unit(), Some(2));
    }

    #[test]
    fn cancelled_context_reports_it() {
        let handle = CancelHandle::new();
        let ctx = context().with_cancel_handle(handle.clone());
        handle.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(StepError::Cancelled)));
    }

    #[test]
    fn session_access_requires_open_session() {
        let mut state = JobState::new("job-1");
        assert!(matches!(
            state.session(),
            Err(StepError::PreconditionFailed(_))
        ));
        assert!(!state.release_session());

        state.session = Some(SessionGuard::new(Box::new(DocxSession::from_document(
            Document::new(),
        ))));
        assert!(state.has_session());
        assert!(state.session().is_ok());
        assert!(state.release_session());
        assert!(!state.has_session());
    }
}
