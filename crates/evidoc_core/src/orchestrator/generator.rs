//! Generator for running report jobs through the pipeline.
//!
//! The `Generator` owns the document engine and settings, builds the
//! per-job logger and context, runs the standard pipeline and always
//! releases the document session before reporting the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Local;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::Settings;
use crate::engine::{DocumentEngine, DocxEngine};
use crate::logging::{JobLogger, LogConfig, LogLineCallback};
use crate::models::{GenerationReport, GenerationRequest};

use super::create_standard_pipeline;
use super::pipeline::{CancelHandle, PipelineRunResult};
use super::types::{Context, JobState, ProgressCallback};

/// Result of running a single generation job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    /// Job ID that was processed.
    pub job_id: String,
    /// Whether the report was written.
    pub success: bool,
    /// Whether the job stopped because it was cancelled.
    pub cancelled: bool,
    /// Path to the report (if successful).
    pub output_path: Option<PathBuf>,
    /// Error message (if failed).
    pub error: Option<String>,
    /// Outcome counters (if successful).
    pub report: Option<GenerationReport>,
    /// Steps that completed.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
    /// Per-job log file, when one was written.
    pub log_path: Option<PathBuf>,
}

impl JobResult {
    /// Create a successful result.
    pub fn success(job_id: String, report: GenerationReport, run_result: PipelineRunResult) -> Self {
        Self {
            job_id,
            success: true,
            cancelled: false,
            output_path: Some(report.output.clone()),
            error: None,
            report: Some(report),
            steps_completed: run_result.steps_completed,
            steps_skipped: run_result.steps_skipped,
            log_path: None,
        }
    }

    /// Create a failed result.
    pub fn failure(job_id: String, error: impl Into<String>) -> Self {
        Self {
            job_id,
            success: false,
            cancelled: false,
            output_path: None,
            error: Some(error.into()),
            report: None,
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
            log_path: None,
        }
    }

    /// Create a cancelled result.
    pub fn cancelled(job_id: String) -> Self {
        Self {
            cancelled: true,
            ..Self::failure(job_id, "Cancelled")
        }
    }

    fn with_log_path(mut self, path: Option<&Path>) -> Self {
        self.log_path = path.map(Path::to_path_buf);
        self
    }
}

/// Runs generation jobs, one at a time.
///
/// Cloning a generator shares its engine and its single-job lock, so a
/// clone handed to a worker thread still refuses concurrent jobs.
///
/// # Example
///
/// ```ignore
/// let generator = Generator::with_docx(settings).with_log_dir(".logs");
/// let handle = generator.spawn(request, None, Some(progress), CancelHandle::new())?;
/// let result = handle.join().expect("generation thread panicked");
/// ```
#[derive(Clone)]
pub struct Generator {
    /// Engine used to open templates.
    engine: Arc<dyn DocumentEngine>,
    /// Application settings.
    settings: Settings,
    /// Directory for per-job log files.
    log_dir: Option<PathBuf>,
    /// Held for the duration of a job.
    busy: Arc<Mutex<()>>,
}

impl Generator {
    /// Create a generator over an engine.
    pub fn new(engine: Arc<dyn DocumentEngine>, settings: Settings) -> Self {
        Self {
            engine,
            settings,
            log_dir: None,
            busy: Arc::new(Mutex::new(())),
        }
    }

    /// Create a generator for `.docx` templates.
    pub fn with_docx(settings: Settings) -> Self {
        Self::new(Arc::new(DocxEngine::new()), settings)
    }

    /// Write per-job log files into `dir` (when enabled in settings).
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Application settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether a job is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.is_locked()
    }

    /// Run one job on the calling thread.
    pub fn generate(
        &self,
        request: GenerationRequest,
        log_callback: Option<LogLineCallback>,
        progress_callback: Option<ProgressCallback>,
    ) -> JobResult {
        self.generate_with_cancel(request, log_callback, progress_callback, CancelHandle::new())
    }

    /// Run one job on the calling thread, stopping early if `cancel` fires.
    ///
    /// Fails immediately if another job is running on this generator.
    pub fn generate_with_cancel(
        &self,
        request: GenerationRequest,
        log_callback: Option<LogLineCallback>,
        progress_callback: Option<ProgressCallback>,
        cancel: CancelHandle,
    ) -> JobResult {
        let job_name = request.job_name();
        let job_id = format!("{}-{}", job_name, Local::now().format("%Y%m%d-%H%M%S"));

        let Some(_busy) = self.busy.try_lock() else {
            tracing::warn!(job = %job_name, "Rejected job: generator is busy");
            return JobResult::failure(job_id, "Another generation job is already running");
        };

        let logger = match self.create_logger(&job_name, log_callback) {
            Ok(logger) => Arc::new(logger),
            Err(e) => {
                return JobResult::failure(job_id, format!("Failed to create logger: {}", e));
            }
        };

        let mut ctx = Context::new(
            request,
            self.settings.clone(),
            Arc::clone(&self.engine),
            Arc::clone(&logger),
        )
        .with_cancel_handle(cancel.clone());
        if let Some(callback) = progress_callback {
            ctx = ctx.with_progress_callback(callback);
        }

        let mut state = JobState::new(&job_id);
        let pipeline = create_standard_pipeline().with_cancel_handle(cancel);

        logger.info(&format!("Starting job: {}", job_name));
        let outcome = pipeline.run(&ctx, &mut state);

        if state.release_session() {
            logger.debug("Document session released");
        }

        let result = match outcome {
            Ok(run_result) => {
                let report = std::mem::take(&mut state.report);
                logger.success(&format!("Job completed: {}", report.summary()));
                JobResult::success(job_id, report, run_result)
            }
            Err(e) if e.is_cancelled() => {
                logger.warn("Job cancelled; no report written");
                JobResult::cancelled(job_id)
            }
            Err(e) => {
                let error_msg = format!("Generation failed: {}", e);
                logger.error(&error_msg);
                logger.show_tail("generate");
                JobResult::failure(job_id, error_msg)
            }
        };

        logger.flush();
        result.with_log_path(logger.log_path())
    }

    /// Run one job on a named background thread.
    pub fn spawn(
        &self,
        request: GenerationRequest,
        log_callback: Option<LogLineCallback>,
        progress_callback: Option<ProgressCallback>,
        cancel: CancelHandle,
    ) -> std::io::Result<JoinHandle<JobResult>> {
        let generator = self.clone();
        thread::Builder::new()
            .name(format!("evidoc-{}", request.job_name()))
            .spawn(move || {
                generator.generate_with_cancel(request, log_callback, progress_callback, cancel)
            })
    }

    fn create_logger(
        &self,
        job_name: &str,
        callback: Option<LogLineCallback>,
    ) -> std::io::Result<JobLogger> {
        let config = LogConfig::from_settings(&self.settings.logging);
        match &self.log_dir {
            Some(dir) if self.settings.logging.write_job_logs => {
                JobLogger::new(job_name, dir, config, callback)
            }
            _ => Ok(JobLogger::detached(job_name, config, callback)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        Block, Document, DocumentSession, DocxSession, EngineResult, Paragraph, Table, TableCell,
        TableRow,
    };
    use crate::models::{Condition, FieldSet, PhotoItem, Placeholder};
    use image::{ImageBuffer, Rgb};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    const MARKER: &str = "%%PICTURE%%";

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(400, 300);
        img.save(&path).unwrap();
        path
    }

    fn write_template(path: &Path, blocks: Vec<Block>) {
        let mut doc = Document::new();
        for block in blocks {
            doc.push(block);
        }
        let mut session = DocxSession::from_document(doc);
        session.save_as(path).unwrap();
    }

    /// Header line plus a 2x2 picture grid.
    fn grid_template(path: &Path) {
        let row = || {
            TableRow::new(vec![
                TableCell::with_text(Some(4800), MARKER),
                TableCell::with_text(Some(4800), MARKER),
            ])
        };
        write_template(
            path,
            vec![
                Block::Paragraph(Paragraph::with_text("Unit %%UNIT%% / Case %%CASE%%")),
                Block::Table(Table::new(vec![row(), row()])),
            ],
        );
    }

    fn fields() -> FieldSet {
        FieldSet::new()
            .with(Placeholder::Unit, "Patrol 7")
            .with(Placeholder::Case, "Burglary 2024-117")
    }

    fn progress_recorder() -> (Arc<Mutex<Vec<u32>>>, ProgressCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callback: ProgressCallback = Box::new({
            let seen = Arc::clone(&seen);
            move |percent: u32, _: &str| seen.lock().push(percent)
        });
        (seen, callback)
    }

    #[test]
    fn missing_photo_is_annotated_and_job_succeeds() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        grid_template(&template);

        let mut photos: Vec<PhotoItem> = (1..=5)
            .map(|i| {
                PhotoItem::new(write_png(dir.path(), &format!("p{}.png", i)))
                    .with_caption(format!("Photo {}", i))
            })
            .collect();
        photos[2] = PhotoItem::new(dir.path().join("gone.png")).with_caption("Photo 3");

        let output = dir.path().join("reports").join("case.docx");
        let request = GenerationRequest::new(&template, &output, fields(), &photos);
        let (seen, progress) = progress_recorder();

        let result = Generator::with_docx(Settings::default()).generate(
            request,
            None,
            Some(progress),
        );

        assert!(result.success, "job failed: {:?}", result.error);
        let report = result.report.unwrap();
        assert_eq!(report.initial_slots, 4);
        assert_eq!(report.units_added, 1);
        assert_eq!(report.final_slots, 8);
        assert_eq!(report.slots_per_unit, Some(4));
        assert_eq!(report.photos_placed, 4);
        assert_eq!(report.photos_skipped, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 3);
        assert_eq!(result.output_path.as_deref(), Some(output.as_path()));

        let seen = seen.lock();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", *seen);
        assert_eq!(seen.last(), Some(&100));

        let engine = DocxEngine::new();
        let document = engine.read_document(&output).unwrap();
        assert_eq!(document.drawings().len(), 4);
        assert_eq!(document.page_count(), 2);

        let mut reopened = engine.open(&output).unwrap();
        assert_eq!(reopened.find_all("Patrol 7", None).unwrap().len(), 1);
        assert_eq!(reopened.find_all("[Photo error:", None).unwrap().len(), 1);
        assert_eq!(reopened.find_all("Photo 5", None).unwrap().len(), 1);
        // unused slots on the added page are left as they were
        assert_eq!(reopened.find_all(MARKER, Some(2)).unwrap().len(), 3);
        reopened.close(true);
    }

    #[test]
    fn template_without_slots_reports_condition() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        write_template(
            &template,
            vec![Block::Paragraph(Paragraph::with_text("Case %%CASE%%"))],
        );

        let photos = vec![
            PhotoItem::new(write_png(dir.path(), "a.png")),
            PhotoItem::new(write_png(dir.path(), "b.png")),
        ];
        let output = dir.path().join("case.docx");
        let request = GenerationRequest::new(&template, &output, fields(), &photos);

        let result = Generator::with_docx(Settings::default()).generate(request, None, None);

        assert!(result.success);
        let report = result.report.unwrap();
        assert_eq!(report.conditions, vec![Condition::NoSlots]);
        assert_eq!(report.photos_placed, 0);
        assert_eq!(report.photos_skipped, 2);
        assert!(output.is_file());
    }

    #[test]
    fn loose_slots_fill_and_surplus_is_skipped() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        write_template(
            &template,
            vec![
                Block::Paragraph(Paragraph::with_text(MARKER)),
                Block::Paragraph(Paragraph::with_text(MARKER)),
            ],
        );

        let photos: Vec<PhotoItem> = (1..=5)
            .map(|i| PhotoItem::new(write_png(dir.path(), &format!("p{}.png", i))))
            .collect();
        let output = dir.path().join("case.docx");
        let request = GenerationRequest::new(&template, &output, fields(), &photos);

        let result = Generator::with_docx(Settings::default()).generate(request, None, None);

        assert!(result.success, "job failed: {:?}", result.error);
        let report = result.report.unwrap();
        assert_eq!(report.final_slots, 2);
        assert_eq!(report.photos_placed, report.final_slots);
        assert_eq!(report.photos_skipped, 3);
        assert_eq!(report.units_added, 0);
        assert_eq!(
            report.conditions,
            vec![Condition::NoCloneableUnit {
                photos: 5,
                slots: 2
            }]
        );
        let document = DocxEngine::new().read_document(&output).unwrap();
        assert_eq!(document.drawings().len(), 2);
    }

    #[test]
    fn oversized_density_override_skips_surplus() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        grid_template(&template);

        let photos: Vec<PhotoItem> = (1..=9)
            .map(|i| PhotoItem::new(write_png(dir.path(), &format!("p{}.png", i))))
            .collect();
        let output = dir.path().join("case.docx");
        let request =
            GenerationRequest::new(&template, &output, fields(), &photos).with_slots_per_unit(8);

        let result = Generator::with_docx(Settings::default()).generate(request, None, None);

        assert!(result.success, "job failed: {:?}", result.error);
        let report = result.report.unwrap();
        assert_eq!(report.units_added, 1);
        assert_eq!(report.final_slots, 8);
        assert_eq!(report.photos_placed, 8);
        assert_eq!(report.photos_skipped, 1);
        assert!(report.failures.is_empty());
        assert_eq!(
            report.conditions,
            vec![Condition::SlotDensityMismatch {
                configured: 8,
                measured: 4
            }]
        );
        assert!(output.is_file());
    }

    #[test]
    fn missing_template_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("case.docx");
        let request = GenerationRequest::new(
            dir.path().join("absent.docx"),
            &output,
            fields(),
            &Vec::<PhotoItem>::new(),
        );
        let lines = Arc::new(Mutex::new(Vec::new()));
        let log: LogLineCallback = Box::new({
            let lines = Arc::clone(&lines);
            move |line: &str| lines.lock().push(line.to_string())
        });

        let result = Generator::with_docx(Settings::default()).generate(request, Some(log), None);

        assert!(!result.success);
        assert!(!result.cancelled);
        assert!(result.error.unwrap().contains("absent.docx"));
        assert!(!output.exists());
        assert!(lines.lock().iter().any(|l| l.contains("Generation failed")));
    }

    #[test]
    fn busy_generator_rejects_second_job() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        grid_template(&template);
        let generator = Generator::with_docx(Settings::default());
        let request = GenerationRequest::new(
            &template,
            dir.path().join("case.docx"),
            fields(),
            &Vec::<PhotoItem>::new(),
        );

        let held = generator.clone();
        let _guard = held.busy.lock();
        assert!(generator.is_busy());

        let result = generator.generate(request, None, None);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("already running"));
    }

    #[test]
    fn cancelled_job_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        grid_template(&template);
        let output = dir.path().join("case.docx");
        let request = GenerationRequest::new(
            &template,
            &output,
            fields(),
            &vec![PhotoItem::new(write_png(dir.path(), "a.png"))],
        );

        let cancel = CancelHandle::new();
        cancel.cancel();
        let result = Generator::with_docx(Settings::default()).generate_with_cancel(
            request,
            None,
            None,
            cancel,
        );

        assert!(result.cancelled);
        assert!(!result.success);
        assert!(!output.exists());
    }

    #[test]
    fn spawned_job_runs_off_thread() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        grid_template(&template);
        let output = dir.path().join("case.docx");
        let request = GenerationRequest::new(
            &template,
            &output,
            fields(),
            &vec![PhotoItem::new(write_png(dir.path(), "a.png"))],
        );

        let handle = Generator::with_docx(Settings::default())
            .spawn(request, None, None, CancelHandle::new())
            .unwrap();
        let result = handle.join().unwrap();

        assert!(result.success);
        assert_eq!(result.report.unwrap().photos_placed, 1);
        assert!(output.is_file());
    }

    #[test]
    fn job_log_written_when_log_dir_set() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        grid_template(&template);
        let logs = dir.path().join(".logs");
        let request = GenerationRequest::new(
            &template,
            dir.path().join("case.docx"),
            fields(),
            &Vec::<PhotoItem>::new(),
        );

        let result = Generator::with_docx(Settings::default())
            .with_log_dir(&logs)
            .generate(request, None, None);

        assert!(result.success);
        let log_path = result.log_path.unwrap();
        assert!(log_path.starts_with(&logs));
        assert!(std::fs::read_to_string(log_path)
            .unwrap()
            .contains("Starting job: case"));
    }

    /// Docx engine whose sessions flag when they are closed.
    struct TrackingEngine {
        closed: Arc<AtomicBool>,
    }

    impl DocumentEngine for TrackingEngine {
        fn name(&self) -> &str {
            "tracking"
        }

        fn open(&self, template: &Path) -> EngineResult<Box<dyn DocumentSession>> {
            let document = DocxEngine::new().read_document(template)?;
            let closed = Arc::clone(&self.closed);
            Ok(Box::new(DocxSession::from_document(document).with_close_hook(
                Box::new(move || closed.store(true, Ordering::SeqCst)),
            )))
        }
    }

    #[test]
    fn session_released_when_save_fails() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.docx");
        grid_template(&template);
        // a directory where the report should go makes the final rename fail
        let output = dir.path().join("case.docx");
        std::fs::create_dir(&output).unwrap();

        let closed = Arc::new(AtomicBool::new(false));
        let generator = Generator::new(
            Arc::new(TrackingEngine {
                closed: Arc::clone(&closed),
            }),
            Settings::default(),
        );
        let request =
            GenerationRequest::new(&template, &output, fields(), &Vec::<PhotoItem>::new());

        let result = generator.generate(request, None, None);

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Save"));
        assert!(closed.load(Ordering::SeqCst));
        assert!(!generator.is_busy());
    }
}
