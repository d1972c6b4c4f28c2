//! `evidoc generate`

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::Local;
use clap::Args;

use evidoc_core::config::ConfigManager;
use evidoc_core::models::{FieldSet, GenerationRequest, PhotoManifest, Placeholder};
use evidoc_core::orchestrator::{CancelHandle, Generator, JobResult, ProgressCallback};

use super::resolve_template;

#[derive(Args)]
pub struct GenerateCommand {
    /// Template document (default: resolved from settings)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Report path (default: timestamped file in the output folder)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Photo manifest (TOML list of [[photo]] entries)
    #[arg(long)]
    photos: PathBuf,

    /// Unit name
    #[arg(long)]
    unit: Option<String>,

    /// Case description
    #[arg(long)]
    case: Option<String>,

    /// Time of the incident
    #[arg(long)]
    time: Option<String>,

    /// Address of the scene
    #[arg(long)]
    address: Option<String>,

    /// Name of the officer
    #[arg(long)]
    name: Option<String>,

    /// Picture slots per added page (default: measured from the template)
    #[arg(long)]
    slots_per_unit: Option<usize>,

    /// Run even if UNIT or CASE is empty
    #[arg(long)]
    allow_missing_fields: bool,
}

impl GenerateCommand {
    fn fields(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        for (field, value) in [
            (Placeholder::Unit, &self.unit),
            (Placeholder::Case, &self.case),
            (Placeholder::Time, &self.time),
            (Placeholder::Address, &self.address),
            (Placeholder::Name, &self.name),
        ] {
            if let Some(value) = value {
                fields.set(field, value.as_str());
            }
        }
        fields
    }

    pub fn execute(self, config: &ConfigManager, json: bool) -> Result<bool> {
        let settings = config.settings();

        let fields = self.fields();
        let missing = fields.missing_required();
        if !missing.is_empty() && !self.allow_missing_fields {
            let names: Vec<&str> = missing.iter().map(|f| f.name()).collect();
            bail!(
                "Required field(s) missing: {} (use --allow-missing-fields to continue)",
                names.join(", ")
            );
        }

        let template = resolve_template(self.template.as_deref(), settings)?;
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| settings.paths.default_output_path(&Local::now()));
        let manifest = PhotoManifest::load(&self.photos)
            .with_context(|| format!("Loading photos from {}", self.photos.display()))?;

        let mut request = GenerationRequest::new(&template, &output, fields, &manifest);
        if let Some(slots) = self.slots_per_unit {
            request = request.with_slots_per_unit(slots);
        }

        let progress: Option<ProgressCallback> = if json {
            None
        } else {
            Some(Box::new(|percent: u32, label: &str| {
                eprintln!("[{:>3}%] {}", percent, label);
            }))
        };

        let generator = Generator::with_docx(settings.clone()).with_log_dir(config.logs_folder());
        let result = generator
            .spawn(request, None, progress, CancelHandle::new())
            .context("Starting generation thread")?
            .join()
            .map_err(|_| anyhow!("Generation thread panicked"))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_result(&result);
        }
        Ok(result.success)
    }
}

fn print_result(result: &JobResult) {
    match &result.report {
        Some(report) => {
            println!("Report: {}", report.output.display());
            println!("  {}", report.summary());
            for failure in &report.failures {
                println!(
                    "  photo {} ({}): {}",
                    failure.index,
                    failure.path.display(),
                    failure.reason
                );
            }
            for condition in &report.conditions {
                println!("  warning: {}", condition);
            }
        }
        None if result.cancelled => println!("Cancelled; no report written"),
        None => println!(
            "Failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
    if let Some(log) = &result.log_path {
        println!("Log: {}", log.display());
    }
}
