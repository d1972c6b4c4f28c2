//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// File name looked up next to the executable when no template is configured.
pub const DEFAULT_TEMPLATE_NAME: &str = "template.docx";

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Template marker settings.
    #[serde(default)]
    pub template: TemplateSettings,

    /// Photo layout inside slots.
    #[serde(default)]
    pub layout: LayoutSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Path configuration for the template, reports, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Template document.
    #[serde(default = "default_template_path")]
    pub template_path: String,

    /// Output folder for generated reports.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Folder for job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_template_path() -> String {
    DEFAULT_TEMPLATE_NAME.to_string()
}

fn default_output_folder() -> String {
    "reports".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            output_folder: default_output_folder(),
            logs_folder: default_logs_folder(),
        }
    }
}

impl PathSettings {
    /// First existing template among the configured path, `template.docx`
    /// next to the executable, and `template.docx` two levels above it.
    pub fn resolve_template(&self, exe_dir: Option<&Path>) -> Option<PathBuf> {
        let mut candidates = vec![PathBuf::from(&self.template_path)];
        if let Some(dir) = exe_dir {
            candidates.push(dir.join(DEFAULT_TEMPLATE_NAME));
            if let Some(grandparent) = dir.parent().and_then(Path::parent) {
                candidates.push(grandparent.join(DEFAULT_TEMPLATE_NAME));
            }
        }
        candidates.into_iter().find(|path| path.is_file())
    }

    /// Timestamped report path inside the output folder.
    pub fn default_output_path<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: std::fmt::Display,
    {
        PathBuf::from(&self.output_folder).join(format!(
            "evidence_photos_{}.docx",
            now.format("%Y%m%d_%H%M%S")
        ))
    }
}

/// Marker and slot density settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Literal marking a picture slot.
    #[serde(default = "default_picture_marker")]
    pub picture_marker: String,

    /// Slots per cloned unit. Derived from the template when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots_per_unit: Option<usize>,
}

fn default_picture_marker() -> String {
    "%%PICTURE%%".to_string()
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            picture_marker: default_picture_marker(),
            slots_per_unit: None,
        }
    }
}

/// How photos are sized inside their slots. Lengths are in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    /// Share of the container width a photo may use.
    #[serde(default = "default_usable_width_ratio")]
    pub usable_width_ratio: f32,

    /// Bounding height as a share of the bounding width.
    #[serde(default = "default_height_ratio")]
    pub height_ratio: f32,

    /// Bounds used when a slot has no measurable container.
    #[serde(default = "default_fallback_width")]
    pub fallback_width: f32,

    #[serde(default = "default_fallback_height")]
    pub fallback_height: f32,

    /// Lower clamp for the bounding box.
    #[serde(default = "default_min_width")]
    pub min_width: f32,

    #[serde(default = "default_min_height")]
    pub min_height: f32,

    /// Hex RGB colour of per-photo error annotations.
    #[serde(default = "default_error_color")]
    pub error_color: String,
}

fn default_usable_width_ratio() -> f32 {
    0.8
}

fn default_height_ratio() -> f32 {
    0.75
}

fn default_fallback_width() -> f32 {
    400.0
}

fn default_fallback_height() -> f32 {
    300.0
}

fn default_min_width() -> f32 {
    150.0
}

fn default_min_height() -> f32 {
    120.0
}

fn default_error_color() -> String {
    "FF0000".to_string()
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            usable_width_ratio: default_usable_width_ratio(),
            height_ratio: default_height_ratio(),
            fallback_width: default_fallback_width(),
            fallback_height: default_fallback_height(),
            min_width: default_min_width(),
            min_height: default_min_height(),
            error_color: default_error_color(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default tracing level when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Number of recent lines shown when a job fails.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Write a log file per job into the logs folder.
    #[serde(default = "default_true")]
    pub write_job_logs: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
            write_job_logs: true,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Template,
    Layout,
    Logging,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Paths,
        ConfigSection::Template,
        ConfigSection::Layout,
        ConfigSection::Logging,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Template => "template",
            ConfigSection::Layout => "layout",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment written above the section.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Template, report, and log locations",
            ConfigSection::Template => "Picture marker and slot density",
            ConfigSection::Layout => "Photo sizing inside slots (points)",
            ConfigSection::Logging => "Logging configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate};
    use tempfile::tempdir;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[layout]"));
        assert!(toml.contains("picture_marker"));
        assert!(!toml.contains("slots_per_unit"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[paths]\noutput_folder = \"custom_output\"\n[template]\nslots_per_unit = 4";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        // Custom values preserved
        assert_eq!(parsed.paths.output_folder, "custom_output");
        assert_eq!(parsed.template.slots_per_unit, Some(4));
        // Defaults applied for missing
        assert_eq!(parsed.paths.template_path, "template.docx");
        assert_eq!(parsed.layout, LayoutSettings::default());
        assert!(parsed.logging.compact);
    }

    #[test]
    fn default_output_name_is_timestamped() {
        let paths = PathSettings::default();
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap();
        assert_eq!(
            paths.default_output_path(&now),
            PathBuf::from("reports").join("evidence_photos_20240309_140507.docx")
        );
    }

    #[test]
    fn resolves_template_next_to_executable() {
        let dir = tempdir().unwrap();
        let exe_dir = dir.path().join("target").join("release");
        std::fs::create_dir_all(&exe_dir).unwrap();
        let paths = PathSettings {
            template_path: dir.path().join("absent.docx").display().to_string(),
            ..Default::default()
        };

        assert_eq!(paths.resolve_template(Some(&exe_dir)), None);

        let upper = dir.path().join(DEFAULT_TEMPLATE_NAME);
        std::fs::write(&upper, b"x").unwrap();
        assert_eq!(paths.resolve_template(Some(&exe_dir)), Some(upper));

        let beside = exe_dir.join(DEFAULT_TEMPLATE_NAME);
        std::fs::write(&beside, b"x").unwrap();
        assert_eq!(paths.resolve_template(Some(&exe_dir)), Some(beside));
    }
}
