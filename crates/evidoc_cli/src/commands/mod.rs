//! Subcommand implementations.

pub mod config;
pub mod generate;
pub mod inspect;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use evidoc_core::config::Settings;

/// Explicit template, or the first configured/default location that exists.
pub fn resolve_template(explicit: Option<&Path>, settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    settings
        .paths
        .resolve_template(exe_dir.as_deref())
        .ok_or_else(|| {
            anyhow!(
                "No template found (configured: {}); pass --template",
                settings.paths.template_path
            )
        })
}
