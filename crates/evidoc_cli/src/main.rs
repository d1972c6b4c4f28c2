//! evidoc - build photo evidence reports from document templates.
//!
//! Loads settings, initialises logging and dispatches to a subcommand.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use evidoc_core::config::ConfigManager;
use evidoc_core::logging::{init_tracing, LogLevel};

mod commands;

use commands::config::ConfigCommand;
use commands::generate::GenerateCommand;
use commands::inspect::InspectCommand;

#[derive(Parser)]
#[command(
    name = "evidoc",
    version,
    about = "Fill a document template with case details and photos",
    after_help = "EXAMPLES:\n  \
                  evidoc generate --photos scene/photos.toml --unit \"Patrol 7\" --case 2024-117\n  \
                  evidoc inspect --template template.docx\n  \
                  evidoc config show"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (created with defaults if missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report from a template and a photo manifest
    Generate(GenerateCommand),

    /// Show picture slots and the cloneable unit of a template
    Inspect(InspectCommand),

    /// Create or print the settings file
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Platform config dir, falling back to `.config/settings.toml`.
fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "evidoc")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from(".config").join("settings.toml"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration first: it carries the default log level
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = ConfigManager::new(&config_path);
    if let Err(e) = config.load_or_create() {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
    }

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config
            .settings()
            .logging
            .level
            .parse()
            .unwrap_or_default()
    };
    init_tracing(level);
    tracing::debug!("Config: {}", config_path.display());

    match run(cli, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &ConfigManager) -> Result<bool> {
    match cli.command {
        Commands::Generate(cmd) => cmd.execute(config, cli.json),
        Commands::Inspect(cmd) => cmd.execute(config, cli.json),
        Commands::Config(cmd) => cmd.execute(config, cli.json),
    }
}
