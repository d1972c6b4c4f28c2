//! `evidoc config`

use anyhow::Result;
use clap::Subcommand;

use evidoc_core::config::ConfigManager;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write the settings file and create the output and logs folders
    Init,

    /// Print the effective settings
    Show,
}

impl ConfigCommand {
    pub fn execute(self, config: &ConfigManager, json: bool) -> Result<bool> {
        match self {
            ConfigCommand::Init => {
                config.save()?;
                config.ensure_dirs_exist()?;
                println!("Settings: {}", config.path().display());
            }
            ConfigCommand::Show => {
                if json {
                    println!("{}", serde_json::to_string_pretty(config.settings())?);
                } else {
                    println!("# {}", config.path().display());
                    print!("{}", toml::to_string_pretty(config.settings())?);
                }
            }
        }
        Ok(true)
    }
}
