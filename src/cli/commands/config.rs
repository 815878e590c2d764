//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, config_path: Option<&PathBuf>, settings: Settings) -> Result<()> {
    let config_path = config_path.cloned().unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                Output::warning(&format!("Config already exists at {}", config_path.display()));
                Output::info("Use --force to overwrite it.");
                return Ok(());
            }

            settings.save_to(&config_path)?;
            Output::success(&format!("Wrote config to {}", config_path.display()));
        }
    }

    Ok(())
}
