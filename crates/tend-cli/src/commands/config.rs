//! Config command handlers

use anyhow::{bail, Context, Result};

use tend_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration ({}):", Config::config_file_path().display());
            println!("  data_dir:        {}", config.data_dir.display());
            println!("  sync_enabled:    {}", config.sync_enabled);
            println!("  lock_timeout_ms: {}", config.lock_timeout_ms);
            println!("  lock_stale_ms:   {}", config.lock_stale_ms);
            println!("  batch_window_ms: {}", config.batch_window_ms);
            println!("  git_timeout_secs: {}", config.git_timeout_secs);
        }
    }
    Ok(())
}

/// Set a configuration value and save it
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    match key.as_str() {
        "data_dir" => config.data_dir = value.clone().into(),
        "sync_enabled" => {
            config.sync_enabled = value.eq_ignore_ascii_case("true") || value == "1";
        }
        "lock_timeout_ms" => config.lock_timeout_ms = parse_number(&key, &value)?,
        "lock_stale_ms" => config.lock_stale_ms = parse_number(&key, &value)?,
        "batch_window_ms" => config.batch_window_ms = parse_number(&key, &value)?,
        "git_timeout_secs" => config.git_timeout_secs = parse_number(&key, &value)?,
        _ => bail!("Unknown configuration key '{}'", key),
    }

    config.save()?;
    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("{} expects a number, got '{}'", key, value))
}
