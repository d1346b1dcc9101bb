//! `entropyscan config` - config file management.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::config::Config;
use crate::output::OutputFormat;

pub fn execute(path: &Path, format: Option<OutputFormat>, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(path, format),
        ConfigCommands::Set { key, value } => set_config(path, &key, &value),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn show_config(path: &Path, format: Option<OutputFormat>) -> Result<()> {
    let config = Config::load_from(path)?;

    if format == Some(OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let unset = || "(not set)".dimmed().to_string();
    let show = |v: Option<String>| v.unwrap_or_else(unset);

    println!("{}", "Current Configuration:".bold());
    println!();
    println!("  {} {}", "entropy_threshold:".bold(), show(config.entropy_threshold.map(|t| format!("{t:.2}"))));
    println!("  {} {}", "elf_only:".bold(), config.elf_only);
    println!("  {} {}", "output_format:".bold(), show(config.output_format.map(|f| f.to_string())));
    println!("  {} {}", "delimiter:".bold(), show(config.delimiter.map(|d| format!("{d:?}"))));
    println!("  {} {}", "jobs:".bold(), show(config.jobs.map(|j| j.to_string())));
    println!("  {} {}", "on_error:".bold(), show(config.on_error.map(|p| p.to_string())));
    println!("  {} {}", "max_pid:".bold(), show(config.max_pid.map(|p| p.to_string())));

    Ok(())
}

fn set_config(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load_from(path)?;
    config.set(key, value)?;
    config.save_to(path)?;

    println!("{} {} set to {}.", "Success:".green().bold(), key, value.cyan());
    Ok(())
}
