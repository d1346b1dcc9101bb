//! Configuration management.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use entropyscan_core::entropy::MAX_ENTROPY;
use entropyscan_core::{ErrorPolicy, MAX_PID, MIN_PID};
use serde::{Deserialize, Serialize};

use crate::output::OutputFormat;

/// Keys accepted by `config set`.
pub const KEYS: &[(&str, &str)] = &[
    ("entropy_threshold", "Minimum entropy to report (0.0 - 8.0)"),
    ("elf_only", "Only analyze ELF files (true/false)"),
    ("output_format", "Default output format (pretty/csv/json)"),
    ("delimiter", "CSV field delimiter (one character)"),
    ("jobs", "Targets analyzed concurrently (1 or more)"),
    ("on_error", "Unreadable file handling (abort/skip)"),
    ("max_pid", "Exclusive PID bound for proc sweeps"),
];

/// Persistent defaults. Every field is optional; a command-line flag always
/// wins over the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub entropy_threshold: Option<f64>,

    #[serde(default)]
    pub elf_only: bool,

    pub output_format: Option<OutputFormat>,

    pub delimiter: Option<String>,

    pub jobs: Option<usize>,

    pub on_error: Option<ErrorPolicy>,

    pub max_pid: Option<u32>,
}

impl Config {
    /// Default config file path for this platform.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "entropyscan")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from `path`. A missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config {}", path.display()))?;

        Ok(())
    }

    /// Reject values that would be refused if given on the command line.
    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.entropy_threshold {
            check_threshold(threshold)?;
        }
        if let Some(delim) = &self.delimiter {
            parse_delimiter(delim)?;
        }
        if let Some(jobs) = self.jobs {
            check_jobs(jobs)?;
        }
        if let Some(max_pid) = self.max_pid {
            check_max_pid(max_pid)?;
        }
        Ok(())
    }

    /// Parse and store one `key = value` pair.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "entropy_threshold" | "entropy" => {
                let threshold = value
                    .parse()
                    .with_context(|| format!("not a number: {value}"))?;
                check_threshold(threshold)?;
                self.entropy_threshold = Some(threshold);
            }
            "elf_only" | "elf" => {
                self.elf_only = value
                    .parse()
                    .with_context(|| format!("expected true or false, got {value}"))?;
            }
            "output_format" | "output" => {
                self.output_format = Some(value.parse()?);
            }
            "delimiter" | "delim" => {
                parse_delimiter(value)?;
                self.delimiter = Some(value.to_string());
            }
            "jobs" => {
                let jobs = value
                    .parse()
                    .with_context(|| format!("not a count: {value}"))?;
                check_jobs(jobs)?;
                self.jobs = Some(jobs);
            }
            "on_error" => {
                self.on_error = Some(value.parse()?);
            }
            "max_pid" => {
                let max_pid = value
                    .parse()
                    .with_context(|| format!("not a PID: {value}"))?;
                check_max_pid(max_pid)?;
                self.max_pid = Some(max_pid);
            }
            _ => {
                let available: Vec<String> = KEYS
                    .iter()
                    .map(|(k, help)| format!("  {k:<18} - {help}"))
                    .collect();
                anyhow::bail!(
                    "Unknown config key: {}\n\nAvailable keys:\n{}",
                    key,
                    available.join("\n")
                );
            }
        }
        Ok(())
    }
}

pub fn check_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=MAX_ENTROPY).contains(&threshold) {
        anyhow::bail!("entropy threshold must be between 0.0 and {MAX_ENTROPY:.1}, got {threshold}");
    }
    Ok(())
}

/// A delimiter must be exactly one ASCII character.
pub fn parse_delimiter(delim: &str) -> Result<u8> {
    match delim.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => anyhow::bail!("delimiter must be a single ASCII character, got {delim:?}"),
    }
}

pub fn check_jobs(jobs: usize) -> Result<()> {
    if jobs == 0 {
        anyhow::bail!("jobs must be at least 1");
    }
    Ok(())
}

pub fn check_max_pid(max_pid: u32) -> Result<()> {
    if max_pid <= MIN_PID || max_pid > MAX_PID {
        anyhow::bail!("max_pid must be in {}..={MAX_PID}, got {max_pid}", MIN_PID + 1);
    }
    Ok(())
}
