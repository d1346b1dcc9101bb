//! Command implementations.

pub mod config;
pub mod dir;
pub mod file;
pub mod proc;

use std::io::Stdout;
use std::path::Path;

use anyhow::{Context as _, Result};
use entropyscan_core::{CancellationToken, ErrorPolicy, FsAnalyzer, ScanPolicy};

use super::args::GlobalArgs;
use crate::config::{self as settings, Config};
use crate::output::{OutputFormat, RecordWriter, DEFAULT_DELIMITER};

/// Shared context for the scan commands. Every value is resolved from the
/// command line first, then the config file, then the built-in default.
#[derive(Debug, Clone)]
pub struct Context {
    /// Which targets to analyze and which to hash and report.
    pub policy: ScanPolicy,

    pub output_format: OutputFormat,

    /// CSV field delimiter.
    pub delimiter: u8,

    /// Targets classified concurrently.
    pub jobs: usize,

    pub on_error: ErrorPolicy,

    /// Exclusive PID bound for `proc` from the config file.
    pub max_pid: Option<u32>,

    /// Raised on Ctrl-C.
    pub cancel: CancellationToken,
}

impl Context {
    pub fn resolve(
        args: &GlobalArgs,
        config: &Config,
        config_path: &Path,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config
            .validate()
            .with_context(|| format!("invalid config {}", config_path.display()))?;

        let threshold = args.entropy.or(config.entropy_threshold).unwrap_or(0.0);
        let policy = ScanPolicy::new(args.elf || config.elf_only, threshold)?;

        let output_format = if args.csv {
            OutputFormat::Csv
        } else {
            args.output.or(config.output_format).unwrap_or_default()
        };

        let delimiter = match args.delim.as_deref().or(config.delimiter.as_deref()) {
            Some(delim) => settings::parse_delimiter(delim)?,
            None => DEFAULT_DELIMITER,
        };

        let jobs = args.jobs.or(config.jobs).unwrap_or(1);
        settings::check_jobs(jobs)?;

        Ok(Self {
            policy,
            output_format,
            delimiter,
            jobs,
            on_error: args.on_error.or(config.on_error).unwrap_or_default(),
            max_pid: config.max_pid,
            cancel,
        })
    }

    /// Filesystem analyzer wired to this run's cancellation token.
    pub fn analyzer(&self) -> FsAnalyzer {
        FsAnalyzer::new(self.cancel.clone())
    }

    pub fn writer(&self) -> RecordWriter<Stdout> {
        RecordWriter::new(self.output_format, self.delimiter, std::io::stdout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(args: &GlobalArgs, config: &Config) -> Result<Context> {
        Context::resolve(args, config, Path::new("config.toml"), CancellationToken::new())
    }

    #[test]
    fn defaults_without_flags_or_file() {
        let ctx = resolve(&GlobalArgs::default(), &Config::default()).unwrap();
        assert_eq!(ctx.policy, ScanPolicy::default());
        assert_eq!(ctx.output_format, OutputFormat::Pretty);
        assert_eq!(ctx.delimiter, b',');
        assert_eq!(ctx.jobs, 1);
        assert_eq!(ctx.on_error, ErrorPolicy::Abort);
        assert_eq!(ctx.max_pid, None);
    }

    #[test]
    fn file_fills_in_missing_flags() {
        let config = Config {
            entropy_threshold: Some(7.7),
            elf_only: true,
            output_format: Some(OutputFormat::Json),
            delimiter: Some(";".into()),
            jobs: Some(4),
            on_error: Some(ErrorPolicy::Skip),
            max_pid: Some(32_768),
        };
        let ctx = resolve(&GlobalArgs::default(), &config).unwrap();
        assert!(ctx.policy.elf_only);
        assert!((ctx.policy.entropy_threshold - 7.7).abs() < f64::EPSILON);
        assert_eq!(ctx.output_format, OutputFormat::Json);
        assert_eq!(ctx.delimiter, b';');
        assert_eq!(ctx.jobs, 4);
        assert_eq!(ctx.on_error, ErrorPolicy::Skip);
        assert_eq!(ctx.max_pid, Some(32_768));
    }

    #[test]
    fn flags_beat_the_file() {
        let config = Config {
            entropy_threshold: Some(7.7),
            output_format: Some(OutputFormat::Json),
            delimiter: Some(";".into()),
            jobs: Some(4),
            ..Config::default()
        };
        let args = GlobalArgs {
            entropy: Some(6.0),
            csv: true,
            delim: Some("\t".into()),
            jobs: Some(2),
            ..GlobalArgs::default()
        };
        let ctx = resolve(&args, &config).unwrap();
        assert!((ctx.policy.entropy_threshold - 6.0).abs() < f64::EPSILON);
        assert_eq!(ctx.output_format, OutputFormat::Csv);
        assert_eq!(ctx.delimiter, b'\t');
        assert_eq!(ctx.jobs, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_flag = GlobalArgs {
            entropy: Some(8.5),
            ..GlobalArgs::default()
        };
        assert!(resolve(&bad_flag, &Config::default()).is_err());

        let bad_jobs = GlobalArgs {
            jobs: Some(0),
            ..GlobalArgs::default()
        };
        assert!(resolve(&bad_jobs, &Config::default()).is_err());

        let bad_file = Config {
            delimiter: Some("::".into()),
            ..Config::default()
        };
        assert!(resolve(&GlobalArgs::default(), &bad_file).is_err());
    }
}
