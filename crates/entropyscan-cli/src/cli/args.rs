//! Command-line argument definitions using clap.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use entropyscan_core::ErrorPolicy;

use crate::output::OutputFormat;

/// Find packed or encrypted ELF files and processes by entropy.
///
/// Every target gets an ELF signature check and a Shannon entropy score
/// (0.0 - 8.0). Anything at or above the threshold is hashed with MD5,
/// SHA-1, SHA-256 and SHA-512 and printed.
#[derive(Parser, Debug)]
#[command(name = "entropyscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Minimum entropy to report and hash (0.0 - 8.0, inclusive)
    #[arg(short, long = "entropy", value_name = "LEVEL", global = true)]
    pub entropy: Option<f64>,

    /// Only analyze ELF files
    #[arg(long, global = true)]
    pub elf: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Shorthand for --output csv
    #[arg(long, global = true, conflicts_with = "output")]
    pub csv: bool,

    /// CSV field delimiter (a single character)
    #[arg(short, long = "delim", value_name = "CHAR", global = true)]
    pub delim: Option<String>,

    /// Targets to analyze concurrently
    #[arg(short, long, value_name = "N", global = true)]
    pub jobs: Option<usize>,

    /// What to do when an existing file cannot be read
    #[arg(long, value_name = "abort|skip", global = true)]
    pub on_error: Option<ErrorPolicy>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH", env = "ENTROPYSCAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a single file
    File(FileArgs),

    /// Analyze every regular file under a directory
    Dir(DirArgs),

    /// Analyze every running process image by busting the PID space
    Proc(ProcArgs),

    /// Manage the config file
    Config(ConfigArgs),
}

// ============================================================================
// File command
// ============================================================================

#[derive(Args, Debug)]
pub struct FileArgs {
    /// File to analyze
    pub path: PathBuf,
}

// ============================================================================
// Dir command
// ============================================================================

#[derive(Args, Debug)]
pub struct DirArgs {
    /// Directory to walk (symbolic links are not followed)
    pub path: PathBuf,
}

// ============================================================================
// Proc command
// ============================================================================

#[derive(Args, Debug)]
pub struct ProcArgs {
    /// Only try PIDs below N
    #[arg(long, value_name = "N", conflicts_with = "kernel_limit")]
    pub max_pid: Option<u32>,

    /// Only try PIDs below the running kernel's pid_max
    #[arg(long)]
    pub kernel_limit: bool,

    /// Only report processes missing from the /proc listing
    #[arg(long)]
    pub hidden_only: bool,
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Key: entropy_threshold, elf_only, output_format, delimiter, jobs,
        /// on_error or max_pid
        key: String,

        /// Value to store
        value: String,
    },

    /// Print the config file path
    Path,
}
