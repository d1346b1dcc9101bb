//! Output formatting for different formats.

use std::borrow::Cow;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::str::FromStr;

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use entropyscan_core::{ClassificationRecord, DigestSet};
use serde::{Deserialize, Serialize};

/// Default CSV delimiter.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One `key: value` block per record
    #[default]
    Pretty,
    /// One delimited line per record, no header
    Csv,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "csv" => Ok(Self::Csv),
            "json" | "jsonl" => Ok(Self::Json),
            _ => anyhow::bail!(
                "Unknown output format: {}\n\
                 Valid formats: pretty, csv, json",
                s
            ),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// What a process sweep knows about a record beyond the file itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessNote {
    pub pid: u32,
    /// Opened by direct path but absent from the `/proc` listing.
    pub hidden: bool,
}

/// JSON strings must be UTF-8, so names and paths are decoded lossily here.
/// Pretty and CSV output carry the raw bytes.
#[derive(Serialize)]
struct JsonLine<'a> {
    filename: Cow<'a, str>,
    path: Cow<'a, str>,
    entropy: Option<f64>,
    elf: bool,
    md5: &'a str,
    sha1: &'a str,
    sha256: &'a str,
    sha512: &'a str,
    #[serde(flatten)]
    process: Option<ProcessNote>,
}

enum Sink<W: Write> {
    Pretty(W),
    Csv(csv::Writer<W>),
    Json(W),
}

/// `label value` line with the value written byte for byte.
fn write_raw<W: Write>(out: &mut W, label: &str, value: &[u8]) -> std::io::Result<()> {
    write!(out, "{} ", label.bold())?;
    out.write_all(value)?;
    writeln!(out)
}

/// Streams records to `W` in one output format, flushing after each so
/// output keeps pace with a long sweep.
pub struct RecordWriter<W: Write> {
    sink: Sink<W>,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(format: OutputFormat, delimiter: u8, out: W) -> Self {
        let sink = match format {
            OutputFormat::Pretty => Sink::Pretty(out),
            OutputFormat::Csv => Sink::Csv(
                csv::WriterBuilder::new()
                    .delimiter(delimiter)
                    .has_headers(false)
                    .from_writer(out),
            ),
            OutputFormat::Json => Sink::Json(out),
        };
        Self { sink, written: 0 }
    }

    /// Records written so far.
    pub const fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, record: &ClassificationRecord, process: Option<ProcessNote>) -> Result<()> {
        let empty = DigestSet::default();
        let digests = record.digests.as_ref().unwrap_or(&empty);
        let entropy = record.entropy.map_or_else(String::new, |e| format!("{e:.2}"));
        let name = record.name.as_bytes();
        let path = record.path.as_os_str().as_bytes();

        match &mut self.sink {
            Sink::Pretty(out) => {
                write_raw(out, "filename:", name)?;
                write_raw(out, "path:", path)?;
                writeln!(out, "{} {}", "entropy:".bold(), entropy)?;
                writeln!(out, "{} {}", "elf:".bold(), record.is_elf)?;
                writeln!(out, "{} {}", "md5:".bold(), digests.md5)?;
                writeln!(out, "{} {}", "sha1:".bold(), digests.sha1)?;
                writeln!(out, "{} {}", "sha256:".bold(), digests.sha256)?;
                writeln!(out, "{} {}", "sha512:".bold(), digests.sha512)?;
                if process.is_some_and(|p| p.hidden) {
                    writeln!(out, "{} {}", "hidden:".bold(), "true".red().bold())?;
                }
                writeln!(out)?;
                out.flush()?;
            }
            Sink::Csv(out) => {
                let elf: &[u8] = if record.is_elf { b"true" } else { b"false" };
                out.write_record([
                    name,
                    path,
                    entropy.as_bytes(),
                    elf,
                    digests.md5.as_bytes(),
                    digests.sha1.as_bytes(),
                    digests.sha256.as_bytes(),
                    digests.sha512.as_bytes(),
                ])?;
                out.flush()?;
            }
            Sink::Json(out) => {
                let line = JsonLine {
                    filename: record.name.to_string_lossy(),
                    path: record.path.to_string_lossy(),
                    entropy: record.entropy,
                    elf: record.is_elf,
                    md5: &digests.md5,
                    sha1: &digests.sha1,
                    sha256: &digests.sha256,
                    sha512: &digests.sha512,
                    process,
                };
                serde_json::to_writer(&mut *out, &line)?;
                writeln!(out)?;
                out.flush()?;
            }
        }

        self.written += 1;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        Ok(match self.sink {
            Sink::Pretty(out) | Sink::Json(out) => out,
            Sink::Csv(out) => out.into_inner().map_err(|e| e.into_error())?,
        })
    }
}
