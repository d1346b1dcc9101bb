//! # entropyscan-cli
//!
//! Command-line front end for `entropyscan-core`.
//!
//! ## Features
//!
//! - **Single file**, **directory tree** and **PID-busting process** sweeps
//! - **Hidden process flagging**: PIDs that open directly but are missing
//!   from the `/proc` listing
//! - **Output formats**: the classic text block, delimited CSV, JSON Lines
//! - **Persistent defaults** in a TOML config file

pub mod cli;
pub mod config;
pub mod logging;
pub mod output;

pub use cli::run;
