//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use std::io::IsTerminal;
use std::path::Path;

use anyhow::Result;
use args::{Cli, Commands, GlobalArgs};
use clap::Parser;
use entropyscan_core::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::logging;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let Cli { global, command } = Cli::parse();

    logging::init(global.verbose, global.quiet);

    if global.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let config_path = match &global.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    // Config management must work even when the file holds bad values, so
    // only the scan commands load and validate it.
    match command {
        Commands::Config(args) => commands::config::execute(&config_path, global.output, args),
        Commands::File(args) => commands::file::execute(scan_context(&global, &config_path)?, args).await,
        Commands::Dir(args) => commands::dir::execute(scan_context(&global, &config_path)?, args).await,
        Commands::Proc(args) => commands::proc::execute(scan_context(&global, &config_path)?, args).await,
    }
}

/// Resolve settings for a scan and arm Ctrl-C to cancel it.
fn scan_context(global: &GlobalArgs, config_path: &Path) -> Result<commands::Context> {
    let config = Config::load_from(config_path)?;
    let cancel = CancellationToken::new();
    let ctx = commands::Context::resolve(global, &config, config_path, cancel.clone())?;

    tokio::spawn(async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    warn!("interrupted, stopping");
                    cancel.cancel();
                }
            }
        }
    });

    Ok(ctx)
}
