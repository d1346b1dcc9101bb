//! `entropyscan dir` - analyze every regular file under a directory.

use std::pin::pin;

use anyhow::{Context as _, Result};
use entropyscan_core::{walk, Sweep};
use futures_util::StreamExt;
use tracing::info;

use super::Context;
use crate::cli::args::DirArgs;

pub async fn execute(ctx: Context, args: DirArgs) -> Result<()> {
    let root = &args.path;
    let meta = tokio::fs::metadata(root)
        .await
        .with_context(|| format!("cannot read {}", root.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("not a directory: {}", root.display());
    }

    let sweep = Sweep::files(ctx.analyzer(), ctx.policy)
        .jobs(ctx.jobs)
        .on_error(ctx.on_error)
        .cancel_token(ctx.cancel.clone());
    let mut out = ctx.writer();

    info!(root = %root.display(), jobs = ctx.jobs, on_error = %ctx.on_error, "directory sweep started");

    let mut results = pin!(sweep.run(walk::regular_files(root)));
    while let Some(result) = results.next().await {
        let record = result.with_context(|| format!("sweep of {} aborted", root.display()))?;
        if record.is_reportable(sweep.policy()) {
            out.write(&record, None)?;
        }
    }

    let stats = sweep.stats();
    info!(
        examined = stats.examined,
        skipped = stats.skipped,
        reported = out.written(),
        "directory sweep finished"
    );
    Ok(())
}
