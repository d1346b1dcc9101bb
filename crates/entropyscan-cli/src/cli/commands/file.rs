//! `entropyscan file` - analyze a single file.

use anyhow::{Context as _, Result};
use entropyscan_core::classify;
use tracing::debug;

use super::Context;
use crate::cli::args::FileArgs;

pub async fn execute(ctx: Context, args: FileArgs) -> Result<()> {
    let path = &args.path;
    let record = classify(path, &ctx.policy, &ctx.analyzer())
        .await
        .with_context(|| format!("failed to scan {}", path.display()))?;

    if record.is_reportable(&ctx.policy) {
        ctx.writer().write(&record, None)?;
    } else {
        debug!(
            path = %path.display(),
            elf = record.is_elf,
            entropy = ?record.entropy,
            "below threshold, not reported"
        );
    }

    Ok(())
}
