//! `entropyscan proc` - analyze every process image by PID busting.
//!
//! Every PID in the range is tried directly through `/proc/<pid>/exe`.
//! A process image that opens this way but is missing from the `/proc`
//! directory listing is flagged as hidden.

use std::pin::pin;

use anyhow::{Context as _, Result};
use entropyscan_core::process::pid_of;
use entropyscan_core::{PidRange, ProcListing, Sweep};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use super::Context;
use crate::cli::args::ProcArgs;
use crate::config::check_max_pid;
use crate::output::ProcessNote;

pub async fn execute(ctx: Context, args: ProcArgs) -> Result<()> {
    let range = pid_range(&ctx, &args)?;

    let mut listing = match ProcListing::read() {
        Ok(listing) => Some(listing),
        Err(e) if args.hidden_only => {
            return Err(e).context("--hidden-only needs a readable /proc listing");
        }
        Err(e) => {
            warn!(error = %e, "cannot list /proc, hidden process detection disabled");
            None
        }
    };

    let sweep = Sweep::processes(ctx.analyzer(), ctx.policy)
        .jobs(ctx.jobs)
        .cancel_token(ctx.cancel.clone());
    let mut out = ctx.writer();
    let mut hidden_seen = 0u64;

    info!(
        start = range.start(),
        end = range.end(),
        jobs = ctx.jobs,
        "process sweep started"
    );

    let mut results = pin!(sweep.run(range.candidates().map(Ok)));
    while let Some(result) = results.next().await {
        let record = result.context("process sweep aborted")?;
        let Some(pid) = pid_of(&record.path) else {
            continue;
        };

        let hidden = listing.as_mut().is_some_and(|l| {
            l.is_hidden(pid).unwrap_or_else(|e| {
                debug!(pid, error = %e, "listing check failed");
                false
            })
        });
        if hidden {
            hidden_seen += 1;
            warn!(pid, path = %record.path.display(), "process is missing from the /proc listing");
        }

        if args.hidden_only && !hidden {
            continue;
        }
        if record.is_reportable(sweep.policy()) {
            out.write(&record, Some(ProcessNote { pid, hidden }))?;
        }
    }

    let stats = sweep.stats();
    info!(
        examined = stats.examined,
        processes = stats.records,
        hidden = hidden_seen,
        reported = out.written(),
        "process sweep finished"
    );
    Ok(())
}

/// `--max-pid` wins over `--kernel-limit`, which wins over `max_pid` in the
/// config file. Without any of them the whole PID space is tried.
fn pid_range(ctx: &Context, args: &ProcArgs) -> Result<PidRange> {
    if let Some(max) = args.max_pid {
        check_max_pid(max)?;
        return Ok(PidRange::up_to(max));
    }
    if args.kernel_limit {
        return Ok(PidRange::from_kernel());
    }
    Ok(ctx.max_pid.map_or_else(PidRange::default, PidRange::up_to))
}
