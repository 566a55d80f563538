//! Sync command handler

use anyhow::{bail, Result};

use tend_core::{Service, SyncPhase};

use crate::output::Output;

/// Run one explicit reconcile/checkpoint/publish cycle
pub fn sync(service: &mut Service, output: &Output) -> Result<()> {
    if !service.config().sync_enabled {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             tend config set sync_enabled true\n\
             and add a git remote to the data directory."
        );
    }

    output.message("Syncing...");
    let status = service.sync_now().map_err(|e| anyhow::anyhow!("{e}"))?;

    match status.phase {
        SyncPhase::Idle => output.success("Sync complete"),
        SyncPhase::PendingRetry => {
            output.message("Sync incomplete; local checkpoints kept and will be retried")
        }
        SyncPhase::Blocked => {
            output.message("Sync blocked on a conflict; resolve it in the data directory")
        }
        _ => {}
    }
    output.print_sync_status(&status);
    Ok(())
}
