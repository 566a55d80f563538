//! Board handler: the default interactive view
//!
//! Prints the daily summary and the active list. Full-screen dashboard
//! rendering lives outside this crate; this is the plain-text surface.

use anyhow::Result;
use chrono::Local;

use tend_core::{Filter, Query, Service, SortKey, Status};

use crate::output::Output;

/// Show today's board
pub fn show(service: &mut Service, output: &Output) -> Result<()> {
    // Refresh-on-demand: pick up anything another process wrote
    service.refresh().map_err(|e| anyhow::anyhow!("{e}"))?;

    let today = Local::now().date_naive();
    output.print_summary(&service.daily_summary(today));

    let active = service.list(
        &Query::new(Filter {
            status: Some(Status::Active),
            ..Filter::default()
        })
        .sort_by(SortKey::DueDate),
    );

    output.message("");
    output.print_headers(&active);

    let sync = service.sync_status();
    if sync.phase.is_degraded() || sync.pending > 0 {
        output.message("");
        output.print_sync_status(&sync);
    }
    Ok(())
}
