//! Status command handler

use anyhow::Result;

use tend_core::Service;

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(service: &Service, output: &Output) -> Result<()> {
    let config = service.config();
    let sync = service.sync_status();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "records": service.store().len(),
                    "skipped": service.store().skipped(),
                    "sync_enabled": config.sync_enabled,
                    "sync": sync,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", sync.phase);
        }
        OutputFormat::Human => {
            println!("tend status");
            println!("===========");
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!("  Records:  {}", service.store().len());
            if service.store().skipped() > 0 {
                println!("  Skipped:  {} (malformed or duplicate)", service.store().skipped());
            }
            println!();
            println!(
                "Sync: {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            if config.sync_enabled {
                println!("  Phase: {}", sync.phase);
                if sync.pending > 0 {
                    println!("  Unpublished checkpoints: {}", sync.pending);
                }
                if let Some(ref error) = sync.last_error {
                    println!("  Last error: {}", error);
                }
            }
        }
    }

    Ok(())
}
