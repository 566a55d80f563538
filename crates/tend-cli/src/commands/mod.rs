//! Command handlers
//!
//! One module per command group; all handlers take the facade and an
//! `Output` and stay thin.

pub mod board;
pub mod config;
pub mod record;
pub mod status;
pub mod sync;

use anyhow::{bail, Result};
use uuid::Uuid;

use tend_core::Service;

/// Resolve a full UUID or a unique prefix against the index
pub fn resolve_id(service: &Service, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }

    let matches: Vec<Uuid> = service
        .store()
        .list_headers()
        .iter()
        .map(|h| h.id)
        .filter(|id| id.to_string().starts_with(&input.to_lowercase()))
        .collect();

    match matches.len() {
        0 => bail!("No record matches id '{}'", input),
        1 => Ok(matches[0]),
        n => bail!("Id prefix '{}' is ambiguous ({} matches)", input, n),
    }
}
