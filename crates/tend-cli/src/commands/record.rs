//! Record command handlers: add, list, show, set, done

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use uuid::Uuid;

use tend_core::{
    Draft, Filter, Kind, Patch, Priority, Query, Service, SortKey, Status, SyncPhase,
};

use crate::commands::resolve_id;
use crate::output::Output;

/// Create a new record
#[allow(clippy::too_many_arguments)]
pub fn add(
    service: &mut Service,
    title: String,
    kind: Option<String>,
    body: Option<String>,
    priority: Option<String>,
    tags: Vec<String>,
    due: Option<String>,
    goal: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut draft = Draft::new(title).tags(tags);
    if let Some(kind) = kind {
        draft = draft.kind(parse_kind(&kind)?);
    }
    if let Some(body) = body {
        draft = draft.body(body);
    }
    if let Some(priority) = priority {
        draft = draft.priority(parse_priority(&priority)?);
    }
    if let Some(due) = due {
        draft = draft.due_date(parse_date(&due)?);
    }
    if let Some(goal) = goal {
        draft = draft.parent_goal(resolve_id(service, &goal)?);
    }

    let outcome = service.create(draft).context("Failed to create record")?;
    report_sync(&outcome.sync, output);
    output.success(&format!("Created {}", outcome.record.id()));
    output.print_record(&outcome.record);
    Ok(())
}

/// List records with optional filters
#[allow(clippy::too_many_arguments)]
pub fn list(
    service: &Service,
    status: Option<String>,
    kind: Option<String>,
    tag: Option<String>,
    priority: Option<String>,
    due_before: Option<String>,
    archived: bool,
    sort: Option<String>,
    limit: Option<usize>,
    output: &Output,
) -> Result<()> {
    let filter = Filter {
        status: status.as_deref().map(parse_status).transpose()?,
        kind: kind.as_deref().map(parse_kind).transpose()?,
        tag,
        priority: priority.as_deref().map(parse_priority).transpose()?,
        due_before: due_before.as_deref().map(parse_date).transpose()?,
        due_after: None,
        include_archived: archived,
    };

    let mut query = Query::new(filter);
    if let Some(sort) = sort {
        query = query.sort_by(parse_sort(&sort)?);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    output.print_headers(&service.list(&query));
    Ok(())
}

/// Show a single record in full
pub fn show(service: &Service, id: String, output: &Output) -> Result<()> {
    let id = resolve_id(service, &id)?;
    let record = service
        .read_detail(id)
        .map_err(|e| anyhow!("{e}"))?;
    output.print_record(&record);
    Ok(())
}

/// Apply one field mutation
pub fn set(
    service: &mut Service,
    id: String,
    field: String,
    value: String,
    output: &Output,
) -> Result<()> {
    let id = resolve_id(service, &id)?;
    let patch = parse_patch(&field, &value)?;

    let outcome = service
        .patch(id, patch)
        .map_err(|e| anyhow!("{e}"))?;
    report_sync(&outcome.sync, output);
    output.success(&format!("Updated {} of {}", field, outcome.record.id()));
    Ok(())
}

/// Mark a record done
pub fn done(service: &mut Service, id: String, output: &Output) -> Result<()> {
    let id = resolve_id(service, &id)?;
    let outcome = service.complete(id).map_err(|e| anyhow!("{e}"))?;
    report_sync(&outcome.sync, output);
    output.success(&format!("Done: {}", outcome.record.header.title));
    Ok(())
}

/// Surface degraded sync as a warning, not a failure
fn report_sync(phase: &SyncPhase, output: &Output) {
    match phase {
        SyncPhase::PendingRetry => {
            output.message("Saved locally; publish pending (will retry on next change)")
        }
        SyncPhase::Blocked => {
            output.message("Saved locally; sync blocked on a conflict needing manual resolution")
        }
        _ => {}
    }
}

/// Build a patch from a field name and its string value
pub fn parse_patch(field: &str, value: &str) -> Result<Patch> {
    Ok(match field {
        "title" => Patch::Title(value.to_string()),
        "status" => Patch::Status(parse_status(value)?),
        "priority" => {
            if value.is_empty() || value == "none" {
                Patch::Priority(None)
            } else {
                Patch::Priority(Some(parse_priority(value)?))
            }
        }
        "tags" => Patch::Tags(
            value
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        ),
        "due_date" => {
            if value.is_empty() || value == "none" {
                Patch::DueDate(None)
            } else {
                Patch::DueDate(Some(parse_date(value)?))
            }
        }
        "parent_goal_id" => {
            if value.is_empty() || value == "none" {
                Patch::ParentGoal(None)
            } else {
                Patch::ParentGoal(Some(
                    Uuid::parse_str(value).context("parent_goal_id must be a UUID")?,
                ))
            }
        }
        "body" => Patch::AppendBody(value.to_string()),
        _ => bail!(
            "Unknown field '{}'; expected one of title, status, priority, tags, due_date, parent_goal_id, body",
            field
        ),
    })
}

fn parse_status(value: &str) -> Result<Status> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid status '{}'", value))
}

fn parse_kind(value: &str) -> Result<Kind> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid kind '{}'", value))
}

fn parse_priority(value: &str) -> Result<Priority> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid priority '{}'", value))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'; expected YYYY-MM-DD", value))
}

fn parse_sort(value: &str) -> Result<SortKey> {
    Ok(match value {
        "due_date" | "due" => SortKey::DueDate,
        "priority" => SortKey::Priority,
        "created_at" | "created" => SortKey::CreatedAt,
        _ => bail!("Invalid sort key '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patch_fields() {
        assert!(matches!(
            parse_patch("status", "done").unwrap(),
            Patch::Status(Status::Done)
        ));
        assert!(matches!(
            parse_patch("priority", "none").unwrap(),
            Patch::Priority(None)
        ));
        match parse_patch("tags", "work, q4, ").unwrap() {
            Patch::Tags(tags) => assert_eq!(tags, vec!["work", "q4"]),
            other => panic!("unexpected patch {other:?}"),
        }
        assert!(parse_patch("status", "someday").is_err());
        assert!(parse_patch("color", "red").is_err());
    }

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort("due").unwrap(), SortKey::DueDate);
        assert_eq!(parse_sort("created_at").unwrap(), SortKey::CreatedAt);
        assert!(parse_sort("alphabetical").is_err());
    }
}
