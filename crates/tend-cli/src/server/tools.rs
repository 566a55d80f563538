//! Agent tool schemas and dispatch
//!
//! Each tool maps one request onto a facade call and returns a structured
//! result. Write tools report the sync phase alongside the record so the
//! agent sees one success/pending/blocked outcome.

use chrono::{Local, NaiveDate};
use serde_json::{json, Value};
use uuid::Uuid;

use tend_core::{
    Draft, Filter, Header, Kind, Patch, Priority, Query, Record, Service, ServiceError, SortKey,
    Status, SyncPhase,
};

/// Handle initialize request
pub fn initialize() -> Result<Value, String> {
    Ok(json!({
        "protocolVersion": "0.1.0",
        "serverInfo": {
            "name": "tend",
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {
            "tools": true,
            "resources": true
        }
    }))
}

/// List available tools
pub fn list_tools() -> Result<Value, String> {
    Ok(json!({
        "tools": [
            {
                "name": "create_record",
                "description": "Create a new task, goal, or note record",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "description": "Record title"
                        },
                        "kind": {
                            "type": "string",
                            "enum": ["task", "goal", "note"],
                            "description": "What kind of record; defaults to task"
                        },
                        "body": {
                            "type": "string",
                            "description": "Freeform body text"
                        },
                        "due_date": {
                            "type": "string",
                            "description": "Due date in YYYY-MM-DD format"
                        },
                        "priority": {
                            "type": "string",
                            "enum": ["low", "medium", "high"],
                            "description": "Record priority"
                        },
                        "tags": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Record tags"
                        },
                        "parent_goal_id": {
                            "type": "string",
                            "description": "UUID of the goal this record belongs to"
                        }
                    },
                    "required": ["title"]
                }
            },
            {
                "name": "update_record",
                "description": "Update one record field; 'body' appends to the existing body",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": {
                            "type": "string",
                            "description": "Record UUID"
                        },
                        "field": {
                            "type": "string",
                            "enum": ["title", "status", "priority", "tags", "due_date", "parent_goal_id", "body"],
                            "description": "Field to update"
                        },
                        "value": {
                            "description": "New value (null clears optional fields)"
                        }
                    },
                    "required": ["id", "field", "value"]
                }
            },
            {
                "name": "list_records",
                "description": "List record headers with optional filtering, sorted by due date",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "status": {
                            "type": "string",
                            "enum": ["active", "next", "waiting", "done", "archived"],
                            "description": "Filter by status"
                        },
                        "kind": {
                            "type": "string",
                            "enum": ["task", "goal", "note"],
                            "description": "Filter by kind"
                        },
                        "tag": {
                            "type": "string",
                            "description": "Filter by tag"
                        },
                        "limit": {
                            "type": "number",
                            "description": "Maximum number of results"
                        }
                    }
                }
            },
            {
                "name": "read_record",
                "description": "Get the full record, header and body",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": {
                            "type": "string",
                            "description": "Record UUID"
                        }
                    },
                    "required": ["id"]
                }
            },
            {
                "name": "complete_record",
                "description": "Mark a record as done; idempotent",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": {
                            "type": "string",
                            "description": "Record UUID"
                        }
                    },
                    "required": ["id"]
                }
            }
        ]
    }))
}

/// Call a tool
pub fn call_tool(service: &mut Service, params: Value) -> Result<Value, String> {
    let tool_name = params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or("Missing tool name")?;

    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    match tool_name {
        "create_record" => create_record(service, arguments),
        "update_record" => update_record(service, arguments),
        "list_records" => list_records(service, arguments),
        "read_record" => read_record(service, arguments),
        "complete_record" => complete_record(service, arguments),
        _ => Err(format!("Unknown tool: {}", tool_name)),
    }
}

fn create_record(service: &mut Service, args: Value) -> Result<Value, String> {
    let title = args
        .get("title")
        .and_then(|v| v.as_str())
        .ok_or("Missing title")?;

    let mut draft = Draft::new(title);

    if let Some(kind) = args.get("kind").and_then(|v| v.as_str()) {
        draft = draft.kind(parse_kind(kind)?);
    }
    if let Some(body) = args.get("body").and_then(|v| v.as_str()) {
        draft = draft.body(body);
    }
    if let Some(due) = args.get("due_date").and_then(|v| v.as_str()) {
        draft = draft.due_date(parse_date(due)?);
    }
    if let Some(priority) = args.get("priority").and_then(|v| v.as_str()) {
        draft = draft.priority(parse_priority(priority)?);
    }
    if let Some(tags) = args.get("tags").and_then(|v| v.as_array()) {
        draft = draft.tags(
            tags.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        );
    }
    if let Some(parent) = args.get("parent_goal_id").and_then(|v| v.as_str()) {
        draft = draft.parent_goal(parse_id(parent)?);
    }

    let outcome = service.create(draft).map_err(describe)?;
    Ok(summary(&outcome.record, outcome.sync))
}

fn update_record(service: &mut Service, args: Value) -> Result<Value, String> {
    let id = required_id(&args)?;
    let field = args
        .get("field")
        .and_then(|v| v.as_str())
        .ok_or("Missing field")?;
    let value = args.get("value").ok_or("Missing value")?;

    let patch = patch_from_json(field, value)?;
    let outcome = service.patch(id, patch).map_err(describe)?;
    Ok(summary(&outcome.record, outcome.sync))
}

fn list_records(service: &Service, args: Value) -> Result<Value, String> {
    let mut filter = Filter::default();

    if let Some(status) = args.get("status").and_then(|v| v.as_str()) {
        filter.status = Some(parse_status(status)?);
    }
    if let Some(kind) = args.get("kind").and_then(|v| v.as_str()) {
        filter.kind = Some(parse_kind(kind)?);
    }
    if let Some(tag) = args.get("tag").and_then(|v| v.as_str()) {
        filter.tag = Some(tag.to_string());
    }

    let mut query = Query::new(filter).sort_by(SortKey::DueDate);
    if let Some(limit) = args.get("limit").and_then(|v| v.as_u64()) {
        query = query.limit(limit as usize);
    }

    let headers: Vec<Value> = service.list(&query).iter().map(header_json).collect();
    Ok(json!({ "records": headers }))
}

fn read_record(service: &Service, args: Value) -> Result<Value, String> {
    let id = required_id(&args)?;
    let record = service.read_detail(id).map_err(describe)?;
    let header = &record.header;

    Ok(json!({
        "id": header.id,
        "kind": header.kind,
        "title": header.title,
        "status": header.status,
        "priority": header.priority,
        "tags": header.tags,
        "due_date": header.due_date,
        "parent_goal_id": header.parent_goal_id,
        "created_at": header.created_at,
        "body": record.body,
    }))
}

fn complete_record(service: &mut Service, args: Value) -> Result<Value, String> {
    let id = required_id(&args)?;
    let outcome = service.complete(id).map_err(describe)?;
    Ok(summary(&outcome.record, outcome.sync))
}

/// List available resources
pub fn list_resources() -> Result<Value, String> {
    Ok(json!({
        "resources": [
            {
                "uri": "tend://daily_summary",
                "name": "Daily Summary",
                "description": "Today's active/next high-priority and due records",
                "mimeType": "application/json"
            }
        ]
    }))
}

/// Read a resource
pub fn read_resource(service: &Service, params: Value) -> Result<Value, String> {
    let uri = params
        .get("uri")
        .and_then(|v| v.as_str())
        .ok_or("Missing uri")?;

    match uri {
        "tend://daily_summary" => {
            let summary = service.daily_summary(Local::now().date_naive());
            serde_json::to_value(&summary).map_err(|e| e.to_string())
        }
        _ => Err(format!("Unknown resource: {}", uri)),
    }
}

/// Record summary returned by write tools, with the sync outcome
fn summary(record: &Record, sync: SyncPhase) -> Value {
    let mut value = header_json(&record.header);
    value["sync"] = json!(sync);
    value
}

fn header_json(header: &Header) -> Value {
    json!({
        "id": header.id,
        "kind": header.kind,
        "title": header.title,
        "status": header.status,
        "priority": header.priority,
        "tags": header.tags,
        "due_date": header.due_date,
    })
}

fn patch_from_json(field: &str, value: &Value) -> Result<Patch, String> {
    Ok(match field {
        "title" => Patch::Title(as_string(value, "title")?),
        "status" => Patch::Status(parse_status(&as_string(value, "status")?)?),
        "priority" => match value {
            Value::Null => Patch::Priority(None),
            _ => Patch::Priority(Some(parse_priority(&as_string(value, "priority")?)?)),
        },
        "tags" => {
            let tags = match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
                Value::String(s) => s
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
                _ => return Err("tags must be an array or comma-separated string".to_string()),
            };
            Patch::Tags(tags)
        }
        "due_date" => match value {
            Value::Null => Patch::DueDate(None),
            _ => Patch::DueDate(Some(parse_date(&as_string(value, "due_date")?)?)),
        },
        "parent_goal_id" => match value {
            Value::Null => Patch::ParentGoal(None),
            _ => Patch::ParentGoal(Some(parse_id(&as_string(value, "parent_goal_id")?)?)),
        },
        "body" => Patch::AppendBody(as_string(value, "body")?),
        _ => return Err(format!("Unknown field: {}", field)),
    })
}

fn required_id(args: &Value) -> Result<Uuid, String> {
    let id = args
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or("Missing id")?;
    parse_id(id)
}

fn as_string(value: &Value, field: &str) -> Result<String, String> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Field '{}' must be a string", field))
}

fn parse_id(input: &str) -> Result<Uuid, String> {
    Uuid::parse_str(input).map_err(|e| format!("Invalid UUID: {}", e))
}

fn parse_status(input: &str) -> Result<Status, String> {
    input
        .parse()
        .map_err(|_| format!("Invalid status value: {}", input))
}

fn parse_kind(input: &str) -> Result<Kind, String> {
    input
        .parse()
        .map_err(|_| format!("Invalid kind value: {}", input))
}

fn parse_priority(input: &str) -> Result<Priority, String> {
    input
        .parse()
        .map_err(|_| format!("Invalid priority value: {}", input))
}

fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}'; expected YYYY-MM-DD", input))
}

/// Map facade errors onto structured tool error messages
fn describe(error: ServiceError) -> String {
    if error.is_not_found() {
        format!("Record not found: {}", error)
    } else if error.is_validation() {
        format!("Validation failed: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use tend_core::Config;

    fn service(temp: &TempDir) -> Service {
        let config = Config::with_data_dir(temp.path().join("records"));
        Service::open(config).unwrap()
    }

    fn create(service: &mut Service, args: Value) -> Value {
        call_tool(
            service,
            json!({"name": "create_record", "arguments": args}),
        )
        .unwrap()
    }

    #[test]
    fn test_list_tools_names() {
        let tools = list_tools().unwrap();
        let names: Vec<&str> = tools["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "create_record",
                "update_record",
                "list_records",
                "read_record",
                "complete_record"
            ]
        );
    }

    #[test]
    fn test_create_applies_defaults() {
        let temp = TempDir::new().unwrap();
        let mut service = service(&temp);

        let result = create(&mut service, json!({"title": "Water the plants"}));
        assert_eq!(result["status"], "active");
        assert_eq!(result["kind"], "task");
        assert_eq!(result["sync"], "idle");
        assert!(Uuid::parse_str(result["id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_create_requires_title() {
        let temp = TempDir::new().unwrap();
        let mut service = service(&temp);

        let err = call_tool(
            &mut service,
            json!({"name": "create_record", "arguments": {"body": "no title"}}),
        )
        .unwrap_err();
        assert!(err.contains("title"));
    }

    #[test]
    fn test_update_record_validation_error() {
        let temp = TempDir::new().unwrap();
        let mut service = service(&temp);
        let created = create(&mut service, json!({"title": "target"}));
        let id = created["id"].as_str().unwrap();

        let err = call_tool(
            &mut service,
            json!({
                "name": "update_record",
                "arguments": {"id": id, "field": "status", "value": "someday"}
            }),
        )
        .unwrap_err();
        assert!(err.contains("Invalid status"));

        let err = call_tool(
            &mut service,
            json!({
                "name": "update_record",
                "arguments": {"id": id, "field": "title", "value": "  "}
            }),
        )
        .unwrap_err();
        assert!(err.contains("Validation failed"));
    }

    #[test]
    fn test_update_appends_body() {
        let temp = TempDir::new().unwrap();
        let mut service = service(&temp);
        let created = create(&mut service, json!({"title": "log", "body": "first"}));
        let id = created["id"].as_str().unwrap().to_string();

        call_tool(
            &mut service,
            json!({
                "name": "update_record",
                "arguments": {"id": id, "field": "body", "value": "second"}
            }),
        )
        .unwrap();

        let record = call_tool(
            &mut service,
            json!({"name": "read_record", "arguments": {"id": id}}),
        )
        .unwrap();
        assert_eq!(record["body"], "first\n\nsecond");
    }

    #[test]
    fn test_list_records_filters_and_limits() {
        let temp = TempDir::new().unwrap();
        let mut service = service(&temp);

        for i in 0..5 {
            create(
                &mut service,
                json!({
                    "title": format!("work {i}"),
                    "tags": ["work"],
                    "due_date": format!("2026-08-{:02}", 10 + i)
                }),
            );
        }
        for i in 0..3 {
            create(
                &mut service,
                json!({"title": format!("personal {i}"), "tags": ["personal"]}),
            );
        }

        let result = call_tool(
            &mut service,
            json!({
                "name": "list_records",
                "arguments": {"status": "active", "tag": "work", "limit": 2}
            }),
        )
        .unwrap();
        let records = result["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        // Sorted by due date ascending: the two earliest
        assert_eq!(records[0]["due_date"], "2026-08-10");
        assert_eq!(records[1]["due_date"], "2026-08-11");
    }

    #[test]
    fn test_complete_record_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut service = service(&temp);
        let created = create(&mut service, json!({"title": "finish me"}));
        let id = created["id"].as_str().unwrap().to_string();

        let first = call_tool(
            &mut service,
            json!({"name": "complete_record", "arguments": {"id": id}}),
        )
        .unwrap();
        assert_eq!(first["status"], "done");

        let second = call_tool(
            &mut service,
            json!({"name": "complete_record", "arguments": {"id": id}}),
        )
        .unwrap();
        assert_eq!(second["status"], "done");
    }

    #[test]
    fn test_daily_summary_resource() {
        let temp = TempDir::new().unwrap();
        let mut service = service(&temp);
        create(&mut service, json!({"title": "big one", "priority": "high"}));

        let resources = list_resources().unwrap();
        assert_eq!(
            resources["resources"][0]["uri"],
            "tend://daily_summary"
        );

        let summary = read_resource(
            &service,
            json!({"uri": "tend://daily_summary"}),
        )
        .unwrap();
        assert_eq!(summary["total_active"], 1);
        assert_eq!(summary["high_priority"][0]["title"], "big one");
    }

    #[test]
    fn test_unknown_tool() {
        let temp = TempDir::new().unwrap();
        let mut service = service(&temp);

        let err = call_tool(&mut service, json!({"name": "drop_table"})).unwrap_err();
        assert!(err.contains("Unknown tool"));
    }
}
