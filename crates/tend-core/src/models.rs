//! Data models for tend
//!
//! Defines the core data structures: Record, Header, and the closed
//! vocabularies (Kind, Status, Priority) they are validated against.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a record is: a task, a goal, or a note
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Task,
    Goal,
    Note,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Task => "task",
            Kind::Goal => "goal",
            Kind::Note => "note",
        }
    }
}

impl FromStr for Kind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Kind::Task),
            "goal" => Ok(Kind::Goal),
            "note" => Ok(Kind::Note),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record lifecycle status
///
/// A record is never deleted; `Archived` is the terminal soft-archive state
/// and corresponds to a physical relocation into the archive area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Next,
    Waiting,
    Done,
    Archived,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Next => "next",
            Status::Waiting => "waiting",
            Status::Done => "done",
            Status::Archived => "archived",
        }
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Status::Active),
            "next" => Ok(Status::Next),
            "waiting" => Ok(Status::Waiting),
            "done" => Ok(Status::Done),
            "archived" => Ok(Status::Archived),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level, ordered low to high
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured, schema-validated metadata block of a record
///
/// Keys the schema does not know are kept verbatim in `extra` and re-emitted
/// on encode, so a file written by a newer version survives a round trip
/// through an older one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
    /// Unique identifier; also the filename stem
    pub id: Uuid,
    pub kind: Kind,
    pub title: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Reference to another record; dangling references are tolerated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_goal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Unrecognized header keys, preserved opaquely
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Header {
    /// Check if the record carries a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Check if the record is due on the given date
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.due_date == Some(date)
    }
}

/// A complete record: structured header plus freeform body
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub header: Header,
    pub body: String,
}

impl Record {
    /// Build a record from a draft, generating the id and creation time
    pub fn from_draft(draft: Draft) -> Self {
        Self {
            header: Header {
                id: Uuid::new_v4(),
                kind: draft.kind,
                title: draft.title,
                status: Status::Active,
                priority: draft.priority,
                tags: dedup_tags(draft.tags),
                due_date: draft.due_date,
                parent_goal_id: draft.parent_goal_id,
                created_at: Utc::now(),
                extra: BTreeMap::new(),
            },
            body: draft.body,
        }
    }

    pub fn id(&self) -> Uuid {
        self.header.id
    }

    /// Append freeform text to the body, separated by a blank line
    pub fn append_body(&mut self, text: &str) {
        if !self.body.is_empty() {
            self.body.push_str("\n\n");
        }
        self.body.push_str(text);
    }
}

/// Creation input for a record
///
/// Everything except the title is optional; defaults match what `create`
/// fills in on the stored record.
#[derive(Debug, Clone)]
pub struct Draft {
    pub title: String,
    pub kind: Kind,
    pub body: String,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub parent_goal_id: Option<Uuid>,
}

impl Draft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: Kind::Task,
            body: String::new(),
            priority: None,
            tags: Vec::new(),
            due_date: None,
            parent_goal_id: None,
        }
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn parent_goal(mut self, id: Uuid) -> Self {
        self.parent_goal_id = Some(id);
        self
    }
}

/// A single field mutation applied through the store
#[derive(Debug, Clone)]
pub enum Patch {
    Title(String),
    Status(Status),
    Priority(Option<Priority>),
    Tags(Vec<String>),
    DueDate(Option<NaiveDate>),
    ParentGoal(Option<Uuid>),
    /// Structured append to the body; existing content is kept
    AppendBody(String),
}

impl Patch {
    /// The header/body field this patch touches, for messages and logs
    pub fn field(&self) -> &'static str {
        match self {
            Patch::Title(_) => "title",
            Patch::Status(_) => "status",
            Patch::Priority(_) => "priority",
            Patch::Tags(_) => "tags",
            Patch::DueDate(_) => "due_date",
            Patch::ParentGoal(_) => "parent_goal_id",
            Patch::AppendBody(_) => "body",
        }
    }
}

/// Deduplicate tags preserving first-seen order, dropping empties
pub(crate) fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in ["active", "next", "waiting", "done", "archived"] {
            let status: Status = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert!("someday".parse::<Status>().is_err());
    }

    #[test]
    fn test_kind_round_trip() {
        for k in ["task", "goal", "note"] {
            let kind: Kind = k.parse().unwrap();
            assert_eq!(kind.as_str(), k);
        }
        assert!("project".parse::<Kind>().is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
    }

    #[test]
    fn test_from_draft_defaults() {
        let record = Record::from_draft(Draft::new("Write the report"));
        assert_eq!(record.header.title, "Write the report");
        assert_eq!(record.header.kind, Kind::Task);
        assert_eq!(record.header.status, Status::Active);
        assert!(record.header.priority.is_none());
        assert!(record.header.tags.is_empty());
        assert!(record.body.is_empty());
    }

    #[test]
    fn test_draft_builder() {
        let due = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let record = Record::from_draft(
            Draft::new("Quarterly plan")
                .kind(Kind::Goal)
                .priority(Priority::High)
                .tags(vec!["work".into(), "work".into(), "q4".into()])
                .due_date(due)
                .body("Outline first."),
        );
        assert_eq!(record.header.kind, Kind::Goal);
        assert_eq!(record.header.priority, Some(Priority::High));
        assert_eq!(record.header.tags, vec!["work", "q4"]);
        assert_eq!(record.header.due_date, Some(due));
        assert_eq!(record.body, "Outline first.");
    }

    #[test]
    fn test_dedup_tags() {
        let tags = dedup_tags(vec![
            "work".into(),
            " work ".into(),
            "".into(),
            "home".into(),
        ]);
        assert_eq!(tags, vec!["work", "home"]);
    }

    #[test]
    fn test_append_body() {
        let mut record = Record::from_draft(Draft::new("Call the bank"));
        record.append_body("They open at nine.");
        assert_eq!(record.body, "They open at nine.");
        record.append_body("Ask about the card.");
        assert_eq!(record.body, "They open at nine.\n\nAsk about the card.");
    }

    #[test]
    fn test_has_tag() {
        let record = Record::from_draft(Draft::new("x").tags(vec!["work".into()]));
        assert!(record.header.has_tag("work"));
        assert!(!record.header.has_tag("home"));
    }
}
