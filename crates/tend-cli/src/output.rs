//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use tend_core::{DailySummary, Header, Record, SyncStatus};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a full record, header and body
    pub fn print_record(&self, record: &Record) {
        match self.format {
            OutputFormat::Human => {
                let header = &record.header;
                println!("ID:       {}", header.id);
                println!("Kind:     {}", header.kind);
                println!("Title:    {}", header.title);
                println!("Status:   {}", header.status);
                if let Some(priority) = header.priority {
                    println!("Priority: {}", priority);
                }
                if !header.tags.is_empty() {
                    println!("Tags:     {}", header.tags.join(", "));
                }
                if let Some(due) = header.due_date {
                    println!("Due:      {}", due);
                }
                if let Some(parent) = header.parent_goal_id {
                    println!("Goal:     {}", parent);
                }
                println!("Created:  {}", header.created_at.format("%Y-%m-%d %H:%M"));
                if !record.body.is_empty() {
                    println!();
                    println!("{}", record.body);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "header": record.header,
                        "body": record.body,
                    })
                );
            }
            OutputFormat::Quiet => {
                println!("{}", record.id());
            }
        }
    }

    /// Print a list of header projections
    pub fn print_headers(&self, headers: &[Header]) {
        match self.format {
            OutputFormat::Human => {
                if headers.is_empty() {
                    println!("No records found.");
                    return;
                }
                for header in headers {
                    println!("{}", header_line(header));
                }
                println!("\n{} record(s)", headers.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(headers).unwrap());
            }
            OutputFormat::Quiet => {
                for header in headers {
                    println!("{}", header.id);
                }
            }
        }
    }

    /// Print the daily summary board
    pub fn print_summary(&self, summary: &DailySummary) {
        match self.format {
            OutputFormat::Human => {
                println!("Today: {}", summary.date);
                println!("Active or next: {}", summary.total_active);
                if !summary.high_priority.is_empty() {
                    println!("\nHigh priority:");
                    for header in &summary.high_priority {
                        println!("  {}", header_line(header));
                    }
                }
                if !summary.due_today.is_empty() {
                    println!("\nDue today:");
                    for header in &summary.due_today {
                        println!("  {}", header_line(header));
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(summary).unwrap());
            }
            OutputFormat::Quiet => {
                for header in summary.high_priority.iter().chain(&summary.due_today) {
                    println!("{}", header.id);
                }
            }
        }
    }

    /// Print sync health
    pub fn print_sync_status(&self, status: &SyncStatus) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(status).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", status.phase);
            }
            OutputFormat::Human => {
                println!("Sync: {}", status.phase);
                if status.pending > 0 {
                    println!("  Unpublished checkpoints: {}", status.pending);
                }
                if let Some(ref error) = status.last_error {
                    println!("  Last error: {}", error);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// One-line listing form: short id, status, priority, due date, title, tags
fn header_line(header: &Header) -> String {
    let id = &header.id.to_string()[..8];
    let priority = header
        .priority
        .map(|p| p.as_str())
        .unwrap_or("-");
    let due = header
        .due_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "          ".to_string());
    let tags = if header.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", header.tags.join(", "))
    };
    format!(
        "{} | {:8} | {:6} | {} | {}{}",
        id,
        header.status.as_str(),
        priority,
        due,
        truncate(&header.title, 40),
        tags
    )
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}
