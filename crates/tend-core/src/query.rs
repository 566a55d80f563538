//! Query engine
//!
//! Filters, sorts, and paginates header projections from the store's
//! index. Never reads record bodies. Archived records are excluded unless
//! explicitly requested.

use chrono::NaiveDate;

use crate::models::{Header, Kind, Priority, Status};

/// Conjunction of optional predicates over headers
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub status: Option<Status>,
    pub kind: Option<Kind>,
    /// Tag membership: the record must carry this tag
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    /// Inclusive due-date range; records without a due date never match
    /// a bounded range
    pub due_after: Option<NaiveDate>,
    pub due_before: Option<NaiveDate>,
    /// Include archived records in results
    pub include_archived: bool,
}

impl Filter {
    pub fn matches(&self, header: &Header) -> bool {
        if header.status == Status::Archived
            && !self.include_archived
            && self.status != Some(Status::Archived)
        {
            return false;
        }
        if let Some(status) = self.status {
            if header.status != status {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if header.kind != kind {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !header.has_tag(tag) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if header.priority != Some(priority) {
                return false;
            }
        }
        if self.due_after.is_some() || self.due_before.is_some() {
            let Some(due) = header.due_date else {
                return false;
            };
            if let Some(after) = self.due_after {
                if due < after {
                    return false;
                }
            }
            if let Some(before) = self.due_before {
                if due > before {
                    return false;
                }
            }
        }
        true
    }
}

/// Sort key for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    DueDate,
    Priority,
    CreatedAt,
}

/// A complete listing request: filter, sort, truncate
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub sort: Option<SortKey>,
    /// Ascending by default
    pub descending: bool,
    /// Applied after sorting
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort = Some(key);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the query over a set of headers
    ///
    /// Records missing the sort key order last regardless of direction.
    pub fn run(&self, headers: &[Header]) -> Vec<Header> {
        let mut results: Vec<Header> = headers
            .iter()
            .filter(|h| self.filter.matches(h))
            .cloned()
            .collect();

        if let Some(key) = self.sort {
            results.sort_by(|a, b| {
                let ordering = match key {
                    SortKey::DueDate => compare_optional(a.due_date, b.due_date, self.descending),
                    SortKey::Priority => {
                        compare_optional(a.priority, b.priority, self.descending)
                    }
                    SortKey::CreatedAt => {
                        let ord = a.created_at.cmp(&b.created_at);
                        if self.descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    }
                };
                ordering.then_with(|| a.created_at.cmp(&b.created_at))
            });
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}

/// Compare optional sort keys, keeping `None` last in both directions
fn compare_optional<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            if descending {
                b.cmp(&a)
            } else {
                a.cmp(&b)
            }
        }
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Draft, Record};

    fn header(title: &str, status: Status, tags: &[&str]) -> Header {
        let mut record = Record::from_draft(
            Draft::new(title).tags(tags.iter().map(|t| t.to_string()).collect()),
        );
        record.header.status = status;
        record.header
    }

    fn with_due(mut h: Header, due: &str) -> Header {
        h.due_date = Some(NaiveDate::parse_from_str(due, "%Y-%m-%d").unwrap());
        h
    }

    #[test]
    fn test_status_and_tag_conjunction() {
        let mut headers = Vec::new();
        for i in 0..5 {
            headers.push(header(&format!("aw{i}"), Status::Active, &["work"]));
        }
        for i in 0..3 {
            headers.push(header(&format!("ap{i}"), Status::Active, &["personal"]));
        }
        for i in 0..2 {
            headers.push(header(&format!("dw{i}"), Status::Done, &["work"]));
        }

        let query = Query::new(Filter {
            status: Some(Status::Active),
            tag: Some("work".to_string()),
            ..Filter::default()
        });

        let results = query.run(&headers);
        assert_eq!(results.len(), 5);
        assert!(results
            .iter()
            .all(|h| h.status == Status::Active && h.has_tag("work")));
    }

    #[test]
    fn test_archived_excluded_by_default() {
        let headers = vec![
            header("a", Status::Active, &[]),
            header("b", Status::Archived, &[]),
        ];

        let default = Query::default().run(&headers);
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].title, "a");

        let included = Query::new(Filter {
            include_archived: true,
            ..Filter::default()
        })
        .run(&headers);
        assert_eq!(included.len(), 2);

        // Asking for archived explicitly also works
        let explicit = Query::new(Filter {
            status: Some(Status::Archived),
            ..Filter::default()
        })
        .run(&headers);
        assert_eq!(explicit.len(), 1);
        assert_eq!(explicit[0].title, "b");
    }

    #[test]
    fn test_due_range() {
        let headers = vec![
            with_due(header("early", Status::Active, &[]), "2026-08-01"),
            with_due(header("mid", Status::Active, &[]), "2026-08-15"),
            with_due(header("late", Status::Active, &[]), "2026-09-01"),
            header("undated", Status::Active, &[]),
        ];

        let query = Query::new(Filter {
            due_after: Some(NaiveDate::from_ymd_opt(2026, 8, 10).unwrap()),
            due_before: Some(NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()),
            ..Filter::default()
        });

        let results = query.run(&headers);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "mid");
    }

    #[test]
    fn test_sort_due_date_absent_last_with_limit() {
        let headers = vec![
            header("no due 1", Status::Active, &["work"]),
            with_due(header("third", Status::Active, &["work"]), "2026-08-30"),
            with_due(header("first", Status::Active, &["work"]), "2026-08-10"),
            with_due(header("second", Status::Active, &["work"]), "2026-08-20"),
            header("no due 2", Status::Active, &["work"]),
        ];

        let query = Query::new(Filter {
            status: Some(Status::Active),
            tag: Some("work".to_string()),
            ..Filter::default()
        })
        .sort_by(SortKey::DueDate)
        .limit(2);

        let results = query.run(&headers);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "first");
        assert_eq!(results[1].title, "second");
    }

    #[test]
    fn test_sort_descending_keeps_absent_last() {
        let headers = vec![
            header("undated", Status::Active, &[]),
            with_due(header("early", Status::Active, &[]), "2026-08-01"),
            with_due(header("late", Status::Active, &[]), "2026-09-01"),
        ];

        let results = Query::default()
            .sort_by(SortKey::DueDate)
            .descending()
            .run(&headers);
        assert_eq!(results[0].title, "late");
        assert_eq!(results[1].title, "early");
        assert_eq!(results[2].title, "undated");
    }

    #[test]
    fn test_sort_priority() {
        let mut a = header("high", Status::Active, &[]);
        a.priority = Some(Priority::High);
        let mut b = header("low", Status::Active, &[]);
        b.priority = Some(Priority::Low);
        let c = header("none", Status::Active, &[]);

        let results = Query::default()
            .sort_by(SortKey::Priority)
            .descending()
            .run(&[a, b, c]);
        assert_eq!(results[0].title, "high");
        assert_eq!(results[1].title, "low");
        assert_eq!(results[2].title, "none");
    }

    #[test]
    fn test_priority_filter() {
        let mut a = header("high", Status::Active, &[]);
        a.priority = Some(Priority::High);
        let b = header("unset", Status::Active, &[]);

        let results = Query::new(Filter {
            priority: Some(Priority::High),
            ..Filter::default()
        })
        .run(&[a, b]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "high");
    }
}
