//! Per-run outcome report
//!
//! Every reconciliation pass produces a [`RunReport`]: operation counts plus
//! the aggregated failures. Failures are never silently dropped — a run with
//! a non-empty failure list is failed even if most operations succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::RecordKey;

/// The kind of mutation an operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Create a missing record
    Create,
    /// Overwrite an existing record
    Update,
    /// Remove a duplicate or orphaned record
    Delete,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Create => f.write_str("create"),
            OpKind::Update => f.write_str("update"),
            OpKind::Delete => f.write_str("delete"),
        }
    }
}

/// A single failed (or deadline-skipped) operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpFailure {
    /// What the operation would have done
    pub op: OpKind,
    /// Identity of the affected record
    pub key: RecordKey,
    /// Provider-assigned ID, for update/delete operations
    pub record_id: Option<String>,
    /// The final error, after any retries
    pub error: String,
    /// How many attempts were made (0 = skipped before the first attempt)
    pub attempts: usize,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Number of records fetched from the provider
    pub fetched: usize,
    /// Records created
    pub created: usize,
    /// Records updated
    pub updated: usize,
    /// Records deleted
    pub deleted: usize,
    /// Desired records that were already converged
    pub unchanged: usize,
    /// Operations skipped because the run deadline passed
    pub skipped: usize,
    /// Every operation that did not succeed
    pub failures: Vec<OpFailure>,
}

impl RunReport {
    /// Start a new report, timestamped now
    pub(crate) fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            fetched: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    /// Whether the run reconciled everything it set out to
    ///
    /// False as soon as any operation failed or was skipped, even if most
    /// operations succeeded.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of mutations applied
    pub fn applied(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// One-line human-readable summary for logging
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} updated, {} deleted, {} unchanged, {} failed ({} skipped)",
            self.created,
            self.updated,
            self.deleted,
            self.unchanged,
            self.failures.len(),
            self.skipped,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;

    #[test]
    fn report_with_failures_is_failed() {
        let mut report = RunReport::new();
        report.created = 5;
        assert!(report.succeeded());

        report.failures.push(OpFailure {
            op: OpKind::Create,
            key: RecordKey::new("www.example.com", RecordType::A),
            record_id: None,
            error: "rejected".to_string(),
            attempts: 1,
        });
        assert!(!report.succeeded());
    }

    #[test]
    fn summary_counts_operations() {
        let mut report = RunReport::new();
        report.created = 1;
        report.updated = 2;
        report.deleted = 3;
        assert_eq!(report.applied(), 6);
        assert!(report.summary().contains("1 created"));
    }
}
