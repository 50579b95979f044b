use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stage at which an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Create,
    Transition,
    Delete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Create => write!(f, "create"),
            Stage::Transition => write!(f, "transition"),
            Stage::Delete => write!(f, "delete"),
        }
    }
}

/// One failed item, in the shape printed by the console layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Position of the item in the submitted batch.
    pub index: usize,
    /// Issue key, or the summary when the item never got a key.
    pub subject: String,
    pub stage: Stage,
    pub cause: String,
}

/// An item that reached its target status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transitioned {
    pub key: String,
    pub status: String,
    pub already_in_state: bool,
}

/// Per-item outcomes of one batch run, in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub run_id: String,
    pub created: Vec<String>,
    pub failed_create: Vec<ItemFailure>,
    pub transitioned: Vec<Transitioned>,
    pub failed_transition: Vec<ItemFailure>,
    pub deleted: Vec<String>,
    pub failed_delete: Vec<ItemFailure>,
    pub cancelled: bool,
    pub not_attempted: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Final counts plus every failure ordered by item position.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub run_id: String,
    pub created_count: usize,
    pub transitioned_count: usize,
    pub deleted_count: usize,
    pub failures: Vec<ItemFailure>,
    pub cancelled: bool,
    pub not_attempted: usize,
    pub duration_ms: i64,
}

impl BatchResult {
    fn empty(run_id: String) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            created: Vec::new(),
            failed_create: Vec::new(),
            transitioned: Vec::new(),
            failed_transition: Vec::new(),
            deleted: Vec::new(),
            failed_delete: Vec::new(),
            cancelled: false,
            not_attempted: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failed_create.len() + self.failed_transition.len() + self.failed_delete.len()
    }

    pub fn summarize(&self) -> Summary {
        let mut failures: Vec<ItemFailure> = self
            .failed_create
            .iter()
            .chain(&self.failed_transition)
            .chain(&self.failed_delete)
            .cloned()
            .collect();
        // Stable, so an item's own stages keep their order.
        failures.sort_by_key(|f| f.index);

        Summary {
            run_id: self.run_id.clone(),
            created_count: self.created.len(),
            transitioned_count: self.transitioned.len(),
            deleted_count: self.deleted.len(),
            failures,
            cancelled: self.cancelled,
            not_attempted: self.not_attempted,
            duration_ms: (self.finished_at - self.started_at).num_milliseconds(),
        }
    }
}

/// Append-only accumulator owned by a running batch.
#[derive(Debug)]
pub struct ReportAggregator {
    result: BatchResult,
}

impl ReportAggregator {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            result: BatchResult::empty(run_id.into()),
        }
    }

    pub fn created(&mut self, key: impl Into<String>) {
        self.result.created.push(key.into());
    }

    pub fn transitioned(&mut self, key: impl Into<String>, status: impl Into<String>, already_in_state: bool) {
        self.result.transitioned.push(Transitioned {
            key: key.into(),
            status: status.into(),
            already_in_state,
        });
    }

    pub fn deleted(&mut self, key: impl Into<String>) {
        self.result.deleted.push(key.into());
    }

    pub fn failed(&mut self, index: usize, subject: impl Into<String>, stage: Stage, cause: impl ToString) {
        let failure = ItemFailure {
            index,
            subject: subject.into(),
            stage,
            cause: cause.to_string(),
        };
        match stage {
            Stage::Create => self.result.failed_create.push(failure),
            Stage::Transition => self.result.failed_transition.push(failure),
            Stage::Delete => self.result.failed_delete.push(failure),
        }
    }

    /// Stop accepting items; `remaining` were never attempted.
    pub fn cancel(&mut self, remaining: usize) {
        self.result.cancelled = true;
        self.result.not_attempted = remaining;
    }

    pub fn finish(mut self) -> BatchResult {
        self.result.finished_at = Utc::now();
        self.result
    }
}
