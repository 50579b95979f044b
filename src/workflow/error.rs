use thiserror::Error;

use crate::jira::{JiraError, Transition};

/// Failures of the resolver and executor.
///
/// Everything except a credential failure is isolated to one item by the
/// batch orchestrator.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Jira(#[from] JiraError),

    /// No live transition matches the requested target. Carries the whole
    /// set that was available so the operator can pick another target.
    #[error("no transition to \"{target}\" available for {item}{}", list_available(.available))]
    NoSuchTransition {
        item: String,
        target: String,
        available: Vec<Transition>,
    },

    #[error("transition \"{transition}\" on {item} requires field \"{field}\"")]
    MissingRequiredField {
        item: String,
        transition: String,
        field: String,
    },
}

fn list_available(available: &[Transition]) -> String {
    if available.is_empty() {
        return " (no outgoing transitions)".to_string();
    }
    let names: Vec<String> = available
        .iter()
        .map(|t| format!("{} -> {}", t.name, t.to.name))
        .collect();
    format!(" (available: {})", names.join(", "))
}

impl WorkflowError {
    /// Only credential failures abort a whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkflowError::Jira(e) if e.is_fatal())
    }
}
