use reqwest::Method;
use tracing::debug;

use super::error::WorkflowError;
use crate::jira::transport::decode;
use crate::jira::types::{IssueResponse, TransitionsResponse};
use crate::jira::{API, Transition, Transport};

/// Queries the remote workflow graph of a single issue.
///
/// Nothing is cached: the legal transition set can change between calls, so
/// every resolution starts with a fresh fetch.
pub struct WorkflowResolver<'a, T> {
    transport: &'a T,
}

/// Case-insensitive comparison of symbolic status names.
pub fn same_status(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Pick the transition for `target` out of a fetched set.
///
/// A transition whose destination status matches wins over one whose display
/// name matches; within each pass the server's order decides.
pub fn select_transition<'t>(transitions: &'t [Transition], target: &str) -> Option<&'t Transition> {
    transitions
        .iter()
        .find(|t| same_status(&t.to.name, target))
        .or_else(|| transitions.iter().find(|t| same_status(&t.name, target)))
}

impl<'a, T: Transport> WorkflowResolver<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Key, status and summary of `item`. Fails with `NotFound` if it is absent.
    pub async fn get_issue(&self, item: &str) -> Result<IssueResponse, WorkflowError> {
        let path = format!(
            "{API}/issue/{}?fields=status,summary",
            urlencoding::encode(item)
        );
        let value = self.transport.request(Method::GET, &path, None).await?;
        Ok(decode(value, &path)?)
    }

    /// Current status name of `item`.
    pub async fn get_status(&self, item: &str) -> Result<String, WorkflowError> {
        Ok(self.get_issue(item).await?.fields.status.name)
    }

    /// Live legal transitions of `item`. An empty set means a terminal state.
    pub async fn get_transitions(&self, item: &str) -> Result<Vec<Transition>, WorkflowError> {
        let path = format!(
            "{API}/issue/{}/transitions?expand=transitions.fields",
            urlencoding::encode(item)
        );
        let value = self.transport.request(Method::GET, &path, None).await?;
        let response: TransitionsResponse = decode(value, &path)?;
        debug!(item, count = response.transitions.len(), "fetched transitions");
        Ok(response.transitions)
    }

    /// Resolve `target` (a status or transition name) to a live transition.
    pub async fn resolve_transition(
        &self,
        item: &str,
        target: &str,
    ) -> Result<Transition, WorkflowError> {
        let transitions = self.get_transitions(item).await?;
        match select_transition(&transitions, target) {
            Some(t) => {
                debug!(item, to = target, transition = %t, "resolved transition");
                Ok(t.clone())
            }
            None => Err(WorkflowError::NoSuchTransition {
                item: item.to_string(),
                target: target.to_string(),
                available: transitions,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::JiraError;
    use crate::testing::{FakeJira, transition};

    #[test]
    fn status_comparison_ignores_case_and_padding() {
        assert!(same_status("Done", "done"));
        assert!(same_status(" In Progress", "IN PROGRESS "));
        assert!(same_status("Été", "été"));
        assert!(!same_status("Done", "Undone"));
    }

    #[test]
    fn target_status_match_beats_display_name_match() {
        // "Done" is the display name of the first edge but the destination of the second.
        let transitions = vec![
            transition("5", "Done", "Archived"),
            transition("31", "Finish", "Done"),
        ];
        assert_eq!(select_transition(&transitions, "done").unwrap().id, "31");
    }

    #[test]
    fn display_name_is_used_when_no_status_matches() {
        let transitions = vec![
            transition("11", "Start", "Progressing"),
            transition("31", "Complete", "Done"),
        ];
        assert_eq!(select_transition(&transitions, "START").unwrap().id, "11");
        assert!(select_transition(&transitions, "Review").is_none());
    }

    #[test]
    fn first_match_wins_within_a_pass() {
        let transitions = vec![
            transition("31", "Done", "Done"),
            transition("32", "Done (skip QA)", "Done"),
        ];
        assert_eq!(select_transition(&transitions, "Done").unwrap().id, "31");
    }

    #[tokio::test]
    async fn get_status_reads_remote_status() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-7", "Progressing");
        let resolver = WorkflowResolver::new(&jira);
        assert_eq!(resolver.get_status("SCRUM-7").await.unwrap(), "Progressing");
    }

    #[tokio::test]
    async fn get_status_of_missing_item_is_not_found() {
        let jira = FakeJira::new();
        let resolver = WorkflowResolver::new(&jira);
        let err = resolver.get_status("SCRUM-404").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Jira(JiraError::NotFound { .. })));
    }

    #[tokio::test]
    async fn empty_transition_set_is_valid() {
        let jira = FakeJira::new();
        jira.set_transitions("Closed", vec![]);
        jira.insert_issue("SCRUM-1", "Closed");
        let resolver = WorkflowResolver::new(&jira);
        assert!(resolver.get_transitions("SCRUM-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmatched_target_reports_every_available_transition() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-1", "To Do");
        let resolver = WorkflowResolver::new(&jira);

        let err = resolver
            .resolve_transition("SCRUM-1", "Review")
            .await
            .unwrap_err();
        match err {
            WorkflowError::NoSuchTransition {
                item,
                target,
                available,
            } => {
                assert_eq!(item, "SCRUM-1");
                assert_eq!(target, "Review");
                let ids: Vec<&str> = available.iter().map(|t| t.id.as_str()).collect();
                assert_eq!(ids, vec!["11", "31"]);
            }
            other => panic!("expected NoSuchTransition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_resolution_refetches_the_graph() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-1", "To Do");
        let resolver = WorkflowResolver::new(&jira);

        resolver.resolve_transition("SCRUM-1", "Done").await.unwrap();
        jira.set_transitions("To Do", vec![transition("99", "Ship", "Done")]);
        let t = resolver.resolve_transition("SCRUM-1", "Done").await.unwrap();

        assert_eq!(t.id, "99");
        assert_eq!(jira.count(Method::GET, "/rest/api/3/issue/SCRUM-1/transitions"), 2);
    }
}
