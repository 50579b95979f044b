use reqwest::Method;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::error::WorkflowError;
use super::resolver::{WorkflowResolver, same_status};
use crate::jira::issues::comment_payload;
use crate::jira::{API, Transition, Transport};

/// Field name Jira uses for the resolution of a closing transition.
const RESOLUTION: &str = "resolution";

/// Result of [`TransitionExecutor::ensure_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// The item already was in the target state; no transition was issued.
    pub already_in_state: bool,
    pub new_status: String,
}

/// Applies transitions discovered by a [`WorkflowResolver`].
pub struct TransitionExecutor<'a, T> {
    transport: &'a T,
    resolver: WorkflowResolver<'a, T>,
    default_resolution: Option<String>,
}

impl<'a, T: Transport> TransitionExecutor<'a, T> {
    pub fn new(transport: &'a T, default_resolution: Option<String>) -> Self {
        Self {
            transport,
            resolver: WorkflowResolver::new(transport),
            default_resolution,
        }
    }

    pub fn resolver(&self) -> &WorkflowResolver<'a, T> {
        &self.resolver
    }

    /// Build the transition body, filling the fields the transition requires.
    ///
    /// A required resolution gets the default resolution; any other required
    /// field without a server-side default cannot be filled.
    fn transition_body(&self, item: &str, transition: &Transition) -> Result<Value, WorkflowError> {
        let mut body = json!({ "transition": { "id": transition.id } });
        for field in transition.required_fields() {
            match (field, &self.default_resolution) {
                (RESOLUTION, Some(resolution)) => {
                    body["fields"] = json!({ RESOLUTION: { "name": resolution } });
                }
                _ => {
                    return Err(WorkflowError::MissingRequiredField {
                        item: item.to_string(),
                        transition: transition.name.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }
        Ok(body)
    }

    /// Issue `transition` against `item`.
    pub async fn apply_transition(
        &self,
        item: &str,
        transition: &Transition,
    ) -> Result<(), WorkflowError> {
        let body = self.transition_body(item, transition)?;
        let path = format!("{API}/issue/{}/transitions", urlencoding::encode(item));
        self.transport
            .request(Method::POST, &path, Some(&body))
            .await?;
        info!(item, transition = %transition, "transition applied");
        Ok(())
    }

    /// Move `item` into `target` unless it is already there.
    ///
    /// When the current status equals the target no transition request is
    /// made, so repeated calls are side-effect free.
    pub async fn ensure_state(
        &self,
        item: &str,
        target: &str,
    ) -> Result<EnsureOutcome, WorkflowError> {
        let current = self.resolver.get_status(item).await?;
        if same_status(&current, target) {
            info!(item, status = %current, "already in target state");
            return Ok(EnsureOutcome {
                already_in_state: true,
                new_status: current,
            });
        }

        let transition = self.resolver.resolve_transition(item, target).await?;
        self.apply_transition(item, &transition).await?;
        Ok(EnsureOutcome {
            already_in_state: false,
            new_status: transition.to.name,
        })
    }

    /// Append a comment to `item`. Best effort: failures are logged only.
    pub async fn annotate(&self, item: &str, text: &str) {
        let path = format!("{API}/issue/{}/comment", urlencoding::encode(item));
        let body = comment_payload(text);
        if let Err(e) = self.transport.request(Method::POST, &path, Some(&body)).await {
            warn!(item, error = %e, "failed to annotate item");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::JiraError;
    use crate::testing::{FakeJira, resolving_transition, transition};

    fn executor(jira: &FakeJira) -> TransitionExecutor<'_, FakeJira> {
        TransitionExecutor::new(jira, Some("Done".into()))
    }

    #[tokio::test]
    async fn ensure_state_moves_item_once() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-1", "To Do");
        let exec = executor(&jira);

        let first = exec.ensure_state("SCRUM-1", "progressing").await.unwrap();
        assert_eq!(
            first,
            EnsureOutcome {
                already_in_state: false,
                new_status: "Progressing".into()
            }
        );

        let second = exec.ensure_state("SCRUM-1", "Progressing").await.unwrap();
        assert!(second.already_in_state);
        assert_eq!(jira.transition_posts("SCRUM-1"), 1);
        assert_eq!(jira.status_of("SCRUM-1").as_deref(), Some("Progressing"));
    }

    #[tokio::test]
    async fn item_already_done_issues_no_transition() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-2", "Done");
        let exec = executor(&jira);

        let outcome = exec.ensure_state("SCRUM-2", "Done").await.unwrap();
        assert_eq!(
            outcome,
            EnsureOutcome {
                already_in_state: true,
                new_status: "Done".into()
            }
        );
        assert_eq!(jira.transition_posts("SCRUM-2"), 0);
        assert_eq!(
            jira.count(Method::GET, "/rest/api/3/issue/SCRUM-2/transitions"),
            0
        );
    }

    #[tokio::test]
    async fn ensure_state_on_missing_item_is_not_found() {
        let jira = FakeJira::new();
        let err = executor(&jira)
            .ensure_state("SCRUM-9", "Done")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Jira(JiraError::NotFound { .. })));
    }

    #[tokio::test]
    async fn ensure_state_without_matching_edge_fails() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-1", "Done");
        let err = executor(&jira)
            .ensure_state("SCRUM-1", "Progressing")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NoSuchTransition { .. }));
        assert_eq!(jira.transition_posts("SCRUM-1"), 0);
    }

    #[tokio::test]
    async fn required_resolution_gets_default_value() {
        let jira = FakeJira::new();
        jira.set_transitions("To Do", vec![resolving_transition("31", "Close", "Done")]);
        jira.insert_issue("SCRUM-1", "To Do");

        let outcome = executor(&jira).ensure_state("SCRUM-1", "Done").await.unwrap();
        assert_eq!(outcome.new_status, "Done");
        assert_eq!(jira.status_of("SCRUM-1").as_deref(), Some("Done"));
    }

    #[tokio::test]
    async fn required_resolution_without_default_fails_before_request() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-1", "To Do");
        let exec = TransitionExecutor::new(&jira, None);

        let err = exec
            .apply_transition("SCRUM-1", &resolving_transition("31", "Close", "Done"))
            .await
            .unwrap_err();
        match err {
            WorkflowError::MissingRequiredField { field, transition, .. } => {
                assert_eq!(field, "resolution");
                assert_eq!(transition, "Close");
            }
            other => panic!("expected MissingRequiredField, got {other:?}"),
        }
        assert_eq!(jira.transition_posts("SCRUM-1"), 0);
    }

    #[test]
    fn unknown_required_field_cannot_be_filled() {
        let jira = FakeJira::new();
        let mut t = transition("51", "Escalate", "Escalated");
        t.fields.insert(
            "customfield_10010".into(),
            crate::jira::types::TransitionField {
                required: true,
                has_default_value: false,
                name: None,
            },
        );
        let err = executor(&jira).transition_body("SCRUM-1", &t).unwrap_err();
        assert!(matches!(err, WorkflowError::MissingRequiredField { ref field, .. } if field == "customfield_10010"));
    }

    #[tokio::test]
    async fn annotate_posts_adf_comment() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-1", "To Do");
        executor(&jira).annotate("SCRUM-1", "Work started").await;
        assert_eq!(
            jira.comments(),
            vec![("SCRUM-1".to_string(), "Work started".to_string())]
        );
    }

    #[tokio::test]
    async fn annotate_failure_is_swallowed() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-1", "To Do");
        jira.fail_on(Method::POST, "/rest/api/3/issue/SCRUM-1/comment", 500, 0);
        // Must not panic or propagate.
        executor(&jira).annotate("SCRUM-1", "ignored").await;
        assert!(jira.comments().is_empty());
    }

    #[tokio::test]
    async fn transport_errors_propagate_from_apply() {
        let jira = FakeJira::new();
        jira.insert_issue("SCRUM-1", "To Do");
        jira.fail_on(Method::POST, "/rest/api/3/issue/SCRUM-1/transitions", 409, 0);
        let err = executor(&jira)
            .ensure_state("SCRUM-1", "Done")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Jira(JiraError::Http { status: 409, .. })));
    }
}
