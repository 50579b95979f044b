//! In-memory Jira used by the unit tests.
//!
//! Keeps issues, a workflow graph keyed by status name, comments and Confluence
//! spaces, and records every request so tests can assert on call counts and
//! timing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use reqwest::Method;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::jira::error::JiraError;
use crate::jira::types::{StatusRef, Transition, TransitionField};
use crate::jira::{API, Transport, WIKI_API};

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub at: Instant,
}

#[derive(Debug)]
struct Failure {
    method: Method,
    path: String,
    status: u16,
    skip: usize,
    times: Option<usize>,
}

#[derive(Debug, Clone)]
struct FakeIssue {
    status: String,
    summary: String,
    issue_type: String,
    parent: Option<String>,
}

impl FakeIssue {
    fn new(status: &str, summary: &str) -> Self {
        Self {
            status: status.to_string(),
            summary: summary.to_string(),
            issue_type: "Story".to_string(),
            parent: None,
        }
    }

    fn search_json(&self, key: &str) -> Value {
        let mut fields = json!({
            "summary": self.summary,
            "status": { "name": self.status },
            "issuetype": { "name": self.issue_type },
        });
        if let Some(parent) = &self.parent {
            fields["parent"] = json!({ "key": parent });
        }
        json!({ "key": key, "fields": fields })
    }
}

#[derive(Debug, Default)]
struct State {
    next_seq: u64,
    issues: BTreeMap<String, FakeIssue>,
    workflow: HashMap<String, Vec<Transition>>,
    comments: Vec<(String, String)>,
    spaces: BTreeMap<String, Value>,
    failures: Vec<Failure>,
    calls: Vec<Call>,
}

pub struct FakeJira {
    state: Mutex<State>,
}

pub fn transition(id: &str, name: &str, to: &str) -> Transition {
    Transition {
        id: id.to_string(),
        name: name.to_string(),
        to: StatusRef {
            id: None,
            name: to.to_string(),
        },
        fields: BTreeMap::new(),
    }
}

/// A transition whose screen requires a resolution.
pub fn resolving_transition(id: &str, name: &str, to: &str) -> Transition {
    let mut t = transition(id, name, to);
    t.fields.insert(
        "resolution".to_string(),
        TransitionField {
            required: true,
            has_default_value: false,
            name: Some("Resolution".to_string()),
        },
    );
    t
}

impl FakeJira {
    /// To Do ⇄ Progressing → Done → To Do.
    pub fn new() -> Self {
        let jira = Self {
            state: Mutex::new(State::default()),
        };
        jira.set_transitions(
            "To Do",
            vec![
                transition("11", "Start", "Progressing"),
                transition("31", "Done", "Done"),
            ],
        );
        jira.set_transitions(
            "Progressing",
            vec![
                transition("21", "Stop", "To Do"),
                transition("31", "Done", "Done"),
            ],
        );
        jira.set_transitions("Done", vec![transition("41", "Reopen", "To Do")]);
        jira
    }

    pub fn set_transitions(&self, status: &str, transitions: Vec<Transition>) {
        let mut state = self.state.lock().unwrap();
        state.workflow.insert(status.to_lowercase(), transitions);
    }

    pub fn insert_issue(&self, key: &str, status: &str) {
        self.insert_detailed(key, status, &format!("Issue {key}"), None);
    }

    pub fn insert_detailed(&self, key: &str, status: &str, summary: &str, parent: Option<&str>) {
        let mut issue = FakeIssue::new(status, summary);
        issue.parent = parent.map(str::to_string);
        if parent.is_some() {
            issue.issue_type = "Subtask".to_string();
        }
        let mut state = self.state.lock().unwrap();
        state.issues.insert(key.to_string(), issue);
    }

    pub fn insert_space(&self, key: &str, name: &str, space_type: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.spaces.len() as u64 + 1;
        state.spaces.insert(
            key.to_string(),
            json!({ "id": id, "key": key, "name": name, "type": space_type, "status": "current" }),
        );
    }

    pub fn space_count(&self) -> usize {
        self.state.lock().unwrap().spaces.len()
    }

    pub fn status_of(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .issues
            .get(key)
            .map(|issue| issue.status.clone())
    }

    pub fn issue_count(&self) -> usize {
        self.state.lock().unwrap().issues.len()
    }

    /// Answer `status` for matching requests after `skip` successes, forever.
    pub fn fail_on(&self, method: Method, path: &str, status: u16, skip: usize) {
        self.push_failure(method, path, status, skip, None);
    }

    /// Answer `status` once, for the match following `skip` successes.
    pub fn fail_once(&self, method: Method, path: &str, status: u16, skip: usize) {
        self.push_failure(method, path, status, skip, Some(1));
    }

    fn push_failure(&self, method: Method, path: &str, status: u16, skip: usize, times: Option<usize>) {
        self.state.lock().unwrap().failures.push(Failure {
            method,
            path: path.to_string(),
            status,
            skip,
            times,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && strip_query(&c.path) == path)
            .count()
    }

    pub fn transition_posts(&self, key: &str) -> usize {
        self.count(Method::POST, &format!("{API}/issue/{key}/transitions"))
    }

    pub fn comments(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().comments.clone()
    }

    fn scripted_failure(state: &mut State, method: &Method, path: &str) -> Option<u16> {
        let failure = state
            .failures
            .iter_mut()
            .find(|f| &f.method == method && f.path == path && f.times != Some(0))?;
        if failure.skip > 0 {
            failure.skip -= 1;
            return None;
        }
        if let Some(times) = failure.times.as_mut() {
            *times -= 1;
        }
        Some(failure.status)
    }

    fn not_found(path: &str) -> JiraError {
        JiraError::from_status(404, "not found", path, 0)
    }

    fn bad_request(msg: &str, path: &str) -> JiraError {
        JiraError::from_status(400, msg, path, 0)
    }

    /// Matches on `status = "..."` in the JQL and honors `maxResults`.
    fn search(state: &State, full_path: &str) -> Value {
        let jql = query_param(full_path, "jql").unwrap_or_default();
        let wanted = jql
            .split_once("status = \"")
            .and_then(|(_, rest)| rest.split_once('"'))
            .map(|(status, _)| status.to_string());
        let max = query_param(full_path, "maxResults")
            .and_then(|m| m.parse::<usize>().ok())
            .unwrap_or(50);
        let matching: Vec<Value> = state
            .issues
            .iter()
            .filter(|(_, issue)| wanted.as_ref().is_none_or(|w| *w == issue.status))
            .map(|(key, issue)| issue.search_json(key))
            .collect();
        let is_last = matching.len() <= max;
        let issues: Vec<Value> = matching.into_iter().take(max).collect();
        let mut page = json!({ "issues": issues, "isLast": is_last });
        if !is_last {
            page["nextPageToken"] = json!("next");
        }
        page
    }

    fn route(
        state: &mut State,
        method: &Method,
        path: &str,
        full_path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, JiraError> {
        let issue_prefix = format!("{API}/issue/");
        let space_prefix = format!("{WIKI_API}/space");

        if *method == Method::POST && path == format!("{API}/issue") {
            state.next_seq += 1;
            let key = format!("SCRUM-{}", state.next_seq);
            let fields = body.map(|b| &b["fields"]);
            let summary = fields
                .and_then(|f| f["summary"].as_str())
                .unwrap_or_default();
            let mut issue = FakeIssue::new("To Do", summary);
            if let Some(issue_type) = fields.and_then(|f| f["issuetype"]["name"].as_str()) {
                issue.issue_type = issue_type.to_string();
            }
            issue.parent = fields
                .and_then(|f| f["parent"]["key"].as_str())
                .map(str::to_string);
            state.issues.insert(key.clone(), issue);
            return Ok(Some(json!({ "id": state.next_seq.to_string(), "key": key })));
        }
        if *method == Method::GET && path == format!("{API}/search/jql") {
            return Ok(Some(Self::search(state, full_path)));
        }
        if *method == Method::GET && path == format!("{API}/issuetype/project") {
            return Ok(Some(json!([
                { "id": "10001", "name": "Epic", "subtask": false },
                { "id": "10004", "name": "Story", "subtask": false },
                { "id": "10003", "name": "Task", "subtask": false },
                { "id": "10005", "name": "Subtask", "subtask": true }
            ])));
        }
        if *method == Method::GET && path == format!("{API}/issueLinkType") {
            return Ok(Some(json!({
                "issueLinkTypes": [
                    { "id": "10000", "name": "Blocks", "inward": "is blocked by", "outward": "blocks" },
                    { "id": "10001", "name": "Relates", "inward": "relates to", "outward": "relates to" }
                ]
            })));
        }
        if let Some(rest) = path.strip_prefix(&format!("{API}/issue/createmeta/")) {
            if *method != Method::GET || !rest.ends_with("/issuetypes/10004") {
                return Err(Self::not_found(path));
            }
            return Ok(Some(json!({
                "values": [
                    { "fieldId": "summary", "name": "Summary", "required": true },
                    { "fieldId": "issuetype", "name": "Issue Type", "required": true },
                    { "fieldId": "description", "name": "Description", "required": false },
                    { "fieldId": "parent", "name": "Parent", "required": false }
                ]
            })));
        }
        if *method == Method::GET && path == format!("{API}/myself") {
            return Ok(Some(json!({
                "accountId": "557058:abc",
                "displayName": "Dev Example",
                "emailAddress": "dev@example.com"
            })));
        }
        if *method == Method::GET && path.starts_with(&format!("{API}/project/")) {
            let key = path.rsplit('/').next().unwrap_or_default();
            return Ok(Some(json!({
                "id": "10000", "key": key, "name": "Scrum Project", "projectTypeKey": "software",
                "style": "next-gen", "simplified": true
            })));
        }
        if let Some(rest) = path.strip_prefix(&issue_prefix) {
            let mut parts = rest.splitn(2, '/');
            let key = parts.next().unwrap_or_default().to_string();
            let sub = parts.next();
            let issue = state
                .issues
                .get(&key)
                .cloned()
                .ok_or_else(|| Self::not_found(path))?;
            let status = issue.status.clone();
            return match (method.clone(), sub) {
                (Method::GET, None) => Ok(Some(json!({
                    "key": key,
                    "fields": { "status": { "name": status }, "summary": issue.summary }
                }))),
                (Method::DELETE, None) => {
                    state.issues.remove(&key);
                    Ok(None)
                }
                (Method::GET, Some("transitions")) => {
                    let transitions = state
                        .workflow
                        .get(&status.to_lowercase())
                        .cloned()
                        .unwrap_or_default();
                    Ok(Some(json!({ "transitions": transitions })))
                }
                (Method::POST, Some("transitions")) => {
                    let body = body.ok_or_else(|| Self::bad_request("missing body", path))?;
                    let id = body["transition"]["id"].as_str().unwrap_or_default();
                    let t = state
                        .workflow
                        .get(&status.to_lowercase())
                        .and_then(|ts| ts.iter().find(|t| t.id == id))
                        .cloned()
                        .ok_or_else(|| Self::bad_request("transition not valid", path))?;
                    if t.required_fields().any(|f| body["fields"][f].is_null()) {
                        return Err(Self::bad_request("required field missing", path));
                    }
                    if let Some(issue) = state.issues.get_mut(&key) {
                        issue.status = t.to.name.clone();
                    }
                    Ok(None)
                }
                (Method::POST, Some("comment")) => {
                    let text = body
                        .and_then(|b| b["body"]["content"][0]["content"][0]["text"].as_str())
                        .unwrap_or_default()
                        .to_string();
                    state.comments.push((key, text));
                    Ok(Some(json!({ "id": state.comments.len().to_string() })))
                }
                _ => Err(Self::bad_request("unsupported", path)),
            };
        }
        if let Some(rest) = path.strip_prefix(&space_prefix) {
            let key = rest.trim_start_matches('/').to_string();
            return match (method.clone(), key.is_empty()) {
                (Method::GET, true) => {
                    let kind = query_param(full_path, "type");
                    let results: Vec<Value> = state
                        .spaces
                        .values()
                        .filter(|space| kind.as_deref().is_none_or(|k| space["type"] == k))
                        .cloned()
                        .collect();
                    Ok(Some(json!({ "results": results, "size": results.len() })))
                }
                (Method::GET, false) => state
                    .spaces
                    .get(&key)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| Self::not_found(path)),
                (Method::POST, true) => {
                    let body = body.cloned().unwrap_or_default();
                    let key = body["key"].as_str().unwrap_or_default().to_string();
                    if state.spaces.contains_key(&key) {
                        return Err(JiraError::from_status(409, "space exists", path, 0));
                    }
                    let space = json!({
                        "id": state.spaces.len() as u64 + 1,
                        "key": key,
                        "name": body["name"],
                        "type": body["type"],
                        "status": "current"
                    });
                    state.spaces.insert(key, space.clone());
                    Ok(Some(space))
                }
                (Method::DELETE, false) => state
                    .spaces
                    .remove(&key)
                    .map(|_| None)
                    .ok_or_else(|| Self::not_found(path)),
                _ => Err(Self::bad_request("unsupported", path)),
            };
        }
        Err(Self::not_found(path))
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map(|(p, _)| p).unwrap_or(path)
}

fn query_param(path: &str, name: &str) -> Option<String> {
    let (_, query) = path.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .and_then(|(_, v)| urlencoding::decode(v).ok())
        .map(|v| v.into_owned())
}

impl Transport for FakeJira {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, JiraError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            method: method.clone(),
            path: path.to_string(),
            at: Instant::now(),
        });
        let bare = strip_query(path).to_string();
        if let Some(status) = Self::scripted_failure(&mut state, &method, &bare) {
            return Err(JiraError::from_status(status, "scripted failure", &bare, 0));
        }
        Self::route(&mut state, &method, &bare, path, body)
    }
}
