//! Plain issue/project requests with no workflow logic.

use reqwest::Method;
use serde_json::json;

use super::error::JiraError;
use super::transport::{Transport, decode};
use super::types::{CreatedIssue, Myself, NewIssue, SearchResponse};
use super::API;

/// Create an issue in `project_key`.
pub async fn create_issue<T: Transport>(
    transport: &T,
    project_key: &str,
    issue: &NewIssue,
) -> Result<CreatedIssue, JiraError> {
    let path = format!("{API}/issue");
    let payload = issue.to_payload(project_key);
    let value = transport.request(Method::POST, &path, Some(&payload)).await?;
    decode(value, &path)
}

/// Delete an issue together with its subtasks.
pub async fn delete_issue<T: Transport>(transport: &T, key: &str) -> Result<(), JiraError> {
    let path = format!(
        "{API}/issue/{}?deleteSubtasks=true",
        urlencoding::encode(key)
    );
    transport.request(Method::DELETE, &path, None).await?;
    Ok(())
}

/// Fields requested when listing issues.
const LISTING_FIELDS: &str = "key,summary,status,issuetype,parent";

/// First page of a JQL search, with only `fields` filled in.
async fn search<T: Transport>(
    transport: &T,
    jql: &str,
    max_results: u32,
    fields: &str,
) -> Result<SearchResponse, JiraError> {
    let path = format!(
        "{API}/search/jql?jql={}&maxResults={max_results}&fields={fields}",
        urlencoding::encode(jql)
    );
    let value = transport.request(Method::GET, &path, None).await?;
    decode(value, &path)
}

/// Run a JQL search returning only issue keys.
pub async fn search_keys<T: Transport>(
    transport: &T,
    jql: &str,
    max_results: u32,
) -> Result<SearchResponse, JiraError> {
    search(transport, jql, max_results, "key").await
}

/// Run a JQL search returning summary, status, type and parent of each issue.
pub async fn search_issues<T: Transport>(
    transport: &T,
    jql: &str,
    max_results: u32,
) -> Result<SearchResponse, JiraError> {
    search(transport, jql, max_results, LISTING_FIELDS).await
}

pub async fn myself<T: Transport>(transport: &T) -> Result<Myself, JiraError> {
    let path = format!("{API}/myself");
    let value = transport.request(Method::GET, &path, None).await?;
    decode(value, &path)
}

/// Numeric suffix of an issue key, `SCRUM-42` → 42.
pub fn key_sequence(key: &str) -> Option<u64> {
    key.rsplit_once('-').and_then(|(_, n)| n.parse().ok())
}

/// Order keys highest sequence first so subtasks go before their parents.
pub fn sort_for_deletion(keys: &mut [String]) {
    keys.sort_by(|a, b| key_sequence(b).cmp(&key_sequence(a)).then_with(|| b.cmp(a)));
}

/// JQL selecting every issue of a project.
pub fn project_jql(project_key: &str) -> String {
    format!("project = {project_key} ORDER BY key ASC")
}

/// JQL listing a project's issues, newest first, optionally in one status.
pub fn listing_jql(project_key: &str, status: Option<&str>) -> String {
    match status {
        Some(status) => format!(
            "project = {project_key} AND status = \"{}\" ORDER BY key DESC",
            status.replace('"', "\\\"")
        ),
        None => format!("project = {project_key} ORDER BY key DESC"),
    }
}

/// Body of `POST /issue/{key}/comment`.
pub fn comment_payload(text: &str) -> serde_json::Value {
    json!({ "body": super::types::AdfDocument::paragraph(text) })
}
