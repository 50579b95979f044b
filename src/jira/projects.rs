//! Project lookups: the project itself, its issue types, link types and the
//! fields of a create screen.

use reqwest::Method;

use super::error::JiraError;
use super::transport::{Transport, decode};
use super::types::{CreateField, CreateMeta, IssueLinkType, IssueLinkTypes, IssueType, Project};
use super::API;

pub async fn project<T: Transport>(transport: &T, key: &str) -> Result<Project, JiraError> {
    let path = format!("{API}/project/{}", urlencoding::encode(key));
    let value = transport.request(Method::GET, &path, None).await?;
    decode(value, &path)
}

/// Issue types usable in the project with id `project_id`.
pub async fn issue_types<T: Transport>(
    transport: &T,
    project_id: &str,
) -> Result<Vec<IssueType>, JiraError> {
    let path = format!(
        "{API}/issuetype/project?projectId={}",
        urlencoding::encode(project_id)
    );
    let value = transport.request(Method::GET, &path, None).await?;
    decode(value, &path)
}

pub async fn link_types<T: Transport>(transport: &T) -> Result<Vec<IssueLinkType>, JiraError> {
    let path = format!("{API}/issueLinkType");
    let value = transport.request(Method::GET, &path, None).await?;
    let types: IssueLinkTypes = decode(value, &path)?;
    Ok(types.issue_link_types)
}

/// Fields of the create screen for one issue type of a project.
pub async fn create_fields<T: Transport>(
    transport: &T,
    project_key: &str,
    issue_type_id: &str,
) -> Result<Vec<CreateField>, JiraError> {
    let path = format!(
        "{API}/issue/createmeta/{}/issuetypes/{}",
        urlencoding::encode(project_key),
        urlencoding::encode(issue_type_id)
    );
    let value = transport.request(Method::GET, &path, None).await?;
    let meta: CreateMeta = decode(value, &path)?;
    Ok(meta.into_fields())
}
