//! Confluence space requests.

use reqwest::Method;
use serde_json::json;

use super::error::JiraError;
use super::transport::{Transport, decode};
use super::types::{Space, SpacePage};
use super::WIKI_API;

/// A space key must start with a letter and contain only `A-Z0-9`.
pub fn is_valid_space_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// List up to `limit` spaces, optionally of one type (`global`, `personal`).
pub async fn list_spaces<T: Transport>(
    transport: &T,
    limit: u32,
    space_type: Option<&str>,
) -> Result<Vec<Space>, JiraError> {
    let mut path = format!("{WIKI_API}/space?limit={limit}");
    if let Some(space_type) = space_type {
        path.push_str(&format!("&type={}", urlencoding::encode(space_type)));
    }
    let value = transport.request(Method::GET, &path, None).await?;
    let page: SpacePage = decode(value, &path)?;
    Ok(page.results)
}

pub async fn get_space<T: Transport>(transport: &T, key: &str) -> Result<Space, JiraError> {
    let path = format!("{WIKI_API}/space/{}", urlencoding::encode(key));
    let value = transport.request(Method::GET, &path, None).await?;
    decode(value, &path)
}

/// Create a global space. The key is upper-cased before validation.
pub async fn create_space<T: Transport>(
    transport: &T,
    key: &str,
    name: &str,
    description: Option<&str>,
) -> Result<Space, JiraError> {
    let key = key.to_uppercase();
    if !is_valid_space_key(&key) {
        return Err(JiraError::Invalid(format!(
            "space key {key} must start with a letter and contain only A-Z and 0-9"
        )));
    }
    let mut body = json!({ "key": key, "name": name, "type": "global" });
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        body["description"] = json!({
            "plain": { "value": description, "representation": "plain" }
        });
    }
    let path = format!("{WIKI_API}/space");
    let value = transport.request(Method::POST, &path, Some(&body)).await?;
    decode(value, &path)
}

/// Delete a space. Confluence answers 202 and removes it asynchronously.
pub async fn delete_space<T: Transport>(transport: &T, key: &str) -> Result<(), JiraError> {
    let path = format!("{WIKI_API}/space/{}", urlencoding::encode(key));
    transport.request(Method::DELETE, &path, None).await?;
    Ok(())
}
