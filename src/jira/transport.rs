//! The request seam the workflow core is written against.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::JiraError;

/// Authenticated JSON request/response against the tracker.
///
/// Returns `Ok(None)` for responses without a body (204, 202). Every non-2xx
/// status is normalized into a [`JiraError`] before reaching the caller.
pub trait Transport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, JiraError>;
}

/// Decode a response that must carry a body.
pub fn decode<T: DeserializeOwned>(value: Option<Value>, path: &str) -> Result<T, JiraError> {
    let value = value.ok_or_else(|| JiraError::Decode(format!("empty response from {path}")))?;
    serde_json::from_value(value).map_err(|e| JiraError::Decode(format!("{path}: {e}")))
}
