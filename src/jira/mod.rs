pub mod client;
pub mod error;
pub mod issues;
pub mod projects;
pub mod spaces;
pub mod transport;
pub mod types;

pub use client::JiraClient;
pub use error::JiraError;
pub use transport::Transport;
pub use types::{AdfDocument, AdfNode, CreatedIssue, NewIssue, Transition};

/// Prefix of the Jira platform REST API.
pub const API: &str = "/rest/api/3";

/// Prefix of the Confluence REST API.
pub const WIKI_API: &str = "/wiki/rest/api";
