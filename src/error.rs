use thiserror::Error;

#[derive(Debug, Error)]
pub enum JiraFlowError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(".env error: {0}")]
    Env(#[from] dotenvy::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
