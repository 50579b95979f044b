//! Configuração do jira-flow carregada a partir de `jira-flow.toml`.
//!
//! A struct [`JiraConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `JIRA_EMAIL`, `JIRA_API_TOKEN`, `JIRA_BASE_URL`
//! e `JIRA_PROJECT_KEY` têm precedência sobre o arquivo; um `.env` no
//! diretório atual é carregado antes delas.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::JiraFlowError;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "jira-flow.toml";

/// Configuração de nível superior carregada de `jira-flow.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
    /// E-mail da conta Atlassian usada na autenticação Basic.
    #[serde(default)]
    pub email: String,

    /// Token de API da conta.
    #[serde(default)]
    pub api_token: String,

    /// URL da instância (ex.: `https://empresa.atlassian.net`).
    #[serde(default)]
    pub base_url: String,

    /// Projeto padrão para criação e busca de issues.
    #[serde(default = "default_project_key")]
    pub project_key: String,

    /// Timeout total de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Ritmo de processamento dos lotes.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Itens por grupo antes de uma pausa.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pausa entre grupos, em milissegundos.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Pausa entre itens do mesmo grupo, em milissegundos.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
}

/// Configuração de retentativas para respostas HTTP 429.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Máximo de retentativas antes de devolver `RateLimited`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

/// Nomes simbólicos dos status usados pelos subcomandos de workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_start_status")]
    pub start_status: String,

    #[serde(default = "default_done_status")]
    pub done_status: String,

    #[serde(default = "default_reopen_status")]
    pub reopen_status: String,

    /// Resolução anexada quando uma transição a exige. `None` faz a
    /// transição falhar com `MissingRequiredField`.
    #[serde(default = "default_resolution")]
    pub default_resolution: Option<String>,
}

// Projeto padrão dos scripts originais de Next-Gen: "SCRUM".
fn default_project_key() -> String {
    "SCRUM".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_item_delay_ms() -> u64 {
    100
}

// Valor padrão para retentativas máximas: 3.
fn default_max_retries() -> u32 {
    3
}

// Valor padrão para o atraso base: 1000ms.
fn default_base_delay_ms() -> u64 {
    1000
}

fn default_start_status() -> String {
    "Progressing".to_string()
}

fn default_done_status() -> String {
    "Done".to_string()
}

fn default_reopen_status() -> String {
    "To Do".to_string()
}

fn default_resolution() -> Option<String> {
    Some("Done".to_string())
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            item_delay_ms: default_item_delay_ms(),
        }
    }
}

impl BatchConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Calcula o atraso de uma tentativa usando backoff exponencial.
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Teto de qualquer espera, inclusive a pedida via `Retry-After`:
    /// o atraso da tentativa seguinte à última.
    pub fn max_delay_ms(&self) -> u64 {
        self.delay_for_attempt(self.max_retries.saturating_add(1))
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            start_status: default_start_status(),
            done_status: default_done_status(),
            reopen_status: default_reopen_status(),
            default_resolution: default_resolution(),
        }
    }
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            api_token: String::new(),
            base_url: String::new(),
            project_key: default_project_key(),
            request_timeout_secs: default_request_timeout_secs(),
            batch: BatchConfig::default(),
            retry: RetryConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl JiraConfig {
    /// Carrega `.env`, depois `jira-flow.toml` no diretório atual, e por fim
    /// aplica as variáveis de ambiente. Usa valores padrão se o arquivo não
    /// existir.
    pub fn load() -> Result<Self, JiraFlowError> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("loaded environment variables from .env");
        }

        let path = Path::new(CONFIG_FILE);
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<JiraConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Variáveis de ambiente não vazias têm precedência sobre o arquivo.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut String); 4] = [
            ("JIRA_EMAIL", &mut self.email),
            ("JIRA_API_TOKEN", &mut self.api_token),
            ("JIRA_BASE_URL", &mut self.base_url),
            ("JIRA_PROJECT_KEY", &mut self.project_key),
        ];
        for (name, slot) in targets {
            match lookup(name) {
                Some(value) if !value.is_empty() => *slot = value,
                _ => {}
            }
        }
    }

    /// Garante que as credenciais estão presentes antes de qualquer chamada.
    pub fn validate(&self) -> Result<(), JiraFlowError> {
        let missing: Vec<&str> = [
            ("JIRA_EMAIL", &self.email),
            ("JIRA_API_TOKEN", &self.api_token),
            ("JIRA_BASE_URL", &self.base_url),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(JiraFlowError::Config(format!(
                "missing required settings: {} (set them in .env, {CONFIG_FILE} or the environment)",
                missing.join(", ")
            )));
        }
        if self.project_key.trim().is_empty() {
            return Err(JiraFlowError::Config("project key must not be empty".into()));
        }
        if self.batch.batch_size == 0 {
            return Err(JiraFlowError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> JiraConfig {
        JiraConfig {
            email: "dev@example.com".into(),
            api_token: "t".into(),
            base_url: "https://example.atlassian.net".into(),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_values() {
        let config = JiraConfig::default();
        assert_eq!(config.project_key, "SCRUM");
        assert_eq!(config.batch.batch_size, 5);
        assert_eq!(config.batch.item_delay_ms, 100);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.workflow.done_status, "Done");
        assert_eq!(config.workflow.default_resolution.as_deref(), Some("Done"));
        assert!(config.api_token.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            email = "dev@example.com"
            project_key = "OPS"

            [batch]
            batch_size = 10

            [workflow]
            start_status = "In Progress"
        "#;
        let config: JiraConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.email, "dev@example.com");
        assert_eq!(config.project_key, "OPS");
        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.batch.batch_delay_ms, 1000);
        assert_eq!(config.workflow.start_status, "In Progress");
        assert_eq!(config.workflow.reopen_status, "To Do");
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn env_overrides_file_values_unless_empty() {
        let mut config = JiraConfig {
            email: "file@example.com".into(),
            ..Default::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            ("JIRA_EMAIL", "env@example.com"),
            ("JIRA_API_TOKEN", "secret"),
            ("JIRA_PROJECT_KEY", ""),
        ]);
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.email, "env@example.com");
        assert_eq!(config.api_token, "secret");
        assert_eq!(config.project_key, "SCRUM");
    }

    #[test]
    fn validate_lists_every_missing_credential() {
        let err = JiraConfig::default().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("JIRA_EMAIL"));
        assert!(msg.contains("JIRA_API_TOKEN"));
        assert!(msg.contains("JIRA_BASE_URL"));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = valid();
        config.batch.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_config_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 1000,
        };
        assert_eq!(config.delay_for_attempt(1), 1000);
        assert_eq!(config.delay_for_attempt(2), 2000);
        assert_eq!(config.delay_for_attempt(3), 4000);
        assert_eq!(config.delay_for_attempt(4), 8000);
    }

    #[test]
    fn retry_wait_ceiling_follows_the_last_attempt() {
        let config = RetryConfig::default();
        assert_eq!(config.max_delay_ms(), 8000);
        let unbounded = RetryConfig {
            max_retries: u32::MAX,
            base_delay_ms: u64::MAX,
        };
        assert_eq!(unbounded.max_delay_ms(), u64::MAX);
    }
}
