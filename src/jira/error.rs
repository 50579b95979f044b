//! Tipos de erro para o transporte HTTP do Jira.
//!
//! Define [`JiraError`], a normalização de toda resposta não-2xx em uma
//! falha tipada. Usa `thiserror` para derivar `Display` e `Error`
//! automaticamente a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Tamanho máximo do trecho do corpo de resposta guardado em um erro.
pub const EXCERPT_LEN: usize = 200;

/// Erros que podem ocorrer ao interagir com a API REST do Jira.
///
/// As variantes cobrem os cenários de falha que o núcleo precisa distinguir:
/// - [`Auth`](JiraError::Auth) — credencial inválida ou expirada (HTTP 401), fatal
/// - [`NotFound`](JiraError::NotFound) — issue/projeto inexistente (HTTP 404)
/// - [`RateLimited`](JiraError::RateLimited) — o servidor retornou HTTP 429
/// - [`Http`](JiraError::Http) — qualquer outro status não-2xx
/// - [`Network`](JiraError::Network) — falha na camada de rede
/// - [`Decode`](JiraError::Decode) — corpo de resposta em formato inesperado
/// - [`Invalid`](JiraError::Invalid) — entrada recusada antes de qualquer requisição
#[derive(Debug, Error)]
pub enum JiraError {
    /// Credencial rejeitada pelo servidor. Aborta a execução inteira.
    #[error("authentication failed (status {status}): {excerpt}")]
    Auth { status: u16, excerpt: String },

    /// O recurso requisitado não existe.
    #[error("not found: {resource}")]
    NotFound { resource: String, excerpt: String },

    /// O servidor retornou HTTP 429 mesmo após as retentativas do cliente.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Qualquer outro status não-2xx, com um trecho do corpo da resposta.
    #[error("HTTP {status}: {excerpt}")]
    Http { status: u16, excerpt: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A resposta não tinha o formato esperado.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Entrada rejeitada localmente; nenhuma requisição foi enviada.
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl JiraError {
    /// Classifica um status HTTP não-2xx em uma variante tipada.
    ///
    /// `resource` identifica o caminho requisitado, usado em `NotFound`.
    pub fn from_status(status: u16, body: &str, resource: &str, retry_after_ms: u64) -> Self {
        let excerpt = excerpt(body);
        match status {
            401 => JiraError::Auth { status, excerpt },
            404 => JiraError::NotFound {
                resource: resource.to_string(),
                excerpt,
            },
            429 => JiraError::RateLimited { retry_after_ms },
            _ => JiraError::Http { status, excerpt },
        }
    }

    /// Apenas falhas de credencial interrompem um lote inteiro.
    pub fn is_fatal(&self) -> bool {
        matches!(self, JiraError::Auth { .. })
    }

    /// Status HTTP associado ao erro, quando houver.
    pub fn status(&self) -> Option<u16> {
        match self {
            JiraError::Auth { status, .. } | JiraError::Http { status, .. } => Some(*status),
            JiraError::NotFound { .. } => Some(404),
            JiraError::RateLimited { .. } => Some(429),
            JiraError::Network(e) => e.status().map(|s| s.as_u16()),
            JiraError::Decode(_) | JiraError::Invalid(_) => None,
        }
    }
}

/// Trunca o corpo de resposta em [`EXCERPT_LEN`] caracteres.
pub fn excerpt(body: &str) -> String {
    body.chars().take(EXCERPT_LEN).collect()
}
