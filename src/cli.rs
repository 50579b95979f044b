//! Interface de linha de comando do jira-flow baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] e flags globais
//! (--verbose, --json, --max-retries, --batch-size).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// jira-flow — operações em lote sobre issues do Jira, guiadas pelo workflow.
#[derive(Debug, Parser)]
#[command(name = "jira-flow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Número máximo de retentativas para respostas HTTP 429.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Itens por grupo antes de uma pausa.
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Imprime o relatório do lote em JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cria uma única issue.
    CreateOne {
        #[arg(long, default_value = "Test issue created by jira-flow")]
        summary: String,

        #[arg(long)]
        description: Option<String>,

        /// Tipo da issue (Story, Task, Epic, Subtask).
        #[arg(long, default_value = "Story")]
        issue_type: String,

        /// Chave da issue pai.
        #[arg(long)]
        parent: Option<String>,
    },

    /// Apaga todas as issues do projeto, da maior chave para a menor.
    /// Sem --confirm apenas lista o que seria apagado.
    DeleteAll {
        #[arg(long, default_value_t = false)]
        confirm: bool,

        /// Limite de issues buscadas.
        #[arg(long, default_value_t = 100)]
        max: u32,
    },

    /// Consulta ou move issues pelo workflow.
    Workflow {
        action: WorkflowAction,

        /// Chaves das issues (ex.: SCRUM-42). Nas ações batch-*, SCRUM-42=Review
        /// define um status alvo próprio para a issue.
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Lista issues do projeto via JQL, das mais novas para as mais antigas.
    Issues {
        /// Filtro de status.
        #[arg(value_enum, default_value_t = IssueFilter::All)]
        status: IssueFilter,

        /// Máximo de issues exibidas.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Inspeciona o projeto: tipos de issue, tipos de vínculo, campos da tela
    /// de criação e estilo (Next-Gen ou clássico).
    Fields {
        /// Tipo de issue cuja tela de criação é inspecionada.
        #[arg(long, default_value = "Story")]
        issue_type: String,
    },

    /// Cria uma issue por commit recente e move cada uma para o status alvo.
    BulkCreate {
        /// Quantidade de commits lidos.
        #[arg(long, default_value_t = 50)]
        count: usize,

        /// Repositório Git de origem.
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Status alvo; por padrão o status "done" configurado.
        #[arg(long)]
        target: Option<String>,
    },

    /// Verifica as credenciais e o acesso ao projeto.
    CheckAuth,

    /// Gerencia espaços do Confluence.
    Spaces {
        #[command(subcommand)]
        action: SpaceAction,
    },
}

/// Ações do subcomando `workflow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkflowAction {
    /// Mostra o status atual e as transições disponíveis.
    Status,
    /// Move para o status de início.
    Start,
    /// Move para o status de conclusão.
    Complete,
    /// Move de volta para o status inicial.
    Reopen,
    /// Demonstração completa: status, início, conclusão.
    Demo,
    /// Início em lote, com pausas entre grupos.
    BatchStart,
    /// Conclusão em lote, com pausas entre grupos.
    BatchComplete,
}

/// Filtro de status do subcomando `issues`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IssueFilter {
    /// Status inicial configurado (reopen_status).
    Todo,
    /// Status de início configurado (start_status).
    Progressing,
    /// Status de conclusão configurado (done_status).
    Done,
    All,
}

/// Tipo de espaço do Confluence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpaceKind {
    Global,
    Personal,
}

impl SpaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpaceKind::Global => "global",
            SpaceKind::Personal => "personal",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SpaceAction {
    List {
        #[arg(long, default_value_t = 50)]
        limit: u32,

        /// Apenas espaços deste tipo.
        #[arg(long = "type", value_enum)]
        space_type: Option<SpaceKind>,
    },
    Create {
        /// Chave do espaço; letras maiúsculas e dígitos, começando por letra.
        key: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Apaga um espaço e todo o seu conteúdo. Sem --confirm apenas mostra
    /// o espaço que seria apagado.
    Delete {
        key: String,
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}
