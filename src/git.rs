//! Leitura do histórico Git via libgit2 para popular o backlog.
//!
//! O [`GitManager`] expõe os commits recentes; o subcomando `bulk-create`
//! usa o resumo de cada um como título de issue e o restante na descrição.

use git2::{Repository, Sort};
use std::path::Path;

use crate::error::JiraFlowError;

/// Um commit lido do histórico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Hash abreviado (7 caracteres).
    pub short_id: String,
    /// Primeira linha da mensagem.
    pub summary: String,
    pub author: Option<String>,
    /// Mensagem completa.
    pub message: String,
}

/// Gerenciador de leitura de um repositório Git usando a biblioteca libgit2.
pub struct GitManager {
    repo: Repository,
}

impl GitManager {
    /// Abre o repositório que contém o caminho fornecido, subindo diretórios
    /// até encontrar um `.git`.
    pub fn open(path: &Path) -> Result<Self, JiraFlowError> {
        let repo = Repository::discover(path)?;
        Ok(Self { repo })
    }

    /// Os `count` commits mais recentes a partir do HEAD, do mais novo para o
    /// mais antigo. Commits sem resumo são ignorados. Um repositório sem
    /// commits resulta em lista vazia.
    pub fn recent_commits(&self, count: usize) -> Result<Vec<CommitInfo>, JiraFlowError> {
        if self.repo.is_empty()? {
            return Ok(Vec::new());
        }
        let mut walk = self.repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(Sort::TIME)?;

        let mut commits = Vec::with_capacity(count);
        for oid in walk {
            if commits.len() == count {
                break;
            }
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            // Mensagens que não são UTF-8 válido não têm resumo.
            let Some(summary) = commit.summary().map(str::trim) else {
                continue;
            };
            if summary.is_empty() {
                continue;
            }
            let id = oid.to_string();
            commits.push(CommitInfo {
                short_id: id[..7.min(id.len())].to_string(),
                summary: summary.to_string(),
                author: commit.author().name().map(str::to_string),
                message: commit.message().unwrap_or(summary).trim_end().to_string(),
            });
        }
        Ok(commits)
    }

    /// Retorna o nome da branch atual.
    pub fn current_branch(&self) -> Result<String, JiraFlowError> {
        let head = self.repo.head()?;
        let name = head
            .shorthand()
            .ok_or_else(|| JiraFlowError::Config("branch name is not valid UTF-8".into()))?
            .to_string();
        Ok(name)
    }
}
