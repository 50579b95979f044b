//! Tipos de dados para requisições e respostas da API REST do Jira.
//!
//! Todas as structs derivam `Serialize` e/ou `Deserialize` para conversão
//! JSON conforme o formato esperado pelos endpoints `rest/api/3` e
//! `wiki/rest/api`. Descrições e comentários usam o envelope ADF
//! (Atlassian Document Format) `{type: "doc", version: 1, content: [...]}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Limite de caracteres do campo `summary` imposto pelo Jira.
pub const SUMMARY_MAX_CHARS: usize = 255;

/// Documento ADF de nível superior.
///
/// Os campos `type` e `version` são fixos; o servidor rejeita corpos de
/// descrição/comentário que não reproduzam exatamente esse envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdfDocument {
    /// Sempre `"doc"`. Serializado como "type" no JSON.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Sempre `1`.
    pub version: u32,
    /// Blocos de conteúdo do documento.
    pub content: Vec<AdfNode>,
}

/// Um nó ADF. A tag `type` do JSON seleciona a variante.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdfNode {
    Paragraph { content: Vec<AdfNode> },
    Text { text: String },
    Heading { attrs: HeadingAttrs, content: Vec<AdfNode> },
    BulletList { content: Vec<AdfNode> },
    ListItem { content: Vec<AdfNode> },
    CodeBlock { attrs: CodeAttrs, content: Vec<AdfNode> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAttrs {
    pub language: String,
}

impl AdfNode {
    fn text(text: &str) -> Self {
        AdfNode::Text {
            text: text.to_string(),
        }
    }

    /// Parágrafo com um único nó de texto.
    pub fn paragraph(text: &str) -> Self {
        AdfNode::Paragraph {
            content: vec![Self::text(text)],
        }
    }

    /// Título; o nível é limitado ao intervalo 1..=6.
    pub fn heading(text: &str, level: u8) -> Self {
        AdfNode::Heading {
            attrs: HeadingAttrs {
                level: level.clamp(1, 6),
            },
            content: vec![Self::text(text)],
        }
    }

    /// Lista com marcadores, um parágrafo por item.
    pub fn bullets<S: AsRef<str>>(items: &[S]) -> Self {
        AdfNode::BulletList {
            content: items
                .iter()
                .map(|item| AdfNode::ListItem {
                    content: vec![Self::paragraph(item.as_ref())],
                })
                .collect(),
        }
    }

    pub fn code(code: &str, language: &str) -> Self {
        AdfNode::CodeBlock {
            attrs: CodeAttrs {
                language: language.to_string(),
            },
            content: vec![Self::text(code)],
        }
    }
}

impl AdfDocument {
    /// Cria um documento a partir de uma sequência de blocos.
    pub fn new(content: Vec<AdfNode>) -> Self {
        Self {
            doc_type: "doc".to_string(),
            version: 1,
            content,
        }
    }

    /// Documento com um único parágrafo de texto simples.
    pub fn paragraph(text: &str) -> Self {
        Self::new(vec![AdfNode::paragraph(text)])
    }
}

/// Referência a um status do workflow (ex.: "To Do", "Done").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Metadados de um campo exigido (ou não) por uma transição.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionField {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub has_default_value: bool,
    #[serde(default)]
    pub name: Option<String>,
}

/// Uma aresta do grafo de workflow, descoberta via
/// `GET /issue/{key}/transitions`.
///
/// O `id` é atribuído pelo servidor e só é válido para a resposta que o
/// trouxe; nunca é construído localmente fora de testes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
    pub to: StatusRef,
    /// Presente apenas com `expand=transitions.fields`.
    #[serde(default)]
    pub fields: BTreeMap<String, TransitionField>,
}

impl Transition {
    /// Nomes dos campos obrigatórios que não têm valor padrão no servidor.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.required && !f.has_default_value)
            .map(|(name, _)| name.as_str())
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: \"{}\" -> {}", self.id, self.name, self.to.name)
    }
}

/// Resposta de `GET /issue/{key}/transitions`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionsResponse {
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

/// Subconjunto de campos de uma issue que o núcleo consulta.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueFields {
    pub status: StatusRef,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Resposta de `GET /issue/{key}?fields=status,summary`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueResponse {
    pub key: String,
    pub fields: IssueFields,
}

/// Issue recém-criada, retornada por `POST /issue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

/// Dados de uma issue a ser criada.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    /// Título; truncado em [`SUMMARY_MAX_CHARS`] ao montar o payload.
    pub summary: String,
    /// Tipo da issue ("Story", "Task", "Epic", "Subtask").
    pub issue_type: String,
    /// Descrição já no formato ADF.
    pub description: Option<AdfDocument>,
    /// Chave da issue pai (Epic em projetos Next-Gen).
    pub parent: Option<String>,
    pub labels: Vec<String>,
}

impl NewIssue {
    /// Story com apenas o título preenchido.
    pub fn story(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            issue_type: "Story".to_string(),
            description: None,
            parent: None,
            labels: Vec::new(),
        }
    }

    /// Descrição em texto simples, convertida em um parágrafo ADF.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(AdfDocument::paragraph(description));
        self
    }

    pub fn with_document(mut self, document: AdfDocument) -> Self {
        self.description = Some(document);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Monta o corpo `{"fields": {...}}` de `POST /issue`.
    pub fn to_payload(&self, project_key: &str) -> Value {
        let summary: String = self.summary.chars().take(SUMMARY_MAX_CHARS).collect();
        let mut fields = json!({
            "project": { "key": project_key },
            "issuetype": { "name": self.issue_type },
            "summary": summary,
        });
        if let Some(description) = &self.description {
            fields["description"] = json!(description);
        }
        if let Some(parent) = &self.parent {
            fields["parent"] = json!({ "key": parent });
        }
        if !self.labels.is_empty() {
            fields["labels"] = json!(self.labels);
        }
        json!({ "fields": fields })
    }
}

/// Referência a um registro pelo nome (tipo de issue).
#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

/// Referência a uma issue pela chave (issue pai).
#[derive(Debug, Clone, Deserialize)]
pub struct KeyRef {
    pub key: String,
}

/// Campos pedidos em uma busca com `fields=key,summary,status,issuetype,parent`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<StatusRef>,
    #[serde(default)]
    pub issuetype: Option<NamedRef>,
    #[serde(default)]
    pub parent: Option<KeyRef>,
}

/// Uma issue na resposta de busca JQL.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchIssue {
    pub key: String,
    #[serde(default)]
    pub fields: SearchFields,
}

/// Resposta de `GET /search/jql`.
///
/// O endpoint é paginado por token e não informa o total de resultados;
/// `isLast` diz se há mais páginas além desta.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<SearchIssue>,
    #[serde(default)]
    pub is_last: Option<bool>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl SearchResponse {
    /// Há resultados além desta página.
    pub fn has_more(&self) -> bool {
        !self.is_last.unwrap_or(self.next_page_token.is_none())
    }
}

/// Usuário autenticado, retornado por `GET /myself`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Myself {
    pub account_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Projeto retornado por `GET /project/{key}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub project_type_key: Option<String>,
    /// `"next-gen"` ou `"classic"`.
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub simplified: Option<bool>,
}

impl Project {
    /// Projeto Next-Gen (team-managed): épicos via `parent`, tipo `Subtask`.
    pub fn is_next_gen(&self) -> bool {
        self.style.as_deref() == Some("next-gen") || self.simplified == Some(true)
    }
}

/// Tipo de issue disponível no projeto (`GET /issuetype/project`).
#[derive(Debug, Clone, Deserialize)]
pub struct IssueType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subtask: bool,
}

/// Tipo de vínculo entre issues (`GET /issueLinkType`).
#[derive(Debug, Clone, Deserialize)]
pub struct IssueLinkType {
    pub id: String,
    pub name: String,
    pub inward: String,
    pub outward: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLinkTypes {
    #[serde(default)]
    pub issue_link_types: Vec<IssueLinkType>,
}

/// Um campo da tela de criação.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMeta {
    #[serde(default)]
    pub field_id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// Um campo da tela de criação, já normalizado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateField {
    pub id: String,
    pub name: String,
    pub required: bool,
}

/// Resposta de `GET /issue/createmeta/{project}/issuetypes/{id}`.
///
/// Versões diferentes do Jira devolvem uma lista `values` ou um mapa
/// `fields`; as duas formas são aceitas.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMeta {
    #[serde(default)]
    pub values: Vec<FieldMeta>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMeta>,
}

impl CreateMeta {
    pub fn into_fields(self) -> Vec<CreateField> {
        let listed = self.values.into_iter().map(|meta| {
            let id = meta
                .field_id
                .clone()
                .or_else(|| meta.key.clone())
                .unwrap_or_else(|| "unknown".to_string());
            (id, meta)
        });
        listed
            .chain(self.fields)
            .map(|(id, meta)| CreateField {
                name: meta.name.unwrap_or_else(|| "unknown".to_string()),
                required: meta.required,
                id,
            })
            .collect()
    }
}

/// Espaço do Confluence.
#[derive(Debug, Clone, Deserialize)]
pub struct Space {
    pub id: u64,
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub space_type: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Página de resultados de `GET /wiki/rest/api/space`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpacePage {
    #[serde(default)]
    pub results: Vec<Space>,
}
