//! Interface de terminal do jira-flow: spinner de lote e relatório colorido.
//!
//! Usa `indicatif` para o spinner de progresso e `console` para estilização
//! com cores. O [`BatchProgress`] acompanha visualmente um lote como
//! [`BatchObserver`]; [`print_summary`] imprime o relatório final uma vez.

use std::cell::Cell;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::jira::Transition;
use crate::jira::types::{CreateField, IssueLinkType, IssueType, Project, SearchIssue};
use crate::orchestrator::BatchObserver;
use crate::report::Summary;
use crate::workflow::EnsureOutcome;

/// Indicador visual de progresso para a execução de um lote no terminal.
///
/// Exibe um spinner animado durante o processamento e uma linha por item:
/// verde para sucesso, vermelho para falha.
pub struct BatchProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    total: usize,
    done: Cell<usize>,
    green: Style,
    red: Style,
    dim: Style,
}

impl BatchProgress {
    /// Inicia o spinner com a descrição do lote.
    pub fn start(description: &str, total: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{description} (0/{total})"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            total,
            done: Cell::new(0),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Finaliza o spinner, deixando o terminal limpo para o relatório.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl BatchObserver for BatchProgress {
    fn group_started(&self, group: usize) {
        self.pb.set_message(format!(
            "group {} ({}/{})",
            group + 1,
            self.done.get(),
            self.total
        ));
    }

    fn item_finished(&self, _index: usize, label: &str, ok: bool) {
        self.done.set(self.done.get() + 1);
        let mark = if ok {
            self.green.apply_to("✓")
        } else {
            self.red.apply_to("✗")
        };
        self.pb.println(format!("  {mark} {label}"));
        self.pb
            .set_message(format!("processed {}/{}", self.done.get(), self.total));
    }

    fn pausing(&self, delay: Duration) {
        self.pb.set_message(format!(
            "{} ({}/{})",
            self.dim.apply_to(format!("pausing {}ms", delay.as_millis())),
            self.done.get(),
            self.total
        ));
    }
}

/// Imprime o relatório final do lote com contagens e falhas.
pub fn print_summary(summary: &Summary) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();

    println!();
    let header = if summary.failures.is_empty() { &green } else { &red };
    println!("{}", header.apply_to("─── Batch Report ───"));
    println!("  created:      {}", summary.created_count);
    println!("  transitioned: {}", summary.transitioned_count);
    println!("  deleted:      {}", summary.deleted_count);
    println!("  failed:       {}", summary.failures.len());
    for failure in &summary.failures {
        println!(
            "    {} [{}] {}: {}",
            red.apply_to("✗"),
            failure.stage,
            failure.subject,
            failure.cause
        );
    }
    if summary.cancelled {
        println!(
            "  {} cancelled, {} item(s) not attempted",
            yellow.apply_to("!"),
            summary.not_attempted
        );
    }
    println!("  took {}ms (run {})", summary.duration_ms, summary.run_id);
}

/// Imprime o relatório como JSON, para consumo por scripts.
pub fn print_summary_json(summary: &Summary) {
    println!(
        "{}",
        serde_json::to_string_pretty(summary).unwrap_or_default()
    );
}

/// Mostra o status atual, o título e as transições disponíveis.
pub fn print_transitions(item: &str, summary: Option<&str>, status: &str, transitions: &[Transition]) {
    let cyan = Style::new().cyan();
    println!("{} is {}", item, cyan.apply_to(status));
    if let Some(summary) = summary {
        println!("  summary: {summary}");
    }
    if transitions.is_empty() {
        println!("  no outgoing transitions");
    }
    for t in transitions {
        println!("  {t}");
    }
}

/// Resultado de uma transição individual.
pub fn print_outcome(item: &str, outcome: &EnsureOutcome) {
    let green = Style::new().green().bold();
    if outcome.already_in_state {
        println!("  {} {item} already in {}", green.apply_to("="), outcome.new_status);
    } else {
        println!("  {} {item} -> {}", green.apply_to("✓"), outcome.new_status);
    }
}

/// Título encurtado para caber em uma linha da listagem.
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}...")
}

/// Uma linha por issue: chave, tipo, status, título e issue pai.
pub fn print_issues(issues: &[SearchIssue], browse: impl Fn(&str) -> String) {
    let dim = Style::new().dim();
    for issue in issues {
        let fields = &issue.fields;
        let parent = fields
            .parent
            .as_ref()
            .map(|p| format!(" (parent: {})", p.key))
            .unwrap_or_default();
        println!(
            "{}: [{}] {} - {}{parent}",
            issue.key,
            fields.issuetype.as_ref().map_or("?", |t| t.name.as_str()),
            fields.status.as_ref().map_or("?", |s| s.name.as_str()),
            clip(fields.summary.as_deref().unwrap_or(""), 60),
        );
        println!("  {}", dim.apply_to(browse(&issue.key)));
    }
}

/// Configuração do projeto levantada pelo subcomando `fields`.
pub fn print_discovery(
    project: &Project,
    issue_types: &[IssueType],
    link_types: &[IssueLinkType],
    create_fields: Option<(&str, &[CreateField])>,
) {
    let bold = Style::new().bold();
    let yellow = Style::new().yellow();

    println!("{}", bold.apply_to("Project"));
    println!("  name:       {} ({})", project.name, project.key);
    println!(
        "  type:       {}",
        project.project_type_key.as_deref().unwrap_or("unknown")
    );
    println!("  style:      {}", project.style.as_deref().unwrap_or("unknown"));
    let managed = if project.is_next_gen() {
        "next-gen (team-managed)"
    } else {
        "classic (company-managed)"
    };
    println!("  managed as: {}", yellow.apply_to(managed));

    println!("\n{}", bold.apply_to("Issue types"));
    for t in issue_types {
        let kind = if t.subtask { "subtask" } else { "standard" };
        println!("  {} ({}) - {kind}", t.name, t.id);
    }

    println!("\n{}", bold.apply_to("Link types"));
    for l in link_types {
        println!("  {} ({}): inward \"{}\", outward \"{}\"", l.name, l.id, l.inward, l.outward);
    }

    if let Some((issue_type, fields)) = create_fields {
        println!("\n{}", bold.apply_to(format!("Create screen of {issue_type}")));
        for f in fields {
            let required = if f.required { " (required)" } else { "" };
            println!("  {}: {}{required}", f.id, f.name);
        }
    }

    if project.is_next_gen() {
        println!("\n{}", bold.apply_to("Next-gen notes"));
        println!("  link epics through the \"parent\" field, not customfield_10014");
        println!("  use the \"Subtask\" issue type, not \"Sub-task\"");
        println!("  the Epic Name field (customfield_10011) is not available");
    }
}
