use std::path::Path;

use anyhow::{Context, Result, bail};
use console::Style;
use tracing::warn;

use crate::cli::{IssueFilter, SpaceAction, SpaceKind, WorkflowAction};
use crate::config::JiraConfig;
use crate::git::{CommitInfo, GitManager};
use crate::jira::issues::{
    create_issue, listing_jql, myself, project_jql, search_issues, search_keys, sort_for_deletion,
};
use crate::jira::projects;
use crate::jira::spaces::{create_space, delete_space, get_space, list_spaces};
use crate::jira::types::{CreateField, IssueLinkType, IssueType, Project, SearchResponse};
use crate::jira::{AdfDocument, AdfNode, CreatedIssue, JiraError, NewIssue, Transport};
use crate::orchestrator::{
    BatchAborted, BatchItem, BatchObserver, BatchOrchestrator, CancelFlag, PacedTransport, Silent,
    StageSequence,
};
use crate::report::BatchResult;
use crate::ui::{self, BatchProgress};
use crate::workflow::TransitionExecutor;

/// Label put on every issue created by `bulk-create`.
const GIT_IMPORT_LABEL: &str = "git-import";

/// What `fields` found out about the configured project.
#[derive(Debug)]
pub struct ProjectLayout {
    pub project: Project,
    pub issue_types: Vec<IssueType>,
    pub link_types: Vec<IssueLinkType>,
    /// `None` when the issue type is unknown or its create screen is unreadable.
    pub create_fields: Option<Vec<CreateField>>,
}

/// Everything a subcommand needs: a transport, the loaded config and the
/// cancellation flag shared with the Ctrl-C handler.
pub struct Session<'a, T> {
    transport: &'a T,
    config: &'a JiraConfig,
    cancel: CancelFlag,
    json: bool,
    progress: bool,
}

impl<'a, T: Transport> Session<'a, T> {
    pub fn new(transport: &'a T, config: &'a JiraConfig, cancel: CancelFlag) -> Self {
        Self {
            transport,
            config,
            cancel,
            json: false,
            progress: false,
        }
    }

    /// JSON output disables the spinner so stdout stays parseable.
    pub fn with_output(mut self, json: bool, progress: bool) -> Self {
        self.json = json;
        self.progress = progress && !json;
        self
    }

    fn orchestrator(&self) -> BatchOrchestrator<'a, T> {
        BatchOrchestrator::new(self.transport, self.config).with_cancel(self.cancel.clone())
    }

    fn executor(&self) -> TransitionExecutor<'a, T> {
        TransitionExecutor::new(
            self.transport,
            self.config.workflow.default_resolution.clone(),
        )
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.config.base_url.trim_end_matches('/'))
    }

    fn report(&self, result: &BatchResult) {
        let summary = result.summarize();
        if self.json {
            ui::print_summary_json(&summary);
        } else {
            ui::print_summary(&summary);
        }
    }

    async fn run_items(
        &self,
        label: &str,
        items: &[BatchItem],
        stages: &StageSequence,
    ) -> Result<BatchResult> {
        let spinner = self.progress.then(|| BatchProgress::start(label, items.len()));
        let observer: &dyn BatchObserver = match &spinner {
            Some(p) => p,
            None => &Silent,
        };
        let outcome = self.orchestrator().run_batch(items, stages, observer).await;
        if let Some(p) = &spinner {
            p.finish();
        }
        self.settle(outcome)
    }

    async fn run_deletions(&self, keys: &[String]) -> Result<BatchResult> {
        let spinner = self.progress.then(|| BatchProgress::start("deleting", keys.len()));
        let observer: &dyn BatchObserver = match &spinner {
            Some(p) => p,
            None => &Silent,
        };
        let outcome = self.orchestrator().run_deletions(keys, observer).await;
        if let Some(p) = &spinner {
            p.finish();
        }
        self.settle(outcome)
    }

    /// Report what ran, then surface an abort as a top-level failure.
    fn settle(
        &self,
        outcome: Result<BatchResult, BatchAborted>,
    ) -> Result<BatchResult> {
        match outcome {
            Ok(result) => {
                self.report(&result);
                Ok(result)
            }
            Err(aborted) => {
                self.report(&aborted.partial);
                Err(aborted.into())
            }
        }
    }

    pub async fn create_one(&self, issue: NewIssue) -> Result<CreatedIssue> {
        let created = create_issue(self.transport, &self.config.project_key, &issue)
            .await
            .context("failed to create issue")?;
        println!("Created {} ({})", created.key, self.browse_url(&created.key));
        Ok(created)
    }

    /// List the project's issues and, with `confirm`, delete them highest key
    /// first. Returns `None` for a dry run or an empty project.
    pub async fn delete_all(&self, confirm: bool, max: u32) -> Result<Option<BatchResult>> {
        let project_key = &self.config.project_key;
        let found = search_keys(self.transport, &project_jql(project_key), max)
            .await
            .with_context(|| format!("failed to search issues of {project_key}"))?;
        let has_more = found.has_more();
        let mut keys: Vec<String> = found.issues.into_iter().map(|i| i.key).collect();
        if keys.is_empty() {
            println!("No issues found in {project_key}");
            return Ok(None);
        }
        if has_more {
            println!(
                "More issues match; only the first {} are handled this run",
                keys.len()
            );
        }
        sort_for_deletion(&mut keys);

        if !confirm {
            println!("Dry run: {} issue(s) in {project_key} would be deleted:", keys.len());
            for key in &keys {
                println!("  {key}");
            }
            println!("Re-run with --confirm to delete them.");
            return Ok(None);
        }
        self.run_deletions(&keys).await.map(Some)
    }

    pub async fn workflow(&self, action: WorkflowAction, keys: &[String]) -> Result<Option<BatchResult>> {
        let statuses = &self.config.workflow;
        match action {
            WorkflowAction::Status => {
                for key in keys {
                    self.show_status(key).await?;
                }
                Ok(None)
            }
            WorkflowAction::Start => {
                self.move_each(keys, &statuses.start_status, "Work started").await?;
                Ok(None)
            }
            WorkflowAction::Complete => {
                self.move_each(keys, &statuses.done_status, "Work completed").await?;
                Ok(None)
            }
            WorkflowAction::Reopen => {
                self.move_each(keys, &statuses.reopen_status, "Issue reopened").await?;
                Ok(None)
            }
            WorkflowAction::Demo => {
                for key in keys {
                    self.demo(key).await?;
                }
                Ok(None)
            }
            WorkflowAction::BatchStart => self
                .batch_move(keys, &statuses.start_status, "Work started")
                .await
                .map(Some),
            WorkflowAction::BatchComplete => self
                .batch_move(keys, &statuses.done_status, "Work completed")
                .await
                .map(Some),
        }
    }

    async fn show_status(&self, key: &str) -> Result<()> {
        let executor = self.executor();
        let resolver = executor.resolver();
        let issue = resolver.get_issue(key).await?;
        let transitions = resolver.get_transitions(key).await?;
        ui::print_transitions(
            &issue.key,
            issue.fields.summary.as_deref(),
            &issue.fields.status.name,
            &transitions,
        );
        Ok(())
    }

    /// Move each key in turn; the first failure or an interrupt stops the
    /// command. Writes are paced like a batch.
    async fn move_each(&self, keys: &[String], target: &str, note: &str) -> Result<()> {
        let paced = PacedTransport::new(self.transport, &self.config.batch, &Silent);
        let executor =
            TransitionExecutor::new(&paced, self.config.workflow.default_resolution.clone());
        for key in keys {
            if self.cancel.is_cancelled() {
                bail!("interrupted before {key}");
            }
            let outcome = executor
                .ensure_state(key, target)
                .await
                .with_context(|| format!("failed to move {key} to {target}"))?;
            if !outcome.already_in_state {
                executor.annotate(key, note).await;
            }
            ui::print_outcome(key, &outcome);
        }
        Ok(())
    }

    async fn batch_move(&self, keys: &[String], target: &str, note: &str) -> Result<BatchResult> {
        let items: Vec<BatchItem> = keys.iter().map(|k| batch_item(k)).collect();
        let stages = StageSequence::transition(target).then_annotate(note);
        self.run_items(&format!("moving to {target}"), &items, &stages).await
    }

    /// Walk one issue through start and completion, printing each step.
    async fn demo(&self, key: &str) -> Result<()> {
        let bold = Style::new().bold();
        let statuses = &self.config.workflow;

        println!("{}", bold.apply_to(format!("Workflow demo for {key}")));
        println!("{}", self.browse_url(key));

        println!("\n{}", bold.apply_to("1. Current status"));
        self.show_status(key).await?;

        println!("\n{}", bold.apply_to("2. Start work"));
        self.move_each(&[key.to_string()], &statuses.start_status, "[Demo] Work started")
            .await?;

        println!("\n{}", bold.apply_to("3. Complete work"));
        self.move_each(&[key.to_string()], &statuses.done_status, "[Demo] Work completed")
            .await?;

        println!("\n{}", bold.apply_to("4. Final status"));
        self.show_status(key).await
    }

    /// One issue per recent commit, each moved to `target`.
    pub async fn bulk_create(
        &self,
        count: usize,
        repo: &Path,
        target: Option<&str>,
    ) -> Result<Option<BatchResult>> {
        let git = GitManager::open(repo)
            .with_context(|| format!("failed to open git repository at {}", repo.display()))?;
        let commits = git.recent_commits(count)?;
        if commits.is_empty() {
            println!("No commits found.");
            return Ok(None);
        }
        let branch = git.current_branch().unwrap_or_else(|_| "HEAD".to_string());
        println!(
            "Creating {} issue(s) in {} from {branch}",
            commits.len(),
            self.config.project_key
        );

        let target = target.unwrap_or(&self.config.workflow.done_status);
        let items: Vec<BatchItem> = commits
            .iter()
            .map(|commit| BatchItem::new(issue_from_commit(commit, &branch)))
            .collect();
        let stages = StageSequence::create().then_transition(target);
        let result = self.run_items("creating issues", &items, &stages).await?;
        println!(
            "Backlog: {}/jira/software/projects/{}/boards/1/backlog",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_key
        );
        Ok(Some(result))
    }

    pub async fn check_auth(&self) -> Result<()> {
        let green = Style::new().green().bold();
        let me = myself(self.transport)
            .await
            .context("credentials were rejected")?;
        println!(
            "{} Authenticated as {} ({})",
            green.apply_to("✓"),
            me.display_name,
            me.email_address.as_deref().unwrap_or(&me.account_id)
        );
        let project = projects::project(self.transport, &self.config.project_key)
            .await
            .with_context(|| format!("cannot access project {}", self.config.project_key))?;
        println!(
            "{} Project {} ({}, id {}, {})",
            green.apply_to("✓"),
            project.key,
            project.name,
            project.id,
            project.project_type_key.as_deref().unwrap_or("unknown type")
        );
        let types = projects::issue_types(self.transport, &project.id)
            .await
            .context("failed to list issue types")?;
        let names: Vec<&str> = types.iter().take(5).map(|t| t.name.as_str()).collect();
        println!(
            "{} {} issue type(s): {}",
            green.apply_to("✓"),
            types.len(),
            names.join(", ")
        );
        Ok(())
    }

    /// List the project's issues, newest first.
    pub async fn issues(&self, filter: IssueFilter, limit: u32) -> Result<SearchResponse> {
        let statuses = &self.config.workflow;
        let status = match filter {
            IssueFilter::Todo => Some(statuses.reopen_status.as_str()),
            IssueFilter::Progressing => Some(statuses.start_status.as_str()),
            IssueFilter::Done => Some(statuses.done_status.as_str()),
            IssueFilter::All => None,
        };
        let project_key = &self.config.project_key;
        let page = search_issues(self.transport, &listing_jql(project_key, status), limit)
            .await
            .with_context(|| format!("failed to search issues of {project_key}"))?;
        if page.issues.is_empty() {
            println!("No issues found in {project_key}");
            return Ok(page);
        }
        ui::print_issues(&page.issues, |key| self.browse_url(key));
        println!("\nShowing {} issue(s)", page.issues.len());
        if page.has_more() {
            println!("More issues match; raise --limit to see them.");
        }
        Ok(page)
    }

    /// Inspect the project: style, issue types, link types and the create
    /// screen of `issue_type`.
    pub async fn fields(&self, issue_type: &str) -> Result<ProjectLayout> {
        let key = &self.config.project_key;
        let project = projects::project(self.transport, key)
            .await
            .with_context(|| format!("cannot access project {key}"))?;
        let issue_types = projects::issue_types(self.transport, &project.id)
            .await
            .context("failed to list issue types")?;
        let link_types = projects::link_types(self.transport)
            .await
            .context("failed to list link types")?;

        let create_fields = match issue_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(issue_type))
        {
            Some(t) => match projects::create_fields(self.transport, key, &t.id).await {
                Ok(fields) => Some(fields),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(issue_type, error = %e, "create screen unavailable");
                    None
                }
            },
            None => {
                warn!(issue_type, project = %key, "issue type not available in project");
                None
            }
        };

        let layout = ProjectLayout {
            project,
            issue_types,
            link_types,
            create_fields,
        };
        ui::print_discovery(
            &layout.project,
            &layout.issue_types,
            &layout.link_types,
            layout.create_fields.as_deref().map(|f| (issue_type, f)),
        );
        Ok(layout)
    }

    pub async fn spaces(&self, action: &SpaceAction) -> Result<()> {
        match action {
            SpaceAction::List { limit, space_type } => {
                let spaces =
                    list_spaces(self.transport, *limit, space_type.map(SpaceKind::as_str)).await?;
                if spaces.is_empty() {
                    println!("No spaces found");
                }
                if spaces.len() >= *limit as usize {
                    println!("(showing the first {limit}; raise --limit to see more)");
                }
                for space in spaces {
                    println!(
                        "{:<12} {:<10} {:<10} {}",
                        space.key,
                        space.space_type,
                        space.status.as_deref().unwrap_or("-"),
                        space.name
                    );
                }
            }
            SpaceAction::Create {
                key,
                name,
                description,
            } => {
                let space = create_space(self.transport, key, name, description.as_deref())
                    .await
                    .with_context(|| format!("failed to create space {key}"))?;
                println!("Created space {} ({}, id {})", space.key, space.name, space.id);
            }
            SpaceAction::Delete { key, confirm } => {
                let key = key.to_uppercase();
                let space = match get_space(self.transport, &key).await {
                    Ok(space) => space,
                    Err(JiraError::NotFound { .. }) => bail!("space {key} not found"),
                    Err(e) => {
                        return Err(e).with_context(|| format!("failed to look up space {key}"));
                    }
                };
                println!(
                    "Space {} ({}, {}, {})",
                    space.key,
                    space.name,
                    space.space_type,
                    space.status.as_deref().unwrap_or("current")
                );
                if !*confirm {
                    println!("Dry run: re-run with --confirm to delete {key} and all of its content.");
                    return Ok(());
                }
                delete_space(self.transport, &key)
                    .await
                    .with_context(|| format!("failed to delete space {key}"))?;
                println!("Deletion of space {key} requested; it may take a moment to propagate");
            }
        }
        Ok(())
    }
}

/// `KEY` or `KEY=Status`; the second form overrides the batch target.
fn batch_item(arg: &str) -> BatchItem {
    match arg.split_once('=') {
        Some((key, target)) if !target.trim().is_empty() => {
            BatchItem::existing(key.trim()).with_target(target.trim())
        }
        Some((key, _)) => BatchItem::existing(key.trim()),
        None => BatchItem::existing(arg.trim()),
    }
}

/// Story titled by the commit summary; the description records where it came from.
fn issue_from_commit(commit: &CommitInfo, branch: &str) -> NewIssue {
    let mut facts = vec![
        format!("commit {}", commit.short_id),
        format!("branch {branch}"),
    ];
    if let Some(author) = &commit.author {
        facts.push(format!("author {author}"));
    }
    let document = AdfDocument::new(vec![
        AdfNode::heading("Imported from git history", 3),
        AdfNode::bullets(&facts),
        AdfNode::code(&commit.message, "text"),
    ]);
    NewIssue::story(commit.summary.as_str())
        .with_document(document)
        .with_label(GIT_IMPORT_LABEL)
}
