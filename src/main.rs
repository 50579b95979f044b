mod cli;
mod commands;
mod config;
mod error;
mod git;
mod jira;
mod orchestrator;
mod report;
#[cfg(test)]
mod testing;
mod ui;
mod workflow;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use commands::Session;
use config::JiraConfig;
use jira::{JiraClient, NewIssue};
use orchestrator::CancelFlag;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", Style::new().red().bold().apply_to("error:"));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so they never mix with the report on stdout.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<JiraConfig> {
    let mut config = JiraConfig::load().context("failed to load configuration")?;
    if let Some(max_retries) = cli.max_retries {
        config.retry.max_retries = max_retries;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch.batch_size = batch_size;
    }
    config.validate()?;
    Ok(config)
}

/// The first Ctrl-C stops the command after the current item; the second
/// exits at once.
fn spawn_cancel_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if cancel.interrupt() {
                eprintln!("interrupted again, exiting");
                std::process::exit(130);
            }
            tracing::warn!("interrupt received, stopping after the current item (Ctrl-C again to exit)");
        }
    });
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let client = JiraClient::new(&config).context("failed to build HTTP client")?;
    tracing::debug!(base_url = client.base_url(), project = %config.project_key, "configured");

    let cancel = CancelFlag::default();
    spawn_cancel_handler(cancel.clone());
    let session = Session::new(&client, &config, cancel)
        .with_output(cli.json, console::Term::stderr().is_term());

    match cli.command {
        Command::CreateOne {
            summary,
            description,
            issue_type,
            parent,
        } => {
            let mut issue = NewIssue::story(summary);
            issue.issue_type = issue_type;
            issue.parent = parent;
            if let Some(description) = description {
                issue = issue.with_description(&description);
            }
            session.create_one(issue).await?;
        }
        Command::DeleteAll { confirm, max } => {
            session.delete_all(confirm, max).await?;
        }
        Command::Workflow { action, keys } => {
            session.workflow(action, &keys).await?;
        }
        Command::BulkCreate {
            count,
            repo,
            target,
        } => {
            session.bulk_create(count, &repo, target.as_deref()).await?;
        }
        Command::Issues { status, limit } => {
            session.issues(status, limit).await?;
        }
        Command::Fields { issue_type } => {
            session.fields(&issue_type).await?;
        }
        Command::CheckAuth => session.check_auth().await?,
        Command::Spaces { action } => session.spaces(&action).await?,
    }
    Ok(())
}
