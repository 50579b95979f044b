use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{BatchConfig, JiraConfig};
use crate::jira::issues::{create_issue, delete_issue};
use crate::jira::{JiraError, NewIssue, Transport};
use crate::report::{BatchResult, ReportAggregator, Stage};
use crate::workflow::{TransitionExecutor, WorkflowError};

/// Where a batch item comes from.
#[derive(Debug, Clone)]
pub enum ItemSource {
    /// An issue still to be created.
    New(NewIssue),
    /// An issue that already exists, by key.
    Existing(String),
}

/// One unit of work in a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub source: ItemSource,
    /// Overrides the batch-wide transition target for this item.
    pub target: Option<String>,
}

impl BatchItem {
    pub fn new(issue: NewIssue) -> Self {
        Self {
            source: ItemSource::New(issue),
            target: None,
        }
    }

    pub fn existing(key: impl Into<String>) -> Self {
        Self {
            source: ItemSource::Existing(key.into()),
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Key for existing items, summary for new ones.
    pub fn label(&self) -> &str {
        match &self.source {
            ItemSource::New(issue) => &issue.summary,
            ItemSource::Existing(key) => key,
        }
    }
}

/// Stages every item of a batch goes through, in order.
#[derive(Debug, Clone, Default)]
pub struct StageSequence {
    pub create: bool,
    pub transition_to: Option<String>,
    /// Comment added once the earlier stages succeeded.
    pub annotate: Option<String>,
}

impl StageSequence {
    pub fn create() -> Self {
        Self {
            create: true,
            ..Default::default()
        }
    }

    pub fn transition(target: impl Into<String>) -> Self {
        Self {
            transition_to: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn then_transition(mut self, target: impl Into<String>) -> Self {
        self.transition_to = Some(target.into());
        self
    }

    pub fn then_annotate(mut self, text: impl Into<String>) -> Self {
        self.annotate = Some(text.into());
        self
    }
}

/// Shared flag polled between items; set from the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Record an interrupt. Returns `true` if one was already recorded.
    pub fn interrupt(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress hooks called by the orchestrator. Every method defaults to a no-op.
pub trait BatchObserver {
    fn group_started(&self, _group: usize) {}
    fn item_finished(&self, _index: usize, _label: &str, _ok: bool) {}
    fn pausing(&self, _delay: Duration) {}
}

/// Observer that ignores every event.
pub struct Silent;

impl BatchObserver for Silent {}

/// A fatal failure stopped the batch. `partial` holds what ran before it.
#[derive(Debug, Error)]
#[error("batch aborted: {source}")]
pub struct BatchAborted {
    pub source: WorkflowError,
    pub partial: Box<BatchResult>,
}

fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

/// Transport that spends a budget of `batch_size` mutating calls per group.
///
/// Once the budget is spent the next mutating call waits `batch_delay` and
/// opens a new group. Reads are not counted.
pub struct PacedTransport<'a, T> {
    inner: &'a T,
    pacing: &'a BatchConfig,
    observer: &'a dyn BatchObserver,
    sent: Cell<usize>,
    group: Cell<Option<usize>>,
}

impl<'a, T: Transport> PacedTransport<'a, T> {
    pub fn new(inner: &'a T, pacing: &'a BatchConfig, observer: &'a dyn BatchObserver) -> Self {
        Self {
            inner,
            pacing,
            observer,
            sent: Cell::new(0),
            group: Cell::new(None),
        }
    }

    async fn reserve(&self) {
        let budget = self.pacing.batch_size.max(1);
        match self.group.get() {
            None => self.open_group(0),
            Some(group) if self.sent.get() >= budget => {
                let delay = self.pacing.batch_delay();
                debug!(delay_ms = self.pacing.batch_delay_ms, "group budget spent, pausing");
                self.observer.pausing(delay);
                sleep(delay).await;
                self.open_group(group + 1);
            }
            Some(_) => {}
        }
        self.sent.set(self.sent.get() + 1);
    }

    fn open_group(&self, group: usize) {
        debug!(group = group + 1, "starting group");
        self.group.set(Some(group));
        self.sent.set(0);
        self.observer.group_started(group);
    }
}

impl<T: Transport> Transport for PacedTransport<'_, T> {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, JiraError> {
        if is_mutating(&method) {
            self.reserve().await;
        }
        self.inner.request(method, path, body).await
    }
}

/// Drives items through create, transition and annotate, one at a time.
///
/// Every request of a run goes through a [`PacedTransport`], so no more than
/// `batch_size` mutating calls are sent between two `batch_delay` pauses,
/// whatever the stages. Items are separated by `item_delay`. A failed item
/// never blocks the next one. Only an authentication failure aborts.
pub struct BatchOrchestrator<'a, T> {
    transport: &'a T,
    default_resolution: Option<String>,
    project_key: String,
    pacing: BatchConfig,
    cancel: CancelFlag,
}

impl<'a, T: Transport> BatchOrchestrator<'a, T> {
    pub fn new(transport: &'a T, config: &JiraConfig) -> Self {
        Self {
            transport,
            default_resolution: config.workflow.default_resolution.clone(),
            project_key: config.project_key.clone(),
            pacing: config.batch.clone(),
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `items` through `stages` and report every outcome.
    pub async fn run_batch(
        &self,
        items: &[BatchItem],
        stages: &StageSequence,
        observer: &dyn BatchObserver,
    ) -> Result<BatchResult, BatchAborted> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("batch", run_id = %run_id, items = items.len());
        async {
            let paced = PacedTransport::new(self.transport, &self.pacing, observer);
            let executor = TransitionExecutor::new(&paced, self.default_resolution.clone());
            let mut report = ReportAggregator::new(run_id);
            for (index, item) in items.iter().enumerate() {
                if self.stop_before(index, items.len(), &mut report).await {
                    break;
                }
                match self
                    .process_item(&paced, &executor, index, item, stages, &mut report)
                    .await
                {
                    Ok(ok) => observer.item_finished(index, item.label(), ok),
                    Err(source) => return Err(abort(source, report)),
                }
            }
            let result = report.finish();
            info!(
                created = result.created.len(),
                transitioned = result.transitioned.len(),
                failed = result.failure_count(),
                "batch finished"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Delete `keys` in the given order, attempting every one.
    pub async fn run_deletions(
        &self,
        keys: &[String],
        observer: &dyn BatchObserver,
    ) -> Result<BatchResult, BatchAborted> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("deletions", run_id = %run_id, items = keys.len());
        async {
            let paced = PacedTransport::new(self.transport, &self.pacing, observer);
            let mut report = ReportAggregator::new(run_id);
            for (index, key) in keys.iter().enumerate() {
                if self.stop_before(index, keys.len(), &mut report).await {
                    break;
                }
                let ok = match delete_issue(&paced, key).await {
                    Ok(()) => {
                        info!(key = %key, "deleted");
                        report.deleted(key);
                        true
                    }
                    Err(e) if e.is_fatal() => return Err(abort(e.into(), report)),
                    Err(e) => {
                        warn!(key = %key, status = ?e.status(), error = %e, "delete failed");
                        report.failed(index, key, Stage::Delete, &e);
                        false
                    }
                };
                observer.item_finished(index, key, ok);
            }
            let result = report.finish();
            info!(
                deleted = result.deleted.len(),
                failed = result.failure_count(),
                "deletions finished"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Wait `item_delay` before item `index` and check for cancellation on
    /// both sides of the wait. Returns `true` when the run must stop.
    async fn stop_before(&self, index: usize, total: usize, report: &mut ReportAggregator) -> bool {
        if index > 0 && self.pacing.item_delay_ms > 0 && !self.cancel.is_cancelled() {
            sleep(self.pacing.item_delay()).await;
        }
        if self.cancel.is_cancelled() {
            let remaining = total - index;
            warn!(remaining, "cancelled, remaining items not attempted");
            report.cancel(remaining);
            return true;
        }
        false
    }

    /// Returns `Ok(false)` for an isolated item failure and `Err` only for a
    /// failure that must abort the whole run.
    async fn process_item<P: Transport>(
        &self,
        transport: &P,
        executor: &TransitionExecutor<'_, P>,
        index: usize,
        item: &BatchItem,
        stages: &StageSequence,
        report: &mut ReportAggregator,
    ) -> Result<bool, WorkflowError> {
        let key = match &item.source {
            ItemSource::Existing(key) => key.clone(),
            ItemSource::New(issue) if stages.create => {
                match create_issue(transport, &self.project_key, issue).await {
                    Ok(created) => {
                        info!(key = %created.key, "created");
                        report.created(&created.key);
                        created.key
                    }
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        warn!(index, summary = %issue.summary, status = ?e.status(), error = %e, "create failed");
                        report.failed(index, &issue.summary, Stage::Create, &e);
                        return Ok(false);
                    }
                }
            }
            ItemSource::New(issue) => {
                report.failed(
                    index,
                    &issue.summary,
                    Stage::Create,
                    "item has no key and the create stage is disabled",
                );
                return Ok(false);
            }
        };

        if let Some(target) = item.target.as_deref().or(stages.transition_to.as_deref()) {
            match executor.ensure_state(&key, target).await {
                Ok(outcome) => {
                    report.transitioned(&key, outcome.new_status, outcome.already_in_state);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(key = %key, to = target, error = %e, "transition failed");
                    report.failed(index, &key, Stage::Transition, &e);
                    return Ok(false);
                }
            }
        }

        if let Some(text) = &stages.annotate {
            executor.annotate(&key, text).await;
        }
        Ok(true)
    }
}

fn abort(source: WorkflowError, report: ReportAggregator) -> BatchAborted {
    error!(error = %source, "aborting batch");
    BatchAborted {
        source,
        partial: Box::new(report.finish()),
    }
}
