//! One load run: fetch, walk, resolve, write, commit.
//!
//! The whole batch shares one sink transaction. Every record runs inside its own
//! savepoint so a failing record is rolled back alone and the batch carries on.
//! Only an unavailable source or sink ends the run early, and then nothing of the
//! batch is committed.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{LoadError, SinkError};
use crate::resolver::IdentityResolver;
use crate::sink::Sink;
use crate::source::{Document, DocumentFilter, DocumentKind, DocumentSource};
use crate::walker::{self, NormalizedRecord};
use crate::writer::{self, Written};

/// Failures kept in a summary; the rest are only counted.
pub const MAX_REPORTED_FAILURES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Loading,
    Processing,
    Committing,
    Done,
    Failed,
}

/// What to load: document kinds, in load order, and a filter applied to each.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub kinds: Vec<DocumentKind>,
    pub filter: DocumentFilter,
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self {
            kinds: DocumentKind::ALL.to_vec(),
            filter: DocumentFilter::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub origin: String,
    /// The normalized record, when the walker got that far.
    pub record: Option<String>,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    pub documents: usize,
    pub records_written: usize,
    /// Malformed subtrees the walker could not turn into records.
    pub records_skipped: usize,
    pub records_failed: usize,
    pub outcomes_written: usize,
    pub duplicate_outcomes: usize,
    pub entities_inserted: u64,
    pub entities_reused: u64,
    pub failures: Vec<RecordFailure>,
    pub failures_omitted: usize,
    pub error: Option<String>,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: RunState::Idle,
            documents: 0,
            records_written: 0,
            records_skipped: 0,
            records_failed: 0,
            outcomes_written: 0,
            duplicate_outcomes: 0,
            entities_inserted: 0,
            entities_reused: 0,
            failures: Vec::new(),
            failures_omitted: 0,
            error: None,
        }
    }

    fn push_failure(&mut self, origin: &str, record: Option<&NormalizedRecord>, err: &LoadError) {
        if self.failures.len() >= MAX_REPORTED_FAILURES {
            self.failures_omitted += 1;
            return;
        }
        self.failures.push(RecordFailure {
            origin: origin.to_string(),
            record: record.map(NormalizedRecord::describe),
            kind: err.label(),
            error: err.to_string(),
        });
    }

    fn absorb(&mut self, origin: &str, record: &NormalizedRecord, written: Written) {
        self.records_written += 1;
        self.outcomes_written += written.outcomes_written;
        self.duplicate_outcomes += written.duplicates.len();
        for duplicate in &written.duplicates {
            self.push_failure(origin, Some(record), duplicate);
        }
    }

    fn log(&self) {
        match serde_json::to_string(self) {
            Ok(json) => info!(summary = %json, "run summary"),
            Err(e) => warn!("Failed to serialize run summary: {}", e),
        }
    }
}

/// A run that ended early. Nothing from it was committed.
#[derive(Error, Debug)]
#[error("load run failed: {error}")]
pub struct RunFailed {
    pub error: LoadError,
    pub summary: RunSummary,
}

/// Transaction primitives failing leave the batch in an unknown state.
fn transaction_error(err: SinkError) -> LoadError {
    LoadError::SinkUnavailable(err.to_string())
}

pub struct RunCoordinator<'a, S: Sink + ?Sized> {
    sink: &'a mut S,
    state: RunState,
}

impl<'a, S: Sink + ?Sized> RunCoordinator<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, state: RunState) {
        debug!(from = ?self.state, to = ?state, "run state");
        self.state = state;
    }

    /// Fetch every planned kind from `source`, then load it as one batch.
    pub async fn run<D>(&mut self, source: &D, plan: &LoadPlan) -> Result<RunSummary, RunFailed>
    where
        D: DocumentSource + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("load_run", %run_id);
        async move {
            let mut summary = RunSummary::new(run_id);
            self.enter(RunState::Loading);

            let mut documents = Vec::new();
            for &kind in &plan.kinds {
                match source.find(kind, &plan.filter).await {
                    Ok(found) => documents.extend(found),
                    Err(e) => return Err(self.fail(summary, e.into()).await),
                }
            }
            info!(documents = documents.len(), "documents loaded");

            self.process(&mut summary, documents).await?;
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Load documents the caller already fetched.
    pub async fn load_documents(&mut self, documents: Vec<Document>) -> Result<RunSummary, RunFailed> {
        let run_id = Uuid::new_v4();
        let span = info_span!("load_run", %run_id);
        async move {
            let mut summary = RunSummary::new(run_id);
            self.enter(RunState::Loading);
            self.process(&mut summary, documents).await?;
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn process(
        &mut self,
        summary: &mut RunSummary,
        documents: Vec<Document>,
    ) -> Result<(), RunFailed> {
        self.enter(RunState::Processing);
        if let Err(e) = self.sink.begin().await {
            return Err(self.fail(take(summary), transaction_error(e)).await);
        }

        let mut resolver = match IdentityResolver::preload(&mut *self.sink).await {
            Ok(resolver) => resolver,
            Err(e) => return Err(self.fail(take(summary), transaction_error(e)).await),
        };

        for document in &documents {
            summary.documents += 1;
            debug!(origin = %document.origin, kind = %document.kind, "processing document");

            for item in walker::walk(document) {
                let record = match item {
                    Ok(record) => record,
                    Err(err) => {
                        summary.records_skipped += 1;
                        summary.push_failure(&document.origin, None, &err);
                        continue;
                    }
                };

                match self.apply(&mut resolver, &record).await {
                    Ok(written) => summary.absorb(&document.origin, &record, written),
                    Err(err) if err.is_fatal() => {
                        error!(origin = %document.origin, record = %record.describe(), error = %err, "aborting run");
                        summary.entities_inserted = resolver.stats().inserted;
                        summary.entities_reused = resolver.stats().reused;
                        return Err(self.fail(take(summary), err).await);
                    }
                    Err(err) => {
                        warn!(
                            origin = %document.origin,
                            record = %record.describe(),
                            error = %err,
                            "record failed"
                        );
                        summary.records_failed += 1;
                        summary.push_failure(&document.origin, Some(&record), &err);
                    }
                }
            }
        }

        let stats = resolver.stats();
        summary.entities_inserted = stats.inserted;
        summary.entities_reused = stats.reused;

        self.enter(RunState::Committing);
        if let Err(e) = self.sink.commit().await {
            return Err(self.fail(take(summary), transaction_error(e)).await);
        }

        self.enter(RunState::Done);
        summary.state = RunState::Done;
        info!(
            documents = summary.documents,
            written = summary.records_written,
            skipped = summary.records_skipped,
            failed = summary.records_failed,
            "run committed"
        );
        summary.log();
        Ok(())
    }

    /// Write one record inside its own savepoint.
    async fn apply(
        &mut self,
        resolver: &mut IdentityResolver,
        record: &NormalizedRecord,
    ) -> Result<Written, LoadError> {
        self.sink.savepoint().await.map_err(transaction_error)?;

        match writer::write_record(&mut *self.sink, resolver, record).await {
            Ok(written) => {
                self.sink
                    .release_savepoint()
                    .await
                    .map_err(transaction_error)?;
                resolver.settle();
                Ok(written)
            }
            Err(err) => {
                resolver.revert();
                if !err.is_fatal() {
                    self.sink
                        .rollback_to_savepoint()
                        .await
                        .map_err(transaction_error)?;
                }
                Err(err)
            }
        }
    }

    async fn fail(&mut self, mut summary: RunSummary, error: LoadError) -> RunFailed {
        self.enter(RunState::Failed);
        if let Err(e) = self.sink.rollback().await {
            warn!("Rollback after failure also failed: {}", e);
        }
        error!(error = %error, "run failed; nothing committed");
        summary.state = RunState::Failed;
        summary.error = Some(error.to_string());
        summary.log();
        RunFailed { error, summary }
    }
}

fn take(summary: &mut RunSummary) -> RunSummary {
    let run_id = summary.run_id;
    std::mem::replace(summary, RunSummary::new(run_id))
}
