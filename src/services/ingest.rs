use crate::core::duplicate::canonicalize;
use crate::core::ledger::{DirectoryLedger, LedgerError};
use crate::database::{Database, DatabaseError, InsertOutcome};
use crate::services::cull::{CullError, Culler};
use crate::services::report::ReportWriter;
use crate::services::similarity::{OracleError, SimilarityOracle};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Longest single sleep while idle, so cancellation is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Similarity detection failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Persistence failure: {0}")]
    Database(#[from] DatabaseError),

    #[error("Deletion failed: {0}")]
    Cull(#[from] CullError),

    #[error("Processing cancelled")]
    Cancelled,
}

impl IngestError {
    fn is_cancellation(&self) -> bool {
        matches!(
            self,
            IngestError::Cancelled | IngestError::Oracle(OracleError::Cancelled)
        )
    }
}

/// Counters for one completed directory pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub directory: String,
    pub observations: usize,
    pub records: usize,
    pub inserted: usize,
    pub already_stored: usize,
    pub redundant: usize,
    pub deleted: usize,
}

/// What one iteration of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do; the caller should wait a poll interval.
    Idle,
    Processed(PassSummary),
    /// The pass failed and the directory stays pending.
    Retry { directory: String, reason: String },
    Cancelled,
}

/// Polls the ledger and runs each directory through
/// oracle -> canonicalizer -> store, one directory at a time.
pub struct IngestionLoop<'db, O: SimilarityOracle> {
    ledger: DirectoryLedger,
    db: &'db Database,
    oracle: O,
    culler: Option<Culler>,
    reporter: Option<ReportWriter>,
    cancel: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl<'db, O: SimilarityOracle> IngestionLoop<'db, O> {
    pub fn new(ledger: DirectoryLedger, db: &'db Database, oracle: O, cancel: Arc<AtomicBool>) -> Self {
        Self {
            ledger,
            db,
            oracle,
            culler: None,
            reporter: None,
            cancel,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_culler(mut self, culler: Culler) -> Self {
        self.culler = Some(culler);
        self
    }

    pub fn with_reporter(mut self, reporter: ReportWriter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn ledger(&self) -> &DirectoryLedger {
        &self.ledger
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Runs until the cancellation token is set.
    pub fn run(&mut self) {
        log::info!("Watching {}", self.ledger.root().display());
        loop {
            match self.tick() {
                Ok(TickOutcome::Processed(_)) | Ok(TickOutcome::Retry { .. }) => {}
                Ok(TickOutcome::Idle) => self.wait(),
                Ok(TickOutcome::Cancelled) => break,
                Err(e) => {
                    log::error!("Polling {} failed: {}", self.ledger.root().display(), e);
                    self.wait();
                }
            }
        }
        log::info!(
            "Stopped after processing {} directories",
            self.ledger.processed_count()
        );
    }

    /// One iteration: claim at most one directory and process it.
    ///
    /// Only ledger failures (the watch root itself became unreadable) are
    /// returned as errors. Every per-directory failure releases the claim.
    pub fn tick(&mut self) -> Result<TickOutcome, IngestError> {
        if self.cancelled() {
            return Ok(TickOutcome::Cancelled);
        }

        let Some(name) = self.ledger.next_directory()? else {
            log::debug!("No pending directories. Waiting for new submissions.");
            return Ok(TickOutcome::Idle);
        };

        match self.process_directory(&name) {
            Ok(summary) => {
                self.ledger.mark_processed(&name)?;
                Ok(TickOutcome::Processed(summary))
            }
            Err(e) => {
                self.ledger.release(&name)?;
                if e.is_cancellation() {
                    log::info!("Processing of {} interrupted; it stays pending.", name);
                    return Ok(TickOutcome::Cancelled);
                }
                match &e {
                    IngestError::Oracle(OracleError::DirectoryUnreadable(_)) => {
                        log::warn!("Skipping {} for now: {}", name, e)
                    }
                    _ => log::error!("Processing of {} failed, will retry: {}", name, e),
                }
                Ok(TickOutcome::Retry {
                    directory: name,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Full pass over one directory, audited in `scan_sessions`.
    pub fn process_directory(&self, name: &str) -> Result<PassSummary, IngestError> {
        let path = self.ledger.path_of(name);
        let sessions = self.db.sessions();
        let session_id = sessions.start(name)?;

        let result = self.run_pass(name, &path);

        let recorded = match &result {
            Ok(summary) => sessions.complete(&session_id, summary.inserted, summary.redundant),
            Err(IngestError::Oracle(OracleError::DirectoryUnreadable(e))) => {
                sessions.skip(&session_id, &e.to_string())
            }
            Err(e) => sessions.fail(&session_id, &e.to_string()),
        };
        if let Err(e) = recorded {
            log::warn!("Could not record session {} for {}: {}", session_id, name, e);
        }

        result
    }

    fn run_pass(&self, name: &str, path: &Path) -> Result<PassSummary, IngestError> {
        let started = Instant::now();
        let observations = self.oracle.detect(path, &self.cancel)?;
        let observed = observations.len();
        let canonical = canonicalize(name, observations);

        let duplicates = self.db.duplicates();
        let mut inserted = 0;
        let mut already_stored = 0;
        for record in &canonical.records {
            if self.cancelled() {
                return Err(IngestError::Cancelled);
            }
            match duplicates.insert_duplicate(record)? {
                InsertOutcome::Inserted(_) => inserted += 1,
                InsertOutcome::AlreadyExists => already_stored += 1,
            }
        }

        let deleted = match &self.culler {
            Some(culler) => culler.cull(path, &canonical.records)?,
            None => Vec::new(),
        };

        if let Some(reporter) = &self.reporter {
            if let Err(e) = reporter.write(name, path, &canonical.records, &deleted) {
                log::error!("Report for {} failed: {}", name, e);
            }
        }

        log::info!(
            "{}: {} records ({} new, {} already stored), {} redundant observations, {} deleted in {:.2?}",
            name,
            canonical.records.len(),
            inserted,
            already_stored,
            canonical.redundant,
            deleted.len(),
            started.elapsed()
        );

        Ok(PassSummary {
            directory: name.to_string(),
            observations: observed,
            records: canonical.records.len(),
            inserted,
            already_stored,
            redundant: canonical.redundant,
            deleted: deleted.len(),
        })
    }

    fn wait(&self) {
        let deadline = Instant::now() + self.poll_interval;
        while !self.cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
