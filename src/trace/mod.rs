//! Step tracing
//!
//! Every step executed produces an entry record (before the brick runs)
//! and an exit record (after). Records are keyed by `(run_id,
//! instance_id)` so a step's history lines up across runs. Recording is
//! best-effort: the executor logs a recorder failure and keeps going.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::{RunSummary, SqliteTraceStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// How a traced step ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TraceOutcome {
    Success { output: Value },
    Failure { error: String },
    Skipped,
    Cancelled,
}

/// Written when a step starts. `args` is the redacted argument snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub run_id: Uuid,
    pub instance_id: Uuid,
    pub brick_id: String,
    pub step_index: usize,
    pub started_at: DateTime<Utc>,
    pub args: Value,
}

/// Written when a step finishes, successfully or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceExit {
    pub run_id: Uuid,
    pub instance_id: Uuid,
    pub finished_at: DateTime<Utc>,
    pub outcome: TraceOutcome,
}

/// One step's combined entry/exit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub run_id: Uuid,
    pub instance_id: Uuid,
    pub brick_id: String,
    pub step_index: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<TraceOutcome>,
    pub args: Value,
}

impl TraceRecord {
    fn from_entry(entry: TraceEntry) -> Self {
        Self {
            run_id: entry.run_id,
            instance_id: entry.instance_id,
            brick_id: entry.brick_id,
            step_index: entry.step_index,
            started_at: entry.started_at,
            finished_at: None,
            outcome: None,
            args: entry.args,
        }
    }
}

/// Recorder failure. Tracing is best-effort, so callers log and continue.
#[derive(Debug, thiserror::Error)]
#[error("trace error: {0}")]
pub struct TraceError(pub String);

/// Sink for step trace records.
///
/// `clear_run` resolves only once the run's records are gone, so callers
/// can await a clean slate before re-running.
#[async_trait]
pub trait TraceRecorder: Send + Sync {
    async fn record_entry(&self, entry: TraceEntry) -> Result<(), TraceError>;

    async fn record_exit(&self, exit: TraceExit) -> Result<(), TraceError>;

    async fn clear_run(&self, run_id: Uuid) -> Result<(), TraceError>;
}

/// Recorder that drops everything
#[derive(Debug, Default)]
pub struct NullTraceRecorder;

#[async_trait]
impl TraceRecorder for NullTraceRecorder {
    async fn record_entry(&self, _entry: TraceEntry) -> Result<(), TraceError> {
        Ok(())
    }

    async fn record_exit(&self, _exit: TraceExit) -> Result<(), TraceError> {
        Ok(())
    }

    async fn clear_run(&self, _run_id: Uuid) -> Result<(), TraceError> {
        Ok(())
    }
}

const DEFAULT_RECORDS_PER_RUN: usize = 1000;

/// In-memory recorder with a per-run record cap.
///
/// When a run hits the cap (looping sub-pipelines can produce unbounded
/// step counts) the oldest records are dropped first.
#[derive(Debug)]
pub struct InMemoryTraceRecorder {
    runs: Mutex<HashMap<Uuid, Vec<TraceRecord>>>,
    cap: usize,
}

impl Default for InMemoryTraceRecorder {
    fn default() -> Self {
        Self::with_cap(DEFAULT_RECORDS_PER_RUN)
    }
}

impl InMemoryTraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            cap: cap.max(1),
        }
    }

    /// Records for one run, in execution order
    pub fn records_for_run(&self, run_id: Uuid) -> Vec<TraceRecord> {
        self.runs
            .lock()
            .expect("trace lock")
            .get(&run_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Run ids with at least one record
    pub fn run_ids(&self) -> Vec<Uuid> {
        self.runs.lock().expect("trace lock").keys().copied().collect()
    }

    /// All records for one step instance across runs, oldest first. Lines
    /// a step's history up across reruns in debugging views.
    pub fn records_for_instance(&self, instance_id: Uuid) -> Vec<TraceRecord> {
        let runs = self.runs.lock().expect("trace lock");
        let mut records: Vec<TraceRecord> = runs
            .values()
            .flatten()
            .filter(|r| r.instance_id == instance_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.started_at);
        records
    }
}

#[async_trait]
impl TraceRecorder for InMemoryTraceRecorder {
    async fn record_entry(&self, entry: TraceEntry) -> Result<(), TraceError> {
        let mut runs = self.runs.lock().expect("trace lock");
        let records = runs.entry(entry.run_id).or_default();
        if records.len() >= self.cap {
            records.remove(0);
        }
        records.push(TraceRecord::from_entry(entry));
        Ok(())
    }

    async fn record_exit(&self, exit: TraceExit) -> Result<(), TraceError> {
        let mut runs = self.runs.lock().expect("trace lock");
        let records = runs.get_mut(&exit.run_id).ok_or_else(|| {
            TraceError(format!("no entry records for run {}", exit.run_id))
        })?;

        // Match the most recent open record for this step instance;
        // looping sub-pipelines re-enter the same instance id
        let record = records
            .iter_mut()
            .rev()
            .find(|r| r.instance_id == exit.instance_id && r.outcome.is_none())
            .ok_or_else(|| {
                TraceError(format!("no open entry for instance {}", exit.instance_id))
            })?;
        record.finished_at = Some(exit.finished_at);
        record.outcome = Some(exit.outcome);
        Ok(())
    }

    async fn clear_run(&self, run_id: Uuid) -> Result<(), TraceError> {
        self.runs.lock().expect("trace lock").remove(&run_id);
        Ok(())
    }
}
