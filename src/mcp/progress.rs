//! Task progress tracking.
//!
//! Long-running handlers report coarse milestones for a task id; the HTTP
//! polling and streaming endpoints read them back.

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Status given to records created by a first poll.
pub const INITIAL_STATUS: &str = "initializing";

/// Status of a successfully finished task.
pub const COMPLETED_STATUS: &str = "completed";

/// How often finished records are swept.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Progress of a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Fraction complete, in `[0.0, 1.0]`.
    pub progress: f64,
    pub status: String,
}

impl TaskProgress {
    pub fn new(progress: f64, status: impl Into<String>) -> Self {
        Self {
            progress: progress.clamp(0.0, 1.0),
            status: status.into(),
        }
    }

    /// The record a never-seen task id starts with.
    pub fn initializing() -> Self {
        Self::new(0.0, INITIAL_STATUS)
    }

    /// Whether the task finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        self.progress >= 1.0
            && (self.status == COMPLETED_STATUS || self.status.starts_with("error"))
    }
}

#[derive(Debug)]
struct Entry {
    record: TaskProgress,
    updated_at: Instant,
}

/// Concurrent store of task progress records.
///
/// Writers must hold a [`TaskReporter`] for the task id, which guarantees a
/// single writer per task at a time.
#[derive(Debug, Default)]
pub struct ProgressStore {
    entries: DashMap<String, Entry>,
    writers: DashSet<String>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the record for `task_id`.
    pub fn set(&self, task_id: &str, progress: f64, status: impl Into<String>) {
        self.entries.insert(
            task_id.to_string(),
            Entry {
                record: TaskProgress::new(progress, status),
                updated_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, task_id: &str) -> Option<TaskProgress> {
        self.entries.get(task_id).map(|e| e.record.clone())
    }

    /// Get the record for `task_id`, creating an initializing record on first reference.
    pub fn get_or_init(&self, task_id: &str) -> TaskProgress {
        self.entries
            .entry(task_id.to_string())
            .or_insert_with(|| Entry {
                record: TaskProgress::initializing(),
                updated_at: Instant::now(),
            })
            .record
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Claim exclusive write access to `task_id`.
    ///
    /// Fails with [`Error::TaskBusy`] while another reporter holds the id.
    pub fn claim(self: &Arc<Self>, task_id: impl Into<String>) -> Result<TaskReporter> {
        let task_id = task_id.into();
        if !self.writers.insert(task_id.clone()) {
            return Err(Error::TaskBusy(task_id));
        }
        Ok(TaskReporter {
            store: Arc::clone(self),
            task_id,
        })
    }

    /// Remove terminal records not updated within `ttl`. Returns how many were removed.
    pub fn evict_finished(&self, ttl: Duration) -> usize {
        let mut removed = 0;
        self.entries.retain(|task_id, entry| {
            let expired = entry.record.is_terminal()
                && entry.updated_at.elapsed() >= ttl
                && !self.writers.contains(task_id);
            if expired {
                removed += 1;
            }
            !expired
        });
        removed
    }

    /// Periodically evict finished records until `cancel` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        ttl: Duration,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = self.evict_finished(ttl);
                        if removed > 0 {
                            debug!("Evicted {} finished task records", removed);
                        }
                    }
                }
            }
        })
    }
}

/// Exclusive writer for one task's progress record.
///
/// Releases the claim when dropped.
#[derive(Debug)]
pub struct TaskReporter {
    store: Arc<ProgressStore>,
    task_id: String,
}

impl TaskReporter {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn report(&self, progress: f64, status: impl Into<String>) {
        self.store.set(&self.task_id, progress, status);
    }

    pub fn complete(&self) {
        self.report(1.0, COMPLETED_STATUS);
    }

    pub fn fail(&self, message: impl std::fmt::Display) {
        self.report(1.0, format!("error: {}", message));
    }
}

impl Drop for TaskReporter {
    fn drop(&mut self) {
        self.store.writers.remove(&self.task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get_round_trip() {
        let store = ProgressStore::new();
        store.set("task-1", 0.3, "processing");

        assert_eq!(
            store.get("task-1"),
            Some(TaskProgress {
                progress: 0.3,
                status: "processing".to_string()
            })
        );
    }

    #[test]
    fn test_set_overwrites() {
        let store = ProgressStore::new();
        store.set("task-1", 0.1, "initializing");
        store.set("task-1", 1.0, "completed");

        assert_eq!(store.get("task-1").unwrap(), TaskProgress::new(1.0, "completed"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_first_reference_creates_initializing_record() {
        let store = ProgressStore::new();
        assert!(store.get("unknown").is_none());

        let record = store.get_or_init("unknown");
        assert_eq!(record.progress, 0.0);
        assert_eq!(record.status, "initializing");
        assert_eq!(store.get("unknown"), Some(record));
    }

    #[test]
    fn test_get_or_init_keeps_existing_record() {
        let store = ProgressStore::new();
        store.set("task-1", 0.4, "processing");
        assert_eq!(store.get_or_init("task-1").status, "processing");
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskProgress::new(1.0, "completed").is_terminal());
        assert!(TaskProgress::new(1.0, "error: boom").is_terminal());
        assert!(!TaskProgress::new(0.4, "processing").is_terminal());
        assert!(!TaskProgress::new(1.0, "processing").is_terminal());
        assert!(!TaskProgress::initializing().is_terminal());
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(TaskProgress::new(1.5, "x").progress, 1.0);
        assert_eq!(TaskProgress::new(-0.5, "x").progress, 0.0);
    }

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let store = Arc::new(ProgressStore::new());

        let reporter = store.claim("task-1").unwrap();
        assert!(matches!(store.claim("task-1"), Err(Error::TaskBusy(_))));
        assert!(store.claim("task-2").is_ok());

        drop(reporter);
        assert!(store.claim("task-1").is_ok());
    }

    #[test]
    fn test_reporter_writes() {
        let store = Arc::new(ProgressStore::new());
        let reporter = store.claim("task-1").unwrap();

        reporter.report(0.2, "loading model");
        assert_eq!(store.get("task-1").unwrap().status, "loading model");

        reporter.fail("Missing required parameter: mask_data");
        let record = store.get("task-1").unwrap();
        assert_eq!(record.progress, 1.0);
        assert_eq!(record.status, "error: Missing required parameter: mask_data");
        assert!(record.is_terminal());
    }

    #[test]
    fn test_evict_finished_only_removes_terminal_records() {
        let store = Arc::new(ProgressStore::new());
        store.set("done", 1.0, "completed");
        store.set("failed", 1.0, "error: boom");
        store.set("running", 0.4, "processing");

        assert_eq!(store.evict_finished(Duration::ZERO), 2);
        assert!(store.get("done").is_none());
        assert!(store.get("failed").is_none());
        assert!(store.get("running").is_some());
    }

    #[test]
    fn test_evict_respects_ttl_and_claims() {
        let store = Arc::new(ProgressStore::new());
        store.set("recent", 1.0, "completed");
        assert_eq!(store.evict_finished(Duration::from_secs(3600)), 0);

        let reporter = store.claim("claimed").unwrap();
        reporter.complete();
        assert_eq!(store.evict_finished(Duration::ZERO), 1);
        assert!(store.get("claimed").is_some());
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let store = Arc::new(ProgressStore::new());
        store.set("done", 1.0, "completed");

        let cancel = CancellationToken::new();
        let handle = store.clone().spawn_sweeper(
            Duration::ZERO,
            Duration::from_millis(10),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("done").is_none());

        cancel.cancel();
        handle.await.unwrap();
    }
}
