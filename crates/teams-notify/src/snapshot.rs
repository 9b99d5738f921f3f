//! Process-wide store of validation verdicts.
//!
//! Verdicts are kept per task id so that concurrent analyses never read each
//! other's configuration. Outcomes without a task id share a single
//! last-writer-wins slot, which can be stale if analyses overlap.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::resolver::ValidationVerdict;

/// Default upper bound on per-task entries kept in the store.
pub const DEFAULT_MAX_TASKS: usize = 1024;

/// A published verdict and the generation it was written at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Monotonically increasing write counter.
    pub generation: u64,
    /// Task this verdict was produced for, if known.
    pub task_id: Option<String>,
    /// The verdict itself.
    pub verdict: ValidationVerdict,
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    latest: Option<Arc<Snapshot>>,
    by_task: HashMap<String, Arc<Snapshot>>,
}

/// Shared store of published snapshots.
///
/// Every write replaces a whole `Arc<Snapshot>`; readers never observe a
/// partially written verdict.
#[derive(Debug)]
pub struct SnapshotStore {
    inner: RwLock<Inner>,
    max_tasks: usize,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_tasks(DEFAULT_MAX_TASKS)
    }

    /// Creates an empty store bounded to `max_tasks` per-task entries.
    #[must_use]
    pub fn with_max_tasks(max_tasks: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_tasks: max_tasks.max(1),
        }
    }

    /// Publishes a verdict, returning the stored snapshot.
    ///
    /// The verdict always becomes the latest snapshot; with a task id it is
    /// also stored under that id.
    pub fn publish(&self, task_id: Option<&str>, verdict: ValidationVerdict) -> Arc<Snapshot> {
        let mut inner = self.inner.write();
        inner.generation += 1;
        let snapshot = Arc::new(Snapshot {
            generation: inner.generation,
            task_id: task_id.map(str::to_string),
            verdict,
        });

        if let Some(id) = task_id {
            inner.by_task.insert(id.to_string(), Arc::clone(&snapshot));
            if inner.by_task.len() > self.max_tasks {
                evict_oldest(&mut inner.by_task);
            }
        }
        inner.latest = Some(Arc::clone(&snapshot));

        debug!(
            generation = snapshot.generation,
            task_id = ?snapshot.task_id,
            valid = snapshot.verdict.valid,
            "snapshot published"
        );
        snapshot
    }

    /// Returns the most recent snapshot, regardless of task.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.inner.read().latest.clone()
    }

    /// Returns the snapshot published for a task, if any.
    #[must_use]
    pub fn get(&self, task_id: &str) -> Option<Arc<Snapshot>> {
        self.inner.read().by_task.get(task_id).cloned()
    }

    /// Removes and returns the snapshot published for a task.
    pub fn take(&self, task_id: &str) -> Option<Arc<Snapshot>> {
        self.inner.write().by_task.remove(task_id)
    }

    /// Picks the snapshot a delivery for `task_id` should read.
    ///
    /// With a task id only that task's snapshot is returned; the shared slot is
    /// never consulted, so a verdict from another analysis cannot leak in.
    /// Without a task id the latest snapshot is returned.
    pub fn for_delivery(&self, task_id: Option<&str>) -> Option<Arc<Snapshot>> {
        match task_id {
            Some(id) => self.take(id),
            None => {
                let latest = self.latest();
                if latest.is_some() {
                    warn!("delivery has no task id, reading latest snapshot which may belong to another analysis");
                }
                latest
            }
        }
    }

    /// Returns the current generation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Returns the number of per-task entries held.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.inner.read().by_task.len()
    }

    /// Drops every snapshot. The generation counter keeps counting.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.latest = None;
        inner.by_task.clear();
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

fn evict_oldest(by_task: &mut HashMap<String, Arc<Snapshot>>) {
    let oldest = by_task
        .iter()
        .min_by_key(|(_, s)| s.generation)
        .map(|(id, _)| id.clone());
    if let Some(id) = oldest {
        debug!(task_id = %id, "evicting oldest snapshot");
        by_task.remove(&id);
    }
}
