//! In-memory task store shared by the dispatcher, workers and pollers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::TaskError;

use super::record::{AnalysisTask, TaskState};

type Slot = Arc<Mutex<AnalysisTask>>;

/// Number of tasks per lifecycle state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub created: usize,
    pub transforming: usize,
    pub analyzing: usize,
    pub done: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.created + self.transforming + self.analyzing + self.done + self.failed
    }

    pub fn active(&self) -> usize {
        self.created + self.transforming + self.analyzing
    }
}

/// Concurrent map of task id to task record.
///
/// The map lock is only held to look up or insert a slot. Each record has
/// its own mutex, so updates to different tasks never contend and readers
/// always observe a whole update or none of it.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Slot>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<String, Slot>> {
        match self.tasks.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Task store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot>> {
        match self.tasks.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Task store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn lock_slot(slot: &Slot) -> MutexGuard<'_, AnalysisTask> {
        match slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Task record lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn slot(&self, id: &str) -> Result<Slot, TaskError> {
        self.read_map()
            .get(id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    /// Registers a new task for `source_path` and returns its id.
    pub fn create(&self, source_path: &Path) -> String {
        let mut map = self.write_map();
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !map.contains_key(&candidate) {
                break candidate;
            }
        };

        let task = AnalysisTask::new(id.clone(), source_path.to_path_buf());
        map.insert(id.clone(), Arc::new(Mutex::new(task)));
        log::debug!("Created task {}", id);
        id
    }

    /// Returns a snapshot of the task.
    pub fn get(&self, id: &str) -> Result<AnalysisTask, TaskError> {
        let slot = self.slot(id)?;
        let task = Self::lock_slot(&slot);
        Ok(task.clone())
    }

    /// Applies `f` to the task under its lock.
    ///
    /// Record mutators validate before they write, so a rejected call leaves
    /// the record untouched. Closures that chain several mutators keep the
    /// ones that succeeded before the failing one.
    pub fn update<R, F>(&self, id: &str, f: F) -> Result<R, TaskError>
    where
        F: FnOnce(&mut AnalysisTask) -> Result<R, TaskError>,
    {
        let slot = self.slot(id)?;
        let mut task = Self::lock_slot(&slot);
        f(&mut task)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_map().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_map().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn counts(&self) -> TaskCounts {
        let slots: Vec<Slot> = self.read_map().values().cloned().collect();
        let mut counts = TaskCounts::default();
        for slot in &slots {
            match Self::lock_slot(slot).state() {
                TaskState::Created => counts.created += 1,
                TaskState::Transforming => counts.transforming += 1,
                TaskState::Analyzing => counts.analyzing += 1,
                TaskState::Done => counts.done += 1,
                TaskState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Drops the oldest finished tasks until at most `keep` remain.
    /// Active tasks, and tasks that finished less than `grace` ago, are
    /// never removed. Returns how many were dropped.
    pub fn prune_finished(&self, keep: usize, grace: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(grace)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
        else {
            return 0;
        };

        let mut map = self.write_map();

        let mut finished: Vec<(String, DateTime<Utc>)> = map
            .iter()
            .filter_map(|(id, slot)| {
                let task = Self::lock_slot(slot);
                task.finished_at().map(|at| (id.clone(), at))
            })
            .collect();

        if finished.len() <= keep {
            return 0;
        }

        finished.sort_by_key(|(_, at)| *at);
        let excess = finished.len() - keep;
        let evicted: Vec<String> = finished
            .into_iter()
            .take(excess)
            .take_while(|(_, at)| *at <= cutoff)
            .map(|(id, _)| id)
            .collect();
        for id in &evicted {
            map.remove(id);
        }

        if !evicted.is_empty() {
            log::debug!("Pruned {} finished task(s)", evicted.len());
        }
        evicted.len()
    }
}
