//! Task progress broadcaster for push-style status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Phase of task processing as seen by subscribers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Queued,
    Transforming,
    Analyzing,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPhase::Queued => write!(f, "Queued"),
            TaskPhase::Transforming => write!(f, "Transforming"),
            TaskPhase::Analyzing => write!(f, "Analyzing"),
            TaskPhase::Completed => write!(f, "Completed"),
            TaskPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress event for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressEvent {
    pub task_id: String,
    /// File name of the upload, never the full path.
    pub filename: String,
    pub phase: TaskPhase,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Derived artifact that was just written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Result key of an analyzer that just finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskProgressEvent {
    pub fn new(task_id: &str, filename: &str, phase: TaskPhase, message: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            filename: filename.to_string(),
            phase,
            message: message.to_string(),
            timestamp: Utc::now(),
            artifact: None,
            result_key: None,
            error: None,
        }
    }

    pub fn failed(task_id: &str, filename: &str, error: &str) -> Self {
        let mut event = Self::new(task_id, filename, TaskPhase::Failed, "Processing failed");
        event.error = Some(error.to_string());
        event
    }
}

/// Broadcasts task progress events to any number of subscribers.
#[derive(Clone)]
pub struct TaskProgressBroadcaster {
    sender: Arc<broadcast::Sender<TaskProgressEvent>>,
}

impl TaskProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: TaskProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one task and announces it as queued.
    pub fn start_task(&self, task_id: &str, filename: &str) -> TaskProgressTracker {
        let tracker = TaskProgressTracker::new(task_id, filename, Arc::clone(&self.sender));
        tracker.update_phase(TaskPhase::Queued, "Task queued for processing");
        tracker
    }
}

impl Default for TaskProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Tracks progress for a single task.
pub struct TaskProgressTracker {
    task_id: String,
    filename: String,
    sender: Arc<broadcast::Sender<TaskProgressEvent>>,
}

impl TaskProgressTracker {
    pub fn new(
        task_id: &str,
        filename: &str,
        sender: Arc<broadcast::Sender<TaskProgressEvent>>,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            filename: filename.to_string(),
            sender,
        }
    }

    pub fn update_phase(&self, phase: TaskPhase, message: &str) {
        let event = TaskProgressEvent::new(&self.task_id, &self.filename, phase, message);
        let _ = self.sender.send(event);
    }

    pub fn artifact_written(&self, artifact: &str, file_name: &str) {
        let mut event = TaskProgressEvent::new(
            &self.task_id,
            &self.filename,
            TaskPhase::Transforming,
            &format!("Wrote {} artifact", artifact),
        );
        event.artifact = Some(file_name.to_string());
        let _ = self.sender.send(event);
    }

    pub fn analyzer_finished(&self, key: &str, success: bool) {
        let message = if success {
            format!("{} finished", key)
        } else {
            format!("{} reported an error", key)
        };
        let mut event =
            TaskProgressEvent::new(&self.task_id, &self.filename, TaskPhase::Analyzing, &message);
        event.result_key = Some(key.to_string());
        let _ = self.sender.send(event);
    }

    pub fn completed(&self) {
        self.update_phase(TaskPhase::Completed, "Analysis completed");
    }

    pub fn failed(&self, error: &str) {
        let event = TaskProgressEvent::failed(&self.task_id, &self.filename, error);
        let _ = self.sender.send(event);
    }
}
