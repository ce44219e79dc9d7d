use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::DispatchError;
use crate::task::{AnalysisTask, SubmitResponse};

/// Terminal result of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Done,
    Failed { reason: String },
}

impl TaskOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskOutcome::Done)
    }

    /// Reads the outcome off a terminal record. `None` while the task runs.
    pub fn from_task(task: &AnalysisTask) -> Option<Self> {
        if task.is_done() {
            Some(TaskOutcome::Done)
        } else if task.is_terminal() {
            Some(TaskOutcome::Failed {
                reason: task.failure().unwrap_or("unknown failure").to_string(),
            })
        } else {
            None
        }
    }
}

/// Lifecycle handle of a submitted task.
///
/// Dropping the handle detaches the task; it keeps running to completion.
pub struct TaskHandle {
    id: String,
    cancel: watch::Sender<bool>,
    join: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    pub(crate) fn new(id: String, cancel: watch::Sender<bool>, join: JoinHandle<TaskOutcome>) -> Self {
        Self { id, cancel, join }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn submit_response(&self) -> SubmitResponse {
        SubmitResponse::new(self.id.clone())
    }

    /// Requests cancellation. The task ends as `failed` with reason
    /// `cancelled` unless it already finished.
    pub fn cancel(&self) {
        // Receiver is gone once the task finished
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> Result<TaskOutcome, DispatchError> {
        self.join.await.map_err(|e| {
            if e.is_panic() {
                DispatchError::Panicked { id: self.id.clone() }
            } else {
                DispatchError::Aborted { id: self.id.clone() }
            }
        })
    }
}
