use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

use super::record::AnalysisTask;
use super::store::TaskStore;

/// Structured response returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

impl SubmitResponse {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

/// Read-only view of the task store for pollers.
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<TaskStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    /// Snapshot of the task, including pending result slots.
    pub fn status(&self, id: &str) -> Result<AnalysisTask, TaskError> {
        self.store.get(id)
    }

    pub fn status_json(&self, id: &str) -> Result<serde_json::Value, TaskError> {
        let task = self.status(id)?;
        render(id, &task)
    }
}

fn render<T: Serialize>(id: &str, value: &T) -> Result<serde_json::Value, TaskError> {
    serde_json::to_value(value).map_err(|e| TaskError::Render {
        id: id.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_unknown_id_is_not_found() {
        let reporter = StatusReporter::new(Arc::new(TaskStore::new()));
        assert_eq!(
            reporter.status("does-not-exist"),
            Err(TaskError::NotFound("does-not-exist".to_string()))
        );
        assert!(reporter.status_json("does-not-exist").is_err());
    }

    #[test]
    fn test_fresh_task_is_not_done() {
        let store = Arc::new(TaskStore::new());
        let id = store.create(Path::new("/uploads/fresh.png"));
        let reporter = StatusReporter::new(Arc::clone(&store));

        let task = reporter.status(&id).unwrap();
        assert!(!task.is_done());
        assert!(task.analyzer_results().is_empty());
        assert!(task.derived_paths().is_empty());

        let json = reporter.status_json(&id).unwrap();
        assert_eq!(json["id"], id.as_str());
        assert_eq!(json["done"], false);
        assert_eq!(json["analyzer_results"], serde_json::json!({}));
    }

    #[test]
    fn test_render_failure_is_an_error() {
        let mut unrenderable = std::collections::HashMap::new();
        unrenderable.insert((1u8, 2u8), "tuple keys are not JSON object keys");

        match render("t-1", &unrenderable) {
            Err(TaskError::Render { id, message }) => {
                assert_eq!(id, "t-1");
                assert!(!message.is_empty());
            }
            other => panic!("Expected render error, got {:?}", other),
        }
    }

    #[test]
    fn test_submit_response_shape() {
        let response = SubmitResponse::new("abc");
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"task_id":"abc"}"#
        );
    }
}
