use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::AnalyzerOutcome;
use crate::error::TaskError;
use crate::storage::ArtifactKind;

/// Lifecycle of a task. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    Transforming,
    Analyzing,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }

    fn can_transition_to(self, next: TaskState) -> bool {
        match (self, next) {
            (TaskState::Created, TaskState::Transforming)
            | (TaskState::Transforming, TaskState::Analyzing)
            | (TaskState::Analyzing, TaskState::Done) => true,
            (from, TaskState::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Created => write!(f, "created"),
            TaskState::Transforming => write!(f, "transforming"),
            TaskState::Analyzing => write!(f, "analyzing"),
            TaskState::Done => write!(f, "done"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

/// Identifies one analyzer run: which tool, against which artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultKey {
    pub analyzer: String,
    pub artifact: ArtifactKind,
}

impl ResultKey {
    pub fn new(analyzer: impl Into<String>, artifact: ArtifactKind) -> Self {
        Self {
            analyzer: analyzer.into(),
            artifact,
        }
    }
}

impl std::fmt::Display for ResultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.analyzer, self.artifact)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pending,
    Complete,
}

/// Result slot of one analyzer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub analyzer: String,
    pub artifact: ArtifactKind,
    pub target: PathBuf,
    pub status: ResultStatus,
    /// Typed outcome, set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AnalyzerOutcome>,
    /// Rendered text: tool output, or an `Error (<analyzer>): ...` marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl AnalyzerResult {
    pub fn is_complete(&self) -> bool {
        self.status == ResultStatus::Complete
    }
}

/// Tracks one uploaded image through transformation and analysis.
///
/// Once the task is terminal every mutator returns [`TaskError::Frozen`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    id: String,
    source_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    derived_paths: Vec<PathBuf>,
    analyzer_results: BTreeMap<String, AnalyzerResult>,
    state: TaskState,
    done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl AnalysisTask {
    pub fn new(id: String, source_path: PathBuf) -> Self {
        let now = Utc::now();
        let mime_type = mime_guess::from_path(&source_path)
            .first()
            .map(|m| m.to_string());

        Self {
            id,
            source_path,
            mime_type,
            derived_paths: Vec::new(),
            analyzer_results: BTreeMap::new(),
            state: TaskState::Created,
            done: false,
            failure: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn derived_paths(&self) -> &[PathBuf] {
        &self.derived_paths
    }

    pub fn analyzer_results(&self) -> &BTreeMap<String, AnalyzerResult> {
        &self.analyzer_results
    }

    pub fn result(&self, key: &ResultKey) -> Option<&AnalyzerResult> {
        self.analyzer_results.get(&key.to_string())
    }

    pub fn pending_results(&self) -> usize {
        self.analyzer_results
            .values()
            .filter(|r| !r.is_complete())
            .count()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// True once the task completed successfully.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    fn ensure_mutable(&self) -> Result<(), TaskError> {
        if self.state.is_terminal() {
            return Err(TaskError::Frozen {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn set_state(&mut self, next: TaskState) -> Result<(), TaskError> {
        self.ensure_mutable()?;
        if !self.state.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves to the next non-terminal phase. Use [`complete`](Self::complete)
    /// and [`fail`](Self::fail) for the terminal ones.
    pub fn transition(&mut self, next: TaskState) -> Result<(), TaskError> {
        if next.is_terminal() {
            return Err(TaskError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.set_state(next)
    }

    pub fn push_derived(&mut self, path: PathBuf) -> Result<(), TaskError> {
        self.ensure_mutable()?;
        self.derived_paths.push(path);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn register_pending(&mut self, key: &ResultKey, target: &Path) -> Result<(), TaskError> {
        self.ensure_mutable()?;
        let slot_key = key.to_string();
        if self
            .analyzer_results
            .get(&slot_key)
            .is_some_and(AnalyzerResult::is_complete)
        {
            return Err(TaskError::ResultAlreadySet {
                id: self.id.clone(),
                key: slot_key,
            });
        }

        self.analyzer_results.insert(
            slot_key,
            AnalyzerResult {
                analyzer: key.analyzer.clone(),
                artifact: key.artifact,
                target: target.to_path_buf(),
                status: ResultStatus::Pending,
                outcome: None,
                text: None,
                finished_at: None,
            },
        );
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fills a pending slot. Each slot is written exactly once.
    pub fn record_result(
        &mut self,
        key: &ResultKey,
        outcome: AnalyzerOutcome,
    ) -> Result<(), TaskError> {
        self.ensure_mutable()?;
        let slot_key = key.to_string();
        let id = &self.id;
        let slot = self
            .analyzer_results
            .get_mut(&slot_key)
            .ok_or_else(|| TaskError::UnknownResult {
                id: id.clone(),
                key: slot_key.clone(),
            })?;

        if slot.is_complete() {
            return Err(TaskError::ResultAlreadySet {
                id: id.clone(),
                key: slot_key,
            });
        }

        let now = Utc::now();
        slot.text = Some(outcome.render(&key.analyzer));
        slot.outcome = Some(outcome);
        slot.status = ResultStatus::Complete;
        slot.finished_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks the task done. Refused while any result is still pending, so a
    /// reader never sees `done` next to an unfinished slot.
    pub fn complete(&mut self) -> Result<(), TaskError> {
        self.ensure_mutable()?;
        let pending = self.pending_results();
        if pending > 0 {
            return Err(TaskError::ResultsPending {
                id: self.id.clone(),
                pending,
            });
        }
        self.set_state(TaskState::Done)?;
        self.done = true;
        self.finished_at = Some(self.updated_at);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TaskError> {
        self.set_state(TaskState::Failed)?;
        self.failure = Some(reason.into());
        self.finished_at = Some(self.updated_at);
        Ok(())
    }
}
