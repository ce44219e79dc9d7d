use crate::broadcast::task_progress::{TaskPhase, TaskProgressTracker};
use crate::storage::ArtifactKind;

/// Events emitted by the pipeline while a task runs.
pub enum ProgressEvent {
    Phase {
        phase: TaskPhase,
        message: String,
    },
    ArtifactWritten {
        kind: ArtifactKind,
        path: String,
    },
    AnalyzerFinished {
        key: String,
        success: bool,
    },
    Completed,
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events to the broadcast channel.
pub struct BroadcastProgress {
    tracker: TaskProgressTracker,
}

impl BroadcastProgress {
    pub fn from_tracker(tracker: TaskProgressTracker) -> Self {
        Self { tracker }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => {
                self.tracker.update_phase(phase, &message);
            }
            ProgressEvent::ArtifactWritten { kind, path } => {
                let file_name = crate::sanitize::redact_path(std::path::Path::new(&path));
                self.tracker.artifact_written(kind.label(), &file_name);
            }
            ProgressEvent::AnalyzerFinished { key, success } => {
                self.tracker.analyzer_finished(&key, success);
            }
            ProgressEvent::Completed => self.tracker.completed(),
            ProgressEvent::Failed { error } => self.tracker.failed(&error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::TaskProgressBroadcaster;

    #[test]
    fn test_broadcast_progress_forwards_events() {
        let broadcaster = TaskProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let progress = BroadcastProgress::from_tracker(broadcaster.start_task("t-9", "a.png"));
        let _ = rx.try_recv();

        progress.report(ProgressEvent::ArtifactWritten {
            kind: ArtifactKind::Gamma,
            path: "/srv/uploads/t-9_gamma.jpg".to_string(),
        });
        let event = rx.try_recv().unwrap();
        assert_eq!(event.artifact.as_deref(), Some("t-9_gamma.jpg"));
        assert!(event.message.contains("gamma"));

        progress.report(ProgressEvent::Completed);
        assert_eq!(rx.try_recv().unwrap().phase, TaskPhase::Completed);
    }
}
