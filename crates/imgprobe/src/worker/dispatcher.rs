use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, info, warn};
use tokio::sync::{watch, Semaphore};

use crate::analyzer::fanout::panic_message;
use crate::analyzer::{AnalysisFanOut, AnalyzerRoster};
use crate::broadcast::TaskProgressBroadcaster;
use crate::config::Config;
use crate::error::ConfigError;
use crate::pipeline::progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
use crate::pipeline::runner::mark_failed;
use crate::pipeline::{Pipeline, PipelineConfig, TaskContext};
use crate::sanitize;
use crate::task::{StatusReporter, TaskStore};

use super::handle::{TaskHandle, TaskOutcome};

/// Admission, timeout and retention settings of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchLimits {
    pub max_concurrent_tasks: usize,
    pub task_timeout: Duration,
    pub max_finished_tasks: usize,
    pub finished_task_grace: Duration,
}

impl DispatchLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_tasks: config.max_concurrent_tasks,
            task_timeout: Duration::from_secs(config.task_timeout_secs),
            max_finished_tasks: config.max_finished_tasks,
            finished_task_grace: Duration::from_secs(config.finished_task_grace_secs),
        }
    }
}

/// Accepts uploads and runs each one as a detached background task.
///
/// At most `max_concurrent_tasks` run at once; the rest wait in `created`.
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    store: Arc<TaskStore>,
    permits: Arc<Semaphore>,
    limits: DispatchLimits,
    broadcaster: Option<TaskProgressBroadcaster>,
}

impl Dispatcher {
    pub fn new(pipeline: Pipeline, limits: DispatchLimits) -> Result<Self, ConfigError> {
        if limits.max_concurrent_tasks == 0 {
            return Err(ConfigError::Validation {
                message: "max_concurrent_tasks must be at least 1".to_string(),
            });
        }
        if limits.max_finished_tasks == 0 {
            return Err(ConfigError::Validation {
                message: "max_finished_tasks must be at least 1".to_string(),
            });
        }
        let store = Arc::clone(pipeline.store());

        Ok(Self {
            pipeline: Arc::new(pipeline),
            store,
            permits: Arc::new(Semaphore::new(limits.max_concurrent_tasks)),
            limits,
            broadcaster: None,
        })
    }

    /// Builds the store, the analyzer roster and the pipeline from config.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        crate::config::validate_config(config)?;

        let roster = AnalyzerRoster::from_config(
            &config.analyzers,
            Duration::from_secs(config.analyzer_timeout_secs),
        )?;
        info!("Analyzer roster: {}", roster.names().join(", "));

        let pipeline = Pipeline::new(
            Arc::new(PipelineConfig::from_config(config)),
            AnalysisFanOut::new(roster),
            Arc::new(TaskStore::new()),
        );

        Self::new(pipeline, DispatchLimits::from_config(config))
    }

    /// Streams progress of every task submitted from now on.
    pub fn with_broadcaster(mut self, broadcaster: TaskProgressBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn reporter(&self) -> StatusReporter {
        StatusReporter::new(Arc::clone(&self.store))
    }

    /// Registers a task for `source_path` and starts processing it in the
    /// background. The id is visible in the store before this returns.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, source_path: impl Into<PathBuf>) -> TaskHandle {
        let source_path = source_path.into();
        let pruned = self
            .store
            .prune_finished(self.limits.max_finished_tasks, self.limits.finished_task_grace);
        if pruned > 0 {
            debug!("Evicted {} finished task(s) past retention", pruned);
        }

        let id = self.store.create(&source_path);
        let filename = sanitize::redact_path(&source_path);
        info!("Submitted task {} for {}", id, filename);

        let progress: Box<dyn ProgressReporter> = match self.broadcaster {
            Some(ref broadcaster) => Box::new(BroadcastProgress::from_tracker(
                broadcaster.start_task(&id, &filename),
            )),
            None => Box::new(NoopProgress),
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let supervisor = Supervisor {
            pipeline: Arc::clone(&self.pipeline),
            store: Arc::clone(&self.store),
            permits: Arc::clone(&self.permits),
            task_timeout: self.limits.task_timeout,
        };
        let ctx = TaskContext::new(id.clone(), source_path);
        let join = tokio::spawn(supervisor.run(ctx, progress, cancel_rx));

        TaskHandle::new(id, cancel_tx, join)
    }

    /// Stops admitting queued tasks. Running tasks finish normally; queued
    /// ones end as `failed`.
    pub fn shutdown(&self) {
        info!("Shutting down dispatcher...");
        self.permits.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.permits.is_closed()
    }
}

/// Everything one background task needs, owned so it can be spawned.
struct Supervisor {
    pipeline: Arc<Pipeline>,
    store: Arc<TaskStore>,
    permits: Arc<Semaphore>,
    task_timeout: Duration,
}

impl Supervisor {
    async fn run(
        self,
        ctx: TaskContext,
        progress: Box<dyn ProgressReporter>,
        cancel: watch::Receiver<bool>,
    ) -> TaskOutcome {
        let id = ctx.task_id.clone();

        let work = async {
            let _permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| "dispatcher is shut down".to_string())?;
            debug!("Task {} admitted", id);

            let run = AssertUnwindSafe(self.pipeline.run(ctx, progress.as_ref())).catch_unwind();
            match tokio::time::timeout(self.task_timeout, run).await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(panic)) => Err(format!(
                    "worker panicked: {}",
                    panic_message(panic.as_ref())
                )),
                Err(_) => Err(format!("timed out after {:?}", self.task_timeout)),
            }
        };

        let result = tokio::select! {
            result = work => result,
            _ = cancelled(cancel) => Err("cancelled".to_string()),
        };

        match result {
            Ok(outcome) => outcome,
            Err(reason) => self.fail(&id, reason, progress.as_ref()),
        }
    }

    fn fail(&self, id: &str, reason: String, progress: &dyn ProgressReporter) -> TaskOutcome {
        warn!("Task {} failed: {}", id, reason);
        mark_failed(&self.store, id, &reason);

        // The pipeline may have finished right before the interruption
        match self.store.get(id).ok().as_ref().and_then(TaskOutcome::from_task) {
            Some(TaskOutcome::Done) => TaskOutcome::Done,
            _ => {
                progress.report(ProgressEvent::Failed {
                    error: reason.clone(),
                });
                TaskOutcome::Failed { reason }
            }
        }
    }
}

/// Resolves once cancellation was requested. Never resolves if the handle
/// was dropped without cancelling.
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
