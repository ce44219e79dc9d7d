use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinSet;

use crate::error::TaskError;
use crate::pipeline::progress::{ProgressEvent, ProgressReporter};
use crate::storage::ArtifactSet;
use crate::task::{ResultKey, TaskStore};

use super::{Analyzer, AnalyzerOutcome, AnalyzerRoster};

/// One planned analyzer run against one artifact.
pub struct Invocation {
    pub key: ResultKey,
    pub analyzer: Arc<dyn Analyzer>,
    pub target: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOutSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct AnalysisFanOut {
    roster: AnalyzerRoster,
}

impl AnalysisFanOut {
    pub fn new(roster: AnalyzerRoster) -> Self {
        Self { roster }
    }

    pub fn roster(&self) -> &AnalyzerRoster {
        &self.roster
    }

    /// Expands the roster into one invocation per (analyzer, artifact).
    /// Targets that were not produced for this task are skipped, and each
    /// key is planned at most once.
    pub fn plan(&self, artifacts: &ArtifactSet) -> Vec<Invocation> {
        let mut invocations = Vec::new();
        let mut planned = HashSet::new();

        for entry in self.roster.entries() {
            for &artifact in &entry.targets {
                let Some(target) = artifacts.get(artifact) else {
                    log::warn!(
                        "Skipping {} on {}: artifact not available",
                        entry.analyzer.name(),
                        artifact
                    );
                    continue;
                };

                let key = ResultKey::new(entry.analyzer.name(), artifact);
                if !planned.insert(key.clone()) {
                    log::warn!("Skipping repeated invocation {}", key);
                    continue;
                }

                invocations.push(Invocation {
                    key,
                    analyzer: Arc::clone(&entry.analyzer),
                    target: target.to_path_buf(),
                });
            }
        }

        invocations
    }

    /// Runs all invocations concurrently and waits for every one of them.
    ///
    /// Slots are registered as pending before anything starts. Workers only
    /// send their outcome back; this loop is the single writer of the task
    /// record. A worker that never reports back is recorded as crashed, so
    /// no slot is left pending once this returns.
    pub async fn run(
        &self,
        task_id: &str,
        store: &TaskStore,
        invocations: Vec<Invocation>,
        progress: &dyn ProgressReporter,
    ) -> Result<FanOutSummary, TaskError> {
        store.update(task_id, |task| {
            for invocation in &invocations {
                task.register_pending(&invocation.key, &invocation.target)?;
            }
            Ok(())
        })?;

        let mut outstanding: HashSet<ResultKey> = HashSet::new();
        let mut workers = JoinSet::new();
        for Invocation {
            key,
            analyzer,
            target,
        } in invocations
        {
            log::debug!("Task {} starting {}", task_id, key);
            outstanding.insert(key.clone());
            workers.spawn(async move {
                let outcome = AssertUnwindSafe(analyzer.analyze(&target))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| AnalyzerOutcome::Crashed {
                        message: panic_message(panic.as_ref()),
                    });
                (key, outcome)
            });
        }

        let mut summary = FanOutSummary::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((key, outcome)) => {
                    outstanding.remove(&key);
                    self.record(task_id, store, key, outcome, &mut summary, progress);
                }
                Err(e) => {
                    log::error!("Analyzer worker of task {} did not finish: {}", task_id, e);
                }
            }
        }

        let mut lost: Vec<ResultKey> = outstanding.into_iter().collect();
        lost.sort();
        for key in lost {
            let outcome = AnalyzerOutcome::Crashed {
                message: "worker did not report a result".to_string(),
            };
            self.record(task_id, store, key, outcome, &mut summary, progress);
        }

        Ok(summary)
    }

    /// Writes one outcome. A rejected write is logged and does not stop
    /// the remaining results from being recorded.
    fn record(
        &self,
        task_id: &str,
        store: &TaskStore,
        key: ResultKey,
        outcome: AnalyzerOutcome,
        summary: &mut FanOutSummary,
        progress: &dyn ProgressReporter,
    ) {
        let success = outcome.is_success();
        log::debug!(
            "Task {} finished {} ({})",
            task_id,
            key,
            if success { "ok" } else { "error" }
        );

        if let Err(e) = store.update(task_id, |task| task.record_result(&key, outcome)) {
            log::error!("Failed to record {} for task {}: {}", key, task_id, e);
            return;
        }
        if success {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
        }
        progress.report(ProgressEvent::AnalyzerFinished {
            key: key.to_string(),
            success,
        });
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
