use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::analyzer::{AnalysisFanOut, FanOutSummary};
use crate::broadcast::TaskPhase;
use crate::error::{ArtifactError, TaskError, TransformError};
use crate::sanitize;
use crate::storage::{ArtifactKind, ArtifactWriter};
use crate::task::{TaskState, TaskStore};
use crate::transform::{apply, decode_image, Adjustment};
use crate::worker::TaskOutcome;

use super::config::PipelineConfig;
use super::context::TaskContext;
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};

/// Drives one task from `created` to `done` or `failed`.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    writer: ArtifactWriter,
    fanout: AnalysisFanOut,
    store: Arc<TaskStore>,
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>, fanout: AnalysisFanOut, store: Arc<TaskStore>) -> Self {
        let writer = ArtifactWriter::new(
            &config.artifact_directory,
            config.artifact_format,
            config.jpeg_quality,
        );

        Self {
            config,
            writer,
            fanout,
            store,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn fanout(&self) -> &AnalysisFanOut {
        &self.fanout
    }

    /// Runs every step for one task and records the outcome in the store.
    pub async fn run(&self, mut ctx: TaskContext, progress: &dyn ProgressReporter) -> TaskOutcome {
        let filename = sanitize::redact_path(&ctx.source_path);
        let span = info_span!("pipeline", task_id = %ctx.task_id, filename = %filename);

        match self.run_steps(&mut ctx, progress).instrument(span).await {
            Ok(summary) => {
                info!(
                    "Task {} done: {} analyzer result(s) ok, {} with errors",
                    ctx.task_id, summary.succeeded, summary.failed
                );
                progress.report(ProgressEvent::Completed);
                TaskOutcome::Done
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("Task {} failed: {}", ctx.task_id, reason);
                mark_failed(&self.store, &ctx.task_id, &reason);
                progress.report(ProgressEvent::Failed {
                    error: reason.clone(),
                });
                TaskOutcome::Failed { reason }
            }
        }
    }

    async fn run_steps(
        &self,
        ctx: &mut TaskContext,
        progress: &dyn ProgressReporter,
    ) -> Result<FanOutSummary, PipelineError> {
        // Step 1: Decode source
        self.store
            .update(&ctx.task_id, |t| t.transition(TaskState::Transforming))?;
        progress.report(ProgressEvent::Phase {
            phase: TaskPhase::Transforming,
            message: "Decoding image...".to_string(),
        });
        self.step_decode(ctx).instrument(info_span!("decode")).await?;

        // Step 2: Derive artifacts, one after another
        for &adjustment in &self.config.adjustments {
            let span = info_span!("transform", kind = %adjustment.kind());
            self.step_transform(ctx, adjustment, progress)
                .instrument(span)
                .await?;
        }

        // Step 3: Fan out to analyzers
        self.store
            .update(&ctx.task_id, |t| t.transition(TaskState::Analyzing))?;
        progress.report(ProgressEvent::Phase {
            phase: TaskPhase::Analyzing,
            message: "Running analyzers...".to_string(),
        });
        let summary = self
            .step_analyze(ctx, progress)
            .instrument(info_span!("analyze"))
            .await?;

        // Step 4: Every result is recorded, flip the flag
        self.store.update(&ctx.task_id, |t| t.complete())?;

        Ok(summary)
    }

    async fn step_decode(&self, ctx: &mut TaskContext) -> Result<(), PipelineError> {
        let path = ctx.source_path.clone();
        let image = tokio::task::spawn_blocking(move || decode_image(&path))
            .await
            .map_err(|e| TransformError::Worker(e.to_string()))??;

        debug!(
            "Decoded {} ({}x{})",
            sanitize::redact_path(&ctx.source_path),
            image.width(),
            image.height()
        );
        ctx.image = Some(Arc::new(image));
        Ok(())
    }

    async fn step_transform(
        &self,
        ctx: &mut TaskContext,
        adjustment: Adjustment,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        let image = ctx
            .image
            .clone()
            .ok_or_else(|| TransformError::Worker("source image was not decoded".to_string()))?;
        let kind = adjustment.kind();
        let narrowing = self.config.narrowing;
        let writer = self.writer.clone();
        let path = self.writer.artifact_path(&ctx.task_id, kind);
        let target = path.clone();

        let abandoned = AbandonGuard::new();
        let flag = abandoned.flag();
        tokio::task::spawn_blocking(move || -> Result<bool, ArtifactError> {
            let derived = apply(&image, adjustment, narrowing);
            let bytes = writer.encode(kind, derived)?;
            write_unless_abandoned(&writer, &target, &bytes, &flag)
        })
        .await
        .map_err(|e| TransformError::Worker(e.to_string()))??;
        drop(abandoned);

        // Only persisted artifacts are appended
        self.store
            .update(&ctx.task_id, |t| t.push_derived(path.clone()))?;
        debug!("Wrote {}", sanitize::redact_path(&path));

        progress.report(ProgressEvent::ArtifactWritten {
            kind: ArtifactKind::from(kind),
            path: path.display().to_string(),
        });
        ctx.artifacts.insert(ArtifactKind::from(kind), path);
        Ok(())
    }

    async fn step_analyze(
        &self,
        ctx: &TaskContext,
        progress: &dyn ProgressReporter,
    ) -> Result<FanOutSummary, PipelineError> {
        let invocations = self.fanout.plan(&ctx.artifacts);
        debug!("Planned {} analyzer invocation(s)", invocations.len());

        let summary = self
            .fanout
            .run(&ctx.task_id, &self.store, invocations, progress)
            .await?;
        Ok(summary)
    }
}

/// Raises its flag when dropped, which happens early when the task is
/// cancelled or timed out while blocking work is still running.
struct AbandonGuard(Arc<AtomicBool>);

impl AbandonGuard {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Writes the artifact unless the task was given up on. Returns whether a
/// file was written.
fn write_unless_abandoned(
    writer: &ArtifactWriter,
    path: &Path,
    bytes: &[u8],
    abandoned: &AtomicBool,
) -> Result<bool, ArtifactError> {
    if abandoned.load(Ordering::Acquire) {
        debug!("Task abandoned, not writing {}", sanitize::redact_path(path));
        return Ok(false);
    }
    writer.write(path, bytes)?;
    Ok(true)
}

/// Moves the task to `failed`. A task that already reached a terminal state
/// keeps it.
pub(crate) fn mark_failed(store: &TaskStore, task_id: &str, reason: &str) {
    match store.update(task_id, |t| t.fail(reason)) {
        Ok(()) => {}
        Err(TaskError::Frozen { .. }) => {
            debug!("Task {} already finished, not marking failed", task_id);
        }
        Err(e) => warn!("Could not mark task {} failed: {}", task_id, e),
    }
}
