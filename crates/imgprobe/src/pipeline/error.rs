use thiserror::Error;

/// Failures that end a task in the `failed` state.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Image decoding failed: {0}")]
    Transform(#[from] crate::error::TransformError),

    #[error("Artifact storage failed: {0}")]
    Artifact(#[from] crate::error::ArtifactError),

    #[error("Task update rejected: {0}")]
    Task(#[from] crate::error::TaskError),
}
