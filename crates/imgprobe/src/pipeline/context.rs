use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;

use crate::storage::ArtifactSet;

pub struct TaskContext {
    // Input
    pub task_id: String,
    pub source_path: PathBuf,

    // Decode result, shared read-only with the transform workers
    pub image: Option<Arc<RgbaImage>>,

    // Original plus every derived artifact written so far
    pub artifacts: ArtifactSet,
}

impl TaskContext {
    pub fn new(task_id: impl Into<String>, source_path: PathBuf) -> Self {
        let artifacts = ArtifactSet::with_original(&source_path);
        Self {
            task_id: task_id.into(),
            source_path,
            image: None,
            artifacts,
        }
    }
}
