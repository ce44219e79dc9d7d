pub mod artifacts;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::transform::TransformKind;

pub use artifacts::{ArtifactFormat, ArtifactWriter};

/// A file an analyzer can be pointed at: the upload itself or one of its
/// derived variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Original,
    Brightness,
    Contrast,
    Gamma,
    Color,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Original => "original",
            ArtifactKind::Brightness => "brightness",
            ArtifactKind::Contrast => "contrast",
            ArtifactKind::Gamma => "gamma",
            ArtifactKind::Color => "color",
        }
    }
}

impl From<TransformKind> for ArtifactKind {
    fn from(kind: TransformKind) -> Self {
        match kind {
            TransformKind::Brightness => ArtifactKind::Brightness,
            TransformKind::Contrast => ArtifactKind::Contrast,
            TransformKind::Gamma => ArtifactKind::Gamma,
            TransformKind::Color => ArtifactKind::Color,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Paths of the artifacts available to the fan-out of one task.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    paths: BTreeMap<ArtifactKind, PathBuf>,
}

impl ArtifactSet {
    pub fn with_original(source_path: &Path) -> Self {
        let mut set = Self::default();
        set.insert(ArtifactKind::Original, source_path.to_path_buf());
        set
    }

    pub fn insert(&mut self, kind: ArtifactKind, path: PathBuf) {
        self.paths.insert(kind, path);
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Path> {
        self.paths.get(&kind).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
