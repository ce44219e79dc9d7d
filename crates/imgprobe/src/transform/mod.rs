//! Photometric transforms that produce the derived artifacts of a task.

pub mod adjust;
pub mod decode;

use serde::{Deserialize, Serialize};

pub use adjust::{apply, Adjustment};
pub use decode::decode_image;

/// The derived artifacts, in the order the pipeline produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Brightness,
    Contrast,
    Gamma,
    Color,
}

impl TransformKind {
    pub const ALL: [TransformKind; 4] = [
        TransformKind::Brightness,
        TransformKind::Contrast,
        TransformKind::Gamma,
        TransformKind::Color,
    ];

    /// File name suffix of the artifact, e.g. `<task>_brightness.jpg`.
    pub fn suffix(&self) -> &'static str {
        match self {
            TransformKind::Brightness => "brightness",
            TransformKind::Contrast => "contrast",
            TransformKind::Gamma => "gamma",
            TransformKind::Color => "color",
        }
    }
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// How a scaled channel value is narrowed back to 8 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Narrowing {
    /// Truncate toward zero, then keep the low 8 bits (500.0 becomes 244).
    /// Matches the artifacts produced by the existing deployment.
    #[default]
    Wrapping,
    /// Clamp into `0..=255` (500.0 becomes 255).
    Saturating,
}

impl Narrowing {
    #[inline]
    pub fn narrow(self, value: f64) -> u8 {
        match self {
            Narrowing::Wrapping => value as i64 as u8,
            Narrowing::Saturating => value as u8,
        }
    }
}
