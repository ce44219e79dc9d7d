use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analyzer::AnalyzerKind;
use crate::storage::{ArtifactFormat, ArtifactKind};
use crate::transform::Narrowing;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_artifact_directory")]
    pub artifact_directory: PathBuf,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    #[serde(default = "default_max_finished_tasks")]
    pub max_finished_tasks: usize,
    /// Finished tasks stay readable at least this long, even past
    /// `max_finished_tasks`.
    #[serde(default = "default_finished_task_grace_secs")]
    pub finished_task_grace_secs: u64,
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_analyzer_timeout_secs")]
    pub analyzer_timeout_secs: u64,
    #[serde(default)]
    pub transforms: TransformsConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default = "default_analyzers")]
    pub analyzers: Vec<AnalyzerConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_artifact_directory() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_concurrent_tasks() -> usize {
    num_cpus::get()
}

fn default_max_finished_tasks() -> usize {
    1000
}

fn default_finished_task_grace_secs() -> u64 {
    300
}

fn default_task_timeout_secs() -> u64 {
    600
}

fn default_analyzer_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            artifact_directory: default_artifact_directory(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            max_finished_tasks: default_max_finished_tasks(),
            finished_task_grace_secs: default_finished_task_grace_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            analyzer_timeout_secs: default_analyzer_timeout_secs(),
            transforms: TransformsConfig::default(),
            artifacts: ArtifactsConfig::default(),
            analyzers: default_analyzers(),
        }
    }
}

/// Factors of the four pixel transforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformsConfig {
    #[serde(default = "default_brightness")]
    pub brightness: f64,
    #[serde(default = "default_contrast")]
    pub contrast: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default)]
    pub color_balance: ColorBalanceConfig,
    #[serde(default)]
    pub narrowing: Narrowing,
}

fn default_brightness() -> f64 {
    2.5
}

fn default_contrast() -> f64 {
    2.5
}

fn default_gamma() -> f64 {
    0.5
}

impl Default for TransformsConfig {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            contrast: default_contrast(),
            gamma: default_gamma(),
            color_balance: ColorBalanceConfig::default(),
            narrowing: Narrowing::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColorBalanceConfig {
    #[serde(default = "default_red")]
    pub red: f64,
    #[serde(default = "default_green")]
    pub green: f64,
    #[serde(default = "default_blue")]
    pub blue: f64,
}

fn default_red() -> f64 {
    2.0
}

fn default_green() -> f64 {
    1.5
}

fn default_blue() -> f64 {
    1.0
}

impl Default for ColorBalanceConfig {
    fn default() -> Self {
        Self {
            red: default_red(),
            green: default_green(),
            blue: default_blue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default)]
    pub format: ArtifactFormat,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_jpeg_quality() -> u8 {
    75
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            format: ArtifactFormat::default(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// One roster entry. `program` and `args` fall back to the defaults of
/// `kind` when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub name: String,
    pub kind: AnalyzerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default = "default_targets")]
    pub targets: Vec<ArtifactKind>,
}

fn default_targets() -> Vec<ArtifactKind> {
    vec![ArtifactKind::Original]
}

fn builtin(name: &str, kind: AnalyzerKind, targets: Vec<ArtifactKind>) -> AnalyzerConfig {
    AnalyzerConfig {
        name: name.to_string(),
        kind,
        program: None,
        args: None,
        targets,
    }
}

/// zsteg on the original and the brightened copy; strings, exiv2 and
/// binwalk on the original.
pub fn default_analyzers() -> Vec<AnalyzerConfig> {
    vec![
        builtin(
            "zsteg",
            AnalyzerKind::Steganography,
            vec![ArtifactKind::Original, ArtifactKind::Brightness],
        ),
        builtin("strings", AnalyzerKind::Strings, default_targets()),
        builtin("exiv2", AnalyzerKind::Metadata, default_targets()),
        builtin("binwalk", AnalyzerKind::Signatures, default_targets()),
    ]
}
