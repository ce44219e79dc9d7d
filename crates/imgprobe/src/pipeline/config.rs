use std::path::PathBuf;

use crate::config::Config;
use crate::storage::ArtifactFormat;
use crate::transform::{Adjustment, Narrowing};

pub struct PipelineConfig {
    pub artifact_directory: PathBuf,
    /// Applied in order; each one produces one derived artifact.
    pub adjustments: Vec<Adjustment>,
    pub narrowing: Narrowing,
    pub artifact_format: ArtifactFormat,
    pub jpeg_quality: u8,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let transforms = &config.transforms;
        let balance = transforms.color_balance;

        Self {
            artifact_directory: config.artifact_directory.clone(),
            adjustments: vec![
                Adjustment::Brightness(transforms.brightness),
                Adjustment::Contrast(transforms.contrast),
                Adjustment::Gamma(transforms.gamma),
                Adjustment::ColorBalance {
                    red: balance.red,
                    green: balance.green,
                    blue: balance.blue,
                },
            ],
            narrowing: transforms.narrowing,
            artifact_format: config.artifacts.format,
            jpeg_quality: config.artifacts.jpeg_quality,
        }
    }
}
