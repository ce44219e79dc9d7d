use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;
use crate::transform::TransformKind;

/// Encoding used for derived artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Lossy, alpha is dropped.
    #[default]
    Jpeg,
    Png,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Jpeg => "jpg",
            ArtifactFormat::Png => "png",
        }
    }
}

/// Writes derived images into a flat directory, named `<task_id>_<suffix>.<ext>`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    directory: PathBuf,
    format: ArtifactFormat,
    jpeg_quality: u8,
}

impl ArtifactWriter {
    pub fn new<P: AsRef<Path>>(directory: P, format: ArtifactFormat, jpeg_quality: u8) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            format,
            jpeg_quality,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    pub fn artifact_path(&self, task_id: &str, kind: TransformKind) -> PathBuf {
        self.directory.join(format!(
            "{}_{}.{}",
            task_id,
            kind.suffix(),
            self.format.extension()
        ))
    }

    pub fn ensure_directory(&self) -> Result<(), ArtifactError> {
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory).map_err(|e| {
                ArtifactError::CreateDirectory {
                    path: self.directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }

    /// Encodes `image` in the configured format.
    pub fn encode(&self, kind: TransformKind, image: RgbaImage) -> Result<Vec<u8>, ArtifactError> {
        let mut buffer = Vec::new();
        let dynamic = DynamicImage::ImageRgba8(image);

        let result = match self.format {
            ArtifactFormat::Jpeg => DynamicImage::ImageRgb8(dynamic.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(
                    &mut buffer,
                    self.jpeg_quality,
                )),
            ArtifactFormat::Png => dynamic.write_with_encoder(PngEncoder::new(&mut buffer)),
        };

        result.map_err(|e| ArtifactError::Encode {
            suffix: kind.suffix(),
            source: e,
        })?;

        Ok(buffer)
    }

    pub fn write(&self, path: &Path, content: &[u8]) -> Result<(), ArtifactError> {
        self.ensure_directory()?;
        std::fs::write(path, content).map_err(|e| ArtifactError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
