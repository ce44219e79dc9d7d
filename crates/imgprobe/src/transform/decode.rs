use std::path::Path;

use image::RgbaImage;

use crate::error::TransformError;

/// Reads and decodes the source upload into RGBA8.
///
/// The format is sniffed from the file contents, not the extension.
pub fn decode_image(path: &Path) -> Result<RgbaImage, TransformError> {
    let _span = tracing::info_span!("transform.decode").entered();

    let image_data = std::fs::read(path).map_err(|e| TransformError::ReadImage {
        path: path.to_path_buf(),
        source: e,
    })?;

    let img = image::load_from_memory(&image_data).map_err(|e| TransformError::Decode {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(img.to_rgba8())
}
