use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("field `{0}` is not a data URI")] MissingSeparator(&'static str),
    #[error("invalid base64 in field `{0}`: {1}")] Base64(&'static str, base64::DecodeError),
    #[error("could not read mask image: {0}")] Mask(#[from] image::ImageError),
    #[error("could not write artifact: {0}")] Io(#[from] std::io::Error),
}

/// The pair of on-disk files backing one in-flight edit request. Names carry
/// a per-request uuid so two simultaneous edits never collide.
#[derive(Debug)]
pub struct EditArtifacts {
    pub image_path: PathBuf,
    pub mask_path: PathBuf,
}

fn strip_data_uri<'a>(field: &'static str, value: &'a str) -> Result<&'a str, DecodeError> {
    value
        .split_once(',')
        .map(|(_, b64)| b64)
        .ok_or(DecodeError::MissingSeparator(field))
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    let b64 = strip_data_uri(field, value)?;
    STANDARD.decode(b64).map_err(|e| DecodeError::Base64(field, e))
}

/// Decode the data-URI image and mask and write both to uuid-named files in
/// `temp_dir`. The source image is written verbatim; the mask is converted to
/// 8-bit grayscale and its luminance inverted (`255 - v`), because the
/// upstream inpainting model wants the region-to-edit bright while the canvas
/// paints it dark.
pub fn write_artifacts(
    temp_dir: &Path,
    image_data_uri: &str,
    mask_data_uri: &str,
) -> Result<EditArtifacts, DecodeError> {
    let request_id = Uuid::new_v4();
    let image_path = temp_dir.join(format!("edit_{request_id}_image.png"));
    let mask_path = temp_dir.join(format!("edit_{request_id}_mask.png"));

    let image_bytes = decode_field("image", image_data_uri)?;
    let mask_bytes = decode_field("mask", mask_data_uri)?;

    std::fs::write(&image_path, &image_bytes)?;

    match invert_and_save_mask(&mask_bytes, &mask_path) {
        Ok(()) => {}
        Err(e) => {
            // The source image was already written; don't leave it behind.
            if let Err(rm) = std::fs::remove_file(&image_path) {
                warn!("Failed to remove partial artifact {}: {}", image_path.display(), rm);
            }
            return Err(e);
        }
    }

    info!("💾 Artifacts saved for request {}", request_id);
    Ok(EditArtifacts { image_path, mask_path })
}

fn invert_and_save_mask(mask_bytes: &[u8], mask_path: &Path) -> Result<(), DecodeError> {
    let mut mask = image::load_from_memory(mask_bytes)?.to_luma8();
    image::imageops::invert(&mut mask);
    mask.save(mask_path)?;
    Ok(())
}

/// Best-effort removal of both artifacts. Runs on every edit outcome; a
/// failed delete is logged and never overrides the request's result.
pub fn cleanup_artifacts(artifacts: &EditArtifacts) {
    for path in [&artifacts.image_path, &artifacts.mask_path] {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("🧹 Failed to clean up artifact {}: {}", path.display(), e);
        }
    }
}
