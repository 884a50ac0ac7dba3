// Upscale model and conversion format catalogs
use crate::models::{ConvertFormat, UpscaleModel};
use std::path::Path;

pub const DEFAULT_UPSCALE_MODEL: &str = "realesrgan-x4plus";

const UPSCALE_MODELS: [(&str, &str); 5] = [
    ("realesrgan-x4plus", "RealESRGAN x4 Plus"),
    ("realesrgan-x4plus-anime", "RealESRGAN x4 Plus Anime"),
    ("realesr-animevideov3-x2", "RealESR Anime x2"),
    ("realesr-animevideov3-x3", "RealESR Anime x3"),
    ("realesr-animevideov3-x4", "RealESR Anime x4"),
];

const CONVERT_FORMATS: [(&str, &str, &str); 6] = [
    ("jpg", "JPG (JPEG)", "image/jpeg"),
    ("png", "PNG", "image/png"),
    ("webp", "WebP", "image/webp"),
    ("bmp", "BMP", "image/bmp"),
    ("gif", "GIF", "image/gif"),
    ("svg", "SVG", "image/svg+xml"),
];

/// Scale factor the worker derives from the model id
pub fn model_scale(model_id: &str) -> u8 {
    if model_id.contains("x2") {
        2
    } else if model_id.contains("x3") {
        3
    } else {
        4
    }
}

/// A model counts as downloaded when both its `.param` and `.bin` files exist
pub fn upscale_models(models_dir: &Path) -> Vec<UpscaleModel> {
    UPSCALE_MODELS
        .iter()
        .map(|(id, name)| UpscaleModel {
            id: id.to_string(),
            name: name.to_string(),
            scale: model_scale(id),
            is_downloaded: models_dir.join(format!("{}.param", id)).exists()
                && models_dir.join(format!("{}.bin", id)).exists(),
        })
        .collect()
}

pub fn convert_formats() -> Vec<ConvertFormat> {
    CONVERT_FORMATS
        .iter()
        .map(|(id, label, mime)| ConvertFormat {
            id: id.to_string(),
            label: label.to_string(),
            mime_type: mime.to_string(),
        })
        .collect()
}
