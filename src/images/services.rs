use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const UPLOAD_DIR: &str = "uploads/recipe";

const ALLOWED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// What the upload turned out to be after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedImage {
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Detects the format from magic bytes and fully decodes the payload.
pub fn inspect_image(data: &[u8]) -> AppResult<DetectedImage> {
    if data.is_empty() {
        return Err(AppError::validation("No image provided"));
    }
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| AppError::validation(format!("Failed to read image: {e}")))?;

    let format = reader
        .format()
        .ok_or_else(|| AppError::validation("Upload a valid image"))?;
    if !ALLOWED_FORMATS.contains(&format) {
        return Err(AppError::validation(format!(
            "Unsupported image format: {format:?}. Allowed: JPEG, PNG, GIF, WebP"
        )));
    }

    reader
        .decode()
        .map_err(|e| AppError::validation(format!("Upload a valid image: {e}")))?;

    Ok(DetectedImage {
        content_type: format.to_mime_type(),
        extension: format.extensions_str().first().copied().unwrap_or("bin"),
    })
}

/// `uploads/recipe/{uuid}.{ext}`, `ext` being everything after the last `.`
/// of the uploaded file's base name (the whole name when it has none). An
/// absent name or an empty suffix (`"trailing."`) falls back to the detected
/// format's extension.
pub fn recipe_image_key(id: Uuid, filename: Option<&str>, fallback_ext: &str) -> String {
    let base = filename
        .map(|f| f.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(f))
        .unwrap_or("");
    let ext = match base.rsplit('.').next() {
        Some(ext) if !ext.is_empty() => ext,
        _ => fallback_ext,
    };
    format!("{UPLOAD_DIR}/{id}.{ext}")
}

#[cfg(test)]
pub(crate) fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(10, 10, image::Rgb([200, 40, 40]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .expect("encode sample png");
    buf.into_inner()
}

#[cfg(test)]
mod image_tests {
    use super::*;

    #[test]
    fn key_keeps_original_extension() {
        let id = Uuid::new_v4();
        assert_eq!(
            recipe_image_key(id, Some("myimage.jpg"), "png"),
            format!("uploads/recipe/{id}.jpg")
        );
        assert_eq!(
            recipe_image_key(id, Some("archive.tar.GZ"), "png"),
            format!("uploads/recipe/{id}.GZ")
        );
    }

    #[test]
    fn key_without_dot_uses_whole_name() {
        let id = Uuid::new_v4();
        assert_eq!(
            recipe_image_key(id, Some("photo"), "png"),
            format!("uploads/recipe/{id}.photo")
        );
    }

    #[test]
    fn key_strips_directories_and_falls_back() {
        let id = Uuid::new_v4();
        assert_eq!(
            recipe_image_key(id, Some("../../etc/cat.webp"), "png"),
            format!("uploads/recipe/{id}.webp")
        );
        assert_eq!(
            recipe_image_key(id, Some("C:\\pics\\x.gif"), "png"),
            format!("uploads/recipe/{id}.gif")
        );
        assert_eq!(recipe_image_key(id, None, "png"), format!("uploads/recipe/{id}.png"));
    }

    #[test]
    fn trailing_dot_uses_detected_extension() {
        let id = Uuid::new_v4();
        assert_eq!(
            recipe_image_key(id, Some("trailing."), "jpg"),
            format!("uploads/recipe/{id}.jpg")
        );
        assert_eq!(
            recipe_image_key(id, Some("dir/."), "webp"),
            format!("uploads/recipe/{id}.webp")
        );
        assert!(!recipe_image_key(id, Some("x."), "gif").ends_with('.'));
    }

    #[test]
    fn fresh_ids_give_distinct_keys() {
        let a = recipe_image_key(Uuid::new_v4(), Some("a.png"), "png");
        let b = recipe_image_key(Uuid::new_v4(), Some("a.png"), "png");
        assert_ne!(a, b);
    }

    #[test]
    fn inspect_accepts_png() {
        let detected = inspect_image(&sample_png()).unwrap();
        assert_eq!(detected.content_type, "image/png");
        assert_eq!(detected.extension, "png");
    }

    #[test]
    fn inspect_rejects_garbage_and_empty() {
        assert!(matches!(inspect_image(b"notimage"), Err(AppError::Validation(_))));
        assert!(matches!(inspect_image(&[]), Err(AppError::Validation(_))));
    }

    #[test]
    fn inspect_rejects_truncated_png() {
        let png = sample_png();
        let truncated = &png[..png.len() / 2];
        assert!(matches!(inspect_image(truncated), Err(AppError::Validation(_))));
    }
}
