use anyhow::{Context, Result, anyhow};
use std::path::Path;

pub const MP3_MIME: &str = "audio/mpeg";
pub const WAV_MIME: &str = "audio/wav";

/// Uploaded image handed to the pipeline. Owned by the caller; the pipeline only borrows it.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

pub fn load_image(path: &Path) -> Result<ImageInput> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read image file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string());
    let mime = detect_image_mime(&bytes, Some(path))?;
    Ok(ImageInput { bytes, mime, name })
}

pub fn image_from_bytes(bytes: Vec<u8>, name: Option<&str>) -> Result<ImageInput> {
    if bytes.is_empty() {
        return Err(anyhow!("image data is empty"));
    }
    let mime = detect_image_mime(&bytes, name.map(Path::new))?;
    Ok(ImageInput {
        bytes,
        mime,
        name: name.map(|value| value.to_string()),
    })
}

fn detect_image_mime(bytes: &[u8], path: Option<&Path>) -> Result<String> {
    if let Some(kind) = infer::get(bytes) {
        let detected = kind.mime_type();
        if detected.starts_with("image/") {
            return Ok(detected.to_string());
        }
        return Err(anyhow!("expected image data (detected '{}')", detected));
    }

    if let Some(mime) = extension_lower(path).and_then(|ext| mime_from_extension(&ext)) {
        return Ok(mime.to_string());
    }

    Err(anyhow!(
        "unable to detect image type for '{}'",
        path.map(|value| value.display().to_string())
            .unwrap_or_else(|| "upload".to_string())
    ))
}

fn extension_lower(path: Option<&Path>) -> Option<String> {
    path.and_then(|path| path.extension())
        .and_then(|value| value.to_str())
        .map(|value| value.to_lowercase())
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tiff" | "tif" => Some("image/tiff"),
        _ => None,
    }
}

pub fn extension_from_mime(mime: &str) -> Option<&'static str> {
    match mime {
        MP3_MIME | "audio/mp3" => Some("mp3"),
        WAV_MIME | "audio/x-wav" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" => Some("flac"),
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        _ => None,
    }
}
