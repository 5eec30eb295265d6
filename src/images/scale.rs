//! Preview rendering: scaled and rotated PNGs of page images.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use image::imageops::FilterType;
use image::ImageFormat;

use super::ImageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Scale in percent of the original size.
    pub scale_percent: u32,
    /// Clockwise rotation in degrees, a multiple of 90.
    pub rotation: u32,
}

/// Renders a preview file for a page image.
pub trait PreviewScaler: Send + Sync {
    fn scale(&self, request: &PreviewRequest) -> Result<(), ImageError>;
}

fn ensure_parent(request: &PreviewRequest) -> Result<(), ImageError> {
    if let Some(parent) = request.target.parent() {
        fs::create_dir_all(parent).map_err(|source| ImageError::Io { path: parent.to_path_buf(), source })?;
    }
    Ok(())
}

/// Scales in-process with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedScaler;

impl PreviewScaler for EmbeddedScaler {
    fn scale(&self, request: &PreviewRequest) -> Result<(), ImageError> {
        let img = image::open(&request.source)
            .map_err(|e| ImageError::Scale(format!("{}: {}", request.source.display(), e)))?;
        let img = match request.rotation % 360 {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        };
        let percent = request.scale_percent.max(1);
        let width = ((img.width() as u64 * percent as u64) / 100).max(1) as u32;
        let height = ((img.height() as u64 * percent as u64) / 100).max(1) as u32;
        let scaled = img.resize_exact(width, height, FilterType::Triangle);

        ensure_parent(request)?;
        scaled
            .save_with_format(&request.target, ImageFormat::Png)
            .map_err(|e| ImageError::Scale(format!("{}: {}", request.target.display(), e)))
    }
}

/// Delegates scaling to an external content server
/// (`?action=image&sourcepath=…&format=png&scale=…&rotate=…`).
pub struct ContentServerScaler {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl ContentServerScaler {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ImageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ImageError::ContentServer(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { base_url: base_url.to_string(), client })
    }
}

impl PreviewScaler for ContentServerScaler {
    fn scale(&self, request: &PreviewRequest) -> Result<(), ImageError> {
        let source = format!("file://{}", request.source.to_string_lossy().replace('\\', "/"));
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("action", "image".to_string()),
                ("sourcepath", source),
                ("format", "png".to_string()),
                ("scale", request.scale_percent.to_string()),
                ("rotate", request.rotation.to_string()),
            ])
            .send()
            .map_err(|e| ImageError::ContentServer(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ImageError::ContentServer(format!("HTTP {} from {}", response.status(), self.base_url)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| ImageError::ContentServer(format!("Failed to read response: {}", e)))?;
        ensure_parent(request)?;
        fs::write(&request.target, &bytes).map_err(|source| ImageError::Io { path: request.target.clone(), source })
    }
}
