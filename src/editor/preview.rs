//! Preview navigation and rendering.

use std::path::PathBuf;

use serde::Serialize;

use super::{validation, Editor, EditorResult};
use crate::images::file_stem;
use crate::images::scale::PreviewRequest;

pub const MAX_ZOOM: u32 = 400;

#[derive(Debug, Clone, Default)]
pub(crate) struct PreviewState {
    pub(crate) index: usize,
    counter: u64,
    rotation: u32,
    zoom: u32,
    folder: Option<String>,
    file: Option<String>,
}

impl PreviewState {
    pub(crate) fn new(zoom: u32) -> Self {
        Self { zoom, ..Self::default() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewInfo {
    pub index: usize,
    pub page_count: usize,
    pub image: Option<String>,
    /// Served under `/previews/`.
    pub file: Option<String>,
    pub rotation: u32,
    pub zoom: u32,
    pub folder: Option<String>,
}

impl Editor {
    /// Moves the preview by `offset` pages, clamped to the image list.
    pub fn navigate(&mut self, offset: i64) -> EditorResult<PreviewInfo> {
        self.require_loaded()?;
        let target = (self.preview.index as i64).saturating_add(offset).max(0) as usize;
        self.render_preview(target)
    }

    /// Jumps to the 1-based `page`.
    pub fn go_to(&mut self, page: usize) -> EditorResult<PreviewInfo> {
        self.require_loaded()?;
        self.render_preview(page.saturating_sub(1))
    }

    pub fn rotate_left(&mut self) -> EditorResult<PreviewInfo> {
        self.require_loaded()?;
        self.preview.rotation = (self.preview.rotation + 270) % 360;
        self.render_preview(self.preview.index)
    }

    pub fn rotate_right(&mut self) -> EditorResult<PreviewInfo> {
        self.require_loaded()?;
        self.preview.rotation = (self.preview.rotation + 90) % 360;
        self.render_preview(self.preview.index)
    }

    pub fn set_zoom(&mut self, percent: u32) -> EditorResult<PreviewInfo> {
        self.require_loaded()?;
        if percent == 0 || percent > MAX_ZOOM {
            return Err(validation("zoom", format!("zoom must be between 1 and {}", MAX_ZOOM)));
        }
        self.preview.zoom = percent;
        self.render_preview(self.preview.index)
    }

    /// Shows previews from another image folder; `None` returns to the master folder.
    pub fn select_folder(&mut self, name: Option<&str>) -> EditorResult<PreviewInfo> {
        self.require_loaded()?;
        match name {
            Some(name) if self.layout.folder(name).is_none() => {
                return Err(validation("folder", format!("unknown image folder {}", name)));
            }
            _ => self.preview.folder = name.map(str::to_string),
        }
        self.render_preview(self.preview.index)
    }

    /// Names of the image folders of the process.
    pub fn folders(&self) -> Vec<String> {
        self.layout
            .image_folders()
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }

    // Re-renders only if a preview is already on screen.
    pub(crate) fn refresh_preview_at(&mut self, index: usize) {
        self.preview.index = index;
        if self.preview.file.is_some() {
            let _ = self.render_preview(index);
        }
    }

    fn render_preview(&mut self, index: usize) -> EditorResult<PreviewInfo> {
        let tif_dir = self.layout.tif_dir();
        let images = match self.env.settings.images.list_images(&tif_dir) {
            Ok(images) => images,
            Err(e) => {
                self.warn(format!("no preview available: {}", e));
                Vec::new()
            }
        };
        if images.is_empty() {
            self.preview.index = 0;
            self.preview.file = None;
            return Ok(self.preview_info(&images));
        }

        self.preview.index = index.min(images.len() - 1);
        let image = &images[self.preview.index];
        let source = self.preview_source(&tif_dir, image);

        self.preview.counter += 1;
        let name = format!("{}_{}.png", self.session_id, self.preview.counter);
        let request = PreviewRequest {
            source,
            target: self.env.settings.preview_dir.join(&name),
            scale_percent: self.preview.zoom,
            rotation: self.preview.rotation,
        };
        match self.env.scaler.scale(&request) {
            Ok(()) => {
                self.env.metrics.inc_previews_generated();
                self.preview.file = Some(name);
            }
            Err(e) => {
                self.preview.file = None;
                self.warn(format!("preview could not be generated: {}", e));
            }
        }
        Ok(self.preview_info(&images))
    }

    // Looks the image up by stem in the selected folder and falls back to the
    // master folder.
    fn preview_source(&mut self, tif_dir: &std::path::Path, image: &str) -> PathBuf {
        let fallback = tif_dir.join(image);
        let Some(folder) = self.preview.folder.clone() else {
            return fallback;
        };
        let stem = file_stem(image);
        let found = self.layout.folder(&folder).and_then(|dir| {
            std::fs::read_dir(&dir).ok().and_then(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .find(|p| p.file_name().map(|n| file_stem(&n.to_string_lossy()) == stem).unwrap_or(false))
            })
        });
        match found {
            Some(path) => path,
            None => {
                self.warn(format!("{} has no image for {}, showing the master image", folder, stem));
                fallback
            }
        }
    }

    fn preview_info(&self, images: &[String]) -> PreviewInfo {
        PreviewInfo {
            index: self.preview.index,
            page_count: images.len(),
            image: images.get(self.preview.index).cloned(),
            file: self.preview.file.clone(),
            rotation: self.preview.rotation,
            zoom: self.preview.zoom,
            folder: self.preview.folder.clone(),
        }
    }
}
