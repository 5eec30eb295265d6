//! Reconciliation of page elements with the image files of a process.
//!
//! Keeps the physical sequence consistent with the images in a folder: pages whose
//! image vanished are relinked to unclaimed images or removed, unclaimed images
//! become new pages, and `physPageNumber` is renumbered densely afterwards.

pub mod scale;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{
    ContentFile, DigitalDocument, DocumentError, NodeId, BOUND_BOOK_TYPE, LOGICAL_PAGE_NUMBER, LOGICAL_PHYSICAL,
    PAGE_TYPE, PATH_IMAGE_FILES, PHYS_PAGE_NUMBER,
};
use crate::paginator::{roman, UNCOUNTED_LABEL};
use crate::process::ProcessLayout;
use crate::ruleset::Ruleset;

/// Filename prefix for which the gap/drift validation applies.
pub const DEFAULT_IMAGE_PREFIX: &str = r"\d{8}";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image folder {0} does not exist")]
    MissingFolder(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid image pattern: {0}")]
    InvalidPattern(String),
    #[error("preview could not be generated: {0}")]
    Scale(String),
    #[error("content server error: {0}")]
    ContentServer(String),
    #[error("document has no logical root")]
    MissingLogicalRoot,
    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSorting {
    #[default]
    Number,
    Alphanumeric,
}

/// Logical label given to pages created for new images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPagination {
    Arabic,
    Roman,
    #[default]
    Uncounted,
}

impl DefaultPagination {
    pub fn label(self, number: usize) -> String {
        match self {
            DefaultPagination::Arabic => number.to_string(),
            DefaultPagination::Roman => roman::format(number as u32),
            DefaultPagination::Uncounted => UNCOUNTED_LABEL.to_string(),
        }
    }
}

/// Orders image file names. `Number` compares numeric stems by value.
pub fn compare_names(sorting: ImageSorting, a: &str, b: &str) -> Ordering {
    match sorting {
        ImageSorting::Alphanumeric => a.cmp(b),
        ImageSorting::Number => {
            let number = |name: &str| file_stem(name).parse::<u64>().ok();
            match (number(a), number(b)) {
                (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                _ => a.cmp(b),
            }
        }
    }
}

pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageValidation {
    pub valid: bool,
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub relinked: Vec<NodeId>,
    /// Filename check run when the physical root was created.
    pub validation: Option<ImageValidation>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.relinked.is_empty()
    }
}

/// Image naming and ordering rules.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    patterns: GlobSet,
    prefix: String,
    prefix_regex: Regex,
    pub sorting: ImageSorting,
    pub default_pagination: DefaultPagination,
}

impl ImageSettings {
    pub fn new(
        patterns: &[String],
        prefix: &str,
        sorting: ImageSorting,
        default_pagination: DefaultPagination,
    ) -> Result<Self, ImageError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(&pattern.to_ascii_lowercase())
                .map_err(|e| ImageError::InvalidPattern(format!("{}: {}", pattern, e)))?;
            builder.add(glob);
        }
        let patterns = builder.build().map_err(|e| ImageError::InvalidPattern(e.to_string()))?;
        let prefix_regex =
            Regex::new(&format!("^{}", prefix)).map_err(|e| ImageError::InvalidPattern(e.to_string()))?;
        Ok(Self { patterns, prefix: prefix.to_string(), prefix_regex, sorting, default_pagination })
    }

    pub fn is_image(&self, name: &str) -> bool {
        self.patterns.is_match(name.to_ascii_lowercase())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Image file names in `dir`, sorted with the configured comparator.
    pub fn list_images(&self, dir: &Path) -> Result<Vec<String>, ImageError> {
        if !dir.is_dir() {
            return Err(ImageError::MissingFolder(dir.to_path_buf()));
        }
        let entries = fs::read_dir(dir).map_err(|source| ImageError::Io { path: dir.to_path_buf(), source })?;
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| self.is_image(name))
            .collect();
        names.sort_by(|a, b| compare_names(self.sorting, a, b));
        Ok(names)
    }

    /// Checks the file names of `dir`.
    ///
    /// With the default eight-digit prefix every file must carry its 1-based position
    /// plus the accumulated drift. A mismatch is reported once and the drift adjusted,
    /// so a single gap does not flag every following file. A non-numeric name stops
    /// the check.
    pub fn check_images_valid(&self, dir: &Path) -> ImageValidation {
        let names = match self.list_images(dir) {
            Ok(names) => names,
            Err(e) => return ImageValidation { valid: false, problems: vec![e.to_string()] },
        };
        if names.is_empty() {
            return ImageValidation { valid: false, problems: vec![format!("no images found in {}", dir.display())] };
        }

        let mut problems = Vec::new();
        if self.prefix == DEFAULT_IMAGE_PREFIX {
            let mut sorted = names;
            sorted.sort();
            let mut drift: i64 = 0;
            for (index, name) in sorted.iter().enumerate() {
                let Some(found) = self.prefix_regex.find(name).and_then(|m| m.as_str().parse::<i64>().ok()) else {
                    problems.push(format!("file name {} is not numeric", name));
                    break;
                };
                let expected = index as i64 + 1 + drift;
                if found != expected {
                    problems.push(format!("expected image {:08}, found {}", expected, name));
                    drift = found - (index as i64 + 1);
                }
            }
        } else {
            for name in &names {
                if !self.prefix_regex.is_match(name) {
                    problems.push(format!("file name {} does not match {}", name, self.prefix));
                }
            }
        }

        if !problems.is_empty() {
            tracing::warn!("Image validation of {} found {} problem(s)", dir.display(), problems.len());
        }
        ImageValidation { valid: problems.is_empty(), problems }
    }
}

/// Binds pages of a document to the images of a folder.
pub struct ImagesHelper<'a> {
    settings: &'a ImageSettings,
    ruleset: &'a Ruleset,
}

impl<'a> ImagesHelper<'a> {
    pub fn new(settings: &'a ImageSettings, ruleset: &'a Ruleset) -> Self {
        Self { settings, ruleset }
    }

    /// Reconciles the physical sequence of `doc` with the images in `folder`
    /// (the master folder if `None`). Fails without touching the document if
    /// the folder does not exist.
    pub fn create_pagination(
        &self,
        doc: &mut DigitalDocument,
        layout: &ProcessLayout,
        folder: Option<&Path>,
    ) -> Result<ReconcileReport, ImageError> {
        let folder = folder.map(Path::to_path_buf).unwrap_or_else(|| layout.tif_dir());
        let images = self.settings.list_images(&folder)?;
        let logical_root = doc.logical_root().ok_or(ImageError::MissingLogicalRoot)?;
        let mut report = ReconcileReport::default();

        let physical_root = match doc.physical_root() {
            Some(root) => root,
            None => {
                let root = doc.create(BOUND_BOOK_TYPE);
                doc.set_physical_root(root)?;
                doc.set_value(root, PATH_IMAGE_FILES, &layout.image_path_uri())?;
                report.validation = Some(self.settings.check_images_valid(&folder));
                tracing::info!("Created physical root for process {}", layout.id());
                root
            }
        };

        let on_disk: HashSet<&str> = images.iter().map(String::as_str).collect();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut orphaned = Vec::new();
        for page in doc.pages() {
            let image = doc.get(page)?.image_name().map(str::to_string);
            match image {
                Some(name) if on_disk.contains(name.as_str()) && !claimed.contains(&name) => {
                    claimed.insert(name);
                }
                _ => {
                    doc.get_mut(page)?.content_file = None;
                    orphaned.push(page);
                }
            }
        }
        let unassigned: Vec<&String> = images.iter().filter(|name| !claimed.contains(*name)).collect();

        // Orphaned pages take the unclaimed images in encounter order.
        let paired = orphaned.len().min(unassigned.len());
        for (&page, name) in orphaned.iter().zip(unassigned.iter()) {
            doc.get_mut(page)?.content_file = Some(ContentFile::for_image(name));
            report.relinked.push(page);
        }
        for &page in &orphaned[paired..] {
            doc.remove_subtree(page)?;
            report.removed.push(page);
        }

        if paired < unassigned.len() {
            let target = self.reference_target(doc, logical_root);
            for name in &unassigned[paired..] {
                let number = doc.pages().len() + 1;
                let page = doc.create(PAGE_TYPE);
                doc.set_value(page, PHYS_PAGE_NUMBER, &number.to_string())?;
                doc.set_value(page, LOGICAL_PAGE_NUMBER, &self.settings.default_pagination.label(number))?;
                doc.get_mut(page)?.content_file = Some(ContentFile::for_image(name));
                doc.attach(physical_root, page, None)?;
                doc.references_mut().add(target, page, LOGICAL_PHYSICAL);
                report.created.push(page);
            }
        }

        doc.renumber_pages();
        if !report.is_noop() {
            tracing::info!(
                "Reconciled process {} with {}: {} created, {} removed, {} relinked",
                layout.id(),
                folder.display(),
                report.created.len(),
                report.removed.len(),
                report.relinked.len()
            );
        }
        Ok(report)
    }

    // Anchor roots carry no pages themselves; their first child does.
    fn reference_target(&self, doc: &DigitalDocument, logical_root: NodeId) -> NodeId {
        let root_type = doc.node(logical_root).map(|n| n.type_name.as_str()).unwrap_or_default();
        if self.ruleset.is_anchor(root_type) {
            if let Some(&first) = doc.children(logical_root).first() {
                return first;
            }
        }
        logical_root
    }
}
