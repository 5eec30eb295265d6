//! Upload, import, export and download through the staging area
//! `<upload_dir>/<title>/<folder>/`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{validation, Editor, EditorError, EditorResult};
use crate::document::NodeId;
use crate::error::validation::{validate_file_name, validate_folder_name};
use crate::error::{AppError, AppResult};
use crate::images::ImagesHelper;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub created: Vec<NodeId>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> EditorError + '_ {
    move |source| EditorError::Io { path: path.to_path_buf(), source }
}

fn checked(result: AppResult<()>, field: &str) -> EditorResult<()> {
    result.map_err(|e| match e {
        AppError::ValidationError { message, .. } => validation(field, message),
        other => validation(field, other.to_string()),
    })
}

fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

impl Editor {
    pub fn staging_dir(&self, folder: &str) -> PathBuf {
        self.env.settings.upload_dir.join(self.layout.title()).join(folder)
    }

    fn image_folder(&self, folder: &str) -> EditorResult<PathBuf> {
        checked(validate_folder_name(folder), "folder")?;
        self.layout
            .folder(folder)
            .ok_or_else(|| validation("folder", format!("unknown image folder {}", folder)))
    }

    /// Stores an uploaded file in the staging folder for `folder`.
    pub fn upload_file(&mut self, folder: &str, name: &str, bytes: &[u8]) -> EditorResult<PathBuf> {
        self.require_loaded()?;
        checked(validate_file_name(name), "name")?;
        self.image_folder(folder)?;
        if bytes.is_empty() {
            return Err(validation("file", "no file uploaded"));
        }
        let dir = self.staging_dir(folder);
        let target = dir.join(name);
        if target.exists() {
            return Err(validation("name", format!("{} has already been uploaded", name)));
        }
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        fs::write(&target, bytes).map_err(io_error(&target))?;
        tracing::info!("Uploaded {} for process {}", target.display(), self.layout.id());
        Ok(target)
    }

    pub fn staged_files(&self, folder: &str) -> Vec<String> {
        list_files(&self.staging_dir(folder))
    }

    /// Moves the staged files into `folder`. New master images become pages; with
    /// `insert_after` they are placed right behind that page.
    pub fn import_files(&mut self, folder: &str, insert_after: Option<NodeId>) -> EditorResult<ImportReport> {
        self.require_loaded()?;
        let target_dir = self.image_folder(folder)?;
        let staging = self.staging_dir(folder);
        let names = list_files(&staging);
        if names.is_empty() {
            return Err(validation("files", "no uploaded files to import"));
        }
        if let Some(existing) = names.iter().find(|n| target_dir.join(n).exists()) {
            return Err(validation("files", format!("{} already exists in {}", existing, folder)));
        }
        if let Some(after) = insert_after {
            let doc = self.doc()?;
            if !doc.pages().contains(&after) {
                return Err(EditorError::NotFound(format!("page {}", after)));
            }
        }

        let mut report = ImportReport::default();
        for name in &names {
            let from = staging.join(name);
            let to = target_dir.join(name);
            match move_file(&from, &to) {
                Ok(()) => report.imported.push(name.clone()),
                Err(e) => self.warn(format!("{} could not be imported: {}", name, e)),
            }
        }
        if let Err(e) = fs::remove_dir(&staging) {
            tracing::debug!("Staging folder {} kept: {}", staging.display(), e);
        }
        tracing::info!("Imported {} file(s) into {}", report.imported.len(), target_dir.display());
        self.info(format!("{} file(s) imported into {}", report.imported.len(), folder));

        if target_dir == self.layout.tif_dir() {
            let doc = self.document.as_mut().ok_or(EditorError::NotLoaded)?;
            let reconciled = ImagesHelper::new(&self.env.settings.images, &self.ruleset)
                .create_pagination(doc, &self.layout, None)?;
            if let Some(after) = insert_after {
                let root = doc.physical_root().ok_or(EditorError::NotLoaded)?;
                for (offset, &page) in reconciled.created.iter().enumerate() {
                    doc.detach(page)?;
                    let at = doc.children(root).iter().position(|&c| c == after).unwrap_or(0) + 1 + offset;
                    doc.attach(root, page, Some(at))?;
                }
                doc.renumber_pages();
            }
            self.env.metrics.add_pages_created(reconciled.created.len() as u64);
            report.created = reconciled.created;
        }

        self.finish_mutation()?;
        Ok(report)
    }

    /// Copies every file of `folder` into its staging folder for download.
    pub fn export_files(&mut self, folder: &str) -> EditorResult<Vec<String>> {
        self.require_loaded()?;
        let source_dir = self.image_folder(folder)?;
        let staging = self.staging_dir(folder);
        fs::create_dir_all(&staging).map_err(io_error(&staging))?;
        let mut exported = Vec::new();
        for name in list_files(&source_dir) {
            let to = staging.join(&name);
            match fs::copy(source_dir.join(&name), &to) {
                Ok(_) => exported.push(name),
                Err(e) => self.warn(format!("{} could not be exported: {}", name, e)),
            }
        }
        tracing::info!("Exported {} file(s) from {}", exported.len(), source_dir.display());
        Ok(exported)
    }

    /// Reads a staged file.
    pub fn download_file(&self, folder: &str, name: &str) -> EditorResult<Vec<u8>> {
        self.require_loaded()?;
        checked(validate_folder_name(folder), "folder")?;
        checked(validate_file_name(name), "name")?;
        let path = self.staging_dir(folder).join(name);
        if !path.is_file() {
            return Err(EditorError::NotFound(format!("file {}", name)));
        }
        fs::read(&path).map_err(io_error(&path))
    }
}
