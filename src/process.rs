//! Directory layout and metadata file IO of one digitization process.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::document::{xml, DigitalDocument, DocumentError};

pub const METADATA_FILE: &str = "meta.xml";

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("metadata file {0} does not exist")]
    MissingMetadata(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ProcessError + '_ {
    move |source| ProcessError::Io { path: path.to_path_buf(), source }
}

/// Paths of a process below `<processes_root>/<id>/`.
#[derive(Debug, Clone)]
pub struct ProcessLayout {
    id: i64,
    title: String,
    dir: PathBuf,
    tif_suffix: String,
    orig_prefix: String,
    metadata_backups: usize,
}

impl ProcessLayout {
    pub fn new(processes_root: &Path, id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            dir: processes_root.join(id.to_string()),
            tif_suffix: "tif".to_string(),
            orig_prefix: "orig_".to_string(),
            metadata_backups: 3,
        }
    }

    pub fn with_naming(mut self, tif_suffix: &str, orig_prefix: &str) -> Self {
        self.tif_suffix = tif_suffix.to_string();
        self.orig_prefix = orig_prefix.to_string();
        self
    }

    pub fn with_backups(mut self, backups: usize) -> Self {
        self.metadata_backups = backups;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn process_dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir.join("images")
    }

    /// Master image folder, `images/<title>_<suffix>`.
    pub fn tif_dir(&self) -> PathBuf {
        self.images_dir().join(self.tif_folder_name())
    }

    pub fn tif_folder_name(&self) -> String {
        format!("{}_{}", self.title, self.tif_suffix)
    }

    pub fn orig_dir(&self) -> PathBuf {
        self.images_dir().join(format!("{}{}_{}", self.orig_prefix, self.title, self.tif_suffix))
    }

    pub fn ocr_dir(&self) -> PathBuf {
        self.dir.join("ocr")
    }

    /// `file://` URI of the master folder as stored in `pathimagefiles`.
    pub fn image_path_uri(&self) -> String {
        let path = self.tif_dir().to_string_lossy().replace('\\', "/");
        if cfg!(windows) {
            format!("file:/{}", path)
        } else {
            format!("file://{}", path)
        }
    }

    /// All image-bearing folders: the direct sub-folders of `images/`.
    pub fn image_folders(&self) -> Vec<PathBuf> {
        subfolders(&self.images_dir())
    }

    pub fn ocr_folders(&self) -> Vec<PathBuf> {
        subfolders(&self.ocr_dir())
    }

    /// Resolves an image folder by its directory name.
    pub fn folder(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return None;
        }
        let path = self.images_dir().join(name);
        path.is_dir().then_some(path)
    }

    pub fn read_metadata(&self) -> Result<DigitalDocument, ProcessError> {
        let path = self.metadata_file();
        if !path.exists() {
            return Err(ProcessError::MissingMetadata(path));
        }
        let text = fs::read_to_string(&path).map_err(io_err(&path))?;
        let doc = xml::parse(&text)?;
        tracing::debug!("Read {} ({} elements)", path.display(), doc.len());
        Ok(doc)
    }

    /// Writes the metadata file, rotating the previous versions into
    /// `meta.xml.1 .. meta.xml.N`.
    pub fn write_metadata(&self, doc: &DigitalDocument) -> Result<(), ProcessError> {
        let path = self.metadata_file();
        let text = xml::write(doc)?;
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        if path.exists() && self.metadata_backups > 0 {
            self.rotate_backups(&path)?;
        }

        let tmp = self.dir.join(format!("{}.tmp", METADATA_FILE));
        fs::write(&tmp, text).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_err(&path))?;
        tracing::info!("Wrote metadata file {}", path.display());
        Ok(())
    }

    fn rotate_backups(&self, path: &Path) -> Result<(), ProcessError> {
        let backup = |n: usize| self.dir.join(format!("{}.{}", METADATA_FILE, n));
        for n in (1..self.metadata_backups).rev() {
            let from = backup(n);
            if from.exists() {
                let to = backup(n + 1);
                fs::rename(&from, &to).map_err(io_err(&to))?;
            }
        }
        let first = backup(1);
        fs::copy(path, &first).map_err(io_err(&first))?;
        Ok(())
    }

    /// Creates the folder skeleton and an initial metadata file.
    pub fn initialize(&self, doc: &DigitalDocument) -> Result<(), ProcessError> {
        for dir in [self.tif_dir(), self.ocr_dir()] {
            fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        }
        if !self.metadata_file().exists() {
            self.write_metadata(doc)?;
        }
        Ok(())
    }
}

fn subfolders(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut folders: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    folders.sort();
    folders
}
