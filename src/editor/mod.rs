//! Session-scoped structure tree editor.
//!
//! An [`Editor`] owns the in-memory document of one process for one user. Every
//! mutating operation renews the process lock afterwards; if the lock was lost the
//! session moves to [`SessionState::LockExpired`] and the already applied change
//! stays in memory until the user reloads.
//!
//! ```text
//! UNLOADED -> LOADING -> LOADED(Metadaten) <-> LOADED(Paginierung)
//!                             |
//!                             v
//!                        LOCK_EXPIRED --reload--> LOADING
//! ```

pub mod files;
pub mod pages;
pub mod preview;
pub mod structure;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::document::{DigitalDocument, DocumentError, Metadata, NodeId, Person, REPRESENTATIVE};
use crate::images::scale::PreviewScaler;
use crate::images::{ImageError, ImageSettings, ImagesHelper};
use crate::locking::{LockError, LockManager};
use crate::metrics::Metrics;
use crate::paginator::PaginationError;
use crate::process::{ProcessError, ProcessLayout};
use crate::ruleset::Ruleset;

use self::preview::PreviewState;

/// Next view for the client. Empty string means "stay".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Stay,
    StructureTree,
    Pagination,
    LockExpired,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Stay => "",
            View::StructureTree => "Metadaten3links",
            View::Pagination => "Metadaten3rechts",
            View::LockExpired => "SperrungAbgelaufen",
        }
    }
}

impl Serialize for View {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Unloaded,
    Loading,
    Loaded,
    LockExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorPanel {
    Metadaten,
    Paginierung,
}

impl EditorPanel {
    pub fn view(self) -> View {
        match self {
            EditorPanel::Metadaten => View::StructureTree,
            EditorPanel::Paginierung => View::Pagination,
        }
    }
}

/// Pending "add" form on the metadata panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddMode {
    #[default]
    None,
    Metadata,
    Person,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no document loaded")]
    NotLoaded,
    #[error("the lock on this process has expired")]
    LockExpired,
    #[error("metadata is already being read")]
    LoadInProgress,
    #[error("process is locked by {holder}")]
    Locked { holder: String },
    #[error("{0}")]
    NotAllowed(String),
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("metadata could not be loaded: {0}")]
    LoadFailed(String),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<LockError> for EditorError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::HeldByOther { holder, .. } => EditorError::Locked { holder },
        }
    }
}

pub(crate) fn validation(field: &str, message: impl Into<String>) -> EditorError {
    EditorError::Validation { field: field.to_string(), message: message.into() }
}

pub type EditorResult<T> = Result<T, EditorError>;

/// Settings shared by all editor sessions.
pub struct EditorSettings {
    pub processes_root: PathBuf,
    pub upload_dir: PathBuf,
    pub preview_dir: PathBuf,
    pub images: ImageSettings,
    pub tif_suffix: String,
    pub orig_prefix: String,
    pub metadata_backups: usize,
    pub preview_zoom: u32,
    pub pagination_separator: String,
    pub representative_enabled: bool,
}

impl EditorSettings {
    pub fn layout(&self, process_id: i64, title: &str) -> ProcessLayout {
        ProcessLayout::new(&self.processes_root, process_id, title)
            .with_naming(&self.tif_suffix, &self.orig_prefix)
            .with_backups(self.metadata_backups)
    }
}

/// Services an editor needs from the application.
#[derive(Clone)]
pub struct EditorEnv {
    pub locks: LockManager,
    pub metrics: Metrics,
    pub settings: Arc<EditorSettings>,
    pub scaler: Arc<dyn PreviewScaler>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessStatistics {
    pub docstruct_count: i64,
    pub metadata_count: i64,
    pub image_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub process_id: i64,
    pub title: String,
    pub user: String,
    pub state: SessionState,
    pub panel: EditorPanel,
    pub add_mode: AddMode,
    pub current: Option<NodeId>,
    pub page_count: usize,
    pub representative: Option<usize>,
}

pub struct Editor {
    session_id: Uuid,
    user: String,
    layout: ProcessLayout,
    ruleset: Arc<Ruleset>,
    env: EditorEnv,
    state: SessionState,
    panel: EditorPanel,
    document: Option<DigitalDocument>,
    current: Option<NodeId>,
    add_mode: AddMode,
    representative: Option<usize>,
    preview: PreviewState,
    messages: Vec<Message>,
}

impl Editor {
    pub fn new(session_id: Uuid, user: &str, layout: ProcessLayout, ruleset: Arc<Ruleset>, env: EditorEnv) -> Self {
        let preview = PreviewState::new(env.settings.preview_zoom);
        Self {
            session_id,
            user: user.to_string(),
            layout,
            ruleset,
            env,
            state: SessionState::Unloaded,
            panel: EditorPanel::Metadaten,
            document: None,
            current: None,
            add_mode: AddMode::None,
            representative: None,
            preview,
            messages: Vec::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn layout(&self) -> &ProcessLayout {
        &self.layout
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn panel(&self) -> EditorPanel {
        self.panel
    }

    pub fn add_mode(&self) -> AddMode {
        self.add_mode
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn representative(&self) -> Option<usize> {
        self.representative
    }

    pub fn document(&self) -> Option<&DigitalDocument> {
        self.document.as_ref()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            process_id: self.layout.id(),
            title: self.layout.title().to_string(),
            user: self.user.clone(),
            state: self.state,
            panel: self.panel,
            add_mode: self.add_mode,
            current: self.current,
            page_count: self.document.as_ref().map(|d| d.pages().len()).unwrap_or(0),
            representative: self.representative,
        }
    }

    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    pub(crate) fn info(&mut self, text: impl Into<String>) {
        self.messages.push(Message { level: MessageLevel::Info, text: text.into() });
    }

    pub(crate) fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!("[{}] {}", self.layout.id(), text);
        self.messages.push(Message { level: MessageLevel::Warning, text });
    }

    pub(crate) fn require_loaded(&self) -> EditorResult<()> {
        match self.state {
            SessionState::Loaded => Ok(()),
            SessionState::LockExpired => Err(EditorError::LockExpired),
            SessionState::Unloaded | SessionState::Loading => Err(EditorError::NotLoaded),
        }
    }

    pub(crate) fn doc(&self) -> EditorResult<&DigitalDocument> {
        self.require_loaded()?;
        self.document.as_ref().ok_or(EditorError::NotLoaded)
    }

    pub(crate) fn current_node(&self) -> EditorResult<NodeId> {
        self.current.ok_or_else(|| EditorError::NotFound("current structure element".to_string()))
    }

    /// Renews the process lock after a mutation. The mutation is kept either way.
    pub(crate) fn finish_mutation(&mut self) -> EditorResult<()> {
        if self.env.locks.refresh(self.layout.id(), &self.user) {
            return Ok(());
        }
        tracing::warn!("Lock on process {} expired for {}", self.layout.id(), self.user);
        self.state = SessionState::LockExpired;
        self.env.metrics.inc_lock_expiries();
        Err(EditorError::LockExpired)
    }

    /// Reads the metadata file and builds the session. Acquires the process lock.
    pub(crate) fn load(&mut self) -> EditorResult<View> {
        self.state = SessionState::Loading;
        let process = self.layout.id();
        if let Err(e) = self.env.locks.try_acquire(process, &self.user) {
            self.state = SessionState::Unloaded;
            return Err(e.into());
        }

        match self.build_document() {
            Ok(doc) => {
                self.install(doc);
                self.env.metrics.inc_sessions_opened();
                tracing::info!("Process {} opened by {}", process, self.user);
                Ok(View::StructureTree)
            }
            Err(e) => {
                self.env.locks.release_if_holder(process, &self.user);
                self.state = SessionState::Unloaded;
                self.document = None;
                tracing::error!("Loading process {} failed: {}", process, e);
                Err(e)
            }
        }
    }

    fn build_document(&mut self) -> EditorResult<DigitalDocument> {
        let mut doc = match self.layout.read_metadata() {
            Ok(doc) => doc,
            Err(e) => return Err(EditorError::LoadFailed(e.to_string())),
        };
        let root = doc
            .logical_root()
            .ok_or_else(|| EditorError::LoadFailed("metadata file has no logical structure".to_string()))?;
        let root_type = doc.get(root)?.type_name.clone();
        if self.ruleset.docstruct_type(&root_type).is_none() {
            return Err(EditorError::LoadFailed(format!("structure type '{}' is not defined in the ruleset", root_type)));
        }

        if doc.pages().is_empty() {
            let helper = ImagesHelper::new(&self.env.settings.images, &self.ruleset);
            match helper.create_pagination(&mut doc, &self.layout, None) {
                Ok(report) => {
                    self.env.metrics.add_pages_created(report.created.len() as u64);
                    for problem in report.validation.map(|v| v.problems).unwrap_or_default() {
                        self.warn(problem);
                    }
                }
                Err(e) => self.warn(format!("initial pagination failed: {}", e)),
            }
        }

        for id in doc.logical_nodes() {
            seed_defaults(&mut doc, &self.ruleset, id)?;
        }
        Ok(doc)
    }

    fn install(&mut self, doc: DigitalDocument) {
        self.representative = if self.env.settings.representative_enabled {
            doc.physical_root()
                .and_then(|root| doc.first_value(root, REPRESENTATIVE))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&n| n >= 1)
        } else {
            None
        };
        self.current = doc.logical_root();
        self.document = Some(doc);
        self.state = SessionState::Loaded;
        self.panel = EditorPanel::Metadaten;
        self.add_mode = AddMode::None;
        self.preview = PreviewState::new(self.env.settings.preview_zoom);
    }

    pub fn statistics(&self) -> EditorResult<ProcessStatistics> {
        let doc = self.document.as_ref().ok_or(EditorError::NotLoaded)?;
        let logical = doc.logical_nodes();
        let metadata_count = logical
            .iter()
            .filter_map(|id| doc.node(*id))
            .map(|n| {
                n.metadata.iter().filter(|m| !m.value.trim().is_empty()).count()
                    + n.persons.iter().filter(|p| !p.is_empty()).count()
            })
            .sum::<usize>();
        let image_count = self.env.settings.images.list_images(&self.layout.tif_dir()).map(|v| v.len()).unwrap_or(0);
        Ok(ProcessStatistics {
            docstruct_count: logical.len() as i64,
            metadata_count: metadata_count as i64,
            image_count: image_count as i64,
        })
    }

    /// Writes the document and ends the session. On failure the session stays
    /// loaded with its unsaved state.
    pub(crate) fn save(&mut self) -> EditorResult<ProcessStatistics> {
        self.require_loaded()?;
        self.finish_mutation()?;
        let statistics = self.statistics()?;
        let mut doc = self.document.clone().ok_or(EditorError::NotLoaded)?;
        doc.compact();
        if let (true, Some(root)) = (self.env.settings.representative_enabled, doc.physical_root()) {
            match self.representative {
                Some(page) => doc.set_value(root, REPRESENTATIVE, &page.to_string())?,
                None => {
                    doc.remove_values(root, REPRESENTATIVE)?;
                }
            }
        }

        if let Err(e) = self.layout.write_metadata(&doc) {
            self.env.metrics.inc_saves_failed();
            tracing::error!("Saving process {} failed: {}", self.layout.id(), e);
            return Err(e.into());
        }

        self.env.metrics.inc_saves_completed();
        self.close();
        Ok(statistics)
    }

    /// Drops the document and releases the lock without saving.
    pub(crate) fn close(&mut self) {
        if self.env.locks.release_if_holder(self.layout.id(), &self.user) {
            tracing::info!("Process {} released by {}", self.layout.id(), self.user);
        }
        self.document = None;
        self.current = None;
        self.add_mode = AddMode::None;
        self.state = SessionState::Unloaded;
    }
}

/// Adds empty default-display fields the element does not carry yet.
pub(crate) fn seed_defaults(doc: &mut DigitalDocument, ruleset: &Ruleset, id: NodeId) -> EditorResult<()> {
    let node = doc.get_mut(id)?;
    for allowed in ruleset.default_display(&node.type_name) {
        let is_person = ruleset.metadata_type(&allowed.name).map(|t| t.is_person).unwrap_or(false);
        if is_person {
            if !node.persons.iter().any(|p| p.role == allowed.name) {
                node.persons.push(Person {
                    role: allowed.name.clone(),
                    first_name: String::new(),
                    last_name: String::new(),
                    authority: None,
                });
            }
        } else if !node.metadata.iter().any(|m| m.type_name == allowed.name) {
            node.metadata.push(Metadata { type_name: allowed.name.clone(), value: String::new() });
        }
    }
    Ok(())
}

/// One editor plus the guard serializing metadata reads.
pub struct EditorSession {
    read_lock: Mutex<()>,
    editor: Mutex<Editor>,
    last_access: Mutex<DateTime<Utc>>,
}

impl EditorSession {
    pub fn new(editor: Editor) -> Self {
        Self { read_lock: Mutex::new(()), editor: Mutex::new(editor), last_access: Mutex::new(Utc::now()) }
    }

    /// Non-blocking claim of the read guard; `None` while a load is running.
    pub(crate) fn read_guard(&self) -> Option<MutexGuard<'_, ()>> {
        self.read_lock.try_lock()
    }

    fn touch(&self) {
        *self.last_access.lock() = Utc::now();
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        *self.last_access.lock()
    }

    pub fn editor(&self) -> MutexGuard<'_, Editor> {
        self.touch();
        self.editor.lock()
    }

    /// True when the session was not used for `idle` and no longer keeps a live
    /// lock of its own. Sessions busy on another thread are never idle.
    pub fn is_idle_at(&self, now: DateTime<Utc>, idle: Duration) -> bool {
        if now.signed_duration_since(self.last_access()) < idle {
            return false;
        }
        let Some(editor) = self.editor.try_lock() else {
            return false;
        };
        match editor.state {
            SessionState::Loading => false,
            SessionState::Loaded => {
                editor.env.locks.holder_at(editor.layout.id(), now).as_deref() != Some(editor.user.as_str())
            }
            SessionState::Unloaded | SessionState::LockExpired => true,
        }
    }

    pub fn load(&self) -> EditorResult<View> {
        let _reading = self.read_guard().ok_or(EditorError::LoadInProgress)?;
        self.editor().load()
    }

    pub fn save(&self) -> EditorResult<ProcessStatistics> {
        self.editor().save()
    }

    /// Saves (when loaded) and loads again. From `LOCK_EXPIRED` the in-memory
    /// changes are dropped.
    pub fn reload(&self) -> EditorResult<(View, Option<ProcessStatistics>)> {
        let _reading = self.read_guard().ok_or(EditorError::LoadInProgress)?;
        let mut editor = self.editor();
        let statistics = match editor.state() {
            SessionState::Loaded => Some(editor.save()?),
            SessionState::LockExpired => {
                editor.close();
                None
            }
            SessionState::Unloaded | SessionState::Loading => None,
        };
        let view = editor.load()?;
        Ok((view, statistics))
    }

    pub fn close(&self) {
        self.editor.lock().close();
    }
}
