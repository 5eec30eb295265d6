use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::editor::{EditorEnv, EditorSession, EditorSettings};
use crate::images::scale::{ContentServerScaler, EmbeddedScaler, PreviewScaler};
use crate::images::ImageSettings;
use crate::locking::LockManager;
use crate::metrics::Metrics;
use crate::ruleset::RulesetCache;

const RULESET_CACHE_SIZE: usize = 16;

/// The shared application state.
///
/// Holds the database pool, the open editor sessions and the services every
/// session shares: the process lock table, parsed rulesets and metrics.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool (process registry and statistics).
    pub db: sqlx::SqlitePool,
    /// Open editor sessions by session id.
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<EditorSession>>>>,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    /// Advisory per-process edit locks.
    pub locks: LockManager,
    pub rulesets: Arc<RulesetCache>,
    /// Services handed to every new editor.
    pub editor_env: EditorEnv,
}

impl AppState {
    /// Creates a new `AppState` from the configuration.
    ///
    /// Fails if the image patterns or the content server client cannot be set up.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let editor = &config.editor;
        let images = ImageSettings::new(
            &editor.image_patterns,
            &editor.image_prefix,
            editor.image_sorting,
            editor.default_pagination,
        )?;
        let settings = EditorSettings {
            processes_root: config.storage.processes_root.clone(),
            upload_dir: config.storage.upload_dir.clone(),
            preview_dir: config.storage.preview_dir.clone(),
            images,
            tif_suffix: editor.tif_folder_suffix.clone(),
            orig_prefix: editor.orig_folder_prefix.clone(),
            metadata_backups: editor.metadata_backups,
            preview_zoom: editor.preview_zoom,
            pagination_separator: editor.pagination_separator.clone(),
            representative_enabled: editor.representative_enabled,
        };

        let scaler: Arc<dyn PreviewScaler> = if config.content_server.url.trim().is_empty() {
            Arc::new(EmbeddedScaler)
        } else {
            tracing::info!("Using content server {} for previews", config.content_server.url);
            Arc::new(ContentServerScaler::new(&config.content_server.url, config.content_server.timeout_secs)?)
        };

        let metrics = Metrics::new();
        let locks = LockManager::with_timeout_minutes(editor.lock_timeout_minutes);
        let editor_env =
            EditorEnv { locks: locks.clone(), metrics: metrics.clone(), settings: Arc::new(settings), scaler };

        Ok(Self {
            db,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            rulesets: Arc::new(RulesetCache::new(config.storage.rulesets_dir.clone(), RULESET_CACHE_SIZE)),
            config: Arc::new(config),
            metrics,
            locks,
            editor_env,
        })
    }

    /// Drops editor sessions that have been idle for longer than the lock timeout
    /// and no longer hold a live lock. Returns how many were dropped.
    pub async fn purge_idle_sessions(&self) -> usize {
        self.purge_idle_sessions_at(Utc::now()).await
    }

    pub async fn purge_idle_sessions_at(&self, now: DateTime<Utc>) -> usize {
        let idle = self.locks.timeout();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let stale = session.is_idle_at(now, idle);
            if stale {
                tracing::debug!("Dropping idle session {}", id);
            }
            !stale
        });
        before - sessions.len()
    }
}
