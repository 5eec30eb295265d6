use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::images::{DefaultPagination, ImageSorting};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub processes_root: PathBuf,
    pub rulesets_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub preview_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    pub lock_timeout_minutes: u64,
    pub default_pagination: DefaultPagination,
    pub image_sorting: ImageSorting,
    pub image_prefix: String,
    pub image_patterns: Vec<String>,
    pub tif_folder_suffix: String,
    pub orig_folder_prefix: String,
    pub metadata_backups: usize,
    pub preview_zoom: u32,
    pub pagination_separator: String,
    pub representative_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ContentServerConfig {
    /// Empty means previews are scaled in-process.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_content_server_timeout")]
    pub timeout_secs: u64,
}

fn default_content_server_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub editor: EditorConfig,
    #[serde(default)]
    pub content_server: ContentServerConfig,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: seitenwerk.toml (in CWD)
        .add_source(::config::File::with_name("seitenwerk").required(false));

    if let Ok(custom_path) = std::env::var("SEITENWERK_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("SEITENWERK").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Editor
    let editor = &cfg.editor;
    if editor.lock_timeout_minutes == 0 {
        return Err(anyhow::anyhow!("editor.lock_timeout_minutes must be > 0"));
    }
    if editor.preview_zoom == 0 || editor.preview_zoom > crate::editor::preview::MAX_ZOOM {
        return Err(anyhow::anyhow!(
            "editor.preview_zoom must be in 1..={}",
            crate::editor::preview::MAX_ZOOM
        ));
    }
    if editor.image_patterns.is_empty() {
        return Err(anyhow::anyhow!("editor.image_patterns must not be empty"));
    }
    if editor.tif_folder_suffix.trim().is_empty() {
        return Err(anyhow::anyhow!("editor.tif_folder_suffix must not be empty"));
    }
    if let Err(e) = regex::Regex::new(&editor.image_prefix) {
        return Err(anyhow::anyhow!("invalid editor.image_prefix: {}", e));
    }

    // Content server
    let url = cfg.content_server.url.trim();
    if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(anyhow::anyhow!("content_server.url must be an http(s) URL"));
    }
    if !url.is_empty() && cfg.content_server.timeout_secs == 0 {
        return Err(anyhow::anyhow!("content_server.timeout_secs must be > 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Creates the storage folders that must exist before the first request.
pub fn ensure_storage_dirs(storage: &StorageConfig) -> anyhow::Result<()> {
    for dir in [&storage.processes_root, &storage.rulesets_dir, &storage.upload_dir, &storage.preview_dir] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
