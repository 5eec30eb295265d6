#[cfg(test)]
mod tests {
    use crate::config::{self, AppConfig};
    use crate::images::{DefaultPagination, ImageSorting};
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, "sqlite://data/seitenwerk.db");
        assert_eq!(config.editor.lock_timeout_minutes, 30);
        assert_eq!(config.editor.default_pagination, DefaultPagination::Uncounted);
        assert_eq!(config.editor.image_sorting, ImageSorting::Number);
        assert_eq!(config.editor.image_prefix, r"\d{8}");
        assert_eq!(config.editor.pagination_separator, " ");
        assert!(config.editor.image_patterns.contains(&"*.tif".to_string()));
        assert!(config.content_server.url.is_empty());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_server_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        let result = config::validate(&config);
        assert!(result.unwrap_err().to_string().contains("invalid server.port"));
    }

    #[test]
    fn test_invalid_editor_settings() {
        let mut config = AppConfig::default();
        config.editor.lock_timeout_minutes = 0;
        assert!(config::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.editor.preview_zoom = 0;
        assert!(config::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.editor.image_patterns.clear();
        assert!(config::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.editor.image_prefix = "(".to_string();
        assert!(config::validate(&config).unwrap_err().to_string().contains("image_prefix"));
    }

    #[test]
    fn test_content_server_url() {
        let mut config = AppConfig::default();
        config.content_server.url = "ftp://bilder.example".to_string();
        assert!(config::validate(&config).is_err());

        config.content_server.url = "http://localhost:8081/cs".to_string();
        assert!(config::validate(&config).is_ok());

        config.content_server.timeout_secs = 0;
        assert!(config::validate(&config).is_err());
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.storage.processes_root = dir.path().join("a/processes");
        config.storage.rulesets_dir = dir.path().join("rulesets");
        config.storage.upload_dir = dir.path().join("upload");
        config.storage.preview_dir = dir.path().join("previews");
        config::ensure_storage_dirs(&config.storage).unwrap();
        assert!(config.storage.processes_root.is_dir());
        assert!(config.storage.preview_dir.is_dir());

        let url = format!("sqlite://{}", dir.path().join("db/app.db").display());
        config::ensure_sqlite_parent_dir(&url).unwrap();
        assert!(dir.path().join("db").is_dir());
    }
}
