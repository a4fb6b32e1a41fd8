use std::{collections::HashMap, fs};

use anyhow::Context;
use url::Url;

#[derive(Debug)]
pub struct Settings {
    pub backend_url: String,
    /// Object-storage upload endpoint; empty disables image uploads.
    pub media_upload_url: String,
    pub media_upload_preset: String,
    pub session_db: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080".into(),
            media_upload_url: String::new(),
            media_upload_preset: String::new(),
            session_db: "sqlite://./data/session.db".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("waymark.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("backend_url") {
                settings.backend_url = v.clone();
            }
            if let Some(v) = file_cfg.get("media_upload_url") {
                settings.media_upload_url = v.clone();
            }
            if let Some(v) = file_cfg.get("media_upload_preset") {
                settings.media_upload_preset = v.clone();
            }
            if let Some(v) = file_cfg.get("session_db") {
                settings.session_db = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Ok(v) = std::env::var("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Ok(v) = std::env::var("MEDIA_UPLOAD_URL") {
        settings.media_upload_url = v;
    }
    if let Ok(v) = std::env::var("APP__MEDIA_UPLOAD_URL") {
        settings.media_upload_url = v;
    }

    if let Ok(v) = std::env::var("MEDIA_UPLOAD_PRESET") {
        settings.media_upload_preset = v;
    }
    if let Ok(v) = std::env::var("APP__MEDIA_UPLOAD_PRESET") {
        settings.media_upload_preset = v;
    }

    if let Ok(v) = std::env::var("SESSION_DB") {
        settings.session_db = v;
    }
    if let Ok(v) = std::env::var("APP__SESSION_DB") {
        settings.session_db = v;
    }

    settings
}

pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    Url::parse(&settings.backend_url)
        .with_context(|| format!("invalid backend_url '{}'", settings.backend_url))?;
    if !settings.media_upload_url.is_empty() {
        Url::parse(&settings.media_upload_url)
            .with_context(|| format!("invalid media_upload_url '{}'", settings.media_upload_url))?;
    }
    Ok(())
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().session_db;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_file_path_to_sqlite_url() {
        assert_eq!(
            normalize_database_url("./data/session.db"),
            "sqlite://./data/session.db"
        );
    }

    #[test]
    fn keeps_memory_and_full_urls_untouched() {
        assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_database_url("sqlite:///tmp/session.db"),
            "sqlite:///tmp/session.db"
        );
    }

    #[test]
    fn empty_url_falls_back_to_default() {
        assert_eq!(normalize_database_url("  "), Settings::default().session_db);
    }

    #[test]
    fn validate_rejects_malformed_backend_url() {
        let settings = Settings {
            backend_url: "not a url".into(),
            ..Settings::default()
        };
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&Settings::default()).is_ok());
    }
}
