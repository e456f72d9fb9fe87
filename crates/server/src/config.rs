use std::{fs, path::Path};

use serde::Deserialize;
use tracing::{info, warn};

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub country_api_url: String,
    pub db_max_connections: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:8000".into(),
            database_url: "sqlite://./data/countries.db".into(),
            country_api_url: country_source::DEFAULT_BASE_URL.into(),
            db_max_connections: storage::DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    country_api_url: Option<String>,
    db_max_connections: Option<u32>,
}

/// Defaults, then `server.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(SETTINGS_FILE));
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub(crate) fn apply_file(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    let file_cfg = match toml::from_str::<FileSettings>(&raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unreadable settings file");
            return;
        }
    };
    info!(path = %path.display(), "loaded settings file");

    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.country_api_url {
        settings.country_api_url = v;
    }
    if let Some(v) = file_cfg.db_max_connections {
        settings.db_max_connections = v;
    }
}

/// Later keys in each list win.
pub(crate) fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = var(key) {
            settings.server_bind = v;
        }
    }

    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = var(key) {
            settings.database_url = v;
        }
    }

    for key in ["COUNTRY_API_URL", "APP__COUNTRY_API_URL"] {
        if let Some(v) = var(key) {
            settings.country_api_url = v;
        }
    }

    if let Some(v) = var("APP__DB_MAX_CONNECTIONS") {
        match v.parse::<u32>() {
            Ok(parsed) if parsed > 0 => settings.db_max_connections = parsed,
            _ => warn!(value = %v, "ignoring invalid APP__DB_MAX_CONNECTIONS"),
        }
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.replace('\\', "/");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
