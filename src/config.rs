use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::flags::OutputFlags;
use crate::utils::get_config_dir;

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output flags a fresh handle starts with
    #[serde(default)]
    pub output: OutputFlags,
    /// Record submitted commands in the audit log
    #[serde(default = "default_true")]
    pub audit_enabled: bool,
    /// Log level used when `-v` is not given (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output: OutputFlags::default(),
            audit_enabled: true,
            log_level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

pub fn config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

/// Saves the config atomically.
///
/// The JSON goes to a temp file in the same directory (created 0o600 by
/// `tempfile`), is synced, then renamed over `path`.
///
/// # Errors
///
/// Returns `Err` if the directory is missing or not writable.
pub async fn save_config_to(path: &Path, config: &AppConfig) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::StorageFull {
                std::io::Error::new(
                    std::io::ErrorKind::StorageFull,
                    "Disk full: cannot save configuration. Free up space and try again.",
                )
            } else {
                e.error
            }
        })?;
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(std::io::Error::other)?
}

/// Saves the config to the XDG config directory.
///
/// # Errors
///
/// Returns `Err` if the config directory cannot be determined or written.
pub async fn save_config(config: &AppConfig) -> std::io::Result<()> {
    let path = config_path().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "Config directory not found")
    })?;
    crate::utils::ensure_dirs()?;
    save_config_to(&path, config).await
}

/// Loads a config file, falling back to defaults when it is missing or unreadable.
pub async fn load_config_from(path: &Path) -> AppConfig {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable config {}: {e}", path.display());
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

/// Loads the config from the XDG config directory, or returns defaults.
pub async fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path).await,
        None => AppConfig::default(),
    }
}
