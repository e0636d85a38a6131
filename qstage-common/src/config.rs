//! Configuration loading and database path resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Database path resolution priority order:
/// 1. Explicit caller-supplied path (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`database_path` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(
    explicit: Option<&str>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> PathBuf {
    // Priority 1: Explicit path
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(config_path) = config_file {
        if let Ok(toml_content) = std::fs::read_to_string(config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(db_path) = config.get("database_path").and_then(|v| v.as_str()) {
                    return PathBuf::from(db_path);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_database_path()
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("qstage").join("qstage.db"))
        .unwrap_or_else(|| PathBuf::from("./qstage_data/qstage.db"))
}

/// Parse a TOML config file into a typed config struct.
///
/// A missing file is a `Config` error so callers can decide whether to fall
/// back to defaults; malformed TOML is always a `Config` error.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read config file {}: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}
