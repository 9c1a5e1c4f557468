// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RunsyncError};

/// Environment variable that overrides the default config location.
pub const CONFIG_ENV_VAR: &str = "RUNSYNC_CONFIG";

/// Parse TOML text into a `RawConfigFile`.
///
/// This only performs deserialization; no semantic validation.
pub fn parse_raw(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        RunsyncError::ConfigError(format!("cannot read config file {:?}: {e}", path))
    })?;
    parse_raw(&contents)
}

/// Load a configuration file from path and validate it.
///
/// This is the entry point for the rest of the application; the returned
/// `ConfigFile` is read-only for the lifetime of the invocation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    ConfigFile::try_from(raw_config)
}

/// Resolve which config file to use: explicit path, then `RUNSYNC_CONFIG`,
/// then `runsync.toml` in the current working directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => default_config_path(),
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("runsync.toml")
}
