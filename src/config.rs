use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::loader::LoadOptions;
use crate::storage::SessionOptions;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TskdbConfig {
    pub database: Option<String>,
    /// Record byte runs in `tsk_file_layout`
    pub block_map: Option<bool>,
    /// Keep SQLite's synchronous writes on (slower bulk loads)
    pub synchronous: Option<bool>,
    pub continue_on_error: Option<bool>,
}

impl TskdbConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            block_map: self.block_map.unwrap_or(false),
            synchronous_off: !self.synchronous.unwrap_or(false),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            continue_on_error: self.continue_on_error.unwrap_or(false),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("tskdb.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("tskdb.db")
}

pub fn load_config(path: Option<&Path>) -> crate::Result<Option<TskdbConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: TskdbConfig =
        toml::from_str(&contents).map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &TskdbConfig, force: bool) -> crate::Result<()> {
    if path.exists() && !force {
        return Err(crate::Error::Config(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    let contents = toml::to_string_pretty(config).map_err(|e| crate::Error::Config(e.to_string()))?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> crate::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
