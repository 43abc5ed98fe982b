use crate::calendar::WeekStart;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Task store file, overrides project and global discovery.
    pub store_path: Option<PathBuf>,
    /// First column of the month grid.
    pub week_start: WeekStart,
    /// Show task counts next to marked days.
    pub show_counts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_path: None,
            week_start: WeekStart::Monday,
            show_counts: true,
        }
    }
}

/// Reads `explicit` if given, else `config.yml` in the user config directory.
/// A missing default file yields the defaults; a missing explicit file is an
/// error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("no config file, using defaults");
                return Ok(Config::default());
            }
        },
    };
    let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
    if data.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config =
        serde_yaml::from_str(&data).with_context(|| format!("parsing config {:?}", path))?;
    debug!(?config, path = %path.display(), "loaded config");
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "dayplan").map(|dirs| dirs.config_dir().join("config.yml"))
}
