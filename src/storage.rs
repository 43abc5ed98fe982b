use crate::backend::{BackendError, KeyValueBackend};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

const PROJECT_DIR: &str = ".dayplan";
const STORE_FILE: &str = "tasks.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Explicit,
    Project,
    Global,
}

impl StoreScope {
    pub fn label(&self) -> &'static str {
        match self {
            StoreScope::Explicit => "explicit",
            StoreScope::Project => "project",
            StoreScope::Global => "global",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub scope: StoreScope,
}

pub fn init_project_store(cwd: &Path) -> Result<StoreLocation> {
    let dir = cwd.join(PROJECT_DIR);
    fs::create_dir_all(&dir).context("failed to create .dayplan directory")?;
    let path = dir.join(STORE_FILE);
    if !path.exists() {
        write_map(&path, &Mapping::new())?;
    }
    Ok(StoreLocation {
        path,
        scope: StoreScope::Project,
    })
}

/// Picks the store file: an explicit path wins, then the nearest project
/// store above `start`, then the per-user data directory.
pub fn locate_store(start: &Path, explicit: Option<PathBuf>) -> Result<StoreLocation> {
    let location = if let Some(path) = explicit {
        StoreLocation {
            path,
            scope: StoreScope::Explicit,
        }
    } else if let Some(project_path) = find_project_store(start) {
        StoreLocation {
            path: project_path,
            scope: StoreScope::Project,
        }
    } else {
        StoreLocation {
            path: global_store_path()?,
            scope: StoreScope::Global,
        }
    };
    info!(path = %location.path.display(), scope = location.scope.label(), "using task store");
    Ok(location)
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR).join(STORE_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_store_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "dayplan").context("locating data directory")?;
    Ok(dirs.data_dir().join(STORE_FILE))
}

/// YAML file holding every day's encoded task list under its date key.
///
/// Each `get` reads the file and each `set` rewrites it, so separate
/// processes sharing the file see each other's writes, last writer wins.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(location: &StoreLocation) -> Self {
        FileBackend {
            path: location.path.clone(),
        }
    }

    /// The file must be a mapping; values that are not strings are kept
    /// as-is so a bad entry only affects its own key.
    fn read_map(&self) -> Result<Mapping, BackendError> {
        if !self.path.exists() {
            return Ok(Mapping::new());
        }
        let data = fs::read_to_string(&self.path).map_err(|source| BackendError::Io {
            path: self.path.clone(),
            source,
        })?;
        if data.trim().is_empty() {
            return Ok(Mapping::new());
        }
        serde_yaml::from_str(&data).map_err(|source| BackendError::Yaml {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        debug!(key, path = %self.path.display(), "backend get");
        let map = self.read_map()?;
        match map.get(key) {
            None => Ok(None),
            Some(Value::String(raw)) => Ok(Some(raw.clone())),
            Some(other) => {
                warn!(key, path = %self.path.display(), "ignoring non-string value: {:?}", other);
                Ok(None)
            }
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), BackendError> {
        debug!(key, path = %self.path.display(), "backend set");
        let mut map = self.read_map()?;
        map.insert(Value::String(key.to_string()), Value::String(value));
        write_map(&self.path, &map)
    }
}

fn write_map(path: &Path, map: &Mapping) -> Result<(), BackendError> {
    let io_err = |source: std::io::Error| BackendError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let serialized = serde_yaml::to_string(map).map_err(|source| BackendError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("yml.tmp");
    fs::write(&tmp, serialized).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
