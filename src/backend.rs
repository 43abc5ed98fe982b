use std::collections::HashMap;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store file {path:?} is not a valid key/value map: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("encoding task list: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable string-to-string map the task store persists into.
pub trait KeyValueBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), BackendError>;
}

/// Process-local backend. Counts calls so callers can check how often the
/// store touches it.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
    gets: std::cell::Cell<usize>,
    sets: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_count(&self) -> usize {
        self.gets.get()
    }

    pub fn set_count(&self) -> usize {
        self.sets
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.gets.set(self.gets.get() + 1);
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), BackendError> {
        self.sets += 1;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
