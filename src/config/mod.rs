//! Persisted active-project configuration.
//!
//! A flat JSON key-value document holding the active project id under
//! `project` and a service-account blob per project under `iam.<project>`.
//! Every write goes straight to disk.

pub mod paths;

use miette::Diagnostic;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const PROJECT_KEY: &str = "project";
const CREDENTIAL_PREFIX: &str = "iam.";

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file {path}")]
    #[diagnostic(code(fb_extra::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path} is not valid JSON")]
    #[diagnostic(
        code(fb_extra::config::json),
        help("Fix or delete the file; it is recreated by `fb-extra use <project>`.")
    )]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not determine a config directory")]
    #[diagnostic(
        code(fb_extra::config::no_config_dir),
        help("Set HOME, XDG_CONFIG_HOME or FB_EXTRA_CONFIG, or pass --config.")
    )]
    NoConfigDir,
}

/// String key-value storage.
pub trait ConfigStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError>;
}

/// Store backed by a JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStore {
    /// Load the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        debug!(path = %path.display(), keys = values.len(), "Loaded config");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let text = serde_json::to_string_pretty(&self.values).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, text).map_err(io)
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.values
            .insert(key.to_string(), Value::String(value.to_string()));
        self.persist()
    }
}

/// Store that lives only as long as the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed view over a [`ConfigStore`].
#[derive(Debug)]
pub struct ProjectConfig<S: ConfigStore> {
    store: S,
}

impl<S: ConfigStore> ProjectConfig<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn active_project(&self) -> Option<String> {
        self.store
            .get(PROJECT_KEY)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
    }

    pub fn set_active_project(&mut self, project: &str) -> Result<(), ConfigError> {
        self.store.set(PROJECT_KEY, project)
    }

    /// Stored service-account JSON for `project`.
    pub fn credential(&self, project: &str) -> Option<String> {
        self.store
            .get(&format!("{}{}", CREDENTIAL_PREFIX, project))
            .filter(|c| !c.trim().is_empty())
    }

    pub fn store_credential(&mut self, project: &str, blob: &str) -> Result<(), ConfigError> {
        self.store
            .set(&format!("{}{}", CREDENTIAL_PREFIX, project), blob)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
