//! Host configuration file: loading, merging with defaults, and rewriting
//! it with rolling backups.

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::RemoteConfig;
use crate::defaults::WidgetDefaults;
use crate::error::{RemoteError, RemoteResult};
use crate::literal::parse_config_source;

const HEADER: &str =
    "/*************** AUTO GENERATED BY REMOTE CONTROL MODULE ***************/\n\nvar config = \n";
const FOOTER: &str = "\n\n/*************** DO NOT EDIT THE LINE BELOW ***************/\nif (typeof module !== 'undefined') {module.exports = config;}\n";

/// Compiled-in defaults of the host application.
pub fn host_defaults() -> Map<String, Value> {
    let defaults = json!({
        "address": "localhost",
        "port": 8080,
        "basePath": "/",
        "kioskmode": false,
        "electronOptions": {},
        "ipWhitelist": ["127.0.0.1", "::ffff:127.0.0.1", "::1"],
        "language": "en",
        "timeFormat": 24,
        "units": "metric",
        "zoom": 1,
        "customCss": "css/custom.css",
        "modules": []
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub backup: PathBuf,
    pub config: Map<String, Value>,
}

pub struct ConfigStore {
    path: PathBuf,
    backup_history_size: usize,
    host_defaults: Map<String, Value>,
    widget_defaults: WidgetDefaults,
    document: RwLock<Map<String, Value>>,
}

impl ConfigStore {
    pub fn new(config: &RemoteConfig, widget_defaults: WidgetDefaults) -> Self {
        let host_defaults = host_defaults();
        Self {
            path: config.config_path(),
            backup_history_size: config.backup_history_size.max(1),
            document: RwLock::new(host_defaults.clone()),
            host_defaults,
            widget_defaults,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn widget_defaults(&self) -> &WidgetDefaults {
        &self.widget_defaults
    }

    /// Reads the configuration file, overlaid on the host defaults. A missing
    /// or invalid file falls back to the defaults.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Map<String, Value> {
        let mut document = self.host_defaults.clone();
        match tokio::fs::read_to_string(&self.path).await {
            Ok(source) => match parse_config_source(&source) {
                Ok(on_disk) => document.extend(on_disk),
                Err(e) => warn!(
                    "Could not validate config file {}, starting with default configuration: {}",
                    self.path.display(),
                    e
                ),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => warn!(
                "Could not find config file {}, starting with default configuration",
                self.path.display()
            ),
            Err(e) => warn!(
                "Could not load config file {}, starting with default configuration: {}",
                self.path.display(),
                e
            ),
        }
        *self.document.write().await = document.clone();
        document
    }

    /// The loaded document without widget defaults.
    pub async fn document(&self) -> Map<String, Value> {
        self.document.read().await.clone()
    }

    pub async fn language(&self) -> Option<String> {
        self.document
            .read()
            .await
            .get("language")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// `config` of the first configured instance of `module`.
    pub async fn widget_config(&self, module: &str) -> Option<Map<String, Value>> {
        self.document
            .read()
            .await
            .get("modules")
            .and_then(Value::as_array)
            .and_then(|modules| {
                modules
                    .iter()
                    .find(|m| m.get("module").and_then(Value::as_str) == Some(module))
            })
            .and_then(|m| m.get("config"))
            .and_then(Value::as_object)
            .cloned()
    }

    /// The document with each widget's declared defaults filled in where the
    /// instance config does not set them.
    pub async fn get_merged(&self) -> Map<String, Value> {
        let mut document = self.document().await;
        if let Some(Value::Array(modules)) = document.get_mut("modules") {
            for entry in modules.iter_mut().filter_map(Value::as_object_mut) {
                let defaults = entry
                    .get("module")
                    .and_then(Value::as_str)
                    .and_then(|name| self.widget_defaults.get(name))
                    .unwrap_or_default();
                let config = entry
                    .entry("config")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(config) = config {
                    for (key, value) in defaults {
                        config.entry(key).or_insert(value);
                    }
                }
            }
        }
        document
    }

    /// Backs up the current file, then writes `new_config` with default
    /// values stripped.
    #[instrument(skip(self, new_config))]
    pub async fn save(&self, new_config: Value) -> RemoteResult<SaveOutcome> {
        let Value::Object(new_config) = new_config else {
            return Err(RemoteError::validation("config must be an object"));
        };

        let backup = self.select_backup_slot().await;
        self.write_backup(&backup).await.map_err(|e| {
            error!("Backing up config failed, not saving: {}", e);
            RemoteError::execution(format!("Backing up config failed, not saving: {}", e))
        })?;

        let stripped = self.remove_default_values(new_config);
        let contents = format!(
            "{}{}{}",
            HEADER,
            serde_json::to_string_pretty(&stripped)?,
            FOOTER
        );
        if let Err(e) = tokio::fs::write(&self.path, contents).await {
            error!("Saving config failed: {}", e);
            return Err(RemoteError::Execution {
                message: format!(
                    "Saving config failed: {} (backup kept at {})",
                    e,
                    backup.display()
                ),
                stdout: None,
                stderr: None,
            });
        }

        let mut document = self.host_defaults.clone();
        document.extend(stripped.clone());
        *self.document.write().await = document;

        info!("Saved new config, used backup {}", backup.display());
        Ok(SaveOutcome {
            backup,
            config: stripped,
        })
    }

    fn backup_path(&self, slot: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".backup{}", slot));
        PathBuf::from(name)
    }

    /// First unused slot, otherwise the slot holding the oldest backup.
    async fn select_backup_slot(&self) -> PathBuf {
        let mut oldest: Option<(PathBuf, SystemTime)> = None;
        for slot in 1..=self.backup_history_size {
            let path = self.backup_path(slot);
            let modified = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                Err(_) => return path,
            };
            if oldest.as_ref().is_none_or(|(_, t)| modified < *t) {
                oldest = Some((path, modified));
            }
        }
        oldest
            .map(|(path, _)| path)
            .unwrap_or_else(|| self.backup_path(1))
    }

    async fn write_backup(&self, backup: &Path) -> std::io::Result<()> {
        if let Some(parent) = backup.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::copy(&self.path, backup).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::write(backup, "").await
            }
            Err(e) => Err(e),
        }
    }

    /// Drops scalar values equal to the host default (top level) or to the
    /// widget's declared default, and widget `config` objects left empty.
    fn remove_default_values(&self, mut config: Map<String, Value>) -> Map<String, Value> {
        config.retain(|key, value| {
            !(is_scalar(value) && self.host_defaults.get(key) == Some(value))
        });

        if let Some(Value::Array(modules)) = config.get_mut("modules") {
            for entry in modules.iter_mut().filter_map(Value::as_object_mut) {
                let defaults = entry
                    .get("module")
                    .and_then(Value::as_str)
                    .and_then(|name| self.widget_defaults.get(name))
                    .unwrap_or_default();
                let empty = match entry.get_mut("config") {
                    Some(Value::Object(widget_config)) => {
                        widget_config.retain(|key, value| {
                            !(is_scalar(value) && defaults.get(key) == Some(value))
                        });
                        widget_config.is_empty()
                    }
                    _ => false,
                };
                if empty {
                    entry.remove("config");
                }
            }
        }
        config
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}
