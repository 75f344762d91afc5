//! Live display state as reported by the display process, and the small
//! settings file used to restore it after a restart.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::error::RemoteResult;

/// State of a single widget instance on the display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub lock_strings: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_on_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_off_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_status_command: Option<String>,
}

/// Remote-control options as configured on the display side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRemoteConfig {
    #[serde(default)]
    pub custom_command: CustomCommands,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Snapshot delivered with every `CURRENT_STATUS` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySnapshot {
    #[serde(default)]
    pub module_data: Vec<WidgetState>,
    #[serde(default)]
    pub brightness: Option<Number>,
    #[serde(default)]
    pub settings_version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_config: Option<DisplayRemoteConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DisplaySnapshot {
    /// Widgets whose name or identifier equals `name`.
    pub fn widgets_named(&self, name: &str) -> Vec<&WidgetState> {
        self.module_data
            .iter()
            .filter(|w| w.name == name || w.identifier == name)
            .collect()
    }

    pub fn custom_commands(&self) -> Option<&CustomCommands> {
        self.remote_config.as_ref().map(|c| &c.custom_command)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSettings {
    pub identifier: String,
    pub hidden: bool,
    pub lock_strings: Vec<String>,
}

/// Persisted subset of the snapshot (`settings.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub module_data: Vec<WidgetSettings>,
    pub brightness: Option<Number>,
    pub settings_version: Option<Value>,
}

impl From<&DisplaySnapshot> for DisplaySettings {
    fn from(snapshot: &DisplaySnapshot) -> Self {
        Self {
            module_data: snapshot
                .module_data
                .iter()
                .map(|w| WidgetSettings {
                    identifier: w.identifier.clone(),
                    hidden: w.hidden,
                    lock_strings: w.lock_strings.clone(),
                })
                .collect(),
            brightness: snapshot.brightness.clone(),
            settings_version: snapshot.settings_version.clone(),
        }
    }
}

impl DisplaySettings {
    pub async fn save(&self, path: &Path) -> RemoteResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_vec(self)?).await?;
        info!("Saved display settings to {}", path.display());
        Ok(())
    }

    /// Loads saved settings. A missing file yields `None`; an unreadable or
    /// corrupt one is logged and also yields `None`.
    pub async fn load(path: &Path) -> Option<Self> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read display settings {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Ignoring corrupt display settings {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> DisplaySnapshot {
        serde_json::from_value(json!({
            "moduleData": [
                {"identifier": "module_0_clock", "name": "clock", "path": "modules/default/clock/", "file": "clock.js", "hidden": false, "lockStrings": [], "position": "top_left"},
                {"identifier": "module_1_MMM-Carousel", "name": "MMM-Carousel", "hidden": true, "lockStrings": ["remote"]}
            ],
            "brightness": 75,
            "settingsVersion": 1,
            "remoteConfig": {"customCommand": {"monitorOffCommand": "vcgencmd display_power 0"}, "showModuleApiMenu": true}
        }))
        .unwrap()
    }

    #[test]
    fn test_snapshot_decoding_keeps_unknown_fields() {
        let snapshot = sample();
        assert_eq!(snapshot.module_data.len(), 2);
        assert_eq!(snapshot.module_data[0].extra.get("position"), Some(&json!("top_left")));
        assert_eq!(snapshot.brightness, Some(75.into()));
        assert_eq!(
            snapshot.custom_commands().unwrap().monitor_off_command.as_deref(),
            Some("vcgencmd display_power 0")
        );
        assert_eq!(snapshot.widgets_named("module_1_MMM-Carousel").len(), 1);
        assert_eq!(snapshot.widgets_named("clock").len(), 1);
    }

    #[tokio::test]
    async fn test_settings_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("settings.json");
        assert!(DisplaySettings::load(&path).await.is_none());

        let settings = DisplaySettings::from(&sample());
        settings.save(&path).await.unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw["moduleData"][1],
            json!({"identifier": "module_1_MMM-Carousel", "hidden": true, "lockStrings": ["remote"]})
        );
        assert_eq!(DisplaySettings::load(&path).await, Some(settings));
    }

    #[tokio::test]
    async fn test_corrupt_settings_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(DisplaySettings::load(&path).await.is_none());
    }
}
