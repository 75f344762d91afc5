use secrecy::SecretString;
use serde::Deserialize;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open config file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Service configuration of the control surface.
///
/// Paths are relative to `host_root` unless absolute. Every field has a
/// default so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_host_root")]
    pub host_root: PathBuf,

    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,

    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Directory holding the module index cache, display settings and translations.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Canonical name of the control surface's own widget.
    #[serde(default = "default_own_module")]
    pub own_module: String,

    #[serde(default = "default_builtin_modules")]
    pub builtin_modules: Vec<String>,

    /// Widgets never scanned for capabilities, besides the own widget.
    #[serde(default = "default_discovery_excluded")]
    pub discovery_excluded: Vec<String>,

    #[serde(default = "default_snapshot_timeout", with = "duration_ms")]
    pub snapshot_timeout: Duration,

    #[serde(default = "default_command_timeout", with = "duration_ms")]
    pub command_timeout: Duration,

    #[serde(default = "default_dependency_timeout", with = "duration_ms")]
    pub dependency_timeout: Duration,

    #[serde(default = "default_backup_history_size")]
    pub backup_history_size: usize,

    #[serde(default = "default_language")]
    pub fallback_language: String,

    #[serde(default)]
    pub module_index: ModuleIndexConfig,

    #[serde(default)]
    pub commands: HostCommands,

    /// Overrides the `apiKey` of the own widget's configuration.
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleIndexConfig {
    #[serde(default = "default_index_source_url")]
    pub source_url: String,

    #[serde(default = "default_index_cache_file")]
    pub cache_file: String,

    #[serde(default = "default_index_refresh_interval", with = "duration_ms")]
    pub refresh_interval: Duration,
}

impl Default for ModuleIndexConfig {
    fn default() -> Self {
        Self {
            source_url: default_index_source_url(),
            cache_file: default_index_cache_file(),
            refresh_interval: default_index_refresh_interval(),
        }
    }
}

/// Shell commands run for OS level actions.
#[derive(Debug, Clone, Deserialize)]
pub struct HostCommands {
    #[serde(default = "default_shutdown_command")]
    pub shutdown: String,

    #[serde(default = "default_reboot_command")]
    pub reboot: String,

    #[serde(default = "default_process_list_command")]
    pub process_list: String,

    /// Restart command prefix, the process name is appended.
    #[serde(default = "default_process_restart_command")]
    pub process_restart: String,

    #[serde(default = "default_process_names")]
    pub process_names: Vec<String>,

    #[serde(default = "default_monitor_on_command")]
    pub monitor_on: String,

    #[serde(default = "default_monitor_off_command")]
    pub monitor_off: String,

    #[serde(default = "default_monitor_status_command")]
    pub monitor_status: String,

    #[serde(default = "default_dependency_install_command")]
    pub dependency_install: String,
}

impl Default for HostCommands {
    fn default() -> Self {
        Self {
            shutdown: default_shutdown_command(),
            reboot: default_reboot_command(),
            process_list: default_process_list_command(),
            process_restart: default_process_restart_command(),
            process_names: default_process_names(),
            monitor_on: default_monitor_on_command(),
            monitor_off: default_monitor_off_command(),
            monitor_status: default_monitor_status_command(),
            dependency_install: default_dependency_install_command(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host_root: default_host_root(),
            config_file: default_config_file(),
            modules_dir: default_modules_dir(),
            state_dir: default_state_dir(),
            own_module: default_own_module(),
            builtin_modules: default_builtin_modules(),
            discovery_excluded: default_discovery_excluded(),
            snapshot_timeout: default_snapshot_timeout(),
            command_timeout: default_command_timeout(),
            dependency_timeout: default_dependency_timeout(),
            backup_history_size: default_backup_history_size(),
            fallback_language: default_language(),
            module_index: ModuleIndexConfig::default(),
            commands: HostCommands::default(),
            api_key: None,
        }
    }
}

impl RemoteConfig {
    // JSONファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configuration rooted at `host_root`, every other value defaulted.
    pub fn with_root<P: Into<PathBuf>>(host_root: P) -> Self {
        Self {
            host_root: host_root.into(),
            ..Default::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.host_root.join(path)
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    pub fn modules_path(&self) -> PathBuf {
        self.resolve(&self.modules_dir)
    }

    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.state_dir)
    }

    pub fn module_index_path(&self) -> PathBuf {
        self.state_path().join(&self.module_index.cache_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.state_path().join("settings.json")
    }

    pub fn translations_path(&self) -> PathBuf {
        self.state_path().join("translations")
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin_modules.iter().any(|m| m == name)
    }
}

fn default_host_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_config_file() -> PathBuf {
    PathBuf::from("config/config.js")
}
fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("modules/MMM-Remote-Control")
}
fn default_own_module() -> String {
    "MMM-Remote-Control".to_string()
}
fn default_builtin_modules() -> Vec<String> {
    [
        "alert",
        "calendar",
        "clock",
        "compliments",
        "currentweather",
        "helloworld",
        "newsfeed",
        "weatherforecast",
        "updatenotification",
        "weather",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_discovery_excluded() -> Vec<String> {
    vec!["clock".to_string()]
}
fn default_snapshot_timeout() -> Duration {
    Duration::from_millis(3000)
}
fn default_command_timeout() -> Duration {
    Duration::from_secs(15)
}
fn default_dependency_timeout() -> Duration {
    Duration::from_secs(120)
}
fn default_backup_history_size() -> usize {
    5
}
fn default_language() -> String {
    "en".to_string()
}
fn default_index_source_url() -> String {
    "https://raw.githubusercontent.com/wiki/MichMich/MagicMirror/3rd-Party-Modules.md".to_string()
}
fn default_index_cache_file() -> String {
    "modules.json".to_string()
}
fn default_index_refresh_interval() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
fn default_shutdown_command() -> String {
    "sudo shutdown -h now".to_string()
}
fn default_reboot_command() -> String {
    "sudo shutdown -r now".to_string()
}
fn default_process_list_command() -> String {
    "pm2 ls".to_string()
}
fn default_process_restart_command() -> String {
    "pm2 restart".to_string()
}
fn default_process_names() -> Vec<String> {
    vec!["MagicMirror".to_string(), "mm".to_string()]
}
fn default_monitor_on_command() -> String {
    "tvservice --preferred && sudo chvt 6 && sudo chvt 7".to_string()
}
fn default_monitor_off_command() -> String {
    "tvservice -o".to_string()
}
fn default_monitor_status_command() -> String {
    "tvservice --status".to_string()
}
fn default_dependency_install_command() -> String {
    "npm install".to_string()
}

pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
