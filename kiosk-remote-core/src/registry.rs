//! Catalog of known display widgets.
//!
//! The catalog is rebuilt from three sources on every scan: the cached
//! third-party module index, the built-in widget list, and the widget
//! folders present on disk. One descriptor exists per canonical name.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::config::RemoteConfig;
use crate::defaults::WidgetDefaults;
use crate::index::{IndexEntry, ModuleIndex};
use crate::literal::extract_module_defaults;
use crate::vcs::{VersionControl, browsable_url, is_repository};

static PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)MMM?-").expect("valid prefix regex"));
static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid camel case regex"));

const BUILTIN_AUTHOR: &str = "MichMich";
const BUILTIN_ID: &str = "MichMich/MagicMirror";
const BUILTIN_URL: &str =
    "https://github.com/MichMich/MagicMirror/wiki/MagicMirror%C2%B2-Modules#default-modules";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ModuleDescriptor {
    /// Canonical name, equal to the widget's folder name.
    pub longname: String,
    /// Display name.
    pub name: String,
    #[serde(rename = "isDefaultModule")]
    pub is_builtin: bool,
    pub installed: bool,
    pub author: String,
    pub desc: String,
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat: Option<String>,
    #[serde(rename = "updateAvailable", default)]
    pub update_available: bool,
}

impl ModuleDescriptor {
    fn from_index(entry: IndexEntry) -> Self {
        Self {
            name: format_name(&entry.longname),
            longname: entry.longname,
            is_builtin: false,
            installed: false,
            author: entry.author,
            desc: entry.desc,
            id: entry.id,
            url: entry.url,
            cat: entry.cat,
            update_available: false,
        }
    }

    fn builtin(name: &str) -> Self {
        Self {
            longname: name.to_string(),
            name: capitalize_first(name),
            is_builtin: true,
            installed: true,
            author: BUILTIN_AUTHOR.to_string(),
            desc: String::new(),
            id: BUILTIN_ID.to_string(),
            url: BUILTIN_URL.to_string(),
            cat: None,
            update_available: false,
        }
    }

    fn local(folder: &str) -> Self {
        Self {
            longname: folder.to_string(),
            name: format_name(folder),
            is_builtin: false,
            installed: true,
            author: "unknown".to_string(),
            desc: String::new(),
            id: format!("local/{}", folder),
            url: String::new(),
            cat: None,
            update_available: false,
        }
    }
}

/// Human readable widget name: `MMM-Currentweather` becomes
/// `Currentweather`, `helloWorld_test` becomes `Hello World Test`.
pub fn format_name(name: &str) -> String {
    let stripped = PREFIX.replace_all(name, "").replace(['_', '-'], " ");
    let spaced = CAMEL_BOUNDARY.replace_all(&stripped, "$1 $2");

    let mut out = String::with_capacity(spaced.len());
    let mut word_start = true;
    for c in spaced.chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = c.is_whitespace();
    }
    out
}

fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct ModuleRegistry {
    config: Arc<RemoteConfig>,
    index: ModuleIndex,
    vcs: Arc<dyn VersionControl>,
    defaults: WidgetDefaults,
    modules: Arc<RwLock<BTreeMap<String, ModuleDescriptor>>>,
}

impl ModuleRegistry {
    pub fn new(
        config: Arc<RemoteConfig>,
        vcs: Arc<dyn VersionControl>,
        defaults: WidgetDefaults,
    ) -> Self {
        Self {
            index: ModuleIndex::new(&config),
            config,
            vcs,
            defaults,
            modules: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn index(&self) -> &ModuleIndex {
        &self.index
    }

    pub fn defaults(&self) -> &WidgetDefaults {
        &self.defaults
    }

    /// Rebuilds the catalog and starts background update checks for
    /// version-controlled widget folders.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> usize {
        let mut modules: BTreeMap<String, ModuleDescriptor> = self
            .index
            .entries()
            .await
            .into_iter()
            .map(|entry| (entry.longname.clone(), ModuleDescriptor::from_index(entry)))
            .collect();

        let modules_path = self.config.modules_path();
        for name in &self.config.builtin_modules {
            modules.insert(name.clone(), ModuleDescriptor::builtin(name));
            self.load_defaults(name, &modules_path.join("default").join(name))
                .await;
        }

        let mut repositories = Vec::new();
        for folder in self.widget_folders(&modules_path).await {
            let dir = modules_path.join(&folder);
            let known = match modules.get_mut(&folder) {
                Some(descriptor) => {
                    descriptor.installed = true;
                    true
                }
                None => false,
            };
            if !known {
                let mut descriptor = ModuleDescriptor::local(&folder);
                if is_repository(&dir) {
                    match self.vcs.remote_url(dir.clone()).await {
                        Ok(Some(remote)) => descriptor.url = browsable_url(&remote),
                        Ok(None) => {}
                        Err(e) => warn!(module = %folder, "Could not read git remote: {}", e),
                    }
                }
                modules.insert(folder.clone(), descriptor);
            }
            self.load_defaults(&folder, &dir).await;
            if is_repository(&dir) {
                repositories.push((folder, dir));
            }
        }

        let count = modules.len();
        *self.modules.write().await = modules;
        info!(count, "Module catalog refreshed");

        for (name, dir) in repositories {
            self.spawn_update_check(name, dir);
        }
        count
    }

    async fn widget_folders(&self, modules_path: &Path) -> Vec<String> {
        let mut folders = Vec::new();
        let mut entries = match tokio::fs::read_dir(modules_path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not list {}: {}", modules_path.display(), e);
                return folders;
            }
        };
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if name == "node_modules" || name == "default" {
                        continue;
                    }
                    match entry.file_type().await {
                        Ok(kind) if kind.is_dir() => folders.push(name),
                        Ok(_) => {}
                        Err(e) => warn!(module = %name, "Skipping unreadable entry: {}", e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Widget folder scan interrupted: {}", e);
                    break;
                }
            }
        }
        folders
    }

    async fn load_defaults(&self, name: &str, dir: &Path) {
        let source = dir.join(format!("{}.js", name));
        match tokio::fs::read_to_string(&source).await {
            Ok(text) => match extract_module_defaults(&text) {
                Some(defaults) => self.defaults.insert(name, defaults),
                None => debug!(module = name, "No declared defaults"),
            },
            Err(e) => debug!(module = name, "Could not read {}: {}", source.display(), e),
        }
    }

    fn spawn_update_check(&self, name: String, dir: PathBuf) {
        let vcs = self.vcs.clone();
        let modules = self.modules.clone();
        tokio::spawn(async move {
            let available = behind(vcs.as_ref(), dir).await;
            if let Some(descriptor) = modules.write().await.get_mut(&name) {
                descriptor.update_available = available;
            }
        });
    }

    /// `true` when the widget's folder is a repository strictly behind its
    /// upstream. Every failure reads as `false`.
    pub async fn check_update_status(&self, descriptor: &ModuleDescriptor) -> bool {
        if descriptor.is_builtin || !descriptor.installed {
            return false;
        }
        let dir = self.config.modules_path().join(&descriptor.longname);
        if !is_repository(&dir) {
            return false;
        }
        let available = behind(self.vcs.as_ref(), dir).await;
        if let Some(d) = self.modules.write().await.get_mut(&descriptor.longname) {
            d.update_available = available;
        }
        available
    }

    /// Whether the host application itself has upstream commits.
    pub async fn host_update_available(&self) -> bool {
        behind(self.vcs.as_ref(), self.config.host_root.clone()).await
    }

    /// Every known widget, sorted by display name.
    pub async fn list_available(&self) -> Vec<ModuleDescriptor> {
        let mut modules: Vec<_> = self.modules.read().await.values().cloned().collect();
        modules.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        modules
    }

    /// Widgets with the installed flag set, built-ins included.
    pub async fn list_installed(&self) -> Vec<ModuleDescriptor> {
        self.list_available()
            .await
            .into_iter()
            .filter(|m| m.installed)
            .collect()
    }

    pub async fn get(&self, name: &str) -> Option<ModuleDescriptor> {
        self.modules.read().await.get(name).cloned()
    }

    pub async fn is_installed(&self, name: &str) -> bool {
        self.get(name).await.is_some_and(|m| m.installed)
    }
}

async fn behind(vcs: &dyn VersionControl, dir: PathBuf) -> bool {
    match vcs.behind_count(dir.clone()).await {
        Ok(count) => count > 0,
        Err(e) => {
            debug!(dir = %dir.display(), "Update check failed: {}", e);
            false
        }
    }
}
