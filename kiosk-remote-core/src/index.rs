//! Third-party module index.
//!
//! The index is a markdown wiki page listing community widgets in tables,
//! one `###` section per category. It is downloaded at most once per refresh
//! interval and cached as JSON next to the display settings.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
    time::{Duration, SystemTime},
};

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};

static CATEGORY_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]").expect("valid category regex"));
static TABLE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|\s?\[(.*?)\]\((.*?)\)\s?\|(.*?)\|(.*)\|?").expect("valid row regex")
});
static AUTHOR_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*)\]\(.*\)").expect("valid author regex"));

/// One row of the published module list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IndexEntry {
    pub longname: String,
    pub id: String,
    pub url: String,
    pub author: String,
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedIndex {
    pub categories: Vec<String>,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    NoUpdateRequired,
    Failed(String),
}

/// Parses the markdown module list.
///
/// The first section lists the category names as links after a
/// "Categories" heading; every following section holds one category's table.
/// A section without a listed category falls back to its own heading.
pub fn parse_index(content: &str) -> ParsedIndex {
    let sections: Vec<&str> = content.split("###").collect();

    let categories: Vec<String> = sections
        .get(1)
        .and_then(|s| s.split("Categories").nth(1))
        .map(|listing| {
            CATEGORY_LINK
                .captures_iter(listing)
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut entries = Vec::new();
    for (index, section) in sections.iter().enumerate().skip(2) {
        let heading = section.lines().next().map(str::trim).unwrap_or_default();
        let cat = categories
            .get(index - 2)
            .cloned()
            .or_else(|| (!heading.is_empty()).then(|| heading.to_string()));

        for row in TABLE_ROW.captures_iter(section) {
            let url = row[2].replace(".git", "").trim().to_string();
            let id = repository_id(&url);
            entries.push(IndexEntry {
                longname: row[1].trim().to_string(),
                id,
                url,
                author: AUTHOR_LINK.replace(&row[3], "$1").trim().to_string(),
                desc: row[4].replacen('|', "", 1).trim().to_string(),
                cat: cat.clone(),
            });
        }
    }

    debug!(
        categories = categories.len(),
        entries = entries.len(),
        "Parsed module index"
    );
    ParsedIndex {
        categories,
        entries,
    }
}

/// `owner/repo` tail of a repository URL.
fn repository_id(url: &str) -> String {
    let parts: Vec<&str> = url.trim_end_matches('/').rsplitn(3, '/').collect();
    match parts.as_slice() {
        [repo, owner, _] => format!("{}/{}", owner, repo),
        _ => url.to_string(),
    }
}

pub struct ModuleIndex {
    cache_path: PathBuf,
    source_url: String,
    refresh_interval: Duration,
    client: Client,
}

impl ModuleIndex {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            cache_path: config.module_index_path(),
            source_url: config.module_index.source_url.clone(),
            refresh_interval: config.module_index.refresh_interval,
            client: Client::new(),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Cached entries; an absent or unreadable cache is an empty index.
    pub async fn entries(&self) -> Vec<IndexEntry> {
        match tokio::fs::read(&self.cache_path).await {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                warn!("Module index cache is corrupt: {}", e);
                Vec::new()
            }),
            Err(e) => {
                debug!("No module index cache at {}: {}", self.cache_path.display(), e);
                Vec::new()
            }
        }
    }

    /// Distinct categories in index order.
    pub async fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for cat in self.entries().await.into_iter().filter_map(|e| e.cat) {
            if !categories.contains(&cat) {
                categories.push(cat);
            }
        }
        categories
    }

    async fn is_stale(&self) -> bool {
        let modified = match tokio::fs::metadata(&self.cache_path).await {
            Ok(meta) => meta.modified().ok(),
            Err(_) => None,
        };
        modified
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .is_none_or(|age| age >= self.refresh_interval)
    }

    /// Downloads the index when the cache is stale or `force` is set. On any
    /// failure the previous cache is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        if !force && !self.is_stale().await {
            return RefreshOutcome::NoUpdateRequired;
        }
        match self.download().await {
            Ok(count) => {
                info!(count, "Module index updated");
                RefreshOutcome::Updated
            }
            Err(e) => {
                warn!("Module index refresh failed: {}", e);
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    async fn download(&self) -> RemoteResult<usize> {
        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(|e| RemoteError::execution(format!("Could not load module data: {}", e)))?;
        if !response.status().is_success() {
            return Err(RemoteError::execution(format!(
                "Could not load module data: HTTP {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::execution(format!("Could not read module data: {}", e)))?;
        self.store(&parse_index(&body)).await
    }

    /// Writes parsed entries to the cache file.
    pub async fn store(&self, parsed: &ParsedIndex) -> RemoteResult<usize> {
        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&parsed.entries)?;
        tokio::fs::write(&self.cache_path, json).await?;
        Ok(parsed.entries.len())
    }
}
