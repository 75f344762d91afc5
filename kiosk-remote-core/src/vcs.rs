//! Version control operations on widget directories.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::command::{CommandRunner, quote};
use crate::error::RemoteResult;

#[mockall::automock]
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clones `url` into `dest`.
    async fn clone_repo(&self, url: &str, dest: PathBuf) -> RemoteResult<()>;

    /// Pulls the upstream branch. Returns the number of commits brought in.
    async fn pull(&self, dir: PathBuf) -> RemoteResult<usize>;

    /// Fetches remote refs and returns how many commits the local branch is behind.
    async fn behind_count(&self, dir: PathBuf) -> RemoteResult<usize>;

    /// URL of the `origin` remote, if any.
    async fn remote_url(&self, dir: PathBuf) -> RemoteResult<Option<String>>;
}

/// `true` when `dir` is the root of a git working tree.
pub fn is_repository(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Normalizes a remote URL into a browsable https URL.
pub fn browsable_url(remote: &str) -> String {
    let url = remote.trim();
    let url = url.strip_suffix(".git").unwrap_or(url);
    let url = url.replace("github.com:", "github.com/");
    match url.strip_prefix("git@") {
        Some(rest) => format!("https://{}", rest),
        None => url,
    }
}

/// Git through the `git` command line client.
pub struct GitCli {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl GitCli {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    async fn git(&self, dir: Option<PathBuf>, args: &str) -> RemoteResult<String> {
        let output = self
            .runner
            .run(&format!("git {}", args), dir, self.timeout)
            .await?
            .into_result(&format!("git {}", args))?;
        Ok(output.stdout.trim().to_string())
    }

    async fn head(&self, dir: &Path) -> RemoteResult<String> {
        self.git(Some(dir.to_path_buf()), "rev-parse HEAD").await
    }

    async fn count(&self, dir: &Path, range: &str) -> RemoteResult<usize> {
        let out = self
            .git(Some(dir.to_path_buf()), &format!("rev-list --count {}", range))
            .await?;
        Ok(out.parse().unwrap_or(0))
    }
}

#[async_trait]
impl VersionControl for GitCli {
    #[instrument(skip(self))]
    async fn clone_repo(&self, url: &str, dest: PathBuf) -> RemoteResult<()> {
        let parent = dest.parent().map(Path::to_path_buf);
        let target = dest.to_string_lossy();
        self.git(parent, &format!("clone -- {} {}", quote(url), quote(&target)))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn pull(&self, dir: PathBuf) -> RemoteResult<usize> {
        let before = self.head(&dir).await?;
        self.git(Some(dir.clone()), "pull --ff-only").await?;
        let after = self.head(&dir).await?;
        if before == after {
            return Ok(0);
        }
        self.count(&dir, &format!("{}..{}", before, after)).await
    }

    async fn behind_count(&self, dir: PathBuf) -> RemoteResult<usize> {
        self.git(Some(dir.clone()), "fetch --quiet").await?;
        let behind = self.count(&dir, "HEAD..@{u}").await?;
        debug!(dir = %dir.display(), behind, "Checked upstream");
        Ok(behind)
    }

    async fn remote_url(&self, dir: PathBuf) -> RemoteResult<Option<String>> {
        match self.git(Some(dir), "config --get remote.origin.url").await {
            Ok(url) if !url.is_empty() => Ok(Some(url)),
            Ok(_) => Ok(None),
            // `git config --get` exits 1 for a missing key
            Err(crate::error::RemoteError::Execution { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
