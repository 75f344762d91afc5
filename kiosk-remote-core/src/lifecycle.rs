//! Installing, updating and deleting widget folders.
//!
//! Every operation is a sequence of steps (version control, dependency
//! fetch, catalog rescan). A failing step stops the sequence and is reported
//! with whatever the failed step printed; completed steps are not undone.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::command::CommandRunner;
use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::registry::ModuleRegistry;
use crate::vcs::VersionControl;

/// Display name used when updating the host application itself.
const HOST_NAME: &str = "MM";

#[derive(Debug, Clone, PartialEq)]
pub struct InstallOutcome {
    pub module: String,
    pub stdout: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateCode {
    UpToDate,
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub code: UpdateCode,
    pub info: String,
}

/// Folder name a repository URL clones into.
pub fn folder_name(url: &str) -> Option<String> {
    let last = url.trim().trim_end_matches('/').rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

pub struct LifecycleManager {
    config: Arc<RemoteConfig>,
    vcs: Arc<dyn VersionControl>,
    runner: Arc<dyn CommandRunner>,
    registry: Arc<ModuleRegistry>,
}

impl LifecycleManager {
    pub fn new(
        config: Arc<RemoteConfig>,
        vcs: Arc<dyn VersionControl>,
        runner: Arc<dyn CommandRunner>,
        registry: Arc<ModuleRegistry>,
    ) -> Self {
        Self {
            config,
            vcs,
            runner,
            registry,
        }
    }

    #[instrument(skip(self))]
    pub async fn install(&self, url: &str) -> RemoteResult<InstallOutcome> {
        let module = folder_name(url)
            .ok_or_else(|| RemoteError::validation(format!("Invalid module URL: {}", url)))?;
        let dest = self.config.modules_path().join(&module);
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return Err(RemoteError::validation(format!(
                "Module {} is already installed",
                module
            )));
        }

        self.vcs.clone_repo(url, dest.clone()).await.inspect_err(|e| {
            error!(%module, "Clone failed: {}", e);
        })?;
        let output = self.install_dependencies(&dest).await?;

        self.registry.refresh().await;
        info!(%module, "Module installed");
        Ok(InstallOutcome {
            module,
            stdout: output,
        })
    }

    /// Pulls `module`, or the host application when `None`.
    #[instrument(skip(self))]
    pub async fn update(&self, module: Option<&str>) -> RemoteResult<UpdateOutcome> {
        let (dir, name) = match module {
            None => (self.config.host_root.clone(), HOST_NAME.to_string()),
            Some(module) => {
                let descriptor = self
                    .registry
                    .get(module)
                    .await
                    .filter(|d| d.installed && !d.is_builtin)
                    .ok_or_else(|| {
                        RemoteError::validation(format!("Unknown Module: {}", module))
                    })?;
                (
                    self.config.modules_path().join(&descriptor.longname),
                    descriptor.name,
                )
            }
        };
        info!(name = %name, dir = %dir.display(), "Updating");

        let changes = self.vcs.pull(dir.clone()).await?;
        if changes == 0 {
            return Ok(UpdateOutcome {
                code: UpdateCode::UpToDate,
                info: format!("{} already up to date.", name),
            });
        }

        self.install_dependencies(&dir).await?;
        self.registry.refresh().await;
        Ok(UpdateOutcome {
            code: UpdateCode::Restart,
            info: format!("{} updated.", name),
        })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, module: &str) -> RemoteResult<()> {
        if self.config.is_builtin(module) {
            return Err(RemoteError::validation(format!(
                "{} is a default module and cannot be deleted",
                module
            )));
        }
        if module == self.config.own_module {
            return Err(RemoteError::validation(format!(
                "{} cannot delete itself",
                module
            )));
        }
        let dir = self.config.modules_path().join(module);
        let on_disk = tokio::fs::try_exists(&dir).await.unwrap_or(false);
        if module.contains(['/', '\\']) || !on_disk || !self.registry.is_installed(module).await {
            return Err(RemoteError::validation(format!(
                "Module {} is not installed",
                module
            )));
        }

        let failures = remove_tree(&dir).await;
        self.registry.defaults().remove(module);
        self.registry.refresh().await;

        if failures.is_empty() {
            info!(module, "Module deleted");
            return Ok(());
        }
        for (path, e) in &failures {
            warn!(path = %path.display(), "Could not remove: {}", e);
        }
        let details: Vec<String> = failures
            .iter()
            .map(|(path, e)| format!("{}: {}", path.display(), e))
            .collect();
        Err(RemoteError::execution(format!(
            "Module {} was only partially deleted, {} entries remain: {}",
            module,
            failures.len(),
            details.join("; ")
        )))
    }

    async fn install_dependencies(&self, dir: &Path) -> RemoteResult<String> {
        let output = self
            .runner
            .run(
                &self.config.commands.dependency_install,
                Some(dir.to_path_buf()),
                self.config.dependency_timeout,
            )
            .await?
            .into_result("Dependency installation")?;
        Ok(output.stdout)
    }
}

/// Removes a directory tree, files before the directories holding them.
/// Symlinks are removed, never followed. Returns every entry that could not
/// be removed.
pub async fn remove_tree(root: &Path) -> Vec<(PathBuf, std::io::Error)> {
    let mut failures = Vec::new();
    let mut stack = vec![(root.to_path_buf(), false)];

    while let Some((path, expanded)) = stack.pop() {
        if expanded {
            if let Err(e) = tokio::fs::remove_dir(&path).await {
                failures.push((path, e));
            }
            continue;
        }

        let meta = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                failures.push((path, e));
                continue;
            }
        };
        if !meta.is_dir() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                failures.push((path, e));
            }
            continue;
        }

        stack.push((path.clone(), true));
        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) => {
                failures.push((path, e));
                continue;
            }
        };
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => stack.push((entry.path(), false)),
                Ok(None) => break,
                Err(e) => {
                    failures.push((path.clone(), e));
                    break;
                }
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, MockCommandRunner};
    use crate::defaults::WidgetDefaults;
    use crate::vcs::MockVersionControl;
    use std::fs;

    fn ok(stdout: &str) -> RemoteResult<CommandOutput> {
        Ok(CommandOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: Arc<RemoteConfig>,
        manager: LifecycleManager,
    }

    async fn fixture(vcs: MockVersionControl, runner: MockCommandRunner) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let modules = dir.path().join("modules");
        fs::create_dir_all(modules.join("default/clock")).unwrap();
        fs::create_dir_all(modules.join("MMM-Remote-Control")).unwrap();
        fs::create_dir_all(modules.join("MMM-Old/node_modules/dep")).unwrap();
        fs::write(modules.join("MMM-Old/MMM-Old.js"), "Module.register('MMM-Old', {});").unwrap();
        fs::write(modules.join("MMM-Old/node_modules/dep/index.js"), "").unwrap();

        let config = Arc::new(RemoteConfig {
            builtin_modules: vec!["clock".to_string()],
            ..RemoteConfig::with_root(dir.path())
        });
        let vcs: Arc<dyn VersionControl> = Arc::new(vcs);
        let registry = Arc::new(ModuleRegistry::new(
            config.clone(),
            vcs.clone(),
            WidgetDefaults::new(),
        ));
        registry.refresh().await;
        let manager = LifecycleManager::new(config.clone(), vcs, Arc::new(runner), registry);
        Fixture {
            _dir: dir,
            config,
            manager,
        }
    }

    #[test]
    fn test_folder_name() {
        assert_eq!(
            folder_name("https://github.com/shbatm/MMM-Carousel.git").as_deref(),
            Some("MMM-Carousel")
        );
        assert_eq!(
            folder_name("git@github.com:owner/MMM-Foo").as_deref(),
            Some("MMM-Foo")
        );
        assert_eq!(folder_name("https://example.com/").as_deref(), Some("example.com"));
        assert_eq!(folder_name(""), None);
        assert_eq!(folder_name("https://example.com/.."), None);
    }

    #[tokio::test]
    async fn test_install_clones_and_fetches_dependencies() {
        let mut vcs = MockVersionControl::new();
        vcs.expect_clone_repo().times(1).returning(|_, dest| {
            fs::create_dir_all(&dest).unwrap();
            Ok(())
        });
        vcs.expect_remote_url().returning(|_| Ok(None));
        vcs.expect_behind_count().returning(|_| Ok(0));
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd, cwd, _| cmd == "npm install" && cwd.as_ref().is_some_and(|d| d.ends_with("MMM-Carousel")))
            .times(1)
            .returning(|_, _, _| ok("added 3 packages"));

        let fx = fixture(vcs, runner).await;
        let outcome = fx
            .manager
            .install("https://github.com/shbatm/MMM-Carousel.git")
            .await
            .unwrap();
        assert_eq!(outcome.module, "MMM-Carousel");
        assert_eq!(outcome.stdout, "added 3 packages");
        assert!(fx.manager.registry.is_installed("MMM-Carousel").await);

        let again = fx.manager.install("https://github.com/shbatm/MMM-Carousel").await;
        assert!(again.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_install_reports_dependency_failure() {
        let mut vcs = MockVersionControl::new();
        vcs.expect_clone_repo().returning(|_, dest| {
            fs::create_dir_all(&dest).unwrap();
            Ok(())
        });
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _, _| {
            Ok(CommandOutput {
                status: Some(1),
                stdout: "partial".to_string(),
                stderr: "npm ERR! missing".to_string(),
            })
        });

        let fx = fixture(vcs, runner).await;
        match fx.manager.install("https://github.com/a/MMM-Broken").await {
            Err(RemoteError::Execution { stdout, stderr, .. }) => {
                assert_eq!(stdout.as_deref(), Some("partial"));
                assert_eq!(stderr.as_deref(), Some("npm ERR! missing"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!fx.manager.registry.is_installed("MMM-Broken").await);
    }

    #[tokio::test]
    async fn test_update_codes() {
        let mut vcs = MockVersionControl::new();
        vcs.expect_pull().returning(|dir| {
            if dir.ends_with("MMM-Old") { Ok(2) } else { Ok(0) }
        });
        vcs.expect_remote_url().returning(|_| Ok(None));
        vcs.expect_behind_count().returning(|_| Ok(0));
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|_, _, _| ok(""));

        let fx = fixture(vcs, runner).await;

        let host = fx.manager.update(None).await.unwrap();
        assert_eq!(host.code, UpdateCode::UpToDate);
        assert_eq!(host.info, "MM already up to date.");

        let widget = fx.manager.update(Some("MMM-Old")).await.unwrap();
        assert_eq!(widget.code, UpdateCode::Restart);
        assert_eq!(widget.info, "Old updated.");

        assert!(fx.manager.update(Some("MMM-Nope")).await.unwrap_err().is_validation());
        assert_eq!(serde_json::to_value(UpdateCode::UpToDate).unwrap(), "up-to-date");
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let mut vcs = MockVersionControl::new();
        vcs.expect_remote_url().returning(|_| Ok(None));
        let fx = fixture(vcs, MockCommandRunner::new()).await;

        for refused in ["clock", "MMM-Remote-Control", "MMM-Missing", "../modules"] {
            let err = fx.manager.delete(refused).await.unwrap_err();
            assert!(err.is_validation(), "{} should be refused", refused);
        }

        let dir = fx.config.modules_path().join("MMM-Old");
        fx.manager.delete("MMM-Old").await.unwrap();
        assert!(!dir.exists());
        assert!(!fx.manager.registry.is_installed("MMM-Old").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remove_tree_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("keep.txt"), "keep").unwrap();

        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("a/b/c")).unwrap();
        fs::write(tree.join("a/b/c/file"), "x").unwrap();
        fs::write(tree.join("a/top"), "y").unwrap();
        std::os::unix::fs::symlink(&outside, tree.join("a/link")).unwrap();

        assert!(remove_tree(&tree).await.is_empty());
        assert!(!tree.exists());
        assert!(outside.join("keep.txt").exists());

        let failures = remove_tree(&dir.path().join("missing")).await;
        assert_eq!(failures.len(), 1);
    }
}
