//! Directory target: one working repository per mirrored repository

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{GitOption, ProviderConfig};
use crate::error::{DirectoryTargetError, TransferError, TransferStage};
use crate::git::{GitTransfer, MANAGED_SECTION};
use crate::metainfo::RunContext;
use crate::model::{LocalRepository, PushOption};

pub struct DirectoryTarget {
    config: ProviderConfig,
    root: PathBuf,
    git: Arc<dyn GitTransfer>,
}

/// Git config file of a non-bare repository at `dir`
fn git_config_path(dir: &Path) -> PathBuf {
    dir.join(".git").join("config")
}

/// True when `dir` holds a repository produced by an earlier run
pub async fn is_managed(dir: &Path) -> bool {
    let marker = format!("[{}]", MANAGED_SECTION);
    match tokio::fs::read_to_string(git_config_path(dir)).await {
        Ok(content) => content.lines().any(|line| line.trim() == marker),
        Err(_) => false,
    }
}

async fn is_empty_or_missing(dir: &Path) -> std::io::Result<bool> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

impl DirectoryTarget {
    pub fn new(config: ProviderConfig, root: PathBuf, git: Arc<dyn GitTransfer>) -> Self {
        Self { config, root, git }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Deterministic location of repository `name`
    pub fn repository_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn push(
        &self,
        _ctx: &RunContext,
        repo: &LocalRepository,
        opt: &PushOption,
        git_opt: &GitOption,
    ) -> Result<(), TransferError> {
        let name = repo.project().name();
        let dir = PathBuf::from(opt.target());

        let fresh = !is_managed(&dir).await;
        if fresh {
            let empty = is_empty_or_missing(&dir)
                .await
                .with_context(|| format!("Failed to inspect {}", dir.display()))
                .map_err(|e| TransferError::new(name, TransferStage::Materialize, e))?;
            if !empty {
                return Err(TransferError::new(
                    name,
                    TransferStage::Materialize,
                    DirectoryTargetError::Unmanaged(dir.clone()).into(),
                ));
            }
        } else {
            debug!(repository = name, path = %dir.display(), "updating existing mirror");
        }

        let result = self.materialize(repo, opt, git_opt, &dir, fresh).await;
        if result.is_err() && fresh {
            discard(&dir).await;
        }
        result?;

        info!(repository = name, path = %dir.display(), "directory mirror updated");
        Ok(())
    }

    async fn materialize(
        &self,
        repo: &LocalRepository,
        opt: &PushOption,
        git_opt: &GitOption,
        dir: &Path,
        fresh: bool,
    ) -> Result<(), TransferError> {
        let project = repo.project();
        let fail = |stage, source| TransferError::new(project.name(), stage, source);

        if fresh {
            self.git
                .init(dir)
                .await
                .map_err(|e| fail(TransferStage::Materialize, e))?;
            self.git
                .set_default_branch(dir, &project.default_branch)
                .await
                .map_err(|e| fail(TransferStage::DefaultBranch, e))?;
        }

        self.git
            .push(repo, opt, git_opt)
            .await
            .map_err(|e| fail(TransferStage::Push, e))?;
        self.git
            .set_remote_and_branch(repo, dir)
            .await
            .map_err(|e| fail(TransferStage::Materialize, e))?;

        Ok(())
    }
}

/// Remove a repository this attempt created so the next run starts from scratch
async fn discard(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(path = %dir.display(), "removed partial mirror"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dir.display(), error = %e, "failed to remove partial mirror"),
    }
}
