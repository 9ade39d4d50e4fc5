//! Where mirrored repositories end up
//!
//! The set of target kinds is closed: a hosted provider, a local directory
//! or an archive file. All three are driven through [`Target::push`].

pub mod archive;
pub mod directory;
pub mod remote;

pub use archive::{ArchiveTarget, ArchiveWriter, TarGzWriter};
pub use directory::DirectoryTarget;
pub use remote::RemoteTarget;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{GitOption, ProviderConfig, ProviderType, SyncConfig};
use crate::error::TransferError;
use crate::git::GitTransfer;
use crate::metainfo::RunContext;
use crate::model::{LocalRepository, ProjectInfo, PushOption};
use crate::naming::{self, NameValidator};
use crate::provider::{self, GatewayFactory};

/// Decides whether a target already holds the source's state
#[async_trait]
pub trait FreshnessStrategy: Send + Sync {
    /// `source` and `target` are git locations (URL or path) readable by `git`
    async fn is_current(
        &self,
        git: &dyn GitTransfer,
        project: &ProjectInfo,
        source: &str,
        target: &str,
    ) -> Result<bool>;
}

/// Current when the default branch resolves to the same commit on both sides
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBranchHead;

#[async_trait]
impl FreshnessStrategy for DefaultBranchHead {
    async fn is_current(
        &self,
        git: &dyn GitTransfer,
        project: &ProjectInfo,
        source: &str,
        target: &str,
    ) -> Result<bool> {
        let branch = &project.default_branch;
        let Some(source_head) = git.ref_head(source, branch).await? else {
            return Ok(false);
        };
        let target_head = git.ref_head(target, branch).await?;
        Ok(target_head.as_deref() == Some(source_head.as_str()))
    }
}

pub enum Target {
    Provider(RemoteTarget),
    Directory(DirectoryTarget),
    Archive(ArchiveTarget),
}

impl Target {
    /// Build the target for `config`; hosted targets list their namespace once
    pub async fn connect(
        ctx: &RunContext,
        config: &ProviderConfig,
        sync: &SyncConfig,
        work_dir: PathBuf,
        factory: &GatewayFactory,
        git: Arc<dyn GitTransfer>,
    ) -> Result<Self> {
        match config.provider {
            ProviderType::Directory => {
                let root = config
                    .target_path()
                    .ok_or_else(|| anyhow!("directory target requires a path"))?;
                Ok(Target::Directory(DirectoryTarget::new(config.clone(), root, git)))
            }
            ProviderType::Archive => {
                let root = config
                    .target_path()
                    .ok_or_else(|| anyhow!("archive target requires a path"))?;
                Ok(Target::Archive(ArchiveTarget::new(
                    config.clone(),
                    root,
                    work_dir,
                    git,
                    Arc::new(TarGzWriter),
                )))
            }
            ProviderType::Github | ProviderType::Gitlab | ProviderType::Gitea | ProviderType::GenericGit => {
                let gateway = factory(config)?;
                let existing = gateway.project_infos(ctx, config, false).await?;
                Ok(Target::Provider(RemoteTarget::new(
                    config.clone(),
                    gateway,
                    git,
                    sync.protection,
                    existing,
                )))
            }
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        match self {
            Target::Provider(t) => t.config(),
            Target::Directory(t) => t.config(),
            Target::Archive(t) => t.config(),
        }
    }

    pub fn describe(&self) -> String {
        self.config().describe()
    }

    pub fn is_valid_repository_name(&self, ctx: &RunContext, name: &str) -> bool {
        match self {
            Target::Provider(t) => t.gateway().is_valid_repository_name(ctx, name),
            Target::Directory(_) | Target::Archive(_) => naming::FILESYSTEM.is_valid(name),
        }
    }

    /// Push directive for repository `name`
    pub fn push_option(&self, name: &str, force: bool) -> Result<PushOption> {
        let all_refs = self.config().git.all_refs;
        let location = match self {
            Target::Provider(t) => provider::push_url(t.config(), name)?,
            Target::Directory(t) => t.repository_path(name).to_string_lossy().into_owned(),
            Target::Archive(t) => t.root().to_string_lossy().into_owned(),
        };
        Ok(PushOption::new(location, force, all_refs))
    }

    /// Location to compare against the source, when the target may already be current
    pub async fn freshness_location(&self, name: &str, opt: &PushOption) -> Option<String> {
        match self {
            Target::Provider(t) if t.exists(name) => Some(opt.target().to_string()),
            Target::Directory(t) if directory::is_managed(&t.repository_path(name)).await => {
                Some(opt.target().to_string())
            }
            _ => None,
        }
    }

    pub async fn push(
        &self,
        ctx: &RunContext,
        repo: &LocalRepository,
        opt: &PushOption,
        git_opt: &GitOption,
    ) -> Result<(), TransferError> {
        match self {
            Target::Provider(t) => t.push(ctx, repo, opt, git_opt).await,
            Target::Directory(t) => t.push(ctx, repo, opt, git_opt).await,
            Target::Archive(t) => t.push(ctx, repo, opt, git_opt).await,
        }
    }
}
