//! Hosted provider target

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{GitOption, ProtectionMode, ProviderConfig};
use crate::error::{TransferError, TransferStage};
use crate::git::GitTransfer;
use crate::metainfo::RunContext;
use crate::model::{CreateOption, LocalRepository, ProjectInfo, PushOption};
use crate::provider::ProviderGateway;

pub struct RemoteTarget {
    config: ProviderConfig,
    gateway: Arc<dyn ProviderGateway>,
    git: Arc<dyn GitTransfer>,
    protection: ProtectionMode,
    /// Repositories already present in the target namespace, by name
    existing: HashMap<String, ProjectInfo>,
}

impl RemoteTarget {
    pub fn new(
        config: ProviderConfig,
        gateway: Arc<dyn ProviderGateway>,
        git: Arc<dyn GitTransfer>,
        protection: ProtectionMode,
        existing: Vec<ProjectInfo>,
    ) -> Self {
        let existing = existing
            .into_iter()
            .map(|project| (project.name().to_string(), project))
            .collect();

        Self {
            config,
            gateway,
            git,
            protection,
            existing,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn gateway(&self) -> &dyn ProviderGateway {
        self.gateway.as_ref()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.existing.contains_key(name)
    }

    pub async fn push(
        &self,
        ctx: &RunContext,
        repo: &LocalRepository,
        opt: &PushOption,
        git_opt: &GitOption,
    ) -> Result<(), TransferError> {
        let project = repo.project();
        let name = project.name();
        let owner = self.config.owner();
        let branch = &project.default_branch;
        let fail = |stage, source| TransferError::new(name, stage, source);

        if !self.exists(name) {
            let id = self
                .gateway
                .create(ctx, &self.config, &CreateOption::from_project(project))
                .await
                .map_err(|e| fail(TransferStage::Create, e))?;
            info!(repository = name, id = %id, target = %self.config.describe(), "created repository");
        } else if self.protection == ProtectionMode::Protect {
            // A protected default branch would reject the forced push
            self.gateway
                .unprotect(ctx, owner, name, branch)
                .await
                .map_err(|e| fail(TransferStage::Unprotect, e))?;
        }

        self.git
            .push(repo, opt, git_opt)
            .await
            .map_err(|e| fail(TransferStage::Push, e))?;

        self.gateway
            .default_branch(ctx, owner, name, branch)
            .await
            .map_err(|e| fail(TransferStage::DefaultBranch, e))?;

        match self.protection {
            ProtectionMode::Leave => {}
            ProtectionMode::Protect => self
                .gateway
                .protect(ctx, owner, name, branch)
                .await
                .map_err(|e| fail(TransferStage::Protect, e))?,
            ProtectionMode::Unprotect => self
                .gateway
                .unprotect(ctx, owner, name, branch)
                .await
                .map_err(|e| fail(TransferStage::Unprotect, e))?,
        }

        debug!(repository = name, target = %self.config.describe(), "pushed to provider");
        Ok(())
    }
}
