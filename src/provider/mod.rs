//! Provider gateways
//!
//! The orchestrator talks to every hosting service through [`ProviderGateway`].
//! One adapter exists per provider; SDK and wire types stay inside the adapter
//! modules and never reach the rest of the crate.

pub mod generic;
pub mod gitea;
pub mod github;
pub mod gitlab;
pub mod pagination;
pub mod rest;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ProviderConfig, ProviderType, Transport};
use crate::error::ListingError;
use crate::filter;
use crate::git;
use crate::metainfo::RunContext;
use crate::model::{CreateOption, ProjectInfo};
use crate::naming::{self, NameValidator, NamingRules};

/// Capability contract of one hosting provider
///
/// Implement this trait to add support for another git hosting service.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Provider kind, used for naming rules and logs
    fn provider(&self) -> ProviderType;

    /// Naming rules of this provider
    fn validator(&self) -> &'static NamingRules {
        naming::rules_for(self.provider())
    }

    fn is_valid_repository_name(&self, _ctx: &RunContext, name: &str) -> bool {
        let valid = self.validator().is_valid(name);
        if !valid {
            debug!(provider = %self.provider(), name, "invalid repository name");
        }
        valid
    }

    /// Raw listing of every repository visible in the configured namespace
    async fn list_projects(&self, ctx: &RunContext, config: &ProviderConfig) -> Result<Vec<ProjectInfo>>;

    /// Listing, optionally passed through the filter pipeline
    ///
    /// Any listing failure is returned as a [`ListingError`]; a partial
    /// listing is never returned.
    async fn project_infos(
        &self,
        ctx: &RunContext,
        config: &ProviderConfig,
        apply_filtering: bool,
    ) -> Result<Vec<ProjectInfo>> {
        let listed = self.list_projects(ctx, config).await.map_err(|source| ListingError {
            provider: config.provider.to_string(),
            owner: config.owner().to_string(),
            source,
        })?;

        let projects: Vec<ProjectInfo> = listed
            .into_iter()
            .filter(|project| {
                if project.has_clone_url() {
                    true
                } else {
                    warn!(repository = project.name(), "repository has no clone url, ignoring");
                    false
                }
            })
            .collect();

        debug!(
            provider = %self.provider(),
            total = projects.len(),
            "listed repositories"
        );

        if !apply_filtering {
            return Ok(projects);
        }

        Ok(filter::filter_project_infos(ctx, config, self.validator(), &projects)?)
    }

    /// Create a repository in the configured namespace, returning its identifier
    async fn create(&self, ctx: &RunContext, config: &ProviderConfig, opt: &CreateOption) -> Result<String>;

    /// Point the repository's default branch at `branch`
    async fn default_branch(&self, ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()>;

    /// Protect `branch`; providers without protection support do nothing
    async fn protect(&self, ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()>;

    /// Remove protection from `branch`; providers without protection support do nothing
    async fn unprotect(&self, ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()>;
}

/// Builds the gateway for a provider config; swapped out in tests
pub type GatewayFactory = Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn ProviderGateway>> + Send + Sync>;

/// Gateway for a hosted provider config
pub fn connect(config: &ProviderConfig) -> Result<Arc<dyn ProviderGateway>> {
    match config.provider {
        ProviderType::Github => Ok(Arc::new(github::GitHubGateway::new(config)?)),
        ProviderType::Gitlab => Ok(Arc::new(gitlab::GitLabGateway::new(config)?)),
        ProviderType::Gitea => Ok(Arc::new(gitea::GiteaGateway::new(config)?)),
        ProviderType::GenericGit => Ok(Arc::new(generic::GenericGitGateway::new())),
        ProviderType::Directory | ProviderType::Archive => Err(anyhow!(
            "{} is a local target and has no provider gateway",
            config.provider
        )),
    }
}

/// Factory backed by [`connect`]
pub fn default_factory() -> GatewayFactory {
    Arc::new(connect)
}

/// Username paired with the token in https clone and push URLs
pub fn credential_user(config: &ProviderConfig) -> &str {
    match config.provider {
        ProviderType::Github => "x-access-token",
        ProviderType::Gitlab => "oauth2",
        _ if !config.user.is_empty() => &config.user,
        _ => "git",
    }
}

/// URL used to clone `project` from the source described by `config`
pub fn clone_url(config: &ProviderConfig, project: &ProjectInfo) -> Result<String> {
    if config.git.transport == Transport::Ssh && !project.ssh_url.is_empty() {
        return Ok(project.ssh_url.clone());
    }

    if project.https_url.is_empty() {
        return Ok(project.ssh_url.clone());
    }

    match config.token() {
        Some(token) if project.https_url.starts_with("http") => {
            git::with_credentials(&project.https_url, credential_user(config), &token)
        }
        _ => Ok(project.https_url.clone()),
    }
}

/// Remote URL of repository `name` in the namespace of a hosted target,
/// without credentials
pub fn remote_url(config: &ProviderConfig, name: &str) -> String {
    match config.git.transport {
        Transport::Ssh => format!("git@{}:{}/{}.git", config.domain(), config.owner(), name),
        Transport::Https => format!("{}/{}/{}.git", config.base_url(), config.owner(), name),
    }
}

/// [`remote_url`] with the target's token embedded for https pushes
pub fn push_url(config: &ProviderConfig, name: &str) -> Result<String> {
    let url = remote_url(config, name);
    match (config.git.transport, config.token()) {
        (Transport::Https, Some(token)) => git::with_credentials(&url, credential_user(config), &token),
        _ => Ok(url),
    }
}
