//! Plain git remotes without a management API
//!
//! As a source, the repositories are the configured clone URLs. As a target,
//! repositories must already exist; every management call is a no-op.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::ProviderGateway;
use crate::config::{ProviderConfig, ProviderType};
use crate::metainfo::RunContext;
use crate::model::{CreateOption, ProjectInfo};

#[derive(Debug, Clone, Default)]
pub struct GenericGitGateway;

impl GenericGitGateway {
    pub fn new() -> Self {
        Self
    }
}

/// Repository name from a clone URL: last path segment without `.git`
pub fn name_from_url(url: &str) -> Option<&str> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then_some(name)
}

fn is_ssh(url: &str) -> bool {
    url.starts_with("ssh://") || (!url.contains("://") && url.contains('@'))
}

#[async_trait]
impl ProviderGateway for GenericGitGateway {
    fn provider(&self) -> ProviderType {
        ProviderType::GenericGit
    }

    async fn list_projects(&self, _ctx: &RunContext, config: &ProviderConfig) -> Result<Vec<ProjectInfo>> {
        let projects = config
            .repositories
            .iter()
            .filter_map(|url| {
                let project = ProjectInfo::new(name_from_url(url)?)?;
                Some(if is_ssh(url) {
                    project.with_urls("", url.as_str())
                } else {
                    project.with_urls(url.as_str(), "")
                })
            })
            .collect();

        Ok(projects)
    }

    async fn create(&self, _ctx: &RunContext, config: &ProviderConfig, opt: &CreateOption) -> Result<String> {
        debug!(repository = %opt.repository_name, "generic git: repository must already exist");
        Ok(super::remote_url(config, &opt.repository_name))
    }

    async fn default_branch(&self, _ctx: &RunContext, _owner: &str, _name: &str, _branch: &str) -> Result<()> {
        Ok(())
    }

    async fn protect(&self, _ctx: &RunContext, _owner: &str, _name: &str, _branch: &str) -> Result<()> {
        Ok(())
    }

    async fn unprotect(&self, _ctx: &RunContext, _owner: &str, _name: &str, _branch: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_url() {
        assert_eq!(name_from_url("https://git.example.com/team/alpha.git"), Some("alpha"));
        assert_eq!(name_from_url("git@example.com:team/beta.git"), Some("beta"));
        assert_eq!(name_from_url("git@example.com:gamma"), Some("gamma"));
        assert_eq!(name_from_url("https://example.com/team/delta/"), Some("delta"));
        assert_eq!(name_from_url(""), None);
    }

    #[tokio::test]
    async fn test_lists_configured_urls_in_order() {
        let mut config = ProviderConfig::new(ProviderType::GenericGit);
        config.repositories = vec![
            "https://git.example.com/team/alpha.git".to_string(),
            "git@example.com:team/beta.git".to_string(),
        ];

        let projects = GenericGitGateway::new()
            .list_projects(&RunContext::new(), &config)
            .await
            .unwrap();

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name(), "alpha");
        assert_eq!(projects[0].https_url, "https://git.example.com/team/alpha.git");
        assert_eq!(projects[1].ssh_url, "git@example.com:team/beta.git");
    }
}
