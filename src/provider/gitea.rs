//! Gitea REST v1 adapter

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::pagination::{self, Page};
use super::rest::{RestClient, TokenHeader};
use super::ProviderGateway;
use crate::config::{ProviderConfig, ProviderType};
use crate::metainfo::RunContext;
use crate::model::{CreateOption, ProjectInfo, Visibility};

/// Gitea's default `MAX_RESPONSE_ITEMS`
const PAGE_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
struct GiteaRepository {
    id: u64,
    name: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    clone_url: Option<String>,
    #[serde(default)]
    ssh_url: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    internal: bool,
    #[serde(default)]
    fork: bool,
}

impl GiteaRepository {
    fn visibility(&self) -> Visibility {
        if self.private {
            Visibility::Private
        } else if self.internal {
            Visibility::Internal
        } else {
            Visibility::Public
        }
    }

    fn into_project_info(self) -> Option<ProjectInfo> {
        let visibility = self.visibility();
        let project = ProjectInfo::new(self.name)?
            .with_urls(self.clone_url.unwrap_or_default(), self.ssh_url.unwrap_or_default())
            .with_description(self.description)
            .with_default_branch(self.default_branch)
            .with_last_activity(self.updated_at)
            .with_visibility(visibility)
            .with_project_id(Some(self.id.to_string()))
            .with_fork(self.fork);
        Some(project)
    }
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    default_branch: &'a str,
    private: bool,
}

pub struct GiteaGateway {
    client: RestClient,
}

impl GiteaGateway {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let auth = match config.token() {
            Some(token) => TokenHeader::Token(token),
            None => TokenHeader::Anonymous,
        };
        Ok(Self::with_client(RestClient::new(
            format!("{}/api/v1", config.base_url()),
            auth,
        )?))
    }

    pub fn with_client(client: RestClient) -> Self {
        Self { client }
    }

    async fn list_page(&self, config: &ProviderConfig, page: u32) -> Result<Page<GiteaRepository>> {
        let path = if config.is_group() {
            format!("/orgs/{}/repos", config.group)
        } else {
            format!("/users/{}/repos", config.user)
        };
        let query = [("page", page.to_string()), ("limit", PAGE_LIMIT.to_string())];

        let items: Vec<GiteaRepository> = self
            .client
            .get(&path, &query)
            .await
            .with_context(|| format!("failed to fetch repositories page {}", page))?;

        Ok(Page::sized(items, page, PAGE_LIMIT))
    }
}

#[async_trait]
impl ProviderGateway for GiteaGateway {
    fn provider(&self) -> ProviderType {
        ProviderType::Gitea
    }

    async fn list_projects(&self, _ctx: &RunContext, config: &ProviderConfig) -> Result<Vec<ProjectInfo>> {
        let repositories = pagination::collect_all(1, |page| self.list_page(config, page)).await?;
        debug!(total_repositories = repositories.len(), "found repositories");

        Ok(repositories
            .into_iter()
            .filter_map(GiteaRepository::into_project_info)
            .collect())
    }

    async fn create(&self, _ctx: &RunContext, config: &ProviderConfig, opt: &CreateOption) -> Result<String> {
        let path = if config.is_group() {
            format!("/orgs/{}/repos", config.group)
        } else {
            "/user/repos".to_string()
        };

        let request = CreateRepoRequest {
            name: &opt.repository_name,
            description: &opt.description,
            default_branch: &opt.default_branch,
            private: opt.visibility != Visibility::Public,
        };

        let created: GiteaRepository = self
            .client
            .send_json(Method::POST, &path, &request)
            .await
            .with_context(|| format!("failed to create repository {}", opt.repository_name))?;

        let identifier = created.full_name.unwrap_or(created.name);
        info!(repository = %identifier, "created Gitea repository");
        Ok(identifier)
    }

    async fn default_branch(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        let _: Value = self
            .client
            .send_json(
                Method::PATCH,
                &format!("/repos/{}/{}", owner, name),
                &serde_json::json!({ "default_branch": branch }),
            )
            .await
            .with_context(|| format!("set default branch of {}", name))?;
        Ok(())
    }

    // Branch protection is not managed on Gitea
    async fn protect(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        debug!(owner, name, branch, "gitea: protect is a no-op");
        Ok(())
    }

    async fn unprotect(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        debug!(owner, name, branch, "gitea: unprotect is a no-op");
        Ok(())
    }
}
