//! GitLab REST v4 adapter

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::pagination::{self, Page};
use super::rest::{self, RestClient, TokenHeader};
use super::ProviderGateway;
use crate::config::{ProviderConfig, ProviderType};
use crate::metainfo::RunContext;
use crate::model::{CreateOption, ProjectInfo, Visibility};

const PER_PAGE: u32 = 100;

/// Maintainer role, required to push to a protected branch
const MAINTAINER_ACCESS: u32 = 40;

#[derive(Debug, Deserialize)]
struct GitLabProject {
    id: u64,
    path: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    http_url_to_repo: Option<String>,
    #[serde(default)]
    ssh_url_to_repo: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default)]
    forked_from_project: Option<Value>,
}

impl GitLabProject {
    fn into_project_info(self) -> Option<ProjectInfo> {
        let project = ProjectInfo::new(self.path)?
            .with_urls(
                self.http_url_to_repo.unwrap_or_default(),
                self.ssh_url_to_repo.unwrap_or_default(),
            )
            .with_description(self.description)
            .with_default_branch(self.default_branch)
            .with_last_activity(self.last_activity_at)
            .with_visibility(Visibility::parse(self.visibility.as_deref().unwrap_or_default()))
            .with_project_id(Some(self.id.to_string()))
            .with_fork(self.forked_from_project.is_some_and(|v| !v.is_null()));
        Some(project)
    }
}

#[derive(Debug, Deserialize)]
struct GitLabGroup {
    id: u64,
    full_path: String,
}

#[derive(Debug, Serialize)]
struct CreateProjectRequest<'a> {
    name: &'a str,
    path: &'a str,
    description: &'a str,
    default_branch: &'a str,
    visibility: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    builds_access_level: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues_access_level: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wiki_access_level: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreatedProject {
    id: u64,
}

pub struct GitLabGateway {
    client: RestClient,
}

impl GitLabGateway {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let auth = match config.token() {
            Some(token) => TokenHeader::PrivateToken(token),
            None => TokenHeader::Anonymous,
        };
        Ok(Self::with_client(RestClient::new(
            format!("{}/api/v4", config.base_url()),
            auth,
        )?))
    }

    pub fn with_client(client: RestClient) -> Self {
        Self { client }
    }

    async fn list_page(&self, config: &ProviderConfig, page: u32) -> Result<Page<GitLabProject>> {
        let path = if config.is_group() {
            format!("/groups/{}/projects", rest::encode_path(&config.group))
        } else {
            format!("/users/{}/projects", rest::encode_path(&config.user))
        };

        let mut query = vec![
            ("order_by", "name".to_string()),
            ("sort", "asc".to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        if !config.is_group() {
            query.push(("owned", "true".to_string()));
        }

        let (items, headers) = self
            .client
            .get_with_headers::<Vec<GitLabProject>>(&path, &query)
            .await
            .with_context(|| format!("Failed to fetch repositories page {}", page))?;

        Ok(Page::new(items, rest::header_number(&headers, "x-next-page")))
    }

    /// Namespace to create projects in; `None` means the token owner's namespace
    async fn namespace_id(&self, config: &ProviderConfig) -> Result<Option<u64>> {
        if !config.is_group() {
            return Ok(None);
        }

        let groups: Vec<GitLabGroup> = self
            .client
            .get("/groups", &[("search", config.group.clone())])
            .await
            .map_err(|e| match rest::status_of(&e) {
                Some(StatusCode::UNAUTHORIZED) => {
                    anyhow!("authentication failed: please check your token permissions")
                }
                _ => e.context("search for group"),
            })?;

        let group = groups
            .iter()
            .find(|g| g.full_path == config.group)
            .or_else(|| groups.first())
            .ok_or_else(|| anyhow!("no group found with name: {}", config.group))?;

        Ok(Some(group.id))
    }

    fn project_path(owner: &str, name: &str) -> String {
        format!("/projects/{}", rest::encode_path(&format!("{}/{}", owner, name)))
    }
}

#[async_trait]
impl ProviderGateway for GitLabGateway {
    fn provider(&self) -> ProviderType {
        ProviderType::Gitlab
    }

    async fn list_projects(&self, _ctx: &RunContext, config: &ProviderConfig) -> Result<Vec<ProjectInfo>> {
        let projects = pagination::collect_all(1, |page| self.list_page(config, page)).await?;
        debug!(total_repositories = projects.len(), "found repositories");

        Ok(projects
            .into_iter()
            .filter_map(GitLabProject::into_project_info)
            .collect())
    }

    async fn create(&self, _ctx: &RunContext, config: &ProviderConfig, opt: &CreateOption) -> Result<String> {
        let namespace_id = self
            .namespace_id(config)
            .await
            .context("get namespace ID")?;

        let disabled = opt.disable_features.then_some("disabled");
        let request = CreateProjectRequest {
            name: &opt.repository_name,
            path: &opt.repository_name,
            description: &opt.description,
            default_branch: &opt.default_branch,
            visibility: opt.visibility.as_str(),
            namespace_id,
            builds_access_level: disabled,
            issues_access_level: disabled,
            wiki_access_level: disabled,
        };

        let created: CreatedProject = self
            .client
            .send_json(Method::POST, "/projects", &request)
            .await
            .with_context(|| format!("failed to create {}", opt.repository_name))?;

        info!(repository = %opt.repository_name, id = created.id, "created GitLab project");
        Ok(created.id.to_string())
    }

    async fn default_branch(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        let _: Value = self
            .client
            .send_json(
                Method::PUT,
                &Self::project_path(owner, name),
                &serde_json::json!({ "default_branch": branch }),
            )
            .await
            .with_context(|| format!("edit project default branch of {}", name))?;
        Ok(())
    }

    async fn protect(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        let path = format!("{}/protected_branches", Self::project_path(owner, name));
        let body = serde_json::json!({
            "name": branch,
            "push_access_level": MAINTAINER_ACCESS,
            "merge_access_level": MAINTAINER_ACCESS,
            "allow_force_push": false,
        });

        match self.client.send_json::<_, Value>(Method::POST, &path, &body).await {
            Ok(_) => Ok(()),
            // Already protected
            Err(e) if rest::status_of(&e) == Some(StatusCode::CONFLICT) => Ok(()),
            Err(e) => Err(e.context(format!("protect branch {} of {}", branch, name))),
        }
    }

    async fn unprotect(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        let path = format!(
            "{}/protected_branches/{}",
            Self::project_path(owner, name),
            rest::encode_path(branch)
        );
        self.client
            .delete(&path)
            .await
            .with_context(|| format!("unprotect branch {} of {}", branch, name))
    }
}
