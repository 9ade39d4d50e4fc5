//! GitHub adapter built on octocrab

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::models::Repository;
use octocrab::Octocrab;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::pagination::{self, Page};
use super::ProviderGateway;
use crate::config::{ProviderConfig, ProviderType};
use crate::metainfo::RunContext;
use crate::model::{CreateOption, ProjectInfo, Visibility};

const PER_PAGE: u8 = 100;

#[derive(Debug, Serialize)]
struct UserRepoParams {
    #[serde(rename = "type")]
    kind: &'static str,
    sort: &'static str,
    per_page: u8,
    page: u32,
}

/// GitHub client wrapper
pub struct GitHubGateway {
    client: Octocrab,
}

impl GitHubGateway {
    /// Client for github.com, or for the `/api/v3` root of an Enterprise host
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();

        if config.domain() != ProviderType::Github.default_domain() {
            let base = format!("{}/api/v3", config.base_url());
            builder = builder
                .base_uri(base.as_str())
                .with_context(|| format!("Invalid GitHub API url: {}", base))?;
        }

        let client = match config.token() {
            Some(token) => builder.personal_token(token).build(),
            None => {
                warn!("No GitHub token configured, only public repositories are visible");
                builder.build()
            }
        }
        .context("Failed to create GitHub client")?;

        Ok(Self { client })
    }

    async fn list_page(&self, config: &ProviderConfig, page: u32) -> Result<Page<Repository>> {
        if config.is_group() {
            let page_number = u8::try_from(page)
                .map_err(|_| anyhow!("Reached maximum pagination limit (255 pages) for org: {}", config.group))?;

            let result = self
                .client
                .orgs(&config.group)
                .list_repos()
                .per_page(PER_PAGE)
                .page(page_number)
                .send()
                .await
                .with_context(|| {
                    format!(
                        "Failed to fetch repositories for organization {} page {}",
                        config.group, page
                    )
                })?;

            let next = result.next.is_some().then_some(page + 1);
            return Ok(Page::new(result.items, next));
        }

        let params = UserRepoParams {
            kind: "owner",
            sort: "full_name",
            per_page: PER_PAGE,
            page,
        };
        let items: Vec<Repository> = self
            .client
            .get(format!("/users/{}/repos", config.user), Some(&params))
            .await
            .with_context(|| format!("Failed to fetch repositories page {}", page))?;

        Ok(Page::sized(items, page, usize::from(PER_PAGE)))
    }
}

fn project_from(repo: Repository) -> Option<ProjectInfo> {
    let visibility = match (&repo.visibility, repo.private) {
        (Some(visibility), _) => Visibility::parse(visibility),
        (None, Some(true)) => Visibility::Private,
        _ => Visibility::Public,
    };

    let project = ProjectInfo::new(repo.name)?
        .with_urls(
            repo.clone_url.map(|url| url.to_string()).unwrap_or_default(),
            repo.ssh_url.unwrap_or_default(),
        )
        .with_description(repo.description)
        .with_default_branch(repo.default_branch)
        .with_last_activity(repo.updated_at.or(repo.pushed_at))
        .with_visibility(visibility)
        .with_project_id(repo.full_name)
        .with_fork(repo.fork.unwrap_or(false));
    Some(project)
}

fn create_body(opt: &CreateOption) -> Value {
    let mut body = json!({
        "name": opt.repository_name,
        "description": opt.description,
        "private": opt.visibility != Visibility::Public,
        "allow_forking": true,
    });

    if opt.disable_features {
        if let Some(fields) = body.as_object_mut() {
            for feature in [
                "has_issues",
                "has_wiki",
                "has_projects",
                "has_downloads",
                "allow_squash_merge",
                "allow_merge_commit",
                "allow_rebase_merge",
                "allow_auto_merge",
                "delete_branch_on_merge",
            ] {
                fields.insert(feature.to_string(), Value::Bool(false));
            }
        }
    }

    body
}

#[async_trait]
impl ProviderGateway for GitHubGateway {
    fn provider(&self) -> ProviderType {
        ProviderType::Github
    }

    async fn list_projects(&self, _ctx: &RunContext, config: &ProviderConfig) -> Result<Vec<ProjectInfo>> {
        let repositories = pagination::collect_all(1, |page| self.list_page(config, page)).await?;
        info!("Found {} repositories for {}", repositories.len(), config.owner());

        Ok(repositories.into_iter().filter_map(project_from).collect())
    }

    async fn create(&self, _ctx: &RunContext, config: &ProviderConfig, opt: &CreateOption) -> Result<String> {
        let route = if config.is_group() {
            format!("/orgs/{}/repos", config.group)
        } else {
            "/user/repos".to_string()
        };

        let created: Repository = self
            .client
            .post(route, Some(&create_body(opt)))
            .await
            .with_context(|| format!("failed to create project {}", opt.repository_name))?;

        let identifier = created.full_name.unwrap_or(created.name);
        info!(repository = %identifier, "created GitHub repository");
        Ok(identifier)
    }

    async fn default_branch(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        let _: Repository = self
            .client
            .patch(
                format!("/repos/{}/{}", owner, name),
                Some(&json!({ "default_branch": branch })),
            )
            .await
            .with_context(|| format!("failed to set default branch of {}", name))?;
        Ok(())
    }

    async fn protect(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        let body = json!({
            "required_status_checks": null,
            "enforce_admins": false,
            "required_pull_request_reviews": null,
            "restrictions": null,
            "allow_force_pushes": false,
            "allow_deletions": false,
        });

        let _: Value = self
            .client
            .put(
                format!("/repos/{}/{}/branches/{}/protection", owner, name, branch),
                Some(&body),
            )
            .await
            .with_context(|| format!("failed to protect {} on {}", branch, name))?;
        Ok(())
    }

    async fn unprotect(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        let route = format!("/repos/{}/{}/branches/{}/protection", owner, name, branch);
        let response = self
            .client
            ._delete(route.as_str(), None::<&()>)
            .await
            .with_context(|| format!("failed to unprotect {} on {}", branch, name))?;

        // Branch was not protected
        if response.status().as_u16() == 404 {
            debug!(name, branch, "branch not protected");
            return Ok(());
        }

        octocrab::map_github_error(response)
            .await
            .with_context(|| format!("failed to unprotect {} on {}", branch, name))?;
        Ok(())
    }
}
