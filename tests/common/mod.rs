//! Common test utilities and helpers for repomirror tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use repomirror::config::{GitOption, LoggingConfig, SyncConfig};
use repomirror::provider::GatewayFactory;
use repomirror::{
    Config, CreateOption, LocalRepository, ProjectInfo, ProviderConfig, ProviderGateway, ProviderType,
    PullOption, PushOption, RunContext,
};

pub const SOURCE_DOMAIN: &str = "src.example.com";

/// Ordered record of every side effect, shared by the fakes of one test
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls starting with `prefix`, in order
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }
}

/// Repository as listed by a fake provider
pub fn project(name: &str, domain: &str, owner: &str) -> ProjectInfo {
    ProjectInfo::new(name)
        .unwrap()
        .with_urls(
            format!("https://{}/{}/{}.git", domain, owner, name),
            format!("git@{}:{}/{}.git", domain, owner, name),
        )
        .with_default_branch(Some("main".to_string()))
}

pub fn source_project(name: &str) -> ProjectInfo {
    project(name, SOURCE_DOMAIN, "team")
}

/// In-memory provider recording every write
pub struct FakeGateway {
    provider: ProviderType,
    projects: Vec<ProjectInfo>,
    fail_listing: bool,
    fail_create: Vec<String>,
    log: CallLog,
}

impl FakeGateway {
    pub fn new(provider: ProviderType, log: CallLog) -> Self {
        Self {
            provider,
            projects: Vec::new(),
            fail_listing: false,
            fail_create: Vec::new(),
            log,
        }
    }

    pub fn with_projects(mut self, projects: Vec<ProjectInfo>) -> Self {
        self.projects = projects;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_create(mut self, name: &str) -> Self {
        self.fail_create.push(name.to_string());
        self
    }
}

#[async_trait]
impl ProviderGateway for FakeGateway {
    fn provider(&self) -> ProviderType {
        self.provider
    }

    async fn list_projects(&self, _ctx: &RunContext, config: &ProviderConfig) -> Result<Vec<ProjectInfo>> {
        self.log.push(format!("list:{}", config.describe()));
        if self.fail_listing {
            return Err(anyhow!("503 Service Unavailable"));
        }
        Ok(self.projects.clone())
    }

    async fn create(&self, _ctx: &RunContext, config: &ProviderConfig, opt: &CreateOption) -> Result<String> {
        self.log
            .push(format!("create:{}:{}", config.domain(), opt.repository_name));
        if self.fail_create.contains(&opt.repository_name) {
            return Err(anyhow!("name already taken"));
        }
        Ok(format!("{}/{}", config.owner(), opt.repository_name))
    }

    async fn default_branch(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        self.log.push(format!("default_branch:{}/{}:{}", owner, name, branch));
        Ok(())
    }

    async fn protect(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        self.log.push(format!("protect:{}/{}:{}", owner, name, branch));
        Ok(())
    }

    async fn unprotect(&self, _ctx: &RunContext, owner: &str, name: &str, branch: &str) -> Result<()> {
        self.log.push(format!("unprotect:{}/{}:{}", owner, name, branch));
        Ok(())
    }
}

/// Factory resolving gateways by endpoint domain
pub fn factory(gateways: Vec<(&str, FakeGateway)>) -> GatewayFactory {
    let gateways: HashMap<String, Arc<dyn ProviderGateway>> = gateways
        .into_iter()
        .map(|(domain, gateway)| (domain.to_string(), Arc::new(gateway) as Arc<dyn ProviderGateway>))
        .collect();

    Arc::new(move |config: &ProviderConfig| {
        gateways
            .get(config.domain())
            .cloned()
            .ok_or_else(|| anyhow!("no fake gateway for {}", config.domain()))
    })
}

/// Git transfer that only records what it was asked to do
#[derive(Default)]
pub struct FakeGit {
    /// Branch heads keyed by a substring of the location
    heads: Vec<(String, String)>,
    fail_pull: Vec<String>,
    fail_push: Vec<String>,
    /// `init` leaves a marked `.git/config` behind like the real CLI
    materialize: bool,
    cancel_on_pull: Option<CancellationToken>,
    log: CallLog,
}

impl FakeGit {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn with_head(mut self, location: &str, sha: &str) -> Self {
        self.heads.push((location.to_string(), sha.to_string()));
        self
    }

    pub fn failing_pull(mut self, name: &str) -> Self {
        self.fail_pull.push(name.to_string());
        self
    }

    /// Fail pushes whose target contains `location`
    pub fn failing_push(mut self, location: &str) -> Self {
        self.fail_push.push(location.to_string());
        self
    }

    pub fn with_materialized_init(mut self) -> Self {
        self.materialize = true;
        self
    }

    /// Cancel `token` as soon as the first pull starts
    pub fn cancelling_on_pull(mut self, token: CancellationToken) -> Self {
        self.cancel_on_pull = Some(token);
        self
    }
}

#[async_trait]
impl repomirror::GitTransfer for FakeGit {
    async fn pull(&self, opt: &PullOption, _target_dir: &Path) -> Result<()> {
        self.log.push(format!("pull:{}", opt.name()));
        if let Some(token) = &self.cancel_on_pull {
            token.cancel();
        }
        if self.fail_pull.iter().any(|n| n == opt.name()) {
            return Err(anyhow!("fatal: repository not found"));
        }
        Ok(())
    }

    async fn push(&self, repo: &LocalRepository, opt: &PushOption, _git_opt: &GitOption) -> Result<()> {
        let target = strip_credentials(opt.target());
        self.log.push(format!("push:{}:{}", repo.project().name(), target));
        if self.fail_push.iter().any(|l| target.contains(l.as_str())) {
            return Err(anyhow!("remote rejected"));
        }
        Ok(())
    }

    async fn init(&self, dir: &Path) -> Result<()> {
        self.log.push(format!("init:{}", dir.display()));
        if self.materialize {
            std::fs::create_dir_all(dir.join(".git"))?;
            std::fs::write(dir.join(".git").join("config"), "[repomirror]\n\tmanaged = true\n")?;
        }
        Ok(())
    }

    async fn set_remote_and_branch(&self, _repo: &LocalRepository, dir: &Path) -> Result<()> {
        self.log.push(format!("set_remote:{}", dir.display()));
        Ok(())
    }

    async fn set_default_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        self.log.push(format!("set_default_branch:{}:{}", dir.display(), branch));
        Ok(())
    }

    async fn ref_head(&self, location: &str, _branch: &str) -> Result<Option<String>> {
        Ok(self
            .heads
            .iter()
            .find(|(key, _)| location.contains(key.as_str()))
            .map(|(_, sha)| sha.clone()))
    }
}

fn strip_credentials(url: &str) -> String {
    match (url.find("://"), url.find('@')) {
        (Some(scheme), Some(at)) if at > scheme => format!("{}{}", &url[..scheme + 3], &url[at + 1..]),
        _ => url.to_string(),
    }
}

/// Hosted endpoint on a fake domain
pub fn hosted(domain: &str, group: &str) -> ProviderConfig {
    ProviderConfig::new(ProviderType::Gitea)
        .with_domain(domain)
        .with_group(group)
}

/// Run configuration with a Gitea-like source and the given targets
pub fn config(targets: Vec<ProviderConfig>, work_dir: &Path) -> Config {
    Config {
        source: hosted(SOURCE_DOMAIN, "team"),
        targets,
        sync: SyncConfig {
            work_dir: Some(work_dir.to_string_lossy().into_owned()),
            ..SyncConfig::default()
        },
        logging: LoggingConfig::default(),
    }
}

/// Temporary directory holding a config file for CLI tests
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config_path = self.temp_dir.path().join("config.yml");
        std::fs::write(&config_path, content).expect("Failed to write test config");
        config_path
    }

    pub fn create_minimal_config(&self) -> PathBuf {
        let config_content = r#"
source:
  provider: gitlab
  group: platform
targets:
  - provider: directory
    path: /srv/mirror
  - provider: archive
    path: /srv/backup
sync:
  max_parallel: 2
"#;
        self.create_test_config(config_content)
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
