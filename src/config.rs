use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Main configuration structure for a mirror run
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Where repositories are read from
    pub source: ProviderConfig,

    /// Where repositories are mirrored to, in order
    #[serde(default)]
    pub targets: Vec<ProviderConfig>,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kind of endpoint a provider config points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    #[serde(alias = "GitHub")]
    Github,
    #[serde(alias = "GitLab")]
    Gitlab,
    #[serde(alias = "Gitea")]
    Gitea,
    Directory,
    Archive,
    #[serde(alias = "generic", alias = "git")]
    GenericGit,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Github => "github",
            ProviderType::Gitlab => "gitlab",
            ProviderType::Gitea => "gitea",
            ProviderType::Directory => "directory",
            ProviderType::Archive => "archive",
            ProviderType::GenericGit => "generic-git",
        }
    }

    /// Public host used when `domain` is left empty
    pub fn default_domain(&self) -> &'static str {
        match self {
            ProviderType::Github => "github.com",
            ProviderType::Gitlab => "gitlab.com",
            ProviderType::Gitea => "gitea.com",
            ProviderType::Directory | ProviderType::Archive | ProviderType::GenericGit => "",
        }
    }

    /// Local filesystem targets
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderType::Directory | ProviderType::Archive)
    }

    fn token_env_var(&self) -> Option<&'static str> {
        match self {
            ProviderType::Github => Some("GITHUB_TOKEN"),
            ProviderType::Gitlab => Some("GITLAB_TOKEN"),
            ProviderType::Gitea => Some("GITEA_TOKEN"),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One endpoint, either the source or a target
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub provider: ProviderType,

    /// Hostname; empty means the provider's public default
    #[serde(default)]
    pub domain: String,

    /// Personal namespace (mutually exclusive with `group`)
    #[serde(default)]
    pub user: String,

    /// Organisation or group namespace (mutually exclusive with `user`)
    #[serde(default)]
    pub group: String,

    /// Include forked repositories
    #[serde(default)]
    pub include_forks: bool,

    /// Repository filtering options
    #[serde(default)]
    pub filters: FilterOptions,

    /// API credentials
    #[serde(default)]
    pub auth: AuthConfig,

    /// Git transport options
    #[serde(default)]
    pub git: GitOption,

    /// Directory root (directory target) or output directory (archive target)
    #[serde(default)]
    pub path: Option<String>,

    /// Explicit clone URLs for generic git sources
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// Repository filtering options
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FilterOptions {
    /// Glob patterns; empty keeps everything
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns applied after inclusion
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Activity window
    #[serde(default)]
    pub activity: Option<ActivityConfig>,
}

/// Activity window as written in the config file
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ActivityConfig {
    /// Shorthand relative window ending now: "30d", "2w", "3month", "1y"
    pub max_age: Option<String>,

    /// Inclusive lower bound
    pub after: Option<DateTime<Utc>>,

    /// Exclusive upper bound
    pub before: Option<DateTime<Utc>>,
}

/// Half-open time window `[start, end)`; a missing bound is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivityInterval {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ActivityInterval {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| *at >= start) && self.end.map_or(true, |end| *at < end)
    }
}

impl ActivityConfig {
    /// Resolve the configured window against `now`
    pub fn interval(&self, now: DateTime<Utc>) -> Result<ActivityInterval, ConfigError> {
        let mut start = self.after;

        if let Some(max_age) = &self.max_age {
            let age = parse_age(max_age).ok_or_else(|| {
                ConfigError::InvalidInterval(format!("unrecognised max_age '{}'", max_age))
            })?;
            let cutoff = now.checked_sub_signed(age).ok_or_else(|| {
                ConfigError::InvalidInterval(format!("max_age '{}' reaches before the earliest date", max_age))
            })?;
            start = Some(start.map_or(cutoff, |s| s.max(cutoff)));
        }

        if let (Some(start), Some(end)) = (start, self.before) {
            if start >= end {
                return Err(ConfigError::InvalidInterval(format!(
                    "window start {} is not before end {}",
                    start, end
                )));
            }
        }

        Ok(ActivityInterval::new(start, self.before))
    }
}

/// Parse age shorthands like "30d", "2w", "3month", "1y"
pub fn parse_age(age: &str) -> Option<Duration> {
    let age = age.trim().to_lowercase();
    let split = age.find(|c: char| !c.is_ascii_digit())?;
    let (value, unit) = age.split_at(split);
    let value: i64 = value.parse().ok()?;

    match unit.trim() {
        "d" | "day" | "days" => Duration::try_days(value),
        "w" | "week" | "weeks" => Duration::try_weeks(value),
        "month" | "months" | "mo" => Duration::try_days(value.checked_mul(30)?),
        "y" | "year" | "years" => Duration::try_days(value.checked_mul(365)?),
        _ => None,
    }
}

/// API credentials for a provider
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AuthConfig {
    /// Access token; falls back to the provider's token environment variable
    #[serde(default)]
    pub token: Option<String>,

    /// API scheme, "https" unless a self-hosted instance speaks plain http
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

/// Git transport used for clone and push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Https,
    Ssh,
}

/// Git-level options for one endpoint
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GitOption {
    #[serde(default)]
    pub transport: Transport,

    /// Push every branch and tag, not only the default branch
    #[serde(default = "default_true")]
    pub all_refs: bool,
}

impl Default for GitOption {
    fn default() -> Self {
        Self {
            transport: Transport::Https,
            all_refs: true,
        }
    }
}

/// Branch protection handling on provider targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionMode {
    #[default]
    Leave,
    Protect,
    Unprotect,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Log the would-be actions without writing anything
    #[serde(default)]
    pub dry_run: bool,

    /// Maximum repositories transferred concurrently
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Parent of per-attempt working directories (system temp if unset)
    #[serde(default)]
    pub work_dir: Option<String>,

    /// Overwrite diverged target history
    #[serde(default = "default_true")]
    pub force_push: bool,

    /// Default branch protection on provider targets
    #[serde(default)]
    pub protection: ProtectionMode,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "pretty", "full"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_scheme() -> String {
    "https".to_string()
}
fn default_max_parallel() -> usize {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_parallel: default_max_parallel(),
            work_dir: None,
            force_push: default_true(),
            protection: ProtectionMode::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

impl ProviderConfig {
    pub fn new(provider: ProviderType) -> Self {
        Self {
            provider,
            domain: String::new(),
            user: String::new(),
            group: String::new(),
            include_forks: false,
            filters: FilterOptions::default(),
            auth: AuthConfig {
                token: None,
                scheme: default_scheme(),
            },
            git: GitOption::default(),
            path: None,
            repositories: Vec::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// True iff the config targets an organisational namespace
    pub fn is_group(&self) -> bool {
        !self.group.is_empty() && self.user.is_empty()
    }

    /// Owning namespace: the group when set, otherwise the user
    pub fn owner(&self) -> &str {
        if self.is_group() {
            &self.group
        } else {
            &self.user
        }
    }

    /// Domain with the provider default applied
    pub fn domain(&self) -> &str {
        if self.domain.is_empty() {
            self.provider.default_domain()
        } else {
            &self.domain
        }
    }

    /// "user/group" as shown in logs and summaries
    pub fn user_group(&self) -> String {
        format!("{}/{}", self.user, self.group)
    }

    /// Base URL of the provider's web/API host
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.auth.scheme, self.domain())
    }

    /// Token from config, else from the provider's environment variable
    pub fn token(&self) -> Option<String> {
        self.auth
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.provider
                    .token_env_var()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|t| !t.is_empty())
            })
    }

    /// Expanded filesystem path for local targets
    pub fn target_path(&self) -> Option<PathBuf> {
        self.path.as_ref().map(PathBuf::from)
    }

    /// Human readable endpoint description
    pub fn describe(&self) -> String {
        match self.provider {
            ProviderType::Directory | ProviderType::Archive => format!(
                "{}:{}",
                self.provider,
                self.path.as_deref().unwrap_or_default()
            ),
            _ => format!("{}:{}/{}", self.provider, self.domain(), self.owner()),
        }
    }

    /// Check the config invariants for the given role ("source" or "target")
    pub fn validate(&self, role: &str) -> Result<(), ConfigError> {
        if self.provider.is_local() {
            if self.path.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingPath {
                    role: role.to_string(),
                    provider: self.provider.to_string(),
                });
            }
            return Ok(());
        }

        match (self.user.is_empty(), self.group.is_empty()) {
            (false, false) => Err(ConfigError::BothUserAndGroup {
                role: role.to_string(),
                user: self.user.clone(),
                group: self.group.clone(),
            }),
            (true, true) => Err(ConfigError::NeitherUserNorGroup {
                role: role.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Resolved activity window, if one is configured
    pub fn activity_interval(&self, now: DateTime<Utc>) -> Result<Option<ActivityInterval>, ConfigError> {
        self.filters
            .activity
            .as_ref()
            .map(|activity| activity.interval(now))
            .transpose()
    }

    fn expand(&mut self) -> Result<()> {
        if let Some(path) = &self.path {
            self.path = Some(
                shellexpand::full(path)
                    .context("Failed to expand path")?
                    .into_owned(),
            );
        }

        if let Some(token) = &self.auth.token {
            self.auth.token = Some(
                shellexpand::env(token)
                    .context("Failed to expand token")?
                    .into_owned(),
            );
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path)
    }

    /// Load and validate configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from YAML without validating it
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repomirror").join("config.yml"))
    }

    /// Expand environment variables in configuration paths and tokens
    pub fn expand_paths(&mut self) -> Result<()> {
        self.source.expand()?;
        for target in &mut self.targets {
            target.expand()?;
        }

        if let Some(work_dir) = &self.sync.work_dir {
            self.sync.work_dir = Some(
                shellexpand::full(work_dir)
                    .context("Failed to expand work_dir path")?
                    .into_owned(),
            );
        }

        Ok(())
    }

    /// Enforce every configuration invariant before a run starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.provider.is_local() {
            return Err(ConfigError::NotListable {
                provider: self.source.provider.to_string(),
            });
        }

        if self.source.provider == ProviderType::GenericGit {
            if self.source.repositories.is_empty() {
                return Err(ConfigError::NoRepositories);
            }
        } else {
            self.source.validate("source")?;
        }

        self.source.activity_interval(Utc::now())?;

        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        for (index, target) in self.targets.iter().enumerate() {
            target.validate(&format!("target #{}", index + 1))?;
        }

        Ok(())
    }

    /// Working directory parent for transfer attempts
    pub fn work_dir(&self) -> PathBuf {
        self.sync
            .work_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }
}
