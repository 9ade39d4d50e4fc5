//! Provider-independent repository metadata and transfer directives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Branch used when a provider reports no default branch.
pub const FALLBACK_DEFAULT_BRANCH: &str = "main";

/// Repository visibility, normalised across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }

    /// Unrecognised values map to `Public`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Visibility::Private,
            "internal" | "limited" => Visibility::Internal,
            _ => Visibility::Public,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical repository metadata.
///
/// Built only through [`ProjectInfo::new`], which refuses empty names, so a
/// value of this type always has a usable `original_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    original_name: String,
    pub https_url: String,
    pub ssh_url: String,
    pub description: Option<String>,
    pub default_branch: String,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub visibility: Visibility,
    pub project_id: Option<String>,
    /// Set by the provider binding; the filter pipeline only reads it.
    pub is_fork: bool,
}

impl ProjectInfo {
    pub fn new(original_name: impl Into<String>) -> Option<Self> {
        let original_name = original_name.into();
        if original_name.trim().is_empty() {
            return None;
        }

        Some(Self {
            original_name,
            https_url: String::new(),
            ssh_url: String::new(),
            description: None,
            default_branch: FALLBACK_DEFAULT_BRANCH.to_string(),
            last_activity_at: None,
            visibility: Visibility::Public,
            project_id: None,
            is_fork: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.original_name
    }

    pub fn with_urls(mut self, https_url: impl Into<String>, ssh_url: impl Into<String>) -> Self {
        self.https_url = https_url.into();
        self.ssh_url = ssh_url.into();
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    /// Empty or missing branches fall back to [`FALLBACK_DEFAULT_BRANCH`].
    pub fn with_default_branch(mut self, branch: Option<String>) -> Self {
        self.default_branch = branch
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_DEFAULT_BRANCH.to_string());
        self
    }

    pub fn with_last_activity(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_activity_at = at;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_project_id(mut self, id: Option<String>) -> Self {
        self.project_id = id;
        self
    }

    pub fn with_fork(mut self, is_fork: bool) -> Self {
        self.is_fork = is_fork;
        self
    }

    /// At least one clone endpoint is known.
    pub fn has_clone_url(&self) -> bool {
        !self.https_url.is_empty() || !self.ssh_url.is_empty()
    }
}

/// Options for creating a repository on a target provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOption {
    pub repository_name: String,
    pub description: String,
    pub default_branch: String,
    pub visibility: Visibility,
    /// Turn off issues, wiki and similar features on the mirror.
    pub disable_features: bool,
}

impl CreateOption {
    pub fn from_project(project: &ProjectInfo) -> Self {
        Self {
            repository_name: project.name().to_string(),
            description: project.description.clone().unwrap_or_default(),
            default_branch: project.default_branch.clone(),
            visibility: project.visibility,
            disable_features: true,
        }
    }
}

/// Push directive, built once per transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOption {
    /// Remote URL or local path receiving the push.
    target: String,
    force: bool,
    all_refs: bool,
}

impl PushOption {
    pub fn new(target: impl Into<String>, force: bool, all_refs: bool) -> Self {
        Self {
            target: target.into(),
            force,
            all_refs,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn all_refs(&self) -> bool {
        self.all_refs
    }
}

/// Pull directive, built once per transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOption {
    name: String,
    url: String,
}

impl PullOption {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A source repository cloned into a local working directory
#[derive(Debug, Clone)]
pub struct LocalRepository {
    path: PathBuf,
    project: ProjectInfo,
    /// Source URL without credentials, recorded as `origin` on local targets.
    origin_url: String,
}

impl LocalRepository {
    pub fn new(path: impl Into<PathBuf>, project: ProjectInfo, origin_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            project,
            origin_url: origin_url.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn project(&self) -> &ProjectInfo {
        &self.project
    }

    pub fn origin_url(&self) -> &str {
        &self.origin_url
    }
}
