//! Filter pipeline deciding which repositories are in scope
//!
//! Stages run in a fixed order and a repository dropped by one stage is never
//! seen by the next:
//!
//! 1. naming validity (`invalid`)
//! 2. fork exclusion (`fork`)
//! 3. include patterns (`notincluded`)
//! 4. exclude patterns (`excluded`)
//! 5. activity interval (`inactive`)
//!
//! The input is never mutated; survivors keep their relative order.

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::config::{ActivityInterval, ProviderConfig};
use crate::error::ConfigError;
use crate::metainfo::{Category, RunContext};
use crate::model::ProjectInfo;
use crate::naming::NameValidator;

/// Compiled glob pattern (`*` any run, `?` one character), case-sensitive
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn compile(patterns: &[String]) -> Result<Vec<NamePattern>, ConfigError> {
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| NamePattern::new(p))
        .collect()
}

/// Filtering rules resolved from a provider config
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    include_forks: bool,
    include: Vec<NamePattern>,
    exclude: Vec<NamePattern>,
    interval: Option<ActivityInterval>,
}

impl FilterPipeline {
    pub fn new(config: &ProviderConfig, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        Ok(Self {
            include_forks: config.include_forks,
            include: compile(&config.filters.include)?,
            exclude: compile(&config.filters.exclude)?,
            interval: config.activity_interval(now)?,
        })
    }

    /// First stage that drops `project`, if any
    pub fn verdict(&self, validator: &dyn NameValidator, project: &ProjectInfo) -> Option<Category> {
        let name = project.name();

        if !validator.is_valid(name) {
            return Some(Category::Invalid);
        }

        if !self.include_forks && project.is_fork {
            return Some(Category::Fork);
        }

        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(name)) {
            return Some(Category::NotIncluded);
        }

        if self.exclude.iter().any(|p| p.matches(name)) {
            return Some(Category::Excluded);
        }

        match (&self.interval, &project.last_activity_at) {
            (Some(interval), Some(at)) if !interval.contains(at) => Some(Category::Inactive),
            _ => None,
        }
    }

    /// Keep the in-scope projects, recording each drop in the run context
    pub fn apply(
        &self,
        ctx: &RunContext,
        validator: &dyn NameValidator,
        projects: &[ProjectInfo],
    ) -> Vec<ProjectInfo> {
        let mut kept = Vec::with_capacity(projects.len());

        for project in projects {
            match self.verdict(validator, project) {
                None => kept.push(project.clone()),
                Some(category) => {
                    debug!(
                        repository = project.name(),
                        reason = category.as_str(),
                        "filtered out repository"
                    );
                    ctx.record(category, project.name());
                }
            }
        }

        kept
    }
}

/// Filter `projects` with the rules from `config`
pub fn filter_project_infos(
    ctx: &RunContext,
    config: &ProviderConfig,
    validator: &dyn NameValidator,
    projects: &[ProjectInfo],
) -> Result<Vec<ProjectInfo>, ConfigError> {
    let pipeline = FilterPipeline::new(config, Utc::now())?;
    Ok(pipeline.apply(ctx, validator, projects))
}
