//! Sync Engine - Orchestrates one mirror run
//!
//! A run lists the source, filters the listing, then transfers every
//! remaining repository to each configured target in configuration order.
//! Per-repository failures are recorded in the run's metainfo and never stop
//! the run; configuration and source listing failures abort it before any
//! transfer starts.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{TransferError, TransferStage};
use crate::filter;
use crate::git::{GitCli, GitTransfer};
use crate::metainfo::{Category, RunContext, SyncRunMetainfo};
use crate::model::{LocalRepository, ProjectInfo, PullOption, PushOption};
use crate::provider::{self, GatewayFactory};
use crate::target::{DefaultBranchHead, FreshnessStrategy, Target};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initialized,
    Listing,
    Filtering,
    Transferring,
    Summarizing,
    Complete,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Initialized => "initialized",
            RunState::Listing => "listing",
            RunState::Filtering => "filtering",
            RunState::Transferring => "transferring",
            RunState::Summarizing => "summarizing",
            RunState::Complete => "complete",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub state: RunState,
    pub meta: SyncRunMetainfo,
    pub dry_run: bool,
    pub cancelled: bool,
    pub duration: Duration,
}

/// How one repository's transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Synchronized,
    UpToDate,
    Cancelled,
    /// Failures and skips were already recorded against the repository
    Recorded,
}

/// A configured target, or the reason it could not be prepared
struct TargetSlot {
    description: String,
    target: Result<Target, String>,
}

/// The main sync engine that orchestrates repository mirroring
#[derive(Clone)]
pub struct SyncEngine {
    config: Arc<Config>,
    git: Arc<dyn GitTransfer>,
    gateways: GatewayFactory,
    freshness: Arc<dyn FreshnessStrategy>,
}

impl SyncEngine {
    /// Engine using the `git` CLI, the real provider APIs and default-branch freshness
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            git: Arc::new(GitCli::new()),
            gateways: provider::default_factory(),
            freshness: Arc::new(DefaultBranchHead),
        }
    }

    pub fn with_git(mut self, git: Arc<dyn GitTransfer>) -> Self {
        self.git = git;
        self
    }

    pub fn with_gateway_factory(mut self, gateways: GatewayFactory) -> Self {
        self.gateways = gateways;
        self
    }

    pub fn with_freshness(mut self, freshness: Arc<dyn FreshnessStrategy>) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn enter(&self, state: RunState) -> RunState {
        debug!(state = state.as_str(), "run state");
        state
    }

    /// Source listing, filtered unless `apply_filtering` is false
    pub async fn list_source(&self, ctx: &RunContext, apply_filtering: bool) -> Result<Vec<ProjectInfo>> {
        let gateway = (self.gateways)(&self.config.source)?;
        gateway.project_infos(ctx, &self.config.source, apply_filtering).await
    }

    /// Run a complete mirror operation
    pub async fn run(&self, ctx: &RunContext) -> Result<SyncOutcome> {
        let start_time = Instant::now();
        let config = &self.config;
        self.enter(RunState::Initialized);

        config.validate()?;

        info!(
            provider = %config.source.provider,
            domain = config.source.domain(),
            user_group = %config.source.user_group(),
            "syncing from"
        );
        for target in &config.targets {
            info!(target = %target.describe(), "targeting");
        }

        self.enter(RunState::Listing);
        let gateway = (self.gateways)(&config.source).context("Failed to connect to source provider")?;
        let listed = gateway.project_infos(ctx, &config.source, false).await?;

        self.enter(RunState::Filtering);
        let projects = filter::filter_project_infos(ctx, &config.source, gateway.validator(), &listed)?;
        ctx.meta().total = projects.len();
        info!("sync request: {} repositories", projects.len());

        if config.sync.dry_run {
            self.log_dry_run(&projects);
        } else {
            self.enter(RunState::Transferring);
            self.transfer_all(ctx, &projects).await;
        }

        self.enter(RunState::Summarizing);
        let cancelled = ctx.is_cancelled();
        if cancelled {
            warn!("run cancelled, remaining repositories were not started");
        }
        let meta = ctx.snapshot();

        let state = self.enter(RunState::Complete);
        let duration = start_time.elapsed();
        info!(
            total = meta.total,
            synchronized = meta.synchronized.len(),
            failed = meta.count(Category::Failed),
            "completed sync run in {:.2}s",
            duration.as_secs_f64()
        );

        Ok(SyncOutcome {
            state,
            meta,
            dry_run: config.sync.dry_run,
            cancelled,
            duration,
        })
    }

    fn log_dry_run(&self, projects: &[ProjectInfo]) {
        info!("dry-run enabled, skipping local clone");
        for project in projects {
            for target in &self.config.targets {
                info!(
                    repository = project.name(),
                    target = %target.describe(),
                    default_branch = %project.default_branch,
                    "dry-run: would mirror"
                );
            }
        }
    }

    async fn prepare_targets(&self, ctx: &RunContext) -> Vec<TargetSlot> {
        let mut slots = Vec::with_capacity(self.config.targets.len());

        for target_config in &self.config.targets {
            let description = target_config.describe();
            let target = Target::connect(
                ctx,
                target_config,
                &self.config.sync,
                self.config.work_dir(),
                &self.gateways,
                Arc::clone(&self.git),
            )
            .await
            .map_err(|e| {
                error!(target = %description, "failed to prepare target: {:#}", e);
                format!("{:#}", e)
            });

            slots.push(TargetSlot { description, target });
        }

        slots
    }

    async fn transfer_all(&self, ctx: &RunContext, projects: &[ProjectInfo]) {
        let slots = self.prepare_targets(ctx).await;

        // A target that could not be prepared fails every repository for that target only
        for slot in &slots {
            if let Err(reason) = &slot.target {
                let mut meta = ctx.meta();
                for project in projects {
                    meta.record_error(project.name(), &slot.description, reason.clone());
                }
            }
        }

        let parallel = self.config.sync.max_parallel.max(1);
        debug!(parallel, "transferring repositories");

        let slots = &slots;
        let mut settled = stream::iter(projects)
            .map(|project| async move { (project, self.sync_repository(ctx, project, slots).await) })
            .buffered(parallel);

        // Outcomes arrive in listing order whatever the completion order
        while let Some((project, outcome)) = settled.next().await {
            let name = project.name();
            match outcome {
                Settled::Synchronized => ctx.meta().record_success(name),
                Settled::UpToDate => {
                    info!(repository = name, "ignored up-to-date repository");
                    ctx.record(Category::UpToDate, name);
                }
                Settled::Cancelled => ctx.record(Category::Cancelled, name),
                Settled::Recorded => {}
            }
        }
    }

    /// Transfer one repository to every ready target
    async fn sync_repository(&self, ctx: &RunContext, project: &ProjectInfo, slots: &[TargetSlot]) -> Settled {
        let name = project.name();

        if ctx.is_cancelled() {
            return Settled::Cancelled;
        }

        let source = self.config.source.describe();
        let source_url = match provider::clone_url(&self.config.source, project) {
            Ok(url) => url,
            Err(e) => {
                ctx.meta().record_error(name, &source, format!("{:#}", e));
                return Settled::Recorded;
            }
        };

        let force = self.config.sync.force_push;
        // Targets that could not be prepared already recorded their failure
        let mut failed = slots.iter().any(|slot| slot.target.is_err());
        let mut considered = 0;
        let mut current = 0;
        let mut pending: Vec<(&Target, PushOption)> = Vec::new();

        for slot in slots {
            let Ok(target) = &slot.target else { continue };

            if !target.is_valid_repository_name(ctx, name) {
                debug!(repository = name, target = %slot.description, "invalid name for target");
                ctx.record(Category::Invalid, name);
                continue;
            }
            considered += 1;

            let opt = match target.push_option(name, force) {
                Ok(opt) => opt,
                Err(e) => {
                    failed = true;
                    ctx.meta().record_error(name, &slot.description, format!("{:#}", e));
                    continue;
                }
            };

            if let Some(location) = target.freshness_location(name, &opt).await {
                match self
                    .freshness
                    .is_current(self.git.as_ref(), project, &source_url, &location)
                    .await
                {
                    Ok(true) => {
                        debug!(repository = name, target = %slot.description, "target is up to date");
                        current += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => debug!(repository = name, "freshness check failed, syncing: {:#}", e),
                }
            }

            pending.push((target, opt));
        }

        if pending.is_empty() {
            if !failed && considered > 0 && current == considered {
                return Settled::UpToDate;
            }
            return Settled::Recorded;
        }

        let local = match self.pull(project, &source_url).await {
            Ok(local) => local,
            Err(e) => {
                let error = anyhow::Error::from(e);
                error!(repository = name, "{:#}", error);
                ctx.meta().record_error(name, &source, format!("{:#}", error));
                return Settled::Recorded;
            }
        };

        for (target, opt) in &pending {
            let description = target.describe();
            match target.push(ctx, local.repository(), opt, &target.config().git).await {
                Ok(()) => info!(repository = name, target = %description, "synchronized"),
                Err(e) => {
                    failed = true;
                    let error = anyhow::Error::from(e);
                    error!(repository = name, target = %description, "{:#}", error);
                    ctx.meta().record_error(name, &description, format!("{:#}", error));
                }
            }
        }

        if failed {
            Settled::Recorded
        } else {
            Settled::Synchronized
        }
    }

    /// Mirror-clone the source into a fresh working directory
    async fn pull(&self, project: &ProjectInfo, source_url: &str) -> Result<Workspace, TransferError> {
        let name = project.name();
        let fail = |source| TransferError::new(name, TransferStage::Pull, source);

        let work_dir = self.config.work_dir();
        tokio::fs::create_dir_all(&work_dir)
            .await
            .with_context(|| format!("Failed to create work dir {}", work_dir.display()))
            .map_err(fail)?;

        let dir = tempfile::Builder::new()
            .prefix("repomirror-")
            .tempdir_in(&work_dir)
            .context("Failed to create working directory")
            .map_err(fail)?;
        let mirror: PathBuf = dir.path().join(format!("{}.git", name));

        self.git
            .pull(&PullOption::new(name, source_url), &mirror)
            .await
            .map_err(fail)?;

        let origin = if project.https_url.is_empty() {
            &project.ssh_url
        } else {
            &project.https_url
        };

        Ok(Workspace {
            _dir: dir,
            repository: LocalRepository::new(mirror, project.clone(), origin.as_str()),
        })
    }
}

/// Local clone whose directory is removed on drop
struct Workspace {
    _dir: tempfile::TempDir,
    repository: LocalRepository,
}

impl Workspace {
    fn repository(&self) -> &LocalRepository {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_names() {
        assert_eq!(RunState::Initialized.to_string(), "initialized");
        assert_eq!(RunState::Complete.as_str(), "complete");
    }
}
