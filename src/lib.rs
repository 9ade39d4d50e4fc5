//! repomirror - Git repository mirroring across hosting providers
//!
//! repomirror copies the repositories of one account on GitHub, GitLab, Gitea
//! or a plain git remote to one or more targets: another hosting provider, a
//! local directory of working repositories, or compressed archive files.
//!
//! ## Core Features
//!
//! - **Provider Gateways**: one adapter per hosting service behind a single contract
//! - **Filtering**: naming rules, fork exclusion, include/exclude globs, activity window
//! - **Targets**: hosted providers, local directories and `.tar.gz` archives
//! - **Run Reporting**: per-category skip and failure bookkeeping for every run
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`model`]: Provider-independent repository metadata
//! - [`naming`]: Per-provider repository name rules
//! - [`filter`]: Filter pipeline
//! - [`provider`]: Provider gateways (GitHub, GitLab, Gitea, generic git)
//! - [`git`]: Git transfer through the `git` command line
//! - [`target`]: Target materialization
//! - [`sync`]: Run orchestration
//! - [`metainfo`] and [`report`]: Run bookkeeping and summaries

pub mod config;
pub mod error;
pub mod filter;
pub mod git;
pub mod metainfo;
pub mod model;
pub mod naming;
pub mod provider;
pub mod report;
pub mod sync;
pub mod target;

pub use config::{Config, ProviderConfig, ProviderType};
pub use error::{ArchiveError, ConfigError, DirectoryTargetError, ListingError, TransferError};
pub use git::{GitCli, GitTransfer};
pub use metainfo::{Category, RunContext, SyncRunMetainfo};
pub use model::{CreateOption, LocalRepository, ProjectInfo, PullOption, PushOption, Visibility};
pub use provider::ProviderGateway;
pub use report::RunSummary;
pub use sync::{RunState, SyncEngine, SyncOutcome};
