//! Classified errors for a sync run
//!
//! Most functions return `anyhow::Result` with context attached at each
//! boundary. The enums here mark the failures callers need to tell apart:
//! configuration problems stop a run before it starts, listing problems stop
//! one provider's portion, everything else is attributed to one repository.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid configuration. Always fatal, detected before any listing call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{role}: both user ({user}) and group ({group}) are set, choose one")]
    BothUserAndGroup {
        role: String,
        user: String,
        group: String,
    },

    #[error("{role}: neither user nor group is set")]
    NeitherUserNorGroup { role: String },

    #[error("{role}: {provider} target requires a path")]
    MissingPath { role: String, provider: String },

    #[error("{provider} cannot be used as a sync source")]
    NotListable { provider: String },

    #[error("no sync targets configured")]
    NoTargets,

    #[error("generic git source requires at least one repository URL")]
    NoRepositories,

    #[error("invalid repository pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid activity interval: {0}")]
    InvalidInterval(String),
}

/// Listing the repositories of a provider failed; no partial listing is used.
#[derive(Debug, Error)]
#[error("failed to list repositories from {provider} ({owner})")]
pub struct ListingError {
    pub provider: String,
    pub owner: String,
    #[source]
    pub source: anyhow::Error,
}

/// Stage of a per-repository transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Pull,
    Create,
    Push,
    DefaultBranch,
    Protect,
    Unprotect,
    Materialize,
}

impl TransferStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Pull => "pull",
            TransferStage::Create => "create",
            TransferStage::Push => "push",
            TransferStage::DefaultBranch => "default-branch",
            TransferStage::Protect => "protect",
            TransferStage::Unprotect => "unprotect",
            TransferStage::Materialize => "materialize",
        }
    }
}

/// One repository failed against one target. The run continues.
#[derive(Debug, Error)]
#[error("{} failed for repository {repository}", stage.as_str())]
pub struct TransferError {
    pub repository: String,
    pub stage: TransferStage,
    #[source]
    pub source: anyhow::Error,
}

impl TransferError {
    pub fn new(repository: impl Into<String>, stage: TransferStage, source: anyhow::Error) -> Self {
        Self {
            repository: repository.into(),
            stage,
            source,
        }
    }
}

/// Archive packaging failures, fatal to one archive attempt only.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no files found to archive in {0}")]
    NoFilesToArchive(PathBuf),

    #[error("failed to read archive source {path}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create target directory {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create archive file {path}")]
    ArchiveCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compress archive {path}")]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory target refused to touch an existing directory.
#[derive(Debug, Error)]
pub enum DirectoryTargetError {
    #[error("refusing to initialise {0}: directory is not empty and was not created by repomirror")]
    Unmanaged(PathBuf),
}
