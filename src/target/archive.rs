//! Archive target: materialise into a scratch repository, then pack it

use chrono::{TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tar::{Builder, HeaderMode};
use tracing::{debug, info};

use crate::config::{GitOption, ProviderConfig};
use crate::error::{ArchiveError, TransferError, TransferStage};
use crate::git::GitTransfer;
use crate::metainfo::RunContext;
use crate::model::{LocalRepository, PushOption};

/// Packs a directory into a single archive file
pub trait ArchiveWriter: Send + Sync {
    /// Write `source_dir` into `output_dir`, returning the archive path
    fn write(&self, source_dir: &Path, output_dir: &Path, name: &str) -> Result<PathBuf, ArchiveError>;
}

/// Gzip-compressed tarball writer
#[derive(Debug, Clone, Default)]
pub struct TarGzWriter;

static LAST_STAMP_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Current unix millis, strictly greater than any value handed out before
fn next_stamp_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_STAMP_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    now.max(previous + 1)
}

/// `<name>_YYYYMMDD_HHMMSS_<unix-millis>.tar.gz`
pub fn archive_file_name(name: &str, millis: i64) -> String {
    let stamp = Utc
        .timestamp_millis_opt(millis)
        .single()
        .map(|at| at.format("%Y%m%d_%H%M%S").to_string())
        .unwrap_or_else(|| "00000000_000000".to_string());
    format!("{}_{}_{}.tar.gz", name, stamp, millis)
}

fn count_files(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            count += count_files(&entry.path())?;
        } else if file_type.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

impl ArchiveWriter for TarGzWriter {
    fn write(&self, source_dir: &Path, output_dir: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
        let files = count_files(source_dir).map_err(|source| ArchiveError::SourceRead {
            path: source_dir.to_path_buf(),
            source,
        })?;
        if files == 0 {
            return Err(ArchiveError::NoFilesToArchive(source_dir.to_path_buf()));
        }

        fs::create_dir_all(output_dir).map_err(|source| ArchiveError::DirectoryCreation {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let archive_path = output_dir.join(archive_file_name(name, next_stamp_millis()));
        let file = File::create(&archive_path).map_err(|source| ArchiveError::ArchiveCreation {
            path: archive_path.clone(),
            source,
        })?;

        let compression_error = |source| ArchiveError::Compression {
            path: archive_path.clone(),
            source,
        };

        let mut tar = Builder::new(GzEncoder::new(file, Compression::default()));
        tar.mode(HeaderMode::Deterministic);
        tar.follow_symlinks(false);
        tar.append_dir_all(name, source_dir).map_err(compression_error)?;

        let encoder = tar.into_inner().map_err(compression_error)?;
        encoder.finish().map_err(compression_error)?;

        debug!(files, archive = %archive_path.display(), "archive written");
        Ok(archive_path)
    }
}

/// Archive target: one `.tar.gz` per repository and run
pub struct ArchiveTarget {
    config: ProviderConfig,
    root: PathBuf,
    work_dir: PathBuf,
    git: Arc<dyn GitTransfer>,
    writer: Arc<dyn ArchiveWriter>,
}

impl ArchiveTarget {
    pub fn new(
        config: ProviderConfig,
        root: PathBuf,
        work_dir: PathBuf,
        git: Arc<dyn GitTransfer>,
        writer: Arc<dyn ArchiveWriter>,
    ) -> Self {
        Self {
            config,
            root,
            work_dir,
            git,
            writer,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn push(
        &self,
        _ctx: &RunContext,
        repo: &LocalRepository,
        opt: &PushOption,
        git_opt: &GitOption,
    ) -> Result<(), TransferError> {
        let name = repo.project().name();
        let fail = |stage, source| TransferError::new(name, stage, source);
        let materialize = |source| fail(TransferStage::Materialize, source);

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| materialize(e.into()))?;
        let scratch = tempfile::Builder::new()
            .prefix("repomirror-archive-")
            .tempdir_in(&self.work_dir)
            .map_err(|e| materialize(e.into()))?;
        let dir = scratch.path().join(name);

        self.git.init(&dir).await.map_err(materialize)?;
        self.git
            .set_default_branch(&dir, &repo.project().default_branch)
            .await
            .map_err(|e| fail(TransferStage::DefaultBranch, e))?;

        let local_push = PushOption::new(dir.to_string_lossy(), opt.force(), opt.all_refs());
        self.git
            .push(repo, &local_push, git_opt)
            .await
            .map_err(|e| fail(TransferStage::Push, e))?;
        self.git
            .set_remote_and_branch(repo, &dir)
            .await
            .map_err(materialize)?;

        let writer = Arc::clone(&self.writer);
        let output_dir = PathBuf::from(opt.target());
        let logical_name = name.to_string();
        let archive = tokio::task::spawn_blocking(move || writer.write(&dir, &output_dir, &logical_name))
            .await
            .map_err(|e| materialize(e.into()))?
            .map_err(|e| materialize(e.into()))?;

        info!(repository = name, archive = %archive.display(), "archive created");
        Ok(())
    }
}
