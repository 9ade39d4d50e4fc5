//! Per-run bookkeeping
//!
//! One [`SyncRunMetainfo`] exists per run. It lives inside the
//! [`RunContext`] passed down the call chain, never in a global.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Why a repository was not (fully) synchronized
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Failed naming validation
    Invalid,
    /// Fork while forks are excluded
    Fork,
    /// Matched no include pattern
    NotIncluded,
    /// Matched an exclude pattern
    Excluded,
    /// Last activity outside the configured window
    Inactive,
    /// Target already current
    UpToDate,
    /// A transfer against at least one target failed
    Failed,
    /// Never started because the run was cancelled
    Cancelled,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Invalid => "invalid",
            Category::Fork => "fork",
            Category::NotIncluded => "notincluded",
            Category::Excluded => "excluded",
            Category::Inactive => "inactive",
            Category::UpToDate => "uptodate",
            Category::Failed => "failed",
            Category::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invalid" => Some(Category::Invalid),
            "fork" => Some(Category::Fork),
            "notincluded" => Some(Category::NotIncluded),
            "excluded" => Some(Category::Excluded),
            "inactive" => Some(Category::Inactive),
            "uptodate" => Some(Category::UpToDate),
            "failed" => Some(Category::Failed),
            "cancelled" => Some(Category::Cancelled),
            _ => None,
        }
    }

    /// Skips are expected outcomes, not failures
    pub fn is_skip(&self) -> bool {
        !matches!(self, Category::Failed | Category::Cancelled)
    }
}

/// One failed transfer, attributed to a repository and a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub repository: String,
    pub target: String,
    pub message: String,
}

/// What a run attempted and how each repository ended up
#[derive(Debug, Clone, Default)]
pub struct SyncRunMetainfo {
    /// Repositories considered for sync (post-filter)
    pub total: usize,
    /// Category name -> repository names, in recording order
    pub fail: BTreeMap<String, Vec<String>>,
    /// Repositories transferred to every target that was not already current
    pub synchronized: Vec<String>,
    pub errors: Vec<FailureDetail>,
}

impl SyncRunMetainfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name` under `category`, once
    pub fn record(&mut self, category: Category, name: &str) {
        let names = self.fail.entry(category.as_str().to_string()).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    pub fn record_error(&mut self, repository: &str, target: &str, message: impl Into<String>) {
        self.errors.push(FailureDetail {
            repository: repository.to_string(),
            target: target.to_string(),
            message: message.into(),
        });
        self.record(Category::Failed, repository);
    }

    pub fn record_success(&mut self, name: &str) {
        if !self.synchronized.iter().any(|n| n == name) {
            self.synchronized.push(name.to_string());
        }
    }

    pub fn names(&self, category: Category) -> &[String] {
        self.fail
            .get(category.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn count(&self, category: Category) -> usize {
        self.names(category).len()
    }
}

/// Execution context of one run
#[derive(Debug, Default)]
pub struct RunContext {
    meta: Mutex<SyncRunMetainfo>,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context observing an external cancellation signal
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            meta: Mutex::new(SyncRunMetainfo::new()),
            cancel,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Exclusive access to the run's metainfo
    pub fn meta(&self) -> MutexGuard<'_, SyncRunMetainfo> {
        self.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, category: Category, name: &str) {
        self.meta().record(category, name);
    }

    /// Copy of the metainfo as it stands
    pub fn snapshot(&self) -> SyncRunMetainfo {
        self.meta().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for category in [
            Category::Invalid,
            Category::Fork,
            Category::NotIncluded,
            Category::Excluded,
            Category::Inactive,
            Category::UpToDate,
            Category::Failed,
            Category::Cancelled,
        ] {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::UpToDate.as_str(), "uptodate");
        assert_eq!(Category::parse("bogus"), None);
    }

    #[test]
    fn test_record_keeps_order_and_dedupes() {
        let mut meta = SyncRunMetainfo::new();
        meta.record(Category::Invalid, "b");
        meta.record(Category::Invalid, "a");
        meta.record(Category::Invalid, "b");

        assert_eq!(meta.names(Category::Invalid), ["b", "a"]);
        assert_eq!(meta.count(Category::UpToDate), 0);
    }

    #[test]
    fn test_record_error_marks_failed() {
        let mut meta = SyncRunMetainfo::new();
        meta.record_error("alpha", "github:github.com/me", "push rejected");
        meta.record_error("alpha", "directory:/srv", "disk full");

        assert_eq!(meta.names(Category::Failed), ["alpha"]);
        assert_eq!(meta.errors.len(), 2);
        assert_eq!(meta.errors[1].target, "directory:/srv");
    }

    #[test]
    fn test_context_cancellation() {
        let token = CancellationToken::new();
        let ctx = RunContext::with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());

        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
