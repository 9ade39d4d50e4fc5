//! Run summary: the externally observable outcome of one run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::Config;
use crate::metainfo::{Category, FailureDetail};
use crate::sync::SyncOutcome;

/// Repositories recorded under one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub count: usize,
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub repository: String,
    pub target: String,
    pub message: String,
}

impl From<&FailureDetail> for ErrorSummary {
    fn from(detail: &FailureDetail) -> Self {
        Self {
            repository: detail.repository.clone(),
            target: detail.target.clone(),
            message: detail.message.clone(),
        }
    }
}

/// Stable reporting schema of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub source_domain: String,
    /// `user/group` of the source
    pub owner: String,
    pub targets: Vec<String>,
    pub total: usize,
    pub failures: BTreeMap<String, CategorySummary>,
    pub synchronized: Vec<String>,
    pub errors: Vec<ErrorSummary>,
    pub dry_run: bool,
    pub cancelled: bool,
    pub state: String,
}

impl RunSummary {
    pub fn new(config: &Config, outcome: &SyncOutcome) -> Self {
        let meta = &outcome.meta;
        let failures = meta
            .fail
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(category, names)| {
                (
                    category.clone(),
                    CategorySummary {
                        count: names.len(),
                        repositories: names.clone(),
                    },
                )
            })
            .collect();

        Self {
            source_domain: config.source.domain().to_string(),
            owner: config.source.user_group(),
            targets: config.targets.iter().map(|t| t.describe()).collect(),
            total: meta.total,
            failures,
            synchronized: meta.synchronized.clone(),
            errors: meta.errors.iter().map(ErrorSummary::from).collect(),
            dry_run: outcome.dry_run,
            cancelled: outcome.cancelled,
            state: outcome.state.to_string(),
        }
    }

    pub fn count(&self, category: Category) -> usize {
        self.failures.get(category.as_str()).map_or(0, |c| c.count)
    }

    pub fn has_failures(&self) -> bool {
        self.count(Category::Failed) > 0
    }

    /// Emit the summary through `tracing`
    pub fn log(&self) {
        info!(
            domain = %self.source_domain,
            user_group = %self.owner,
            targets = ?self.targets,
            total = self.total,
            "run summary"
        );

        for (category, summary) in &self.failures {
            let skip = Category::parse(category).map_or(true, |c| c.is_skip());
            if category == Category::Invalid.as_str() {
                info!(
                    count = summary.count,
                    repositories = ?summary.repositories,
                    "skipped repositories due to invalid naming"
                );
            } else if category == Category::UpToDate.as_str() {
                info!(
                    count = summary.count,
                    repositories = ?summary.repositories,
                    "ignored up-to-date repositories"
                );
            } else if skip {
                info!(
                    count = summary.count,
                    repositories = ?summary.repositories,
                    "skipped repositories ({})",
                    category
                );
            } else {
                warn!(
                    count = summary.count,
                    repositories = ?summary.repositories,
                    "{} repositories",
                    category
                );
            }
        }
    }

    /// Human readable summary for the terminal
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };

        out.push_str(&format!("📊 Sync summary{}\n", mode));
        out.push_str(&format!("   Source: {} ({})\n", self.source_domain, self.owner));
        for target in &self.targets {
            out.push_str(&format!("   Target: {}\n", target));
        }
        out.push_str(&format!("   Repositories considered: {}\n", self.total));
        out.push_str(&format!("   ✅ Synchronized: {}\n", self.synchronized.len()));

        for (category, summary) in &self.failures {
            let icon = match Category::parse(category) {
                Some(Category::Failed) => "❌",
                Some(Category::Cancelled) => "⏹️",
                _ => "⏭️",
            };
            out.push_str(&format!(
                "   {} {}: {} [{}]\n",
                icon,
                category,
                summary.count,
                summary.repositories.join(", ")
            ));
        }

        if !self.errors.is_empty() {
            out.push_str("\nErrors:\n");
            for error in &self.errors {
                out.push_str(&format!(
                    "   {} → {}: {}\n",
                    error.repository, error.target, error.message
                ));
            }
        }

        if self.cancelled {
            out.push_str("\n⚠️  Run was cancelled before all repositories were processed\n");
        }

        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoggingConfig, ProviderConfig, ProviderType, SyncConfig};
    use crate::metainfo::SyncRunMetainfo;
    use crate::sync::RunState;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            source: ProviderConfig::new(ProviderType::Gitlab).with_group("platform"),
            targets: vec![ProviderConfig::new(ProviderType::Archive).with_path("/srv/backup")],
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn outcome(meta: SyncRunMetainfo) -> SyncOutcome {
        SyncOutcome {
            state: RunState::Complete,
            meta,
            dry_run: false,
            cancelled: false,
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_summary_schema() {
        let mut meta = SyncRunMetainfo::new();
        meta.total = 3;
        meta.record(Category::Invalid, "bad name");
        meta.record(Category::UpToDate, "alpha");
        meta.record_error("beta", "archive:/srv/backup", "disk full");
        meta.record_success("gamma");

        let summary = RunSummary::new(&config(), &outcome(meta));

        assert_eq!(summary.source_domain, "gitlab.com");
        assert_eq!(summary.owner, "/platform");
        assert_eq!(summary.targets, ["archive:/srv/backup"]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.count(Category::Invalid), 1);
        assert_eq!(summary.failures["uptodate"].repositories, ["alpha"]);
        assert_eq!(summary.synchronized, ["gamma"]);
        assert!(summary.has_failures());
        assert_eq!(summary.state, "complete");

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["failures"]["failed"]["count"], 1);
        assert_eq!(json["errors"][0]["target"], "archive:/srv/backup");
    }

    #[test]
    fn test_render_mentions_every_category() {
        let mut meta = SyncRunMetainfo::new();
        meta.record(Category::Fork, "beta-fork");
        meta.record(Category::Excluded, "gamma");

        let text = RunSummary::new(&config(), &outcome(meta)).render();
        assert!(text.contains("fork: 1 [beta-fork]"));
        assert!(text.contains("excluded: 1 [gamma]"));
        assert!(text.contains("Repositories considered: 0"));
    }

    #[test]
    fn test_invalid_names_are_logged_at_info() {
        let mut meta = SyncRunMetainfo::new();
        meta.record(Category::Invalid, "bad name");
        let summary = RunSummary::new(&config(), &outcome(meta));

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || summary.log());

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("invalid naming"))
            .unwrap();
        assert!(line.contains("INFO"));
        assert!(!output.contains("WARN"));
    }
}
