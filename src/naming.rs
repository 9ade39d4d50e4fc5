//! Repository name rules per provider
//!
//! Every validator runs two independent checks and a name must pass both:
//! a structural check (length, reserved words, leading/trailing rules) and a
//! character-set check.

use crate::config::ProviderType;

/// Pure, deterministic name predicate
pub trait NameValidator: Send + Sync {
    fn is_valid(&self, name: &str) -> bool {
        !name.is_empty() && self.is_valid_structure(name) && self.has_valid_characters(name)
    }

    fn is_valid_structure(&self, name: &str) -> bool;

    fn has_valid_characters(&self, name: &str) -> bool;
}

/// Table-driven validator shared by all providers
#[derive(Debug, Clone, Copy)]
pub struct NamingRules {
    pub max_len: usize,
    /// Exact names that are refused (compared case-insensitively)
    pub reserved: &'static [&'static str],
    /// Suffixes that are refused
    pub reserved_suffixes: &'static [&'static str],
    /// Characters not allowed as the first character
    pub invalid_leading: &'static [char],
    /// Characters not allowed as the last character
    pub invalid_trailing: &'static [char],
    pub allowed: fn(char) -> bool,
}

impl NameValidator for NamingRules {
    fn is_valid_structure(&self, name: &str) -> bool {
        if name.is_empty() || name.chars().count() > self.max_len {
            return false;
        }

        let lower = name.to_lowercase();
        if self.reserved.iter().any(|r| *r == lower) {
            return false;
        }

        if self.reserved_suffixes.iter().any(|s| lower.ends_with(s)) {
            return false;
        }

        let first = name.chars().next();
        let last = name.chars().last();

        !matches!(first, Some(c) if self.invalid_leading.contains(&c))
            && !matches!(last, Some(c) if self.invalid_trailing.contains(&c))
    }

    fn has_valid_characters(&self, name: &str) -> bool {
        name.chars().all(self.allowed)
    }
}

fn alnum_dash_dot_underscore(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn filesystem_safe(c: char) -> bool {
    !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// GitHub: up to 100 of `[A-Za-z0-9._-]`, not `.` or `..`
pub const GITHUB: NamingRules = NamingRules {
    max_len: 100,
    reserved: &[".", ".."],
    reserved_suffixes: &[],
    invalid_leading: &[],
    invalid_trailing: &[],
    allowed: alnum_dash_dot_underscore,
};

/// GitLab project paths and reserved names
/// (https://docs.gitlab.com/ee/user/reserved_names.html)
pub const GITLAB: NamingRules = NamingRules {
    max_len: 255,
    reserved: &[
        "-",
        "badges",
        "blame",
        "blob",
        "builds",
        "commits",
        "create",
        "create_dir",
        "edit",
        "environments",
        "files",
        "find_file",
        "gitlab-lfs",
        "info",
        "new",
        "preview",
        "raw",
        "refs",
        "tree",
        "update",
        "wikis",
    ],
    reserved_suffixes: &[".git", ".atom"],
    invalid_leading: &['-', '.'],
    invalid_trailing: &['-', '.'],
    allowed: alnum_dash_dot_underscore,
};

/// Gitea: `[-._a-zA-Z0-9]`, reserved names and patterns
pub const GITEA: NamingRules = NamingRules {
    max_len: 100,
    reserved: &[".", "..", "-", "assets", "api", "user", "explore"],
    reserved_suffixes: &[".git", ".wiki", ".rss", ".atom"],
    invalid_leading: &[],
    invalid_trailing: &[],
    allowed: alnum_dash_dot_underscore,
};

/// Local directory, archive and generic git endpoints: anything usable as a
/// single path component
pub const FILESYSTEM: NamingRules = NamingRules {
    max_len: 255,
    reserved: &[".", ".."],
    reserved_suffixes: &[],
    invalid_leading: &[],
    invalid_trailing: &[' ', '.'],
    allowed: filesystem_safe,
};

/// Rules for a provider type
pub fn rules_for(provider: ProviderType) -> &'static NamingRules {
    match provider {
        ProviderType::Github => &GITHUB,
        ProviderType::Gitlab => &GITLAB,
        ProviderType::Gitea => &GITEA,
        ProviderType::Directory | ProviderType::Archive | ProviderType::GenericGit => &FILESYSTEM,
    }
}
