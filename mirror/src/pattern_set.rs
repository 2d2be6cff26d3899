//! Allow/deny pattern lists.

use std::path::Path;

use crate::error::Result;
use crate::glob::{Candidate, EntryKind, GlobOptions, GlobPattern};

/// Separates patterns in a composite pattern string, same as `PATH` lists.
pub const PATTERN_LIST_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Marks a pattern in a composite string as a deny pattern.
pub const NEGATION_MARKER: char = '!';

/// A path matches if any allow pattern matches and no deny pattern does.
pub fn matches(relative_path: &str, allow: &[GlobPattern], deny: &[GlobPattern]) -> bool {
    allow.iter().any(|pattern| pattern.matches(relative_path))
        && !deny.iter().any(|pattern| pattern.matches(relative_path))
}

/// Splits a composite pattern string into allow and deny patterns.
///
/// Empty entries are skipped and the `!` of deny patterns is removed.
pub fn decompose(composite: &str) -> (Vec<String>, Vec<String>) {
    let mut allow = Vec::new();
    let mut deny = Vec::new();
    for entry in composite.split(PATTERN_LIST_SEPARATOR) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.strip_prefix(NEGATION_MARKER) {
            Some(denied) if !denied.trim().is_empty() => deny.push(denied.trim().to_string()),
            Some(_) => {}
            None => allow.push(entry.to_string()),
        }
    }
    (allow, deny)
}

/// Compiled allow and deny lists.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    allow: Vec<GlobPattern>,
    deny: Vec<GlobPattern>,
    allow_any_kind: Vec<GlobPattern>,
    deny_any_kind: Vec<GlobPattern>,
    options: GlobOptions,
}

impl PatternSet {
    /// Compile allow and deny patterns.
    pub fn new<A, D>(allow: A, deny: D, options: GlobOptions) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let allow = compile(allow, options)?;
        let deny = compile(deny, options)?;
        Ok(Self {
            allow_any_kind: allow.iter().map(GlobPattern::separator_agnostic).collect(),
            deny_any_kind: deny.iter().map(GlobPattern::separator_agnostic).collect(),
            allow,
            deny,
            options,
        })
    }

    /// Compile a composite pattern string such as `*.rs:src/**:!*.tmp`.
    pub fn parse(composite: &str, options: GlobOptions) -> Result<Self> {
        let (allow, deny) = decompose(composite);
        Self::new(allow, deny, options)
    }

    pub fn allow(&self) -> &[GlobPattern] {
        &self.allow
    }

    pub fn deny(&self) -> &[GlobPattern] {
        &self.deny
    }

    pub fn options(&self) -> GlobOptions {
        self.options
    }

    /// Strict matching: an empty allow list matches nothing.
    pub fn matches(&self, relative_path: &str) -> bool {
        matches(relative_path, &self.allow, &self.deny)
    }

    /// Decides whether a watched entry is selected.
    ///
    /// Unlike [`PatternSet::matches`], an empty allow list selects every
    /// entry not denied. Entries of unknown kind are matched with
    /// separator-agnostic patterns.
    pub fn selects(&self, relative: &Path, kind: EntryKind) -> bool {
        let candidate = Candidate::from_path(relative, kind);
        let (allow, deny) = match kind {
            EntryKind::Unknown => (&self.allow_any_kind, &self.deny_any_kind),
            EntryKind::File | EntryKind::Directory => (&self.allow, &self.deny),
        };
        let allowed =
            allow.is_empty() || allow.iter().any(|pattern| pattern.matches_candidate(&candidate));
        allowed && !deny.iter().any(|pattern| pattern.matches_candidate(&candidate))
    }

    /// Whether a watch must recurse into subdirectories to see every match.
    pub fn requires_subdirectories(&self) -> bool {
        self.allow.is_empty() || self.allow.iter().any(GlobPattern::spans_directories)
    }

    /// Filename filters for the native primitive, one per allow pattern.
    pub fn native_filters(&self) -> Vec<String> {
        if self.allow.is_empty() {
            return vec!["*".to_string()];
        }
        let mut filters: Vec<String> = Vec::with_capacity(self.allow.len());
        for filter in self.allow.iter().map(GlobPattern::native_filter) {
            if !filters.contains(&filter) {
                filters.push(filter);
            }
        }
        filters
    }

    /// Whether some directory can be selected at all. File-shaped patterns
    /// such as `*` never select a directory.
    pub fn selects_directories(&self) -> bool {
        self.allow.is_empty() || self.allow.iter().any(GlobPattern::is_directory_only)
    }

    /// The first allow pattern that only matches directories.
    pub fn directory_only_pattern(&self) -> Option<&GlobPattern> {
        self.allow.iter().find(|pattern| pattern.is_directory_only())
    }
}

fn compile<I>(patterns: I, options: GlobOptions) -> Result<Vec<GlobPattern>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|pattern| GlobPattern::with_options(pattern.as_ref(), options))
        .collect()
}
