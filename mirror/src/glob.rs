//! Glob patterns with `?`, `*` and a single recursive `**`.
//!
//! A pattern is split into directory segments and an optional filename
//! segment. Patterns ending in a path separator have no filename segment and
//! only ever match directories; all other patterns only match files.
//!
//! - `?` matches one character, `*` any run of characters within a segment.
//! - `**` matches zero or more directory levels and may appear once.
//! - `**` inside a filename is folded into the directories, so `**.txt`
//!   reads as `**/*.txt` and `dir**.txt` as `dir*/**/*.txt`.

use std::fmt;
use std::path::{Component, Path, is_separator};

use wildmatch::WildMatch;

use crate::error::{MirrorError, Result};

const RECURSIVE_WILDCARD: &str = "**";

/// Whether file names on this host compare case-sensitively.
pub fn host_is_case_sensitive() -> bool {
    !cfg!(any(windows, target_os = "macos"))
}

/// Options applied when compiling a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobOptions {
    /// Compare segments case-sensitively.
    pub case_sensitive: bool,

    /// Whether a leading `**` also matches a volume token such as `C:`.
    pub recursive_wildcard_matches_volume: bool,
}

impl Default for GlobOptions {
    fn default() -> Self {
        Self {
            case_sensitive: host_is_case_sensitive(),
            recursive_wildcard_matches_volume: true,
        }
    }
}

impl GlobOptions {
    /// Set case sensitivity.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Set whether a leading `**` matches volume tokens.
    pub fn recursive_wildcard_matches_volume(mut self, matches: bool) -> Self {
        self.recursive_wildcard_matches_volume = matches;
        self
    }
}

/// What a candidate path is known to denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file (or anything that is not a directory).
    File,

    /// A directory.
    Directory,

    /// No longer determinable, e.g. after deletion.
    Unknown,
}

/// A single segment matched with `?` and `*` only.
#[derive(Clone)]
struct Wildcard {
    text: String,
    matcher: WildMatch,
}

impl Wildcard {
    fn new(text: &str, case_sensitive: bool) -> Self {
        let matcher = if case_sensitive {
            WildMatch::new(text)
        } else {
            WildMatch::new_case_insensitive(text)
        };
        Self {
            text: text.to_string(),
            matcher,
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        self.matcher.matches(candidate)
    }
}

impl fmt::Debug for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.text)
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(Wildcard),
    RecursiveAny,
}

/// A path being matched, split like a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    directories: Vec<String>,
    filename: Option<String>,
}

impl Candidate {
    /// Split a relative path string. A trailing separator marks a directory.
    pub(crate) fn parse(path: &str) -> Self {
        let path = path.trim();
        let mut directories: Vec<String> = split_segments(path).map(String::from).collect();
        let filename = if ends_with_separator(path) {
            None
        } else {
            directories.pop()
        };
        Self {
            directories,
            filename,
        }
    }

    /// Build a candidate from path components. Unknown entries are shaped as
    /// files; callers pair them with separator-agnostic patterns.
    pub(crate) fn from_path(relative: &Path, kind: EntryKind) -> Self {
        let mut directories: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                Component::Prefix(prefix) => {
                    Some(prefix.as_os_str().to_string_lossy().into_owned())
                }
                Component::RootDir | Component::CurDir | Component::ParentDir => None,
            })
            .collect();
        let filename = match kind {
            EntryKind::Directory => None,
            EntryKind::File | EntryKind::Unknown => directories.pop(),
        };
        Self {
            directories,
            filename,
        }
    }

    fn first_token(&self) -> Option<&str> {
        self.directories
            .first()
            .or(self.filename.as_ref())
            .map(String::as_str)
    }
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    directories: Vec<Segment>,
    filename: Option<Wildcard>,
    options: GlobOptions,
}

impl GlobPattern {
    /// Compile a pattern with host defaults.
    pub fn new(pattern: &str) -> Result<Self> {
        Self::with_options(pattern, GlobOptions::default())
    }

    /// Compile a pattern.
    pub fn with_options(pattern: &str, options: GlobOptions) -> Result<Self> {
        if contains_multiple_recursive_wildcards(pattern) {
            return Err(MirrorError::MultipleRecursiveWildcards(pattern.to_string()));
        }
        Ok(Self::build(pattern, options))
    }

    fn build(pattern: &str, options: GlobOptions) -> Self {
        let trimmed = pattern.trim();
        let mut raw: Vec<String> = split_segments(trimmed).map(String::from).collect();
        let mut filename = None;

        let last = if ends_with_separator(trimmed) {
            None
        } else {
            raw.pop()
        };
        if let Some(last) = last {
            match last.find(RECURSIVE_WILDCARD) {
                Some(index) => {
                    let prefix = &last[..index];
                    if !prefix.is_empty() {
                        raw.push(format!("{prefix}*"));
                    }
                    raw.push(RECURSIVE_WILDCARD.to_string());
                    filename = Some(format!("*{}", &last[index + RECURSIVE_WILDCARD.len()..]));
                }
                None => filename = Some(last),
            }
        }

        let directories = raw
            .iter()
            .flat_map(|segment| split_embedded_wildcard(segment, options.case_sensitive))
            .collect();

        Self {
            source: pattern.to_string(),
            directories,
            filename: filename.map(|name| Wildcard::new(&name, options.case_sensitive)),
            options,
        }
    }

    /// The pattern text this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The options the pattern was compiled with.
    pub fn options(&self) -> GlobOptions {
        self.options
    }

    /// Whether the pattern only matches directories.
    pub fn is_directory_only(&self) -> bool {
        self.filename.is_none() && !self.directories.is_empty()
    }

    /// Whether the pattern contains `**`.
    pub fn has_recursive_wildcard(&self) -> bool {
        self.directories
            .iter()
            .any(|segment| matches!(segment, Segment::RecursiveAny))
    }

    /// Whether matches can lie below the first directory level.
    pub fn spans_directories(&self) -> bool {
        let trimmed = self.source.trim();
        trimmed.contains(RECURSIVE_WILDCARD) || trimmed.chars().any(is_separator)
    }

    /// A coarse, filename-only filter for native watch primitives.
    pub fn native_filter(&self) -> String {
        match &self.filename {
            Some(filename) => filename.text.replace(RECURSIVE_WILDCARD, "*"),
            None => "*".to_string(),
        }
    }

    /// The same pattern with surrounding separators trimmed, used when a
    /// candidate can no longer tell files from directories.
    pub fn separator_agnostic(&self) -> Self {
        Self::build(self.source.trim().trim_matches(is_separator), self.options)
    }

    /// Whether the relative path matches. A trailing separator on the path
    /// marks it as a directory.
    pub fn matches(&self, relative_path: &str) -> bool {
        self.matches_candidate(&Candidate::parse(relative_path))
    }

    /// Whether the relative path matches, ignoring whether either side ends
    /// in a separator.
    pub fn matches_ignoring_separator(&self, relative_path: &str) -> bool {
        let trimmed = relative_path.trim().trim_matches(is_separator);
        self.separator_agnostic()
            .matches_candidate(&Candidate::parse(trimmed))
    }

    pub(crate) fn matches_candidate(&self, candidate: &Candidate) -> bool {
        self.matches_volume(candidate)
            && self.matches_filename(candidate.filename.as_deref())
            && self.matches_directories(&candidate.directories)
    }

    fn matches_volume(&self, candidate: &Candidate) -> bool {
        if self.options.recursive_wildcard_matches_volume
            || !matches!(self.directories.first(), Some(Segment::RecursiveAny))
        {
            return true;
        }
        !candidate.first_token().is_some_and(is_volume_token)
    }

    fn matches_filename(&self, filename: Option<&str>) -> bool {
        match (&self.filename, filename) {
            (None, None) => true,
            (Some(pattern), Some(filename)) => pattern.matches(filename),
            _ => false,
        }
    }

    fn matches_directories(&self, directories: &[String]) -> bool {
        for (index, (segment, directory)) in self.directories.iter().zip(directories).enumerate() {
            match segment {
                Segment::RecursiveAny => return self.matches_from_end(directories, index),
                Segment::Literal(pattern) => {
                    if !pattern.matches(directory) {
                        return false;
                    }
                }
            }
        }

        // the candidate ran out right before a `**`
        if let Some(Segment::RecursiveAny) = self.directories.get(directories.len()) {
            return self.matches_from_end(directories, directories.len());
        }

        self.directories.len() == directories.len()
    }

    /// Matches the segments after the `**` at `recursive_index` against the
    /// tail of the candidate. Everything before it already matched.
    fn matches_from_end(&self, directories: &[String], recursive_index: usize) -> bool {
        let suffix = self.directories.len() - recursive_index - 1;
        if directories.len() < recursive_index + suffix {
            return false;
        }

        for (segment, directory) in self.directories.iter().rev().zip(directories.iter().rev()) {
            match segment {
                Segment::RecursiveAny => return true,
                Segment::Literal(pattern) => {
                    if !pattern.matches(directory) {
                        return false;
                    }
                }
            }
        }

        // zero directories between a leading `**` and the suffix
        true
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(is_separator).filter(|segment| !segment.is_empty())
}

fn ends_with_separator(path: &str) -> bool {
    path.chars().last().is_some_and(is_separator)
}

fn contains_multiple_recursive_wildcards(pattern: &str) -> bool {
    match pattern.find(RECURSIVE_WILDCARD) {
        Some(index) => pattern[index + 1..].contains(RECURSIVE_WILDCARD),
        None => false,
    }
}

/// Splits `a**b` into `a`, `**`, `b`, dropping empty parts.
fn split_embedded_wildcard(segment: &str, case_sensitive: bool) -> Vec<Segment> {
    let Some(index) = segment.find(RECURSIVE_WILDCARD) else {
        return vec![Segment::Literal(Wildcard::new(segment, case_sensitive))];
    };

    let prefix = &segment[..index];
    let suffix = &segment[index + RECURSIVE_WILDCARD.len()..];
    let mut parts = Vec::with_capacity(3);
    if !prefix.is_empty() {
        parts.push(Segment::Literal(Wildcard::new(prefix, case_sensitive)));
    }
    parts.push(Segment::RecursiveAny);
    if !suffix.is_empty() {
        parts.push(Segment::Literal(Wildcard::new(suffix, case_sensitive)));
    }
    parts
}

fn is_volume_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn glob(pattern: &str) -> GlobPattern {
        GlobPattern::new(pattern).unwrap()
    }

    #[test]
    fn test_simple_filename() {
        let pattern = glob("a.txt");

        assert!(pattern.matches("a.txt"));
        assert!(pattern.matches("/a.txt"));
        assert!(!pattern.matches("b.txt"));
        assert!(!pattern.matches("dir/a.txt"));
    }

    #[test]
    fn test_nested_filename() {
        let pattern = glob("dir/a.txt");

        assert!(pattern.matches("dir/a.txt"));
        assert!(pattern.matches("/dir/a.txt"));
        assert!(glob("/dir/a.txt").matches("dir/a.txt"));
        assert!(!pattern.matches("other_dir/a.txt"));
        assert!(!pattern.matches("a.txt"));
    }

    #[test]
    fn test_directory_only_patterns() {
        let pattern = glob("a/");

        assert!(pattern.is_directory_only());
        assert!(pattern.matches("a/"));
        assert!(pattern.matches("/a/"));
        assert!(!pattern.matches("b/"));
        assert!(!pattern.matches("a"));
        assert!(!pattern.matches("dir/a/"));

        let nested = glob("dir/a/");
        assert!(nested.matches("dir/a/"));
        assert!(!nested.matches("dir/a"));
        assert!(!nested.matches("other_dir/a/"));
    }

    #[test]
    fn test_single_level_wildcards() {
        assert!(glob("*.txt").matches("abcde.txt"));
        assert!(glob("a*.txt").matches("abcde.txt"));
        assert!(!glob("a*.txt").matches("bcde.txt"));
        assert!(glob("dir/a*.txt").matches("dir/abcde.txt"));
        assert!(glob("?.txt").matches("a.txt"));
        assert!(!glob("?.txt").matches("ab.txt"));
        assert!(!glob("*").matches("dir/a.txt"));
        assert!(!glob("*.*").matches("dir/a.txt"));
    }

    #[test]
    fn test_depth_is_fixed_without_recursive_wildcard() {
        let pattern = glob("a/*/c.txt");

        assert!(pattern.matches("a/b/c.txt"));
        assert!(!pattern.matches("a/c.txt"));
        assert!(!pattern.matches("a/b/b/c.txt"));
        assert!(!pattern.matches("x/a/b/c.txt"));
    }

    #[test]
    fn test_recursive_wildcard_any_depth() {
        for pattern in ["**/*.txt", "**.txt", "/**.txt", "/**/*.txt"] {
            let pattern = glob(pattern);
            assert!(pattern.matches("a.txt"), "{pattern}");
            assert!(pattern.matches("dir/a.txt"), "{pattern}");
            assert!(pattern.matches("dir/sub/a.txt"), "{pattern}");
            assert!(!pattern.matches("dir/a.md"), "{pattern}");
        }
    }

    #[test]
    fn test_bare_recursive_wildcard_matches_files_only() {
        let files = glob("**");
        assert!(files.matches("a.txt"));
        assert!(files.matches("sub/deeper/a.txt"));
        assert!(!files.matches("sub/"));

        let directories = glob("**/");
        assert!(directories.matches("a/"));
        assert!(directories.matches("a/b/"));
        assert!(!directories.matches("a.txt"));
    }

    #[test]
    fn test_recursive_wildcard_between_literals() {
        let pattern = glob("src/**/mod.rs");

        assert!(pattern.matches("src/mod.rs"));
        assert!(pattern.matches("src/a/mod.rs"));
        assert!(pattern.matches("src/a/b/mod.rs"));
        assert!(!pattern.matches("lib/a/mod.rs"));

        let suffixed = glob("a/**/b/c/");
        assert!(suffixed.matches("a/b/c/"));
        assert!(suffixed.matches("a/x/y/b/c/"));
        assert!(!suffixed.matches("a/c/"));
        assert!(!suffixed.matches("a/"));
    }

    #[test]
    fn test_recursive_wildcard_in_filename_folds_into_directories() {
        let pattern = glob("dir**.txt");

        assert!(pattern.matches("dir/a.txt"));
        assert!(pattern.matches("dir/sub/a.txt"));
        assert!(!pattern.matches("a.txt"));
        assert!(!pattern.matches("other/a.txt"));
        assert_eq!(pattern.native_filter(), "*.txt");

        let nested = glob("dir/**.txt");
        assert!(nested.matches("dir/a.txt"));
        assert!(nested.matches("dir/x/y/a.txt"));
        assert!(!nested.matches("a.txt"));
    }

    #[test]
    fn test_embedded_recursive_wildcard_in_directory() {
        let pattern = glob("a**b/c.txt");

        assert!(pattern.matches("a/b/c.txt"));
        assert!(pattern.matches("a/x/y/b/c.txt"));
        assert!(!pattern.matches("a/c.txt"));
        assert!(!pattern.matches("ab/c.txt"));
    }

    #[test]
    fn test_multiple_recursive_wildcards_rejected() {
        for pattern in ["**/a/**", "a**b**", "***"] {
            let err = GlobPattern::new(pattern).unwrap_err();
            assert!(matches!(err, MirrorError::MultipleRecursiveWildcards(_)));
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_volume_tokens_are_literal_segments() {
        assert!(glob("C:/").matches("C:/"));
        assert!(!glob("C:/").matches("D:/"));
        assert!(glob("C:").matches("C:"));
        assert!(glob("C:/*.txt").matches("C:/a.txt"));
        assert!(!glob("C:/*.txt").matches("D:/a.txt"));

        let contained = glob("C:/ASDF/My dir/**/");
        assert!(contained.matches("C:/ASDF/My dir/deeper/"));
        assert!(!contained.matches("C:/ASDF/My dir/deeper"));
        assert!(!contained.matches("D:/ASDF/My dir/deeper/"));
    }

    #[test]
    fn test_leading_recursive_wildcard_volume_matching_is_configurable() {
        assert!(glob("**").matches("C:"));

        let strict = GlobOptions::default().recursive_wildcard_matches_volume(false);
        let pattern = GlobPattern::with_options("**", strict).unwrap();
        assert!(!pattern.matches("C:"));
        assert!(!pattern.matches("C:/a.txt"));
        assert!(pattern.matches("a.txt"));
    }

    #[test]
    fn test_case_sensitivity_follows_options() {
        let insensitive = GlobOptions::default().case_sensitive(false);
        let sensitive = GlobOptions::default().case_sensitive(true);

        assert!(GlobPattern::with_options("Dir/*.TXT", insensitive).unwrap().matches("dir/a.txt"));
        assert!(!GlobPattern::with_options("Dir/*.TXT", sensitive).unwrap().matches("dir/a.txt"));
    }

    #[test]
    fn test_separator_agnostic_matching() {
        assert!(glob("a/").matches_ignoring_separator("a"));
        assert!(glob("a").matches_ignoring_separator("a/"));
        assert!(glob("**/").matches_ignoring_separator("x/y"));
        assert!(!glob("a/").matches_ignoring_separator("b"));
    }

    #[test]
    fn test_reparsing_is_idempotent() {
        let paths = ["a.txt", "a/", "x/a.txt", "x/y/", "x/y/z.md", "C:", ""];
        for pattern in ["*", "**", "**/", "x/**/z.md", "x/*/", "dir**.txt"] {
            let first = glob(pattern);
            let second = glob(pattern);
            for path in paths {
                assert_eq!(first.matches(path), second.matches(path), "{pattern} vs {path}");
            }
        }
    }

    #[test]
    fn test_spans_directories() {
        assert!(!glob("*.txt").spans_directories());
        assert!(glob("**.txt").spans_directories());
        assert!(glob("a/*.txt").spans_directories());
        assert!(glob("a/").spans_directories());
    }

    #[test]
    fn test_candidate_from_path() {
        let file = Candidate::from_path(Path::new("a/b/c.txt"), EntryKind::File);
        assert_eq!(file, Candidate::parse("a/b/c.txt"));

        let directory = Candidate::from_path(Path::new("a/b"), EntryKind::Directory);
        assert_eq!(directory, Candidate::parse("a/b/"));
    }
}
