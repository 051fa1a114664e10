// src/source/filter.rs

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use globset::GlobBuilder;
use regex::bytes::{Regex, RegexBuilder};

/// Named capture groups of one include match, by group name.
pub type CaptureMap = BTreeMap<String, String>;

/// How wildcard and regex patterns treat case and path separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternPolicy {
    pub case_sensitive: bool,
    /// Treat `\` in wildcard patterns as `/`.
    pub normalize_separators: bool,
}

impl Default for PatternPolicy {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            normalize_separators: true,
        }
    }
}

/// One compiled include or exclude pattern.
///
/// Matching is done against catalog paths (relative, `/`-separated).
#[derive(Clone)]
pub struct Matcher {
    source: String,
    regex: Regex,
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Matcher {
    /// Compile a wildcard pattern.
    ///
    /// `*` and `?` stay within one path segment, `**` crosses segments. A
    /// pattern without any `/` matches the file name at any depth.
    pub fn wildcard(pattern: &str, policy: PatternPolicy) -> Result<Self, String> {
        let mut glob = pattern.trim().to_string();
        if policy.normalize_separators {
            glob = glob.replace('\\', "/");
        }
        if !glob.contains('/') {
            glob = format!("**/{glob}");
        }

        let compiled = GlobBuilder::new(&glob)
            .literal_separator(true)
            .case_insensitive(!policy.case_sensitive)
            .build()
            .map_err(|e| format!("invalid wildcard pattern '{pattern}': {e}"))?;

        let regex = Regex::new(compiled.regex())
            .map_err(|e| format!("invalid wildcard pattern '{pattern}': {e}"))?;

        Ok(Self {
            source: pattern.trim().to_string(),
            regex,
        })
    }

    /// Compile a raw regular expression. Named groups feed target templates.
    pub fn regex(pattern: &str, policy: PatternPolicy) -> Result<Self, String> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!policy.case_sensitive)
            .build()
            .map_err(|e| format!("invalid regex '{pattern}': {e}"))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path.as_bytes())
    }

    /// Named captures of a match, or `None` if `path` does not match.
    pub fn captures(&self, path: &str) -> Option<CaptureMap> {
        let caps = self.regex.captures(path.as_bytes())?;
        let map = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name).map(|m| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(m.as_bytes()).into_owned(),
                    )
                })
            })
            .collect();
        Some(map)
    }
}

/// Split a `;`-separated pattern list, dropping empty items.
pub fn split_patterns(patterns_str: &str) -> impl Iterator<Item = &str> {
    patterns_str.split(';').map(str::trim).filter(|p| !p.is_empty())
}

/// Compile a `;`-separated list, as wildcards or as regexes.
pub fn compile_patterns(
    patterns_str: &str,
    is_regex: bool,
    policy: PatternPolicy,
) -> Result<Vec<Matcher>, String> {
    split_patterns(patterns_str)
        .map(|p| {
            if is_regex {
                Matcher::regex(p, policy)
            } else {
                Matcher::wildcard(p, policy)
            }
        })
        .collect()
}

/// Include/exclude filter of a step or task.
///
/// A path passes iff (no include patterns, or it matches at least one) and
/// it matches no exclude pattern.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include: Vec<Matcher>,
    exclude: Vec<Matcher>,
}

impl FileFilter {
    pub fn new(include: Vec<Matcher>, exclude: Vec<Matcher>) -> Self {
        Self { include, exclude }
    }

    /// Filter that lets everything through.
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn include(&self) -> &[Matcher] {
        &self.include
    }

    pub fn exclude(&self) -> &[Matcher] {
        &self.exclude
    }

    fn excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|m| m.is_match(path))
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.excluded(path) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|m| m.is_match(path))
    }

    /// One capture map per include pattern that matches `path`, in declared
    /// order. A filter without include patterns yields a single empty map for
    /// any non-excluded path.
    pub fn include_matches(&self, path: &str) -> Vec<CaptureMap> {
        if self.excluded(path) {
            return Vec::new();
        }
        if self.include.is_empty() {
            return vec![CaptureMap::new()];
        }
        self.include
            .iter()
            .filter_map(|m| m.captures(path))
            .collect()
    }
}

/// Paths reported by the version-control collaborator, if a step uses one.
pub fn passes_vcs(path: &str, vcs: Option<&HashSet<String>>) -> bool {
    vcs.is_none_or(|set| set.contains(path))
}
