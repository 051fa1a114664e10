// src/exec/vcs.rs

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::types::VcsMode;

/// Reports which files version control considers changed.
pub trait VersionControlFilter: Send + Sync {
    /// Paths below `root`, relative to it with `/` separators.
    fn changed_paths(&self, root: &Path, mode: VcsMode) -> Result<HashSet<String>>;
}

/// Asks `git` for changed paths.
///
/// - `Modified`: tracked changes against `HEAD` plus untracked files.
/// - `Branch`: changes between `base` and `HEAD`.
#[derive(Debug, Clone)]
pub struct GitFilter {
    base: String,
}

impl GitFilter {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    fn git_lines(&self, root: &Path, args: &[&str]) -> Result<Vec<String>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .output()
            .with_context(|| format!("running git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().replace('\\', "/"))
            .filter(|l| !l.is_empty())
            .collect())
    }
}

impl VersionControlFilter for GitFilter {
    fn changed_paths(&self, root: &Path, mode: VcsMode) -> Result<HashSet<String>> {
        let mut paths = HashSet::new();
        match mode {
            VcsMode::Modified => {
                paths.extend(self.git_lines(root, &["diff", "--name-only", "--relative", "HEAD"])?);
                paths.extend(self.git_lines(
                    root,
                    &["ls-files", "--others", "--exclude-standard"],
                )?);
            }
            VcsMode::Branch => {
                let range = format!("{}...HEAD", self.base);
                paths.extend(self.git_lines(root, &["diff", "--name-only", "--relative", &range])?);
            }
        }
        debug!(?root, ?mode, changed = paths.len(), "version control filter");
        Ok(paths)
    }
}
