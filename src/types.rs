use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four ordered build phases. Steps of a phase run after every step of
/// the previous phase has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    PreBuild,
    BuildSource,
    BuildOutput,
    PostBuild,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::PreBuild,
        Phase::BuildSource,
        Phase::BuildOutput,
        Phase::PostBuild,
    ];

    /// Config section name for this phase (`[[build_source]]`, ...).
    pub fn section(self) -> &'static str {
        match self {
            Phase::PreBuild => "pre_build",
            Phase::BuildSource => "build_source",
            Phase::BuildOutput => "build_output",
            Phase::PostBuild => "post_build",
        }
    }

    /// Phases that scan the source tree rather than the output tree.
    pub fn scans_sources(self) -> bool {
        matches!(self, Phase::PreBuild | Phase::BuildSource)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// Kind of packaged container an archive entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Zip,
    Cab,
    Library,
}

impl ArchiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Cab => "cab",
            ArchiveKind::Library => "library",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zip" => Ok(ArchiveKind::Zip),
            "cab" => Ok(ArchiveKind::Cab),
            "library" | "pl" => Ok(ArchiveKind::Library),
            other => Err(format!(
                "invalid archive kind: {other} (expected \"zip\", \"cab\" or \"library\")"
            )),
        }
    }
}

/// Whether a target template names a directory (the source base name is
/// appended) or an explicit file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Directory,
    File,
}

impl Default for TargetType {
    fn default() -> Self {
        TargetType::Directory
    }
}

/// Which paths the version-control collaborator should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsMode {
    /// Paths modified (or untracked) since the last commit.
    Modified,
    /// Paths changed on the current branch relative to `config.vcs_base`.
    Branch,
}

/// Task kinds as written in the config (`kind = "compile"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKindName {
    Compile,
    Copy,
    Archive,
    Upload,
    Exec,
}
