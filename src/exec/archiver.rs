// src/exec/archiver.rs

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::fs::FileSystem;
use crate::types::ArchiveKind;

/// Physical writer/remover of build outputs.
pub trait Archiver: Send + Sync {
    /// Copy `source` to the absolute `target` path.
    fn copy_file(&self, source: &Path, target: &str) -> Result<()>;

    /// Add or replace `(entry, source)` pairs inside one container.
    fn write_entries(
        &self,
        container: &str,
        kind: ArchiveKind,
        entries: &[(String, PathBuf)],
    ) -> Result<()>;

    fn upload(&self, source: &Path, url: &str) -> Result<()>;

    fn remove_files(&self, paths: &[String]) -> Result<()>;

    fn remove_entries(&self, container: &str, kind: ArchiveKind, entries: &[String]) -> Result<()>;

    fn remove_remote(&self, urls: &[String]) -> Result<()>;
}

/// Copies and removes plain files through a [`FileSystem`].
///
/// Archive containers and remote uploads need a format- or protocol-specific
/// archiver; here they fail as execution errors.
#[derive(Debug, Clone)]
pub struct LocalArchiver {
    fs: Arc<dyn FileSystem>,
}

impl LocalArchiver {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl Archiver for LocalArchiver {
    fn copy_file(&self, source: &Path, target: &str) -> Result<()> {
        let mut reader = self
            .fs
            .open_read(source)
            .with_context(|| format!("opening {source:?}"))?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .with_context(|| format!("reading {source:?}"))?;
        self.fs
            .write(Path::new(target), &buf)
            .with_context(|| format!("writing {target}"))?;
        debug!(?source, target, "copied");
        Ok(())
    }

    fn write_entries(
        &self,
        container: &str,
        kind: ArchiveKind,
        _entries: &[(String, PathBuf)],
    ) -> Result<()> {
        bail!("cannot write {kind} container '{container}': no {kind} archiver available")
    }

    fn upload(&self, _source: &Path, url: &str) -> Result<()> {
        bail!("cannot upload to '{url}': no remote archiver available")
    }

    fn remove_files(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let path = Path::new(path);
            if !self.fs.exists(path) {
                continue;
            }
            self.fs
                .remove_file(path)
                .with_context(|| format!("removing {path:?}"))?;
            debug!(?path, "removed");
        }
        Ok(())
    }

    fn remove_entries(&self, container: &str, kind: ArchiveKind, _entries: &[String]) -> Result<()> {
        bail!("cannot remove entries from {kind} container '{container}': no {kind} archiver available")
    }

    fn remove_remote(&self, urls: &[String]) -> Result<()> {
        match urls.first() {
            Some(url) => bail!("cannot remove '{url}': no remote archiver available"),
            None => Ok(()),
        }
    }
}
