// src/exec/compiler.rs

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::CompilerSection;
use crate::fs::FileSystem;
use crate::history::{Dependencies, TargetRecord};

/// One file handed to the compiler.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Catalog key.
    pub path: String,
    /// Absolute location of the source.
    pub source: PathBuf,
    pub targets: Vec<TargetRecord>,
}

/// Result for one file of a batch.
#[derive(Debug)]
pub struct CompileOutput {
    pub path: String,
    /// Dependency metadata on success, if the compiler reported any.
    pub result: Result<Option<Dependencies>>,
}

impl CompileOutput {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// The external compiler.
///
/// Implementations are called from blocking worker threads; each worker
/// gets its own disjoint batch.
pub trait Compiler: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> Result<Option<Dependencies>>;

    /// Compile a batch in order. Stops early on cancellation, and on the
    /// first failure when `stop_on_failure` is set.
    fn compile_batch(
        &self,
        batch: &[CompileRequest],
        stop_on_failure: bool,
        cancel: &CancelToken,
    ) -> Vec<CompileOutput> {
        let mut out = Vec::with_capacity(batch.len());
        for request in batch {
            if cancel.is_cancelled() {
                break;
            }
            let result = self.compile(request);
            let failed = result.is_err();
            out.push(CompileOutput {
                path: request.path.clone(),
                result,
            });
            if failed && stop_on_failure {
                break;
            }
        }
        out
    }
}

/// Runs `[compiler].cmd` through the shell once per file.
///
/// `{source}` is replaced by the source path and `{targets}` by the
/// space-separated copy targets. `PROPATH` and `[compiler].env` are exported.
/// When `deps_dir` is set, `<deps_dir>/<path>.deps.json` is read back as the
/// file's dependency metadata.
pub struct CommandCompiler {
    cmd: String,
    propath: String,
    env: Vec<(String, String)>,
    deps_dir: Option<PathBuf>,
    fs: Arc<dyn FileSystem>,
}

impl CommandCompiler {
    pub fn from_section(section: &CompilerSection, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let Some(cmd) = section.cmd.clone() else {
            bail!("[compiler].cmd is not set");
        };
        Ok(Self {
            cmd,
            propath: section.propath.join(","),
            env: section
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            deps_dir: section.deps_dir.clone(),
            fs,
        })
    }

    fn command_line(&self, request: &CompileRequest) -> String {
        let targets = request
            .targets
            .iter()
            .filter_map(|t| match t {
                TargetRecord::Copy { path } => Some(path.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.cmd
            .replace("{source}", &request.source.to_string_lossy())
            .replace("{targets}", &targets)
    }

    fn read_dependencies(&self, path: &str) -> Result<Option<Dependencies>> {
        let Some(dir) = &self.deps_dir else {
            return Ok(None);
        };
        let file = deps_file(dir, path);
        if !self.fs.exists(&file) {
            return Ok(None);
        }
        let contents = self.fs.read_to_string(&file)?;
        let deps: Dependencies = serde_json::from_str(&contents)
            .with_context(|| format!("parsing dependency file {file:?}"))?;
        Ok(Some(deps))
    }
}

fn deps_file(dir: &Path, path: &str) -> PathBuf {
    dir.join(format!("{path}.deps.json"))
}

impl Compiler for CommandCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Option<Dependencies>> {
        let line = self.command_line(request);
        debug!(path = %request.path, cmd = %line, "compiling");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            c
        };
        cmd.env("PROPATH", &self.propath);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .with_context(|| format!("spawning compiler for '{}'", request.path))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "compiler exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        self.read_dependencies(&request.path)
    }
}
