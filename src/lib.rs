// src/lib.rs

pub mod cancel;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod history;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod source;
pub mod target;
pub mod task;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::{BuildContext, TaskPipeline};
use crate::plan::EnvironmentSnapshot;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation (before any scan)
/// - the environment snapshot
/// - local collaborators
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let base = config_root_dir(&config_path);
    let mut cfg = load_and_validate(&config_path)?.rooted_at(&base);
    if args.full_rebuild {
        cfg.config.full_rebuild = true;
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let env = match &args.environment {
        Some(path) => EnvironmentSnapshot::load(&*fs, Path::new(path))?,
        None => EnvironmentSnapshot::default(),
    };

    // Ctrl-C → cooperative cancellation; the build stops at the next check
    // and leaves the previous history in place.
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling build");
            cancel.cancel();
        });
    }

    let ctx = BuildContext::local(&cfg, fs)?.with_cancel(cancel);
    let report = TaskPipeline::new(cfg, ctx)
        .with_environment(env)
        .with_dry_run(args.dry_run)
        .run()
        .await?;

    print!("{report}");
    Ok(())
}

/// Directory relative config paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "configs/Incbuild.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Incbuild.toml" (parent = ""),
///   we fall back to the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
