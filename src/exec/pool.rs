// src/exec/pool.rs

//! Bounded fan-out of compile work.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::errors::{BuildError, Result};
use crate::exec::compiler::{CompileOutput, CompileRequest, Compiler};

/// Worker pool sizing knobs, from `[config]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    pub process_isolation: bool,
    pub workers_per_core: f64,
    pub min_files_per_worker: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            process_isolation: true,
            workers_per_core: 1.0,
            min_files_per_worker: 10,
        }
    }
}

impl PoolConfig {
    /// Workers for `files` files on a machine with `cores` cores.
    ///
    /// `clamp(ceil(cores * workers_per_core), 1, max(1, files / min_files_per_worker))`,
    /// or 1 without process isolation.
    pub fn size_for(&self, files: usize, cores: usize) -> usize {
        if !self.process_isolation {
            return 1;
        }
        let wanted = (cores as f64 * self.workers_per_core).ceil().max(1.0) as usize;
        let cap = (files / self.min_files_per_worker.max(1)).max(1);
        wanted.clamp(1, cap)
    }
}

pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Compile `requests` on up to `workers` blocking workers.
///
/// Each worker owns a contiguous slice; the per-worker results are
/// concatenated in the original order once every worker has joined.
pub async fn compile_all(
    compiler: Arc<dyn Compiler>,
    requests: Vec<CompileRequest>,
    workers: usize,
    stop_on_failure: bool,
    cancel: &CancelToken,
) -> Result<Vec<CompileOutput>> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let workers = workers.clamp(1, requests.len());
    let chunk_len = requests.len().div_ceil(workers);
    debug!(files = requests.len(), workers, chunk_len, "starting compile workers");

    let mut set = JoinSet::new();
    let mut rest = requests;
    let mut worker = 0usize;
    while !rest.is_empty() {
        let tail = rest.split_off(chunk_len.min(rest.len()));
        let batch = std::mem::replace(&mut rest, tail);
        let compiler = Arc::clone(&compiler);
        let cancel = cancel.clone();
        let id = worker;
        set.spawn_blocking(move || (id, compiler.compile_batch(&batch, stop_on_failure, &cancel)));
        worker += 1;
    }

    let mut slices: Vec<(usize, Vec<CompileOutput>)> = Vec::with_capacity(worker);
    while let Some(joined) = set.join_next().await {
        let slice = joined.map_err(|e| BuildError::Other(anyhow!("compile worker panicked: {e}")))?;
        slices.push(slice);
    }
    slices.sort_by_key(|(id, _)| *id);

    Ok(slices.into_iter().flat_map(|(_, out)| out).collect())
}
