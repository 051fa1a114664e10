// src/exec/mod.rs

//! Collaborators that touch the outside world.
//!
//! - [`compiler`]: the `Compiler` trait and a shell-command implementation.
//! - [`archiver`]: the `Archiver` trait and a local-filesystem implementation.
//! - [`vcs`]: the `VersionControlFilter` trait and a `git` implementation.
//! - [`pool`]: bounded fan-out of compile batches onto blocking workers.
//! - [`command`]: async shell runner for `exec` tasks.
//!
//! The pipeline only sees the traits, so tests swap in fakes.

pub mod archiver;
pub mod command;
pub mod compiler;
pub mod pool;
pub mod vcs;

pub use archiver::{Archiver, LocalArchiver};
pub use command::{run_shell, CommandOutcome, ShellCommand};
pub use compiler::{CommandCompiler, CompileOutput, CompileRequest, Compiler};
pub use pool::{available_cores, compile_all, PoolConfig};
pub use vcs::{GitFilter, VersionControlFilter};
