// src/source/mod.rs

//! Source discovery and change detection.
//!
//! - [`filter`] compiles include/exclude wildcards and regexes.
//! - [`lister`] walks a root directory into an ordered catalog and computes
//!   each file's state against the previous build.
//! - [`hash`] hashes file contents for opt-in content comparison.

pub mod filter;
pub mod hash;
pub mod lister;
pub mod path;

pub use filter::{CaptureMap, FileFilter, Matcher, PatternPolicy};
pub use lister::{compute_state, ComparisonModes, ListOptions, SourceLister};
