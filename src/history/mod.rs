// src/history/mod.rs

//! Build history: what the previous successful build produced.
//!
//! - [`model`] defines the catalog and history records.
//! - [`store`] loads the previous snapshot and commits the next one
//!   atomically (write to a temp file, then rename).

pub mod model;
pub mod store;

pub use model::{
    BuildHistorySnapshot, BuiltFile, DatabaseReference, Dependencies, FileState, SourceFile,
    TargetRecord,
};
pub use store::{HistoryStore, HISTORY_FILE_PATH, HISTORY_SCHEMA_VERSION};
