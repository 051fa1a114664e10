// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed data model and the validated `ConfigFile`.
//! - `loader.rs`: read a config file from disk.
//! - `validate.rs`: compile raw steps and tasks, rejecting bad patterns,
//!   templates and conflicting settings.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    CompilerSection, ConfigFile, ConfigSection, RawConfigFile, StepConfig, TaskConfig,
};
