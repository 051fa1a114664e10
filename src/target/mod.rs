// src/target/mod.rs

//! Target templates and their expansion into output locations.

pub mod resolver;
pub mod template;

pub use resolver::{group_by_container, group_entry_names, is_rooted, ArchiveGroup, TargetResolver};
pub use template::{Template, FILE_SOURCE_DIRECTORY};
