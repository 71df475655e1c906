//! The project model: source files, configuration units, load and persist.
//!
//! A `Project` is created once per pipeline run from a project root, mutated
//! in place by the passes, and flushed to disk exactly once at the end. File
//! selection follows the migration tool's fixed globs: every TypeScript file
//! under `src/` except declaration files, plus every `tsconfig*.json`.

pub mod config;
pub mod project;

pub use config::ConfigUnit;
pub use project::{join_paths, project_root_from_arg, ts_style_relative_path, Project};

/// Source file selection glob (relative to the project root).
pub const SOURCE_GLOB: &str = "src/**/*.ts";
/// Declaration files are never transformed.
pub const DECLARATION_GLOB: &str = "**/*.d.ts";
/// Configuration-unit selection glob.
pub const TSCONFIG_GLOB: &str = "src/**/tsconfig*.json";
