//! Common types and utilities for the molt migration pipeline.
//!
//! This crate provides foundational types used across all molt crates:
//! - Source spans (`Span`) and line/column mapping (`LineMap`)
//! - File identity (`FileId`)
//! - Comment range scanning
//! - Diagnostics

pub mod comments;
pub mod diagnostics;
pub mod span;

pub use comments::CommentRange;
pub use diagnostics::{Diagnostic, DiagnosticCategory};
pub use span::{LineMap, Span};

/// Reserved directory name for generated namespace barrel files. The layout
/// convention is load-bearing: later passes detect "is this file a namespace
/// barrel" purely by the presence of this path component.
pub const NAMESPACES_DIR: &str = "_namespaces";

/// Index of a source file within a project. Stable for the lifetime of a
/// pipeline run; files are never removed, only added (barrel generation).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
