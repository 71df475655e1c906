//! The transformation passes and their registry.
//!
//! Passes run in a fixed order against a loaded [`molt_project::Project`]:
//! unindent → explicitify → stripNamespaces → inlineImports → formatImports.
//! Each pass completes fully across all files before the next begins; a pass
//! that cannot proceed safely aborts the run instead of leaving a partially
//! consistent tree.

pub mod edit;
pub mod explicitify;
pub mod format_imports;
pub mod imports;
pub mod inline_imports;
pub mod shape;
pub mod strip_namespaces;
pub mod unindent;

use molt_project::Project;
use thiserror::Error;

/// Pipeline error kinds. Resolution failures are deliberately absent: an
/// unresolved symbol is the conservative "leave it alone" case, never an
/// error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown pass `{0}`")]
    UnknownPass(String),
    /// A structural assumption about the input was violated; the codebase no
    /// longer matches the modeled subset and needs a manual patch.
    #[error("{file}: {message}")]
    ShapeAssumption { file: String, message: String },
    #[error("{count} diagnostics after `{pass}`")]
    PostPassDiagnostics { pass: String, count: usize },
    #[error("too many diagnostics after `{pass}` to display ({count})")]
    ExcessiveDiagnosticCount { pass: String, count: usize },
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

pub type PassFn = fn(&mut Project) -> Result<(), PipelineError>;

pub struct Pass {
    pub name: &'static str,
    /// Whether the pass participates in the full ordered batch.
    pub batch: bool,
    pub run: PassFn,
}

/// The registry, in execution order. `noop` checks diagnostics without
/// transforming and is excluded from the batch.
pub const PASSES: &[Pass] = &[
    Pass { name: "noop", batch: false, run: noop },
    Pass { name: "unindent", batch: true, run: unindent::unindent },
    Pass { name: "explicitify", batch: true, run: explicitify::explicitify },
    Pass { name: "stripNamespaces", batch: true, run: strip_namespaces::strip_namespaces },
    Pass { name: "inlineImports", batch: true, run: inline_imports::inline_imports },
    Pass { name: "formatImports", batch: true, run: format_imports::format_imports },
];

pub fn find_pass(name: &str) -> Option<&'static Pass> {
    PASSES.iter().find(|pass| pass.name == name)
}

fn noop(_project: &mut Project) -> Result<(), PipelineError> {
    Ok(())
}
