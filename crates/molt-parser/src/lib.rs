//! TypeScript-subset AST and recursive-descent parser.
//!
//! The AST is arena-allocated: nodes live in a `NodeArena` and refer to each
//! other through `NodeId` indices, with parent links computed after parsing.
//! The subset covers the constructs the migration passes traverse and
//! rewrite: namespaces, import/export forms, declarations, and full
//! expression/type grammars at the fidelity the symbol binder needs.

pub mod ast;
pub mod parser;
pub mod source_file;

pub use ast::{
    modifier_flags, ModuleKind, Node, NodeArena, NodeId, NodeKind, VarKind,
};
pub use parser::Parser;
pub use source_file::SourceFile;
