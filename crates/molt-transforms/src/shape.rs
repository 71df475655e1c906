//! Namespace shape analysis: dotted name chain and innermost body.

use molt_parser::{ModuleKind, NodeId, NodeKind, SourceFile};

pub struct NamespaceShape {
    /// The dotted name chain, e.g. `["ts", "server"]` for `namespace ts.server`.
    pub path: Vec<String>,
    /// The innermost `ModuleBlock`, if the declaration has one.
    pub block: Option<NodeId>,
}

/// Walk a (possibly dotted) namespace declaration down to its innermost body.
/// Returns `None` for string-literal modules and `declare global` blocks.
pub fn namespace_shape(file: &SourceFile, stmt: NodeId) -> Option<NamespaceShape> {
    let NodeKind::ModuleDecl { module_kind, name, body, .. } = file.arena.kind(stmt) else {
        return None;
    };
    if *module_kind == ModuleKind::Global {
        return None;
    }
    let first = file.arena.ident_text(*name)?;
    let mut path = vec![first.to_string()];
    let mut body = *body;
    loop {
        match body.map(|b| file.arena.kind(b)) {
            Some(NodeKind::ModuleDecl { name, body: inner, .. }) => {
                path.push(file.arena.ident_text(*name)?.to_string());
                body = *inner;
            }
            Some(NodeKind::ModuleBlock { .. }) => {
                return Some(NamespaceShape { path, block: body });
            }
            _ => return Some(NamespaceShape { path, block: None }),
        }
    }
}

/// Statements of the innermost block, or empty.
pub fn block_statements(file: &SourceFile, block: NodeId) -> Vec<NodeId> {
    match file.arena.kind(block) {
        NodeKind::ModuleBlock { statements } => statements.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_chain_shape() {
        let file = SourceFile::parse(
            "t.ts",
            "namespace ts.server.protocol {\n    export const a = 1;\n}\n".to_string(),
        );
        let stmt = file.top_level_statements()[0];
        let shape = namespace_shape(&file, stmt).unwrap();
        assert_eq!(shape.path, ["ts", "server", "protocol"]);
        assert_eq!(block_statements(&file, shape.block.unwrap()).len(), 1);
    }

    #[test]
    fn global_augmentation_is_not_a_namespace() {
        let file = SourceFile::parse(
            "t.ts",
            "declare global {\n    interface Window {}\n}\n".to_string(),
        );
        let stmt = file.top_level_statements()[0];
        assert!(namespace_shape(&file, stmt).is_none());
    }
}
