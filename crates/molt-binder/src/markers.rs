//! Declaration-marker queries: exported / ambient / `@internal`.

use molt_common::comments;
use molt_parser::{modifier_flags, NodeId, NodeKind, SourceFile};

pub fn is_exported(file: &SourceFile, node: NodeId) -> bool {
    file.arena
        .modifiers_of(node)
        .is_some_and(|m| m.has(modifier_flags::EXPORT))
}

/// Ambient: carries `declare`, sits under an ambient ancestor, or lives in a
/// declaration file.
pub fn is_ambient(file: &SourceFile, node: NodeId) -> bool {
    if file.is_declaration_file {
        return true;
    }
    let has_declare = |id: NodeId| {
        file.arena
            .modifiers_of(id)
            .is_some_and(|m| m.has(modifier_flags::DECLARE))
    };
    has_declare(node) || file.arena.ancestors(node).any(has_declare)
}

/// A leading comment containing `@internal` marks a declaration as excluded
/// from the public API surface.
pub fn is_internal_marked(file: &SourceFile, node: NodeId) -> bool {
    comments::has_internal_marker(&file.comments, file.arena.span(node).start, &file.text)
}

/// A statement is "exportable": the kinds that can legally carry an `export`
/// modifier once hoisted to module top level.
pub fn is_exportable(file: &SourceFile, node: NodeId) -> bool {
    matches!(
        file.arena.kind(node),
        NodeKind::VariableStatement { .. }
            | NodeKind::FunctionDecl { .. }
            | NodeKind::ClassDecl { .. }
            | NodeKind::InterfaceDecl { .. }
            | NodeKind::TypeAliasDecl { .. }
            | NodeKind::EnumDecl { .. }
            | NodeKind::ModuleDecl { .. }
            | NodeKind::ImportEqualsDecl { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_and_declare_markers() {
        let file = SourceFile::parse(
            "t.ts",
            "export declare function f(): void;\nfunction g(): void {}\n".to_string(),
        );
        let statements = file.top_level_statements().to_vec();
        assert!(is_exported(&file, statements[0]));
        assert!(is_ambient(&file, statements[0]));
        assert!(!is_exported(&file, statements[1]));
        assert!(!is_ambient(&file, statements[1]));
    }

    #[test]
    fn internal_marker_on_statement() {
        let file = SourceFile::parse(
            "t.ts",
            "/* @internal */\nexport function f(): void {}\nexport function g(): void {}\n"
                .to_string(),
        );
        let statements = file.top_level_statements().to_vec();
        assert!(is_internal_marked(&file, statements[0]));
        assert!(!is_internal_marked(&file, statements[1]));
    }
}
