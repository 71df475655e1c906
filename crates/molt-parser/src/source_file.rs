//! A parsed source file: text, syntax tree, comments, and metadata.

use molt_common::{comments, CommentRange, Diagnostic, NAMESPACES_DIR};

use crate::ast::{NodeArena, NodeId, NodeKind};
use crate::parser::Parser;

#[derive(Debug)]
pub struct SourceFile {
    /// Project-relative path with forward slashes.
    pub file_name: String,
    pub text: String,
    pub arena: NodeArena,
    pub root: NodeId,
    pub comments: Vec<CommentRange>,
    pub parse_diagnostics: Vec<Diagnostic>,
    pub is_declaration_file: bool,
    /// Text changed since load; needs write-back.
    pub dirty: bool,
    /// Synthesized in-memory (barrel file); does not exist on disk yet.
    pub created: bool,
}

impl SourceFile {
    pub fn parse(file_name: impl Into<String>, text: String) -> SourceFile {
        let file_name = file_name.into();
        let is_declaration_file = file_name.ends_with(".d.ts");
        let (arena, root, parse_diagnostics) = Parser::new(file_name.clone(), &text).parse_source_file();
        let comment_ranges = comments::get_comment_ranges(&text);
        SourceFile {
            file_name,
            text,
            arena,
            root,
            comments: comment_ranges,
            parse_diagnostics,
            is_declaration_file,
            dirty: false,
            created: false,
        }
    }

    /// Replace the text and reparse. Node ids from the previous parse are
    /// invalidated; passes that survive an edit must re-walk the new tree.
    pub fn set_text(&mut self, text: String) {
        let (arena, root, parse_diagnostics) =
            Parser::new(self.file_name.clone(), &text).parse_source_file();
        self.text = text;
        self.arena = arena;
        self.root = root;
        self.parse_diagnostics = parse_diagnostics;
        self.comments = comments::get_comment_ranges(&self.text);
        self.dirty = true;
    }

    /// Generated barrel files live in the reserved `_namespaces` directory.
    pub fn is_namespace_barrel(&self) -> bool {
        self.file_name
            .split('/')
            .any(|component| component == NAMESPACES_DIR)
    }

    pub fn top_level_statements(&self) -> &[NodeId] {
        match &self.arena.get(self.root).kind {
            NodeKind::SourceFileNode { statements } => statements,
            _ => &[],
        }
    }

    pub fn node_text(&self, id: NodeId) -> &str {
        self.arena.span(id).text(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ModuleKind;

    #[test]
    fn parses_nested_namespace() {
        let file = SourceFile::parse(
            "src/compiler/checker.ts",
            "namespace ts.server {\n    export function f(): void {}\n}\n".to_string(),
        );
        assert!(file.parse_diagnostics.is_empty(), "{:?}", file.parse_diagnostics);
        let statements = file.top_level_statements().to_vec();
        assert_eq!(statements.len(), 1);
        let NodeKind::ModuleDecl { module_kind, name, body, .. } = &file.arena.get(statements[0]).kind
        else {
            panic!("expected module declaration");
        };
        assert_eq!(*module_kind, ModuleKind::Namespace);
        assert_eq!(file.arena.ident_text(*name), Some("ts"));
        let NodeKind::ModuleDecl { name: inner_name, .. } = &file.arena.get(body.unwrap()).kind
        else {
            panic!("expected nested module declaration");
        };
        assert_eq!(file.arena.ident_text(*inner_name), Some("server"));
    }

    #[test]
    fn barrel_detection_by_path() {
        let barrel =
            SourceFile::parse("src/compiler/_namespaces/ts.ts", "export * from \"../core\";\n".to_string());
        assert!(barrel.is_namespace_barrel());
        let plain = SourceFile::parse("src/compiler/core.ts", "export {};\n".to_string());
        assert!(!plain.is_namespace_barrel());
    }

    #[test]
    fn parent_links_cover_expressions() {
        let file = SourceFile::parse(
            "t.ts",
            "function g() { return ts.factory.createNode(1 + 2); }\n".to_string(),
        );
        assert!(file.parse_diagnostics.is_empty(), "{:?}", file.parse_diagnostics);
        // Find the `ts` identifier and walk up to the source file root.
        let mut ts_ident = None;
        file.arena.walk(file.root, &mut |id| {
            if file.arena.ident_text(id) == Some("ts") {
                ts_ident = Some(id);
            }
            true
        });
        let ts_ident = ts_ident.expect("found ts identifier");
        let chain: Vec<_> = file.arena.ancestors(ts_ident).collect();
        assert_eq!(*chain.last().unwrap(), file.root);
    }

    #[test]
    fn tolerates_errors_with_diagnostics() {
        let file = SourceFile::parse("bad.ts", "function (] {\n".to_string());
        assert!(!file.parse_diagnostics.is_empty());
    }
}
