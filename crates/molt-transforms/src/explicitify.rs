//! Explicitify pass: rewrite every implicit reference to a namespace-scoped
//! declaration into its namespace-qualified form (`Node` → `ts.Node`), so
//! that the hoist pass can treat "which namespace does this come from" as a
//! purely syntactic question.

use molt_binder::{resolver, symbol_flags, ProjectBinder};
use molt_common::FileId;
use molt_parser::{NodeId, NodeKind, SourceFile};
use molt_project::Project;
use tracing::debug;

use crate::edit::EditBuffer;
use crate::PipelineError;

pub fn explicitify(project: &mut Project) -> Result<(), PipelineError> {
    let binder = project.bind();
    let files = project.files();
    let mut rewrites: Vec<(FileId, EditBuffer)> = Vec::new();

    for (index, file) in files.iter().enumerate() {
        if file.is_declaration_file {
            continue;
        }
        let file_id = FileId(index as u32);
        let mut edits = EditBuffer::new();
        visit(&binder, files, file_id, file, file.root, &mut edits);
        if !edits.is_empty() {
            rewrites.push((file_id, edits));
        }
    }

    for (file_id, edits) in rewrites {
        let file = project.file(file_id);
        let new_text = edits.apply(&file.text, &file.file_name)?;
        debug!(file = %file.file_name, "explicitified namespace references");
        project.set_file_text(file_id, new_text);
    }
    Ok(())
}

fn visit(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file_id: FileId,
    file: &SourceFile,
    node: NodeId,
    edits: &mut EditBuffer,
) {
    // `import("mod").M.N` qualifiers are fully qualified by construction;
    // only the type arguments get reprocessed.
    if let NodeKind::ImportType { type_args, .. } = file.arena.kind(node) {
        for &arg in type_args.clone().iter() {
            visit(binder, files, file_id, file, arg, edits);
        }
        return;
    }

    if matches!(file.arena.kind(node), NodeKind::Ident { .. }) {
        try_qualify(binder, files, file_id, file, node, edits);
        return;
    }

    let mut children = Vec::new();
    file.arena.for_each_child(node, |c| children.push(c));
    for child in children {
        visit(binder, files, file_id, file, child, edits);
    }
}

/// Narrow to identifiers which are not the name being declared and not the
/// right-hand member of a property access or qualified name; qualify when the
/// symbol lives in a namespace and is not reachable lexically.
fn try_qualify(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file_id: FileId,
    file: &SourceFile,
    node: NodeId,
    edits: &mut EditBuffer,
) {
    let Some(parent) = file.arena.parent(node) else {
        return;
    };
    if file.arena.declared_name_of(parent) == Some(node) {
        return;
    }
    match file.arena.kind(parent) {
        NodeKind::PropertyAccess { name, .. } if *name == node => return,
        NodeKind::QualifiedName { right, .. } if *right == node => return,
        // Import/export specifier foreign names are not rewritable references.
        NodeKind::ImportSpecifier { .. } | NodeKind::ExportSpecifier { .. } => return,
        _ => {}
    }

    let Some(symbol) = resolver::resolve_symbol_at(binder, files, file_id, node) else {
        return; // unresolved: leave the reference unchanged
    };
    let Some(parent_symbol) = binder.symbols.get(symbol).parent else {
        return;
    };
    if binder.symbols.get(parent_symbol).flags & symbol_flags::NAMESPACE_MODULE == 0 {
        return;
    }
    if resolver::is_declared_in_lexical_scope(binder, files, symbol, file_id, node) {
        return;
    }
    let Some(qualified) = resolver::shortest_qualified_name(binder, files, symbol, file_id, node)
    else {
        return;
    };
    if qualified.len() > 1 {
        edits.replace(file.arena.span(node), qualified.join("."));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sources: &[(&str, &str)]) -> Vec<String> {
        let mut project = Project::from_sources(sources, &[]);
        explicitify(&mut project).unwrap();
        project.files().iter().map(|f| f.text.clone()).collect()
    }

    #[test]
    fn qualifies_cross_file_namespace_member() {
        let texts = run(&[
            ("src/a.ts", "namespace ts {\nexport function f(): void {}\n}\n"),
            (
                "src/b.ts",
                "namespace ts {\nexport function g(): void { f(); }\n}\n",
            ),
        ]);
        assert!(texts[1].contains("ts.f();"), "got: {}", texts[1]);
        // The defining file keeps its local reference-free body unchanged.
        assert!(!texts[0].contains("ts.f"));
    }

    #[test]
    fn same_file_references_stay_bare() {
        let texts = run(&[(
            "src/a.ts",
            "namespace ts {\nexport function f(): void {}\nexport function g(): void { f(); }\n}\n",
        )]);
        assert!(texts[0].contains("{ f(); }"), "got: {}", texts[0]);
    }

    #[test]
    fn qualifies_type_references() {
        let texts = run(&[
            (
                "src/a.ts",
                "namespace ts {\nexport interface Node { kind: number; }\n}\n",
            ),
            (
                "src/b.ts",
                "namespace ts {\nexport function walk(node: Node): void {}\n}\n",
            ),
        ]);
        assert!(texts[1].contains("node: ts.Node"), "got: {}", texts[1]);
    }

    #[test]
    fn nested_namespace_lhs_gets_qualified() {
        let texts = run(&[
            (
                "src/a.ts",
                "namespace ts.server {\nexport const kind = 1;\n}\n",
            ),
            (
                "src/b.ts",
                "namespace ts {\nexport const use = server.kind;\n}\n",
            ),
        ]);
        // `server` is declared in another file, so even the already-dotted
        // access gets its left-hand side homed through the root namespace.
        assert!(texts[1].contains("ts.server.kind"), "got: {}", texts[1]);
    }

    #[test]
    fn local_shadowing_declaration_wins() {
        let texts = run(&[
            ("src/a.ts", "namespace ts {\nexport const flag = 1;\n}\n"),
            (
                "src/b.ts",
                "namespace ts {\nexport function f(): void { const flag = 2; use(flag); }\nexport function use(n: number): void {}\n}\n",
            ),
        ]);
        // The local `flag` is lexically declared; only `use` gains no
        // qualifier since it's same-file.
        assert!(texts[1].contains("use(flag)"), "got: {}", texts[1]);
    }
}
