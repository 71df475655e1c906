//! Import statement scanning shared by the hoist, inline, and format passes.
//!
//! The unused-import check is heuristic, not semantic: it scans the tree for
//! an identifier that may refer to the import, honoring obvious shadowing
//! (variable declarations in blocks, function parameters). That is the same
//! trade-off the original conversion made; variable shadowing games can fool
//! it, and the post-pass diagnostics gate catches the fallout.

use molt_common::{FileId, Span};
use molt_parser::{modifier_flags, NodeId, NodeKind, SourceFile};
use molt_project::Project;

use crate::edit::EditBuffer;
use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct NamespaceImportInfo {
    pub stmt: NodeId,
    pub local: String,
    pub specifier: String,
}

/// Top-level `import * as X from "..."` statements.
pub fn namespace_imports(file: &SourceFile) -> Vec<NamespaceImportInfo> {
    let mut result = Vec::new();
    for &stmt in file.top_level_statements() {
        let NodeKind::ImportDecl { import_clause: Some(clause), specifier } = file.arena.kind(stmt)
        else {
            continue;
        };
        let NodeKind::ImportClause { named_bindings: Some(bindings), .. } =
            file.arena.kind(*clause)
        else {
            continue;
        };
        let NodeKind::NamespaceImport { name } = file.arena.kind(*bindings) else {
            continue;
        };
        let (Some(local), Some(spec)) = (
            file.arena.ident_text(*name),
            file.arena.string_value(*specifier),
        ) else {
            continue;
        };
        result.push(NamespaceImportInfo {
            stmt,
            local: local.to_string(),
            specifier: spec.to_string(),
        });
    }
    result
}

/// All top-level import declarations (any clause shape).
pub fn top_level_imports(file: &SourceFile) -> Vec<NodeId> {
    file.top_level_statements()
        .iter()
        .copied()
        .filter(|&s| matches!(file.arena.kind(s), NodeKind::ImportDecl { .. }))
        .collect()
}

/// Does any non-import statement reference `name`? Checks only the head of
/// dotted chains, and refuses to descend into scopes that shadow the name.
pub fn contains_reference_to(file: &SourceFile, name: &str) -> bool {
    file.top_level_statements().iter().any(|&stmt| {
        !matches!(file.arena.kind(stmt), NodeKind::ImportDecl { .. })
            && check_node(file, stmt, name)
    })
}

fn check_node(file: &SourceFile, node: NodeId, name: &str) -> bool {
    use NodeKind::*;
    match file.arena.kind(node) {
        QualifiedName { left, .. } => return check_node(file, *left, name),
        PropertyAccess { expr, .. } => return check_node(file, *expr, name),
        Ident { text } if text == name => {
            let is_declared_name = file
                .arena
                .parent(node)
                .is_some_and(|parent| {
                    !matches!(file.arena.kind(parent), ExportSpecifier { .. })
                        && file.arena.declared_name_of(parent) == Some(node)
                });
            return !is_declared_name;
        }
        Block { statements } | ModuleBlock { statements } => {
            if statements.iter().any(|&s| statement_declares(file, s, name)) {
                return false;
            }
        }
        FunctionDecl { params, .. }
        | FunctionExpr { params, .. }
        | ArrowFunction { params, .. }
        | MethodDecl { params, .. }
        | ConstructorDecl { params, .. } => {
            let shadowed = params.iter().any(|&p| {
                if let Param { name: binding, .. } = file.arena.kind(p) {
                    binding_contains_name(file, *binding, name)
                } else {
                    false
                }
            });
            if shadowed {
                return false;
            }
        }
        _ => {}
    }
    let mut found = false;
    file.arena.for_each_child(node, |child| {
        if !found {
            found = check_node(file, child, name);
        }
    });
    found
}

fn statement_declares(file: &SourceFile, stmt: NodeId, name: &str) -> bool {
    let NodeKind::VariableStatement { decl_list, .. } = file.arena.kind(stmt) else {
        return false;
    };
    let NodeKind::VariableDeclarationList { declarations, .. } = file.arena.kind(*decl_list)
    else {
        return false;
    };
    declarations.iter().any(|&d| {
        if let NodeKind::VariableDeclaration { name: binding, .. } = file.arena.kind(d) {
            binding_contains_name(file, *binding, name)
        } else {
            false
        }
    })
}

pub fn binding_contains_name(file: &SourceFile, binding: NodeId, name: &str) -> bool {
    match file.arena.kind(binding) {
        NodeKind::Ident { text } => text == name,
        NodeKind::ObjectBindingPattern { elements } | NodeKind::ArrayBindingPattern { elements } => {
            elements.iter().any(|&e| {
                if let NodeKind::BindingElement { name: inner, .. } = file.arena.kind(e) {
                    binding_contains_name(file, *inner, name)
                } else {
                    false
                }
            })
        }
        _ => false,
    }
}

/// Module specifiers never carry the source extension.
pub fn trim_ts_extension(path: &str) -> &str {
    path.strip_suffix(".d.ts")
        .or_else(|| path.strip_suffix(".ts"))
        .unwrap_or(path)
}

/// A statement's span widened to swallow its trailing newline.
pub fn span_with_trailing_newline(file: &SourceFile, stmt: NodeId) -> Span {
    let span = file.arena.span(stmt);
    let bytes = file.text.as_bytes();
    let mut end = span.end as usize;
    if bytes.get(end) == Some(&b'\r') {
        end += 1;
    }
    if bytes.get(end) == Some(&b'\n') {
        end += 1;
    }
    Span::new(span.start, end as u32)
}

/// Drop namespace imports that nothing references any more. Returns whether
/// the file changed.
pub fn remove_unused_namespace_imports(
    project: &mut Project,
    file_id: FileId,
) -> Result<bool, PipelineError> {
    let file = project.file(file_id);
    let mut edits = EditBuffer::new();
    for import in namespace_imports(file) {
        if !contains_reference_to(file, &import.local) {
            edits.delete(span_with_trailing_newline(file, import.stmt));
        }
    }
    if edits.is_empty() {
        return Ok(false);
    }
    let new_text = edits.apply(&file.text, &file.file_name)?;
    project.set_file_text(file_id, new_text);
    Ok(true)
}

/// Is the file syntactically a module (has at least one import or export)?
pub fn is_module_file(file: &SourceFile) -> bool {
    file.top_level_statements().iter().any(|&stmt| {
        matches!(
            file.arena.kind(stmt),
            NodeKind::ImportDecl { .. }
                | NodeKind::ImportEqualsDecl { .. }
                | NodeKind::ExportDecl { .. }
                | NodeKind::ExportAssignment { .. }
        ) || file
            .arena
            .modifiers_of(stmt)
            .is_some_and(|m| m.has(modifier_flags::EXPORT))
    })
}

/// Re-add an empty export if a file would otherwise stop being a module.
pub fn ensure_module(project: &mut Project, file_id: FileId) {
    let file = project.file(file_id);
    if is_module_file(file) {
        return;
    }
    let mut text = file.text.clone();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str("export {};\n");
    project.set_file_text(file_id, text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_namespace_import_is_removed() {
        let mut project = Project::from_sources(
            &[(
                "src/a.ts",
                "import * as ts from \"./_namespaces/ts\";\nimport * as server from \"./_namespaces/server\";\nts.f();\n",
            )],
            &[],
        );
        let id = project.file_ids().next().unwrap();
        let changed = remove_unused_namespace_imports(&mut project, id).unwrap();
        assert!(changed);
        let text = &project.files()[0].text;
        assert!(text.contains("import * as ts"));
        assert!(!text.contains("import * as server"));
    }

    #[test]
    fn shadowed_use_does_not_count() {
        let mut project = Project::from_sources(
            &[(
                "src/a.ts",
                "import * as ts from \"./_namespaces/ts\";\nfunction f(ts: number): number { return ts; }\n",
            )],
            &[],
        );
        let id = project.file_ids().next().unwrap();
        let changed = remove_unused_namespace_imports(&mut project, id).unwrap();
        assert!(changed, "the only use is shadowed by a parameter");
        assert!(!project.files()[0].text.contains("import"));
    }

    #[test]
    fn ensure_module_appends_empty_export() {
        let mut project =
            Project::from_sources(&[("src/a.ts", "declare global {\n interface X {}\n}\n")], &[]);
        let id = project.file_ids().next().unwrap();
        ensure_module(&mut project, id);
        assert!(project.files()[0].text.ends_with("export {};\n"));
        // Already-module files are left alone.
        ensure_module(&mut project, id);
        let text = &project.files()[0].text;
        assert_eq!(text.matches("export {};").count(), 1);
    }
}
