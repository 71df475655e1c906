//! Import formatter: each file's accumulated import block is pruned of
//! unused bindings, merged per specifier, sorted, and rewrapped at a fixed
//! column budget. A file that loses its last import keeps module semantics
//! via an empty export.

use indexmap::{IndexMap, IndexSet};
use molt_common::FileId;
use molt_parser::{NodeId, NodeKind, SourceFile};
use molt_project::Project;
use tracing::debug;

use crate::edit::EditBuffer;
use crate::imports::{contains_reference_to, ensure_module, span_with_trailing_newline};
use crate::PipelineError;

const MAX_LINE_WIDTH: usize = 120;

pub fn format_imports(project: &mut Project) -> Result<(), PipelineError> {
    for file_id in project.file_ids().collect::<Vec<_>>() {
        let file = project.file(file_id);
        if file.is_declaration_file || file.is_namespace_barrel() {
            continue;
        }
        format_file_imports(project, file_id)?;
    }
    Ok(())
}

/// One parsed top-level import declaration.
#[derive(Debug, Default, Clone)]
struct ImportShape {
    specifier: String,
    type_only: bool,
    default_name: Option<String>,
    namespace_name: Option<String>,
    /// (foreign name, local name); identical when unaliased.
    named: Vec<(String, String)>,
    /// `import "specifier";` with no clause, kept for its evaluation effect.
    side_effect: bool,
}

pub fn format_file_imports(project: &mut Project, file_id: FileId) -> Result<(), PipelineError> {
    let file = project.file(file_id);
    let mut shapes = Vec::new();
    let mut opaque = false;
    for &stmt in file.top_level_statements() {
        if !matches!(file.arena.kind(stmt), NodeKind::ImportDecl { .. }) {
            continue;
        }
        match parse_import(file, stmt) {
            Some(shape) => shapes.push(shape),
            // A clause shape outside the modeled subset: touch nothing in
            // this file rather than risk dropping a binding.
            None => opaque = true,
        }
    }
    // Nothing to format (or a clause outside the modeled subset): leave the
    // file alone. Only files whose import block is actually rewritten get
    // the module-validity treatment.
    if shapes.is_empty() || opaque {
        return Ok(());
    }

    // Drop bindings nothing references. The scan is shadow-aware but
    // heuristic; the post-pass diagnostics gate backstops it.
    for shape in &mut shapes {
        if shape.default_name.as_deref().is_some_and(|n| !contains_reference_to(file, n)) {
            shape.default_name = None;
        }
        if shape.namespace_name.as_deref().is_some_and(|n| !contains_reference_to(file, n)) {
            shape.namespace_name = None;
        }
        shape.named.retain(|(_, local)| contains_reference_to(file, local));
    }
    shapes.retain(|s| {
        s.side_effect
            || s.default_name.is_some()
            || s.namespace_name.is_some()
            || !s.named.is_empty()
    });

    // Merge named/default imports per (specifier, type-only); namespace
    // imports keep their own statement.
    let mut side_effects: IndexSet<String> = IndexSet::new();
    let mut namespaces: Vec<(String, String, bool)> = Vec::new();
    let mut merged: IndexMap<(String, bool), ImportShape> = IndexMap::new();
    for shape in shapes {
        if shape.side_effect {
            side_effects.insert(shape.specifier.clone());
            continue;
        }
        if let Some(name) = &shape.namespace_name {
            namespaces.push((shape.specifier.clone(), name.clone(), shape.type_only));
        }
        if shape.default_name.is_none() && shape.named.is_empty() {
            continue;
        }
        let entry = merged
            .entry((shape.specifier.clone(), shape.type_only))
            .or_insert_with(|| ImportShape {
                specifier: shape.specifier.clone(),
                type_only: shape.type_only,
                ..ImportShape::default()
            });
        if entry.default_name.is_none() {
            entry.default_name = shape.default_name.clone();
        }
        for binding in shape.named {
            if !entry.named.contains(&binding) {
                entry.named.push(binding);
            }
        }
    }

    // Sort: package specifiers before relative ones, lexicographic within
    // each group; named bindings by foreign name.
    namespaces.sort_by(|a, b| specifier_order(&a.0).cmp(&specifier_order(&b.0)));
    merged.sort_by(|a_key, _, b_key, _| {
        specifier_order(&a_key.0)
            .cmp(&specifier_order(&b_key.0))
            .then(a_key.1.cmp(&b_key.1))
    });
    for shape in merged.values_mut() {
        shape.named.sort();
    }

    let mut lines: Vec<String> = Vec::new();
    for specifier in &side_effects {
        lines.push(format!("import \"{specifier}\";"));
    }
    for (specifier, name, type_only) in &namespaces {
        let prefix = if *type_only { "import type" } else { "import" };
        lines.push(format!("{prefix} * as {name} from \"{specifier}\";"));
    }
    for shape in merged.values() {
        lines.push(render_import(shape));
    }

    let mut edits = EditBuffer::new();
    let mut insert_at = None;
    for &stmt in file.top_level_statements() {
        if matches!(file.arena.kind(stmt), NodeKind::ImportDecl { .. }) {
            if insert_at.is_none() {
                insert_at = Some(file.arena.span(stmt).start);
            }
            edits.delete(span_with_trailing_newline(file, stmt));
        }
    }
    if let Some(at) = insert_at {
        if !lines.is_empty() {
            edits.insert(at, format!("{}\n", lines.join("\n")));
        }
        let new_text = edits.apply(&file.text, &file.file_name)?;
        debug!(file = %file.file_name, imports = lines.len(), "formatted import block");
        project.set_file_text(file_id, new_text);
    }
    ensure_module(project, file_id);
    Ok(())
}

fn parse_import(file: &SourceFile, stmt: NodeId) -> Option<ImportShape> {
    let NodeKind::ImportDecl { import_clause, specifier } = file.arena.kind(stmt) else {
        return None;
    };
    let mut shape = ImportShape {
        specifier: file.arena.string_value(*specifier)?.to_string(),
        ..ImportShape::default()
    };
    let Some(clause) = import_clause else {
        shape.side_effect = true;
        return Some(shape);
    };
    let NodeKind::ImportClause { is_type_only, name, named_bindings } = file.arena.kind(*clause)
    else {
        return None;
    };
    shape.type_only = *is_type_only;
    if let Some(name) = name {
        shape.default_name = Some(file.arena.ident_text(*name)?.to_string());
    }
    if let Some(bindings) = named_bindings {
        match file.arena.kind(*bindings) {
            NodeKind::NamespaceImport { name } => {
                shape.namespace_name = Some(file.arena.ident_text(*name)?.to_string());
            }
            NodeKind::NamedImports { elements } => {
                for &element in elements {
                    let NodeKind::ImportSpecifier { property_name, name, .. } =
                        file.arena.kind(element)
                    else {
                        return None;
                    };
                    let local = file.arena.ident_text(*name)?.to_string();
                    let foreign = match property_name {
                        Some(p) => file.arena.ident_text(*p)?.to_string(),
                        None => local.clone(),
                    };
                    shape.named.push((foreign, local));
                }
            }
            _ => return None,
        }
    }
    Some(shape)
}

/// Relative specifiers sort after package specifiers.
fn specifier_order(specifier: &str) -> (bool, String) {
    (specifier.starts_with('.'), specifier.to_string())
}

fn render_import(shape: &ImportShape) -> String {
    let prefix = if shape.type_only { "import type " } else { "import " };
    let bindings: Vec<String> = shape
        .named
        .iter()
        .map(|(foreign, local)| {
            if foreign == local {
                foreign.clone()
            } else {
                format!("{foreign} as {local}")
            }
        })
        .collect();
    let default_part = match &shape.default_name {
        Some(name) if bindings.is_empty() => {
            return format!("{prefix}{name} from \"{}\";", shape.specifier);
        }
        Some(name) => format!("{name}, "),
        None => String::new(),
    };
    let single = format!(
        "{prefix}{default_part}{{ {} }} from \"{}\";",
        bindings.join(", "),
        shape.specifier
    );
    if single.len() <= MAX_LINE_WIDTH {
        return single;
    }

    // Over budget: pack the named bindings into indented lines.
    let mut out = format!("{prefix}{default_part}{{\n");
    let mut line = String::new();
    for binding in &bindings {
        let piece = format!("{binding},");
        if !line.is_empty() && 4 + line.len() + 1 + piece.len() > MAX_LINE_WIDTH {
            out.push_str("    ");
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&piece);
    }
    if !line.is_empty() {
        out.push_str("    ");
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&format!("}} from \"{}\";", shape.specifier));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> String {
        let mut project = Project::from_sources(&[("src/a.ts", source)], &[]);
        let id = project.file_ids().next().unwrap();
        format_file_imports(&mut project, id).unwrap();
        project.files()[0].text.clone()
    }

    #[test]
    fn merges_and_sorts_imports_per_specifier() {
        let text = run(concat!(
            "import { b } from \"./x\";\n",
            "import { a } from \"./x\";\n",
            "import { z } from \"assert\";\n",
            "a(); b(); z();\n",
        ));
        let formatted = "import { z } from \"assert\";\nimport { a, b } from \"./x\";\n";
        assert!(text.starts_with(formatted), "got: {text}");
    }

    #[test]
    fn removes_unused_bindings_and_keeps_module() {
        let text = run("import { used, unused } from \"./x\";\nused();\n");
        assert!(text.contains("import { used } from \"./x\";"), "got: {text}");
        assert!(!text.contains("unused"), "got: {text}");

        let empty = run("import { unused } from \"./x\";\nconst a = 1;\n");
        assert!(!empty.contains("import"), "got: {empty}");
        assert!(empty.ends_with("export {};\n"), "stays a module: {empty}");
    }

    #[test]
    fn side_effect_imports_survive() {
        let text = run("import \"./polyfill\";\nconst a = 1;\nexport { a };\n");
        assert!(text.contains("import \"./polyfill\";"), "got: {text}");
    }

    #[test]
    fn aliased_bindings_render_with_as() {
        let text = run("import { foreign as local } from \"./x\";\nlocal();\n");
        assert!(text.contains("import { foreign as local } from \"./x\";"), "got: {text}");
    }

    #[test]
    fn long_import_lines_wrap_at_the_column_budget() {
        let names: Vec<String> = (0..30).map(|i| format!("someExportedName{i:02}")).collect();
        let source = format!(
            "import {{ {} }} from \"./x\";\n{}\n",
            names.join(", "),
            names.iter().map(|n| format!("{n}();")).collect::<Vec<_>>().join("\n"),
        );
        let text = run(&source);
        assert!(text.contains("import {\n"), "got: {text}");
        for line in text.lines() {
            assert!(line.len() <= MAX_LINE_WIDTH, "overlong line: {line}");
        }
        assert!(text.contains("} from \"./x\";"), "got: {text}");
    }

    #[test]
    fn unused_namespace_import_is_dropped() {
        let text = run("import * as ts from \"./_namespaces/ts\";\nexport function f(): void {}\n");
        assert!(!text.contains("import * as ts"), "got: {text}");
    }
}
