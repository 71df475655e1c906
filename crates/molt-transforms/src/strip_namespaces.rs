//! Strip-namespaces (hoist) pass.
//!
//! Eliminates namespace declarations as a construct: each file's namespace
//! bodies become top-level module content, and every namespace path is
//! reconstructed as a generated barrel module of re-exports under the
//! reserved `_namespaces` directory. Along the way `@internal` markers move
//! down onto the now-independent declarations, cross-file interface merges
//! become module augmentations, merged/ambient globals become
//! `declare global` blocks, and config units are rewritten for per-file
//! output.
//!
//! Deliberately unhandled: class/namespace merges (dropped during reference
//! collection) and nested-namespace merge cycles. Residual cases are fixed by
//! hand after the run.

use indexmap::{IndexMap, IndexSet};
use molt_binder::{markers, resolver, ProjectBinder};
use molt_common::{FileId, NAMESPACES_DIR};
use molt_parser::{modifier_flags, NodeId, NodeKind, SourceFile};
use molt_project::{ts_style_relative_path, Project};
use tracing::{debug, info};

use crate::edit::EditBuffer;
use crate::imports::{
    ensure_module, remove_unused_namespace_imports, span_with_trailing_newline, trim_ts_extension,
};
use crate::shape::{block_statements, namespace_shape};
use crate::PipelineError;

#[derive(Default)]
struct BarrelPlan {
    /// Barrel path → contributing source files, in discovery order.
    files: IndexMap<String, IndexSet<String>>,
    /// Config-unit path → barrel paths registered to it.
    config_members: IndexMap<String, IndexSet<String>>,
}

impl BarrelPlan {
    fn get_or_create(&mut self, barrel: &str, config: &str) -> &mut IndexSet<String> {
        self.config_members
            .entry(config.to_string())
            .or_default()
            .insert(barrel.to_string());
        self.files.entry(barrel.to_string()).or_default()
    }

    fn owning_config(&self, barrel: &str) -> Option<&str> {
        self.config_members
            .iter()
            .find(|(_, members)| members.contains(barrel))
            .map(|(config, _)| config.as_str())
    }
}

struct Collected {
    plan: BarrelPlan,
    /// File → top-level namespace names it needs imported after the hoist.
    required_imports: IndexMap<u32, IndexSet<String>>,
    /// Step 3+4 rewrite edits, per file.
    rewrites: Vec<(FileId, EditBuffer)>,
}

pub fn strip_namespaces(project: &mut Project) -> Result<(), PipelineError> {
    let binder = project.bind();
    let collected = collect(project, &binder)?;

    // Step 2: synthesize one barrel per namespace path and register it with
    // its config unit.
    let mut created = 0usize;
    for (barrel_path, contributors) in &collected.plan.files {
        let text = barrel_text(project, &collected.plan, barrel_path, contributors)?;
        project.create_source_file(barrel_path.clone(), text);
        created += 1;
        let config_index = collected
            .plan
            .owning_config(barrel_path)
            .and_then(|path| project.configs.iter().position(|c| c.path == path));
        if let Some(index) = config_index {
            let relative = ts_style_relative_path(&project.configs[index].path, barrel_path);
            project.configs[index].add_files(&[relative]);
        }
    }
    info!(barrels = created, "created namespace barrel files");

    // Steps 3+4: rewrite augmentations and flatten namespace bodies.
    for (file_id, edits) in collected.rewrites {
        let file = project.file(file_id);
        let new_text = edits.apply(&file.text, &file.file_name)?;
        project.set_file_text(file_id, new_text);
    }

    // Step 5: add namespace imports, then drop the unused ones; keep every
    // touched file a syntactic module.
    for (file_index, namespaces) in &collected.required_imports {
        let file_id = FileId(*file_index);
        let file = project.file(file_id);
        let (_, config_root) = owning_config(project, &file.file_name);
        let mut lines = Vec::new();
        for namespace in namespaces {
            let Some(barrel) = find_barrel(&collected.plan, project, &file.file_name, &config_root, namespace)
            else {
                continue; // namespace from outside the modeled project
            };
            let relative = ts_style_relative_path(&file.file_name, &barrel);
            let specifier = trim_ts_extension(&relative);
            lines.push(format!("import * as {namespace} from \"{specifier}\";"));
        }
        if !lines.is_empty() {
            let file = project.file(file_id);
            let insert_at = file
                .top_level_statements()
                .first()
                .map(|&s| file.arena.span(s).start)
                .unwrap_or(file.text.len() as u32);
            let mut edits = EditBuffer::new();
            edits.insert(insert_at, format!("{}\n", lines.join("\n")));
            let new_text = edits.apply(&file.text, &file.file_name)?;
            project.set_file_text(file_id, new_text);
        }
        remove_unused_namespace_imports(project, file_id)?;
    }
    for file_id in project.file_ids().collect::<Vec<_>>() {
        let file = project.file(file_id);
        if file.dirty && !file.created && !file.is_declaration_file {
            ensure_module(project, file_id);
        }
    }

    // Step 6: rewrite configuration units for per-file emit.
    for config in &mut project.configs {
        config.remove_prepend();
        config.convert_out_file_to_out_dir();
    }
    Ok(())
}

// ===== Step 1: reference and contribution collection =====

fn collect(project: &Project, binder: &ProjectBinder) -> Result<Collected, PipelineError> {
    let files = project.files();
    let mut plan = BarrelPlan::default();
    let mut required_imports: IndexMap<u32, IndexSet<String>> = IndexMap::new();
    let mut rewrites = Vec::new();

    for (index, file) in files.iter().enumerate() {
        let file_id = FileId(index as u32);
        if file.is_declaration_file || file.is_namespace_barrel() {
            continue;
        }
        let (config_key, config_root) = owning_config(project, &file.file_name);

        for &stmt in file.top_level_statements() {
            let Some(shape) = namespace_shape(file, stmt) else {
                continue;
            };
            if shape.block.is_none() {
                continue;
            }
            required_imports
                .entry(file_id.0)
                .or_default()
                .insert(shape.path[0].clone());
            let barrel = barrel_path(&config_root, &shape.path.join("."));
            plan.get_or_create(&barrel, &config_key).insert(file.file_name.clone());
            for prefix in 1..shape.path.len() {
                let parent = barrel_path(&config_root, &shape.path[..prefix].join("."));
                plan.get_or_create(&parent, &config_key);
            }
        }

        collect_referenced_namespaces(binder, files, file_id, file, &mut required_imports);
        let edits = rewrite_file(binder, files, file_id, file)?;
        if !edits.is_empty() {
            rewrites.push((file_id, edits));
        }
    }

    Ok(Collected { plan, required_imports, rewrites })
}

/// Record, per file, the top-level namespace names whose reconstructed
/// barrels the file will need to import: identifiers whose declarations are
/// all namespace declarations external to this file, none from a declaration
/// file, and none a class (class/namespace merges are dropped by design).
fn collect_referenced_namespaces(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file_id: FileId,
    file: &SourceFile,
    required_imports: &mut IndexMap<u32, IndexSet<String>>,
) {
    file.arena.walk(file.root, &mut |node| {
        if !matches!(file.arena.kind(node), NodeKind::Ident { .. }) {
            return true;
        }
        if !is_reference_position(file, node) {
            return true;
        }
        let Some(symbol) = resolver::resolve_symbol_at(binder, files, file_id, node) else {
            return true;
        };
        let symbol = binder.symbols.get(symbol);
        let declarations = &symbol.declarations;
        if declarations.is_empty() {
            return true;
        }
        let is_namespace = declarations.iter().any(|d| {
            matches!(files[d.file.index()].arena.kind(d.node), NodeKind::ModuleDecl { .. })
        });
        let external = declarations.iter().any(|d| d.file != file_id);
        let from_lib = declarations
            .iter()
            .any(|d| files[d.file.index()].is_declaration_file);
        let merges_class = declarations.iter().any(|d| {
            matches!(files[d.file.index()].arena.kind(d.node), NodeKind::ClassDecl { .. })
        });
        if is_namespace && external && !from_lib && !merges_class {
            required_imports
                .entry(file_id.0)
                .or_default()
                .insert(symbol.name.clone());
        }
        true
    });
}

/// Identifier positions that constitute references: not a declared name, not
/// the right-hand member of a dotted access.
fn is_reference_position(file: &SourceFile, node: NodeId) -> bool {
    let Some(parent) = file.arena.parent(node) else {
        return false;
    };
    if file.arena.declared_name_of(parent) == Some(node) {
        return false;
    }
    match file.arena.kind(parent) {
        NodeKind::PropertyAccess { name, .. } if *name == node => false,
        NodeKind::QualifiedName { right, .. } if *right == node => false,
        NodeKind::ImportSpecifier { .. } | NodeKind::ExportSpecifier { .. } => false,
        _ => true,
    }
}

// ===== Steps 3+4: per-file rewriting =====

fn rewrite_file(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file_id: FileId,
    file: &SourceFile,
) -> Result<EditBuffer, PipelineError> {
    let mut edits = EditBuffer::new();
    for &stmt in file.top_level_statements() {
        if let Some(shape) = namespace_shape(file, stmt) {
            if let Some(block) = shape.block {
                flatten_namespace(binder, files, file_id, file, stmt, block, &mut edits);
                continue;
            }
        }
        rewrite_globalish_statement(binder, files, file_id, file, stmt, &mut edits);
    }
    Ok(edits)
}

/// Replace a namespace declaration with the raw text of its body statements,
/// propagating `@internal` markers and rewriting cross-file interface
/// augmentations into module augmentations.
fn flatten_namespace(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file_id: FileId,
    file: &SourceFile,
    stmt: NodeId,
    block: NodeId,
    edits: &mut EditBuffer,
) {
    let statements = block_statements(file, block);
    if statements.is_empty() {
        // Scenario: an empty namespace vanishes rather than leaving `{}`.
        edits.delete(span_with_trailing_newline(file, stmt));
        return;
    }

    let ns_internal =
        markers::is_internal_marked(file, stmt) && markers::is_exported(file, stmt);
    let block_span = file.arena.span(block);
    let body_start = block_span.start as usize + 1; // past `{`
    let body_end = block_span.end as usize - 1; // before `}`

    let mut out = String::new();
    let mut cursor = body_start;
    for &inner in &statements {
        let inner_span = file.arena.span(inner);
        out.push_str(&file.text[cursor..inner_span.start as usize]);
        let mut piece = file.text[inner_span.start as usize..inner_span.end as usize].to_string();

        if let Some(augmented) = interface_augmentation(binder, files, file_id, file, inner) {
            piece = augmented;
        } else if ns_internal
            && markers::is_exportable(file, inner)
            && markers::is_exported(file, inner)
            && !markers::is_internal_marked(file, inner)
        {
            piece = format!("/* @internal */\n{piece}");
        }
        out.push_str(&piece);
        cursor = inner_span.end as usize;
    }
    out.push_str(&file.text[cursor..body_end]);

    let trimmed = out.trim_matches('\n');
    edits.replace(file.arena.span(stmt), trimmed.to_string());
}

/// An interface declaration that augments a primary declaration in another
/// file must become a module augmentation once the namespace wrapper is gone.
fn interface_augmentation(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file_id: FileId,
    file: &SourceFile,
    stmt: NodeId,
) -> Option<String> {
    let NodeKind::InterfaceDecl { name, .. } = file.arena.kind(stmt) else {
        return None;
    };
    let symbol = resolver::resolve_symbol_at(binder, files, file_id, *name)?;
    let declarations = &binder.symbols.get(symbol).declarations;
    if declarations.len() < 2 {
        return None;
    }
    let primary = declarations[0];
    let spans_files = declarations.iter().any(|d| d.file != primary.file);
    if !spans_files {
        return None;
    }
    if primary.file == file_id && primary.node == stmt {
        return None; // this is the primary declaration
    }
    let target = &files[primary.file.index()].file_name;
    let relative = ts_style_relative_path(&file.file_name, target);
    let specifier = trim_ts_extension(&relative);
    let body = file.node_text(stmt);
    Some(format!("declare module \"{specifier}\" {{\n{body}\n}}"))
}

/// Top-level interfaces and single-declarator variable statements that are
/// merged across files or explicitly ambient keep their global meaning via a
/// `declare global` block.
fn rewrite_globalish_statement(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file_id: FileId,
    file: &SourceFile,
    stmt: NodeId,
    edits: &mut EditBuffer,
) {
    let name = match file.arena.kind(stmt) {
        NodeKind::InterfaceDecl { name, .. } => *name,
        NodeKind::VariableStatement { decl_list, .. } => {
            let NodeKind::VariableDeclarationList { declarations, .. } =
                file.arena.kind(*decl_list)
            else {
                return;
            };
            if declarations.len() != 1 {
                return;
            }
            let NodeKind::VariableDeclaration { name, .. } = file.arena.kind(declarations[0])
            else {
                return;
            };
            *name
        }
        _ => return,
    };
    let symbol = resolver::resolve_symbol_at(binder, files, file_id, name);
    let is_merged = symbol.is_some_and(|s| {
        let declarations = &binder.symbols.get(s).declarations;
        declarations.len() > 1 && declarations.iter().any(|d| d.file != declarations[0].file)
    });
    let is_ambient = markers::is_ambient(file, stmt);
    if !is_merged && !is_ambient {
        return;
    }

    let internal = markers::is_internal_marked(file, stmt) && markers::is_exported(file, stmt);
    let body = strip_declare_modifier(file, stmt);
    let marker = if internal { "/* @internal */\n" } else { "" };
    edits.replace(
        file.arena.span(stmt),
        format!("{marker}declare global {{\n{body}\n}}"),
    );
}

fn strip_declare_modifier(file: &SourceFile, stmt: NodeId) -> String {
    let span = file.arena.span(stmt);
    let declare_span = file
        .arena
        .modifiers_of(stmt)
        .and_then(|m| m.span_of(modifier_flags::DECLARE));
    let Some(declare_span) = declare_span else {
        return file.node_text(stmt).to_string();
    };
    let mut end = declare_span.end as usize;
    while file.text.as_bytes().get(end) == Some(&b' ') {
        end += 1;
    }
    let mut out = String::new();
    out.push_str(&file.text[span.start as usize..declare_span.start as usize]);
    out.push_str(&file.text[end..span.end as usize]);
    out
}

// ===== Step 2: barrel synthesis =====

fn barrel_text(
    project: &Project,
    plan: &BarrelPlan,
    barrel: &str,
    contributors: &IndexSet<String>,
) -> Result<String, PipelineError> {
    let mut statements = Vec::new();

    // Re-export the same namespace path from each config dependency that
    // independently defines it, so downstream projects see the union.
    if let Some(config_path) = plan.owning_config(barrel) {
        if let Some(config) = project.configs.iter().find(|c| c.path == config_path) {
            let base = barrel_base_name(barrel);
            for dep_dir in config.reference_dirs() {
                let dep_barrel = format!("{dep_dir}/{NAMESPACES_DIR}/{base}");
                if plan.files.contains_key(&dep_barrel) {
                    let relative = ts_style_relative_path(barrel, &dep_barrel);
                    let specifier = trim_ts_extension(&relative);
                    statements.push(format!("export * from \"{specifier}\";"));
                }
            }
        }
    }

    for contributor in contributors {
        let relative = ts_style_relative_path(barrel, contributor);
        let specifier = trim_ts_extension(&relative);
        statements.push(format!("export * from \"{specifier}\";"));
    }

    // Nested namespaces one level deeper re-attach as properties of this
    // barrel: `import * as server from "./ts.server"; export { server };`.
    let current_ns = trim_ts_extension(barrel_base_name(barrel));
    let dir = barrel_dir(barrel);
    for other in plan.files.keys() {
        if other == barrel || barrel_dir(other) != dir {
            continue;
        }
        let other_ns = trim_ts_extension(barrel_base_name(other));
        let Some((parent, last)) = other_ns.rsplit_once('.') else {
            continue;
        };
        if parent == current_ns {
            statements.push(format!("import * as {last} from \"./{other_ns}\";"));
            statements.push(format!("export {{ {last} }};"));
        }
    }

    if statements.is_empty() {
        return Err(PipelineError::ShapeAssumption {
            file: barrel.to_string(),
            message: "barrel generation produced no statements".to_string(),
        });
    }
    debug!(barrel, statements = statements.len(), "synthesized barrel");
    Ok(format!("{}\n", statements.join("\n")))
}

// ===== Path helpers =====

fn owning_config(project: &Project, file_name: &str) -> (String, String) {
    match project.config_for_file(file_name) {
        Some(index) => {
            let config = &project.configs[index];
            (config.path.clone(), config.root_dir().to_string())
        }
        None => {
            // Config-less fixture projects root their barrels next to the
            // top-level source directory.
            let root = match file_name.find('/') {
                Some(idx) => file_name[..idx].to_string(),
                None => String::new(),
            };
            (String::new(), root)
        }
    }
}

fn barrel_path(config_root: &str, ns_dotted: &str) -> String {
    if config_root.is_empty() {
        format!("{NAMESPACES_DIR}/{ns_dotted}.ts")
    } else {
        format!("{config_root}/{NAMESPACES_DIR}/{ns_dotted}.ts")
    }
}

fn barrel_base_name(barrel: &str) -> &str {
    match barrel.rfind('/') {
        Some(idx) => &barrel[idx + 1..],
        None => barrel,
    }
}

fn barrel_dir(barrel: &str) -> &str {
    match barrel.rfind('/') {
        Some(idx) => &barrel[..idx],
        None => "",
    }
}

/// The barrel a file should import a namespace from: its own config's barrel
/// when that exists, otherwise the first referenced config that defines one.
fn find_barrel(
    plan: &BarrelPlan,
    project: &Project,
    file_name: &str,
    config_root: &str,
    namespace: &str,
) -> Option<String> {
    let own = barrel_path(config_root, namespace);
    if plan.files.contains_key(&own) {
        return Some(own);
    }
    let config_index = project.config_for_file(file_name)?;
    for dep_dir in project.configs[config_index].reference_dirs() {
        let candidate = format!("{dep_dir}/{NAMESPACES_DIR}/{namespace}.ts");
        if plan.files.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explicitify::explicitify;

    fn file_text<'a>(project: &'a Project, name: &str) -> &'a str {
        let id = project.file_by_path(name).expect("file exists");
        &project.file(id).text
    }

    #[test]
    fn scenario_two_files_one_namespace() {
        let mut project = Project::from_sources(
            &[
                ("src/a.ts", "namespace ts {\nexport function f(): void {}\n}\n"),
                (
                    "src/b.ts",
                    "namespace ts {\nexport function g(): void { f(); }\n}\n",
                ),
            ],
            &[],
        );
        explicitify(&mut project).unwrap();
        strip_namespaces(&mut project).unwrap();

        let a = file_text(&project, "src/a.ts");
        assert!(!a.contains("namespace"), "namespace stripped: {a}");
        assert!(a.contains("export function f"));

        let b = file_text(&project, "src/b.ts");
        assert!(b.contains("import * as ts from \"./_namespaces/ts\";"), "got: {b}");
        assert!(b.contains("ts.f()"), "explicit reference survives: {b}");

        let barrel = file_text(&project, "src/_namespaces/ts.ts");
        assert!(barrel.contains("export * from \"../a\";"), "got: {barrel}");
        assert!(barrel.contains("export * from \"../b\";"), "got: {barrel}");
    }

    #[test]
    fn nested_namespace_gets_parent_barrel_with_reattachment() {
        let mut project = Project::from_sources(
            &[(
                "src/protocol.ts",
                "namespace ts.server.protocol {\nexport interface Request { seq: number; }\n}\n",
            )],
            &[],
        );
        strip_namespaces(&mut project).unwrap();

        let ts_barrel = file_text(&project, "src/_namespaces/ts.ts");
        assert!(ts_barrel.contains("import * as server from \"./ts.server\";"));
        assert!(ts_barrel.contains("export { server };"));

        let server_barrel = file_text(&project, "src/_namespaces/ts.server.ts");
        assert!(server_barrel.contains("import * as protocol from \"./ts.server.protocol\";"));
        assert!(server_barrel.contains("export { protocol };"));

        let protocol_barrel = file_text(&project, "src/_namespaces/ts.server.protocol.ts");
        assert!(protocol_barrel.contains("export * from \"../protocol\";"));
    }

    #[test]
    fn interface_augmentation_becomes_module_augmentation() {
        let mut project = Project::from_sources(
            &[
                (
                    "src/types.ts",
                    "namespace ts {\nexport interface Node { x: number; }\n}\n",
                ),
                (
                    "src/extra.ts",
                    "namespace ts {\nexport interface Node { y: number; }\n}\n",
                ),
            ],
            &[],
        );
        strip_namespaces(&mut project).unwrap();
        let extra = file_text(&project, "src/extra.ts");
        assert!(
            extra.contains("declare module \"./types\" {"),
            "augmentation rewritten: {extra}"
        );
        assert!(extra.contains("export interface Node { y: number; }"));
        let types = file_text(&project, "src/types.ts");
        assert!(!types.contains("declare module"), "primary untouched: {types}");
    }

    #[test]
    fn empty_namespace_is_removed_entirely() {
        let mut project = Project::from_sources(
            &[("src/empty.ts", "namespace ts {}\nconst keep = 1;\n")],
            &[],
        );
        strip_namespaces(&mut project).unwrap();
        let text = file_text(&project, "src/empty.ts");
        assert!(!text.contains("namespace"), "got: {text}");
        assert!(text.contains("const keep = 1;"));
    }

    #[test]
    fn internal_marker_propagates_to_exported_members() {
        let mut project = Project::from_sources(
            &[(
                "src/a.ts",
                "/* @internal */\nexport namespace ts {\nexport function f(): void {}\nfunction local(): void {}\n}\n",
            )],
            &[],
        );
        strip_namespaces(&mut project).unwrap();
        let text = file_text(&project, "src/a.ts");
        assert!(
            text.contains("/* @internal */\nexport function f"),
            "marker moved onto exported member: {text}"
        );
        assert!(!text.contains("/* @internal */\nfunction local"));
    }

    #[test]
    fn ambient_global_var_wrapped_in_declare_global() {
        let mut project = Project::from_sources(
            &[("src/globals.ts", "declare const performance: { now(): number };\n")],
            &[],
        );
        strip_namespaces(&mut project).unwrap();
        let text = file_text(&project, "src/globals.ts");
        assert!(text.contains("declare global {"), "got: {text}");
        assert!(
            text.contains("const performance"),
            "inner declare keyword stripped: {text}"
        );
        assert!(text.ends_with("export {};\n"), "stays a module: {text}");
    }

    #[test]
    fn config_units_are_rewritten() {
        let mut project = Project::from_sources(
            &[("src/compiler/core.ts", "namespace ts {\nexport const x = 1;\n}\n")],
            &[(
                "src/compiler/tsconfig.json",
                r#"{ "compilerOptions": { "outFile": "../../built/local/tsc.js" }, "files": ["core.ts"], "references": [{ "path": "../shims", "prepend": true }] }"#,
            )],
        );
        strip_namespaces(&mut project).unwrap();
        let config = &project.configs[0];
        let options = config.json.get("compilerOptions").unwrap();
        assert!(options.get("outFile").is_none());
        assert_eq!(
            options.get("outDir").and_then(serde_json::Value::as_str),
            Some("../../built/local")
        );
        assert!(config.json["references"][0].get("prepend").is_none());
        let registered: Vec<&str> = config.json["files"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(serde_json::Value::as_str)
            .collect();
        assert!(registered.contains(&"./_namespaces/ts.ts"), "got {registered:?}");
    }
}
