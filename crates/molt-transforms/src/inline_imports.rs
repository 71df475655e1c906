//! Inline-imports pass: undo the always-dotted style left behind by
//! explicitify and the hoist wherever the dotted prefix is now redundant.
//!
//! A dotted access is rewritten only when its left-hand side resolves through
//! a generated namespace barrel; library and package dotted access is left
//! untouched. Rewrites that would collide with an existing binding keep their
//! explicit form.

use indexmap::IndexMap;
use molt_binder::{meaning, resolver, symbol_flags, ProjectBinder, SymbolId};
use molt_common::FileId;
use molt_parser::{modifier_flags, NodeId, NodeKind, SourceFile};
use molt_project::{ts_style_relative_path, Project};
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::edit::{EditBuffer, Rewrite};
use crate::format_imports::format_file_imports;
use crate::imports::{span_with_trailing_newline, trim_ts_extension};
use crate::PipelineError;

/// Names that are already declared in the global scope but redeclared by the
/// project one way or another. These must stay shadowable, or the codebase
/// ends up with `ts.Symbol`, `ts.Node`, `ts.Set` all over.
static REDECLARED_GLOBALS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "Symbol",
        "Node",
        "Map",
        "MapConstructor",
        "ReadonlyMap",
        "Set",
        "SetConstructor",
        "ReadonlySet",
        "Iterator",
    ]
    .into_iter()
    .collect()
});

pub fn inline_imports(project: &mut Project) -> Result<(), PipelineError> {
    let binder = project.bind();
    let files = project.files();
    let mut rewrites: Vec<(FileId, EditBuffer)> = Vec::new();

    info!("removing namespace uses");
    for (index, file) in files.iter().enumerate() {
        if file.is_declaration_file || file.is_namespace_barrel() {
            continue;
        }
        let file_id = FileId(index as u32);
        let mut visitor = FileVisitor {
            binder: &binder,
            files,
            file_id,
            file,
            imports: SyntheticImports::default(),
            edits: EditBuffer::new(),
            removals: Vec::new(),
        };
        for &stmt in file.top_level_statements() {
            visitor.visit(stmt);
        }
        for stmt in std::mem::take(&mut visitor.removals) {
            visitor.edits.delete(span_with_trailing_newline(file, stmt));
        }
        let lines = visitor.imports.render();
        if !lines.is_empty() {
            visitor
                .edits
                .insert(import_insert_offset(file), format!("{}\n", lines.join("\n")));
        }
        if !visitor.edits.is_empty() {
            rewrites.push((file_id, visitor.edits));
        }
    }

    for (file_id, edits) in rewrites {
        let file = project.file(file_id);
        let new_text = edits.apply(&file.text, &file.file_name)?;
        debug!(file = %file.file_name, "inlined namespace accesses");
        project.set_file_text(file_id, new_text);
    }

    info!("cleaning up imports");
    for file_id in project.file_ids().collect::<Vec<_>>() {
        let file = project.file(file_id);
        if file.is_declaration_file || file.is_namespace_barrel() {
            continue;
        }
        format_file_imports(project, file_id)?;
    }
    Ok(())
}

/// Per-file accumulator of synthesized bindings. A local name is bound at
/// most once; a second request for the same name is accepted only when it is
/// identical, otherwise the reference keeps its dotted form.
#[derive(Default)]
struct SyntheticImports {
    /// specifier → local name → foreign name.
    named: IndexMap<String, IndexMap<String, String>>,
    /// local name → barrel specifier, for star imports.
    stars: IndexMap<String, String>,
}

impl SyntheticImports {
    fn add_named(&mut self, specifier: &str, foreign: &str, local: &str) -> bool {
        if self.stars.contains_key(local) {
            return false;
        }
        for (other, names) in &self.named {
            if other != specifier && names.contains_key(local) {
                return false;
            }
        }
        let names = self.named.entry(specifier.to_string()).or_default();
        match names.get(local) {
            Some(existing) => existing == foreign,
            None => {
                names.insert(local.to_string(), foreign.to_string());
                true
            }
        }
    }

    fn add_star(&mut self, local: &str, specifier: &str) -> bool {
        if self.named.values().any(|names| names.contains_key(local)) {
            return false;
        }
        match self.stars.get(local) {
            Some(existing) => existing == specifier,
            None => {
                self.stars.insert(local.to_string(), specifier.to_string());
                true
            }
        }
    }

    fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (local, specifier) in &self.stars {
            lines.push(format!("import * as {local} from \"{specifier}\";"));
        }
        for (specifier, names) in &self.named {
            let bindings: Vec<String> = names
                .iter()
                .map(|(local, foreign)| {
                    if local == foreign {
                        foreign.clone()
                    } else {
                        format!("{foreign} as {local}")
                    }
                })
                .collect();
            lines.push(format!("import {{ {} }} from \"{specifier}\";", bindings.join(", ")));
        }
        lines
    }
}

struct FileVisitor<'a> {
    binder: &'a ProjectBinder,
    files: &'a [SourceFile],
    file_id: FileId,
    file: &'a SourceFile,
    imports: SyntheticImports,
    edits: EditBuffer,
    /// Import-equals statements replaced by a named import; the traversal
    /// cannot delete the node it is visiting, so deletions queue here.
    removals: Vec<NodeId>,
}

impl FileVisitor<'_> {
    fn visit(&mut self, node: NodeId) {
        match self.file.arena.kind(node) {
            // Import specifiers and clause names are not rewritable references.
            NodeKind::ImportDecl { .. } => return,
            NodeKind::ImportEqualsDecl { .. } => {
                match self.rewrite_import_equals(node) {
                    Rewrite::Keep => {}
                    Rewrite::Replace(text) => {
                        self.edits.replace(self.file.arena.span(node), text);
                    }
                    Rewrite::RemoveAfterTraversal => self.removals.push(node),
                }
                return;
            }
            NodeKind::QualifiedName { .. } => {
                if self.try_inline(node) {
                    return;
                }
            }
            NodeKind::PropertyAccess { expr, name, .. } => {
                let shape_fits = matches!(
                    self.file.arena.kind(*expr),
                    NodeKind::Ident { .. } | NodeKind::PropertyAccess { .. }
                ) && self.file.arena.ident_text(*name).is_some();
                if shape_fits && self.try_inline(node) {
                    return;
                }
            }
            _ => {}
        }
        let mut children = Vec::new();
        self.file.arena.for_each_child(node, |c| children.push(c));
        for child in children {
            self.visit(child);
        }
    }

    /// Replace a dotted access with its bare member name when the left-hand
    /// side is a barrel access and the bare name is safe at this site.
    /// Returns false to let the caller descend into the children instead.
    fn try_inline(&mut self, node: NodeId) -> bool {
        let (lhs, member_node) = match self.file.arena.kind(node) {
            NodeKind::QualifiedName { left, right } => (*left, *right),
            NodeKind::PropertyAccess { expr, name, .. } => (*expr, *name),
            _ => return false,
        };
        let Some(member) = self.file.arena.ident_text(member_node) else {
            return false;
        };

        let Some(lhs_barrel) = self.barrel_of_node(lhs) else {
            return false;
        };
        let Some(target) =
            resolver::resolve_symbol_at(self.binder, self.files, self.file_id, node)
        else {
            return false;
        };
        let target = self.binder.symbols.skip_alias(target);

        let mut meaning_mask = meaning::NAMESPACE;
        meaning_mask |= self.binder.symbols.meaning_of(target) & (meaning::VALUE | meaning::TYPE);
        let exclude_globals = REDECLARED_GLOBALS.contains(member);
        let resolved = resolver::would_shadow(
            self.binder,
            self.files,
            member,
            meaning_mask,
            self.file_id,
            node,
            exclude_globals,
        );

        match resolved {
            Some(existing) => {
                if self.binder.symbols.skip_alias(existing) != target {
                    // The bare name means something else here; inlining would
                    // change behavior.
                    return false;
                }
                // Already reachable bare (an earlier import or a local
                // declaration); just drop the qualifier.
                self.edits.replace(self.file.arena.span(node), member.to_string());
                true
            }
            None => {
                let accepted = if let Some(target_barrel) = self.barrel_file_of(target) {
                    // The member is itself a namespace barrel: bind it with a
                    // star import so nested access keeps working.
                    let specifier = self.specifier_to(&target_barrel);
                    self.imports.add_star(member, &specifier)
                } else {
                    let specifier = self.specifier_to(&lhs_barrel);
                    self.imports.add_named(&specifier, member, member)
                };
                if accepted {
                    self.edits.replace(self.file.arena.span(node), member.to_string());
                }
                accepted
            }
        }
    }

    /// `import X = A.B.C;` declarations become named imports from the barrel
    /// containing `C`, plus an `export { X };` when the original was exported.
    /// Shadow checking is skipped: the statement declares `X` itself.
    fn rewrite_import_equals(&mut self, stmt: NodeId) -> Rewrite {
        let NodeKind::ImportEqualsDecl { name, module_ref, .. } = self.file.arena.kind(stmt)
        else {
            return Rewrite::Keep;
        };
        // `export { X }` is not legal inside a namespace body.
        if self
            .file
            .arena
            .parent(stmt)
            .is_some_and(|p| matches!(self.file.arena.kind(p), NodeKind::ModuleBlock { .. }))
        {
            return Rewrite::Keep;
        }
        let NodeKind::QualifiedName { left, right } = self.file.arena.kind(*module_ref) else {
            return Rewrite::Keep; // `import X = require(...)` stays
        };
        let (Some(local), Some(foreign)) = (
            self.file.arena.ident_text(*name),
            self.file.arena.ident_text(*right),
        ) else {
            return Rewrite::Keep;
        };
        let Some(lhs_barrel) = self.barrel_of_node(*left) else {
            return Rewrite::Keep;
        };
        if resolver::resolve_symbol_at(self.binder, self.files, self.file_id, *module_ref)
            .is_none()
        {
            return Rewrite::Keep;
        }
        let specifier = self.specifier_to(&lhs_barrel);
        if !self.imports.add_named(&specifier, foreign, local) {
            return Rewrite::Keep;
        }
        let exported = self
            .file
            .arena
            .modifiers_of(stmt)
            .is_some_and(|m| m.has(modifier_flags::EXPORT));
        if exported {
            Rewrite::Replace(format!("export {{ {local} }};"))
        } else {
            Rewrite::RemoveAfterTraversal
        }
    }

    /// The barrel file a dotted prefix resolves into, or `None` when the
    /// prefix is not a namespace-barrel access at all.
    fn barrel_of_node(&self, lhs: NodeId) -> Option<String> {
        let symbol = resolver::resolve_symbol_at(self.binder, self.files, self.file_id, lhs)?;
        let symbol = self.binder.symbols.skip_alias(symbol);
        self.barrel_file_of(symbol)
    }

    fn barrel_file_of(&self, symbol: SymbolId) -> Option<String> {
        let symbol = self.binder.symbols.get(symbol);
        if symbol.flags & symbol_flags::MODULE == 0 {
            return None;
        }
        let decl = symbol.declarations.first()?;
        let file = &self.files[decl.file.index()];
        file.is_namespace_barrel().then(|| file.file_name.clone())
    }

    fn specifier_to(&self, barrel: &str) -> String {
        trim_ts_extension(&ts_style_relative_path(&self.file.file_name, barrel)).to_string()
    }
}

/// New imports go immediately after the last pre-existing import statement,
/// keeping generated imports apart from ordering-sensitive hand-written ones.
fn import_insert_offset(file: &SourceFile) -> u32 {
    let mut last_end = None;
    for &stmt in file.top_level_statements() {
        if matches!(
            file.arena.kind(stmt),
            NodeKind::ImportDecl { .. } | NodeKind::ImportEqualsDecl { .. }
        ) {
            last_end = Some(span_with_trailing_newline(file, stmt).end);
        }
    }
    last_end.unwrap_or_else(|| {
        file.top_level_statements()
            .first()
            .map(|&s| file.arena.span(s).start)
            .unwrap_or(file.text.len() as u32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explicitify::explicitify;
    use crate::strip_namespaces::strip_namespaces;

    fn file_text<'a>(project: &'a Project, name: &str) -> &'a str {
        let id = project.file_by_path(name).expect("file exists");
        &project.file(id).text
    }

    /// Full explicitify → strip → inline round trip restores bare spellings.
    #[test]
    fn round_trip_restores_bare_reference() {
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
        inline_imports(&mut project).unwrap();

        let b = file_text(&project, "src/b.ts");
        assert!(b.contains("{ f(); }"), "bare spelling restored: {b}");
        assert!(b.contains("import { f } from \"./_namespaces/ts\";"), "got: {b}");
        assert!(!b.contains("import * as ts"), "namespace import removed: {b}");
    }

    #[test]
    fn shadowed_name_keeps_dotted_form() {
        let mut project = Project::from_sources(
            &[
                ("src/a.ts", "namespace ts {\nexport const flag = 1;\n}\n"),
                (
                    "src/b.ts",
                    "namespace ts {\nexport function g(): number { const flag = 2; return flag; }\nexport function h(): number { return 0; }\n}\n",
                ),
                (
                    "src/c.ts",
                    "namespace ts {\nexport function k(): number { const flag = 2; return flag + ts.flag; }\n}\n",
                ),
            ],
            &[],
        );
        explicitify(&mut project).unwrap();
        strip_namespaces(&mut project).unwrap();
        inline_imports(&mut project).unwrap();

        let c = file_text(&project, "src/c.ts");
        // The local `flag` shadows the namespace member, so the dotted access
        // must survive and keep its namespace import.
        assert!(c.contains("ts.flag"), "dotted form preserved: {c}");
        assert!(c.contains("import * as ts"), "namespace import kept: {c}");
    }

    #[test]
    fn library_dotted_access_is_untouched() {
        let mut project = Project::from_sources(
            &[(
                "src/a.ts",
                "export function now(): number { return Date.now(); }\n",
            )],
            &[],
        );
        inline_imports(&mut project).unwrap();
        let a = file_text(&project, "src/a.ts");
        assert!(a.contains("Date.now()"), "got: {a}");
        assert!(!a.contains("import"), "no import synthesized: {a}");
    }

    #[test]
    fn nested_namespace_member_imports_from_its_own_barrel() {
        let mut project = Project::from_sources(
            &[
                (
                    "src/protocol.ts",
                    "namespace ts.server.protocol {\nexport interface Request { seq: number; }\n}\n",
                ),
                (
                    "src/session.ts",
                    "namespace ts.server {\nexport function handle(req: protocol.Request): void {}\n}\n",
                ),
            ],
            &[],
        );
        explicitify(&mut project).unwrap();
        strip_namespaces(&mut project).unwrap();
        inline_imports(&mut project).unwrap();

        let session = file_text(&project, "src/session.ts");
        // `ts.server.protocol.Request` collapses to `Request` via a named
        // import from the protocol barrel.
        assert!(session.contains("req: Request"), "got: {session}");
        assert!(
            session.contains("import { Request } from \"./_namespaces/ts.server.protocol\";"),
            "got: {session}"
        );
    }

    #[test]
    fn reference_to_a_namespace_itself_becomes_a_star_import() {
        let mut project = Project::from_sources(
            &[
                (
                    "src/protocol.ts",
                    "namespace ts.server.protocol {\nexport const version = 1;\n}\n",
                ),
                (
                    "src/api.ts",
                    "namespace ts {\nexport const api = ts.server;\n}\n",
                ),
            ],
            &[],
        );
        strip_namespaces(&mut project).unwrap();
        inline_imports(&mut project).unwrap();

        let api = file_text(&project, "src/api.ts");
        assert!(
            api.contains("import * as server from \"./_namespaces/ts.server\";"),
            "got: {api}"
        );
        assert!(api.contains("export const api = server;"), "got: {api}");
    }

    #[test]
    fn import_equals_becomes_named_import() {
        let mut project = Project::from_sources(
            &[
                (
                    "src/protocol.ts",
                    "namespace ts.server.protocol {\nexport interface CompletionEntry { name: string; }\n}\n",
                ),
                (
                    "src/session.ts",
                    "namespace ts.server {\nexport import CompletionEntry = ts.server.protocol.CompletionEntry;\n}\n",
                ),
            ],
            &[],
        );
        strip_namespaces(&mut project).unwrap();
        inline_imports(&mut project).unwrap();

        let session = file_text(&project, "src/session.ts");
        assert!(
            session.contains(
                "import { CompletionEntry } from \"./_namespaces/ts.server.protocol\";"
            ),
            "got: {session}"
        );
        assert!(session.contains("export { CompletionEntry };"), "got: {session}");
        assert!(!session.contains("import CompletionEntry ="), "got: {session}");
    }

    #[test]
    fn colliding_local_names_leave_second_occurrence_explicit() {
        let mut imports = SyntheticImports::default();
        assert!(imports.add_named("./_namespaces/ts", "Node", "Node"));
        // Identical request: fine.
        assert!(imports.add_named("./_namespaces/ts", "Node", "Node"));
        // Same local name, different specifier: refused.
        assert!(!imports.add_named("./_namespaces/ts.server", "Node", "Node"));
        // Star import with a taken name: refused.
        assert!(!imports.add_star("Node", "./_namespaces/ts.server.node"));
    }

    #[test]
    fn redeclared_global_is_not_inlined_to_the_builtin() {
        let mut project = Project::from_sources(
            &[
                (
                    "src/types.ts",
                    "namespace ts {\nexport interface Symbol { id: number; }\n}\n",
                ),
                (
                    "src/use.ts",
                    "namespace ts {\nexport function sym(): ts.Symbol { return { id: 1 }; }\n}\n",
                ),
            ],
            &[],
        );
        strip_namespaces(&mut project).unwrap();
        inline_imports(&mut project).unwrap();

        let use_file = file_text(&project, "src/use.ts");
        // With the builtin excluded the project-local Symbol wins, so the
        // reference inlines to the bare name backed by a named import.
        assert!(
            use_file.contains("import { Symbol } from \"./_namespaces/ts\";"),
            "got: {use_file}"
        );
        assert!(use_file.contains("): Symbol {"), "got: {use_file}");
    }
}
