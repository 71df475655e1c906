//! The resolution queries the transformation passes are built on.
//!
//! Every query returns `Option`: `None` means "unresolved", and callers are
//! required to treat that as "leave the reference unchanged".

use molt_common::FileId;
use molt_parser::{NodeId, NodeKind, SourceFile};

use crate::bind::ProjectBinder;
use crate::symbol::{meaning, symbol_flags, SymbolId};

/// The scope in effect at `node`: the scope introduced by the node itself or
/// by its nearest scoped ancestor.
fn scope_node_at(binder: &ProjectBinder, files: &[SourceFile], file: FileId, node: NodeId) -> Option<NodeId> {
    let bind = &binder.file_binds[file.index()];
    let arena = &files[file.index()].arena;
    if bind.scope_of_node.contains_key(&node) {
        return Some(node);
    }
    arena.ancestors(node).find(|a| bind.scope_of_node.contains_key(a))
}

/// Simulate resolving a bare `name` at `location` with the given meaning
/// bitset. Walks the lexical scope chain (including merged namespace export
/// tables), then project globals, then — unless excluded — builtin globals.
pub fn would_shadow(
    binder: &ProjectBinder,
    files: &[SourceFile],
    name: &str,
    meaning_mask: u32,
    file: FileId,
    location: NodeId,
    exclude_globals: bool,
) -> Option<SymbolId> {
    let bind = &binder.file_binds[file.index()];
    let scope_node = scope_node_at(binder, files, file, location);
    let mut scope = scope_node.and_then(|n| bind.scope_of_node.get(&n)).copied();
    while let Some(s) = scope {
        let entry = &bind.scopes[s.0 as usize];
        if let Some(&id) = entry.table.get(name) {
            if binder.symbols.meaning_of(id) & meaning_mask != 0 {
                return Some(id);
            }
        }
        if let Some(ns) = entry.ns_exports {
            if let Some(&id) = binder.symbols.get(ns).exports.get(name) {
                if binder.symbols.meaning_of(id) & meaning_mask != 0 {
                    return Some(id);
                }
            }
        }
        scope = entry.parent;
    }
    if let Some(&id) = binder.globals.get(name) {
        if binder.symbols.meaning_of(id) & meaning_mask != 0 {
            return Some(id);
        }
    }
    if !exclude_globals {
        if let Some(&id) = binder.builtins.get(name) {
            return Some(id);
        }
    }
    None
}

/// Resolve the symbol an identifier / qualified-name / property-access node
/// refers to.
pub fn resolve_symbol_at(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file: FileId,
    node: NodeId,
) -> Option<SymbolId> {
    let arena = &files[file.index()].arena;
    match arena.kind(node) {
        NodeKind::Ident { text } => {
            would_shadow(binder, files, text, meaning::ALL, file, node, false)
        }
        NodeKind::QualifiedName { left, right } => {
            let member = arena.ident_text(*right)?;
            resolve_member(binder, files, file, *left, member)
        }
        NodeKind::PropertyAccess { expr, name, .. } => {
            let member = arena.ident_text(*name)?;
            resolve_member(binder, files, file, *expr, member)
        }
        _ => None,
    }
}

fn resolve_member(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file: FileId,
    lhs: NodeId,
    member: &str,
) -> Option<SymbolId> {
    let lhs_symbol = resolve_symbol_at(binder, files, file, lhs)?;
    let lhs_symbol = binder.symbols.skip_alias(lhs_symbol);
    if !binder.symbols.get(lhs_symbol).is_namespace_like() {
        return None;
    }
    binder.symbols.get(lhs_symbol).exports.get(member).copied()
}

/// Resolve `A.B.C` in entity-name position (import-equals references).
pub fn resolve_entity_name(
    binder: &ProjectBinder,
    files: &[SourceFile],
    file: FileId,
    node: NodeId,
) -> Option<SymbolId> {
    resolve_symbol_at(binder, files, file, node)
}

/// True only if *every* declaration of `symbol` lies within an ancestor node
/// of `location` in the same file. Any declaration elsewhere forces `false`
/// (the conservative direction: callers then qualify the reference).
pub fn is_declared_in_lexical_scope(
    binder: &ProjectBinder,
    files: &[SourceFile],
    symbol: SymbolId,
    file: FileId,
    location: NodeId,
) -> bool {
    let declarations = &binder.symbols.get(symbol).declarations;
    if declarations.is_empty() {
        return false;
    }
    let arena = &files[file.index()].arena;
    declarations.iter().all(|decl| {
        if decl.file != file {
            return false;
        }
        // VariableDeclaration -> declaration list -> statement -> container
        let container = if matches!(arena.kind(decl.node), NodeKind::VariableDeclaration { .. }) {
            arena
                .parent(decl.node)
                .and_then(|p| arena.parent(p))
                .and_then(|p| arena.parent(p))
        } else {
            arena.parent(decl.node)
        };
        let Some(container) = container else {
            return false;
        };
        arena.ancestors(location).any(|a| a == container)
    })
}

/// The chain of namespace names leading to `symbol`, shortest usable suffix
/// first. Returns the full dotted spelling for the reference, including the
/// symbol's own name — or `None` when the symbol has no namespace parent.
///
/// Tie-break rule: candidate qualifiers are the suffixes of the parent chain,
/// tried shortest-first; a candidate wins iff its head name resolves to that
/// exact chain symbol both at the file's top level and at the reference site
/// (namespace meaning, globals included). If no suffix qualifies, the full
/// chain is used. Anchoring at the top level keeps the spelling valid once
/// namespace bodies are hoisted to module scope, where only top-level
/// namespace names remain importable.
pub fn shortest_qualified_name(
    binder: &ProjectBinder,
    files: &[SourceFile],
    symbol: SymbolId,
    file: FileId,
    location: NodeId,
) -> Option<Vec<String>> {
    let mut chain_syms = vec![symbol];
    let mut current = symbol;
    while let Some(parent) = binder.symbols.get(current).parent {
        if binder.symbols.get(parent).flags & symbol_flags::NAMESPACE_MODULE == 0 {
            break;
        }
        chain_syms.push(parent);
        current = parent;
    }
    if chain_syms.len() < 2 {
        return None;
    }
    chain_syms.reverse();
    let names: Vec<String> =
        chain_syms.iter().map(|&s| binder.symbols.get(s).name.clone()).collect();

    // Try suffixes, shortest first: the last possible head is the direct
    // parent (index len-2), the longest is the root namespace (index 0).
    let top_level = files[file.index()].root;
    for head in (0..chain_syms.len() - 1).rev() {
        let head_symbol = binder.symbols.skip_alias(chain_syms[head]);
        let resolves_to_head = |at: NodeId| {
            would_shadow(binder, files, &names[head], meaning::NAMESPACE, file, at, false)
                .is_some_and(|r| binder.symbols.skip_alias(r) == head_symbol)
        };
        if resolves_to_head(top_level) && resolves_to_head(location) {
            return Some(names[head..].to_vec());
        }
    }
    Some(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use molt_parser::SourceFile;

    fn bind(sources: &[(&str, &str)]) -> (Vec<SourceFile>, ProjectBinder) {
        let files: Vec<SourceFile> = sources
            .iter()
            .map(|(name, text)| SourceFile::parse(*name, text.to_string()))
            .collect();
        let binder = ProjectBinder::bind(&files);
        (files, binder)
    }

    fn find_ident(file: &SourceFile, text: &str, nth: usize) -> NodeId {
        let mut found = Vec::new();
        file.arena.walk(file.root, &mut |id| {
            if file.arena.ident_text(id) == Some(text) {
                found.push(id);
            }
            true
        });
        found[nth]
    }

    #[test]
    fn namespaces_merge_across_files() {
        let (files, binder) = bind(&[
            ("src/a.ts", "namespace ts { export function f(): void {} }\n"),
            ("src/b.ts", "namespace ts { export function g(): void { f(); } }\n"),
        ]);
        let ts = binder.globals.get("ts").copied().expect("ts bound globally");
        let symbol = binder.symbols.get(ts);
        assert_eq!(symbol.declarations.len(), 2);
        assert!(symbol.exports.contains_key("f"));
        assert!(symbol.exports.contains_key("g"));

        // `f` referenced from b.ts resolves through the merged export table.
        let call_site = find_ident(&files[1], "f", 0);
        let resolved = would_shadow(
            &binder,
            &files,
            "f",
            meaning::VALUE,
            FileId(1),
            call_site,
            false,
        )
        .expect("f resolves inside merged namespace");
        assert_eq!(resolved, *symbol.exports.get("f").unwrap());
    }

    #[test]
    fn cross_file_member_is_not_lexically_declared() {
        let (files, binder) = bind(&[
            ("src/a.ts", "namespace ts { export function f(): void {} }\n"),
            ("src/b.ts", "namespace ts { export function g(): void { f(); } }\n"),
        ]);
        let ts = binder.globals.get("ts").copied().unwrap();
        let f = *binder.symbols.get(ts).exports.get("f").unwrap();
        let call_site = find_ident(&files[1], "f", 0);
        assert!(!is_declared_in_lexical_scope(&binder, &files, f, FileId(1), call_site));

        // Same-file references *are* lexically declared.
        let g = *binder.symbols.get(ts).exports.get("g").unwrap();
        assert!(is_declared_in_lexical_scope(&binder, &files, g, FileId(1), call_site));
    }

    #[test]
    fn qualified_names_resolve_through_nested_namespaces() {
        let (files, binder) = bind(&[
            (
                "src/a.ts",
                "namespace ts.server { export const kind = 1; }\n",
            ),
            (
                "src/b.ts",
                "namespace other { const x = ts.server.kind; }\n",
            ),
        ]);
        let mut access = None;
        files[1].arena.walk(files[1].root, &mut |id| {
            if matches!(files[1].arena.kind(id), NodeKind::PropertyAccess { .. })
                && files[1].node_text(id) == "ts.server.kind"
            {
                access = Some(id);
            }
            true
        });
        let resolved = resolve_symbol_at(&binder, &files, FileId(1), access.unwrap())
            .expect("dotted reference resolves");
        assert_eq!(binder.symbols.get(resolved).name, "kind");
    }

    #[test]
    fn exclude_globals_skips_builtins_only() {
        let (files, binder) = bind(&[(
            "src/a.ts",
            "namespace ts { export interface Symbol { id: number; } }\nconst use = 1;\n",
        )]);
        let site = find_ident(&files[0], "use", 0);
        // With globals included the builtin wins at top level.
        let with_globals =
            would_shadow(&binder, &files, "Symbol", meaning::ALL, FileId(0), site, false).unwrap();
        assert!(binder.symbols.get(with_globals).flags & symbol_flags::GLOBAL_BUILTIN != 0);
        // Excluded: nothing (the project Symbol lives inside namespace ts).
        let without =
            would_shadow(&binder, &files, "Symbol", meaning::ALL, FileId(0), site, true);
        assert!(without.is_none());
    }

    #[test]
    fn module_imports_create_aliases() {
        let (files, binder) = bind(&[
            ("src/core.ts", "export function hello(): void {}\n"),
            (
                "src/main.ts",
                "import { hello } from \"./core\";\nhello();\n",
            ),
        ]);
        let site = find_ident(&files[1], "hello", 1);
        let alias = would_shadow(&binder, &files, "hello", meaning::VALUE, FileId(1), site, false)
            .expect("import binding resolves");
        let target = binder.symbols.skip_alias(alias);
        assert_ne!(alias, target);
        assert_eq!(binder.symbols.get(target).name, "hello");
        assert!(binder.symbols.get(target).flags & symbol_flags::FUNCTION != 0);
    }

    #[test]
    fn star_reexports_flow_through_barrels() {
        let (files, binder) = bind(&[
            ("src/compiler/core.ts", "export function forEach(): void {}\n"),
            (
                "src/compiler/_namespaces/ts.ts",
                "export * from \"../core\";\n",
            ),
            (
                "src/server/session.ts",
                "import * as ts from \"../compiler/_namespaces/ts\";\nts.forEach();\n",
            ),
        ]);
        let mut access = None;
        files[2].arena.walk(files[2].root, &mut |id| {
            if matches!(files[2].arena.kind(id), NodeKind::PropertyAccess { .. }) {
                access = Some(id);
            }
            true
        });
        let resolved = resolve_symbol_at(&binder, &files, FileId(2), access.unwrap())
            .expect("ts.forEach resolves through the barrel");
        let target = binder.symbols.skip_alias(resolved);
        assert_eq!(binder.symbols.get(target).name, "forEach");
    }

    #[test]
    fn qualifier_is_anchored_at_file_top_level() {
        // Inside `namespace ts`, `server.kind` would resolve at the site, but
        // `server` means nothing at the file's top level, so the spelling
        // must be the full chain (it has to survive the hoist).
        let (files, binder) = bind(&[
            (
                "src/a.ts",
                "namespace ts.server { export const kind = 1; }\n",
            ),
            (
                "src/b.ts",
                "namespace ts { const x = 1; }\n",
            ),
        ]);
        let ts = binder.globals.get("ts").copied().unwrap();
        let server = *binder.symbols.get(ts).exports.get("server").unwrap();
        let kind = *binder.symbols.get(server).exports.get("kind").unwrap();
        let site = find_ident(&files[1], "x", 0);
        let qual = shortest_qualified_name(&binder, &files, kind, FileId(1), site).unwrap();
        assert_eq!(
            qual,
            vec!["ts".to_string(), "server".to_string(), "kind".to_string()]
        );
        // From top-level code the answer is the same full chain.
        let (files2, binder2) = bind(&[
            (
                "src/a.ts",
                "namespace ts.server { export const kind = 1; }\n",
            ),
            ("src/b.ts", "const y = 1;\n"),
        ]);
        let ts2 = binder2.globals.get("ts").copied().unwrap();
        let server2 = *binder2.symbols.get(ts2).exports.get("server").unwrap();
        let kind2 = *binder2.symbols.get(server2).exports.get("kind").unwrap();
        let site2 = find_ident(&files2[1], "y", 0);
        let qual2 = shortest_qualified_name(&binder2, &files2, kind2, FileId(1), site2).unwrap();
        assert_eq!(
            qual2,
            vec!["ts".to_string(), "server".to_string(), "kind".to_string()]
        );
    }

    #[test]
    fn qualifier_uses_suffix_through_an_alias_at_top_level() {
        // An `import server = ts.server` alias makes the short head usable at
        // both the top level and the site, so the suffix wins.
        let (files, binder) = bind(&[
            (
                "src/a.ts",
                "namespace ts.server { export const kind = 1; }\n",
            ),
            (
                "src/b.ts",
                "import server = ts.server;\nconst y = 1;\n",
            ),
        ]);
        let ts = binder.globals.get("ts").copied().unwrap();
        let server = *binder.symbols.get(ts).exports.get("server").unwrap();
        let kind = *binder.symbols.get(server).exports.get("kind").unwrap();
        let site = find_ident(&files[1], "y", 0);
        let qual = shortest_qualified_name(&binder, &files, kind, FileId(1), site).unwrap();
        assert_eq!(qual, vec!["server".to_string(), "kind".to_string()]);
    }
}
