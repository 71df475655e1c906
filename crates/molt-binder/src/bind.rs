//! Project-wide binding: scopes, declaration tables, module graph.

use molt_common::{Diagnostic, FileId};
use molt_parser::{modifier_flags, ModuleKind, NodeId, NodeKind, SourceFile, VarKind};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::symbol::{symbol_flags, DeclRef, Symbol, SymbolArena, SymbolId};

/// Ambient globals from the default library. Kept separate from
/// project-declared globals so `would_shadow` can exclude them on request
/// (the redeclared-globals rule).
static BUILTIN_GLOBALS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Array", "ArrayBuffer", "Boolean", "Buffer", "Date", "Error", "EvalError", "Function",
        "Generator", "Infinity", "IterableIterator", "Iterator", "IteratorResult", "JSON", "Map",
        "MapConstructor", "Math", "NaN", "Node", "Number", "Object", "Promise", "Proxy",
        "RangeError", "ReadonlyMap", "ReadonlySet", "Reflect", "RegExp", "Set", "SetConstructor",
        "String", "Symbol", "SymbolConstructor", "TypeError", "URIError", "WeakMap", "WeakSet",
        "console", "decodeURIComponent", "encodeURIComponent", "eval", "globalThis", "isFinite",
        "isNaN", "parseFloat", "parseInt", "process", "require", "setTimeout", "clearTimeout",
        "undefined",
    ]
});

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub table: FxHashMap<String, SymbolId>,
    /// When this scope is a namespace body, names also resolve through the
    /// namespace symbol's (cross-file merged) export table.
    pub ns_exports: Option<SymbolId>,
}

#[derive(Debug, Default)]
pub struct FileBind {
    pub scopes: Vec<Scope>,
    /// Scope introduced *by* a node (source file root, module block, block,
    /// function-like, class-like, catch clause, for statement).
    pub scope_of_node: FxHashMap<NodeId, ScopeId>,
    pub module_symbol: Option<SymbolId>,
    pub is_module: bool,
}

impl FileBind {
    fn push_scope(&mut self, parent: Option<ScopeId>, ns_exports: Option<SymbolId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope { parent, table: FxHashMap::default(), ns_exports });
        id
    }
}

/// Where a declaration's name lands.
#[derive(Copy, Clone)]
enum Container {
    /// Script top level: the project-wide global table.
    Global,
    /// Module file top level.
    Module(SymbolId),
    /// Namespace body.
    Namespace(SymbolId),
    /// Function body, block, or any other purely lexical position.
    Lexical,
}

enum PendingAlias {
    /// `import * as ns from "spec"` — target is the module symbol.
    Star { file: FileId, symbol: SymbolId, specifier: String },
    /// `import { foreign as local } from "spec"` or re-export with specifier.
    Named { file: FileId, symbol: SymbolId, specifier: String, foreign: String },
    /// `import x = require("spec")`.
    Require { file: FileId, symbol: SymbolId, specifier: String },
    /// `import X = A.B.C` — resolved against the scope at the declaration.
    EntityName { file: FileId, symbol: SymbolId, node: NodeId },
    /// `export { local as exported }` without a specifier.
    LocalExport { file: FileId, symbol: SymbolId, local: String },
}

pub struct ProjectBinder {
    pub symbols: SymbolArena,
    pub file_binds: Vec<FileBind>,
    pub globals: FxHashMap<String, SymbolId>,
    pub builtins: FxHashMap<String, SymbolId>,
    pub diagnostics: Vec<Diagnostic>,
    module_by_path: FxHashMap<String, FileId>,
    star_exports: Vec<(FileId, SymbolId, String)>,
    pending: Vec<PendingAlias>,
}

impl ProjectBinder {
    pub fn bind(files: &[SourceFile]) -> ProjectBinder {
        let mut binder = ProjectBinder {
            symbols: SymbolArena::new(),
            file_binds: Vec::with_capacity(files.len()),
            globals: FxHashMap::default(),
            builtins: FxHashMap::default(),
            diagnostics: Vec::new(),
            module_by_path: FxHashMap::default(),
            star_exports: Vec::new(),
            pending: Vec::new(),
        };
        for name in BUILTIN_GLOBALS.iter() {
            let id = binder
                .symbols
                .alloc(Symbol::new(*name, symbol_flags::GLOBAL_BUILTIN));
            binder.builtins.insert((*name).to_string(), id);
        }
        for (index, file) in files.iter().enumerate() {
            binder.module_by_path.insert(file.file_name.clone(), FileId(index as u32));
        }
        for (index, file) in files.iter().enumerate() {
            binder.bind_file(FileId(index as u32), file);
        }
        binder.resolve_pending(files);
        debug!(
            symbols = binder.symbols.len(),
            globals = binder.globals.len(),
            "bound project"
        );
        binder
    }

    // ===== File binding =====

    fn bind_file(&mut self, file_id: FileId, file: &SourceFile) {
        let mut bind = FileBind::default();
        let is_module = file.top_level_statements().iter().any(|&stmt| {
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
        });
        bind.is_module = is_module;

        let root_scope = bind.push_scope(None, None);
        bind.scope_of_node.insert(file.root, root_scope);

        let container = if is_module {
            let module_symbol = self.symbols.alloc({
                let mut symbol = Symbol::new(module_name_of(&file.file_name), symbol_flags::MODULE);
                symbol.declarations.push(DeclRef { file: file_id, node: file.root });
                symbol
            });
            bind.module_symbol = Some(module_symbol);
            Container::Module(module_symbol)
        } else {
            Container::Global
        };

        self.file_binds.push(bind);
        let statements = file.top_level_statements().to_vec();
        for stmt in statements {
            self.bind_statement(file_id, file, stmt, root_scope, container);
        }
    }

    fn bind_statement(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        stmt: NodeId,
        scope: ScopeId,
        container: Container,
    ) {
        use NodeKind::*;
        match file.arena.kind(stmt) {
            VariableStatement { modifiers, decl_list } => {
                let exported = modifiers.has(modifier_flags::EXPORT);
                let VariableDeclarationList { var_kind, declarations } =
                    file.arena.kind(*decl_list)
                else {
                    return;
                };
                let flags = match var_kind {
                    VarKind::Var => symbol_flags::FUNCTION_SCOPED_VARIABLE,
                    _ => symbol_flags::BLOCK_SCOPED_VARIABLE,
                };
                for &decl in declarations.clone().iter() {
                    let VariableDeclaration { name, ty, initializer, .. } = file.arena.kind(decl)
                    else {
                        continue;
                    };
                    let (ty, initializer) = (*ty, *initializer);
                    self.declare_binding_names(
                        file_id, file, *name, flags, decl, scope, container, exported,
                    );
                    if let Some(ty) = ty {
                        self.bind_expression(file_id, file, ty, scope);
                    }
                    if let Some(init) = initializer {
                        self.bind_expression(file_id, file, init, scope);
                    }
                }
            }
            FunctionDecl { modifiers, name, type_params, params, body, .. } => {
                let exported = modifiers.has(modifier_flags::EXPORT);
                if let Some(name) = name {
                    self.declare(
                        file_id,
                        file,
                        *name,
                        symbol_flags::FUNCTION,
                        stmt,
                        scope,
                        container,
                        exported,
                    );
                }
                let (type_params, params, body) = (type_params.clone(), params.clone(), *body);
                let fn_scope = self.new_scope(file_id, stmt, Some(scope), None);
                self.bind_type_params(file_id, file, &type_params, fn_scope);
                self.bind_params(file_id, file, &params, fn_scope);
                if let Some(body) = body {
                    self.bind_statement(file_id, file, body, fn_scope, Container::Lexical);
                }
            }
            ClassDecl { modifiers, name, type_params, heritage, members } => {
                let exported = modifiers.has(modifier_flags::EXPORT);
                if let Some(name) = name {
                    self.declare(
                        file_id,
                        file,
                        *name,
                        symbol_flags::CLASS,
                        stmt,
                        scope,
                        container,
                        exported,
                    );
                }
                let (type_params, heritage, members) =
                    (type_params.clone(), heritage.clone(), members.clone());
                let class_scope = self.new_scope(file_id, stmt, Some(scope), None);
                self.bind_type_params(file_id, file, &type_params, class_scope);
                for h in heritage {
                    self.bind_expression(file_id, file, h, class_scope);
                }
                for member in members {
                    self.bind_class_member(file_id, file, member, class_scope);
                }
            }
            InterfaceDecl { modifiers, name, type_params, .. } => {
                let exported = modifiers.has(modifier_flags::EXPORT);
                self.declare(
                    file_id,
                    file,
                    *name,
                    symbol_flags::INTERFACE,
                    stmt,
                    scope,
                    container,
                    exported,
                );
                let type_params = type_params.clone();
                let iface_scope = self.new_scope(file_id, stmt, Some(scope), None);
                self.bind_type_params(file_id, file, &type_params, iface_scope);
            }
            TypeAliasDecl { modifiers, name, type_params, ty } => {
                let exported = modifiers.has(modifier_flags::EXPORT);
                self.declare(
                    file_id,
                    file,
                    *name,
                    symbol_flags::TYPE_ALIAS,
                    stmt,
                    scope,
                    container,
                    exported,
                );
                let (type_params, ty) = (type_params.clone(), *ty);
                let alias_scope = self.new_scope(file_id, stmt, Some(scope), None);
                self.bind_type_params(file_id, file, &type_params, alias_scope);
                self.bind_expression(file_id, file, ty, alias_scope);
            }
            EnumDecl { modifiers, name, members, .. } => {
                let exported = modifiers.has(modifier_flags::EXPORT);
                let enum_symbol = self.declare(
                    file_id,
                    file,
                    *name,
                    symbol_flags::ENUM,
                    stmt,
                    scope,
                    container,
                    exported,
                );
                for &member in members.clone().iter() {
                    let EnumMember { name: member_name, initializer } = file.arena.kind(member)
                    else {
                        continue;
                    };
                    let initializer = *initializer;
                    if let Some(text) = file.arena.ident_text(*member_name).map(str::to_string) {
                        let member_sym = match self.symbols.get(enum_symbol).exports.get(&text) {
                            Some(&existing) => {
                                self.symbols
                                    .get_mut(existing)
                                    .declarations
                                    .push(DeclRef { file: file_id, node: member });
                                existing
                            }
                            None => {
                                let mut symbol =
                                    Symbol::new(text.clone(), symbol_flags::ENUM_MEMBER);
                                symbol.declarations.push(DeclRef { file: file_id, node: member });
                                symbol.parent = Some(enum_symbol);
                                let id = self.symbols.alloc(symbol);
                                self.symbols.get_mut(enum_symbol).exports.insert(text, id);
                                id
                            }
                        };
                        let _ = member_sym;
                    }
                    if let Some(init) = initializer {
                        self.bind_expression(file_id, file, init, scope);
                    }
                }
            }
            ModuleDecl { .. } => {
                self.bind_module_decl(file_id, file, stmt, scope, container);
            }
            ImportDecl { .. } | ImportEqualsDecl { .. } | ExportDecl { .. }
            | ExportAssignment { .. } => {
                self.bind_module_plumbing(file_id, file, stmt, scope, container);
            }
            Block { statements } => {
                let statements = statements.clone();
                let block_scope = self.new_scope(file_id, stmt, Some(scope), None);
                for s in statements {
                    self.bind_statement(file_id, file, s, block_scope, Container::Lexical);
                }
            }
            If { cond, then_stmt, else_stmt } => {
                let (cond, then_stmt, else_stmt) = (*cond, *then_stmt, *else_stmt);
                self.bind_expression(file_id, file, cond, scope);
                self.bind_statement(file_id, file, then_stmt, scope, Container::Lexical);
                if let Some(else_stmt) = else_stmt {
                    self.bind_statement(file_id, file, else_stmt, scope, Container::Lexical);
                }
            }
            While { cond, body } => {
                let (cond, body) = (*cond, *body);
                self.bind_expression(file_id, file, cond, scope);
                self.bind_statement(file_id, file, body, scope, Container::Lexical);
            }
            DoWhile { body, cond } => {
                let (body, cond) = (*body, *cond);
                self.bind_statement(file_id, file, body, scope, Container::Lexical);
                self.bind_expression(file_id, file, cond, scope);
            }
            For { initializer, cond, incrementor, body } => {
                let (initializer, cond, incrementor, body) =
                    (*initializer, *cond, *incrementor, *body);
                let for_scope = self.new_scope(file_id, stmt, Some(scope), None);
                if let Some(init) = initializer {
                    self.bind_for_initializer(file_id, file, init, for_scope);
                }
                if let Some(cond) = cond {
                    self.bind_expression(file_id, file, cond, for_scope);
                }
                if let Some(inc) = incrementor {
                    self.bind_expression(file_id, file, inc, for_scope);
                }
                self.bind_statement(file_id, file, body, for_scope, Container::Lexical);
            }
            ForIn { initializer, expr, body } | ForOf { initializer, expr, body, .. } => {
                let (initializer, expr, body) = (*initializer, *expr, *body);
                let for_scope = self.new_scope(file_id, stmt, Some(scope), None);
                self.bind_for_initializer(file_id, file, initializer, for_scope);
                self.bind_expression(file_id, file, expr, for_scope);
                self.bind_statement(file_id, file, body, for_scope, Container::Lexical);
            }
            Return { expr } => {
                if let Some(expr) = *expr {
                    self.bind_expression(file_id, file, expr, scope);
                }
            }
            Throw { expr } | ExpressionStatement { expr } => {
                let expr = *expr;
                self.bind_expression(file_id, file, expr, scope);
            }
            Try { block, catch, finally } => {
                let (block, catch, finally) = (*block, *catch, *finally);
                self.bind_statement(file_id, file, block, scope, Container::Lexical);
                if let Some(catch) = catch {
                    let CatchClause { param, block: catch_block } = file.arena.kind(catch) else {
                        return;
                    };
                    let (param, catch_block) = (*param, *catch_block);
                    let catch_scope = self.new_scope(file_id, catch, Some(scope), None);
                    if let Some(param) = param {
                        if let VariableDeclaration { name, .. } = file.arena.kind(param) {
                            self.declare_binding_names(
                                file_id,
                                file,
                                *name,
                                symbol_flags::BLOCK_SCOPED_VARIABLE,
                                param,
                                catch_scope,
                                Container::Lexical,
                                false,
                            );
                        }
                    }
                    self.bind_statement(file_id, file, catch_block, catch_scope, Container::Lexical);
                }
                if let Some(finally) = finally {
                    self.bind_statement(file_id, file, finally, scope, Container::Lexical);
                }
            }
            Switch { expr, cases } => {
                let (expr, cases) = (*expr, cases.clone());
                self.bind_expression(file_id, file, expr, scope);
                let switch_scope = self.new_scope(file_id, stmt, Some(scope), None);
                for case in cases {
                    let CaseClause { expr: case_expr, statements } = file.arena.kind(case) else {
                        continue;
                    };
                    let (case_expr, statements) = (*case_expr, statements.clone());
                    if let Some(case_expr) = case_expr {
                        self.bind_expression(file_id, file, case_expr, switch_scope);
                    }
                    for s in statements {
                        self.bind_statement(file_id, file, s, switch_scope, Container::Lexical);
                    }
                }
            }
            Labeled { stmt: inner, .. } => {
                let inner = *inner;
                self.bind_statement(file_id, file, inner, scope, Container::Lexical);
            }
            _ => {}
        }
    }

    fn bind_for_initializer(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        init: NodeId,
        scope: ScopeId,
    ) {
        if let NodeKind::VariableDeclarationList { var_kind, declarations } = file.arena.kind(init)
        {
            let flags = match var_kind {
                VarKind::Var => symbol_flags::FUNCTION_SCOPED_VARIABLE,
                _ => symbol_flags::BLOCK_SCOPED_VARIABLE,
            };
            for &decl in declarations.clone().iter() {
                if let NodeKind::VariableDeclaration { name, initializer, .. } =
                    file.arena.kind(decl)
                {
                    let initializer = *initializer;
                    self.declare_binding_names(
                        file_id,
                        file,
                        *name,
                        flags,
                        decl,
                        scope,
                        Container::Lexical,
                        false,
                    );
                    if let Some(init_expr) = initializer {
                        self.bind_expression(file_id, file, init_expr, scope);
                    }
                }
            }
        } else {
            self.bind_expression(file_id, file, init, scope);
        }
    }

    /// Walk an expression or type, creating scopes for function-like nodes
    /// and declaring their locals; everything else just descends.
    fn bind_expression(&mut self, file_id: FileId, file: &SourceFile, node: NodeId, scope: ScopeId) {
        use NodeKind::*;
        match file.arena.kind(node) {
            FunctionExpr { name, type_params, params, body, .. } => {
                let (name, type_params, params, body) =
                    (*name, type_params.clone(), params.clone(), *body);
                let fn_scope = self.new_scope(file_id, node, Some(scope), None);
                if let Some(name) = name {
                    // A function expression's name is visible inside itself.
                    self.declare(
                        file_id,
                        file,
                        name,
                        symbol_flags::FUNCTION,
                        node,
                        fn_scope,
                        Container::Lexical,
                        false,
                    );
                }
                self.bind_type_params(file_id, file, &type_params, fn_scope);
                self.bind_params(file_id, file, &params, fn_scope);
                self.bind_statement(file_id, file, body, fn_scope, Container::Lexical);
            }
            ArrowFunction { type_params, params, body, .. } => {
                let (type_params, params, body) = (type_params.clone(), params.clone(), *body);
                let fn_scope = self.new_scope(file_id, node, Some(scope), None);
                self.bind_type_params(file_id, file, &type_params, fn_scope);
                self.bind_params(file_id, file, &params, fn_scope);
                match file.arena.kind(body) {
                    Block { .. } => {
                        self.bind_statement(file_id, file, body, fn_scope, Container::Lexical)
                    }
                    _ => self.bind_expression(file_id, file, body, fn_scope),
                }
            }
            ClassExpr { name, type_params, heritage, members, .. } => {
                let (name, type_params, heritage, members) =
                    (*name, type_params.clone(), heritage.clone(), members.clone());
                let class_scope = self.new_scope(file_id, node, Some(scope), None);
                if let Some(name) = name {
                    self.declare(
                        file_id,
                        file,
                        name,
                        symbol_flags::CLASS,
                        node,
                        class_scope,
                        Container::Lexical,
                        false,
                    );
                }
                self.bind_type_params(file_id, file, &type_params, class_scope);
                for h in heritage {
                    self.bind_expression(file_id, file, h, class_scope);
                }
                for member in members {
                    self.bind_class_member(file_id, file, member, class_scope);
                }
            }
            Block { .. } => {
                self.bind_statement(file_id, file, node, scope, Container::Lexical);
            }
            _ => {
                let mut children = Vec::new();
                file.arena.for_each_child(node, |c| children.push(c));
                for child in children {
                    self.bind_expression(file_id, file, child, scope);
                }
            }
        }
    }

    fn bind_class_member(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        member: NodeId,
        class_scope: ScopeId,
    ) {
        use NodeKind::*;
        match file.arena.kind(member) {
            MethodDecl { type_params, params, body, .. } => {
                let (type_params, params, body) = (type_params.clone(), params.clone(), *body);
                let method_scope = self.new_scope(file_id, member, Some(class_scope), None);
                self.bind_type_params(file_id, file, &type_params, method_scope);
                self.bind_params(file_id, file, &params, method_scope);
                if let Some(body) = body {
                    self.bind_statement(file_id, file, body, method_scope, Container::Lexical);
                }
            }
            ConstructorDecl { params, body, .. } => {
                let (params, body) = (params.clone(), *body);
                let ctor_scope = self.new_scope(file_id, member, Some(class_scope), None);
                self.bind_params(file_id, file, &params, ctor_scope);
                if let Some(body) = body {
                    self.bind_statement(file_id, file, body, ctor_scope, Container::Lexical);
                }
            }
            GetAccessor { params, body, .. } | SetAccessor { params, body, .. } => {
                let (params, body) = (params.clone(), *body);
                let accessor_scope = self.new_scope(file_id, member, Some(class_scope), None);
                self.bind_params(file_id, file, &params, accessor_scope);
                if let Some(body) = body {
                    self.bind_statement(file_id, file, body, accessor_scope, Container::Lexical);
                }
            }
            PropertyDecl { ty, initializer, .. } => {
                let (ty, initializer) = (*ty, *initializer);
                if let Some(ty) = ty {
                    self.bind_expression(file_id, file, ty, class_scope);
                }
                if let Some(init) = initializer {
                    self.bind_expression(file_id, file, init, class_scope);
                }
            }
            _ => {}
        }
    }

    fn bind_type_params(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        type_params: &[NodeId],
        scope: ScopeId,
    ) {
        for &tp in type_params {
            if let NodeKind::TypeParam { name, .. } = file.arena.kind(tp) {
                self.declare(
                    file_id,
                    file,
                    *name,
                    symbol_flags::TYPE_PARAMETER,
                    tp,
                    scope,
                    Container::Lexical,
                    false,
                );
            }
        }
    }

    fn bind_params(&mut self, file_id: FileId, file: &SourceFile, params: &[NodeId], scope: ScopeId) {
        for &param in params {
            if let NodeKind::Param { name, ty, initializer, .. } = file.arena.kind(param) {
                let (ty, initializer) = (*ty, *initializer);
                self.declare_binding_names(
                    file_id,
                    file,
                    *name,
                    symbol_flags::FUNCTION_SCOPED_VARIABLE,
                    param,
                    scope,
                    Container::Lexical,
                    false,
                );
                if let Some(ty) = ty {
                    self.bind_expression(file_id, file, ty, scope);
                }
                if let Some(init) = initializer {
                    self.bind_expression(file_id, file, init, scope);
                }
            }
        }
    }

    /// Declare every identifier inside a binding name (identifier or
    /// destructuring pattern).
    fn declare_binding_names(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        name: NodeId,
        flags: u32,
        decl: NodeId,
        scope: ScopeId,
        container: Container,
        exported: bool,
    ) {
        use NodeKind::*;
        match file.arena.kind(name) {
            Ident { .. } => {
                self.declare(file_id, file, name, flags, decl, scope, container, exported);
            }
            ObjectBindingPattern { elements } | ArrayBindingPattern { elements } => {
                for &elem in elements.clone().iter() {
                    if let BindingElement { name: elem_name, initializer, .. } =
                        file.arena.kind(elem)
                    {
                        let initializer = *initializer;
                        self.declare_binding_names(
                            file_id, file, *elem_name, flags, elem, scope, container, exported,
                        );
                        if let Some(init) = initializer {
                            self.bind_expression(file_id, file, init, scope);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // ===== Namespaces =====

    fn bind_module_decl(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        stmt: NodeId,
        scope: ScopeId,
        container: Container,
    ) {
        let NodeKind::ModuleDecl { modifiers, module_kind, name, body } = file.arena.kind(stmt)
        else {
            return;
        };
        let (module_kind, name, body) = (*module_kind, *name, *body);
        let exported = modifiers.has(modifier_flags::EXPORT);

        match module_kind {
            ModuleKind::Global => {
                // `declare global { ... }` contributes to the global table.
                if let Some(body) = body {
                    if let NodeKind::ModuleBlock { statements } = file.arena.kind(body) {
                        let statements = statements.clone();
                        let block_scope = self.new_scope(file_id, body, Some(scope), None);
                        for s in statements {
                            self.bind_statement(file_id, file, s, block_scope, Container::Global);
                        }
                    }
                }
            }
            ModuleKind::Module if file.arena.string_value(name).is_some() => {
                // Ambient external module (`declare module "x"`): a module
                // augmentation; bind its body lexically so references inside
                // still resolve, but declare nothing outside it.
                if let Some(body) = body {
                    if let NodeKind::ModuleBlock { statements } = file.arena.kind(body) {
                        let statements = statements.clone();
                        let block_scope = self.new_scope(file_id, body, Some(scope), None);
                        for s in statements {
                            self.bind_statement(file_id, file, s, block_scope, Container::Lexical);
                        }
                    }
                }
            }
            _ => {
                let symbol = self.declare(
                    file_id,
                    file,
                    name,
                    symbol_flags::NAMESPACE_MODULE,
                    stmt,
                    scope,
                    container,
                    exported,
                );
                match body.map(|b| (b, file.arena.kind(b))) {
                    Some((block, NodeKind::ModuleBlock { statements })) => {
                        let statements = statements.clone();
                        let block_scope = self.new_scope(file_id, block, Some(scope), Some(symbol));
                        for s in statements {
                            self.bind_statement(
                                file_id,
                                file,
                                s,
                                block_scope,
                                Container::Namespace(symbol),
                            );
                        }
                    }
                    Some((inner, NodeKind::ModuleDecl { .. })) => {
                        // `namespace A.B { ... }`: B is implicitly exported
                        // from A but not lexically visible outside it.
                        self.bind_module_decl(
                            file_id,
                            file,
                            inner,
                            scope,
                            Container::Namespace(symbol),
                        );
                    }
                    _ => {}
                }
            }
        }
    }

    // ===== Imports / exports =====

    fn bind_module_plumbing(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        stmt: NodeId,
        scope: ScopeId,
        container: Container,
    ) {
        use NodeKind::*;
        let module_symbol = match container {
            Container::Module(m) => Some(m),
            _ => None,
        };
        match file.arena.kind(stmt) {
            ImportDecl { import_clause, specifier } => {
                let Some(clause) = *import_clause else {
                    return; // side-effect import
                };
                let Some(spec) = file.arena.string_value(*specifier).map(str::to_string) else {
                    return;
                };
                let ImportClause { name, named_bindings, .. } = file.arena.kind(clause) else {
                    return;
                };
                let (default_name, named_bindings) = (*name, *named_bindings);
                if let Some(default_name) = default_name {
                    let symbol = self.declare_alias(file_id, file, default_name, clause, scope);
                    self.pending.push(PendingAlias::Named {
                        file: file_id,
                        symbol,
                        specifier: spec.clone(),
                        foreign: "default".to_string(),
                    });
                }
                match named_bindings.map(|b| (b, file.arena.kind(b))) {
                    Some((binding, NamespaceImport { name })) => {
                        let symbol = self.declare_alias(file_id, file, *name, binding, scope);
                        self.pending.push(PendingAlias::Star {
                            file: file_id,
                            symbol,
                            specifier: spec,
                        });
                    }
                    Some((_, NamedImports { elements })) => {
                        for &element in elements.clone().iter() {
                            let ImportSpecifier { property_name, name, .. } =
                                file.arena.kind(element)
                            else {
                                continue;
                            };
                            let foreign_node = property_name.unwrap_or(*name);
                            let foreign = file
                                .arena
                                .ident_text(foreign_node)
                                .unwrap_or_default()
                                .to_string();
                            let symbol = self.declare_alias(file_id, file, *name, element, scope);
                            self.pending.push(PendingAlias::Named {
                                file: file_id,
                                symbol,
                                specifier: spec.clone(),
                                foreign,
                            });
                        }
                    }
                    _ => {}
                }
            }
            ImportEqualsDecl { modifiers, name, module_ref } => {
                let (name, module_ref) = (*name, *module_ref);
                let exported = modifiers.has(modifier_flags::EXPORT);
                let symbol = self.declare_alias(file_id, file, name, stmt, scope);
                if exported {
                    if let Some(module) = module_symbol {
                        let text = self.symbols.get(symbol).name.clone();
                        self.symbols.get_mut(symbol).parent = Some(module);
                        self.symbols.get_mut(module).exports.insert(text, symbol);
                    }
                }
                match file.arena.kind(module_ref) {
                    ExternalModuleRef { specifier } => {
                        if let Some(spec) = file.arena.string_value(*specifier) {
                            self.pending.push(PendingAlias::Require {
                                file: file_id,
                                symbol,
                                specifier: spec.to_string(),
                            });
                        }
                    }
                    _ => {
                        self.pending.push(PendingAlias::EntityName {
                            file: file_id,
                            symbol,
                            node: module_ref,
                        });
                    }
                }
            }
            ExportDecl { export_clause, specifier, .. } => {
                let Some(module) = module_symbol else {
                    return;
                };
                let spec = specifier
                    .and_then(|s| file.arena.string_value(s))
                    .map(str::to_string);
                match (export_clause.map(|c| (c, file.arena.kind(c))), spec) {
                    (None, Some(spec)) => {
                        // export * from "spec"
                        self.star_exports.push((file_id, module, spec));
                    }
                    (Some((clause, NamespaceExport { name })), Some(spec)) => {
                        // export * as ns from "spec"
                        let text =
                            file.arena.ident_text(*name).unwrap_or_default().to_string();
                        let symbol =
                            self.alloc_export_alias(file_id, clause, module, text);
                        self.pending.push(PendingAlias::Star {
                            file: file_id,
                            symbol,
                            specifier: spec,
                        });
                    }
                    (Some((_, NamedExports { elements })), spec) => {
                        for &element in elements.clone().iter() {
                            let ExportSpecifier { property_name, name, .. } =
                                file.arena.kind(element)
                            else {
                                continue;
                            };
                            let local_node = property_name.unwrap_or(*name);
                            let local =
                                file.arena.ident_text(local_node).unwrap_or_default().to_string();
                            let exported_name =
                                file.arena.ident_text(*name).unwrap_or_default().to_string();
                            let symbol = self.alloc_export_alias(
                                file_id,
                                element,
                                module,
                                exported_name,
                            );
                            match &spec {
                                Some(spec) => self.pending.push(PendingAlias::Named {
                                    file: file_id,
                                    symbol,
                                    specifier: spec.clone(),
                                    foreign: local,
                                }),
                                None => self.pending.push(PendingAlias::LocalExport {
                                    file: file_id,
                                    symbol,
                                    local,
                                }),
                            }
                        }
                    }
                    _ => {}
                }
            }
            ExportAssignment { expr, .. } => {
                let expr = *expr;
                self.bind_expression(file_id, file, expr, scope);
            }
            _ => {}
        }
    }

    fn declare_alias(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        name: NodeId,
        decl: NodeId,
        scope: ScopeId,
    ) -> SymbolId {
        let text = file.arena.ident_text(name).unwrap_or_default().to_string();
        let mut symbol = Symbol::new(text.clone(), symbol_flags::ALIAS);
        symbol.declarations.push(DeclRef { file: file_id, node: decl });
        let id = self.symbols.alloc(symbol);
        let table = &mut self.file_binds[file_id.index()].scopes[scope.0 as usize].table;
        if let Some(&existing) = table.get(&text) {
            if existing != id {
                self.diagnostics.push(Diagnostic::error(
                    file.file_name.clone(),
                    file.arena.span(name),
                    format!("duplicate binding `{text}` in module scope"),
                ));
            }
        }
        table.insert(text, id);
        id
    }

    fn alloc_export_alias(
        &mut self,
        file_id: FileId,
        decl: NodeId,
        module: SymbolId,
        exported_name: String,
    ) -> SymbolId {
        let mut symbol = Symbol::new(exported_name.clone(), symbol_flags::ALIAS);
        symbol.declarations.push(DeclRef { file: file_id, node: decl });
        symbol.parent = Some(module);
        let id = self.symbols.alloc(symbol);
        self.symbols.get_mut(module).exports.insert(exported_name, id);
        id
    }

    // ===== Core declaration plumbing =====

    fn new_scope(
        &mut self,
        file_id: FileId,
        node: NodeId,
        parent: Option<ScopeId>,
        ns_exports: Option<SymbolId>,
    ) -> ScopeId {
        let bind = &mut self.file_binds[file_id.index()];
        let scope = bind.push_scope(parent, ns_exports);
        bind.scope_of_node.insert(node, scope);
        scope
    }

    /// Declare `name` with `flags`, merging with an existing same-name symbol
    /// in the target table (namespace/interface/enum merging across files and
    /// declarations is modeled as unconditional merge-by-name).
    fn declare(
        &mut self,
        file_id: FileId,
        file: &SourceFile,
        name: NodeId,
        flags: u32,
        decl: NodeId,
        scope: ScopeId,
        container: Container,
        exported: bool,
    ) -> SymbolId {
        let text = file.arena.ident_text(name).unwrap_or_default().to_string();
        let decl_ref = DeclRef { file: file_id, node: decl };
        if text.is_empty() {
            let mut symbol = Symbol::new(text, flags);
            symbol.declarations.push(decl_ref);
            return self.symbols.alloc(symbol);
        }

        let existing = match container {
            Container::Global => self.globals.get(&text).copied(),
            Container::Namespace(ns) if exported => {
                self.symbols.get(ns).exports.get(&text).copied()
            }
            Container::Module(_) | Container::Namespace(_) | Container::Lexical => self.file_binds
                [file_id.index()]
            .scopes[scope.0 as usize]
                .table
                .get(&text)
                .copied(),
        };

        let symbol = match existing {
            Some(id) => {
                let symbol = self.symbols.get_mut(id);
                symbol.flags |= flags;
                symbol.declarations.push(decl_ref);
                id
            }
            None => {
                let mut symbol = Symbol::new(text.clone(), flags);
                symbol.declarations.push(decl_ref);
                self.symbols.alloc(symbol)
            }
        };

        // Insert into the lexical table (and global table for scripts).
        match container {
            Container::Global => {
                self.globals.insert(text.clone(), symbol);
            }
            _ => {
                self.file_binds[file_id.index()].scopes[scope.0 as usize]
                    .table
                    .insert(text.clone(), symbol);
            }
        }

        // Exported members also land in the container's export table, which
        // sets the parent link explicitify keys on.
        match container {
            Container::Namespace(ns) if exported => {
                self.symbols.get_mut(symbol).parent = Some(ns);
                self.symbols.get_mut(ns).exports.insert(text, symbol);
            }
            Container::Module(module) if exported => {
                self.symbols.get_mut(symbol).parent = Some(module);
                self.symbols.get_mut(module).exports.insert(text, symbol);
            }
            _ => {}
        }

        symbol
    }

    // ===== Alias resolution (phase 2) =====

    /// Resolve a module specifier relative to the importing file.
    pub fn resolve_module_specifier(&self, from: &str, specifier: &str) -> Option<FileId> {
        if !specifier.starts_with('.') {
            return None;
        }
        let dir = match from.rfind('/') {
            Some(idx) => &from[..idx],
            None => "",
        };
        let joined = normalize_path(&format!("{dir}/{specifier}"));
        for candidate in [
            joined.clone(),
            format!("{joined}.ts"),
            format!("{joined}.d.ts"),
            format!("{joined}/index.ts"),
        ] {
            if let Some(&file) = self.module_by_path.get(&candidate) {
                return Some(file);
            }
        }
        None
    }

    fn resolve_pending(&mut self, files: &[SourceFile]) {
        let pending = std::mem::take(&mut self.pending);
        let mut entity_names = Vec::new();

        for alias in &pending {
            match alias {
                PendingAlias::Star { file, symbol, specifier }
                | PendingAlias::Require { file, symbol, specifier } => {
                    let target = self
                        .resolve_module_specifier(&files[file.index()].file_name, specifier)
                        .and_then(|f| self.file_binds[f.index()].module_symbol);
                    match target {
                        Some(target) => self.symbols.get_mut(*symbol).alias_target = Some(target),
                        None => self.report_unresolved_module(files, *file, *symbol, specifier),
                    }
                }
                _ => {}
            }
        }

        // `export *` closure: propagate export table entries until fixpoint.
        let star_edges: Vec<(SymbolId, FileId)> = self
            .star_exports
            .clone()
            .iter()
            .filter_map(|(file, module, spec)| {
                self.resolve_module_specifier(&files[file.index()].file_name, spec)
                    .map(|target| (*module, target))
            })
            .collect();
        loop {
            let mut changed = false;
            for &(module, target_file) in &star_edges {
                let Some(target_module) = self.file_binds[target_file.index()].module_symbol else {
                    continue;
                };
                let additions: Vec<(String, SymbolId)> = self
                    .symbols
                    .get(target_module)
                    .exports
                    .iter()
                    .filter(|(name, _)| !self.symbols.get(module).exports.contains_key(*name))
                    .map(|(name, &id)| (name.clone(), id))
                    .collect();
                for (name, id) in additions {
                    self.symbols.get_mut(module).exports.insert(name, id);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for alias in &pending {
            match alias {
                PendingAlias::Named { file, symbol, specifier, foreign } => {
                    let target = self
                        .resolve_module_specifier(&files[file.index()].file_name, specifier)
                        .and_then(|f| self.file_binds[f.index()].module_symbol)
                        .and_then(|m| self.symbols.get(m).exports.get(foreign).copied());
                    match target {
                        Some(target) => self.symbols.get_mut(*symbol).alias_target = Some(target),
                        None => self.report_unresolved_module(files, *file, *symbol, specifier),
                    }
                }
                PendingAlias::LocalExport { file, symbol, local } => {
                    let root = files[file.index()].root;
                    let target = self.lookup_in_scope_chain(*file, root, local);
                    if let Some(target) = target {
                        self.symbols.get_mut(*symbol).alias_target = Some(target);
                    }
                }
                PendingAlias::EntityName { file, symbol, node } => {
                    entity_names.push((*file, *symbol, *node));
                }
                _ => {}
            }
        }

        // `import X = A.B.C` forms need full entity-name resolution, which in
        // turn may traverse aliases resolved above.
        for (file, symbol, node) in entity_names {
            let target = crate::resolver::resolve_entity_name(self, files, file, node);
            if let Some(target) = target {
                self.symbols.get_mut(symbol).alias_target = Some(target);
            }
        }
    }

    fn report_unresolved_module(
        &mut self,
        files: &[SourceFile],
        file: FileId,
        symbol: SymbolId,
        specifier: &str,
    ) {
        if !specifier.starts_with('.') {
            return; // package imports are outside the project model
        }
        let decl = self.symbols.get(symbol).declarations.first().copied();
        let span = decl
            .map(|d| files[d.file.index()].arena.span(d.node))
            .unwrap_or_default();
        self.diagnostics.push(Diagnostic::error(
            files[file.index()].file_name.clone(),
            span,
            format!("cannot find module `{specifier}`"),
        ));
    }

    /// Scope-table lookup from the scope attached to `node` outward. Falls
    /// back to project globals; builtin globals are NOT consulted here.
    pub fn lookup_in_scope_chain(
        &self,
        file: FileId,
        node: NodeId,
        name: &str,
    ) -> Option<SymbolId> {
        let bind = &self.file_binds[file.index()];
        let mut scope = bind.scope_of_node.get(&node).copied();
        while let Some(s) = scope {
            let entry = &bind.scopes[s.0 as usize];
            if let Some(&id) = entry.table.get(name) {
                return Some(id);
            }
            if let Some(ns) = entry.ns_exports {
                if let Some(&id) = self.symbols.get(ns).exports.get(name) {
                    return Some(id);
                }
            }
            scope = entry.parent;
        }
        self.globals.get(name).copied()
    }
}

fn module_name_of(file_name: &str) -> String {
    format!("\"{}\"", file_name.trim_end_matches(".ts"))
}

/// Collapse `.` and `..` segments.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            _ => parts.push(segment),
        }
    }
    parts.join("/")
}
