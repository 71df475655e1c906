//! Arena-allocated syntax tree.

use molt_common::Span;
use molt_scanner::SyntaxKind;

/// Index of a node within its file's `NodeArena`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Syntactic modifier bits, const-module style.
pub mod modifier_flags {
    pub const EXPORT: u32 = 1 << 0;
    pub const DECLARE: u32 = 1 << 1;
    pub const ASYNC: u32 = 1 << 2;
    pub const ABSTRACT: u32 = 1 << 3;
    pub const READONLY: u32 = 1 << 4;
    pub const STATIC: u32 = 1 << 5;
    pub const PUBLIC: u32 = 1 << 6;
    pub const PRIVATE: u32 = 1 << 7;
    pub const PROTECTED: u32 = 1 << 8;
    pub const DEFAULT: u32 = 1 << 9;
    pub const CONST: u32 = 1 << 10;
    pub const OVERRIDE: u32 = 1 << 11;
}

/// Parsed modifier list: combined flags plus each keyword's span, so passes
/// can strip a single modifier textually (e.g. `declare`).
#[derive(Clone, Debug, Default)]
pub struct Modifiers {
    pub flags: u32,
    pub spans: Vec<(u32, Span)>,
}

impl Modifiers {
    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn span_of(&self, flag: u32) -> Option<Span> {
        self.spans.iter().find(|(f, _)| *f == flag).map(|(_, s)| *s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

/// Which keyword introduced a module declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModuleKind {
    /// `namespace N {}` or dotted `namespace A.B {}`
    Namespace,
    /// `module N {}` (identifier name) or `declare module "spec" {}`
    Module,
    /// `declare global {}`
    Global,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub span: Span,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    // ===== Names =====
    Ident { text: String },
    QualifiedName { left: NodeId, right: NodeId },
    ComputedProperty { expr: NodeId },

    // ===== Expressions =====
    StringLit { value: String },
    NumericLit,
    RegexLit,
    NoSubstitutionTemplate,
    TemplateExpr { substitutions: Vec<NodeId> },
    BoolLit { value: bool },
    NullLit,
    ThisExpr,
    SuperExpr,
    ArrayLit { elements: Vec<NodeId> },
    ObjectLit { properties: Vec<NodeId> },
    PropertyAssignment { name: NodeId, initializer: NodeId },
    ShorthandProperty { name: NodeId },
    Spread { expr: NodeId },
    OmittedExpr,
    PropertyAccess { expr: NodeId, question_dot: bool, name: NodeId },
    ElementAccess { expr: NodeId, question_dot: bool, arg: NodeId },
    Call { expr: NodeId, question_dot: bool, type_args: Vec<NodeId>, args: Vec<NodeId> },
    New { expr: NodeId, type_args: Vec<NodeId>, args: Option<Vec<NodeId>> },
    TaggedTemplate { tag: NodeId, template: NodeId },
    Paren { expr: NodeId },
    FunctionExpr {
        modifiers: Modifiers,
        asterisk: bool,
        name: Option<NodeId>,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_ty: Option<NodeId>,
        body: NodeId,
    },
    ArrowFunction {
        modifiers: Modifiers,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_ty: Option<NodeId>,
        body: NodeId,
    },
    ClassExpr {
        modifiers: Modifiers,
        name: Option<NodeId>,
        type_params: Vec<NodeId>,
        heritage: Vec<NodeId>,
        members: Vec<NodeId>,
    },
    Prefix { op: SyntaxKind, operand: NodeId },
    Postfix { op: SyntaxKind, operand: NodeId },
    Binary { left: NodeId, op: SyntaxKind, right: NodeId },
    Conditional { cond: NodeId, when_true: NodeId, when_false: NodeId },
    AsExpr { expr: NodeId, ty: NodeId },
    SatisfiesExpr { expr: NodeId, ty: NodeId },
    AngleAssertion { ty: NodeId, expr: NodeId },
    NonNull { expr: NodeId },
    Await { expr: NodeId },
    Yield { delegate: bool, expr: Option<NodeId> },
    TypeOfExpr { expr: NodeId },
    VoidExpr { expr: NodeId },
    DeleteExpr { expr: NodeId },

    // ===== Types =====
    TypeRef { name: NodeId, type_args: Vec<NodeId> },
    ImportType {
        specifier: String,
        qualifier: Option<NodeId>,
        type_args: Vec<NodeId>,
        is_typeof: bool,
    },
    TypeQuery { expr_name: NodeId },
    ArrayType { elem: NodeId },
    TupleType { elems: Vec<NodeId> },
    NamedTupleMember { name: NodeId, dotdotdot: bool, optional: bool, ty: NodeId },
    RestType { ty: NodeId },
    OptionalType { ty: NodeId },
    UnionType { types: Vec<NodeId> },
    IntersectionType { types: Vec<NodeId> },
    FunctionType { type_params: Vec<NodeId>, params: Vec<NodeId>, return_ty: NodeId },
    ConstructorType {
        is_abstract: bool,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_ty: NodeId,
    },
    TypeLiteral { members: Vec<NodeId> },
    ParenType { ty: NodeId },
    TypeOperator { op: SyntaxKind, ty: NodeId },
    IndexedAccessType { obj: NodeId, index: NodeId },
    ConditionalType { check: NodeId, extends_ty: NodeId, true_ty: NodeId, false_ty: NodeId },
    InferType { type_param: NodeId },
    MappedType {
        readonly_token: bool,
        type_param: NodeId,
        name_ty: Option<NodeId>,
        question_token: bool,
        ty: Option<NodeId>,
    },
    LiteralType { lit: NodeId },
    TemplateLiteralType { substitutions: Vec<NodeId> },
    TypePredicate { asserts: bool, param: NodeId, ty: Option<NodeId> },
    ThisType,

    // ===== Type members =====
    PropertySignature { modifiers: Modifiers, name: NodeId, optional: bool, ty: Option<NodeId> },
    MethodSignature {
        modifiers: Modifiers,
        name: NodeId,
        optional: bool,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_ty: Option<NodeId>,
    },
    CallSignature { type_params: Vec<NodeId>, params: Vec<NodeId>, return_ty: Option<NodeId> },
    ConstructSignature { type_params: Vec<NodeId>, params: Vec<NodeId>, return_ty: Option<NodeId> },
    IndexSignature { modifiers: Modifiers, param: NodeId, ty: Option<NodeId> },

    // ===== Class members =====
    PropertyDecl {
        modifiers: Modifiers,
        name: NodeId,
        optional: bool,
        exclaim: bool,
        ty: Option<NodeId>,
        initializer: Option<NodeId>,
    },
    MethodDecl {
        modifiers: Modifiers,
        asterisk: bool,
        name: NodeId,
        optional: bool,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_ty: Option<NodeId>,
        body: Option<NodeId>,
    },
    ConstructorDecl { modifiers: Modifiers, params: Vec<NodeId>, body: Option<NodeId> },
    GetAccessor {
        modifiers: Modifiers,
        name: NodeId,
        params: Vec<NodeId>,
        return_ty: Option<NodeId>,
        body: Option<NodeId>,
    },
    SetAccessor { modifiers: Modifiers, name: NodeId, params: Vec<NodeId>, body: Option<NodeId> },

    // ===== Declarations =====
    SourceFileNode { statements: Vec<NodeId> },
    Block { statements: Vec<NodeId> },
    VariableStatement { modifiers: Modifiers, decl_list: NodeId },
    VariableDeclarationList { var_kind: VarKind, declarations: Vec<NodeId> },
    VariableDeclaration {
        name: NodeId,
        exclaim: bool,
        ty: Option<NodeId>,
        initializer: Option<NodeId>,
    },
    ObjectBindingPattern { elements: Vec<NodeId> },
    ArrayBindingPattern { elements: Vec<NodeId> },
    BindingElement {
        dotdotdot: bool,
        property_name: Option<NodeId>,
        name: NodeId,
        initializer: Option<NodeId>,
    },
    FunctionDecl {
        modifiers: Modifiers,
        asterisk: bool,
        name: Option<NodeId>,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_ty: Option<NodeId>,
        body: Option<NodeId>,
    },
    Param {
        modifiers: Modifiers,
        dotdotdot: bool,
        name: NodeId,
        optional: bool,
        ty: Option<NodeId>,
        initializer: Option<NodeId>,
    },
    TypeParam { name: NodeId, constraint: Option<NodeId>, default: Option<NodeId> },
    ClassDecl {
        modifiers: Modifiers,
        name: Option<NodeId>,
        type_params: Vec<NodeId>,
        heritage: Vec<NodeId>,
        members: Vec<NodeId>,
    },
    HeritageClause { keyword: SyntaxKind, types: Vec<NodeId> },
    ExprWithTypeArgs { expr: NodeId, type_args: Vec<NodeId> },
    InterfaceDecl {
        modifiers: Modifiers,
        name: NodeId,
        type_params: Vec<NodeId>,
        heritage: Vec<NodeId>,
        members: Vec<NodeId>,
    },
    TypeAliasDecl { modifiers: Modifiers, name: NodeId, type_params: Vec<NodeId>, ty: NodeId },
    EnumDecl { modifiers: Modifiers, is_const: bool, name: NodeId, members: Vec<NodeId> },
    EnumMember { name: NodeId, initializer: Option<NodeId> },
    ModuleDecl {
        modifiers: Modifiers,
        module_kind: ModuleKind,
        name: NodeId,
        body: Option<NodeId>,
    },
    ModuleBlock { statements: Vec<NodeId> },

    // ===== Import/export =====
    ImportDecl { import_clause: Option<NodeId>, specifier: NodeId },
    ImportClause { is_type_only: bool, name: Option<NodeId>, named_bindings: Option<NodeId> },
    NamespaceImport { name: NodeId },
    NamedImports { elements: Vec<NodeId> },
    ImportSpecifier { is_type_only: bool, property_name: Option<NodeId>, name: NodeId },
    ImportEqualsDecl { modifiers: Modifiers, name: NodeId, module_ref: NodeId },
    ExternalModuleRef { specifier: NodeId },
    ExportDecl {
        modifiers: Modifiers,
        is_type_only: bool,
        export_clause: Option<NodeId>,
        specifier: Option<NodeId>,
    },
    NamedExports { elements: Vec<NodeId> },
    ExportSpecifier { is_type_only: bool, property_name: Option<NodeId>, name: NodeId },
    NamespaceExport { name: NodeId },
    ExportAssignment { is_default: bool, expr: NodeId },

    // ===== Statements =====
    If { cond: NodeId, then_stmt: NodeId, else_stmt: Option<NodeId> },
    While { cond: NodeId, body: NodeId },
    DoWhile { body: NodeId, cond: NodeId },
    For {
        initializer: Option<NodeId>,
        cond: Option<NodeId>,
        incrementor: Option<NodeId>,
        body: NodeId,
    },
    ForIn { initializer: NodeId, expr: NodeId, body: NodeId },
    ForOf { is_await: bool, initializer: NodeId, expr: NodeId, body: NodeId },
    Return { expr: Option<NodeId> },
    Throw { expr: NodeId },
    Try { block: NodeId, catch: Option<NodeId>, finally: Option<NodeId> },
    CatchClause { param: Option<NodeId>, block: NodeId },
    Switch { expr: NodeId, cases: Vec<NodeId> },
    CaseClause { expr: Option<NodeId>, statements: Vec<NodeId> },
    Labeled { label: NodeId, stmt: NodeId },
    Break { label: Option<NodeId> },
    Continue { label: Option<NodeId> },
    ExpressionStatement { expr: NodeId },
    EmptyStatement,
    DebuggerStatement,
}

#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
}

impl NodeArena {
    pub fn new() -> NodeArena {
        NodeArena::default()
    }

    pub fn alloc(&mut self, span: Span, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { span, kind });
        self.parents.push(None);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Widen a node's span (used after in-place extension, e.g. postfix forms).
    pub fn set_span(&mut self, id: NodeId, span: Span) {
        self.nodes[id.index()].span = span;
    }

    /// Roll back nodes allocated during an abandoned speculative parse.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
        self.parents.truncate(len);
    }

    /// Identifier text, if `id` is an identifier.
    pub fn ident_text(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).kind {
            NodeKind::Ident { text } => Some(text),
            _ => None,
        }
    }

    /// String literal value, if `id` is a string literal.
    pub fn string_value(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).kind {
            NodeKind::StringLit { value } => Some(value),
            _ => None,
        }
    }

    /// Walk the finished tree and record parent links.
    pub fn compute_parents(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let mut children = Vec::new();
            self.for_each_child(id, |c| children.push(c));
            for child in children {
                self.parents[child.index()] = Some(id);
                stack.push(child);
            }
        }
    }

    /// The ancestor chain of `id`, nearest first (excluding `id` itself).
    pub fn ancestors(&self, id: NodeId) -> AncestorIter<'_> {
        AncestorIter { arena: self, current: self.parent(id) }
    }

    /// Pre-order traversal from `root`, calling `visit` for each node.
    /// Returning `false` from `visit` skips that node's subtree.
    pub fn walk(&self, root: NodeId, visit: &mut impl FnMut(NodeId) -> bool) {
        if !visit(root) {
            return;
        }
        let mut children = Vec::new();
        self.for_each_child(root, |c| children.push(c));
        for child in children {
            self.walk(child, visit);
        }
    }

    pub fn for_each_child(&self, id: NodeId, mut f: impl FnMut(NodeId)) {
        self.for_each_child_impl(id, &mut f);
    }

    fn for_each_child_impl(&self, id: NodeId, f: &mut impl FnMut(NodeId)) {
        use NodeKind::*;

        fn each(f: &mut impl FnMut(NodeId), ids: &[NodeId]) {
            for &id in ids {
                f(id);
            }
        }
        fn opt(f: &mut impl FnMut(NodeId), id: &Option<NodeId>) {
            if let Some(id) = id {
                f(*id);
            }
        }

        match &self.get(id).kind {
            Ident { .. } | StringLit { .. } | NumericLit | RegexLit | NoSubstitutionTemplate
            | BoolLit { .. } | NullLit | ThisExpr | SuperExpr | OmittedExpr | ThisType
            | EmptyStatement | DebuggerStatement => {}
            QualifiedName { left, right } => {
                f(*left);
                f(*right);
            }
            ComputedProperty { expr } => f(*expr),
            TemplateExpr { substitutions } | TemplateLiteralType { substitutions } => {
                each(f, substitutions)
            }
            ArrayLit { elements } => each(f, elements),
            ObjectLit { properties } => each(f, properties),
            PropertyAssignment { name, initializer } => {
                f(*name);
                f(*initializer);
            }
            ShorthandProperty { name } => f(*name),
            Spread { expr } | Paren { expr } | NonNull { expr } | Await { expr }
            | TypeOfExpr { expr } | VoidExpr { expr } | DeleteExpr { expr } => f(*expr),
            PropertyAccess { expr, name, .. } => {
                f(*expr);
                f(*name);
            }
            ElementAccess { expr, arg, .. } => {
                f(*expr);
                f(*arg);
            }
            Call { expr, type_args, args, .. } => {
                f(*expr);
                each(f, type_args);
                each(f, args);
            }
            New { expr, type_args, args } => {
                f(*expr);
                each(f, type_args);
                if let Some(args) = args {
                    each(f, args);
                }
            }
            TaggedTemplate { tag, template } => {
                f(*tag);
                f(*template);
            }
            FunctionExpr { name, type_params, params, return_ty, body, .. } => {
                opt(f, name);
                each(f, type_params);
                each(f, params);
                opt(f, return_ty);
                f(*body);
            }
            ArrowFunction { type_params, params, return_ty, body, .. } => {
                each(f, type_params);
                each(f, params);
                opt(f, return_ty);
                f(*body);
            }
            ClassExpr { name, type_params, heritage, members, .. }
            | ClassDecl { name, type_params, heritage, members, .. } => {
                opt(f, name);
                each(f, type_params);
                each(f, heritage);
                each(f, members);
            }
            Prefix { operand, .. } | Postfix { operand, .. } => f(*operand),
            Binary { left, right, .. } => {
                f(*left);
                f(*right);
            }
            Conditional { cond, when_true, when_false } => {
                f(*cond);
                f(*when_true);
                f(*when_false);
            }
            AsExpr { expr, ty } | SatisfiesExpr { expr, ty } => {
                f(*expr);
                f(*ty);
            }
            AngleAssertion { ty, expr } => {
                f(*ty);
                f(*expr);
            }
            Yield { expr, .. } => opt(f, expr),
            TypeRef { name, type_args } => {
                f(*name);
                each(f, type_args);
            }
            ImportType { qualifier, type_args, .. } => {
                opt(f, qualifier);
                each(f, type_args);
            }
            TypeQuery { expr_name } => f(*expr_name),
            ArrayType { elem } => f(*elem),
            TupleType { elems } => each(f, elems),
            NamedTupleMember { name, ty, .. } => {
                f(*name);
                f(*ty);
            }
            RestType { ty } | OptionalType { ty } | ParenType { ty } | TypeOperator { ty, .. } => {
                f(*ty)
            }
            UnionType { types } | IntersectionType { types } => each(f, types),
            FunctionType { type_params, params, return_ty } => {
                each(f, type_params);
                each(f, params);
                f(*return_ty);
            }
            ConstructorType { type_params, params, return_ty, .. } => {
                each(f, type_params);
                each(f, params);
                f(*return_ty);
            }
            TypeLiteral { members } => each(f, members),
            IndexedAccessType { obj, index } => {
                f(*obj);
                f(*index);
            }
            ConditionalType { check, extends_ty, true_ty, false_ty } => {
                f(*check);
                f(*extends_ty);
                f(*true_ty);
                f(*false_ty);
            }
            InferType { type_param } => f(*type_param),
            MappedType { type_param, name_ty, ty, .. } => {
                f(*type_param);
                opt(f, name_ty);
                opt(f, ty);
            }
            LiteralType { lit } => f(*lit),
            TypePredicate { param, ty, .. } => {
                f(*param);
                opt(f, ty);
            }
            PropertySignature { name, ty, .. } => {
                f(*name);
                opt(f, ty);
            }
            MethodSignature { name, type_params, params, return_ty, .. } => {
                f(*name);
                each(f, type_params);
                each(f, params);
                opt(f, return_ty);
            }
            CallSignature { type_params, params, return_ty }
            | ConstructSignature { type_params, params, return_ty } => {
                each(f, type_params);
                each(f, params);
                opt(f, return_ty);
            }
            IndexSignature { param, ty, .. } => {
                f(*param);
                opt(f, ty);
            }
            PropertyDecl { name, ty, initializer, .. } => {
                f(*name);
                opt(f, ty);
                opt(f, initializer);
            }
            MethodDecl { name, type_params, params, return_ty, body, .. } => {
                f(*name);
                each(f, type_params);
                each(f, params);
                opt(f, return_ty);
                opt(f, body);
            }
            ConstructorDecl { params, body, .. } => {
                each(f, params);
                opt(f, body);
            }
            GetAccessor { name, params, return_ty, body, .. } => {
                f(*name);
                each(f, params);
                opt(f, return_ty);
                opt(f, body);
            }
            SetAccessor { name, params, body, .. } => {
                f(*name);
                each(f, params);
                opt(f, body);
            }
            SourceFileNode { statements } | Block { statements } | ModuleBlock { statements } => {
                each(f, statements)
            }
            VariableStatement { decl_list, .. } => f(*decl_list),
            VariableDeclarationList { declarations, .. } => each(f, declarations),
            VariableDeclaration { name, ty, initializer, .. } => {
                f(*name);
                opt(f, ty);
                opt(f, initializer);
            }
            ObjectBindingPattern { elements } | ArrayBindingPattern { elements } => {
                each(f, elements)
            }
            BindingElement { property_name, name, initializer, .. } => {
                opt(f, property_name);
                f(*name);
                opt(f, initializer);
            }
            FunctionDecl { name, type_params, params, return_ty, body, .. } => {
                opt(f, name);
                each(f, type_params);
                each(f, params);
                opt(f, return_ty);
                opt(f, body);
            }
            Param { name, ty, initializer, .. } => {
                f(*name);
                opt(f, ty);
                opt(f, initializer);
            }
            TypeParam { name, constraint, default } => {
                f(*name);
                opt(f, constraint);
                opt(f, default);
            }
            HeritageClause { types, .. } => each(f, types),
            ExprWithTypeArgs { expr, type_args } => {
                f(*expr);
                each(f, type_args);
            }
            InterfaceDecl { name, type_params, heritage, members, .. } => {
                f(*name);
                each(f, type_params);
                each(f, heritage);
                each(f, members);
            }
            TypeAliasDecl { name, type_params, ty, .. } => {
                f(*name);
                each(f, type_params);
                f(*ty);
            }
            EnumDecl { name, members, .. } => {
                f(*name);
                each(f, members);
            }
            EnumMember { name, initializer } => {
                f(*name);
                opt(f, initializer);
            }
            ModuleDecl { name, body, .. } => {
                f(*name);
                opt(f, body);
            }
            ImportDecl { import_clause, specifier } => {
                opt(f, import_clause);
                f(*specifier);
            }
            ImportClause { name, named_bindings, .. } => {
                opt(f, name);
                opt(f, named_bindings);
            }
            NamespaceImport { name } | NamespaceExport { name } => f(*name),
            NamedImports { elements } | NamedExports { elements } => each(f, elements),
            ImportSpecifier { property_name, name, .. }
            | ExportSpecifier { property_name, name, .. } => {
                opt(f, property_name);
                f(*name);
            }
            ImportEqualsDecl { name, module_ref, .. } => {
                f(*name);
                f(*module_ref);
            }
            ExternalModuleRef { specifier } => f(*specifier),
            ExportDecl { export_clause, specifier, .. } => {
                opt(f, export_clause);
                opt(f, specifier);
            }
            ExportAssignment { expr, .. } => f(*expr),
            If { cond, then_stmt, else_stmt } => {
                f(*cond);
                f(*then_stmt);
                opt(f, else_stmt);
            }
            While { cond, body } => {
                f(*cond);
                f(*body);
            }
            DoWhile { body, cond } => {
                f(*body);
                f(*cond);
            }
            For { initializer, cond, incrementor, body } => {
                opt(f, initializer);
                opt(f, cond);
                opt(f, incrementor);
                f(*body);
            }
            ForIn { initializer, expr, body } | ForOf { initializer, expr, body, .. } => {
                f(*initializer);
                f(*expr);
                f(*body);
            }
            Return { expr } => opt(f, expr),
            Throw { expr } | ExpressionStatement { expr } => f(*expr),
            Try { block, catch, finally } => {
                f(*block);
                opt(f, catch);
                opt(f, finally);
            }
            CatchClause { param, block } => {
                opt(f, param);
                f(*block);
            }
            Switch { expr, cases } => {
                f(*expr);
                each(f, cases);
            }
            CaseClause { expr, statements } => {
                opt(f, expr);
                each(f, statements);
            }
            Labeled { label, stmt } => {
                f(*label);
                f(*stmt);
            }
            Break { label } | Continue { label } => opt(f, label),
        }
    }

    /// The name node a declaration declares, mirroring the compiler's
    /// `getNameOfDeclaration`. Used to skip identifiers that *are* the
    /// declared name during reference walks.
    pub fn declared_name_of(&self, id: NodeId) -> Option<NodeId> {
        use NodeKind::*;
        match &self.get(id).kind {
            FunctionDecl { name, .. } | FunctionExpr { name, .. } | ClassDecl { name, .. }
            | ClassExpr { name, .. } => *name,
            InterfaceDecl { name, .. }
            | TypeAliasDecl { name, .. }
            | EnumDecl { name, .. }
            | EnumMember { name, .. }
            | ModuleDecl { name, .. }
            | VariableDeclaration { name, .. }
            | BindingElement { name, .. }
            | Param { name, .. }
            | TypeParam { name, .. }
            | PropertySignature { name, .. }
            | MethodSignature { name, .. }
            | PropertyDecl { name, .. }
            | MethodDecl { name, .. }
            | GetAccessor { name, .. }
            | SetAccessor { name, .. }
            | PropertyAssignment { name, .. }
            | ShorthandProperty { name }
            | ImportSpecifier { name, .. }
            | ExportSpecifier { name, .. }
            | NamespaceImport { name }
            | NamespaceExport { name }
            | ImportEqualsDecl { name, .. }
            | ImportClause { name: Some(name), .. }
            | Labeled { label: name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Modifiers of a declaration-like node, if it carries any.
    pub fn modifiers_of(&self, id: NodeId) -> Option<&Modifiers> {
        use NodeKind::*;
        match &self.get(id).kind {
            FunctionExpr { modifiers, .. }
            | ArrowFunction { modifiers, .. }
            | ClassExpr { modifiers, .. }
            | PropertySignature { modifiers, .. }
            | MethodSignature { modifiers, .. }
            | IndexSignature { modifiers, .. }
            | PropertyDecl { modifiers, .. }
            | MethodDecl { modifiers, .. }
            | ConstructorDecl { modifiers, .. }
            | GetAccessor { modifiers, .. }
            | SetAccessor { modifiers, .. }
            | VariableStatement { modifiers, .. }
            | FunctionDecl { modifiers, .. }
            | ClassDecl { modifiers, .. }
            | InterfaceDecl { modifiers, .. }
            | TypeAliasDecl { modifiers, .. }
            | EnumDecl { modifiers, .. }
            | ModuleDecl { modifiers, .. }
            | ImportEqualsDecl { modifiers, .. }
            | ExportDecl { modifiers, .. }
            | Param { modifiers, .. } => Some(modifiers),
            _ => None,
        }
    }
}

pub struct AncestorIter<'a> {
    arena: &'a NodeArena,
    current: Option<NodeId>,
}

impl Iterator for AncestorIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.arena.parent(id);
        Some(id)
    }
}
