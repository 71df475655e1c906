//! Recursive-descent parser for the TypeScript subset.
//!
//! The parser is tolerant: syntax errors are recorded as diagnostics and
//! recovery skips a token, so a malformed region never aborts the file.
//! Grammar ambiguities (arrow parameter lists, generic call arguments,
//! function types behind parentheses) are resolved by speculative parsing
//! against a scanner snapshot.

use molt_common::{Diagnostic, Span};
use molt_scanner::{Scanner, SyntaxKind, Token};

use crate::ast::{
    modifier_flags, Modifiers, ModuleKind, NodeArena, NodeId, NodeKind, VarKind,
};

use SyntaxKind as K;

pub struct Parser<'a> {
    scanner: Scanner<'a>,
    token: Token,
    prev_end: u32,
    arena: NodeArena,
    diagnostics: Vec<Diagnostic>,
    file_name: String,
    /// `in` is not a binary operator while parsing a `for` initializer.
    no_in: bool,
}

struct ParserSnapshot {
    scanner: molt_scanner::ScannerSnapshot,
    token: Token,
    prev_end: u32,
    arena_len: usize,
    diag_len: usize,
}

impl<'a> Parser<'a> {
    pub fn new(file_name: impl Into<String>, text: &'a str) -> Parser<'a> {
        let mut scanner = Scanner::new(text);
        let token = scanner.scan();
        Parser {
            scanner,
            token,
            prev_end: 0,
            arena: NodeArena::new(),
            diagnostics: Vec::new(),
            file_name: file_name.into(),
            no_in: false,
        }
    }

    pub fn parse_source_file(mut self) -> (NodeArena, NodeId, Vec<Diagnostic>) {
        let start = self.token.span.start;
        let statements = self.parse_statement_list(K::EndOfFile);
        let root = self
            .arena
            .alloc(Span::new(start, self.prev_end), NodeKind::SourceFileNode { statements });
        self.arena.compute_parents(root);
        (self.arena, root, self.diagnostics)
    }

    // ===== Token plumbing =====

    fn next(&mut self) {
        self.prev_end = self.token.span.end;
        self.token = self.scanner.scan();
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.token.kind == kind
    }

    fn at_ident(&self) -> bool {
        self.token.kind.is_identifier_like()
    }

    fn token_text(&self) -> &'a str {
        self.token.text(self.scanner.source())
    }

    fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: SyntaxKind, what: &str) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.error_here(format!("expected {what}"));
        false
    }

    fn error_here(&mut self, message: String) {
        self.diagnostics
            .push(Diagnostic::error(self.file_name.clone(), self.token.span, message));
    }

    /// Accept `;`, or a statement boundary implied by `}` / EOF / newline.
    fn parse_semicolon(&mut self) {
        if self.eat(K::Semicolon) {
            return;
        }
        if self.at(K::CloseBrace) || self.at(K::EndOfFile) || self.token.preceded_by_line_break {
            return;
        }
        self.error_here("expected `;`".to_string());
    }

    fn snapshot(&self) -> ParserSnapshot {
        ParserSnapshot {
            scanner: self.scanner.snapshot(),
            token: self.token,
            prev_end: self.prev_end,
            arena_len: self.arena.len(),
            diag_len: self.diagnostics.len(),
        }
    }

    fn restore(&mut self, snapshot: ParserSnapshot) {
        self.scanner.restore(snapshot.scanner);
        self.token = snapshot.token;
        self.prev_end = snapshot.prev_end;
        self.arena.truncate(snapshot.arena_len);
        self.diagnostics.truncate(snapshot.diag_len);
    }

    /// Run `f`; on `None`, roll the parser back to where it was.
    fn try_parse<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let snapshot = self.snapshot();
        let result = f(self);
        if result.is_none() {
            self.restore(snapshot);
        }
        result
    }

    /// Run `f` and roll back unconditionally.
    fn look_ahead<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let snapshot = self.snapshot();
        let result = f(self);
        self.restore(snapshot);
        result
    }

    fn finish(&mut self, start: u32, kind: NodeKind) -> NodeId {
        self.arena.alloc(Span::new(start, self.prev_end), kind)
    }

    // ===== Identifiers and names =====

    fn parse_identifier(&mut self) -> NodeId {
        let start = self.token.span.start;
        if self.at_ident() {
            let text = self.token_text().to_string();
            self.next();
            self.finish(start, NodeKind::Ident { text })
        } else {
            self.error_here(format!("expected identifier, found `{}`", self.token_text()));
            self.finish(start, NodeKind::Ident { text: String::new() })
        }
    }

    /// Identifier in member-name position: keywords are allowed (`x.default`).
    fn parse_member_name(&mut self) -> NodeId {
        let start = self.token.span.start;
        if self.at_ident() || self.token.kind.is_keyword() || self.at(K::PrivateIdentifier) {
            let text = self.token_text().to_string();
            self.next();
            self.finish(start, NodeKind::Ident { text })
        } else {
            self.error_here(format!("expected name, found `{}`", self.token_text()));
            self.finish(start, NodeKind::Ident { text: String::new() })
        }
    }

    /// `A` or `A.B.C` as a qualified name (type/entity position).
    fn parse_entity_name(&mut self) -> NodeId {
        let start = self.token.span.start;
        let mut name = self.parse_identifier();
        while self.eat(K::Dot) {
            let right = self.parse_member_name();
            name = self.finish(start, NodeKind::QualifiedName { left: name, right });
        }
        name
    }

    /// Property name in object-literal / class-member position.
    fn parse_property_name(&mut self) -> NodeId {
        let start = self.token.span.start;
        match self.token.kind {
            K::StringLiteral => self.parse_string_literal(),
            K::NumericLiteral => {
                self.next();
                self.finish(start, NodeKind::NumericLit)
            }
            K::OpenBracket => {
                self.next();
                let expr = self.parse_assignment_expression();
                self.expect(K::CloseBracket, "`]`");
                self.finish(start, NodeKind::ComputedProperty { expr })
            }
            _ => self.parse_member_name(),
        }
    }

    fn parse_string_literal(&mut self) -> NodeId {
        let start = self.token.span.start;
        let raw = self.token_text();
        let value = if raw.len() >= 2 {
            unescape_string(&raw[1..raw.len() - 1])
        } else {
            String::new()
        };
        self.next();
        self.finish(start, NodeKind::StringLit { value })
    }

    // ===== Statements =====

    fn parse_statement_list(&mut self, terminator: SyntaxKind) -> Vec<NodeId> {
        let mut statements = Vec::new();
        while !self.at(terminator) && !self.at(K::EndOfFile) {
            let before = self.token.span.start;
            statements.push(self.parse_statement());
            if self.token.span.start == before {
                // No progress; skip the offending token to avoid looping.
                self.error_here(format!("unexpected token `{}`", self.token_text()));
                self.next();
            }
        }
        statements
    }

    pub fn parse_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        let kind = self.token.kind;
        match kind {
            K::OpenBrace => self.parse_block(),
            K::Semicolon => {
                self.next();
                self.finish(start, NodeKind::EmptyStatement)
            }
            K::IfKeyword => self.parse_if_statement(),
            K::WhileKeyword => self.parse_while_statement(),
            K::DoKeyword => self.parse_do_statement(),
            K::ForKeyword => self.parse_for_statement(),
            K::ReturnKeyword => {
                self.next();
                let expr = if self.can_start_expression() && !self.token.preceded_by_line_break {
                    Some(self.parse_expression())
                } else {
                    None
                };
                self.parse_semicolon();
                self.finish(start, NodeKind::Return { expr })
            }
            K::ThrowKeyword => {
                self.next();
                let expr = self.parse_expression();
                self.parse_semicolon();
                self.finish(start, NodeKind::Throw { expr })
            }
            K::TryKeyword => self.parse_try_statement(),
            K::SwitchKeyword => self.parse_switch_statement(),
            K::BreakKeyword | K::ContinueKeyword => {
                let is_break = self.at(K::BreakKeyword);
                self.next();
                let label = if self.at_ident() && !self.token.preceded_by_line_break {
                    Some(self.parse_identifier())
                } else {
                    None
                };
                self.parse_semicolon();
                if is_break {
                    self.finish(start, NodeKind::Break { label })
                } else {
                    self.finish(start, NodeKind::Continue { label })
                }
            }
            K::DebuggerKeyword => {
                self.next();
                self.parse_semicolon();
                self.finish(start, NodeKind::DebuggerStatement)
            }
            K::ConstKeyword if self.next_token_is(K::EnumKeyword) => {
                self.parse_declaration(Modifiers::default())
            }
            K::VarKeyword | K::ConstKeyword => {
                self.parse_variable_statement(Modifiers::default())
            }
            K::LetKeyword if self.let_starts_declaration() => {
                self.parse_variable_statement(Modifiers::default())
            }
            K::FunctionKeyword => self.parse_function_declaration(Modifiers::default()),
            K::ClassKeyword => self.parse_class_declaration(Modifiers::default()),
            K::ImportKeyword => self.parse_import_statement(),
            K::ExportKeyword => self.parse_export_statement(),
            K::InterfaceKeyword if self.next_is_ident() => {
                self.parse_interface_declaration(Modifiers::default())
            }
            K::TypeKeyword if self.next_is_ident() => {
                self.parse_type_alias_declaration(Modifiers::default())
            }
            K::EnumKeyword if self.next_is_ident() => {
                self.parse_enum_declaration(Modifiers::default(), false)
            }
            K::NamespaceKeyword | K::ModuleKeyword if self.next_starts_module_name() => {
                self.parse_module_declaration(Modifiers::default())
            }
            K::DeclareKeyword | K::AsyncKeyword | K::AbstractKeyword
                if self.starts_modified_declaration() =>
            {
                self.parse_declaration_with_modifiers()
            }
            _ => {
                if self.at_ident() && self.next_token_is(K::Colon) {
                    let label = self.parse_identifier();
                    self.next(); // :
                    let stmt = self.parse_statement();
                    return self.finish(start, NodeKind::Labeled { label, stmt });
                }
                let expr = self.parse_expression();
                self.parse_semicolon();
                self.finish(start, NodeKind::ExpressionStatement { expr })
            }
        }
    }

    fn next_is_ident(&mut self) -> bool {
        self.look_ahead(|p| {
            p.next();
            p.at_ident()
        })
    }

    fn next_starts_module_name(&mut self) -> bool {
        self.look_ahead(|p| {
            p.next();
            p.at_ident() || p.at(K::StringLiteral)
        })
    }

    fn next_token_is(&mut self, kind: SyntaxKind) -> bool {
        self.look_ahead(|p| {
            p.next();
            p.at(kind)
        })
    }

    fn let_starts_declaration(&mut self) -> bool {
        self.look_ahead(|p| {
            p.next();
            p.at_ident() || p.at(K::OpenBrace) || p.at(K::OpenBracket)
        })
    }

    fn starts_modified_declaration(&mut self) -> bool {
        self.look_ahead(|p| {
            loop {
                match p.token.kind {
                    K::DeclareKeyword | K::AsyncKeyword | K::AbstractKeyword | K::ExportKeyword => {
                        p.next()
                    }
                    _ => break,
                }
            }
            p.starts_declaration_keyword()
        })
    }

    fn starts_declaration_keyword(&mut self) -> bool {
        match self.token.kind {
            K::VarKeyword | K::ConstKeyword | K::LetKeyword | K::FunctionKeyword
            | K::ClassKeyword | K::ImportKeyword => true,
            K::GlobalKeyword => self.next_token_is(K::OpenBrace),
            K::InterfaceKeyword | K::TypeKeyword | K::EnumKeyword => self.next_is_ident(),
            K::NamespaceKeyword | K::ModuleKeyword => self.next_starts_module_name(),
            _ => false,
        }
    }

    fn parse_declaration_with_modifiers(&mut self) -> NodeId {
        let modifiers = self.parse_modifiers();
        self.parse_declaration(modifiers)
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();
        loop {
            let flag = match self.token.kind {
                K::ExportKeyword => modifier_flags::EXPORT,
                K::DeclareKeyword => modifier_flags::DECLARE,
                K::AsyncKeyword => modifier_flags::ASYNC,
                K::AbstractKeyword => modifier_flags::ABSTRACT,
                K::ReadonlyKeyword => modifier_flags::READONLY,
                K::StaticKeyword => modifier_flags::STATIC,
                K::PublicKeyword => modifier_flags::PUBLIC,
                K::PrivateKeyword => modifier_flags::PRIVATE,
                K::ProtectedKeyword => modifier_flags::PROTECTED,
                K::DefaultKeyword => modifier_flags::DEFAULT,
                K::OverrideKeyword => modifier_flags::OVERRIDE,
                _ => break,
            };
            // A modifier keyword only counts when a member/declaration can
            // still follow; `readonly = 1` is a property named readonly.
            let next_continues = self.look_ahead(|p| {
                p.next();
                !matches!(
                    p.token.kind,
                    K::Equals
                        | K::OpenParen
                        | K::Colon
                        | K::Comma
                        | K::CloseParen
                        | K::Semicolon
                        | K::Question
                        | K::CloseBrace
                        | K::EndOfFile
                        | K::Dot
                        | K::LessThan
                        | K::EqualsGreaterThan
                ) && !p.token.preceded_by_line_break
            });
            if !next_continues {
                break;
            }
            modifiers.spans.push((flag, self.token.span));
            modifiers.flags |= flag;
            self.next();
        }
        modifiers
    }

    fn parse_declaration(&mut self, modifiers: Modifiers) -> NodeId {
        match self.token.kind {
            K::VarKeyword | K::LetKeyword | K::ConstKeyword => {
                if self.at(K::ConstKeyword) && self.next_token_is(K::EnumKeyword) {
                    self.next(); // const
                    self.next(); // enum
                    return self.parse_enum_body(modifiers, true, self.prev_end);
                }
                self.parse_variable_statement(modifiers)
            }
            K::FunctionKeyword => self.parse_function_declaration(modifiers),
            K::ClassKeyword => self.parse_class_declaration(modifiers),
            K::InterfaceKeyword => self.parse_interface_declaration(modifiers),
            K::TypeKeyword => self.parse_type_alias_declaration(modifiers),
            K::EnumKeyword => self.parse_enum_declaration(modifiers, false),
            K::NamespaceKeyword | K::ModuleKeyword | K::GlobalKeyword => {
                self.parse_module_declaration(modifiers)
            }
            K::ImportKeyword => self.parse_import_statement(),
            _ => {
                // Modifier run that did not introduce a declaration.
                let expr = self.parse_expression();
                self.parse_semicolon();
                let start = self.arena.span(expr).start;
                self.finish(start, NodeKind::ExpressionStatement { expr })
            }
        }
    }

    fn parse_block(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.expect(K::OpenBrace, "`{`");
        let statements = self.parse_statement_list(K::CloseBrace);
        self.expect(K::CloseBrace, "`}`");
        self.finish(start, NodeKind::Block { statements })
    }

    fn parse_if_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next();
        self.expect(K::OpenParen, "`(`");
        let cond = self.parse_expression();
        self.expect(K::CloseParen, "`)`");
        let then_stmt = self.parse_statement();
        let else_stmt = if self.eat(K::ElseKeyword) {
            Some(self.parse_statement())
        } else {
            None
        };
        self.finish(start, NodeKind::If { cond, then_stmt, else_stmt })
    }

    fn parse_while_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next();
        self.expect(K::OpenParen, "`(`");
        let cond = self.parse_expression();
        self.expect(K::CloseParen, "`)`");
        let body = self.parse_statement();
        self.finish(start, NodeKind::While { cond, body })
    }

    fn parse_do_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next();
        let body = self.parse_statement();
        self.expect(K::WhileKeyword, "`while`");
        self.expect(K::OpenParen, "`(`");
        let cond = self.parse_expression();
        self.expect(K::CloseParen, "`)`");
        self.eat(K::Semicolon);
        self.finish(start, NodeKind::DoWhile { body, cond })
    }

    fn parse_for_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next();
        let is_await = self.eat(K::AwaitKeyword);
        self.expect(K::OpenParen, "`(`");

        let initializer = if self.at(K::Semicolon) {
            None
        } else {
            self.no_in = true;
            let init = if matches!(self.token.kind, K::VarKeyword | K::LetKeyword | K::ConstKeyword)
            {
                self.parse_variable_declaration_list()
            } else {
                self.parse_expression()
            };
            self.no_in = false;
            Some(init)
        };

        if self.at(K::InKeyword) || (self.at(K::OfKeyword) && initializer.is_some()) {
            let is_of = self.at(K::OfKeyword);
            self.next();
            let expr = self.parse_assignment_expression();
            self.expect(K::CloseParen, "`)`");
            let body = self.parse_statement();
            let initializer = initializer.expect("for-in/of requires an initializer");
            return if is_of {
                self.finish(start, NodeKind::ForOf { is_await, initializer, expr, body })
            } else {
                self.finish(start, NodeKind::ForIn { initializer, expr, body })
            };
        }

        self.expect(K::Semicolon, "`;`");
        let cond = if self.at(K::Semicolon) { None } else { Some(self.parse_expression()) };
        self.expect(K::Semicolon, "`;`");
        let incrementor =
            if self.at(K::CloseParen) { None } else { Some(self.parse_expression()) };
        self.expect(K::CloseParen, "`)`");
        let body = self.parse_statement();
        self.finish(start, NodeKind::For { initializer, cond, incrementor, body })
    }

    fn parse_try_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next();
        let block = self.parse_block();
        let catch = if self.at(K::CatchKeyword) {
            let catch_start = self.token.span.start;
            self.next();
            let param = if self.eat(K::OpenParen) {
                let name = self.parse_binding_name();
                let ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
                let param_start = self.arena.span(name).start;
                let param = self.finish(
                    param_start,
                    NodeKind::VariableDeclaration { name, exclaim: false, ty, initializer: None },
                );
                self.expect(K::CloseParen, "`)`");
                Some(param)
            } else {
                None
            };
            let catch_block = self.parse_block();
            Some(self.finish(catch_start, NodeKind::CatchClause { param, block: catch_block }))
        } else {
            None
        };
        let finally = if self.eat(K::FinallyKeyword) { Some(self.parse_block()) } else { None };
        self.finish(start, NodeKind::Try { block, catch, finally })
    }

    fn parse_switch_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next();
        self.expect(K::OpenParen, "`(`");
        let expr = self.parse_expression();
        self.expect(K::CloseParen, "`)`");
        self.expect(K::OpenBrace, "`{`");
        let mut cases = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            let case_start = self.token.span.start;
            let case_expr = if self.eat(K::CaseKeyword) {
                Some(self.parse_expression())
            } else {
                self.expect(K::DefaultKeyword, "`case` or `default`");
                None
            };
            self.expect(K::Colon, "`:`");
            let mut statements = Vec::new();
            while !matches!(
                self.token.kind,
                K::CaseKeyword | K::DefaultKeyword | K::CloseBrace | K::EndOfFile
            ) {
                let before = self.token.span.start;
                statements.push(self.parse_statement());
                if self.token.span.start == before {
                    self.next();
                }
            }
            cases.push(self.finish(case_start, NodeKind::CaseClause { expr: case_expr, statements }));
        }
        self.expect(K::CloseBrace, "`}`");
        self.finish(start, NodeKind::Switch { expr, cases })
    }

    // ===== Variable declarations =====

    fn parse_variable_statement(&mut self, modifiers: Modifiers) -> NodeId {
        let start = modifiers
            .spans
            .first()
            .map(|(_, s)| s.start)
            .unwrap_or(self.token.span.start);
        let decl_list = self.parse_variable_declaration_list();
        self.parse_semicolon();
        self.finish(start, NodeKind::VariableStatement { modifiers, decl_list })
    }

    fn parse_variable_declaration_list(&mut self) -> NodeId {
        let start = self.token.span.start;
        let var_kind = match self.token.kind {
            K::ConstKeyword => VarKind::Const,
            K::LetKeyword => VarKind::Let,
            _ => VarKind::Var,
        };
        self.next();
        let mut declarations = Vec::new();
        loop {
            let decl_start = self.token.span.start;
            let name = self.parse_binding_name();
            let exclaim = self.eat(K::Exclamation);
            let ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
            let initializer =
                if self.eat(K::Equals) { Some(self.parse_assignment_expression()) } else { None };
            declarations.push(self.finish(
                decl_start,
                NodeKind::VariableDeclaration { name, exclaim, ty, initializer },
            ));
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.finish(start, NodeKind::VariableDeclarationList { var_kind, declarations })
    }

    fn parse_binding_name(&mut self) -> NodeId {
        match self.token.kind {
            K::OpenBrace => self.parse_object_binding_pattern(),
            K::OpenBracket => self.parse_array_binding_pattern(),
            _ => self.parse_identifier(),
        }
    }

    fn parse_object_binding_pattern(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next();
        let mut elements = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            let elem_start = self.token.span.start;
            let dotdotdot = self.eat(K::DotDotDot);
            let first = self.parse_property_name();
            let (property_name, name) = if self.eat(K::Colon) {
                (Some(first), self.parse_binding_name())
            } else {
                (None, first)
            };
            let initializer =
                if self.eat(K::Equals) { Some(self.parse_assignment_expression()) } else { None };
            elements.push(self.finish(
                elem_start,
                NodeKind::BindingElement { dotdotdot, property_name, name, initializer },
            ));
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::CloseBrace, "`}`");
        self.finish(start, NodeKind::ObjectBindingPattern { elements })
    }

    fn parse_array_binding_pattern(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next();
        let mut elements = Vec::new();
        while !self.at(K::CloseBracket) && !self.at(K::EndOfFile) {
            if self.at(K::Comma) {
                let elision_start = self.token.span.start;
                self.next();
                elements.push(self.finish(elision_start, NodeKind::OmittedExpr));
                continue;
            }
            let elem_start = self.token.span.start;
            let dotdotdot = self.eat(K::DotDotDot);
            let name = self.parse_binding_name();
            let initializer =
                if self.eat(K::Equals) { Some(self.parse_assignment_expression()) } else { None };
            elements.push(self.finish(
                elem_start,
                NodeKind::BindingElement { dotdotdot, property_name: None, name, initializer },
            ));
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::CloseBracket, "`]`");
        self.finish(start, NodeKind::ArrayBindingPattern { elements })
    }

    // ===== Functions, classes, interfaces =====

    fn modifiers_start(&self, modifiers: &Modifiers) -> u32 {
        modifiers
            .spans
            .first()
            .map(|(_, s)| s.start)
            .unwrap_or(self.token.span.start)
    }

    fn parse_function_declaration(&mut self, modifiers: Modifiers) -> NodeId {
        let start = self.modifiers_start(&modifiers);
        self.expect(K::FunctionKeyword, "`function`");
        let asterisk = self.eat(K::Asterisk);
        let name = if self.at_ident() { Some(self.parse_identifier()) } else { None };
        let type_params = self.parse_type_parameters();
        let params = self.parse_parameter_list();
        let return_ty = if self.eat(K::Colon) { Some(self.parse_type_or_predicate()) } else { None };
        let body = if self.at(K::OpenBrace) {
            Some(self.parse_block())
        } else {
            self.parse_semicolon();
            None
        };
        self.finish(
            start,
            NodeKind::FunctionDecl { modifiers, asterisk, name, type_params, params, return_ty, body },
        )
    }

    fn parse_class_declaration(&mut self, modifiers: Modifiers) -> NodeId {
        let start = self.modifiers_start(&modifiers);
        self.expect(K::ClassKeyword, "`class`");
        let name = if self.at_ident() { Some(self.parse_identifier()) } else { None };
        let type_params = self.parse_type_parameters();
        let heritage = self.parse_heritage_clauses();
        let members = self.parse_class_members();
        self.finish(start, NodeKind::ClassDecl { modifiers, name, type_params, heritage, members })
    }

    fn parse_heritage_clauses(&mut self) -> Vec<NodeId> {
        let mut clauses = Vec::new();
        while self.at(K::ExtendsKeyword) || self.at(K::ImplementsKeyword) {
            let start = self.token.span.start;
            let keyword = self.token.kind;
            self.next();
            let mut types = Vec::new();
            loop {
                let ty_start = self.token.span.start;
                let expr = self.parse_left_hand_side_expression();
                let type_args = self.parse_type_arguments_if_present();
                types.push(self.finish(ty_start, NodeKind::ExprWithTypeArgs { expr, type_args }));
                if !self.eat(K::Comma) {
                    break;
                }
            }
            clauses.push(self.finish(start, NodeKind::HeritageClause { keyword, types }));
        }
        clauses
    }

    fn parse_class_members(&mut self) -> Vec<NodeId> {
        self.expect(K::OpenBrace, "`{`");
        let mut members = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            if self.eat(K::Semicolon) {
                continue;
            }
            let before = self.token.span.start;
            members.push(self.parse_class_member());
            if self.token.span.start == before {
                self.next();
            }
        }
        self.expect(K::CloseBrace, "`}`");
        members
    }

    fn parse_class_member(&mut self) -> NodeId {
        let modifiers = self.parse_modifiers();
        let start = self.modifiers_start(&modifiers);

        if (self.at(K::GetKeyword) || self.at(K::SetKeyword))
            && self.look_ahead(|p| {
                p.next();
                p.at_ident()
                    || p.token.kind.is_keyword()
                    || p.at(K::StringLiteral)
                    || p.at(K::NumericLiteral)
                    || p.at(K::OpenBracket)
            })
        {
            let is_get = self.at(K::GetKeyword);
            self.next();
            let name = self.parse_property_name();
            let params = self.parse_parameter_list();
            let return_ty =
                if self.eat(K::Colon) { Some(self.parse_type_or_predicate()) } else { None };
            let body = if self.at(K::OpenBrace) {
                Some(self.parse_block())
            } else {
                self.parse_semicolon();
                None
            };
            return if is_get {
                self.finish(start, NodeKind::GetAccessor { modifiers, name, params, return_ty, body })
            } else {
                self.finish(start, NodeKind::SetAccessor { modifiers, name, params, body })
            };
        }

        let asterisk = self.eat(K::Asterisk);
        let name = self.parse_property_name();
        let is_constructor = self.arena.ident_text(name) == Some("constructor");

        if self.at(K::OpenParen) || self.at(K::LessThan) {
            let type_params = self.parse_type_parameters();
            let params = self.parse_parameter_list();
            let return_ty =
                if self.eat(K::Colon) { Some(self.parse_type_or_predicate()) } else { None };
            let body = if self.at(K::OpenBrace) {
                Some(self.parse_block())
            } else {
                self.parse_semicolon();
                None
            };
            if is_constructor {
                return self.finish(start, NodeKind::ConstructorDecl { modifiers, params, body });
            }
            return self.finish(
                start,
                NodeKind::MethodDecl {
                    modifiers,
                    asterisk,
                    name,
                    optional: false,
                    type_params,
                    params,
                    return_ty,
                    body,
                },
            );
        }

        let optional = self.eat(K::Question);
        let exclaim = self.eat(K::Exclamation);
        if self.at(K::OpenParen) || self.at(K::LessThan) {
            // `m?(...)` — optional method
            let type_params = self.parse_type_parameters();
            let params = self.parse_parameter_list();
            let return_ty =
                if self.eat(K::Colon) { Some(self.parse_type_or_predicate()) } else { None };
            let body = if self.at(K::OpenBrace) {
                Some(self.parse_block())
            } else {
                self.parse_semicolon();
                None
            };
            return self.finish(
                start,
                NodeKind::MethodDecl {
                    modifiers,
                    asterisk,
                    name,
                    optional,
                    type_params,
                    params,
                    return_ty,
                    body,
                },
            );
        }

        let ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
        let initializer =
            if self.eat(K::Equals) { Some(self.parse_assignment_expression()) } else { None };
        self.parse_semicolon();
        self.finish(
            start,
            NodeKind::PropertyDecl { modifiers, name, optional, exclaim, ty, initializer },
        )
    }

    fn parse_interface_declaration(&mut self, modifiers: Modifiers) -> NodeId {
        let start = self.modifiers_start(&modifiers);
        self.expect(K::InterfaceKeyword, "`interface`");
        let name = self.parse_identifier();
        let type_params = self.parse_type_parameters();
        let heritage = self.parse_heritage_clauses();
        let members = self.parse_type_member_block();
        self.finish(
            start,
            NodeKind::InterfaceDecl { modifiers, name, type_params, heritage, members },
        )
    }

    fn parse_type_alias_declaration(&mut self, modifiers: Modifiers) -> NodeId {
        let start = self.modifiers_start(&modifiers);
        self.expect(K::TypeKeyword, "`type`");
        let name = self.parse_identifier();
        let type_params = self.parse_type_parameters();
        self.expect(K::Equals, "`=`");
        let ty = self.parse_type();
        self.parse_semicolon();
        self.finish(start, NodeKind::TypeAliasDecl { modifiers, name, type_params, ty })
    }

    fn parse_enum_declaration(&mut self, modifiers: Modifiers, is_const: bool) -> NodeId {
        let start = self.modifiers_start(&modifiers);
        self.expect(K::EnumKeyword, "`enum`");
        self.parse_enum_body(modifiers, is_const, start)
    }

    fn parse_enum_body(&mut self, modifiers: Modifiers, is_const: bool, start: u32) -> NodeId {
        let name = self.parse_identifier();
        self.expect(K::OpenBrace, "`{`");
        let mut members = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            let member_start = self.token.span.start;
            let member_name = self.parse_property_name();
            let initializer =
                if self.eat(K::Equals) { Some(self.parse_assignment_expression()) } else { None };
            members.push(
                self.finish(member_start, NodeKind::EnumMember { name: member_name, initializer }),
            );
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::CloseBrace, "`}`");
        self.finish(start, NodeKind::EnumDecl { modifiers, is_const, name, members })
    }

    fn parse_module_declaration(&mut self, modifiers: Modifiers) -> NodeId {
        let start = self.modifiers_start(&modifiers);
        if self.at(K::GlobalKeyword) {
            let name = self.parse_identifier();
            let body = Some(self.parse_module_block());
            return self.finish(
                start,
                NodeKind::ModuleDecl { modifiers, module_kind: ModuleKind::Global, name, body },
            );
        }
        let is_namespace = self.at(K::NamespaceKeyword);
        self.next(); // namespace | module
        if self.at(K::StringLiteral) {
            let name = self.parse_string_literal();
            let body = if self.at(K::OpenBrace) { Some(self.parse_module_block()) } else { None };
            if body.is_none() {
                self.parse_semicolon();
            }
            return self.finish(
                start,
                NodeKind::ModuleDecl { modifiers, module_kind: ModuleKind::Module, name, body },
            );
        }
        let module_kind = if is_namespace { ModuleKind::Namespace } else { ModuleKind::Module };
        self.parse_module_name_rest(modifiers, module_kind, start)
    }

    /// Parses `A.B.C { ... }` as nested module declarations, one per segment.
    fn parse_module_name_rest(
        &mut self,
        modifiers: Modifiers,
        module_kind: ModuleKind,
        start: u32,
    ) -> NodeId {
        let name = self.parse_identifier();
        let body = if self.eat(K::Dot) {
            let inner_start = self.token.span.start;
            Some(self.parse_module_name_rest(Modifiers::default(), module_kind, inner_start))
        } else if self.at(K::OpenBrace) {
            Some(self.parse_module_block())
        } else {
            self.parse_semicolon();
            None
        };
        self.finish(start, NodeKind::ModuleDecl { modifiers, module_kind, name, body })
    }

    fn parse_module_block(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.expect(K::OpenBrace, "`{`");
        let statements = self.parse_statement_list(K::CloseBrace);
        self.expect(K::CloseBrace, "`}`");
        self.finish(start, NodeKind::ModuleBlock { statements })
    }

    // ===== Import / export =====

    fn parse_import_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        // `import(` is a dynamic import expression, not a declaration.
        if self.next_token_is(K::OpenParen) {
            let expr = self.parse_expression();
            self.parse_semicolon();
            return self.finish(start, NodeKind::ExpressionStatement { expr });
        }
        self.next(); // import

        if self.at(K::StringLiteral) {
            let specifier = self.parse_string_literal();
            self.parse_semicolon();
            return self.finish(start, NodeKind::ImportDecl { import_clause: None, specifier });
        }

        let is_type_only = self.at(K::TypeKeyword)
            && self.look_ahead(|p| {
                p.next();
                (p.at_ident() || p.at(K::Asterisk) || p.at(K::OpenBrace)) && !p.at(K::FromKeyword)
            });
        if is_type_only {
            self.next();
        }

        // `import x = require("...")` / `import x = A.B.C`
        if self.at_ident() && self.next_token_is(K::Equals) {
            let name = self.parse_identifier();
            self.next(); // =
            let module_ref = if self.at(K::RequireKeyword) {
                let ref_start = self.token.span.start;
                self.next();
                self.expect(K::OpenParen, "`(`");
                let specifier = self.parse_string_literal();
                self.expect(K::CloseParen, "`)`");
                self.finish(ref_start, NodeKind::ExternalModuleRef { specifier })
            } else {
                self.parse_entity_name()
            };
            self.parse_semicolon();
            return self.finish(
                start,
                NodeKind::ImportEqualsDecl { modifiers: Modifiers::default(), name, module_ref },
            );
        }

        let clause_start = self.token.span.start;
        let default_name = if self.at_ident() { Some(self.parse_identifier()) } else { None };
        let named_bindings = if default_name.is_none() || self.eat(K::Comma) {
            if self.at(K::Asterisk) {
                let ns_start = self.token.span.start;
                self.next();
                self.expect(K::AsKeyword, "`as`");
                let ns_name = self.parse_identifier();
                Some(self.finish(ns_start, NodeKind::NamespaceImport { name: ns_name }))
            } else if self.at(K::OpenBrace) {
                Some(self.parse_named_imports())
            } else {
                None
            }
        } else {
            None
        };
        let import_clause = self.finish(
            clause_start,
            NodeKind::ImportClause { is_type_only, name: default_name, named_bindings },
        );
        self.expect(K::FromKeyword, "`from`");
        let specifier = self.parse_string_literal();
        self.parse_semicolon();
        self.finish(start, NodeKind::ImportDecl { import_clause: Some(import_clause), specifier })
    }

    fn parse_named_imports(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.expect(K::OpenBrace, "`{`");
        let mut elements = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            let spec_start = self.token.span.start;
            let is_type_only = self.at(K::TypeKeyword)
                && self.look_ahead(|p| {
                    p.next();
                    p.at_ident() && !p.at(K::AsKeyword)
                        || (p.at(K::AsKeyword) && p.next_token_is(K::AsKeyword))
                });
            if is_type_only {
                self.next();
            }
            let first = self.parse_member_name();
            let (property_name, name) = if self.eat(K::AsKeyword) {
                (Some(first), self.parse_identifier())
            } else {
                (None, first)
            };
            elements.push(self.finish(
                spec_start,
                NodeKind::ImportSpecifier { is_type_only, property_name, name },
            ));
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::CloseBrace, "`}`");
        self.finish(start, NodeKind::NamedImports { elements })
    }

    fn parse_export_statement(&mut self) -> NodeId {
        let start = self.token.span.start;
        // `export` as a modifier of a following declaration?
        let followed_by_declaration = self.look_ahead(|p| {
            p.next();
            loop {
                match p.token.kind {
                    K::DeclareKeyword | K::AsyncKeyword | K::AbstractKeyword => p.next(),
                    _ => break,
                }
            }
            p.starts_declaration_keyword()
                || (p.at(K::ImportKeyword)
                    && p.look_ahead(|q| {
                        q.next();
                        q.at_ident() && q.next_token_is(K::Equals)
                    }))
        });
        if followed_by_declaration {
            let mut modifiers = Modifiers::default();
            modifiers.flags |= modifier_flags::EXPORT;
            modifiers.spans.push((modifier_flags::EXPORT, self.token.span));
            self.next();
            loop {
                match self.token.kind {
                    K::DeclareKeyword => {
                        modifiers.flags |= modifier_flags::DECLARE;
                        modifiers.spans.push((modifier_flags::DECLARE, self.token.span));
                        self.next();
                    }
                    K::AsyncKeyword => {
                        modifiers.flags |= modifier_flags::ASYNC;
                        modifiers.spans.push((modifier_flags::ASYNC, self.token.span));
                        self.next();
                    }
                    K::AbstractKeyword => {
                        modifiers.flags |= modifier_flags::ABSTRACT;
                        modifiers.spans.push((modifier_flags::ABSTRACT, self.token.span));
                        self.next();
                    }
                    _ => break,
                }
            }
            if self.at(K::ImportKeyword) {
                // `export import X = A.B.C;`
                let decl = self.parse_import_statement();
                if let NodeKind::ImportEqualsDecl { modifiers: m, .. } =
                    &mut self.arena_node_mut(decl).kind
                {
                    m.flags |= modifier_flags::EXPORT;
                    m.spans.push((modifier_flags::EXPORT, Span::new(start, start + 6)));
                }
                return decl;
            }
            return self.parse_declaration(modifiers);
        }

        self.next(); // export
        let mut modifiers = Modifiers::default();
        modifiers.flags |= modifier_flags::EXPORT;
        modifiers.spans.push((modifier_flags::EXPORT, Span::new(start, start + 6)));

        if self.eat(K::Equals) {
            let expr = self.parse_expression();
            self.parse_semicolon();
            return self.finish(start, NodeKind::ExportAssignment { is_default: false, expr });
        }
        if self.eat(K::DefaultKeyword) {
            let expr = self.parse_assignment_expression();
            self.parse_semicolon();
            return self.finish(start, NodeKind::ExportAssignment { is_default: true, expr });
        }

        let is_type_only = self.at(K::TypeKeyword)
            && self.look_ahead(|p| {
                p.next();
                p.at(K::OpenBrace) || p.at(K::Asterisk)
            });
        if is_type_only {
            self.next();
        }

        if self.at(K::Asterisk) {
            let clause_start = self.token.span.start;
            self.next();
            let export_clause = if self.eat(K::AsKeyword) {
                let name = self.parse_identifier();
                Some(self.finish(clause_start, NodeKind::NamespaceExport { name }))
            } else {
                None
            };
            self.expect(K::FromKeyword, "`from`");
            let specifier = Some(self.parse_string_literal());
            self.parse_semicolon();
            return self.finish(
                start,
                NodeKind::ExportDecl { modifiers, is_type_only, export_clause, specifier },
            );
        }

        // `export { ... }` with optional `from`
        let clause_start = self.token.span.start;
        self.expect(K::OpenBrace, "`{`");
        let mut elements = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            let spec_start = self.token.span.start;
            let spec_type_only = self.at(K::TypeKeyword) && !self.next_token_is(K::CloseBrace)
                && !self.next_token_is(K::Comma)
                && !self.next_token_is(K::AsKeyword);
            if spec_type_only {
                self.next();
            }
            let first = self.parse_member_name();
            let (property_name, name) = if self.eat(K::AsKeyword) {
                (Some(first), self.parse_member_name())
            } else {
                (None, first)
            };
            elements.push(self.finish(
                spec_start,
                NodeKind::ExportSpecifier { is_type_only: spec_type_only, property_name, name },
            ));
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::CloseBrace, "`}`");
        let export_clause = Some(self.finish(clause_start, NodeKind::NamedExports { elements }));
        let specifier =
            if self.eat(K::FromKeyword) { Some(self.parse_string_literal()) } else { None };
        self.parse_semicolon();
        self.finish(start, NodeKind::ExportDecl { modifiers, is_type_only, export_clause, specifier })
    }

    fn arena_node_mut(&mut self, id: NodeId) -> &mut crate::ast::Node {
        // Narrow accessor used only for post-hoc modifier fixup above.
        self.arena.node_mut(id)
    }

    // ===== Parameters and type parameters =====

    fn parse_type_parameters(&mut self) -> Vec<NodeId> {
        let mut params = Vec::new();
        if !self.eat(K::LessThan) {
            return params;
        }
        while !self.at(K::GreaterThan) && !self.at(K::EndOfFile) {
            let start = self.token.span.start;
            // in/out variance modifiers
            while self.at(K::InKeyword) || self.at(K::OfKeyword) {
                self.next();
            }
            let name = self.parse_identifier();
            let constraint =
                if self.eat(K::ExtendsKeyword) { Some(self.parse_type()) } else { None };
            let default = if self.eat(K::Equals) { Some(self.parse_type()) } else { None };
            params.push(self.finish(start, NodeKind::TypeParam { name, constraint, default }));
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::GreaterThan, "`>`");
        params
    }

    fn parse_parameter_list(&mut self) -> Vec<NodeId> {
        let mut params = Vec::new();
        if !self.expect(K::OpenParen, "`(`") {
            return params;
        }
        while !self.at(K::CloseParen) && !self.at(K::EndOfFile) {
            params.push(self.parse_parameter());
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::CloseParen, "`)`");
        params
    }

    fn parse_parameter(&mut self) -> NodeId {
        let modifiers = self.parse_modifiers();
        let start = self.modifiers_start(&modifiers);
        let dotdotdot = self.eat(K::DotDotDot);
        let name = if self.at(K::ThisKeyword) {
            let this_start = self.token.span.start;
            self.next();
            self.finish(this_start, NodeKind::Ident { text: "this".to_string() })
        } else {
            self.parse_binding_name()
        };
        let optional = self.eat(K::Question);
        let ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
        let initializer =
            if self.eat(K::Equals) { Some(self.parse_assignment_expression()) } else { None };
        self.finish(
            start,
            NodeKind::Param { modifiers, dotdotdot, name, optional, ty, initializer },
        )
    }

    // ===== Types =====

    pub fn parse_type(&mut self) -> NodeId {
        // Function / constructor types first: `<T>(..) => R`, `(..) => R`,
        // `new (..) => R`, `abstract new (..) => R`.
        if self.at(K::LessThan) {
            return self.parse_function_type(false);
        }
        if self.at(K::NewKeyword)
            || (self.at(K::AbstractKeyword) && self.next_token_is(K::NewKeyword))
        {
            return self.parse_constructor_type();
        }
        if self.at(K::OpenParen) {
            if let Some(ty) = self.try_parse(|p| {
                let ty = p.parse_function_type(true);
                if matches!(p.arena.kind(ty), NodeKind::FunctionType { .. }) {
                    Some(ty)
                } else {
                    None
                }
            }) {
                return ty;
            }
        }
        let ty = self.parse_union_type();
        if self.at(K::ExtendsKeyword) && !self.token.preceded_by_line_break {
            let start = self.arena.span(ty).start;
            self.next();
            let extends_ty = self.parse_union_type();
            self.expect(K::Question, "`?`");
            let true_ty = self.parse_type();
            self.expect(K::Colon, "`:`");
            let false_ty = self.parse_type();
            return self.finish(
                start,
                NodeKind::ConditionalType { check: ty, extends_ty, true_ty, false_ty },
            );
        }
        ty
    }

    fn parse_function_type(&mut self, must_be_function: bool) -> NodeId {
        let start = self.token.span.start;
        let type_params = self.parse_type_parameters();
        let params = self.parse_parameter_list();
        if must_be_function && !self.at(K::EqualsGreaterThan) {
            // Not a function type after all; produce a paren type from the
            // first parameter if possible. The caller backtracks via try_parse.
            return self.finish(start, NodeKind::ThisType);
        }
        self.expect(K::EqualsGreaterThan, "`=>`");
        let return_ty = self.parse_type_or_predicate();
        self.finish(start, NodeKind::FunctionType { type_params, params, return_ty })
    }

    fn parse_constructor_type(&mut self) -> NodeId {
        let start = self.token.span.start;
        let is_abstract = self.eat(K::AbstractKeyword);
        self.expect(K::NewKeyword, "`new`");
        let type_params = self.parse_type_parameters();
        let params = self.parse_parameter_list();
        self.expect(K::EqualsGreaterThan, "`=>`");
        let return_ty = self.parse_type();
        self.finish(start, NodeKind::ConstructorType { is_abstract, type_params, params, return_ty })
    }

    /// Return-type position: allows `x is T` and `asserts x is T`.
    fn parse_type_or_predicate(&mut self) -> NodeId {
        let start = self.token.span.start;
        if self.token_text() == "asserts"
            && self.look_ahead(|p| {
                p.next();
                (p.at_ident() || p.at(K::ThisKeyword)) && !p.token.preceded_by_line_break
            })
        {
            self.next();
            let param = if self.at(K::ThisKeyword) {
                let this_start = self.token.span.start;
                self.next();
                self.finish(this_start, NodeKind::ThisType)
            } else {
                self.parse_identifier()
            };
            let ty = if self.eat(K::IsKeyword) { Some(self.parse_type()) } else { None };
            return self.finish(start, NodeKind::TypePredicate { asserts: true, param, ty });
        }
        if (self.at_ident() || self.at(K::ThisKeyword)) && self.next_token_is(K::IsKeyword) {
            let param = if self.at(K::ThisKeyword) {
                let this_start = self.token.span.start;
                self.next();
                self.finish(this_start, NodeKind::ThisType)
            } else {
                self.parse_identifier()
            };
            self.next(); // is
            let ty = Some(self.parse_type());
            return self.finish(start, NodeKind::TypePredicate { asserts: false, param, ty });
        }
        self.parse_type()
    }

    fn parse_union_type(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.eat(K::Bar); // leading `|`
        let first = self.parse_intersection_type();
        if !self.at(K::Bar) {
            return first;
        }
        let mut types = vec![first];
        while self.eat(K::Bar) {
            types.push(self.parse_intersection_type());
        }
        self.finish(start, NodeKind::UnionType { types })
    }

    fn parse_intersection_type(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.eat(K::Ampersand); // leading `&`
        let first = self.parse_type_operator();
        if !self.at(K::Ampersand) {
            return first;
        }
        let mut types = vec![first];
        while self.eat(K::Ampersand) {
            types.push(self.parse_type_operator());
        }
        self.finish(start, NodeKind::IntersectionType { types })
    }

    fn parse_type_operator(&mut self) -> NodeId {
        let start = self.token.span.start;
        match self.token.kind {
            K::KeyOfKeyword | K::UniqueKeyword | K::ReadonlyKeyword => {
                let op = self.token.kind;
                self.next();
                let ty = self.parse_type_operator();
                self.finish(start, NodeKind::TypeOperator { op, ty })
            }
            // `infer` is scanned as an identifier; check text.
            _ if self.token_text() == "infer" => {
                self.next();
                let name = self.parse_identifier();
                let tp_start = self.arena.span(name).start;
                let type_param = self.finish(
                    tp_start,
                    NodeKind::TypeParam { name, constraint: None, default: None },
                );
                self.finish(start, NodeKind::InferType { type_param })
            }
            _ => self.parse_postfix_type(),
        }
    }

    fn parse_postfix_type(&mut self) -> NodeId {
        let start = self.token.span.start;
        let mut ty = self.parse_primary_type();
        loop {
            if self.at(K::OpenBracket) && !self.token.preceded_by_line_break {
                self.next();
                if self.at(K::CloseBracket) {
                    self.next();
                    ty = self.finish(start, NodeKind::ArrayType { elem: ty });
                } else {
                    let index = self.parse_type();
                    self.expect(K::CloseBracket, "`]`");
                    ty = self.finish(start, NodeKind::IndexedAccessType { obj: ty, index });
                }
            } else {
                return ty;
            }
        }
    }

    fn parse_primary_type(&mut self) -> NodeId {
        let start = self.token.span.start;
        match self.token.kind {
            K::OpenParen => {
                self.next();
                let ty = self.parse_type();
                self.expect(K::CloseParen, "`)`");
                self.finish(start, NodeKind::ParenType { ty })
            }
            K::OpenBrace => self.parse_type_literal_or_mapped(),
            K::OpenBracket => {
                self.next();
                let mut elems = Vec::new();
                while !self.at(K::CloseBracket) && !self.at(K::EndOfFile) {
                    elems.push(self.parse_tuple_element());
                    if !self.eat(K::Comma) {
                        break;
                    }
                }
                self.expect(K::CloseBracket, "`]`");
                self.finish(start, NodeKind::TupleType { elems })
            }
            K::TypeOfKeyword => {
                self.next();
                if self.at(K::ImportKeyword) {
                    return self.parse_import_type(start, true);
                }
                let expr_name = self.parse_entity_name();
                self.finish(start, NodeKind::TypeQuery { expr_name })
            }
            K::ImportKeyword => self.parse_import_type(start, false),
            K::StringLiteral => {
                let lit = self.parse_string_literal();
                self.finish(start, NodeKind::LiteralType { lit })
            }
            K::NumericLiteral => {
                self.next();
                let lit = self.finish(start, NodeKind::NumericLit);
                self.finish(start, NodeKind::LiteralType { lit })
            }
            K::Minus => {
                self.next();
                self.expect(K::NumericLiteral, "number");
                let lit = self.finish(start, NodeKind::NumericLit);
                self.finish(start, NodeKind::LiteralType { lit })
            }
            K::TrueKeyword | K::FalseKeyword => {
                let value = self.at(K::TrueKeyword);
                self.next();
                let lit = self.finish(start, NodeKind::BoolLit { value });
                self.finish(start, NodeKind::LiteralType { lit })
            }
            K::NullKeyword => {
                self.next();
                let lit = self.finish(start, NodeKind::NullLit);
                self.finish(start, NodeKind::LiteralType { lit })
            }
            K::VoidKeyword => {
                self.next();
                self.finish(start, NodeKind::Ident { text: "void".to_string() })
            }
            K::ThisKeyword => {
                self.next();
                self.finish(start, NodeKind::ThisType)
            }
            K::NoSubstitutionTemplateLiteral => {
                self.next();
                self.finish(start, NodeKind::TemplateLiteralType { substitutions: Vec::new() })
            }
            K::TemplateHead => {
                let substitutions = self.parse_template_substitutions(|p| p.parse_type());
                self.finish(start, NodeKind::TemplateLiteralType { substitutions })
            }
            _ => {
                let name = self.parse_entity_name();
                let type_args = self.parse_type_arguments_if_present();
                self.finish(start, NodeKind::TypeRef { name, type_args })
            }
        }
    }

    fn parse_tuple_element(&mut self) -> NodeId {
        let start = self.token.span.start;
        if self.at(K::DotDotDot) {
            // `...T` or `...name: T`
            if self.at_ident() && self.next_token_is(K::Colon) {
                return self.parse_named_tuple_member();
            }
            self.next();
            let ty = self.parse_type();
            return self.finish(start, NodeKind::RestType { ty });
        }
        if (self.at_ident() || self.token.kind.is_keyword())
            && self.look_ahead(|p| {
                p.next();
                p.at(K::Colon) || (p.at(K::Question) && p.next_token_is(K::Colon))
            })
        {
            return self.parse_named_tuple_member();
        }
        let ty = self.parse_type();
        if self.eat(K::Question) {
            return self.finish(start, NodeKind::OptionalType { ty });
        }
        ty
    }

    fn parse_named_tuple_member(&mut self) -> NodeId {
        let start = self.token.span.start;
        let dotdotdot = self.eat(K::DotDotDot);
        let name = self.parse_member_name();
        let optional = self.eat(K::Question);
        self.expect(K::Colon, "`:`");
        let ty = self.parse_type();
        self.finish(start, NodeKind::NamedTupleMember { name, dotdotdot, optional, ty })
    }

    fn parse_import_type(&mut self, start: u32, is_typeof: bool) -> NodeId {
        self.expect(K::ImportKeyword, "`import`");
        self.expect(K::OpenParen, "`(`");
        let spec_node = self.parse_string_literal();
        let specifier = self.arena.string_value(spec_node).unwrap_or_default().to_string();
        self.expect(K::CloseParen, "`)`");
        let qualifier = if self.eat(K::Dot) { Some(self.parse_entity_name()) } else { None };
        let type_args = self.parse_type_arguments_if_present();
        self.finish(start, NodeKind::ImportType { specifier, qualifier, type_args, is_typeof })
    }

    fn parse_type_literal_or_mapped(&mut self) -> NodeId {
        let start = self.token.span.start;
        // Mapped type: `{ [K in T] ... }` possibly with +/- readonly prefix.
        let is_mapped = self.look_ahead(|p| {
            p.next(); // {
            if p.at(K::Plus) || p.at(K::Minus) {
                p.next();
            }
            if p.at(K::ReadonlyKeyword) {
                p.next();
            }
            if !p.at(K::OpenBracket) {
                return false;
            }
            p.next();
            if !p.at_ident() {
                return false;
            }
            p.next();
            p.at(K::InKeyword)
        });
        if is_mapped {
            return self.parse_mapped_type();
        }
        self.next(); // {
        let mut members = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            let before = self.token.span.start;
            members.push(self.parse_type_member());
            if self.token.span.start == before {
                self.next();
            }
        }
        self.expect(K::CloseBrace, "`}`");
        self.finish(start, NodeKind::TypeLiteral { members })
    }

    fn parse_mapped_type(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next(); // {
        if self.at(K::Plus) || self.at(K::Minus) {
            self.next();
        }
        let readonly_token = self.eat(K::ReadonlyKeyword);
        self.expect(K::OpenBracket, "`[`");
        let tp_start = self.token.span.start;
        let name = self.parse_identifier();
        self.expect(K::InKeyword, "`in`");
        let constraint = Some(self.parse_type());
        let type_param =
            self.finish(tp_start, NodeKind::TypeParam { name, constraint, default: None });
        let name_ty = if self.eat(K::AsKeyword) { Some(self.parse_type()) } else { None };
        self.expect(K::CloseBracket, "`]`");
        if self.at(K::Plus) || self.at(K::Minus) {
            self.next();
        }
        let question_token = self.eat(K::Question);
        let ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
        self.eat(K::Semicolon);
        self.expect(K::CloseBrace, "`}`");
        self.finish(
            start,
            NodeKind::MappedType { readonly_token, type_param, name_ty, question_token, ty },
        )
    }

    fn parse_type_member_block(&mut self) -> Vec<NodeId> {
        self.expect(K::OpenBrace, "`{`");
        let mut members = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            let before = self.token.span.start;
            members.push(self.parse_type_member());
            if self.token.span.start == before {
                self.next();
            }
        }
        self.expect(K::CloseBrace, "`}`");
        members
    }

    fn parse_type_member(&mut self) -> NodeId {
        let start = self.token.span.start;
        if self.at(K::OpenParen) || self.at(K::LessThan) {
            let type_params = self.parse_type_parameters();
            let params = self.parse_parameter_list();
            let return_ty = if self.eat(K::Colon) { Some(self.parse_type_or_predicate()) } else { None };
            self.eat_member_separator();
            return self.finish(start, NodeKind::CallSignature { type_params, params, return_ty });
        }
        if self.at(K::NewKeyword)
            && self.look_ahead(|p| {
                p.next();
                p.at(K::OpenParen) || p.at(K::LessThan)
            })
        {
            self.next();
            let type_params = self.parse_type_parameters();
            let params = self.parse_parameter_list();
            let return_ty = if self.eat(K::Colon) { Some(self.parse_type_or_predicate()) } else { None };
            self.eat_member_separator();
            return self.finish(
                start,
                NodeKind::ConstructSignature { type_params, params, return_ty },
            );
        }

        let modifiers = self.parse_modifiers();

        if self.at(K::OpenBracket)
            && self.look_ahead(|p| {
                p.next();
                p.at_ident() && p.next_token_is(K::Colon)
            })
        {
            self.next(); // [
            let param = self.parse_parameter();
            self.expect(K::CloseBracket, "`]`");
            let ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
            self.eat_member_separator();
            return self.finish(start, NodeKind::IndexSignature { modifiers, param, ty });
        }

        if (self.at(K::GetKeyword) || self.at(K::SetKeyword))
            && self.look_ahead(|p| {
                p.next();
                p.at_ident() || p.token.kind.is_keyword() || p.at(K::StringLiteral)
                    || p.at(K::NumericLiteral) || p.at(K::OpenBracket)
            })
        {
            let is_get = self.at(K::GetKeyword);
            self.next();
            let name = self.parse_property_name();
            let params = self.parse_parameter_list();
            let return_ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
            self.eat_member_separator();
            return if is_get {
                self.finish(
                    start,
                    NodeKind::GetAccessor { modifiers, name, params, return_ty, body: None },
                )
            } else {
                self.finish(start, NodeKind::SetAccessor { modifiers, name, params, body: None })
            };
        }

        let name = self.parse_property_name();
        let optional = self.eat(K::Question);
        if self.at(K::OpenParen) || self.at(K::LessThan) {
            let type_params = self.parse_type_parameters();
            let params = self.parse_parameter_list();
            let return_ty = if self.eat(K::Colon) { Some(self.parse_type_or_predicate()) } else { None };
            self.eat_member_separator();
            return self.finish(
                start,
                NodeKind::MethodSignature { modifiers, name, optional, type_params, params, return_ty },
            );
        }
        let ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
        self.eat_member_separator();
        self.finish(start, NodeKind::PropertySignature { modifiers, name, optional, ty })
    }

    fn eat_member_separator(&mut self) {
        if !self.eat(K::Semicolon) {
            self.eat(K::Comma);
        }
    }

    fn parse_type_arguments_if_present(&mut self) -> Vec<NodeId> {
        if !self.at(K::LessThan) {
            return Vec::new();
        }
        self.next();
        let mut args = Vec::new();
        while !self.at(K::GreaterThan) && !self.at(K::EndOfFile) {
            args.push(self.parse_type());
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::GreaterThan, "`>`");
        args
    }

    // ===== Expressions =====

    pub fn parse_expression(&mut self) -> NodeId {
        let start = self.token.span.start;
        let mut expr = self.parse_assignment_expression();
        while self.at(K::Comma) {
            self.next();
            let right = self.parse_assignment_expression();
            expr = self.finish(start, NodeKind::Binary { left: expr, op: K::Comma, right });
        }
        expr
    }

    fn parse_assignment_expression(&mut self) -> NodeId {
        // Arrow functions first.
        if let Some(arrow) = self.try_parse_arrow_function() {
            return arrow;
        }
        if self.at(K::YieldKeyword) {
            let start = self.token.span.start;
            self.next();
            let delegate = self.eat(K::Asterisk);
            let expr = if self.can_start_expression() && !self.token.preceded_by_line_break {
                Some(self.parse_assignment_expression())
            } else {
                None
            };
            return self.finish(start, NodeKind::Yield { delegate, expr });
        }
        let start = self.token.span.start;
        let expr = self.parse_conditional_expression();
        if self.token.kind.is_assignment_operator() {
            let op = self.token.kind;
            self.next();
            let right = self.parse_assignment_expression();
            return self.finish(start, NodeKind::Binary { left: expr, op, right });
        }
        expr
    }

    fn try_parse_arrow_function(&mut self) -> Option<NodeId> {
        let is_async = self.at(K::AsyncKeyword)
            && self.look_ahead(|p| {
                p.next();
                !p.token.preceded_by_line_break
                    && (p.at(K::OpenParen) || p.at(K::LessThan)
                        || (p.at_ident() && p.next_token_is(K::EqualsGreaterThan)))
            });

        // `x => ...`
        if !is_async && self.at_ident() && self.next_token_is(K::EqualsGreaterThan) {
            let start = self.token.span.start;
            let param_start = self.token.span.start;
            let name = self.parse_identifier();
            let param = self.finish(
                param_start,
                NodeKind::Param {
                    modifiers: Modifiers::default(),
                    dotdotdot: false,
                    name,
                    optional: false,
                    ty: None,
                    initializer: None,
                },
            );
            self.next(); // =>
            let body = self.parse_arrow_body();
            return Some(self.finish(
                start,
                NodeKind::ArrowFunction {
                    modifiers: Modifiers::default(),
                    type_params: Vec::new(),
                    params: vec![param],
                    return_ty: None,
                    body,
                },
            ));
        }

        if !(self.at(K::OpenParen) || self.at(K::LessThan) || is_async) {
            return None;
        }

        self.try_parse(|p| {
            let start = p.token.span.start;
            let mut modifiers = Modifiers::default();
            if is_async {
                modifiers.flags |= modifier_flags::ASYNC;
                modifiers.spans.push((modifier_flags::ASYNC, p.token.span));
                p.next();
                if p.at_ident() && p.next_token_is(K::EqualsGreaterThan) {
                    let param_start = p.token.span.start;
                    let name = p.parse_identifier();
                    let param = p.finish(
                        param_start,
                        NodeKind::Param {
                            modifiers: Modifiers::default(),
                            dotdotdot: false,
                            name,
                            optional: false,
                            ty: None,
                            initializer: None,
                        },
                    );
                    p.next(); // =>
                    let body = p.parse_arrow_body();
                    return Some(p.finish(
                        start,
                        NodeKind::ArrowFunction {
                            modifiers,
                            type_params: Vec::new(),
                            params: vec![param],
                            return_ty: None,
                            body,
                        },
                    ));
                }
            }
            if !(p.at(K::OpenParen) || p.at(K::LessThan)) {
                return None;
            }
            let type_params =
                if p.at(K::LessThan) { p.parse_type_parameters() } else { Vec::new() };
            if !p.at(K::OpenParen) {
                return None;
            }
            let diag_count = p.diagnostics.len();
            let params = p.parse_parameter_list();
            if p.diagnostics.len() != diag_count {
                return None;
            }
            let return_ty =
                if p.eat(K::Colon) { Some(p.parse_type_or_predicate()) } else { None };
            if p.diagnostics.len() != diag_count {
                return None;
            }
            if !p.at(K::EqualsGreaterThan) || p.token.preceded_by_line_break {
                return None;
            }
            p.next(); // =>
            let body = p.parse_arrow_body();
            Some(p.finish(
                start,
                NodeKind::ArrowFunction { modifiers, type_params, params, return_ty, body },
            ))
        })
    }

    fn parse_arrow_body(&mut self) -> NodeId {
        if self.at(K::OpenBrace) {
            self.parse_block()
        } else {
            self.parse_assignment_expression()
        }
    }

    fn parse_conditional_expression(&mut self) -> NodeId {
        let start = self.token.span.start;
        let cond = self.parse_binary_expression(0);
        if self.at(K::Question) {
            self.next();
            let when_true = self.parse_assignment_expression();
            self.expect(K::Colon, "`:`");
            let when_false = self.parse_assignment_expression();
            return self.finish(start, NodeKind::Conditional { cond, when_true, when_false });
        }
        cond
    }

    fn parse_binary_expression(&mut self, min_precedence: u8) -> NodeId {
        let start = self.token.span.start;
        let mut left = self.parse_unary_expression();
        loop {
            // `as` / `satisfies` bind like relational operators.
            if (self.at(K::AsKeyword) || self.at(K::SatisfiesKeyword))
                && !self.token.preceded_by_line_break
            {
                let is_as = self.at(K::AsKeyword);
                self.next();
                let ty = self.parse_type();
                left = if is_as {
                    self.finish(start, NodeKind::AsExpr { expr: left, ty })
                } else {
                    self.finish(start, NodeKind::SatisfiesExpr { expr: left, ty })
                };
                continue;
            }
            if self.at(K::InKeyword) && self.no_in {
                return left;
            }
            let Some(precedence) = binary_precedence(self.token.kind) else {
                return left;
            };
            if precedence < min_precedence {
                return left;
            }
            let op = self.token.kind;
            self.next();
            let right = self.parse_binary_expression(precedence + 1);
            left = self.finish(start, NodeKind::Binary { left, op, right });
        }
    }

    fn parse_unary_expression(&mut self) -> NodeId {
        let start = self.token.span.start;
        match self.token.kind {
            K::Plus | K::Minus | K::Tilde | K::Exclamation | K::PlusPlus | K::MinusMinus => {
                let op = self.token.kind;
                self.next();
                let operand = self.parse_unary_expression();
                self.finish(start, NodeKind::Prefix { op, operand })
            }
            K::TypeOfKeyword => {
                self.next();
                let expr = self.parse_unary_expression();
                self.finish(start, NodeKind::TypeOfExpr { expr })
            }
            K::VoidKeyword => {
                self.next();
                let expr = self.parse_unary_expression();
                self.finish(start, NodeKind::VoidExpr { expr })
            }
            K::DeleteKeyword => {
                self.next();
                let expr = self.parse_unary_expression();
                self.finish(start, NodeKind::DeleteExpr { expr })
            }
            K::AwaitKeyword => {
                self.next();
                let expr = self.parse_unary_expression();
                self.finish(start, NodeKind::Await { expr })
            }
            K::LessThan => {
                // `<T>expr` type assertion
                self.next();
                let ty = self.parse_type();
                self.expect(K::GreaterThan, "`>`");
                let expr = self.parse_unary_expression();
                self.finish(start, NodeKind::AngleAssertion { ty, expr })
            }
            _ => self.parse_postfix_expression(),
        }
    }

    fn parse_postfix_expression(&mut self) -> NodeId {
        let start = self.token.span.start;
        let expr = self.parse_left_hand_side_expression();
        if (self.at(K::PlusPlus) || self.at(K::MinusMinus)) && !self.token.preceded_by_line_break {
            let op = self.token.kind;
            self.next();
            return self.finish(start, NodeKind::Postfix { op, operand: expr });
        }
        expr
    }

    fn parse_left_hand_side_expression(&mut self) -> NodeId {
        let start = self.token.span.start;
        let mut expr = self.parse_primary_expression();
        loop {
            match self.token.kind {
                K::Dot => {
                    self.next();
                    let name = self.parse_member_name();
                    expr = self.finish(
                        start,
                        NodeKind::PropertyAccess { expr, question_dot: false, name },
                    );
                }
                K::QuestionDot => {
                    self.next();
                    if self.at(K::OpenParen) {
                        let args = self.parse_call_arguments();
                        expr = self.finish(
                            start,
                            NodeKind::Call { expr, question_dot: true, type_args: Vec::new(), args },
                        );
                    } else if self.at(K::OpenBracket) {
                        self.next();
                        let arg = self.parse_expression();
                        self.expect(K::CloseBracket, "`]`");
                        expr = self.finish(
                            start,
                            NodeKind::ElementAccess { expr, question_dot: true, arg },
                        );
                    } else {
                        let name = self.parse_member_name();
                        expr = self.finish(
                            start,
                            NodeKind::PropertyAccess { expr, question_dot: true, name },
                        );
                    }
                }
                K::OpenBracket => {
                    self.next();
                    let arg = self.parse_expression();
                    self.expect(K::CloseBracket, "`]`");
                    expr = self
                        .finish(start, NodeKind::ElementAccess { expr, question_dot: false, arg });
                }
                K::OpenParen => {
                    let args = self.parse_call_arguments();
                    expr = self.finish(
                        start,
                        NodeKind::Call { expr, question_dot: false, type_args: Vec::new(), args },
                    );
                }
                K::Exclamation if !self.token.preceded_by_line_break => {
                    self.next();
                    expr = self.finish(start, NodeKind::NonNull { expr });
                }
                K::NoSubstitutionTemplateLiteral | K::TemplateHead => {
                    let template = self.parse_template_expression();
                    expr = self.finish(start, NodeKind::TaggedTemplate { tag: expr, template });
                }
                K::LessThan => {
                    // Possible generic call: `f<T>(...)`.
                    let call = self.try_parse(|p| {
                        p.next();
                        let mut type_args = Vec::new();
                        let diag_count = p.diagnostics.len();
                        while !p.at(K::GreaterThan) && !p.at(K::EndOfFile) {
                            type_args.push(p.parse_type());
                            if !p.eat(K::Comma) {
                                break;
                            }
                        }
                        if p.diagnostics.len() != diag_count || !p.eat(K::GreaterThan) {
                            return None;
                        }
                        if p.at(K::OpenParen) {
                            let args = p.parse_call_arguments();
                            return Some(p.finish(
                                start,
                                NodeKind::Call { expr, question_dot: false, type_args, args },
                            ));
                        }
                        None
                    });
                    match call {
                        Some(call) => expr = call,
                        None => return expr,
                    }
                }
                _ => return expr,
            }
        }
    }

    fn parse_call_arguments(&mut self) -> Vec<NodeId> {
        self.expect(K::OpenParen, "`(`");
        let mut args = Vec::new();
        while !self.at(K::CloseParen) && !self.at(K::EndOfFile) {
            if self.at(K::DotDotDot) {
                let spread_start = self.token.span.start;
                self.next();
                let inner = self.parse_assignment_expression();
                args.push(self.finish(spread_start, NodeKind::Spread { expr: inner }));
            } else {
                args.push(self.parse_assignment_expression());
            }
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::CloseParen, "`)`");
        args
    }

    fn parse_primary_expression(&mut self) -> NodeId {
        let start = self.token.span.start;
        let kind = self.token.kind;
        match kind {
            K::NumericLiteral => {
                self.next();
                self.finish(start, NodeKind::NumericLit)
            }
            K::StringLiteral => self.parse_string_literal(),
            K::NoSubstitutionTemplateLiteral | K::TemplateHead => self.parse_template_expression(),
            K::Slash | K::SlashEquals => {
                let regex = self.scanner.rescan_slash_as_regex(self.token);
                self.token = regex;
                self.next();
                self.finish(start, NodeKind::RegexLit)
            }
            K::TrueKeyword | K::FalseKeyword => {
                let value = self.at(K::TrueKeyword);
                self.next();
                self.finish(start, NodeKind::BoolLit { value })
            }
            K::NullKeyword => {
                self.next();
                self.finish(start, NodeKind::NullLit)
            }
            K::ThisKeyword => {
                self.next();
                self.finish(start, NodeKind::ThisExpr)
            }
            K::SuperKeyword => {
                self.next();
                self.finish(start, NodeKind::SuperExpr)
            }
            K::OpenParen => {
                self.next();
                let saved_no_in = self.no_in;
                self.no_in = false;
                let expr = self.parse_expression();
                self.no_in = saved_no_in;
                self.expect(K::CloseParen, "`)`");
                self.finish(start, NodeKind::Paren { expr })
            }
            K::OpenBracket => {
                self.next();
                let mut elements = Vec::new();
                while !self.at(K::CloseBracket) && !self.at(K::EndOfFile) {
                    if self.at(K::Comma) {
                        let hole_start = self.token.span.start;
                        self.next();
                        elements.push(self.finish(hole_start, NodeKind::OmittedExpr));
                        continue;
                    }
                    if self.at(K::DotDotDot) {
                        let spread_start = self.token.span.start;
                        self.next();
                        let inner = self.parse_assignment_expression();
                        elements.push(self.finish(spread_start, NodeKind::Spread { expr: inner }));
                    } else {
                        elements.push(self.parse_assignment_expression());
                    }
                    if !self.eat(K::Comma) {
                        break;
                    }
                }
                self.expect(K::CloseBracket, "`]`");
                self.finish(start, NodeKind::ArrayLit { elements })
            }
            K::OpenBrace => self.parse_object_literal(),
            K::FunctionKeyword => self.parse_function_expression(Modifiers::default()),
            K::AsyncKeyword if self.next_token_is(K::FunctionKeyword) => {
                let mut modifiers = Modifiers::default();
                modifiers.flags |= modifier_flags::ASYNC;
                modifiers.spans.push((modifier_flags::ASYNC, self.token.span));
                self.next();
                self.parse_function_expression(modifiers)
            }
            K::ClassKeyword => {
                self.next();
                let name = if self.at_ident() { Some(self.parse_identifier()) } else { None };
                let type_params = self.parse_type_parameters();
                let heritage = self.parse_heritage_clauses();
                let members = self.parse_class_members();
                self.finish(
                    start,
                    NodeKind::ClassExpr {
                        modifiers: Modifiers::default(),
                        name,
                        type_params,
                        heritage,
                        members,
                    },
                )
            }
            K::NewKeyword => {
                self.next();
                if self.at(K::Dot) {
                    // `new.target`
                    self.next();
                    let name = self.parse_member_name();
                    let target = self.finish(start, NodeKind::Ident { text: "new".to_string() });
                    return self.finish(
                        start,
                        NodeKind::PropertyAccess { expr: target, question_dot: false, name },
                    );
                }
                let callee_start = self.token.span.start;
                let mut callee = self.parse_primary_expression();
                // Member chain binds tighter than the `new` arguments.
                loop {
                    if self.eat(K::Dot) {
                        let name = self.parse_member_name();
                        callee = self.finish(
                            callee_start,
                            NodeKind::PropertyAccess { expr: callee, question_dot: false, name },
                        );
                    } else if self.at(K::OpenBracket) {
                        self.next();
                        let arg = self.parse_expression();
                        self.expect(K::CloseBracket, "`]`");
                        callee = self.finish(
                            callee_start,
                            NodeKind::ElementAccess { expr: callee, question_dot: false, arg },
                        );
                    } else {
                        break;
                    }
                }
                let type_args = if self.at(K::LessThan) {
                    self.try_parse(|p| {
                        p.next();
                        let mut args = Vec::new();
                        let diag_count = p.diagnostics.len();
                        while !p.at(K::GreaterThan) && !p.at(K::EndOfFile) {
                            args.push(p.parse_type());
                            if !p.eat(K::Comma) {
                                break;
                            }
                        }
                        if p.diagnostics.len() != diag_count || !p.eat(K::GreaterThan) {
                            return None;
                        }
                        if p.at(K::OpenParen) {
                            Some(args)
                        } else {
                            None
                        }
                    })
                    .unwrap_or_default()
                } else {
                    Vec::new()
                };
                let args =
                    if self.at(K::OpenParen) { Some(self.parse_call_arguments()) } else { None };
                self.finish(start, NodeKind::New { expr: callee, type_args, args })
            }
            K::ImportKeyword => {
                // Dynamic import or `import.meta`.
                self.next();
                let callee = self.finish(start, NodeKind::Ident { text: "import".to_string() });
                if self.eat(K::Dot) {
                    let name = self.parse_member_name();
                    return self.finish(
                        start,
                        NodeKind::PropertyAccess { expr: callee, question_dot: false, name },
                    );
                }
                let args = self.parse_call_arguments();
                self.finish(
                    start,
                    NodeKind::Call { expr: callee, question_dot: false, type_args: Vec::new(), args },
                )
            }
            _ => {
                if self.at_ident() {
                    return self.parse_identifier();
                }
                self.error_here(format!("unexpected token `{}`", self.token_text()));
                let id = self.finish(start, NodeKind::Ident { text: String::new() });
                self.next();
                id
            }
        }
    }

    fn parse_function_expression(&mut self, modifiers: Modifiers) -> NodeId {
        let start = modifiers
            .spans
            .first()
            .map(|(_, s)| s.start)
            .unwrap_or(self.token.span.start);
        self.expect(K::FunctionKeyword, "`function`");
        let asterisk = self.eat(K::Asterisk);
        let name = if self.at_ident() { Some(self.parse_identifier()) } else { None };
        let type_params = self.parse_type_parameters();
        let params = self.parse_parameter_list();
        let return_ty = if self.eat(K::Colon) { Some(self.parse_type_or_predicate()) } else { None };
        let body = self.parse_block();
        self.finish(
            start,
            NodeKind::FunctionExpr { modifiers, asterisk, name, type_params, params, return_ty, body },
        )
    }

    fn parse_object_literal(&mut self) -> NodeId {
        let start = self.token.span.start;
        self.next(); // {
        let mut properties = Vec::new();
        while !self.at(K::CloseBrace) && !self.at(K::EndOfFile) {
            let prop_start = self.token.span.start;
            if self.at(K::DotDotDot) {
                self.next();
                let expr = self.parse_assignment_expression();
                properties.push(self.finish(prop_start, NodeKind::Spread { expr }));
            } else if (self.at(K::GetKeyword) || self.at(K::SetKeyword))
                && self.look_ahead(|p| {
                    p.next();
                    p.at_ident() || p.token.kind.is_keyword() || p.at(K::StringLiteral)
                        || p.at(K::NumericLiteral) || p.at(K::OpenBracket)
                })
            {
                let is_get = self.at(K::GetKeyword);
                self.next();
                let name = self.parse_property_name();
                let params = self.parse_parameter_list();
                let return_ty = if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
                let body = Some(self.parse_block());
                properties.push(if is_get {
                    self.finish(
                        prop_start,
                        NodeKind::GetAccessor {
                            modifiers: Modifiers::default(),
                            name,
                            params,
                            return_ty,
                            body,
                        },
                    )
                } else {
                    self.finish(
                        prop_start,
                        NodeKind::SetAccessor { modifiers: Modifiers::default(), name, params, body },
                    )
                });
            } else {
                let is_async = self.at(K::AsyncKeyword)
                    && self.look_ahead(|p| {
                        p.next();
                        !p.at(K::Colon) && !p.at(K::Comma) && !p.at(K::CloseBrace)
                            && !p.at(K::OpenParen)
                    });
                let mut modifiers = Modifiers::default();
                if is_async {
                    modifiers.flags |= modifier_flags::ASYNC;
                    modifiers.spans.push((modifier_flags::ASYNC, self.token.span));
                    self.next();
                }
                let asterisk = self.eat(K::Asterisk);
                let name = self.parse_property_name();
                if self.at(K::OpenParen) || self.at(K::LessThan) {
                    let type_params = self.parse_type_parameters();
                    let params = self.parse_parameter_list();
                    let return_ty =
                        if self.eat(K::Colon) { Some(self.parse_type()) } else { None };
                    let body = Some(self.parse_block());
                    properties.push(self.finish(
                        prop_start,
                        NodeKind::MethodDecl {
                            modifiers,
                            asterisk,
                            name,
                            optional: false,
                            type_params,
                            params,
                            return_ty,
                            body,
                        },
                    ));
                } else if self.eat(K::Colon) {
                    let initializer = self.parse_assignment_expression();
                    properties.push(
                        self.finish(prop_start, NodeKind::PropertyAssignment { name, initializer }),
                    );
                } else {
                    // Shorthand, possibly `{ x = default }` in destructuring.
                    if self.eat(K::Equals) {
                        let initializer = self.parse_assignment_expression();
                        properties.push(self.finish(
                            prop_start,
                            NodeKind::PropertyAssignment { name, initializer },
                        ));
                    } else {
                        properties
                            .push(self.finish(prop_start, NodeKind::ShorthandProperty { name }));
                    }
                }
            }
            if !self.eat(K::Comma) {
                break;
            }
        }
        self.expect(K::CloseBrace, "`}`");
        self.finish(start, NodeKind::ObjectLit { properties })
    }

    fn parse_template_expression(&mut self) -> NodeId {
        let start = self.token.span.start;
        if self.at(K::NoSubstitutionTemplateLiteral) {
            self.next();
            return self.finish(start, NodeKind::NoSubstitutionTemplate);
        }
        let substitutions = self.parse_template_substitutions(|p| p.parse_expression());
        self.finish(start, NodeKind::TemplateExpr { substitutions })
    }

    /// Shared by template expressions and template literal types: the current
    /// token must be `TemplateHead`; parses `${ ... }` holes until the tail.
    fn parse_template_substitutions(
        &mut self,
        mut parse_hole: impl FnMut(&mut Self) -> NodeId,
    ) -> Vec<NodeId> {
        let mut substitutions = Vec::new();
        self.next(); // TemplateHead
        loop {
            substitutions.push(parse_hole(self));
            if !self.at(K::CloseBrace) {
                self.error_here("expected `}` to continue template".to_string());
                break;
            }
            let rescanned = self.scanner.rescan_template_token(self.token);
            self.token = rescanned;
            match self.token.kind {
                K::TemplateMiddle => {
                    self.next();
                }
                K::TemplateTail => {
                    self.next();
                    break;
                }
                _ => break,
            }
        }
        substitutions
    }

    fn can_start_expression(&self) -> bool {
        match self.token.kind {
            K::Semicolon | K::CloseBrace | K::CloseParen | K::CloseBracket | K::Comma
            | K::EndOfFile | K::Colon => false,
            _ => true,
        }
    }
}

fn binary_precedence(kind: SyntaxKind) -> Option<u8> {
    let precedence = match kind {
        K::QuestionQuestion => 1,
        K::BarBar => 2,
        K::AmpersandAmpersand => 3,
        K::Bar => 4,
        K::Caret => 5,
        K::Ampersand => 6,
        K::EqualsEquals | K::ExclamationEquals | K::EqualsEqualsEquals
        | K::ExclamationEqualsEquals => 7,
        K::LessThan | K::GreaterThan | K::LessThanEquals | K::GreaterThanEquals
        | K::InstanceOfKeyword | K::InKeyword => 8,
        K::LessThanLessThan | K::GreaterThanGreaterThan | K::GreaterThanGreaterThanGreaterThan => 9,
        K::Plus | K::Minus => 10,
        K::Asterisk | K::Slash | K::Percent => 11,
        K::AsteriskAsterisk => 12,
        _ => return None,
    };
    Some(precedence)
}

fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}
