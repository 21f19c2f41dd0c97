//! The recursive-descent parser. One function per node kind, dispatched by
//! a single string-keyed entry point (`parse_statement`'s keyword match).
//! Maintains a `position` cursor over the trivia-filtered token stream and
//! an ordered diagnostic list; decreasing the cursor retracts every
//! diagnostic emitted beyond the new position (`set_position`), which is
//! the sole mechanism guaranteeing committed output only carries committed
//! diagnostics.

use kestrel_common::token::{OperatorPlacement, Token, TokenKind};
use kestrel_common::{Diagnostic, Event, Level, Location, Source};

use crate::grammar::{ACCESSIBILITY_MODIFIERS, FINALITY_MODIFIERS, OTHER_MODIFIERS, SUBSEQUENTIAL_KEYWORDS};
use crate::node::{Field, Node, NodeKind, NodeRange};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    reports: Vec<Diagnostic>,
    events: Vec<Event>,
}

impl Parser {
    /// `tokens` should already be trivia-filtered. A missing trailing `Eof`
    /// is tolerated (and synthesized) so lookahead never runs off the end.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let pos = tokens.last().map(|t| t.position + t.value.len() as u32).unwrap_or(0);
            tokens.push(Token::new(TokenKind::Eof, "", pos, Location::new(1, 1)));
        }
        Self { tokens, position: 0, reports: Vec::new(), events: Vec::new() }
    }

    pub fn reports(&self) -> &[Diagnostic] {
        &self.reports
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn into_reports_and_events(self) -> (Vec<Diagnostic>, Vec<Event>) {
        (self.reports, self.events)
    }

    pub fn parse_module(&mut self) -> Node {
        let start = self.position;
        let statements = self.parse_statements_until(|_| false);
        Node::new(NodeKind::Module, NodeRange::new(start, self.position))
            .with_field("statements", Field::NodeList(statements))
    }

    // ---- cursor / diagnostic plumbing ----

    fn current(&self) -> &Token {
        let idx = self.position.min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn peek_token(&self, n: usize) -> &Token {
        let idx = (self.position + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn at_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        tok
    }

    /// Diagnostic-retracting rollback: moving the cursor backward discards
    /// every recorded diagnostic at or beyond the new position, and records
    /// a `removeAfterPosition` event so a live observer can mirror it.
    fn set_position(&mut self, pos: usize) {
        let pos = pos.min(self.tokens.len() - 1);
        if pos < self.position {
            self.reports.retain(|d| d.position < pos);
            self.events.push(Event::RemoveAfterPosition { position: pos });
        }
        self.position = pos;
    }

    fn report(&mut self, level: Level, message: impl Into<String>) {
        let message = message.into();
        let tok = self.current();
        let position = self.position;
        let location = tok.location;
        self.events.push(Event::Add { level, position, location, message: message.clone() });
        self.reports.push(Diagnostic::new(level, position, location, message));
    }

    /// Fault tolerance: runs `f`; if it misses, rewinds to the position it
    /// started at (which also retracts any diagnostics `f` emitted along
    /// the way) before returning `None`.
    fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let start = self.position;
        match f(self) {
            Some(v) => Some(v),
            None => {
                self.set_position(start);
                None
            }
        }
    }

    fn token_is_symbol(tok: &Token, sym: &str) -> bool {
        match sym {
            "(" => matches!(tok.kind, TokenKind::LParen),
            ")" => matches!(tok.kind, TokenKind::RParen),
            "[" => matches!(tok.kind, TokenKind::LBracket),
            "]" => matches!(tok.kind, TokenKind::RBracket),
            "{" => matches!(tok.kind, TokenKind::LBrace),
            "}" => matches!(tok.kind, TokenKind::RBrace),
            ";" => matches!(tok.kind, TokenKind::Semicolon),
            _ => matches!(tok.kind, TokenKind::Operator(_)) && tok.value == sym,
        }
    }

    fn at_symbol(&self, sym: &str) -> bool {
        Self::token_is_symbol(self.current(), sym)
    }

    fn peek_is_symbol(&self, n: usize, sym: &str) -> bool {
        Self::token_is_symbol(self.peek_token(n), sym)
    }

    fn at_keyword(&self, name: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Keyword(k) if k == name)
    }

    fn matching_opener(closer: &str) -> Option<&'static str> {
        Some(match closer {
            ")" => "(",
            "]" => "[",
            "}" => "{",
            ">" => "<",
            _ => return None,
        })
    }

    fn expect_symbol(&mut self, sym: &str) {
        if self.at_symbol(sym) {
            self.bump();
        } else if self.at_eof() {
            self.report(Level::Warning, format!("autoclosed at the end of stream, expected '{sym}'"));
        } else {
            self.report(Level::Error, format!("expected '{sym}'"));
        }
    }

    fn skip_semicolons(&mut self) {
        while self.at_symbol(";") {
            self.bump();
        }
    }

    fn expect_statement_end(&mut self) {
        if self.at_symbol(";") {
            self.bump();
        }
    }

    // ---- generic list machinery ----

    /// Skips forward, tracking nested occurrences of `closer`'s matching
    /// opener, until a top-level `separator` or `closer` is reached.
    fn skip_unsupported_until(&mut self, closer: &str, separator: &str) -> Vec<String> {
        let opener = Self::matching_opener(closer);
        let mut depth = 0i32;
        let mut toks = Vec::new();
        loop {
            if self.at_eof() {
                break;
            }
            if depth == 0 && (self.at_symbol(separator) || self.at_symbol(closer)) {
                break;
            }
            if let Some(op) = opener {
                if self.at_symbol(op) {
                    depth += 1;
                }
            }
            if self.at_symbol(closer) {
                depth -= 1;
            }
            toks.push(self.bump().value);
        }
        toks
    }

    /// The Skippable-node(s) helper: parses inside an opener/closer pair
    /// whose opener the caller has already consumed. On a miss, produces an
    /// `unsupported` node spanning the tokens up to the next separator or
    /// closer; at a separator, inserts a transient `separator` node.
    /// Diagnoses every `unsupported` span and any separator at the
    /// boundaries of the list; separators are stripped before return.
    fn parse_skippable_nodes<F>(&mut self, closer: &str, separator: &str, mut parse_one: F) -> Vec<Node>
    where
        F: FnMut(&mut Self) -> Option<Node>,
    {
        let mut raw = Vec::new();
        loop {
            if self.at_eof() || self.at_symbol(closer) {
                break;
            }
            match self.attempt(|p| parse_one(p)) {
                Some(node) => raw.push(node),
                None => {
                    let u_start = self.position;
                    let toks = self.skip_unsupported_until(closer, separator);
                    if !toks.is_empty() {
                        self.report(Level::Warning, "unsupported tokens in list");
                        raw.push(
                            Node::new(NodeKind::Unsupported, NodeRange::new(u_start, self.position))
                                .with_field("tokens", Field::TokenList(toks)),
                        );
                    }
                }
            }
            if self.at_symbol(separator) {
                let sep_start = self.position;
                self.bump();
                raw.push(Node::new(NodeKind::Separator, NodeRange::new(sep_start, self.position)));
            } else if !self.at_symbol(closer) && !self.at_eof() {
                self.report(Level::Warning, "expected separator or closer");
            }
        }

        let mut result = Vec::new();
        for (i, n) in raw.iter().enumerate() {
            if n.kind == NodeKind::Separator {
                if i == 0 || i == raw.len() - 1 {
                    self.report(Level::Warning, "spurious separator");
                }
                continue;
            }
            result.push(n.clone());
        }
        result
    }

    /// The grammar's generic `Sequence` rule shape: an optional opener, a
    /// repeated `element` separated by an optional `separator`, and an
    /// optional closer.
    fn parse_sequence<F>(
        &mut self,
        opener: Option<&str>,
        separator: Option<&str>,
        closer: Option<&str>,
        mut parse_element: F,
    ) -> Vec<Node>
    where
        F: FnMut(&mut Self) -> Option<Node>,
    {
        if let Some(op) = opener {
            if self.at_symbol(op) {
                self.bump();
            }
        }
        let items = match closer {
            Some(cl) => self.parse_skippable_nodes(cl, separator.unwrap_or(","), parse_element),
            None => {
                let mut v = Vec::new();
                loop {
                    match self.attempt(|p| parse_element(p)) {
                        Some(n) => v.push(n),
                        None => break,
                    }
                    if let Some(sep) = separator {
                        if self.at_symbol(sep) {
                            self.bump();
                            continue;
                        }
                    }
                    break;
                }
                v
            }
        };
        if let Some(cl) = closer {
            self.expect_symbol(cl);
        }
        items
    }

    // ---- statements ----

    fn parse_statements_until(&mut self, mut stop: impl FnMut(&Self) -> bool) -> Vec<Node> {
        let mut statements = Vec::new();
        self.skip_semicolons();
        while !self.at_eof() && !stop(self) {
            let before = self.position;
            match self.attempt(|p| p.parse_statement()) {
                Some(stmt) => statements.push(stmt),
                None => {
                    let tok_start = self.position;
                    let tok = self.bump();
                    self.report(Level::Warning, format!("unsupported token '{}'", tok.value));
                    statements.push(
                        Node::new(NodeKind::Unsupported, NodeRange::new(tok_start, self.position))
                            .with_field("tokens", Field::TokenList(vec![tok.value])),
                    );
                }
            }
            self.skip_semicolons();
            if self.position == before {
                break;
            }
        }
        statements
    }

    fn current_is_modifier_keyword(&self) -> bool {
        matches!(&self.current().kind, TokenKind::Keyword(k)
            if ACCESSIBILITY_MODIFIERS.contains(&k.as_str())
                || FINALITY_MODIFIERS.contains(&k.as_str())
                || OTHER_MODIFIERS.contains(&k.as_str()))
    }

    fn parse_statement(&mut self) -> Option<Node> {
        if self.current_is_modifier_keyword() {
            let modifiers = self.parse_modifiers();
            return self.parse_modified_declaration(modifiers);
        }
        match self.current().kind.clone() {
            TokenKind::Keyword(k) => match k.as_str() {
                "If" => self.parse_if_statement(),
                "While" => self.parse_while_statement(),
                "For" => self.parse_for_statement(),
                "Return" => self.parse_return_statement(),
                "Throw" => self.parse_throw_statement(),
                "Break" => self.parse_break_statement(),
                "Continue" => self.parse_continue_statement(),
                "Fallthrough" => self.parse_fallthrough_statement(),
                "Defer" => self.parse_defer_statement(),
                "Do" => self.parse_do_statement(),
                "Case" => self.parse_case_declaration(),
                "Import" => self.parse_import_statement(),
                "Var" | "Let" => self.parse_variable_declaration(Vec::new()),
                "Func" => self.parse_function_declaration(Vec::new()),
                "Class" => self.parse_class_declaration(Vec::new()),
                "Struct" => self.parse_struct_declaration(Vec::new()),
                "Enum" => self.parse_enum_declaration(Vec::new()),
                "Protocol" => self.parse_protocol_declaration(Vec::new()),
                "Namespace" => self.parse_namespace_declaration(Vec::new()),
                _ => self.parse_expression_statement(),
            },
            _ => self.parse_expression_statement(),
        }
    }

    /// Accepts a run of modifier keywords, flagging mutual-exclusion
    /// violations (multiple accessibility modifiers, `final`+`virtual`)
    /// with a level-1 diagnostic.
    fn parse_modifiers(&mut self) -> Vec<Node> {
        let mut mods = Vec::new();
        let mut accessibility: Option<String> = None;
        let mut finality: Option<String> = None;
        loop {
            let name = match &self.current().kind {
                TokenKind::Keyword(k)
                    if ACCESSIBILITY_MODIFIERS.contains(&k.as_str())
                        || FINALITY_MODIFIERS.contains(&k.as_str())
                        || OTHER_MODIFIERS.contains(&k.as_str()) =>
                {
                    k.clone()
                }
                _ => break,
            };
            let start = self.position;
            self.bump();
            if ACCESSIBILITY_MODIFIERS.contains(&name.as_str()) {
                if let Some(prev) = &accessibility {
                    self.report(Level::Warning, format!("conflicting accessibility modifiers '{prev}' and '{name}'"));
                }
                accessibility = Some(name.clone());
            }
            if FINALITY_MODIFIERS.contains(&name.as_str()) {
                if let Some(prev) = &finality {
                    self.report(Level::Warning, format!("conflicting modifiers '{prev}' and '{name}'"));
                }
                finality = Some(name.clone());
            }
            mods.push(Node::new(NodeKind::Modifier, NodeRange::new(start, self.position)).with_field("name", Field::Text(name)));
        }
        mods
    }

    fn parse_modified_declaration(&mut self, modifiers: Vec<Node>) -> Option<Node> {
        match self.current().kind.clone() {
            TokenKind::Keyword(k) => match k.as_str() {
                "Var" | "Let" => self.parse_variable_declaration(modifiers),
                "Func" => self.parse_function_declaration(modifiers),
                "Class" => self.parse_class_declaration(modifiers),
                "Struct" => self.parse_struct_declaration(modifiers),
                "Enum" => self.parse_enum_declaration(modifiers),
                "Protocol" => self.parse_protocol_declaration(modifiers),
                "Namespace" => self.parse_namespace_declaration(modifiers),
                _ => {
                    self.report(Level::Warning, "modifiers not followed by a declaration");
                    None
                }
            },
            _ => {
                self.report(Level::Warning, "modifiers not followed by a declaration");
                None
            }
        }
    }

    fn parse_expression_statement(&mut self) -> Option<Node> {
        let start = self.position;
        let expr = self.attempt(|p| p.parse_expressions_sequence())?;
        self.expect_statement_end();
        Some(Node::new(NodeKind::ExpressionStatement, NodeRange::new(start, self.position)).with_field("value", Field::node(expr)))
    }

    fn required_condition(&mut self, what: &str) -> Node {
        match self.attempt(|p| p.parse_expressions_sequence()) {
            Some(c) => c,
            None => {
                self.report(Level::Error, format!("{what} requires a condition"));
                Node::new(NodeKind::Unsupported, NodeRange::new(self.position, self.position))
            }
        }
    }

    /// Body-trailed-value: if `expr` is a call/subscript carrying a
    /// signature-less trailing closure (attached by the postfix-expression
    /// parser's own trailing-closure lookahead), detach it, rewind the
    /// cursor to its start, shrink `expr`'s range, and reparse it as a
    /// standalone `functionBody` -- the statement's own body rather than a
    /// call argument. Since the call node itself remains the statement's
    /// `value` with no extra wrapping level, the "export rule" is satisfied
    /// automatically: nothing further needs to be replaced.
    fn detach_trailing_closure(&mut self, expr: &mut Node) -> Option<Node> {
        if !matches!(expr.kind, NodeKind::CallExpression | NodeKind::SubscriptExpression) {
            return None;
        }
        let closure_start = match expr.fields.get("trailingClosure") {
            Some(Field::Node(n)) if !n.fields.contains_key("parameters") => n.range.start,
            _ => return None,
        };
        expr.fields.remove("trailingClosure");
        expr.range.end = closure_start;
        self.set_position(closure_start);
        self.parse_function_body()
    }

    fn parse_if_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        self.parse_if_tail(start)
    }

    fn parse_if_tail(&mut self, start: usize) -> Option<Node> {
        let mut condition = self.required_condition("if statement");
        let then = match self.detach_trailing_closure(&mut condition) {
            Some(body) => body,
            None => self.attempt(|p| p.parse_function_body())?,
        };
        let mut node = Node::new(NodeKind::IfStatement, NodeRange::new(start, self.position))
            .with_field("condition", Field::node(condition))
            .with_field("then", Field::node(then));
        if self.at_keyword("Else") {
            self.bump();
            let else_branch = if self.at_keyword("If") {
                let else_start = self.position;
                self.bump();
                self.parse_if_tail(else_start)?
            } else {
                self.attempt(|p| p.parse_function_body())?
            };
            node.set("else", Field::node(else_branch));
        }
        Some(node)
    }

    fn parse_while_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let mut condition = self.required_condition("while statement");
        let body = match self.detach_trailing_closure(&mut condition) {
            Some(b) => b,
            None => self.attempt(|p| p.parse_function_body())?,
        };
        Some(
            Node::new(NodeKind::WhileStatement, NodeRange::new(start, self.position))
                .with_field("condition", Field::node(condition))
                .with_field("body", Field::node(body)),
        )
    }

    fn parse_for_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let binding = if matches!(self.current().kind, TokenKind::Identifier) {
            self.bump().value
        } else {
            self.report(Level::Error, "for statement requires a loop variable");
            String::new()
        };
        if self.at_keyword("In") {
            self.bump();
        } else {
            self.report(Level::Error, "for statement requires 'in'");
        }
        let mut iterable = self.required_condition("for statement");
        let body = match self.detach_trailing_closure(&mut iterable) {
            Some(b) => b,
            None => self.attempt(|p| p.parse_function_body())?,
        };
        Some(
            Node::new(NodeKind::ForStatement, NodeRange::new(start, self.position))
                .with_field("binding", Field::Text(binding))
                .with_field("iterable", Field::node(iterable))
                .with_field("body", Field::node(body)),
        )
    }

    fn parse_return_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let value = if self.at_symbol(";") || self.at_symbol("}") || self.at_eof() {
            None
        } else {
            self.attempt(|p| p.parse_expressions_sequence())
        };
        self.expect_statement_end();
        let mut node = Node::new(NodeKind::ReturnStatement, NodeRange::new(start, self.position));
        if let Some(v) = value {
            node.set("value", Field::node(v));
        }
        Some(node)
    }

    fn parse_throw_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let value = match self.attempt(|p| p.parse_expressions_sequence()) {
            Some(v) => v,
            None => {
                self.report(Level::Error, "throw requires a value");
                Node::new(NodeKind::Unsupported, NodeRange::new(self.position, self.position))
            }
        };
        self.expect_statement_end();
        Some(Node::new(NodeKind::ThrowStatement, NodeRange::new(start, self.position)).with_field("value", Field::node(value)))
    }

    fn parse_break_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        self.expect_statement_end();
        Some(Node::new(NodeKind::BreakStatement, NodeRange::new(start, self.position)))
    }

    fn parse_continue_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        self.expect_statement_end();
        Some(Node::new(NodeKind::ContinueStatement, NodeRange::new(start, self.position)))
    }

    fn parse_fallthrough_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        self.expect_statement_end();
        Some(Node::new(NodeKind::FallthroughStatement, NodeRange::new(start, self.position)))
    }

    fn parse_defer_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let body = self.attempt(|p| p.parse_function_body())?;
        self.expect_statement_end();
        Some(Node::new(NodeKind::DeferStatement, NodeRange::new(start, self.position)).with_field("body", Field::node(body)))
    }

    /// `case a, b, c` -- a bare list of enum-case identifiers (distinct from
    /// a `switch`-style branch; this language has no `switch` statement).
    /// Grounded on `original_source/CPP/Includes/Parser.cpp`'s
    /// `caseDeclaration` rule.
    fn parse_case_declaration(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let mut identifiers = Vec::new();
        loop {
            if matches!(self.current().kind, TokenKind::Identifier) {
                identifiers.push(self.bump().value);
                if self.at_symbol(",") {
                    self.bump();
                    continue;
                }
            }
            break;
        }
        if identifiers.is_empty() {
            self.report(Level::Info, "no identifier(s)");
        }
        self.expect_statement_end();
        Some(
            Node::new(NodeKind::CaseDeclaration, NodeRange::new(start, self.position))
                .with_field("identifiers", Field::TokenList(identifiers)),
        )
    }

    /// `do { ... } catch TypeA, TypeB { ... } catch { ... }`. Grounded on
    /// the original's `doStatement`/`catchClause` rules: a `catchClause`
    /// chains to another `catchClause` so `catch A { } catch B { }` reads
    /// as nested alternatives, the first whose declared type(s) accept the
    /// thrown value runs.
    fn parse_do_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let body = self.attempt(|p| p.parse_function_body());
        if body.is_none() {
            self.report(Level::Error, "do statement requires a body");
        }
        let catch = self.attempt(|p| p.parse_catch_clause());
        if catch.is_none() {
            self.report(Level::Warning, "do statement has no catch clause");
        }
        self.expect_statement_end();
        let mut node = Node::new(NodeKind::DoStatement, NodeRange::new(start, self.position));
        if let Some(b) = body {
            node.set("body", Field::node(b));
        }
        if let Some(c) = catch {
            node.set("catch", Field::node(c));
        }
        Some(node)
    }

    fn parse_catch_clause(&mut self) -> Option<Node> {
        let start = self.position;
        if !self.at_keyword("Catch") {
            return None;
        }
        self.bump();
        let mut type_identifiers = Vec::new();
        loop {
            match self.attempt(|p| p.parse_type()) {
                Some(t) => type_identifiers.push(t),
                None => break,
            }
            if self.at_symbol(",") {
                self.bump();
                continue;
            }
            break;
        }
        if type_identifiers.is_empty() {
            self.report(Level::Info, "no type identifiers");
        }
        let body = self.attempt(|p| p.parse_function_body());
        if body.is_none() {
            self.report(Level::Warning, "no body");
        }
        let chained = self.attempt(|p| p.parse_catch_clause());
        let mut node = Node::new(NodeKind::CatchClause, NodeRange::new(start, self.position))
            .with_field("typeIdentifiers", Field::NodeList(type_identifiers));
        if let Some(b) = body {
            node.set("body", Field::node(b));
        }
        if let Some(c) = chained {
            node.set("catch", Field::node(c));
        }
        Some(node)
    }

    /// `try`/`try?` wrapping a single expression (not a full
    /// `expressionsSequence` -- grounded on the original's `tryExpression`
    /// rule, which parses a bare `expression`).
    fn parse_try_expression(&mut self) -> Option<Node> {
        let start = self.position;
        if !self.at_keyword("Try") {
            return None;
        }
        self.bump();
        let nillable = if self.at_symbol("?") {
            self.bump();
            true
        } else {
            false
        };
        let value = self.attempt(|p| p.parse_prefix_expression())?;
        Some(
            Node::new(NodeKind::TryExpression, NodeRange::new(start, self.position))
                .with_field("nillable", Field::Flag(nillable))
                .with_field("value", Field::node(value)),
        )
    }

    fn parse_import_statement(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let mut path = Vec::new();
        loop {
            if matches!(self.current().kind, TokenKind::Identifier) {
                path.push(self.bump().value);
                if self.at_symbol(".") {
                    self.bump();
                    continue;
                }
            }
            break;
        }
        if path.is_empty() {
            self.report(Level::Error, "import requires a module path");
        }
        self.expect_statement_end();
        Some(Node::new(NodeKind::ImportStatement, NodeRange::new(start, self.position)).with_field("path", Field::TokenList(path)))
    }

    // ---- declarations ----

    fn parse_variable_declaration(&mut self, modifiers: Vec<Node>) -> Option<Node> {
        let start = modifiers.first().map(|m| m.range.start).unwrap_or(self.position);
        let is_const = self.at_keyword("Let");
        self.bump();
        let name = if matches!(self.current().kind, TokenKind::Identifier) {
            self.bump().value
        } else {
            self.report(Level::Error, "variable declaration requires a name");
            String::new()
        };
        let ty = if self.at_symbol(":") {
            self.bump();
            self.attempt(|p| p.parse_type())
        } else {
            None
        };
        let initializer = if self.at_symbol("=") {
            self.bump();
            self.attempt(|p| p.parse_expressions_sequence())
        } else {
            None
        };
        let observers = self.attempt(|p| p.parse_observers_body());
        self.expect_statement_end();
        let mut node = Node::new(NodeKind::VariableDeclaration, NodeRange::new(start, self.position))
            .with_field("name", Field::Text(name))
            .with_field("constant", Field::Flag(is_const))
            .with_field("modifiers", Field::NodeList(modifiers));
        if let Some(t) = ty {
            node.set("typeAnnotation", Field::node(t));
        }
        if let Some(i) = initializer {
            node.set("initializer", Field::node(i));
        }
        if let Some(o) = observers {
            node.set("observers", Field::node(o));
        }
        Some(node)
    }

    fn parse_function_declaration(&mut self, modifiers: Vec<Node>) -> Option<Node> {
        let start = modifiers.first().map(|m| m.range.start).unwrap_or(self.position);
        self.bump();
        let name = if matches!(self.current().kind, TokenKind::Identifier) {
            self.bump().value
        } else {
            self.report(Level::Error, "function declaration requires a name");
            String::new()
        };
        let params = if self.at_symbol("(") {
            self.parse_sequence(Some("("), Some(","), Some(")"), |p| p.parse_parameter())
        } else {
            self.report(Level::Error, "function declaration requires a parameter signature");
            Vec::new()
        };
        let return_type = if self.at_symbol("->") {
            self.bump();
            self.attempt(|p| p.parse_type())
        } else {
            None
        };
        let body = self.attempt(|p| p.parse_function_body());
        self.expect_statement_end();
        let mut node = Node::new(NodeKind::FunctionDeclaration, NodeRange::new(start, self.position))
            .with_field("name", Field::Text(name))
            .with_field("parameters", Field::NodeList(params))
            .with_field("modifiers", Field::NodeList(modifiers));
        if let Some(t) = return_type {
            node.set("returnType", Field::node(t));
        }
        if let Some(b) = body {
            node.set("body", Field::node(b));
        }
        Some(node)
    }

    fn parse_parameter(&mut self) -> Option<Node> {
        let start = self.position;
        let variadic = if self.at_symbol("..") && self.peek_is_symbol(1, ".") {
            self.bump();
            self.bump();
            true
        } else {
            false
        };
        let name = match self.current().kind {
            TokenKind::Identifier => self.bump().value,
            _ => return None,
        };
        let ty = if self.at_symbol(":") {
            self.bump();
            self.attempt(|p| p.parse_type())
        } else {
            None
        };
        let default = if self.at_symbol("=") {
            self.bump();
            self.attempt(|p| p.parse_expressions_sequence())
        } else {
            None
        };
        let mut node = Node::new(NodeKind::Parameter, NodeRange::new(start, self.position))
            .with_field("name", Field::Text(name))
            .with_field("variadic", Field::Flag(variadic));
        if let Some(t) = ty {
            node.set("typeAnnotation", Field::node(t));
        }
        if let Some(d) = default {
            node.set("default", Field::node(d));
        }
        Some(node)
    }

    fn parse_class_like_declaration(&mut self, kind: NodeKind, what: &str, modifiers: Vec<Node>) -> Option<Node> {
        let start = modifiers.first().map(|m| m.range.start).unwrap_or(self.position);
        self.bump();
        let name = if matches!(self.current().kind, TokenKind::Identifier) {
            self.bump().value
        } else {
            self.report(Level::Error, format!("{what} declaration requires a name"));
            String::new()
        };
        let generics = if self.at_symbol("<") { self.attempt(|p| p.parse_generic_argument_list()) } else { None };
        let mut supertypes = Vec::new();
        if self.at_symbol(":") {
            self.bump();
            loop {
                match self.attempt(|p| p.parse_type()) {
                    Some(t) => supertypes.push(t),
                    None => break,
                }
                if self.at_symbol(",") {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        let body = self.attempt(|p| p.parse_function_body());
        self.expect_statement_end();
        let mut node = Node::new(kind, NodeRange::new(start, self.position))
            .with_field("name", Field::Text(name))
            .with_field("modifiers", Field::NodeList(modifiers))
            .with_field("supertypes", Field::NodeList(supertypes));
        if let Some(g) = generics {
            node.set("generics", Field::node(g));
        }
        if let Some(b) = body {
            node.set("body", Field::node(b));
        }
        Some(node)
    }

    fn parse_class_declaration(&mut self, m: Vec<Node>) -> Option<Node> {
        self.parse_class_like_declaration(NodeKind::ClassDeclaration, "class", m)
    }
    fn parse_struct_declaration(&mut self, m: Vec<Node>) -> Option<Node> {
        self.parse_class_like_declaration(NodeKind::StructDeclaration, "struct", m)
    }
    fn parse_enum_declaration(&mut self, m: Vec<Node>) -> Option<Node> {
        self.parse_class_like_declaration(NodeKind::EnumDeclaration, "enum", m)
    }
    fn parse_protocol_declaration(&mut self, m: Vec<Node>) -> Option<Node> {
        self.parse_class_like_declaration(NodeKind::ProtocolDeclaration, "protocol", m)
    }
    fn parse_namespace_declaration(&mut self, m: Vec<Node>) -> Option<Node> {
        self.parse_class_like_declaration(NodeKind::NamespaceDeclaration, "namespace", m)
    }

    // ---- function bodies / trailing closures ----

    fn parse_function_body(&mut self) -> Option<Node> {
        let start = self.position;
        if !self.at_symbol("{") {
            return None;
        }
        self.bump();
        let params = self.attempt(|p| p.parse_closure_signature());
        let statements = self.parse_statements_until(|p| p.at_symbol("}"));
        self.expect_symbol("}");
        let mut node = Node::new(NodeKind::FunctionBody, NodeRange::new(start, self.position))
            .with_field("statements", Field::NodeList(statements));
        if let Some(p) = params {
            node.set("parameters", Field::node(p));
        }
        Some(node)
    }

    /// The `{ willSet { ... } didSet { ... } }` run trailing a member
    /// declaration (spec.md §3's `observers` table). Tried before
    /// `parse_function_body` wherever a member can carry one, so a bare
    /// `{ willSet { ... } }` isn't mistaken for an initializer closure.
    const OBSERVER_KINDS: [&str; 9] =
        ["willGet", "get", "didGet", "willSet", "set", "didSet", "willDelete", "delete", "didDelete"];

    fn parse_observers_body(&mut self) -> Option<Node> {
        let start = self.position;
        if !self.at_symbol("{") {
            return None;
        }
        self.bump();
        let mut observers = Vec::new();
        while let Some(o) = self.attempt(|p| p.parse_observer_declaration()) {
            observers.push(o);
        }
        if observers.is_empty() {
            return None;
        }
        self.expect_symbol("}");
        Some(Node::new(NodeKind::ObserversBody, NodeRange::new(start, self.position)).with_field("observers", Field::NodeList(observers)))
    }

    fn parse_observer_declaration(&mut self) -> Option<Node> {
        let start = self.position;
        let name = match &self.current().kind {
            TokenKind::Identifier => self.current().value.clone(),
            _ => return None,
        };
        if !Self::OBSERVER_KINDS.contains(&name.as_str()) {
            return None;
        }
        self.bump();
        let body = self.attempt(|p| p.parse_function_body());
        if body.is_none() {
            self.report(Level::Info, "observer declaration requires a body");
        }
        let mut node = Node::new(NodeKind::ObserverDeclaration, NodeRange::new(start, self.position)).with_field("kind", Field::Text(name));
        if let Some(b) = body {
            node.set("body", Field::node(b));
        }
        Some(node)
    }

    /// `{ a, b in ...}`'s leading `name, name, ... in` signature.
    fn parse_closure_signature(&mut self) -> Option<Node> {
        let start = self.position;
        let mut names = Vec::new();
        loop {
            if matches!(self.current().kind, TokenKind::Identifier) {
                names.push(self.bump().value);
                if self.at_symbol(",") {
                    self.bump();
                    continue;
                }
            }
            break;
        }
        if names.is_empty() || !self.at_keyword("In") {
            return None;
        }
        self.bump();
        Some(Node::new(NodeKind::Parameter, NodeRange::new(start, self.position)).with_field("names", Field::TokenList(names)))
    }

    // ---- expressions ----

    /// The Sequential-nodes helper specialized for `expressionsSequence`: a
    /// left-to-right alternation of expression and infix-operator nodes.
    /// If the final element would be a dangling operator, the cursor
    /// rewinds one element instead of keeping it.
    fn parse_expressions_sequence(&mut self) -> Option<Node> {
        let start = self.position;
        let mut values = vec![self.attempt(|p| p.parse_prefix_expression())?];
        loop {
            let before_op = self.position;
            let op = match self.attempt(|p| p.parse_sequence_operator()) {
                Some(op) => op,
                None => break,
            };
            match self.attempt(|p| p.parse_prefix_expression()) {
                Some(rhs) => {
                    values.push(op);
                    values.push(rhs);
                }
                None => {
                    self.set_position(before_op);
                    break;
                }
            }
        }
        if values.len() == 1 {
            return Some(values.into_iter().next().unwrap());
        }
        Some(
            Node::new(NodeKind::ExpressionsSequence, NodeRange::new(start, self.position))
                .with_field("values", Field::NodeList(values)),
        )
    }

    /// `as`/`in`/`is` are subsequential: accepted in an operator slot and
    /// flagged for the interpreter, but otherwise parsed like any other
    /// infix operator (see DESIGN.md for this spec open question).
    fn parse_sequence_operator(&mut self) -> Option<Node> {
        let start = self.position;
        match self.current().kind.clone() {
            TokenKind::Operator(placement) => {
                let value = self.bump().value;
                Some(
                    Node::new(NodeKind::Operator, NodeRange::new(start, self.position))
                        .with_field("value", Field::Text(value))
                        .with_field("placement", Field::Text(operator_placement_str(placement))),
                )
            }
            TokenKind::Keyword(k) if SUBSEQUENTIAL_KEYWORDS.contains(&k.as_str()) => {
                self.bump();
                Some(
                    Node::new(NodeKind::Operator, NodeRange::new(start, self.position))
                        .with_field("value", Field::Text(k))
                        .with_field("subsequential", Field::Flag(true)),
                )
            }
            _ => None,
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Node> {
        let start = self.position;
        if self.at_keyword("Try") {
            if let Some(node) = self.attempt(|p| p.parse_try_expression()) {
                return Some(node);
            }
        }
        if matches!(self.current().kind, TokenKind::Operator(OperatorPlacement::Prefix)) {
            let op = self.bump();
            let operand = self.parse_prefix_expression()?;
            return Some(
                Node::new(NodeKind::PrefixExpression, NodeRange::new(start, self.position))
                    .with_field("operator", Field::Text(op.value))
                    .with_field("operand", Field::node(operand)),
            );
        }
        self.parse_postfix_expression()
    }

    /// The `callExpression`/`subscriptExpression`/`memberExpression`
    /// hierarchy, chained in a loop (not just once) so `a().b[0].c` parses:
    /// each wrap stores the previous result under `base`, matching
    /// grammar.rs's `Hierarchy` rule shape repeated to a fixed point.
    fn parse_postfix_expression(&mut self) -> Option<Node> {
        let start = self.position;
        let mut base = self.attempt(|p| p.parse_primary_expression())?;
        loop {
            if self.at_symbol("(") {
                let args = self.parse_sequence(Some("("), Some(","), Some(")"), |p| p.parse_argument());
                let mut node = Node::new(NodeKind::CallExpression, NodeRange::new(start, self.position))
                    .with_field("base", Field::node(base))
                    .with_field("arguments", Field::NodeList(args));
                self.attach_trailing_closure(&mut node);
                base = node;
            } else if self.at_symbol("[") {
                let args = self.parse_sequence(Some("["), Some(","), Some("]"), |p| p.parse_argument());
                let mut node = Node::new(NodeKind::SubscriptExpression, NodeRange::new(start, self.position))
                    .with_field("base", Field::node(base))
                    .with_field("arguments", Field::NodeList(args));
                self.attach_trailing_closure(&mut node);
                base = node;
            } else if self.at_symbol(".") {
                self.bump();
                if !matches!(self.current().kind, TokenKind::Identifier) {
                    self.set_position(self.position - 1);
                    break;
                }
                let member = self.bump().value;
                base = Node::new(NodeKind::MemberExpression, NodeRange::new(start, self.position))
                    .with_field("base", Field::node(base))
                    .with_field("member", Field::Text(member));
            } else if matches!(self.current().kind, TokenKind::Operator(OperatorPlacement::Postfix)) {
                let op = self.bump();
                base = Node::new(NodeKind::PostfixExpression, NodeRange::new(start, self.position))
                    .with_field("operator", Field::Text(op.value))
                    .with_field("operand", Field::node(base));
            } else {
                break;
            }
        }
        Some(base)
    }

    /// Swift-style trailing closure sugar: a call/subscript immediately
    /// followed by `{ ... }` treats that block as a final unlabeled
    /// argument. `detach_trailing_closure` may later pull it back out if a
    /// statement-level caller decides it's really this statement's body.
    fn attach_trailing_closure(&mut self, node: &mut Node) {
        if self.at_symbol("{") {
            if let Some(closure) = self.attempt(|p| p.parse_function_body()) {
                node.range.end = self.position;
                node.set("trailingClosure", Field::node(closure));
            }
        }
    }

    fn parse_primary_expression(&mut self) -> Option<Node> {
        let start = self.position;
        match self.current().kind.clone() {
            TokenKind::IntegerLiteral => {
                let v = self.bump().value;
                Some(Node::new(NodeKind::IntegerLiteral, NodeRange::new(start, self.position)).with_field("value", Field::Text(v)))
            }
            TokenKind::FloatLiteral => {
                let v = self.bump().value;
                Some(Node::new(NodeKind::FloatLiteral, NodeRange::new(start, self.position)).with_field("value", Field::Text(v)))
            }
            TokenKind::Keyword(k) if k == "True" || k == "False" => {
                let v = self.bump().value;
                Some(Node::new(NodeKind::BoolLiteral, NodeRange::new(start, self.position)).with_field("value", Field::Text(v)))
            }
            TokenKind::Keyword(k) if k == "Nil" => {
                self.bump();
                Some(Node::new(NodeKind::NilLiteral, NodeRange::new(start, self.position)))
            }
            TokenKind::Keyword(k) if k == "Self" => {
                self.bump();
                Some(Node::new(NodeKind::SelfExpression, NodeRange::new(start, self.position)))
            }
            TokenKind::Keyword(k) if k == "Super" => {
                self.bump();
                Some(Node::new(NodeKind::SuperExpression, NodeRange::new(start, self.position)))
            }
            TokenKind::Identifier => {
                let v = self.bump().value;
                Some(Node::new(NodeKind::Identifier, NodeRange::new(start, self.position)).with_field("name", Field::Text(v)))
            }
            TokenKind::StringOpen => self.parse_string_literal(),
            TokenKind::LBracket => self.parse_array_or_dictionary_literal(),
            TokenKind::LParen => self.parse_parenthesized_expression(),
            TokenKind::LBrace => self.parse_function_body(),
            _ => None,
        }
    }

    fn parse_string_literal(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let mut segments = Vec::new();
        loop {
            match self.current().kind.clone() {
                TokenKind::StringSegment => {
                    let seg_start = self.position;
                    let v = self.bump().value;
                    segments.push(
                        Node::new(NodeKind::StringSegment, NodeRange::new(seg_start, self.position)).with_field("text", Field::Text(v)),
                    );
                }
                TokenKind::StringExpressionOpen => {
                    self.bump();
                    if let Some(expr) = self.attempt(|p| p.parse_expressions_sequence()) {
                        segments.push(expr);
                    }
                    if matches!(self.current().kind, TokenKind::StringExpressionClose) {
                        self.bump();
                    } else if self.at_eof() {
                        self.report(Level::Warning, "autoclosed at the end of stream, expected end of string interpolation");
                        break;
                    } else {
                        self.report(Level::Error, "expected end of string interpolation");
                    }
                }
                TokenKind::StringClose => {
                    self.bump();
                    break;
                }
                _ => {
                    if self.at_eof() {
                        self.report(Level::Warning, "autoclosed at the end of stream, expected end of string");
                    }
                    break;
                }
            }
        }
        Some(Node::new(NodeKind::StringLiteral, NodeRange::new(start, self.position)).with_field("segments", Field::NodeList(segments)))
    }

    fn parse_array_or_dictionary_literal(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        if self.at_symbol("]") {
            self.bump();
            return Some(Node::new(NodeKind::ArrayLiteral, NodeRange::new(start, self.position)).with_field("elements", Field::NodeList(vec![])));
        }
        if self.at_symbol(":") {
            self.bump();
            self.expect_symbol("]");
            return Some(Node::new(NodeKind::DictionaryLiteral, NodeRange::new(start, self.position)).with_field("entries", Field::NodeList(vec![])));
        }
        let first_start = self.position;
        let first = self.attempt(|p| p.parse_expressions_sequence());
        let Some(key) = first else {
            self.expect_symbol("]");
            return Some(Node::new(NodeKind::ArrayLiteral, NodeRange::new(start, self.position)).with_field("elements", Field::NodeList(vec![])));
        };
        if self.at_symbol(":") {
            self.bump();
            let value = self.parse_expressions_sequence()?;
            let mut entries = vec![Node::new(NodeKind::DictionaryEntry, NodeRange::new(first_start, self.position))
                .with_field("key", Field::node(key))
                .with_field("value", Field::node(value))];
            while self.at_symbol(",") {
                self.bump();
                if self.at_symbol("]") {
                    break;
                }
                let e_start = self.position;
                let Some(k) = self.attempt(|p| p.parse_expressions_sequence()) else { break };
                self.expect_symbol(":");
                let Some(v) = self.attempt(|p| p.parse_expressions_sequence()) else { break };
                entries.push(
                    Node::new(NodeKind::DictionaryEntry, NodeRange::new(e_start, self.position))
                        .with_field("key", Field::node(k))
                        .with_field("value", Field::node(v)),
                );
            }
            self.expect_symbol("]");
            Some(Node::new(NodeKind::DictionaryLiteral, NodeRange::new(start, self.position)).with_field("entries", Field::NodeList(entries)))
        } else {
            let mut elements = vec![key];
            while self.at_symbol(",") {
                self.bump();
                if self.at_symbol("]") {
                    break;
                }
                match self.attempt(|p| p.parse_expressions_sequence()) {
                    Some(e) => elements.push(e),
                    None => break,
                }
            }
            self.expect_symbol("]");
            Some(Node::new(NodeKind::ArrayLiteral, NodeRange::new(start, self.position)).with_field("elements", Field::NodeList(elements)))
        }
    }

    fn parse_parenthesized_expression(&mut self) -> Option<Node> {
        let start = self.position;
        self.bump();
        let inner = self.parse_expressions_sequence()?;
        self.expect_symbol(")");
        Some(Node::new(NodeKind::ParenthesizedExpression, NodeRange::new(start, self.position)).with_field("inner", Field::node(inner)))
    }

    fn parse_argument(&mut self) -> Option<Node> {
        let start = self.position;
        let label = if matches!(self.current().kind, TokenKind::Identifier) && self.peek_is_symbol(1, ":") {
            let name = self.bump().value;
            self.bump();
            Some(name)
        } else {
            None
        };
        let value = self.parse_expressions_sequence()?;
        let mut node = Node::new(NodeKind::Argument, NodeRange::new(start, self.position)).with_field("value", Field::node(value));
        if let Some(l) = label {
            node.set("label", Field::Text(l));
        }
        Some(node)
    }

    // ---- types ----

    fn parse_type(&mut self) -> Option<Node> {
        self.parse_type_union()
    }

    fn parse_type_union(&mut self) -> Option<Node> {
        let start = self.position;
        let mut parts = vec![self.parse_type_intersection()?];
        while self.at_symbol("|") {
            self.bump();
            parts.push(self.parse_type_intersection()?);
        }
        if parts.len() == 1 {
            return Some(parts.into_iter().next().unwrap());
        }
        Some(
            Node::new(NodeKind::TypeAnnotation, NodeRange::new(start, self.position))
                .with_field("form", Field::Text("union".into()))
                .with_field("parts", Field::NodeList(parts)),
        )
    }

    fn parse_type_intersection(&mut self) -> Option<Node> {
        let start = self.position;
        let mut parts = vec![self.parse_type_postfix()?];
        while self.at_symbol("&") {
            self.bump();
            parts.push(self.parse_type_postfix()?);
        }
        if parts.len() == 1 {
            return Some(parts.into_iter().next().unwrap());
        }
        Some(
            Node::new(NodeKind::TypeAnnotation, NodeRange::new(start, self.position))
                .with_field("form", Field::Text("intersection".into()))
                .with_field("parts", Field::NodeList(parts)),
        )
    }

    fn parse_type_postfix(&mut self) -> Option<Node> {
        let start = self.position;
        let mut ty = self.parse_type_primary()?;
        while self.at_symbol("?") {
            self.bump();
            ty = Node::new(NodeKind::TypeAnnotation, NodeRange::new(start, self.position))
                .with_field("form", Field::Text("nillable".into()))
                .with_field("inner", Field::node(ty));
        }
        Some(ty)
    }

    fn parse_type_primary(&mut self) -> Option<Node> {
        let start = self.position;
        if self.at_symbol("(") {
            self.bump();
            let inner = self.parse_type()?;
            self.expect_symbol(")");
            return Some(
                Node::new(NodeKind::TypeAnnotation, NodeRange::new(start, self.position))
                    .with_field("form", Field::Text("parenthesized".into()))
                    .with_field("inner", Field::node(inner)),
            );
        }
        let name = match self.current().kind.clone() {
            TokenKind::Identifier => self.bump().value,
            TokenKind::Keyword(k) => {
                self.bump();
                k
            }
            _ => return None,
        };
        let mut node = Node::new(NodeKind::TypeAnnotation, NodeRange::new(start, self.position))
            .with_field("form", Field::Text("name".into()))
            .with_field("name", Field::Text(name));
        if self.at_symbol("<") {
            if let Some(args) = self.attempt(|p| p.parse_generic_argument_list()) {
                node.set("generics", Field::node(args));
                node.range.end = self.position;
            }
        }
        Some(node)
    }

    fn parse_generic_argument_list(&mut self) -> Option<Node> {
        let start = self.position;
        let args = self.parse_sequence(Some("<"), Some(","), Some(">"), |p| p.parse_type());
        Some(Node::new(NodeKind::GenericArgumentList, NodeRange::new(start, self.position)).with_field("arguments", Field::NodeList(args)))
    }
}

fn operator_placement_str(p: OperatorPlacement) -> String {
    match p {
        OperatorPlacement::Prefix => "prefix".into(),
        OperatorPlacement::Infix => "infix".into(),
        OperatorPlacement::Postfix => "postfix".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_lexer::Lexer;

    fn parse_source(src: &str) -> (Node, Vec<Diagnostic>) {
        let tokens: Vec<_> = Lexer::tokenize(src).into_iter().filter(|t| !t.trivia).collect();
        let mut parser = Parser::new(tokens);
        let module = parser.parse_module();
        (module, parser.reports().to_vec())
    }

    fn statements(module: &Node) -> &[Node] {
        match module.fields.get("statements") {
            Some(Field::NodeList(v)) => v,
            _ => panic!("module has no statements field"),
        }
    }

    #[test]
    fn integer_arithmetic_return() {
        let (module, reports) = parse_source("return 1 + 2 * 3");
        assert!(reports.is_empty());
        let stmts = statements(&module);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].kind, NodeKind::ReturnStatement);
        let value = match stmts[0].fields.get("value") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!("return statement missing value"),
        };
        assert_eq!(value.kind, NodeKind::ExpressionsSequence);
        match value.fields.get("values") {
            Some(Field::NodeList(v)) => assert_eq!(v.len(), 5),
            _ => panic!("expected a flat 5-element sequence"),
        }
    }

    #[test]
    fn string_interpolation_produces_nested_expression() {
        let (module, _) = parse_source("'x=\\(1+2)'");
        let stmts = statements(&module);
        let value = match stmts[0].fields.get("value") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!(),
        };
        assert_eq!(value.kind, NodeKind::StringLiteral);
        let segments = match value.fields.get("segments") {
            Some(Field::NodeList(v)) => v,
            _ => panic!(),
        };
        assert!(segments.iter().any(|s| s.kind == NodeKind::StringSegment));
        assert!(segments.iter().any(|s| s.kind == NodeKind::ExpressionsSequence || s.kind == NodeKind::IntegerLiteral));
    }

    #[test]
    fn trailing_closure_becomes_if_statement_body() {
        let (module, _) = parse_source("if cond { body }");
        let stmts = statements(&module);
        assert_eq!(stmts[0].kind, NodeKind::IfStatement);
        let condition = match stmts[0].fields.get("condition") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!(),
        };
        assert_eq!(condition.kind, NodeKind::Identifier);
        let then = match stmts[0].fields.get("then") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!(),
        };
        assert_eq!(then.kind, NodeKind::FunctionBody);
    }

    #[test]
    fn unclosed_function_body_autocloses_with_one_diagnostic() {
        let (module, reports) = parse_source("func f(){");
        let stmts = statements(&module);
        assert_eq!(stmts[0].kind, NodeKind::FunctionDeclaration);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].message.contains("autoclosed at the end of stream"));
        assert_eq!(reports[0].level, Level::Warning);
        let body = match stmts[0].fields.get("body") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!("function body missing"),
        };
        assert!(body.range.end >= body.range.start);
    }

    #[test]
    fn trailing_closure_with_signature_stays_a_call_argument() {
        let (module, _) = parse_source("run() { x in x }");
        let stmts = statements(&module);
        let value = match stmts[0].fields.get("value") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!(),
        };
        assert_eq!(value.kind, NodeKind::CallExpression);
        let closure = match value.fields.get("trailingClosure") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!("expected a retained trailing closure"),
        };
        assert!(closure.fields.contains_key("parameters"));
    }

    #[test]
    fn rollback_retracts_diagnostics_from_a_failed_branch() {
        // `[1, 2]` parses cleanly as an array literal; a prior dictionary-entry
        // attempt inside parse_array_or_dictionary_literal fails after
        // tentatively consuming `1`, and must not leave any diagnostic behind.
        let (module, reports) = parse_source("return [1, 2]");
        assert!(reports.is_empty(), "rollback should retract any tentative diagnostics: {reports:?}");
        let stmts = statements(&module);
        let value = match stmts[0].fields.get("value") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!(),
        };
        assert_eq!(value.kind, NodeKind::ArrayLiteral);
    }

    #[test]
    fn class_declaration_with_supertype_and_members() {
        let (module, reports) = parse_source("class Dog : Animal { var name: String }");
        assert!(reports.is_empty());
        let stmts = statements(&module);
        assert_eq!(stmts[0].kind, NodeKind::ClassDeclaration);
        match stmts[0].fields.get("supertypes") {
            Some(Field::NodeList(v)) => assert_eq!(v.len(), 1),
            _ => panic!(),
        }
    }

    #[test]
    fn nillable_and_union_types_parse() {
        let (module, reports) = parse_source("var x: Int? | String");
        assert!(reports.is_empty());
        let stmts = statements(&module);
        let ty = match stmts[0].fields.get("typeAnnotation") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!(),
        };
        match ty.fields.get("form") {
            Some(Field::Text(s)) => assert_eq!(s, "union"),
            _ => panic!(),
        }
    }

    #[test]
    fn variable_declaration_parses_a_trailing_observers_body() {
        let (module, reports) = parse_source("var x = 1 { willSet { y } didSet { z } }");
        assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
        let stmts = statements(&module);
        assert_eq!(stmts[0].kind, NodeKind::VariableDeclaration);
        let observers_body = match stmts[0].fields.get("observers") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!("expected an observers body"),
        };
        assert_eq!(observers_body.kind, NodeKind::ObserversBody);
        let observers = match observers_body.fields.get("observers") {
            Some(Field::NodeList(v)) => v,
            _ => panic!(),
        };
        assert_eq!(observers.len(), 2);
        assert_eq!(observers[0].kind, NodeKind::ObserverDeclaration);
        match observers[0].fields.get("kind") {
            Some(Field::Text(s)) => assert_eq!(s, "willSet"),
            _ => panic!(),
        }
        match observers[1].fields.get("kind") {
            Some(Field::Text(s)) => assert_eq!(s, "didSet"),
            _ => panic!(),
        }
    }

    #[test]
    fn assignment_parses_as_an_ordinary_infix_operator_in_the_sequence() {
        let (module, reports) = parse_source("x = 5");
        assert!(reports.is_empty());
        let stmts = statements(&module);
        let value = match stmts[0].fields.get("value") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!(),
        };
        assert_eq!(value.kind, NodeKind::ExpressionsSequence);
        match value.fields.get("values") {
            Some(Field::NodeList(v)) => assert_eq!(v.len(), 3),
            _ => panic!("expected a flat 3-element [x, '=', 5] sequence"),
        }
    }

    #[test]
    fn do_statement_with_chained_catch_clauses_parses() {
        let (module, reports) = parse_source("do { risky() } catch TypeA { a } catch TypeB { b }");
        assert!(reports.is_empty());
        let stmts = statements(&module);
        assert_eq!(stmts[0].kind, NodeKind::DoStatement);
        let body = match stmts[0].fields.get("body") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!("do statement missing body"),
        };
        assert_eq!(body.kind, NodeKind::FunctionBody);
        let first_catch = match stmts[0].fields.get("catch") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!("do statement missing first catch"),
        };
        assert_eq!(first_catch.kind, NodeKind::CatchClause);
        match first_catch.fields.get("typeIdentifiers") {
            Some(Field::NodeList(v)) => assert_eq!(v.len(), 1),
            _ => panic!("expected one caught type"),
        }
        let second_catch = match first_catch.fields.get("catch") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!("expected a chained second catch clause"),
        };
        assert_eq!(second_catch.kind, NodeKind::CatchClause);
        assert!(second_catch.fields.get("catch").is_none());
    }

    #[test]
    fn case_declaration_parses_a_comma_separated_identifier_list() {
        let (module, reports) = parse_source("case red, green, blue");
        assert!(reports.is_empty());
        let stmts = statements(&module);
        assert_eq!(stmts[0].kind, NodeKind::CaseDeclaration);
        match stmts[0].fields.get("identifiers") {
            Some(Field::TokenList(v)) => assert_eq!(v, &["red", "green", "blue"]),
            _ => panic!("expected three case identifiers"),
        }
    }

    #[test]
    fn nillable_try_expression_sets_the_nillable_flag() {
        let (module, _) = parse_source("return try? risky()");
        let stmts = statements(&module);
        let value = match stmts[0].fields.get("value") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!(),
        };
        assert_eq!(value.kind, NodeKind::TryExpression);
        assert!(matches!(value.fields.get("nillable"), Some(Field::Flag(true))));
        let inner = match value.fields.get("value") {
            Some(Field::Node(n)) => n.as_ref(),
            _ => panic!("try expression missing wrapped value"),
        };
        assert_eq!(inner.kind, NodeKind::CallExpression);
    }
}
