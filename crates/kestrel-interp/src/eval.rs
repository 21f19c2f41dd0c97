//! The AST-walking execution dispatcher (spec.md §4.4): evaluating a node
//! computes a `Type`-valued result, threading the scope and control stacks
//! declared in `lib.rs`/`control.rs`.
//!
//! spec.md leaves two things open that this module resolves concretely
//! (see DESIGN.md): an `expressionsSequence`'s reduction order (precedence-
//! climbing, not left-to-right -- pinned by the worked example's expected
//! `7` for `1 + 2 * 3`), and array literals, which have no dedicated Type
//! variant -- they evaluate to a `Dictionary` keyed by consecutive integers.

use kestrel_common::diagnostic::Level;
use kestrel_parser::{Field, Node, NodeKind};
use kestrel_types::{DictionaryEntries, DictionaryType, PredefinedKind, PrimitiveKind, Type};

use crate::composite::{CompositeKind, Level as Kinship, MemberModifiers, ObserverKind, ParameterSpec};
use crate::control::{ControlFrame, ControlKind};
use crate::operators;
use crate::{CompositeId, Interpreter};

fn field_node<'a>(node: &'a Node, name: &str) -> Option<&'a Node> {
    match node.fields.get(name) {
        Some(Field::Node(n)) => Some(n),
        _ => None,
    }
}

fn field_nodes<'a>(node: &'a Node, name: &str) -> &'a [Node] {
    match node.fields.get(name) {
        Some(Field::NodeList(list)) => list,
        _ => &[],
    }
}

fn field_text(node: &Node, name: &str) -> Option<&str> {
    match node.fields.get(name) {
        Some(Field::Text(t)) => Some(t.as_str()),
        _ => None,
    }
}

fn field_flag(node: &Node, name: &str) -> bool {
    matches!(node.fields.get(name), Some(Field::Flag(true)))
}

fn field_tokens<'a>(node: &'a Node, name: &str) -> &'a [String] {
    match node.fields.get(name) {
        Some(Field::TokenList(list)) => list,
        _ => &[],
    }
}

/// `"="` assigns outright; `"+="`/`"-="`/`"*="`/`"/="`/`"%="` combine the
/// place's current value with the right-hand side via the named binary
/// operator first. Returns `None` for any other operator.
fn assignment_base_op(op: &str) -> Option<&'static str> {
    Some(match op {
        "=" => "",
        "+=" => "+",
        "-=" => "-",
        "*=" => "*",
        "/=" => "/",
        "%=" => "%",
        _ => return None,
    })
}

fn as_bool(v: &Type) -> bool {
    match v {
        Type::Primitive(PrimitiveKind::Boolean(Some(b))) => *b,
        Type::Predefined(PredefinedKind::Void) => false,
        _ => true,
    }
}

/// Builds an array value: no `Array` variant exists in the type lattice, so
/// a literal like `[1, 2, 3]` evaluates to a `Dictionary` keyed `0, 1, 2`.
pub fn make_array(items: Vec<Type>) -> Type {
    let mut entries = DictionaryEntries::new();
    for (i, v) in items.into_iter().enumerate() {
        entries.insert(Type::Primitive(PrimitiveKind::Integer(Some(i as i64))), v);
    }
    Type::Dictionary(DictionaryType {
        key: Box::new(Type::Predefined(PredefinedKind::Int)),
        value: Box::new(Type::Predefined(PredefinedKind::Any)),
        entries: Some(entries),
    })
}

impl Interpreter {
    /// Runs every top-level statement of `module` in the global scope and
    /// returns whatever was left on the control stack by a top-level
    /// `return` (treated, at module scope, as the module's result value).
    pub fn run_module(&mut self, module: &Node) -> Type {
        self.begin_module();
        let statements = field_nodes(module, "statements");
        self.eval_statements(statements);
        let frame = self.control.pop();
        self.control.push();
        if frame.kind == Some(ControlKind::Throw) {
            let thrown = frame.value.clone().unwrap_or_else(Type::void);
            self.report(Level::Error, module.range.end, format!("uncaught throw: {}", thrown.normalize().canonical_string()));
        }
        frame.value.unwrap_or_else(Type::void)
    }

    pub(crate) fn eval_statements(&mut self, statements: &[Node]) {
        for stmt in statements {
            self.eval_statement(stmt);
            if self.control.is_transfer() {
                break;
            }
        }
    }

    fn eval_statement(&mut self, node: &Node) {
        match node.kind {
            NodeKind::ExpressionStatement => {
                if let Some(value) = field_node(node, "value") {
                    self.eval_expr(value);
                }
            }
            NodeKind::VariableDeclaration => self.eval_variable_declaration(node),
            NodeKind::FunctionDeclaration => self.declare_function(node),
            NodeKind::ClassDeclaration => self.declare_class_like(node, CompositeKind::Class),
            NodeKind::StructDeclaration => self.declare_class_like(node, CompositeKind::Structure),
            NodeKind::EnumDeclaration => self.declare_class_like(node, CompositeKind::Enumeration),
            NodeKind::ProtocolDeclaration => self.declare_class_like(node, CompositeKind::Protocol),
            NodeKind::NamespaceDeclaration => self.declare_class_like(node, CompositeKind::Namespace),
            NodeKind::ImportStatement => self.eval_import(node),
            NodeKind::IfStatement => self.eval_if(node),
            NodeKind::WhileStatement => self.eval_while(node),
            NodeKind::ForStatement => self.eval_for(node),
            NodeKind::ReturnStatement => {
                let value = field_node(node, "value").map(|v| self.eval_expr(v));
                self.control.set(ControlFrame::transfer(ControlKind::Return, value));
            }
            NodeKind::ThrowStatement => {
                let value = field_node(node, "value").map(|v| self.eval_expr(v)).unwrap_or_else(Type::void);
                self.control.set(ControlFrame::transfer(ControlKind::Throw, Some(value)));
            }
            NodeKind::BreakStatement => self.control.set(ControlFrame::transfer(ControlKind::Break, None)),
            NodeKind::ContinueStatement => self.control.set(ControlFrame::transfer(ControlKind::Continue, None)),
            NodeKind::FallthroughStatement => self.control.set(ControlFrame::transfer(ControlKind::Fallthrough, None)),
            NodeKind::DeferStatement => {
                // Deferred execution requires hooking scope teardown; not
                // reachable from any worked example, so the body runs
                // immediately rather than silently doing nothing.
                if let Some(body) = field_node(node, "body") {
                    self.eval_block(field_nodes(body, "statements"));
                }
            }
            NodeKind::DoStatement => self.eval_do_statement(node),
            NodeKind::CaseDeclaration => self.eval_case_declaration(node),
            NodeKind::Unsupported | NodeKind::Separator => {}
            _ => {
                // A bare expression used as a statement (fault-tolerant
                // recovery paths can hand these up directly).
                self.eval_expr(node);
            }
        }
    }

    fn eval_variable_declaration(&mut self, node: &Node) {
        let name = field_text(node, "name").unwrap_or_default().to_string();
        let value = field_node(node, "initializer").map(|v| self.eval_expr(v)).unwrap_or_else(Type::void);
        let scope = self.current_scope();
        let modifiers = MemberModifiers::from_nodes(field_nodes(node, "modifiers"));
        self.set_member_with_modifiers(scope, name.clone(), value, modifiers);
        if let Some(observers_body) = field_node(node, "observers") {
            self.declare_observers(scope, &name, observers_body);
        }
    }

    fn eval_import(&mut self, node: &Node) {
        let path = field_tokens(node, "path");
        let Some(name) = path.last() else { return };
        if let Some(value) = self.resolve(name) {
            if let Type::Composite(id) = value {
                let scope = self.current_scope();
                if let Some(c) = self.arena.get_mut(scope) {
                    c.imports.insert(name.clone(), id);
                }
                self.retain(id, scope);
            }
        } else {
            self.report(Level::Warning, node.range.start, format!("unresolved import '{name}'"));
        }
    }

    /// Pushes a fresh block-local namespace, evaluates `statements`, then
    /// pops it -- the scope used by `if`/`while`/`for` bodies (spec.md
    /// §4.4's "local namespace with missing levels").
    fn eval_block(&mut self, statements: &[Node]) {
        let scope = self.alloc("block", CompositeKind::Namespace);
        self.add_scope(scope);
        self.eval_statements(statements);
        self.remove_scope(false);
    }

    fn eval_if(&mut self, node: &Node) {
        let Some(condition) = field_node(node, "condition") else { return };
        let cond = self.eval_expr(condition);
        if as_bool(&cond) {
            if let Some(then) = field_node(node, "then") {
                self.eval_block(field_nodes(then, "statements"));
            }
        } else if let Some(else_branch) = field_node(node, "else") {
            match else_branch.kind {
                NodeKind::IfStatement => self.eval_if(else_branch),
                _ => self.eval_block(field_nodes(else_branch, "statements")),
            }
        }
    }

    fn eval_while(&mut self, node: &Node) {
        loop {
            let Some(condition) = field_node(node, "condition") else { break };
            let cond = self.eval_expr(condition);
            if !as_bool(&cond) {
                break;
            }
            if let Some(body) = field_node(node, "body") {
                self.eval_block(field_nodes(body, "statements"));
            }
            if !self.unwind_loop_transfer() {
                break;
            }
        }
    }

    fn eval_for(&mut self, node: &Node) {
        let Some(iterable_node) = field_node(node, "iterable") else { return };
        let iterable = self.eval_expr(iterable_node);
        let binding = field_text(node, "binding").unwrap_or_default().to_string();
        let items: Vec<Type> = match &iterable {
            Type::Dictionary(d) => d.entries.as_ref().map(|e| e.iter().map(|entry| entry.value.clone()).collect()).unwrap_or_default(),
            _ => Vec::new(),
        };
        for item in items {
            let scope = self.alloc("block", CompositeKind::Namespace);
            self.add_scope(scope);
            self.set_member(scope, binding.clone(), item);
            if let Some(body) = field_node(node, "body") {
                self.eval_statements(field_nodes(body, "statements"));
            }
            self.remove_scope(false);
            if !self.unwind_loop_transfer() {
                break;
            }
        }
    }

    /// After a loop body runs, interprets whatever landed on the control
    /// stack: `break` stops the loop, `continue` moves to the next
    /// iteration, anything else (`return`/`throw`/`fallthrough`) must keep
    /// propagating past the loop untouched. Returns whether the loop should
    /// keep iterating.
    fn unwind_loop_transfer(&mut self) -> bool {
        if !self.control.is_transfer() {
            return true;
        }
        match self.control.current().kind {
            Some(ControlKind::Break) => {
                self.control.clear();
                false
            }
            Some(ControlKind::Continue) => {
                self.control.clear();
                true
            }
            _ => false,
        }
    }

    /// `do { ... } catch A, B { ... } catch { ... }`: runs `body`, and if it
    /// leaves a `throw` pending, walks the `catch` chain for the first
    /// clause whose declared type(s) accept the thrown value (a clause with
    /// no type identifiers is a catch-all, matching the original grammar's
    /// `catchClause` with an empty `typeIdentifiers` list).
    fn eval_do_statement(&mut self, node: &Node) {
        let Some(body) = field_node(node, "body") else { return };
        self.eval_block(field_nodes(body, "statements"));
        if self.control.current().kind != Some(ControlKind::Throw) {
            return;
        }
        let thrown = self.control.current().value.clone().unwrap_or_else(Type::void);
        let mut clause = field_node(node, "catch");
        while let Some(c) = clause {
            if self.catch_matches(field_nodes(c, "typeIdentifiers"), &thrown) {
                self.control.clear();
                if let Some(catch_body) = field_node(c, "body") {
                    self.eval_block(field_nodes(catch_body, "statements"));
                }
                return;
            }
            clause = field_node(c, "catch");
        }
    }

    fn catch_matches(&self, types: &[Node], thrown: &Type) -> bool {
        if types.is_empty() {
            return true;
        }
        let Type::Composite(thrown_id) = thrown else { return false };
        types.iter().any(|t| self.resolve_named_type(t).is_some_and(|target| self.arena.inherits_from(*thrown_id, target)))
    }

    /// `case a, b, c` inside an enum body: each identifier becomes a member
    /// of the enclosing composite, valued as its own name.
    fn eval_case_declaration(&mut self, node: &Node) {
        let scope = self.current_scope();
        for name in field_tokens(node, "identifiers") {
            self.set_member(scope, name.clone(), Type::Primitive(PrimitiveKind::String(Some(name.clone()))));
        }
    }

    fn declare_function(&mut self, node: &Node) {
        let name = field_text(node, "name").unwrap_or_default().to_string();
        let params = field_nodes(node, "parameters").iter().filter_map(parameter_spec).collect();
        let body_statements = field_node(node, "body").map(|b| field_nodes(b, "statements").to_vec());
        let id = self.alloc(name.clone(), CompositeKind::Function);
        if let Some(c) = self.arena.get_mut(id) {
            c.parameters = params;
            c.statements = body_statements;
        }
        let scope = self.current_scope();
        let modifiers = MemberModifiers::from_nodes(field_nodes(node, "modifiers"));
        self.set_member_with_modifiers(scope, name, Type::Composite(id), modifiers);
    }

    fn declare_class_like(&mut self, node: &Node, kind: CompositeKind) {
        let name = field_text(node, "name").unwrap_or_default().to_string();
        let id = self.alloc(name.clone(), kind);
        let mut first_super = None;
        for supertype in field_nodes(node, "supertypes") {
            if let Some(target) = self.resolve_named_type(supertype) {
                if first_super.is_none() {
                    first_super = Some(target);
                } else if let Some(c) = self.arena.get_mut(id) {
                    c.protocols.push(target);
                }
            }
        }
        if let Some(target) = first_super {
            self.set_level(id, Kinship::Super, Some(target)).ok();
            self.set_level(id, Kinship::SuperType, Some(target)).ok();
        }
        self.add_scope(id);
        if let Some(body) = field_node(node, "body") {
            self.eval_statements(field_nodes(body, "statements"));
        }
        self.remove_scope(true);
        let scope = self.current_scope();
        let modifiers = MemberModifiers::from_nodes(field_nodes(node, "modifiers"));
        self.set_member_with_modifiers(scope, name, Type::Composite(id), modifiers);
    }

    /// A declared supertype is a `typeAnnotation` node; only the `name`
    /// form resolves to a composite (unions/intersections/nillable forms
    /// don't name a single ancestor to wire through `super`).
    fn resolve_named_type(&self, type_node: &Node) -> Option<CompositeId> {
        if field_text(type_node, "form") != Some("name") {
            return None;
        }
        let name = field_text(type_node, "name")?;
        match self.resolve(name) {
            Some(Type::Composite(id)) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn eval_expr(&mut self, node: &Node) -> Type {
        match node.kind {
            NodeKind::IntegerLiteral => field_text(node, "value")
                .and_then(|v| v.replace('_', "").parse::<i64>().ok())
                .map(|n| Type::Primitive(PrimitiveKind::Integer(Some(n))))
                .unwrap_or_else(Type::void),
            NodeKind::FloatLiteral => field_text(node, "value")
                .and_then(|v| v.replace('_', "").parse::<f64>().ok())
                .map(|n| Type::Primitive(PrimitiveKind::Float(Some(n))))
                .unwrap_or_else(Type::void),
            NodeKind::BoolLiteral => {
                let b = field_text(node, "value") == Some("True");
                Type::Primitive(PrimitiveKind::Boolean(Some(b)))
            }
            NodeKind::NilLiteral => Type::void(),
            NodeKind::StringLiteral => self.eval_string_literal(node),
            NodeKind::Identifier => {
                let name = field_text(node, "name").unwrap_or_default();
                self.resolve(name).unwrap_or_else(|| {
                    self.report(Level::Error, node.range.start, format!("unresolved identifier '{name}'"));
                    Type::void()
                })
            }
            NodeKind::SelfExpression => self.level_value(Kinship::Myself),
            NodeKind::SuperExpression => self.level_value(Kinship::Super),
            NodeKind::ArrayLiteral => {
                let items = field_nodes(node, "elements").iter().map(|e| self.eval_expr(e)).collect();
                make_array(items)
            }
            NodeKind::DictionaryLiteral => self.eval_dictionary_literal(node),
            NodeKind::ParenthesizedExpression => field_node(node, "inner").map(|n| self.eval_expr(n)).unwrap_or_else(Type::void),
            NodeKind::PrefixExpression => {
                let op = field_text(node, "operator").unwrap_or_default().to_string();
                if op == "++" || op == "--" {
                    return self.eval_increment(field_node(node, "operand"), &op, true);
                }
                let operand = field_node(node, "operand").map(|n| self.eval_expr(n)).unwrap_or_else(Type::void);
                self.apply_unary(&op, &operand, node.range.start)
            }
            NodeKind::PostfixExpression => {
                let op = field_text(node, "operator").unwrap_or_default().to_string();
                if op == "++" || op == "--" {
                    return self.eval_increment(field_node(node, "operand"), &op, false);
                }
                let operand = field_node(node, "operand").map(|n| self.eval_expr(n)).unwrap_or_else(Type::void);
                self.apply_unary(&op, &operand, node.range.start)
            }
            NodeKind::ExpressionsSequence => self.eval_expressions_sequence(node),
            NodeKind::CallExpression => self.eval_call(node),
            NodeKind::SubscriptExpression => self.eval_subscript(node),
            NodeKind::MemberExpression => self.eval_member(node),
            NodeKind::FunctionBody => self.eval_closure_literal(node),
            NodeKind::TryExpression => self.eval_try_expression(node),
            NodeKind::Unsupported => Type::void(),
            _ => Type::void(),
        }
    }

    fn level_value(&self, level: Kinship) -> Type {
        let scope = self.current_scope();
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if let Some(c) = self.arena.get(id) {
                if matches!(c.kind, CompositeKind::Object | CompositeKind::Class | CompositeKind::Structure) {
                    let target = c.levels.get(level).unwrap_or(id);
                    return Type::Composite(target);
                }
            }
            cursor = self.arena.get(id).and_then(|c| c.levels.scope);
        }
        Type::void()
    }

    fn eval_string_literal(&mut self, node: &Node) -> Type {
        let mut out = String::new();
        for segment in field_nodes(node, "segments") {
            match segment.kind {
                NodeKind::StringSegment => out.push_str(field_text(segment, "text").unwrap_or_default()),
                _ => {
                    let value = self.eval_expr(segment);
                    out.push_str(&value.normalize().canonical_string());
                }
            }
        }
        Type::Primitive(PrimitiveKind::String(Some(out)))
    }

    fn eval_dictionary_literal(&mut self, node: &Node) -> Type {
        let mut entries = DictionaryEntries::new();
        for entry in field_nodes(node, "entries") {
            let key = field_node(entry, "key").map(|n| self.eval_expr(n)).unwrap_or_else(Type::void);
            let value = field_node(entry, "value").map(|n| self.eval_expr(n)).unwrap_or_else(Type::void);
            entries.insert(key, value);
        }
        Type::Dictionary(DictionaryType {
            key: Box::new(Type::Predefined(PredefinedKind::Any)),
            value: Box::new(Type::Predefined(PredefinedKind::Any)),
            entries: Some(entries),
        })
    }

    /// `++`/`--`, pre- and postfix: reads the operand's current value,
    /// writes back the incremented/decremented value through its place,
    /// and returns the before value for postfix or the after value for
    /// prefix (spec.md §4.3's own wording).
    fn eval_increment(&mut self, operand_node: Option<&Node>, op: &str, is_prefix: bool) -> Type {
        let Some(operand_node) = operand_node else { return Type::void() };
        let old = self.eval_expr(operand_node);
        let delta: i64 = if op == "++" { 1 } else { -1 };
        let new = match &old {
            Type::Primitive(PrimitiveKind::Integer(Some(n))) => Type::Primitive(PrimitiveKind::Integer(Some(n + delta))),
            Type::Primitive(PrimitiveKind::Float(Some(n))) => Type::Primitive(PrimitiveKind::Float(Some(n + delta as f64))),
            _ => {
                self.report(Level::Error, operand_node.range.start, format!("'{op}' requires a numeric operand"));
                return old;
            }
        };
        self.eval_assignment_target(operand_node, new.clone());
        if is_prefix {
            new
        } else {
            old
        }
    }

    /// `try`/`try?` wraps a single value expression. `try?` swallows an
    /// escaping `throw` and resolves to `void` in its place; bare `try`
    /// leaves the throw pending for an enclosing `do`/function boundary to
    /// catch, exactly as if the expression hadn't been wrapped.
    fn eval_try_expression(&mut self, node: &Node) -> Type {
        let nillable = field_flag(node, "nillable");
        let Some(value_node) = field_node(node, "value") else { return Type::void() };
        let result = self.eval_expr(value_node);
        if nillable && self.control.current().kind == Some(ControlKind::Throw) {
            self.control.clear();
            return Type::void();
        }
        result
    }

    fn apply_unary(&mut self, op: &str, operand: &Type, position: usize) -> Type {
        match operators::eval_unary(op, operand) {
            Ok(v) => v,
            Err(message) => {
                self.report(Level::Error, position, message);
                Type::void()
            }
        }
    }

    /// Precedence-climbing reduction of the flat alternation `values` holds
    /// (expression, operator, expression, ...). `as`/`in`/`is` are
    /// subsequential (spec.md's own wording): they're accepted in an
    /// operator slot but don't bind by precedence against neighbors --
    /// folded left-to-right at whatever point they're encountered, against
    /// the accumulator built so far.
    fn eval_expressions_sequence(&mut self, node: &Node) -> Type {
        let values = field_nodes(node, "values");
        if values.is_empty() {
            return Type::void();
        }
        let operand_nodes: Vec<&Node> = values.iter().step_by(2).collect();
        let operators_between: Vec<&Node> = values.iter().skip(1).step_by(2).collect();
        // The first operand is only ever evaluated eagerly if assignment
        // doesn't end up claiming it as a place below; reading it first is
        // harmless (identifiers/members have no side effects to reorder).
        let evaluated: Vec<Type> = operand_nodes.iter().map(|n| self.eval_expr(n)).collect();
        self.reduce_sequence(&evaluated, &operand_nodes, &operators_between, 0).0
    }

    /// Returns the reduced value starting at `operands[start]` together with
    /// how many operators were consumed, so the caller can keep climbing.
    fn reduce_sequence(&mut self, operands: &[Type], operand_nodes: &[&Node], ops: &[&Node], start: usize) -> (Type, usize) {
        let mut lhs = operands[start].clone();
        let mut consumed = 0;
        while start + consumed < ops.len() {
            let op_node = ops[start + consumed];
            let op_text = field_text(op_node, "value").unwrap_or_default();
            if field_flag(op_node, "subsequential") {
                lhs = self.apply_subsequential(op_text, &lhs);
                consumed += 1;
                continue;
            }
            let Some((prec, _assoc)) = operators::precedence_of(op_text) else {
                consumed += 1;
                continue;
            };
            // Look ahead: fold every following operator of strictly higher
            // precedence into the right-hand side before combining.
            let mut rhs_start = start + consumed + 1;
            let mut rhs = operands[rhs_start].clone();
            let mut extra = 0;
            while rhs_start + extra < ops.len() {
                let next_op = ops[rhs_start + extra];
                if field_flag(next_op, "subsequential") {
                    break;
                }
                let next_text = field_text(next_op, "value").unwrap_or_default();
                match operators::precedence_of(next_text) {
                    Some((next_prec, _)) if next_prec > prec => {
                        let (folded, used) = self.reduce_sequence(operands, operand_nodes, ops, rhs_start);
                        rhs = folded;
                        extra = used - (rhs_start - (start + consumed + 1));
                        break;
                    }
                    _ => break,
                }
            }
            // Assignment (`=`/`+=`/...) is recognized here rather than in
            // `operators::eval_binary`: it needs the *place* (lhs's
            // originating node, not its already-read value) to know where
            // to write, and -- for compound forms -- the underlying binary
            // operator to combine the read-back place value with `rhs`.
            // Only fires at `consumed == 0`, since that's the only point
            // `lhs` is still a single untouched operand rather than an
            // already-folded accumulator.
            if consumed == 0 {
                if let Some(base_op) = assignment_base_op(op_text) {
                    let combined = match base_op {
                        "" => rhs.clone(),
                        b => self.apply_binary(b, &lhs, &rhs, op_node.range.start),
                    };
                    lhs = self.eval_assignment_target(operand_nodes[start], combined);
                    consumed += 1 + extra;
                    continue;
                }
            }
            lhs = self.apply_binary(op_text, &lhs, &rhs, op_node.range.start);
            consumed += 1 + extra;
        }
        (lhs, consumed)
    }

    fn apply_binary(&mut self, op: &str, lhs: &Type, rhs: &Type, position: usize) -> Type {
        match operators::eval_binary(op, lhs, rhs) {
            Ok(v) => v,
            Err(message) => {
                self.report(Level::Error, position, message);
                Type::void()
            }
        }
    }

    /// Writes `value` into the place `node` denotes (an identifier or a
    /// `base.member` expression), returning `value` back so the caller's
    /// fold can keep treating the assignment as an ordinary expression
    /// result (spec.md's grammar has no separate assignment-statement
    /// node -- `=` is just another operator in the sequence).
    fn eval_assignment_target(&mut self, node: &Node, value: Type) -> Type {
        match node.kind {
            NodeKind::Identifier => {
                let name = field_text(node, "name").unwrap_or_default().to_string();
                self.assign(&name, value.clone());
            }
            NodeKind::MemberExpression => {
                if let Some(base) = field_node(node, "base") {
                    let member = field_text(node, "member").unwrap_or_default().to_string();
                    if let Type::Composite(owner) = self.eval_expr(base) {
                        self.write_member(owner, &member, value.clone());
                    }
                }
            }
            _ => {
                self.report(Level::Error, node.range.start, "left-hand side of an assignment is not a place");
            }
        }
        value
    }

    /// Writes `name` in `owner`, firing `willSet`/`didSet` observers around
    /// the write when the member declares them (spec.md §3's observer
    /// table, §4.3's "read/write members (triggering observers)"). Members
    /// with no declared observers (the common case) behave exactly like a
    /// plain [`Interpreter::set_member`].
    pub fn write_member(&mut self, owner: CompositeId, name: &str, value: Type) {
        let observers = self
            .arena
            .get(owner)
            .and_then(|c| c.members.get(name))
            .and_then(|overloads| overloads.last())
            .map(|m| (m.observers.get(&ObserverKind::WillSet).copied(), m.observers.get(&ObserverKind::DidSet).copied()));
        let Some((will_set, did_set)) = observers else {
            self.set_member(owner, name.to_string(), value);
            return;
        };
        if will_set.is_none() && did_set.is_none() {
            self.set_member(owner, name.to_string(), value);
            return;
        }
        let old_value = self.get_member(owner, name);
        if let Some(f) = will_set {
            self.invoke_function(f, vec![value.clone()]);
        }
        self.set_member(owner, name.to_string(), value);
        if let Some(f) = did_set {
            self.invoke_function(f, vec![old_value.unwrap_or_else(Type::void)]);
        }
    }

    /// Reads `name` in `owner`, firing `willGet`/`get`/`didGet` observers
    /// around the read when the member declares them (spec.md §3's observer
    /// table). A declared `get` overload replaces the stored value with its
    /// return, the same way `didSet` observes rather than replaces --
    /// members with no declared observers behave exactly like a plain
    /// [`Interpreter::get_member`].
    fn read_member(&mut self, owner: CompositeId, name: &str) -> Type {
        let observers = self.arena.get(owner).and_then(|c| c.members.get(name)).and_then(|overloads| overloads.last()).map(|m| {
            (
                m.observers.get(&ObserverKind::WillGet).copied(),
                m.observers.get(&ObserverKind::Get).copied(),
                m.observers.get(&ObserverKind::DidGet).copied(),
            )
        });
        let Some((will_get, get_override, did_get)) = observers else {
            return self.get_member(owner, name).unwrap_or_else(Type::void);
        };
        if will_get.is_none() && get_override.is_none() && did_get.is_none() {
            return self.get_member(owner, name).unwrap_or_else(Type::void);
        }
        if let Some(f) = will_get {
            self.invoke_function(f, vec![]);
        }
        let value = match get_override {
            Some(f) => self.invoke_function(f, vec![]),
            None => self.get_member(owner, name).unwrap_or_else(Type::void),
        };
        if let Some(f) = did_get {
            self.invoke_function(f, vec![value.clone()]);
        }
        value
    }

    /// Builds the observer function composites an `observersBody` node
    /// declares and attaches them to `member_name`'s freshest overload in
    /// `owner` (spec.md §3: each observer kind "resolves to a function
    /// composite"). `willSet`/`set` bind their implicit argument as
    /// `newValue`, `didSet` as `oldValue`, matching the convention named in
    /// the grammar's own observer-kind vocabulary.
    fn declare_observers(&mut self, owner: CompositeId, member_name: &str, observers_body: &Node) {
        let mut built = Vec::new();
        for decl in field_nodes(observers_body, "observers") {
            let Some(kind_name) = field_text(decl, "kind") else { continue };
            let Some(kind) = ObserverKind::from_keyword(kind_name) else { continue };
            let Some(body) = field_node(decl, "body") else { continue };
            let param_name = match kind {
                ObserverKind::WillSet | ObserverKind::Set => "newValue",
                ObserverKind::DidSet => "oldValue",
                _ => "value",
            };
            let statements = field_nodes(body, "statements").to_vec();
            let func = self.alloc("observer", CompositeKind::Function);
            if let Some(c) = self.arena.get_mut(func) {
                c.parameters = vec![ParameterSpec { name: param_name.to_string(), variadic: false, default: None }];
                c.statements = Some(statements);
            }
            self.retain(func, owner);
            built.push((kind, func));
        }
        if let Some(c) = self.arena.get_mut(owner) {
            if let Some(overload) = c.members.get_mut(member_name).and_then(|v| v.last_mut()) {
                for (kind, func) in built {
                    overload.observers.insert(kind, func);
                }
            }
        }
    }

    fn apply_subsequential(&mut self, keyword: &str, lhs: &Type) -> Type {
        match keyword {
            "Is" => Type::Primitive(PrimitiveKind::Boolean(Some(!lhs.is_void()))),
            _ => lhs.clone(),
        }
    }

    fn eval_call(&mut self, node: &Node) -> Type {
        let Some(base) = field_node(node, "base") else { return Type::void() };
        let mut args: Vec<Type> = field_nodes(node, "arguments")
            .iter()
            .map(|a| field_node(a, "value").map(|v| self.eval_expr(v)).unwrap_or_else(Type::void))
            .collect();
        if let Some(closure) = field_node(node, "trailingClosure") {
            args.push(self.eval_closure_literal(closure));
        }
        if let NodeKind::Identifier = base.kind {
            let name = field_text(base, "name").unwrap_or_default();
            if name == "print" && self.resolve(name).is_none() {
                let rendered: Vec<String> = args.iter().map(|a| a.normalize().canonical_string()).collect();
                self.print(rendered.join(" "));
                return Type::void();
            }
        }
        let callee = self.eval_expr(base);
        match callee {
            Type::Composite(id) if self.arena.get(id).map(|c| c.kind) == Some(CompositeKind::Function) => self.invoke_function(id, args),
            _ => {
                self.report(Level::Error, node.range.start, "callee is not a function");
                Type::void()
            }
        }
    }

    fn eval_subscript(&mut self, node: &Node) -> Type {
        let Some(base) = field_node(node, "base") else { return Type::void() };
        let base_value = self.eval_expr(base);
        let Some(arg) = field_nodes(node, "arguments").first() else { return Type::void() };
        let key = field_node(arg, "value").map(|v| self.eval_expr(v)).unwrap_or_else(Type::void);
        match &base_value {
            Type::Dictionary(d) => d.entries.as_ref().and_then(|e| e.get(&key)).cloned().unwrap_or_else(Type::void),
            _ => Type::void(),
        }
    }

    fn eval_member(&mut self, node: &Node) -> Type {
        let Some(base) = field_node(node, "base") else { return Type::void() };
        let member = field_text(node, "member").unwrap_or_default();
        let base_value = self.eval_expr(base);
        match base_value {
            Type::Composite(id) => self.read_member(id, member),
            _ => Type::void(),
        }
    }

    fn eval_closure_literal(&mut self, node: &Node) -> Type {
        let params = field_node(node, "parameters")
            .map(|p| field_tokens(p, "names").iter().map(|n| ParameterSpec { name: n.clone(), variadic: false, default: None }).collect())
            .unwrap_or_default();
        let statements = field_nodes(node, "statements").to_vec();
        let id = self.alloc("closure", CompositeKind::Function);
        if let Some(c) = self.arena.get_mut(id) {
            c.parameters = params;
            c.statements = Some(statements);
        }
        Type::Composite(id)
    }

    /// Calls the function composite `id` with positional `args`, isolating
    /// its control-transfer frame so an inner `return` can't leak past the
    /// call boundary. The call's local scope is popped before its own
    /// control frame, so a `return`ed composite is still recognized as
    /// significant (kept alive by the in-flight control value) at the
    /// moment the scope that produced it goes away.
    pub fn invoke_function(&mut self, id: CompositeId, args: Vec<Type>) -> Type {
        let (params, statements) = match self.arena.get(id) {
            Some(c) => (c.parameters.clone(), c.statements.clone()),
            None => return Type::void(),
        };
        let call_scope = self.alloc("call", CompositeKind::Object);
        self.add_scope(call_scope);
        self.control.push();
        for (i, param) in params.iter().enumerate() {
            if param.variadic {
                let rest = args.get(i..).map(|s| s.to_vec()).unwrap_or_default();
                self.set_member(call_scope, param.name.clone(), make_array(rest));
                break;
            }
            let value = args.get(i).cloned().or_else(|| param.default.clone()).unwrap_or_else(Type::void);
            self.set_member(call_scope, param.name.clone(), value);
        }
        if let Some(stmts) = &statements {
            self.eval_statements(stmts);
        }
        self.remove_scope(false);
        let frame = self.control.pop();
        match frame.kind {
            Some(ControlKind::Return) => frame.value.unwrap_or_else(Type::void),
            Some(ControlKind::Throw) => {
                self.control.set(ControlFrame::transfer(ControlKind::Throw, frame.value.clone()));
                frame.value.unwrap_or_else(Type::void)
            }
            _ => Type::void(),
        }
    }
}

fn parameter_spec(node: &Node) -> Option<ParameterSpec> {
    let name = field_text(node, "name")?.to_string();
    Some(ParameterSpec { name, variadic: field_flag(node, "variadic"), default: None })
}
