//! Full source-to-result scenarios (spec.md §8 "Concrete end-to-end
//! scenarios"), threading the real lexer/parser output into the
//! interpreter rather than hand-built ASTs.

use kestrel_interp::Interpreter;
use kestrel_types::{PrimitiveKind, Type};

fn run(source: &str) -> Type {
    let (module, reports, _events) = kestrel_parser::parse(source);
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    interp.run_module(&module)
}

#[test]
fn integer_arithmetic_follows_precedence() {
    // scenario 1: `return 1 + 2 * 3` must evaluate to 7, not 9.
    let result = run("return 1 + 2 * 3");
    assert_eq!(result, Type::Primitive(PrimitiveKind::Integer(Some(7))));
}

#[test]
fn string_interpolation_concatenates_evaluated_expression() {
    // scenario 2: `'x=\(1+2)'` evaluates to the string "x=3".
    let result = run("return 'x=\\(1+2)'");
    match result {
        Type::Primitive(PrimitiveKind::String(Some(s))) => assert_eq!(s, "x=3"),
        other => panic!("expected a string result, got {other:?}"),
    }
}

#[test]
fn top_level_declaration_is_retained_by_the_global_namespace() {
    let (module, reports, _) = kestrel_parser::parse("class Box { }");
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    interp.run_module(&module);
    assert_eq!(interp.alive_count(), 2, "the global scope plus the Box class it retains");
}

#[test]
fn scope_exit_destroys_unreferenced_composite() {
    // scenario 5: a composite constructed inside an `if` body with no
    // surrounding-scope reference does not survive past the block.
    let (module, reports, _) = kestrel_parser::parse("if true { class Box { } }");
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    interp.run_module(&module);

    // The if-block's own namespace retained `Box`, but nothing retains the
    // if-block's namespace once execution leaves it -- the cascade takes
    // both down, leaving only the global namespace.
    let alive = interp.alive_count();
    assert_eq!(alive, 1, "expected only the global scope to remain alive");
}

#[test]
fn function_call_returns_value_across_scope_teardown() {
    let (module, reports, _) = kestrel_parser::parse("func add(a, b) { return a + b } return add(2, 3)");
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    assert_eq!(result, Type::Primitive(PrimitiveKind::Integer(Some(5))));
}

#[test]
fn unclosed_function_body_autocloses_and_still_runs() {
    // scenario 4, run through the interpreter: the autoclosed body parses to
    // an empty statement list and executes without panicking.
    let (module, reports, _) = kestrel_parser::parse("func f(){");
    assert_eq!(reports.len(), 1);
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    assert!(result.is_void());
}

#[test]
fn assignment_writes_back_to_a_declared_variable() {
    let (module, reports, _) = kestrel_parser::parse("var x = 1\nx = x + 4\nreturn x");
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    assert_eq!(result, Type::Primitive(PrimitiveKind::Integer(Some(5))));
}

#[test]
fn compound_assignment_combines_with_the_current_value() {
    let (module, reports, _) = kestrel_parser::parse("var x = 10\nx -= 3\nreturn x");
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    assert_eq!(result, Type::Primitive(PrimitiveKind::Integer(Some(7))));
}

#[test]
fn prefix_increment_returns_the_value_after_writing_it_back() {
    let (module, reports, _) = kestrel_parser::parse("var x = 1\nreturn ++x");
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    assert_eq!(result, Type::Primitive(PrimitiveKind::Integer(Some(2))));
}

#[test]
fn postfix_decrement_returns_the_value_before_writing_it_back() {
    let (module, reports, _) = kestrel_parser::parse("var x = 5\nvar y = x--\nreturn y + x");
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    // y captured the pre-decrement value (5), x is now 4: 5 + 4 = 9.
    assert_eq!(result, Type::Primitive(PrimitiveKind::Integer(Some(9))));
}

#[test]
fn did_set_observer_fires_after_an_assignment_with_the_old_value() {
    let source = "var x = 1 { didSet { log = oldValue } }\nvar log = 0\nx = 9\nreturn log";
    let (module, reports, _) = kestrel_parser::parse(source);
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    assert_eq!(result, Type::Primitive(PrimitiveKind::Integer(Some(1))));
}

#[test]
fn catch_all_clause_runs_when_the_do_block_throws() {
    let source = "func risky() { throw 1 }\nvar log = 0\ndo { risky() } catch { log = 9 }\nreturn log";
    let (module, reports, _) = kestrel_parser::parse(source);
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    assert_eq!(result, Type::Primitive(PrimitiveKind::Integer(Some(9))));
}

#[test]
fn nillable_try_swallows_an_escaping_throw() {
    let source = "func risky() { throw 1 }\nreturn try? risky()";
    let (module, reports, _) = kestrel_parser::parse(source);
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    let result = interp.run_module(&module);
    assert!(result.is_void(), "a swallowed throw should resolve to void, got {result:?}");
}

#[test]
fn uncaught_throw_at_module_scope_is_reported_as_a_fatal_diagnostic() {
    let (module, reports, _) = kestrel_parser::parse("throw 99");
    assert!(reports.is_empty(), "unexpected parse diagnostics: {reports:?}");
    let mut interp = Interpreter::new();
    interp.run_module(&module);
    assert_eq!(interp.reports.len(), 1);
    assert_eq!(interp.reports[0].level, kestrel_common::Level::Error);
    assert!(interp.reports[0].message.contains("uncaught throw"));
}

