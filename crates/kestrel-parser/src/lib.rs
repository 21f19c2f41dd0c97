//! Recursive-descent parser: turns a trivia-filtered token stream into a
//! `module`-rooted AST, with fault-tolerant recovery and diagnostic
//! retraction on cursor rollback.

pub mod grammar;
pub mod node;
pub mod parser;

pub use node::{Field, Fields, Node, NodeKind, NodeRange};
pub use parser::Parser;

use kestrel_common::{Diagnostic, Event};
use kestrel_lexer::Lexer;

/// Lexes and parses `source` in one call, returning the `module` node, the
/// final (post-retraction) diagnostic list, and the full event stream a
/// live `Observer` would have seen (including events for diagnostics that
/// were later retracted by a rollback).
pub fn parse(source: &str) -> (Node, Vec<Diagnostic>, Vec<Event>) {
    let tokens: Vec<_> = Lexer::tokenize(source).into_iter().filter(|t| !t.trivia).collect();
    let mut parser = Parser::new(tokens);
    let module = parser.parse_module();
    let (reports, events) = parser.into_reports_and_events();
    (module, reports, events)
}
