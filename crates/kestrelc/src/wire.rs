//! The JSON wire format (spec.md §6): every numeric position/range is a
//! non-negative integer, strings use standard JSON escaping (handled by
//! `serde_json` itself), and a token's `type` is rendered as the
//! human-readable string spec.md names (`identifier`, `keywordIf`,
//! `operatorInfix`, ...) rather than Rust's own enum tag.
//!
//! `kestrel_common::Token` derives `Serialize` for debugging convenience,
//! but its `TokenKind` would serialize as an externally-tagged enum --
//! useful internally, not the flat `type` string collaborators expect over
//! the wire. This module bridges the two.

use kestrel_common::Token;
use serde_json::{json, Value};

pub fn token_to_wire(token: &Token) -> Value {
    json!({
        "position": token.position,
        "location": { "line": token.location.line, "column": token.location.column },
        "type": token.type_string(),
        "value": token.value,
        "trivia": token.trivia,
        "nonmergeable": token.nonmergeable,
        "generated": token.generated,
    })
}

pub fn tokens_to_wire(tokens: &[Token]) -> Value {
    Value::Array(tokens.iter().map(token_to_wire).collect())
}
