use serde::Serialize;

use crate::span::Location;

/// Diagnostic severity. Numeric values match spec.md's level encoding so
/// that the JSON wire format's `level` field is stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum Level {
    Info = 0,
    Warning = 1,
    Error = 2,
}

/// A single parser or interpreter diagnostic.
///
/// `position` is a token index into the filtered token stream the parser
/// was working from, not a byte offset -- this is what lets the parser
/// retract diagnostics on cursor rollback by comparing positions directly.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub position: usize,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn new(level: Level, position: usize, location: Location, message: impl Into<String>) -> Self {
        Self {
            level,
            position,
            location,
            message: message.into(),
        }
    }
}
