//! Shared types for the Kestrel toolchain: tokens, source spans, diagnostics,
//! and the `Observer` contract the lexer/parser/interpreter report through.

pub mod diagnostic;
pub mod observer;
pub mod span;
pub mod token;

pub use diagnostic::{Diagnostic, Level};
pub use observer::{Event, NullObserver, Observer, RecordingObserver, Source};
pub use span::{Location, LineIndex};
pub use token::{keyword_name, OperatorPlacement, Token, TokenKind};
