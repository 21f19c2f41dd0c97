use serde_json::Value;

use crate::diagnostic::Level;
use crate::span::Location;

/// Which pipeline stage emitted an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Lexer,
    Parser,
    Interpreter,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Lexer => "lexer",
            Source::Parser => "parser",
            Source::Interpreter => "interpreter",
        }
    }
}

/// A tagged event announced to the [`Observer`] by the lexer, parser, or
/// interpreter. This is the sole externally visible contract of the core
/// (spec.md §2, §6) -- collaborators (CLI, socket relay, scheduler,
/// dashboard) see only these events, never internal state.
///
/// `tokens`/`tree` carry pre-serialized JSON rather than typed values so
/// that this crate does not need to depend on `kestrel-parser`; every
/// downstream crate that produces one of these knows how to turn its
/// output into the wire format described in spec.md §6.
#[derive(Debug, Clone)]
pub enum Event {
    /// Emitted by lexer/parser/interpreter at the start of their phase.
    RemoveAll { source: Source, module_id: u64 },
    /// End of lex.
    Tokenized { tokens: Value },
    /// End of parse.
    Parsed { tree: Value },
    /// Parser cursor retreated; diagnostics at or beyond `position` are
    /// retracted by the caller before this event is sent.
    RemoveAfterPosition { position: usize },
    /// A parser diagnostic.
    Add {
        level: Level,
        position: usize,
        location: Location,
        message: String,
    },
    /// An interpreter diagnostic.
    Report {
        level: Level,
        position: usize,
        location: Location,
        message: String,
    },
    /// Non-diagnostic interpreter output (e.g. a script's `print`).
    Print { message: String },
}

/// Sink for pipeline events. Abstract so the core never depends on how
/// events reach collaborators (stdout, a socket relay, a dashboard fan-out).
///
/// Calls are fire-and-forget: the core does not wait for delivery and stays
/// correct if an implementation drops events (spec.md §5).
pub trait Observer {
    fn notify(&mut self, event: Event);
}

/// An observer that discards every event. Useful as a default / in tests
/// that don't care about the event stream.
#[derive(Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn notify(&mut self, _event: Event) {}
}

/// An observer that records every event it receives, in order. Useful for
/// asserting ordering guarantees in tests (spec.md §5: `removeAll` must
/// precede any subsequent event in the same phase; events within a phase
/// must preserve emission order).
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<Event>,
}

impl Observer for RecordingObserver {
    fn notify(&mut self, event: Event) {
        self.events.push(event);
    }
}
