//! The CLI's two `Observer` implementations (spec.md §6 is the only
//! contract the core exposes; everything here is the "out of scope"
//! wrapper named in spec.md §1).
//!
//! `ReportingObserver` is used by `--interpret`: it renders `add`/`report`
//! events with `ariadne`, filtered by `--reportsLevel`, and silently drops
//! `tokenized`/`parsed`/`removeAll`/`removeAfterPosition` (a terminal isn't
//! a dashboard). `DashboardObserver` is used by `--dashboard`: since the
//! actual connection fan-out is an out-of-scope collaborator (spec.md §1),
//! this stands in for it by emitting every event as one JSON line per
//! event on stdout -- the wire format spec.md §6 describes, with no
//! transport attached.

use ariadne::{Color, Label, Report, ReportKind, Source};
use kestrel_common::{Event, Level, Observer};
use serde_json::json;

/// Renders diagnostics against the original source text. `token_offsets[i]`
/// is the byte offset of the `i`th token in the filtered stream the parser
/// consumed -- `Add`/`Report` events carry a token-index `position`, and
/// this is what turns that back into a byte range `ariadne` can underline.
pub struct ReportingObserver {
    source: String,
    reports_level: u8,
    token_offsets: Vec<u32>,
}

impl ReportingObserver {
    pub fn new(source: String, token_offsets: Vec<u32>, reports_level: u8) -> Self {
        Self { source, reports_level, token_offsets }
    }

    fn byte_range(&self, position: usize) -> std::ops::Range<usize> {
        let start = self
            .token_offsets
            .get(position)
            .copied()
            .or_else(|| self.token_offsets.last().copied())
            .unwrap_or(0) as usize;
        let end = (start + 1).min(self.source.len().max(1));
        start.min(self.source.len())..end
    }

    fn emit(&mut self, level: Level, position: usize, message: &str) {
        if (level as u8) < self.reports_level {
            return;
        }
        let (kind, color) = match level {
            Level::Info => (ReportKind::Advice, Color::Cyan),
            Level::Warning => (ReportKind::Warning, Color::Yellow),
            Level::Error => (ReportKind::Error, Color::Red),
        };
        let range = self.byte_range(position);
        let _ = Report::<std::ops::Range<usize>>::build(kind, range.clone())
            .with_message(message)
            .with_label(Label::new(range).with_message(message).with_color(color))
            .finish()
            .eprint(Source::from(&self.source));
    }
}

impl Observer for ReportingObserver {
    fn notify(&mut self, event: Event) {
        match event {
            Event::Add { level, position, message, .. } => self.emit(level, position, &message),
            Event::Report { level, position, message, .. } => self.emit(level, position, &message),
            Event::Print { message } => println!("{message}"),
            Event::RemoveAll { .. } | Event::Tokenized { .. } | Event::Parsed { .. } | Event::RemoveAfterPosition { .. } => {}
        }
    }
}

/// Stands in for the socket/dashboard fan-out named as out-of-scope in
/// spec.md §1: every event this process's lexer/parser/interpreter emits is
/// printed as one JSON object per line, in emission order, matching the
/// ordering guarantee spec.md §5 places on a real observer.
pub struct DashboardObserver;

impl Observer for DashboardObserver {
    fn notify(&mut self, event: Event) {
        let value = match event {
            Event::RemoveAll { source, module_id } => {
                json!({ "source": source.as_str(), "action": "removeAll", "moduleID": module_id })
            }
            Event::Tokenized { tokens } => json!({ "source": "lexer", "action": "tokenized", "tokens": tokens }),
            Event::Parsed { tree } => json!({ "source": "parser", "action": "parsed", "tree": tree }),
            Event::RemoveAfterPosition { position } => {
                json!({ "source": "parser", "action": "removeAfterPosition", "position": position })
            }
            Event::Add { level, position, location, message } => json!({
                "source": "parser",
                "action": "add",
                "level": level as u8,
                "position": position,
                "location": { "line": location.line, "column": location.column },
                "string": message,
            }),
            Event::Report { level, position, location, message } => json!({
                "source": "interpreter",
                "action": "report",
                "level": level as u8,
                "position": position,
                "location": { "line": location.line, "column": location.column },
                "string": message,
            }),
            Event::Print { message } => json!({ "source": "interpreter", "action": "print", "string": message }),
        };
        println!("{value}");
    }
}
