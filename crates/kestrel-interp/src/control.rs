//! The control-transfer stack (spec.md §4.4): `break`/`continue`/
//! `fallthrough`/`return`/`throw` all unwind by pushing a frame and letting
//! enclosing statement evaluators pop and interpret it, rather than by
//! native Rust unwinding.

use kestrel_types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Break,
    Continue,
    Fallthrough,
    Return,
    Throw,
}

/// One pending control transfer. `kind: None` is a plain, completed
/// statement frame with no transfer in flight.
#[derive(Debug, Clone, Default)]
pub struct ControlFrame {
    pub value: Option<Type>,
    pub kind: Option<ControlKind>,
}

impl ControlFrame {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn transfer(kind: ControlKind, value: Option<Type>) -> Self {
        Self { value, kind: Some(kind) }
    }

    pub fn is_transfer(&self) -> bool {
        self.kind.is_some()
    }

    pub fn is(&self, kind: ControlKind) -> bool {
        self.kind == Some(kind)
    }
}

/// A call-scoped stack of frames. `eval.rs` pushes a fresh frame on entry to
/// every function body and loop body, and consults the top frame after each
/// statement to decide whether to keep evaluating, break out, or propagate
/// further up.
#[derive(Debug, Default)]
pub struct ControlStack {
    frames: Vec<ControlFrame>,
}

impl ControlStack {
    pub fn new() -> Self {
        Self { frames: vec![ControlFrame::none()] }
    }

    pub fn current(&self) -> &ControlFrame {
        self.frames.last().expect("control stack is never empty")
    }

    pub fn set(&mut self, frame: ControlFrame) {
        *self.frames.last_mut().expect("control stack is never empty") = frame;
    }

    pub fn clear(&mut self) {
        self.set(ControlFrame::none());
    }

    pub fn is_transfer(&self) -> bool {
        self.current().is_transfer()
    }

    /// Enters a new call frame (spec.md §4.4: `return`/`throw` unwind only
    /// up to the function boundary that catches them, not past it).
    pub fn push(&mut self) {
        self.frames.push(ControlFrame::none());
    }

    /// Leaves the current call frame, returning whatever was pending in it
    /// so the caller (`invoke_function`) can read off a `return`/`throw`
    /// payload before the scope that produced it is popped.
    pub fn pop(&mut self) -> ControlFrame {
        self.frames.pop().unwrap_or_default()
    }

    pub fn threw(&self) -> bool {
        self.current().is(ControlKind::Throw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stack_has_no_transfer() {
        let stack = ControlStack::new();
        assert!(!stack.is_transfer());
    }

    #[test]
    fn set_and_clear_round_trip() {
        let mut stack = ControlStack::new();
        stack.set(ControlFrame::transfer(ControlKind::Return, Some(Type::void())));
        assert!(stack.is_transfer());
        assert!(stack.current().is(ControlKind::Return));
        stack.clear();
        assert!(!stack.is_transfer());
    }

    #[test]
    fn threw_detects_only_throw_kind() {
        let mut stack = ControlStack::new();
        stack.set(ControlFrame::transfer(ControlKind::Break, None));
        assert!(!stack.threw());
        stack.set(ControlFrame::transfer(ControlKind::Throw, Some(Type::void())));
        assert!(stack.threw());
    }
}
