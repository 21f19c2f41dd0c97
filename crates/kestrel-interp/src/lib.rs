//! Composite arena, ARC, scope/control stacks, and the AST-walking execution
//! dispatcher (spec.md §4.3, §4.4). Ties `kestrel-parser`'s AST to
//! `kestrel-types`'s type lattice: evaluating a node *is* computing a
//! `Type`-valued result, per spec.md's own framing that the dispatcher
//! "returns a type-value" for every node it walks.

pub mod arc;
pub mod arena;
pub mod composite;
pub mod control;
pub mod eval;
pub mod operators;

use kestrel_common::{Diagnostic, Event, Level, Location, NullObserver, Observer, Source};
pub use kestrel_types::{CompositeId, CompositeKind, Type};

use arena::Arena;
use composite::{collect_type_composites, Composite, Level as Kinship, Member, MemberModifiers};
use control::ControlStack;

/// Ties the composite arena, the scope/control stacks, and an `Observer`
/// together into one executable instance. One `Interpreter` corresponds to
/// one running module (spec.md §6: each `--interpret` invocation is its own
/// module, numbered for the `removeAll`/`report` event stream).
pub struct Interpreter {
    pub(crate) arena: Arena,
    /// The active lexical/call namespace chain, innermost last. Index 0 is
    /// always [`CompositeId::GLOBAL`] and is never popped.
    pub(crate) scopes: Vec<CompositeId>,
    pub(crate) control: ControlStack,
    observer: Box<dyn Observer>,
    module_id: u64,
    /// spec.md §6 `--preciseArithmetics`: reserved for a future bignum/
    /// rational numeric tower: the type lattice's `Integer`/`Float` payloads
    /// are already `i64`/`f64`, so this flag is inert until one lands.
    pub precise_arithmetics: bool,
    /// Every diagnostic reported so far, mirroring what the observer saw --
    /// kept for collaborators (e.g. `kestrelc`) that want to render the
    /// final set without having installed an observer up front.
    pub reports: Vec<Diagnostic>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            scopes: vec![CompositeId::GLOBAL],
            control: ControlStack::new(),
            observer: Box::new(NullObserver),
            module_id: 0,
            precise_arithmetics: false,
            reports: Vec::new(),
        }
    }

    pub fn with_observer(observer: Box<dyn Observer>) -> Self {
        Self { observer, ..Self::new() }
    }

    pub fn set_observer(&mut self, observer: Box<dyn Observer>) {
        self.observer = observer;
    }

    // ---- scope stack discipline (spec.md §4.4) ----

    pub fn current_scope(&self) -> CompositeId {
        *self.scopes.last().expect("scope stack always carries the global namespace")
    }

    pub fn add_scope(&mut self, id: CompositeId) {
        self.scopes.push(id);
    }

    /// Pops the innermost scope. Unless `suppress` is set (used when the
    /// popped composite is about to be handed off as e.g. a `return` value
    /// and must survive the pop to be picked up by `significant`'s
    /// control-transfer check), the popped composite is offered to the
    /// destruction protocol immediately.
    pub fn remove_scope(&mut self, suppress: bool) -> Option<CompositeId> {
        if self.scopes.len() <= 1 {
            return None;
        }
        let popped = self.scopes.pop();
        if let Some(id) = popped {
            if !suppress {
                self.attempt_destroy(id);
            }
        }
        popped
    }

    // ---- member read/write with ARC bookkeeping ----

    pub fn get_member(&self, owner: CompositeId, name: &str) -> Option<Type> {
        self.arena.get(owner)?.members.get(name)?.last().map(|m| m.value.clone())
    }

    pub fn has_member(&self, owner: CompositeId, name: &str) -> bool {
        self.arena.get(owner).is_some_and(|c| c.members.contains_key(name))
    }

    /// Overwrites (or creates) a single-overload member, retaining every
    /// composite the new value reaches and releasing whatever the old value
    /// alone used to reach (spec.md §4.3: assignment is itself a retain/
    /// release pair on the old and new values).
    pub fn set_member(&mut self, owner: CompositeId, name: impl Into<String>, value: Type) {
        let name = name.into();
        let old = self.arena.get(owner).and_then(|c| c.members.get(&name)).and_then(|v| v.last()).map(|m| m.value.clone());
        let mut new_refs = Vec::new();
        collect_type_composites(&value, &mut new_refs);
        if let Some(c) = self.arena.get_mut(owner) {
            c.members.insert(name, vec![Member::new(value)]);
        }
        for &r in &new_refs {
            self.retain(r, owner);
        }
        if let Some(old_value) = old {
            let mut old_refs = Vec::new();
            collect_type_composites(&old_value, &mut old_refs);
            for r in old_refs {
                if !new_refs.contains(&r) {
                    self.release(r, owner);
                }
            }
        }
    }

    /// Same as [`Interpreter::set_member`], but stamps the freshly-inserted
    /// overload with `modifiers` (spec.md §3's per-member `private|
    /// protected|public|static|final|lazy|virtual` table) instead of
    /// leaving it at [`MemberModifiers::default`].
    pub fn set_member_with_modifiers(&mut self, owner: CompositeId, name: impl Into<String>, value: Type, modifiers: MemberModifiers) {
        let name = name.into();
        self.set_member(owner, name.clone(), value);
        if let Some(c) = self.arena.get_mut(owner) {
            if let Some(m) = c.members.get_mut(&name).and_then(|v| v.last_mut()) {
                m.modifiers = modifiers;
            }
        }
    }

    /// Resolves `name` by walking the scope chain innermost-first, then
    /// falling back to each scope's `imports`.
    pub fn resolve(&self, name: &str) -> Option<Type> {
        for &scope in self.scopes.iter().rev() {
            if let Some(v) = self.get_member(scope, name) {
                return Some(v);
            }
            if let Some(c) = self.arena.get(scope) {
                if let Some(&imported) = c.imports.get(name) {
                    return Some(Type::Composite(imported));
                }
            }
        }
        None
    }

    /// Assigns `name`, updating whichever scope already declares it, or
    /// declaring it fresh in the innermost scope if none does.
    pub fn assign(&mut self, name: &str, value: Type) {
        let chain: Vec<CompositeId> = self.scopes.iter().rev().copied().collect();
        for scope in chain {
            if self.has_member(scope, name) {
                self.write_member(scope, name, value);
                return;
            }
        }
        let scope = self.current_scope();
        self.set_member(scope, name, value);
    }

    // ---- composite creation ----

    pub fn alloc(&mut self, title: impl Into<String>, kind: CompositeKind) -> CompositeId {
        let id = self.arena.alloc(title, kind);
        let scope = self.current_scope();
        self.set_level(id, Kinship::Scope, Some(scope)).ok();
        id
    }

    // ---- diagnostics ----

    pub fn report(&mut self, level: Level, position: usize, message: impl Into<String>) {
        let message = message.into();
        let location = Location::new(1, 1);
        self.observer.notify(Event::Report { level, position, location, message: message.clone() });
        self.reports.push(Diagnostic::new(level, position, location, message));
    }

    pub fn print(&mut self, message: impl Into<String>) {
        self.observer.notify(Event::Print { message: message.into() });
    }

    /// Number of currently-occupied arena slots. Exposed for callers that
    /// want to assert ARC soundness (spec.md §8) end-to-end rather than by
    /// poking the arena directly.
    pub fn alive_count(&self) -> usize {
        self.arena.live_ids().len()
    }

    pub fn begin_module(&mut self) -> u64 {
        let id = self.module_id;
        self.module_id += 1;
        self.observer.notify(Event::RemoveAll { source: Source::Interpreter, module_id: id });
        id
    }
}
