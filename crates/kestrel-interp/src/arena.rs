//! The composite arena: a dense, ordered sequence of vacatable slots
//! (spec.md §3: "a dense ordered sequence; index 0 is the global
//! namespace"). Strict-ownership translation of the reference
//! interpreter's pointer-free, index-based composite graph (spec.md §9).

use kestrel_types::{CompositeId, CompositeInfo, CompositeKind, Type};

use crate::composite::{Composite, Level};

#[derive(Debug, Default)]
pub struct Arena {
    slots: Vec<Option<Composite>>,
}

/// Returned by [`Arena::set_level`] when a write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetLevelError {
    /// Writing would close a cycle along this level's chain (spec.md
    /// §4.3); the prior value is left untouched.
    WouldCycle,
}

impl Arena {
    pub fn new() -> Self {
        let mut arena = Self { slots: Vec::new() };
        let global = Composite::new(CompositeId::GLOBAL, "global", CompositeKind::Namespace);
        arena.slots.push(Some(global));
        arena.slots[0].as_mut().unwrap().life = crate::composite::Life::Idle;
        arena
    }

    pub fn get(&self, id: CompositeId) -> Option<&Composite> {
        self.slots.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: CompositeId) -> Option<&mut Composite> {
        self.slots.get_mut(id.0).and_then(|s| s.as_mut())
    }

    pub fn is_alive(&self, id: CompositeId) -> bool {
        matches!(self.get(id), Some(c) if c.life != crate::composite::Life::Destroying)
    }

    /// Allocates a new slot at the end of the arena (spec.md §3: "`own`
    /// equals its arena index"). Returns the freshly minted ID so the
    /// caller can finish populating the composite.
    pub fn alloc(&mut self, title: impl Into<String>, kind: CompositeKind) -> CompositeId {
        let id = CompositeId(self.slots.len());
        self.slots.push(Some(Composite::new(id, title, kind)));
        id
    }

    /// Clears an occupied slot, making it vacant. Called only by the
    /// destruction protocol once a composite's retainer bookkeeping is
    /// done (spec.md §4.3 step 4).
    pub fn vacate(&mut self, id: CompositeId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = None;
        }
    }

    /// Every currently-occupied slot ID, in arena order.
    pub fn live_ids(&self) -> Vec<CompositeId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| CompositeId(i)))
            .collect()
    }

    /// Walks `start`'s chain along `level` until it runs out (`None`) or
    /// reaches `target`. Used by `set_level`'s cycle check: a write of
    /// `level` on `into` to `target` would close a cycle iff `into` is
    /// reachable by walking `level` forward from `target`.
    fn chain_reaches(&self, target: CompositeId, level: Level, into: CompositeId) -> bool {
        let mut cursor = Some(target);
        let mut steps = 0usize;
        while let Some(id) = cursor {
            if id == into {
                return true;
            }
            steps += 1;
            if steps > self.slots.len() {
                // Already-cyclic chain elsewhere in the arena; don't spin.
                return false;
            }
            cursor = self.get(id).and_then(|c| c.levels.get(level));
        }
        false
    }

    /// Writes `level` on `id` to `target`, performing retain/release
    /// bookkeeping on the old and new target (spec.md §4.3 "Setting an
    /// ID"). Every level except `self` (`Level::Myself`) rejects a write
    /// that would close a cycle along that same level's chain, leaving the
    /// prior value in place.
    pub fn set_level(
        &mut self,
        id: CompositeId,
        level: Level,
        target: Option<CompositeId>,
    ) -> Result<(), SetLevelError> {
        if level != Level::Myself {
            if let Some(t) = target {
                if self.chain_reaches(t, level, id) {
                    return Err(SetLevelError::WouldCycle);
                }
            }
        }
        let old = self.get(id).and_then(|c| c.levels.get(level));
        if old == target {
            return Ok(());
        }
        if let Some(c) = self.get_mut(id) {
            c.levels.set_raw(level, target);
        }
        if let Some(old_id) = old {
            self.release(old_id, id);
        }
        if let Some(new_id) = target {
            self.retain(new_id, id);
        }
        Ok(())
    }

    // ---- ARC primitives (spec.md §4.3) ----

    /// Idempotent: adds `retainer` to `retainee`'s retainer set.
    pub fn retain(&mut self, retainee: CompositeId, retainer: CompositeId) {
        if let Some(c) = self.get_mut(retainee) {
            c.retainers.insert(retainer.0);
        }
    }

    /// Idempotent: removes `retainer` from `retainee`'s retainer set. Does
    /// not destroy -- callers that need the "release, then maybe destroy"
    /// composite must check significance themselves (see
    /// `Interpreter::release_and_maybe_destroy` in `arc.rs`).
    pub fn release_only(&mut self, retainee: CompositeId, retainer: CompositeId) {
        if let Some(c) = self.get_mut(retainee) {
            c.retainers.remove(&retainer.0);
        }
    }

    /// `release` without the destroy-on-drop follow-up; kept here so
    /// `set_level`'s old-target release doesn't need to know about scope/
    /// control-transfer state. `arc.rs` wraps this for call sites that must
    /// also check significance afterward.
    fn release(&mut self, retainee: CompositeId, retainer: CompositeId) {
        self.release_only(retainee, retainer);
    }

    /// Direct, real-time scan of whether `retainer` (if alive) references
    /// `retainee` right now -- spec.md §4.3's "Real direct" predicate.
    pub fn real_direct(&self, retainer: CompositeId, retainee: CompositeId) -> bool {
        match self.get(retainer) {
            Some(c) if c.life != crate::composite::Life::Destroying => {
                c.direct_references().contains(&retainee)
            }
            _ => false,
        }
    }

    /// "Formal distant" (spec.md §4.3): is `by` reachable by walking
    /// `retainee`'s `retainers` set transitively? Cycle-safe via a visited
    /// set, matching the spec's explicit cycle-tolerant walk.
    pub fn formal_distant(&self, retainee: CompositeId, by: CompositeId) -> bool {
        let mut visited = rustc_hash::FxHashSet::default();
        let mut stack = vec![retainee];
        while let Some(cur) = stack.pop() {
            if !visited.insert(cur) {
                continue;
            }
            if let Some(c) = self.get(cur) {
                for &r in &c.retainers {
                    let rid = CompositeId(r);
                    if rid == by {
                        return true;
                    }
                    stack.push(rid);
                }
            }
        }
        false
    }
}

impl CompositeInfo for Arena {
    fn kind(&self, id: CompositeId) -> Option<CompositeKind> {
        self.get(id).map(|c| c.kind)
    }

    /// Reflexive/transitive through the `super` axis (single-inheritance
    /// chain) plus a direct check against declared `protocols`.
    fn inherits_from(&self, id: CompositeId, ancestor: CompositeId) -> bool {
        if id == ancestor {
            return true;
        }
        let mut cursor = self.get(id).and_then(|c| c.levels.super_);
        let mut guard = 0usize;
        while let Some(cur) = cursor {
            if cur == ancestor {
                return true;
            }
            guard += 1;
            if guard > self.slots.len() {
                break;
            }
            cursor = self.get(cur).and_then(|c| c.levels.super_);
        }
        self.get(id).is_some_and(|c| c.protocols.contains(&ancestor))
    }

    fn generic_parameters(&self, id: CompositeId) -> Vec<Type> {
        self.get(id).map(|c| c.generic_parameters.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_namespace_is_slot_zero() {
        let arena = Arena::new();
        assert_eq!(arena.get(CompositeId::GLOBAL).unwrap().kind, CompositeKind::Namespace);
    }

    #[test]
    fn alloc_assigns_own_as_slot_index() {
        let mut arena = Arena::new();
        let id = arena.alloc("Foo", CompositeKind::Class);
        assert_eq!(id, CompositeId(1));
        assert_eq!(arena.get(id).unwrap().own, id);
    }

    #[test]
    fn set_level_retains_new_and_releases_old() {
        let mut arena = Arena::new();
        let a = arena.alloc("A", CompositeKind::Object);
        let b = arena.alloc("B", CompositeKind::Object);
        arena.set_level(a, Level::Scope, Some(b)).unwrap();
        assert!(arena.get(b).unwrap().retainers.contains(&a.0));
        let c = arena.alloc("C", CompositeKind::Object);
        arena.set_level(a, Level::Scope, Some(c)).unwrap();
        assert!(!arena.get(b).unwrap().retainers.contains(&a.0));
        assert!(arena.get(c).unwrap().retainers.contains(&a.0));
    }

    #[test]
    fn set_level_rejects_cycle_on_non_self_axis() {
        let mut arena = Arena::new();
        let a = arena.alloc("A", CompositeKind::Object);
        let b = arena.alloc("B", CompositeKind::Object);
        arena.set_level(a, Level::Scope, Some(b)).unwrap();
        let err = arena.set_level(b, Level::Scope, Some(a));
        assert_eq!(err, Err(SetLevelError::WouldCycle));
        assert_eq!(arena.get(b).unwrap().levels.scope, None);
    }

    #[test]
    fn self_axis_permits_cycle() {
        let mut arena = Arena::new();
        let a = arena.alloc("A", CompositeKind::Object);
        arena.set_level(a, Level::Myself, Some(a)).unwrap();
        assert_eq!(arena.get(a).unwrap().levels.myself, Some(a));
    }

    #[test]
    fn inherits_from_walks_super_chain_reflexively() {
        let mut arena = Arena::new();
        let base = arena.alloc("Base", CompositeKind::Class);
        let mid = arena.alloc("Mid", CompositeKind::Class);
        let leaf = arena.alloc("Leaf", CompositeKind::Class);
        arena.set_level(mid, Level::Super, Some(base)).unwrap();
        arena.set_level(leaf, Level::Super, Some(mid)).unwrap();
        assert!(arena.inherits_from(leaf, base));
        assert!(arena.inherits_from(leaf, leaf));
        assert!(!arena.inherits_from(base, leaf));
    }

    #[test]
    fn formal_distant_is_cycle_safe() {
        let mut arena = Arena::new();
        let a = arena.alloc("A", CompositeKind::Object);
        let b = arena.alloc("B", CompositeKind::Object);
        arena.retain(a, b);
        arena.retain(b, a);
        assert!(arena.formal_distant(a, b));
        assert!(arena.formal_distant(b, a));
        assert!(!arena.formal_distant(a, CompositeId::GLOBAL));
    }
}
