//! The seam between the type lattice and the interpreter's composite arena.
//!
//! This crate knows nothing about how composites are stored or destroyed --
//! it only needs to ask three questions of whatever arena holds them: what
//! kind is this composite, does it inherit from that one, and what generic
//! parameters did it declare. `kestrel-interp`'s arena implements
//! [`CompositeInfo`] directly; `NullCompositeInfo` below is a stand-in for
//! tests that exercise the type algebra without a real arena.

/// A composite's slot index in the arena (spec.md §3: "globally identified
/// by its index in a composite arena"). Index 0 is always the global
/// namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeId(pub usize);

impl CompositeId {
    pub const GLOBAL: CompositeId = CompositeId(0);
}

/// spec.md §3's seven composite kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Class,
    Enumeration,
    Function,
    Namespace,
    Object,
    Protocol,
    Structure,
}

/// What the type lattice needs to know about the composite graph to decide
/// `acceptsA` on `Composite`/`Reference`/`Predefined` variants.
pub trait CompositeInfo {
    /// `None` if `id` names a vacant or unknown arena slot.
    fn kind(&self, id: CompositeId) -> Option<CompositeKind>;

    /// True iff `id` is `ancestor` or inherits from it through the full
    /// supertype chain (reflexive, transitive).
    fn inherits_from(&self, id: CompositeId, ancestor: CompositeId) -> bool;

    /// The constraint types of `id`'s declared generic parameters, in
    /// declaration order. Empty if `id` is not generic.
    fn generic_parameters(&self, id: CompositeId) -> Vec<super::Type>;
}

/// A `CompositeInfo` that knows about no composites at all: every kind
/// lookup misses, inheritance is strictly reflexive, nothing is generic.
/// Enough to exercise the primitive/union/intersection/function corners of
/// the type algebra in isolation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCompositeInfo;

impl CompositeInfo for NullCompositeInfo {
    fn kind(&self, _id: CompositeId) -> Option<CompositeKind> {
        None
    }

    fn inherits_from(&self, id: CompositeId, ancestor: CompositeId) -> bool {
        id == ancestor
    }

    fn generic_parameters(&self, _id: CompositeId) -> Vec<super::Type> {
        Vec::new()
    }
}
