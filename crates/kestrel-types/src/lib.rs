//! The type lattice (spec.md §3, §4.3, §4.4, §4.5): a 13-variant `Type` sum
//! with `acceptsA`/`conformsTo`/`normalize`, the 17 predefined kinds, the
//! dictionary concretion, and the variadic-aware list matcher shared by
//! function parameter lists and generic-argument lists.
//!
//! This crate is deliberately arena-agnostic: it never stores or destroys
//! composites. It asks the [`CompositeInfo`] seam for the three facts it
//! needs about the composite graph, so `kestrel-interp` (which owns the
//! arena) can depend on this crate without a cycle back.

mod composite;
mod dict;
mod matcher;
mod predefined;
mod ty;

pub use composite::{CompositeId, CompositeInfo, CompositeKind, NullCompositeInfo};
pub use dict::{DictionaryEntries, DictionaryEntry};
pub use matcher::match_list;
pub use predefined::PredefinedKind;
pub use ty::{DictionaryType, FunctionModifiers, FunctionType, PrimitiveKind, Tri, Type};
