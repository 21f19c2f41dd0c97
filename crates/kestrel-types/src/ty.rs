//! The type lattice (spec.md §3 Type table, §4.3, §4.4): a sum type with
//! 13 variants, an `acceptsA`/`conformsTo` contract, and idempotent
//! normalization. Per spec §4.3's own phrase -- "the execution dispatcher
//! evaluates an AST node by its type, returning a type-value" -- this same
//! `Type` doubles as the interpreter's runtime value representation; there
//! is no separate `Value` enum. Nil is `Type::Predefined(PredefinedKind::Void)`.

use std::fmt::Write as _;

use crate::composite::{CompositeId, CompositeInfo};
use crate::dict::DictionaryEntries;
use crate::matcher;
use crate::predefined::PredefinedKind;

/// The five primitive payload kinds (spec.md §3: `{Boolean, Integer, Float,
/// String, Type}`). `None` means "the primitive type with no concrete
/// payload" -- e.g. a bare `int` annotation rather than the value `3`.
#[derive(Debug, Clone)]
pub enum PrimitiveKind {
    Boolean(Option<bool>),
    Integer(Option<i64>),
    Float(Option<f64>),
    String(Option<String>),
    /// A type-valued primitive: `type` annotations and reified types as
    /// first-class values both live here.
    Type(Option<Box<Type>>),
}

/// Tri-state modifier: a function type either requires the modifier
/// present, requires it absent, or leaves it unconstrained (accepts both).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tri {
    Required,
    Forbidden,
    Unconstrained,
}

impl Tri {
    fn accepts(self, other: Tri) -> bool {
        match self {
            Tri::Unconstrained => true,
            required => required == other,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionModifiers {
    pub is_static: Tri,
    pub is_final: Tri,
    pub is_lazy: Tri,
    pub is_virtual: Tri,
}

impl Default for Tri {
    fn default() -> Self {
        Tri::Unconstrained
    }
}

#[derive(Debug, Clone)]
pub struct FunctionType {
    pub generic_parameters: Vec<Type>,
    pub parameters: Vec<Type>,
    pub return_type: Box<Type>,
    pub modifiers: FunctionModifiers,
}

#[derive(Debug, Clone)]
pub struct DictionaryType {
    pub key: Box<Type>,
    pub value: Box<Type>,
    /// `Some` iff this is a concrete dictionary value rather than a bare
    /// `dict<K, V>` annotation.
    pub entries: Option<DictionaryEntries>,
}

/// The 13 variants of spec.md §3's Type table.
#[derive(Debug, Clone)]
pub enum Type {
    Parenthesized(Box<Type>),
    Nillable(Box<Type>),
    Default(Box<Type>),
    Union(Vec<Type>),
    Intersection(Vec<Type>),
    Predefined(PredefinedKind),
    Primitive(PrimitiveKind),
    Dictionary(DictionaryType),
    Composite(CompositeId),
    Reference(CompositeId, Vec<Type>),
    Function(FunctionType),
    Inout(Box<Type>),
    Variadic(Option<Box<Type>>),
}

impl Type {
    /// `void`, the universal nil sentinel.
    pub fn void() -> Type {
        Type::Predefined(PredefinedKind::Void)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Predefined(PredefinedKind::Void))
    }

    /// spec.md §3's "Concrete?" column: whether a value of this type shape
    /// denotes an actual value rather than only a type annotation.
    pub fn is_concrete(&self) -> bool {
        match self {
            Type::Parenthesized(inner) | Type::Nillable(inner) | Type::Default(inner) => {
                inner.is_concrete()
            }
            Type::Union(alts) | Type::Intersection(alts) => alts.iter().all(Type::is_concrete),
            Type::Predefined(_) => false,
            Type::Primitive(p) => !matches!(
                p,
                PrimitiveKind::Boolean(None)
                    | PrimitiveKind::Integer(None)
                    | PrimitiveKind::Float(None)
                    | PrimitiveKind::String(None)
                    | PrimitiveKind::Type(None)
            ),
            Type::Dictionary(d) => d.entries.is_some(),
            Type::Composite(_) => true,
            Type::Reference(_, _) => false,
            Type::Function(_) => false,
            Type::Inout(inner) | Type::Variadic(Some(inner)) => inner.is_concrete(),
            Type::Variadic(None) => false,
        }
    }

    /// `self.acceptsA(other)`: does a value/binding of type `self` accept a
    /// value of type `other`? Dispatches per spec.md §4.3's per-variant
    /// rules. `info` resolves composite kind/inheritance/generics for the
    /// `Composite`/`Reference`/`Predefined` branches.
    pub fn accepts_a(&self, other: &Type, info: &dyn CompositeInfo) -> bool {
        match self {
            Type::Parenthesized(inner) => inner.accepts_a(other, info),
            // Nillable(X) accepts X directly as well as nil, since the
            // language treats "possibly nil" as a superset of "definitely
            // present"; void is always acceptable wherever a type appears
            // as an annotation.
            Type::Nillable(inner) => other.is_void() || inner.accepts_a(other, info),
            Type::Default(inner) => inner.accepts_a(other, info),
            Type::Union(alts) => alts.iter().any(|a| a.accepts_a(other, info)),
            Type::Intersection(alts) => alts.iter().all(|a| a.accepts_a(other, info)),
            Type::Predefined(kind) => kind.accepts(other, || composite_kind_of(other, info)),
            Type::Primitive(mine) => match (mine, other) {
                (PrimitiveKind::Boolean(_), Type::Primitive(PrimitiveKind::Boolean(_))) => true,
                (PrimitiveKind::Integer(_), Type::Primitive(PrimitiveKind::Integer(_))) => true,
                (PrimitiveKind::Float(_), Type::Primitive(PrimitiveKind::Float(_))) => true,
                (PrimitiveKind::String(_), Type::Primitive(PrimitiveKind::String(_))) => true,
                (PrimitiveKind::Type(mine_meta), Type::Primitive(PrimitiveKind::Type(other_meta))) => {
                    match (mine_meta, other_meta) {
                        (Some(m), Some(o)) => m.accepts_a(o, info),
                        _ => true,
                    }
                }
                _ => false,
            },
            Type::Dictionary(mine) => match other {
                Type::Dictionary(theirs) => {
                    mine.key.accepts_a(&theirs.key, info) && mine.value.accepts_a(&theirs.value, info)
                }
                _ => false,
            },
            Type::Composite(mine_id) => composite_accepts(*mine_id, &[], other, info),
            Type::Reference(mine_id, mine_args) => composite_accepts(*mine_id, mine_args, other, info),
            Type::Function(mine) => match other {
                Type::Function(theirs) => {
                    matcher::match_list(&mine.parameters, &theirs.parameters, info)
                        && matcher::match_list(&mine.generic_parameters, &theirs.generic_parameters, info)
                        && mine.modifiers.is_static.accepts(theirs.modifiers.is_static)
                        && mine.modifiers.is_final.accepts(theirs.modifiers.is_final)
                        && mine.modifiers.is_lazy.accepts(theirs.modifiers.is_lazy)
                        && mine.modifiers.is_virtual.accepts(theirs.modifiers.is_virtual)
                        && mine.return_type.accepts_a(&theirs.return_type, info)
                }
                _ => false,
            },
            Type::Inout(inner) => match other {
                Type::Inout(other_inner) => inner.accepts_a(other_inner, info),
                _ => false,
            },
            Type::Variadic(inner) => match (inner, other) {
                (None, _) => true,
                (Some(inner), other) => inner.accepts_a(other, info),
            },
        }
    }

    pub fn conforms_to(&self, other: &Type, info: &dyn CompositeInfo) -> bool {
        other.accepts_a(self, info)
    }

    /// Idempotent canonical form: flattens nested Nillable/Default,
    /// flattens and dedups Union/Intersection (degenerating a one-element
    /// alternative list to its sole member), and normalizes recursively.
    pub fn normalize(&self) -> Type {
        match self {
            Type::Parenthesized(inner) => inner.normalize(),
            Type::Nillable(inner) => {
                let inner = inner.normalize();
                match inner {
                    Type::Nillable(deeper) => Type::Nillable(deeper),
                    other => Type::Nillable(Box::new(other)),
                }
            }
            Type::Default(inner) => {
                let inner = inner.normalize();
                match inner {
                    Type::Default(deeper) => Type::Default(deeper),
                    other => Type::Default(Box::new(other)),
                }
            }
            Type::Union(alts) => normalize_alternatives(alts, true),
            Type::Intersection(alts) => normalize_alternatives(alts, false),
            Type::Predefined(k) => Type::Predefined(*k),
            Type::Primitive(p) => Type::Primitive(match p {
                PrimitiveKind::Type(Some(meta)) => PrimitiveKind::Type(Some(Box::new(meta.normalize()))),
                other => other.clone(),
            }),
            Type::Dictionary(d) => Type::Dictionary(DictionaryType {
                key: Box::new(d.key.normalize()),
                value: Box::new(d.value.normalize()),
                entries: d.entries.clone(),
            }),
            Type::Composite(id) => Type::Composite(*id),
            Type::Reference(id, args) => {
                Type::Reference(*id, args.iter().map(Type::normalize).collect())
            }
            Type::Function(f) => Type::Function(FunctionType {
                generic_parameters: f.generic_parameters.iter().map(Type::normalize).collect(),
                parameters: f.parameters.iter().map(Type::normalize).collect(),
                return_type: Box::new(f.return_type.normalize()),
                modifiers: f.modifiers.clone(),
            }),
            Type::Inout(inner) => Type::Inout(Box::new(inner.normalize())),
            Type::Variadic(inner) => Type::Variadic(inner.as_ref().map(|i| Box::new(i.normalize()))),
        }
    }

    /// A deterministic textual rendering used only for dictionary-key
    /// canonicalization and tests; not the source-syntax pretty-printer.
    pub fn canonical_string(&self) -> String {
        let mut out = String::new();
        write_canonical(self, &mut out);
        out
    }
}

fn composite_kind_of(ty: &Type, info: &dyn CompositeInfo) -> Option<crate::composite::CompositeKind> {
    match ty {
        Type::Composite(id) | Type::Reference(id, _) => info.kind(*id),
        _ => None,
    }
}

/// `self` is `Composite(mine_id)` or `Reference(mine_id, mine_args)`; `other`
/// must be a composite/reference inheriting from `mine_id`. When `self`
/// supplied generic arguments, `other`'s must match them through the same
/// variadic-aware list matcher used for parameter lists (spec.md §4.4).
fn composite_accepts(mine_id: CompositeId, mine_args: &[Type], other: &Type, info: &dyn CompositeInfo) -> bool {
    let (other_id, other_args): (CompositeId, &[Type]) = match other {
        Type::Composite(id) => (*id, &[]),
        Type::Reference(id, args) => (*id, args),
        _ => return false,
    };
    if !info.inherits_from(other_id, mine_id) {
        return false;
    }
    if mine_args.is_empty() {
        return true;
    }
    matcher::match_list(mine_args, other_args, info)
}

fn normalize_alternatives(alts: &[Type], is_union: bool) -> Type {
    let mut flat = Vec::new();
    for alt in alts {
        let normalized = alt.normalize();
        match normalized {
            Type::Union(inner) if is_union => flat.extend(inner),
            Type::Intersection(inner) if !is_union => flat.extend(inner),
            other => flat.push(other),
        }
    }
    let mut deduped: Vec<Type> = Vec::new();
    for candidate in flat {
        let key = candidate.canonical_string();
        if !deduped.iter().any(|existing: &Type| existing.canonical_string() == key) {
            deduped.push(candidate);
        }
    }
    if deduped.len() == 1 {
        deduped.into_iter().next().unwrap()
    } else if is_union {
        Type::Union(deduped)
    } else {
        Type::Intersection(deduped)
    }
}

fn write_canonical(ty: &Type, out: &mut String) {
    match ty {
        Type::Parenthesized(inner) => {
            out.push('(');
            write_canonical(inner, out);
            out.push(')');
        }
        Type::Nillable(inner) => {
            write_canonical(inner, out);
            out.push('?');
        }
        Type::Default(inner) => {
            write_canonical(inner, out);
            out.push('!');
        }
        Type::Union(alts) => write_joined(alts, " | ", out),
        Type::Intersection(alts) => write_joined(alts, " & ", out),
        Type::Predefined(k) => {
            let _ = write!(out, "{}", k.name());
        }
        Type::Primitive(p) => write_primitive(p, out),
        Type::Dictionary(d) => {
            out.push_str("dict<");
            write_canonical(&d.key, out);
            out.push_str(", ");
            write_canonical(&d.value, out);
            out.push('>');
            if let Some(entries) = &d.entries {
                out.push('{');
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_canonical(&entry.key, out);
                    out.push_str(": ");
                    write_canonical(&entry.value, out);
                }
                out.push('}');
            }
        }
        Type::Composite(id) => {
            let _ = write!(out, "#{}", id.0);
        }
        Type::Reference(id, args) => {
            let _ = write!(out, "#{}", id.0);
            if !args.is_empty() {
                out.push('<');
                write_joined(args, ", ", out);
                out.push('>');
            }
        }
        Type::Function(f) => {
            out.push('(');
            write_joined(&f.parameters, ", ", out);
            out.push_str(") -> ");
            write_canonical(&f.return_type, out);
        }
        Type::Inout(inner) => {
            out.push_str("inout ");
            write_canonical(inner, out);
        }
        Type::Variadic(inner) => {
            match inner {
                Some(inner) => write_canonical(inner, out),
                None => out.push('_'),
            }
            out.push_str("...");
        }
    }
}

fn write_joined(items: &[Type], sep: &str, out: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        write_canonical(item, out);
    }
}

fn write_primitive(p: &PrimitiveKind, out: &mut String) {
    match p {
        PrimitiveKind::Boolean(v) => {
            let _ = write!(out, "bool({:?})", v);
        }
        PrimitiveKind::Integer(v) => {
            let _ = write!(out, "int({:?})", v);
        }
        PrimitiveKind::Float(v) => {
            let _ = write!(out, "float({:?})", v.map(f64::to_bits));
        }
        PrimitiveKind::String(v) => {
            let _ = write!(out, "string({:?})", v);
        }
        PrimitiveKind::Type(v) => {
            out.push_str("type(");
            if let Some(inner) = v {
                write_canonical(inner, out);
            }
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::NullCompositeInfo;

    const INFO: NullCompositeInfo = NullCompositeInfo;

    fn int_ty() -> Type {
        Type::Primitive(PrimitiveKind::Integer(None))
    }

    fn int_val(n: i64) -> Type {
        Type::Primitive(PrimitiveKind::Integer(Some(n)))
    }

    #[test]
    fn nillable_accepts_inner_and_void() {
        let nillable = Type::Nillable(Box::new(int_ty()));
        assert!(nillable.accepts_a(&int_val(3), &INFO));
        assert!(nillable.accepts_a(&Type::void(), &INFO));
        assert!(!nillable.accepts_a(&Type::Primitive(PrimitiveKind::String(None)), &INFO));
    }

    #[test]
    fn union_accepts_any_alternative() {
        let union = Type::Union(vec![int_ty(), Type::Primitive(PrimitiveKind::String(None))]);
        assert!(union.accepts_a(&int_val(1), &INFO));
        assert!(union.accepts_a(&Type::Primitive(PrimitiveKind::String(Some("x".into()))), &INFO));
        assert!(!union.accepts_a(&Type::Primitive(PrimitiveKind::Boolean(None)), &INFO));
    }

    #[test]
    fn normalize_flattens_nested_unions_and_dedups() {
        let nested = Type::Union(vec![
            Type::Union(vec![int_ty(), int_ty()]),
            Type::Primitive(PrimitiveKind::String(None)),
        ]);
        let normalized = nested.normalize();
        match normalized {
            Type::Union(alts) => assert_eq!(alts.len(), 2),
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn single_alternative_union_degenerates() {
        let union = Type::Union(vec![int_ty(), int_ty()]);
        let normalized = union.normalize();
        assert!(matches!(normalized, Type::Primitive(PrimitiveKind::Integer(None))));
    }

    #[test]
    fn normalize_is_idempotent() {
        let t = Type::Nillable(Box::new(Type::Nillable(Box::new(int_ty()))));
        let once = t.normalize();
        let twice = once.normalize();
        assert_eq!(once.canonical_string(), twice.canonical_string());
    }

    #[test]
    fn conforms_to_is_the_mirror_of_accepts_a() {
        let int = int_val(3);
        let any = Type::Predefined(PredefinedKind::AnyPrimitive);
        assert!(int.conforms_to(&any, &INFO));
    }

    #[test]
    fn intersection_requires_all_alternatives() {
        let intersection = Type::Intersection(vec![
            Type::Predefined(PredefinedKind::AnyPrimitive),
            int_ty(),
        ]);
        assert!(intersection.accepts_a(&int_val(1), &INFO));
        assert!(!intersection.accepts_a(&Type::Primitive(PrimitiveKind::String(None)), &INFO));
    }

    #[test]
    fn variadic_inner_decides_element_acceptance() {
        let variadic = Type::Variadic(Some(Box::new(int_ty())));
        assert!(variadic.accepts_a(&int_val(1), &INFO));
        assert!(!variadic.accepts_a(&Type::Primitive(PrimitiveKind::String(None)), &INFO));
        let open = Type::Variadic(None);
        assert!(open.accepts_a(&Type::Primitive(PrimitiveKind::String(None)), &INFO));
    }

    #[test]
    fn inout_requires_inout_on_both_sides() {
        let inout_int = Type::Inout(Box::new(int_ty()));
        assert!(inout_int.accepts_a(&Type::Inout(Box::new(int_val(1))), &INFO));
        assert!(!inout_int.accepts_a(&int_val(1), &INFO));
    }
}
