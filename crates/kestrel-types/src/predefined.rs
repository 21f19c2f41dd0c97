//! The 17 fixed predefined kinds (spec.md §4.5), each with a hard-coded
//! acceptance predicate -- unlike every other `Type` variant, a predefined
//! kind never consults the composite arena.

use crate::composite::CompositeKind;
use crate::ty::{PrimitiveKind, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedKind {
    /// `void` -- accepts only itself. The universal nil sentinel: the
    /// interpreter represents "no value" as `Type::Predefined(Void)`.
    Void,
    /// `_` -- accepts anything.
    Any,
    /// `any` -- accepts any Primitive.
    AnyPrimitive,
    Bool,
    Int,
    Float,
    String,
    /// `type` -- accepts a Primitive carrying a meta-type payload.
    Type,
    /// `dict` -- accepts any Dictionary.
    Dict,
    /// `Any` -- accepts any Composite or Reference.
    AnyComposite,
    Class,
    Enumeration,
    Function,
    Namespace,
    Object,
    Protocol,
    Structure,
}

impl PredefinedKind {
    /// The lowercase/capitalized source spelling, as it would appear in a
    /// type annotation.
    pub fn name(self) -> &'static str {
        match self {
            PredefinedKind::Void => "void",
            PredefinedKind::Any => "_",
            PredefinedKind::AnyPrimitive => "any",
            PredefinedKind::Bool => "bool",
            PredefinedKind::Int => "int",
            PredefinedKind::Float => "float",
            PredefinedKind::String => "string",
            PredefinedKind::Type => "type",
            PredefinedKind::Dict => "dict",
            PredefinedKind::AnyComposite => "Any",
            PredefinedKind::Class => "Class",
            PredefinedKind::Enumeration => "Enumeration",
            PredefinedKind::Function => "Function",
            PredefinedKind::Namespace => "Namespace",
            PredefinedKind::Object => "Object",
            PredefinedKind::Protocol => "Protocol",
            PredefinedKind::Structure => "Structure",
        }
    }

    fn matching_composite_kind(self) -> Option<CompositeKind> {
        match self {
            PredefinedKind::Class => Some(CompositeKind::Class),
            PredefinedKind::Enumeration => Some(CompositeKind::Enumeration),
            PredefinedKind::Function => Some(CompositeKind::Function),
            PredefinedKind::Namespace => Some(CompositeKind::Namespace),
            PredefinedKind::Object => Some(CompositeKind::Object),
            PredefinedKind::Protocol => Some(CompositeKind::Protocol),
            PredefinedKind::Structure => Some(CompositeKind::Structure),
            _ => None,
        }
    }

    /// Does this predefined kind accept `candidate`? `composite_kind_of`
    /// resolves the arena kind of a `Composite`/`Reference` candidate, if
    /// any -- threaded through rather than held, so this stays free of the
    /// `CompositeInfo` borrow the caller already has open.
    pub fn accepts(self, candidate: &Type, composite_kind_of: impl Fn() -> Option<CompositeKind>) -> bool {
        match self {
            PredefinedKind::Void => matches!(candidate, Type::Predefined(PredefinedKind::Void)),
            PredefinedKind::Any => true,
            PredefinedKind::AnyPrimitive => matches!(candidate, Type::Primitive(_)),
            PredefinedKind::Bool => matches!(candidate, Type::Primitive(PrimitiveKind::Boolean(_))),
            PredefinedKind::Int => matches!(candidate, Type::Primitive(PrimitiveKind::Integer(_))),
            PredefinedKind::Float => matches!(candidate, Type::Primitive(PrimitiveKind::Float(_))),
            PredefinedKind::String => matches!(candidate, Type::Primitive(PrimitiveKind::String(_))),
            PredefinedKind::Type => matches!(candidate, Type::Primitive(PrimitiveKind::Type(_))),
            PredefinedKind::Dict => matches!(candidate, Type::Dictionary(_)),
            PredefinedKind::AnyComposite => {
                matches!(candidate, Type::Composite(_) | Type::Reference(_, _))
            }
            _ => match self.matching_composite_kind() {
                Some(want) if matches!(candidate, Type::Composite(_) | Type::Reference(_, _)) => {
                    composite_kind_of() == Some(want)
                }
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::CompositeId;

    #[test]
    fn void_accepts_only_itself() {
        let void = Type::Predefined(PredefinedKind::Void);
        assert!(PredefinedKind::Void.accepts(&void, || None));
        let int = Type::Primitive(PrimitiveKind::Integer(Some(1)));
        assert!(!PredefinedKind::Void.accepts(&int, || None));
    }

    #[test]
    fn underscore_accepts_anything() {
        let int = Type::Primitive(PrimitiveKind::Integer(None));
        assert!(PredefinedKind::Any.accepts(&int, || None));
    }

    #[test]
    fn bool_accepts_only_boolean_primitive() {
        let b = Type::Primitive(PrimitiveKind::Boolean(Some(true)));
        let s = Type::Primitive(PrimitiveKind::String(None));
        assert!(PredefinedKind::Bool.accepts(&b, || None));
        assert!(!PredefinedKind::Bool.accepts(&s, || None));
    }

    #[test]
    fn class_accepts_composite_of_matching_kind_only() {
        let composite = Type::Composite(CompositeId(3));
        assert!(PredefinedKind::Class.accepts(&composite, || Some(CompositeKind::Class)));
        assert!(!PredefinedKind::Class.accepts(&composite, || Some(CompositeKind::Structure)));
    }

    #[test]
    fn any_composite_accepts_reference_regardless_of_kind() {
        let reference = Type::Reference(CompositeId(1), Vec::new());
        assert!(PredefinedKind::AnyComposite.accepts(&reference, || Some(CompositeKind::Protocol)));
    }
}
