//! The composite: spec.md §3's heterogeneous runtime entity (class, enum,
//! function, namespace, object, protocol, structure), identified by its
//! slot index in the [`crate::arena::Arena`]. This module only describes
//! the shape; allocation, retain/release, and destruction live in
//! `arena.rs`/`arc.rs`.

use rustc_hash::{FxHashMap, FxHashSet};

pub use kestrel_types::{CompositeId, CompositeKind};
use kestrel_types::Type;

use kestrel_parser::Node;

/// spec.md §3: `life ∈ {Creating, Idle, Destroying}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Life {
    Creating,
    Idle,
    Destroying,
}

/// The seven named kinship axes a composite's `ids` map carries (spec.md
/// §3, §4.3). `own` and the `retainers` set are not reachable through this
/// enum -- they're read-only through the level-setting path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Scope,
    Super,
    SuperType,
    Myself,
    MyType,
    Sub,
    SubType,
}

impl Level {
    pub fn name(self) -> &'static str {
        match self {
            Level::Scope => "scope",
            Level::Super => "super",
            Level::SuperType => "Super",
            Level::Myself => "self",
            Level::MyType => "Self",
            Level::Sub => "sub",
            Level::SubType => "Sub",
        }
    }

    pub const ALL: [Level; 7] = [
        Level::Scope,
        Level::Super,
        Level::SuperType,
        Level::Myself,
        Level::MyType,
        Level::Sub,
        Level::SubType,
    ];
}

/// The kinship graph rooted at this composite. Each axis is `None` when
/// either never set or deliberately "intentionally missed" (spec.md's
/// sentinel `-1`): both cases disable that lookup axis identically, so one
/// `Option` serves for both.
#[derive(Debug, Clone, Default)]
pub struct Levels {
    pub scope: Option<CompositeId>,
    pub super_: Option<CompositeId>,
    pub super_type: Option<CompositeId>,
    pub myself: Option<CompositeId>,
    pub my_type: Option<CompositeId>,
    pub sub: Option<CompositeId>,
    pub sub_type: Option<CompositeId>,
}

impl Levels {
    pub fn get(&self, level: Level) -> Option<CompositeId> {
        match level {
            Level::Scope => self.scope,
            Level::Super => self.super_,
            Level::SuperType => self.super_type,
            Level::Myself => self.myself,
            Level::MyType => self.my_type,
            Level::Sub => self.sub,
            Level::SubType => self.sub_type,
        }
    }

    /// Raw write, bypassing retain/release bookkeeping and the cycle check
    /// -- only `arena.rs::Arena::set_level` should call this directly.
    pub(crate) fn set_raw(&mut self, level: Level, value: Option<CompositeId>) {
        match level {
            Level::Scope => self.scope = value,
            Level::Super => self.super_ = value,
            Level::SuperType => self.super_type = value,
            Level::Myself => self.myself = value,
            Level::MyType => self.my_type = value,
            Level::Sub => self.sub = value,
            Level::SubType => self.sub_type = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Level, Option<CompositeId>)> + '_ {
        Level::ALL.iter().map(move |&l| (l, self.get(l)))
    }
}

/// spec.md §3 member modifiers: `private|protected|public|static|final|
/// lazy|virtual`. Accessibility is mutually exclusive (enforced by the
/// parser's modifier run); the rest are independent flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessibility {
    Private,
    Protected,
    Public,
}

impl Default for Accessibility {
    fn default() -> Self {
        Accessibility::Public
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemberModifiers {
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_final: bool,
    pub is_lazy: bool,
    pub is_virtual: bool,
}

impl MemberModifiers {
    /// Reads a declaration's parsed `modifiers` node list (`parser.rs::
    /// parse_modifiers`) into the runtime flags the member overload carries.
    /// The parser already rejected mutual-exclusion violations as level-1
    /// diagnostics, so this simply takes whichever modifier of each class
    /// appears last.
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let mut out = MemberModifiers::default();
        for node in nodes {
            let name = match node.fields.get("name") {
                Some(kestrel_parser::Field::Text(t)) => t.as_str(),
                _ => continue,
            };
            match name {
                "Private" => out.accessibility = Accessibility::Private,
                "Protected" => out.accessibility = Accessibility::Protected,
                "Public" => out.accessibility = Accessibility::Public,
                "Static" => out.is_static = true,
                "Lazy" => out.is_lazy = true,
                "Final" => out.is_final = true,
                "Virtual" => out.is_virtual = true,
                _ => {}
            }
        }
        out
    }
}

/// spec.md §3 observer kinds attached to a member (`willGet`..`didDelete`),
/// each resolving to a function composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverKind {
    WillGet,
    Get,
    DidGet,
    WillSet,
    Set,
    DidSet,
    WillDelete,
    Delete,
    DidDelete,
}

impl ObserverKind {
    /// Maps the parser's `observerDeclaration.kind` text (spec.md §3's
    /// fixed nine-name vocabulary) to its enum tag.
    pub fn from_keyword(name: &str) -> Option<Self> {
        Some(match name {
            "willGet" => ObserverKind::WillGet,
            "get" => ObserverKind::Get,
            "didGet" => ObserverKind::DidGet,
            "willSet" => ObserverKind::WillSet,
            "set" => ObserverKind::Set,
            "didSet" => ObserverKind::DidSet,
            "willDelete" => ObserverKind::WillDelete,
            "delete" => ObserverKind::Delete,
            "didDelete" => ObserverKind::DidDelete,
            _ => return None,
        })
    }
}

/// One overload of a named member: spec.md §3 "members: string -> list of
/// member overloads".
#[derive(Debug, Clone, Default)]
pub struct Member {
    pub modifiers: MemberModifiers,
    pub declared_type: Option<Type>,
    pub value: Type,
    pub observers: FxHashMap<ObserverKind, CompositeId>,
}

impl Member {
    pub fn new(value: Type) -> Self {
        Self {
            modifiers: MemberModifiers::default(),
            declared_type: None,
            value,
            observers: FxHashMap::default(),
        }
    }

    pub fn with_modifiers(value: Type, modifiers: MemberModifiers) -> Self {
        Self { modifiers, ..Self::new(value) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// One overload of a named operator: spec.md §3 "operators: string -> list
/// of operator overloads (prefix|infix|postfix, associativity, precedence)".
#[derive(Debug, Clone)]
pub struct OperatorOverload {
    pub placement: kestrel_common::token::OperatorPlacement,
    pub associativity: Associativity,
    pub precedence: i32,
    pub function: CompositeId,
}

/// A composite: spec.md §3's unit of runtime identity. Stored densely in
/// the arena; this struct is the payload of one occupied slot.
#[derive(Debug, Clone)]
pub struct Composite {
    pub own: CompositeId,
    pub title: String,
    pub kind: CompositeKind,
    pub life: Life,
    pub levels: Levels,
    /// Composite IDs currently retaining this one (spec.md §3's `retainers`
    /// set). Never contains `own`.
    pub retainers: FxHashSet<usize>,
    /// spec.md §3's "type": this composite's own role/category record. For
    /// ordinary user composites this mirrors `kind` via `Predefined`; kept
    /// as a full `Type` so declared generic constraints attach here too.
    pub category: Type,
    /// The AST statements this composite executes when invoked (functions)
    /// or when its body is elaborated (namespaces/classes at declaration
    /// time). `None` for composites with no body of their own.
    pub statements: Option<Vec<Node>>,
    pub imports: FxHashMap<String, CompositeId>,
    pub operators: FxHashMap<String, Vec<OperatorOverload>>,
    pub members: FxHashMap<String, Vec<Member>>,
    /// Declared generic parameter constraint types, in declaration order.
    pub generic_parameters: Vec<Type>,
    /// Additional declared supertypes beyond the primary one carried by the
    /// `super`/`Super` axes -- conformance-only, not walked by
    /// `inherits_from`'s chain (see DESIGN.md's inheritance open question).
    pub protocols: Vec<CompositeId>,
    /// Formal parameter list, populated for `Function`-kind composites only.
    pub parameters: Vec<ParameterSpec>,
}

/// One formal parameter of a `Function` composite, resolved from a
/// `parameter` AST node at declaration time.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub variadic: bool,
    pub default: Option<Type>,
}

impl Composite {
    pub fn new(own: CompositeId, title: impl Into<String>, kind: CompositeKind) -> Self {
        Self {
            own,
            title: title.into(),
            kind,
            life: Life::Creating,
            levels: Levels::default(),
            retainers: FxHashSet::default(),
            category: Type::Composite(own),
            statements: None,
            imports: FxHashMap::default(),
            operators: FxHashMap::default(),
            members: FxHashMap::default(),
            generic_parameters: Vec::new(),
            protocols: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Every composite ID this composite's `ids`/`imports`/`members`
    /// directly reference right now -- the basis of the "real direct"
    /// retainment predicate (spec.md §4.3).
    pub fn direct_references(&self) -> Vec<CompositeId> {
        let mut out = Vec::new();
        for (_, target) in self.levels.iter() {
            if let Some(t) = target {
                out.push(t);
            }
        }
        out.extend(self.imports.values().copied());
        out.extend(self.protocols.iter().copied());
        for overloads in self.operators.values() {
            out.extend(overloads.iter().map(|o| o.function));
        }
        for overloads in self.members.values() {
            for m in overloads {
                collect_type_composites(&m.value, &mut out);
                if let Some(t) = &m.declared_type {
                    collect_type_composites(t, &mut out);
                }
                out.extend(m.observers.values().copied());
            }
        }
        for p in &self.parameters {
            if let Some(d) = &p.default {
                collect_type_composites(d, &mut out);
            }
        }
        out
    }
}

pub(crate) fn collect_type_composites(ty: &Type, out: &mut Vec<CompositeId>) {
    match ty {
        Type::Composite(id) => out.push(*id),
        Type::Reference(id, args) => {
            out.push(*id);
            for a in args {
                collect_type_composites(a, out);
            }
        }
        Type::Parenthesized(i) | Type::Nillable(i) | Type::Default(i) | Type::Inout(i) => {
            collect_type_composites(i, out)
        }
        Type::Variadic(Some(i)) => collect_type_composites(i, out),
        Type::Union(alts) | Type::Intersection(alts) => {
            for a in alts {
                collect_type_composites(a, out);
            }
        }
        Type::Dictionary(d) => {
            collect_type_composites(&d.key, out);
            collect_type_composites(&d.value, out);
            if let Some(entries) = &d.entries {
                for e in entries.iter() {
                    collect_type_composites(&e.key, out);
                    collect_type_composites(&e.value, out);
                }
            }
        }
        Type::Function(f) => {
            collect_type_composites(&f.return_type, out);
            for p in &f.parameters {
                collect_type_composites(p, out);
            }
            for p in &f.generic_parameters {
                collect_type_composites(p, out);
            }
        }
        Type::Primitive(kestrel_types::PrimitiveKind::Type(Some(meta))) => {
            collect_type_composites(meta, out)
        }
        _ => {}
    }
}
