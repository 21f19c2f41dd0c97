//! The AST representation: a heterogeneous record keyed by field name, with
//! a `type` tag and a token-index `range`, rather than a homogeneous
//! red/green tree. Spec.md's node model addresses ranges by *token index*
//! into the filtered stream (not byte offset), carries fault-tolerant
//! sentinel node kinds (`Unsupported`, `Separator`), and needs arbitrary
//! per-kind fields -- a fit for a keyed record, not for a CST library built
//! around one token type and sequential children.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Every kind of AST node the parser can produce. Field names per kind are
/// documented alongside the `parse_*` function that builds them in `parser.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Module,
    /// Carries raw unparseable tokens under the `tokens` field. Never a
    /// permanent parent -- always a fault-tolerance placeholder.
    Unsupported,
    /// Transient: marks a valid delimiter position in a sequence; erased
    /// from the final tree before the caller sees it.
    Separator,
    /// An operator occupying a slot inside an `expressionsSequence`. Not an
    /// `infixExpression` tree -- the sequence stores the flat alternation
    /// and leaves precedence/order to the interpreter.
    Operator,

    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    /// Literal text between string delimiters/interpolations. Not used for
    /// the string as a whole -- see `StringLiteral`'s `segments` field.
    StringSegment,
    BoolLiteral,
    NilLiteral,
    Identifier,
    SelfExpression,
    SuperExpression,

    ArrayLiteral,
    DictionaryLiteral,
    DictionaryEntry,
    ParenthesizedExpression,

    PrefixExpression,
    PostfixExpression,
    InfixExpression,
    ExpressionsSequence,

    CallExpression,
    SubscriptExpression,
    MemberExpression,
    Argument,

    FunctionBody,
    ExpressionStatement,

    IfStatement,
    WhileStatement,
    ForStatement,
    ReturnStatement,
    ThrowStatement,
    BreakStatement,
    ContinueStatement,
    FallthroughStatement,
    DeferStatement,

    VariableDeclaration,
    FunctionDeclaration,
    Parameter,

    ClassDeclaration,
    StructDeclaration,
    EnumDeclaration,
    ProtocolDeclaration,
    NamespaceDeclaration,
    ImportStatement,

    Modifier,
    TypeAnnotation,
    GenericArgumentList,

    /// A `willGet`/`get`/`didGet`/`willSet`/`set`/`didSet`/`willDelete`/
    /// `delete`/`didDelete` clause attached to a member (spec.md §3's
    /// `observers` table). `kind` carries the clause name, `body` its
    /// function body.
    ObserverDeclaration,
    /// The brace-delimited run of `ObserverDeclaration`s trailing a member
    /// declaration.
    ObserversBody,

    /// `case a, b, c` inside an enum body: a list of bare case identifiers.
    CaseDeclaration,
    /// `do { ... } catch ... { ... }`.
    DoStatement,
    /// `catch TypeA, TypeB { ... }`, optionally chained to another `catch`.
    CatchClause,
    /// `try`/`try?` wrapping a value expression.
    TryExpression,
}

impl NodeKind {
    /// The spec's `type` string for this kind, e.g. `ifStatement`,
    /// `expressionsSequence`, `numberInteger`.
    pub fn type_string(self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Unsupported => "unsupported",
            NodeKind::Separator => "separator",
            NodeKind::Operator => "operator",
            NodeKind::IntegerLiteral => "numberInteger",
            NodeKind::FloatLiteral => "numberFloat",
            NodeKind::StringLiteral => "stringLiteral",
            NodeKind::StringSegment => "stringSegment",
            NodeKind::BoolLiteral => "boolLiteral",
            NodeKind::NilLiteral => "nilLiteral",
            NodeKind::Identifier => "identifier",
            NodeKind::SelfExpression => "selfExpression",
            NodeKind::SuperExpression => "superExpression",
            NodeKind::ArrayLiteral => "arrayLiteral",
            NodeKind::DictionaryLiteral => "dictionaryLiteral",
            NodeKind::DictionaryEntry => "dictionaryEntry",
            NodeKind::ParenthesizedExpression => "parenthesizedExpression",
            NodeKind::PrefixExpression => "prefixExpression",
            NodeKind::PostfixExpression => "postfixExpression",
            NodeKind::InfixExpression => "infixExpression",
            NodeKind::ExpressionsSequence => "expressionsSequence",
            NodeKind::CallExpression => "callExpression",
            NodeKind::SubscriptExpression => "subscriptExpression",
            NodeKind::MemberExpression => "memberExpression",
            NodeKind::Argument => "argument",
            NodeKind::FunctionBody => "functionBody",
            NodeKind::ExpressionStatement => "expressionStatement",
            NodeKind::IfStatement => "ifStatement",
            NodeKind::WhileStatement => "whileStatement",
            NodeKind::ForStatement => "forStatement",
            NodeKind::ReturnStatement => "returnStatement",
            NodeKind::ThrowStatement => "throwStatement",
            NodeKind::BreakStatement => "breakStatement",
            NodeKind::ContinueStatement => "continueStatement",
            NodeKind::FallthroughStatement => "fallthroughStatement",
            NodeKind::DeferStatement => "deferStatement",
            NodeKind::VariableDeclaration => "variableDeclaration",
            NodeKind::FunctionDeclaration => "functionDeclaration",
            NodeKind::Parameter => "parameter",
            NodeKind::ClassDeclaration => "classDeclaration",
            NodeKind::StructDeclaration => "structDeclaration",
            NodeKind::EnumDeclaration => "enumDeclaration",
            NodeKind::ProtocolDeclaration => "protocolDeclaration",
            NodeKind::NamespaceDeclaration => "namespaceDeclaration",
            NodeKind::ImportStatement => "importStatement",
            NodeKind::Modifier => "modifier",
            NodeKind::TypeAnnotation => "typeAnnotation",
            NodeKind::GenericArgumentList => "genericArgumentList",
            NodeKind::ObserverDeclaration => "observerDeclaration",
            NodeKind::ObserversBody => "observersBody",
            NodeKind::CaseDeclaration => "caseDeclaration",
            NodeKind::DoStatement => "doStatement",
            NodeKind::CatchClause => "catchClause",
            NodeKind::TryExpression => "tryExpression",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NodeRange {
    pub start: usize,
    pub end: usize,
}

impl NodeRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A field value. `#[serde(untagged)]` makes each variant serialize as
/// itself rather than as an externally-tagged enum, so the JSON output
/// reads as a plain nested object/array/string/bool/null.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Field {
    Node(Box<Node>),
    NodeList(Vec<Node>),
    /// Raw token values an `unsupported` node could not assign to a rule.
    TokenList(Vec<String>),
    Text(String),
    Flag(bool),
    Absent,
}

impl Field {
    pub fn node(n: Node) -> Self {
        Field::Node(Box::new(n))
    }
}

pub type Fields = BTreeMap<&'static str, Field>;

/// A single AST node: a `type` tag, a token-index `range`, and a bag of
/// named fields whose shape depends on the tag.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub range: NodeRange,
    pub fields: Fields,
}

impl Node {
    pub fn new(kind: NodeKind, range: NodeRange) -> Self {
        Self {
            kind,
            range,
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, name: &'static str, field: Field) -> Self {
        self.fields.insert(name, field);
        self
    }

    pub fn set(&mut self, name: &'static str, field: Field) {
        self.fields.insert(name, field);
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2 + self.fields.len()))?;
        map.serialize_entry("type", self.kind.type_string())?;
        map.serialize_entry("range", &self.range)?;
        for (name, field) in &self.fields {
            map.serialize_entry(name, field)?;
        }
        map.end()
    }
}
