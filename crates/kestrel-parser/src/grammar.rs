//! The grammar table: pure data describing each rule's shape. The parser
//! below does not walk this table to drive parsing -- each rule has a
//! hand-written `parse_*` function in `parser.rs`, dispatched by name. This
//! table exists as the authoritative description of the grammar's shape,
//! consulted by tests and tooling that need to enumerate rules or their
//! field lists without duplicating that knowledge in prose.

/// How a rule's value is produced.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Delegates entirely to another named rule.
    Reference(&'static str),
    /// Matches one literal token, optionally constrained by type or value.
    Token {
        type_name: Option<&'static str>,
        value: Option<&'static str>,
    },
    /// Tries each alternative in order, taking the first match.
    Variant(&'static [&'static str]),
    /// A repeated run of `element`, optionally delimited by `opener`/`closer`
    /// and separated by `separator`.
    Sequence {
        element: &'static str,
        opener: Option<&'static str>,
        separator: Option<&'static str>,
        closer: Option<&'static str>,
        min: usize,
        max: Option<usize>,
    },
    /// Parses `base`, then repeatedly wraps it in `wrapper`, which stores the
    /// previous result under `inner_field`. Expresses left-recursive chains
    /// (call/member/subscript/postfix) without left recursion.
    Hierarchy {
        base: &'static str,
        wrapper: &'static str,
        inner_field: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub optional: bool,
    pub rule: RuleKind,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub product: &'static str,
    pub fields: &'static [Field],
}

/// Describes the `postfixExpression`/`callExpression`/`subscriptExpression`/
/// `memberExpression` hierarchy: each wraps the previous result under `base`.
pub fn postfix_hierarchy() -> Vec<Rule> {
    vec![
        Rule {
            name: "callExpression",
            product: "callExpression",
            fields: &[
                Field { name: "base", optional: false, rule: RuleKind::Reference("primaryExpression") },
                Field {
                    name: "arguments",
                    optional: false,
                    rule: RuleKind::Sequence {
                        element: "argument",
                        opener: Some("("),
                        separator: Some(","),
                        closer: Some(")"),
                        min: 0,
                        max: None,
                    },
                },
            ],
        },
        Rule {
            name: "subscriptExpression",
            product: "subscriptExpression",
            fields: &[
                Field { name: "base", optional: false, rule: RuleKind::Reference("callExpression") },
                Field {
                    name: "arguments",
                    optional: false,
                    rule: RuleKind::Sequence {
                        element: "argument",
                        opener: Some("["),
                        separator: Some(","),
                        closer: Some("]"),
                        min: 0,
                        max: None,
                    },
                },
            ],
        },
        Rule {
            name: "memberExpression",
            product: "memberExpression",
            fields: &[
                Field { name: "base", optional: false, rule: RuleKind::Reference("subscriptExpression") },
                Field {
                    name: "member",
                    optional: false,
                    rule: RuleKind::Token { type_name: Some("identifier"), value: None },
                },
            ],
        },
    ]
}

/// The `expressionsSequence` rule: a left-to-right alternation of expression
/// and infix-operator nodes. `as`/`in`/`is` are subsequential -- they occupy
/// an operator slot but don't advance the rotation, matching spec.md's
/// "Expression sequence" algorithm.
pub fn expressions_sequence_rule() -> Rule {
    static FIELDS: &[Field] = &[Field {
        name: "values",
        optional: false,
        rule: RuleKind::Sequence {
            element: "expressionOrInfixOperator",
            opener: None,
            separator: None,
            closer: None,
            min: 1,
            max: None,
        },
    }];
    Rule {
        name: "expressionsSequence",
        product: "expressionsSequence",
        fields: FIELDS,
    }
}

/// Keywords accepted by the modifiers rule, grouped by their mutual-exclusion
/// class. Two modifiers from the same class occurring on one declaration are
/// a level-1 diagnostic (`parser.rs::parse_modifiers`).
pub const ACCESSIBILITY_MODIFIERS: &[&str] = &["Private", "Protected", "Public"];
pub const FINALITY_MODIFIERS: &[&str] = &["Final", "Virtual"];
pub const OTHER_MODIFIERS: &[&str] = &["Static", "Lazy"];

/// Operators treated as subsequential inside an `expressionsSequence`: they
/// occupy an operator slot in the rotation but the next slot is still
/// expected to be an expression, not another operator.
pub const SUBSEQUENTIAL_KEYWORDS: &[&str] = &["As", "In", "Is"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postfix_hierarchy_chains_through_base() {
        let rules = postfix_hierarchy();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[2].name, "memberExpression");
    }

    #[test]
    fn subsequential_keywords_do_not_include_ordinary_operators() {
        assert!(SUBSEQUENTIAL_KEYWORDS.contains(&"Is"));
        assert!(!SUBSEQUENTIAL_KEYWORDS.contains(&"Plus"));
    }
}
