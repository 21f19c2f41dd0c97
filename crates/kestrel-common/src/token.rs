use serde::Serialize;

use crate::span::Location;

/// Whether a lexed operator sits before, between, or after its operand(s).
///
/// Assigned by the lexer's operator-classification pass (spec-speak:
/// "specialized to operatorPrefix/operatorInfix/operatorPostfix by
/// inspecting the preceding non-trivia token").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperatorPlacement {
    Prefix,
    Infix,
    Postfix,
}

/// Every kind of token the Kestrel lexer produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    /// `#!` shebang line at source offset 0.
    Shebang,
    /// Insignificant horizontal whitespace (spaces/tabs). Always trivia.
    Whitespace,
    /// A line ending. Trivia, but load-bearing for the lexer's statement-body
    /// bracketing heuristic (`{` preceded by a newline opens a statementBody).
    Newline,
    /// `// ...` line comment. Trivia.
    LineComment,
    /// `/* ... */` nestable block comment. Trivia.
    BlockComment,

    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,

    /// Statement separator. Either written literally as `;` or synthesized
    /// by the lexer when a `statementBody` closes (flagged `generated`).
    Semicolon,

    /// An operator drawn from the alphabet `! % & * + , - . / : < = > ? ^ | ~`.
    /// `value` on the token carries the exact merged operator text.
    Operator(OperatorPlacement),

    IntegerLiteral,
    FloatLiteral,

    /// Opening `'` of a string literal.
    StringOpen,
    /// Closing `'` of a string literal.
    StringClose,
    /// Literal text content inside a string, between delimiters/interpolations.
    StringSegment,
    /// `\(` -- opens a `stringExpression` interpolation context.
    StringExpressionOpen,
    /// `)` that closes a string interpolation (balances `StringExpressionOpen`).
    StringExpressionClose,

    Identifier,
    /// A keyword token. The payload preserves the source capitalization of
    /// the keyword name, e.g. `Keyword("If")` for `if`, so that
    /// `type_string()` can render `keywordIf` as spec.md describes.
    Keyword(String),

    /// Catch-all for characters the lexer's rules do not recognize.
    /// Adjacent `Unsupported` tokens are coalesced by the lexer.
    Unsupported,

    Eof,
}

/// A token produced by the Kestrel lexer.
///
/// Mirrors the reference interpreter's `Lexer::Token` layout: a byte
/// `position`, a `location`, a `type`/`value` pair, and three independent
/// flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub position: u32,
    pub location: Location,
    pub kind: TokenKind,
    pub value: String,
    /// Whitespace/comment/generated-delimiter tokens filtered before parsing.
    pub trivia: bool,
    /// Operator-merge barrier: a following operator character must not be
    /// appended to this token even if otherwise mergeable.
    pub nonmergeable: bool,
    /// Synthesized by the lexer rather than present verbatim in the source
    /// (e.g. the `;` emitted when a `statementBody` closes).
    pub generated: bool,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, position: u32, location: Location) -> Self {
        Self {
            position,
            location,
            kind,
            value: value.into(),
            trivia: false,
            nonmergeable: false,
            generated: false,
        }
    }

    pub fn trivia(mut self) -> Self {
        self.trivia = true;
        self
    }

    pub fn nonmergeable(mut self) -> Self {
        self.nonmergeable = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self.trivia = true;
        self
    }

    /// The spec's human-readable `type` string, e.g. `identifier`,
    /// `keywordIf`, `operatorInfix`, `stringSegment`.
    pub fn type_string(&self) -> String {
        match &self.kind {
            TokenKind::Shebang => "shebang".into(),
            TokenKind::Whitespace => "whitespace".into(),
            TokenKind::Newline => "newline".into(),
            TokenKind::LineComment => "lineComment".into(),
            TokenKind::BlockComment => "blockComment".into(),
            TokenKind::LBrace => "braceOpen".into(),
            TokenKind::RBrace => "braceClose".into(),
            TokenKind::LParen => "parenthesisOpen".into(),
            TokenKind::RParen => "parenthesisClose".into(),
            TokenKind::LBracket => "bracketOpen".into(),
            TokenKind::RBracket => "bracketClose".into(),
            TokenKind::Semicolon => "semicolon".into(),
            TokenKind::Operator(OperatorPlacement::Prefix) => "operatorPrefix".into(),
            TokenKind::Operator(OperatorPlacement::Infix) => "operatorInfix".into(),
            TokenKind::Operator(OperatorPlacement::Postfix) => "operatorPostfix".into(),
            TokenKind::IntegerLiteral => "numberInteger".into(),
            TokenKind::FloatLiteral => "numberFloat".into(),
            TokenKind::StringOpen => "stringOpen".into(),
            TokenKind::StringClose => "stringClose".into(),
            TokenKind::StringSegment => "stringSegment".into(),
            TokenKind::StringExpressionOpen => "stringExpressionOpen".into(),
            TokenKind::StringExpressionClose => "stringExpressionClose".into(),
            TokenKind::Identifier => "identifier".into(),
            TokenKind::Keyword(name) => format!("keyword{name}"),
            TokenKind::Unsupported => "unsupported".into(),
            TokenKind::Eof => "eof".into(),
        }
    }
}

/// The fixed keyword vocabulary. Returns the canonical capitalized name
/// (e.g. `"If"` for `"if"`) used both for `Keyword` payloads and for
/// rendering `keyword<Name>` type strings.
pub fn keyword_name(word: &str) -> Option<&'static str> {
    Some(match word {
        "after" => "After",
        "alias" => "Alias",
        "and" => "And",
        "break" => "Break",
        "case" => "Case",
        "catch" => "Catch",
        "class" => "Class",
        "const" => "Const",
        "continue" => "Continue",
        "default" => "Default",
        "defer" => "Defer",
        "do" => "Do",
        "else" => "Else",
        "enum" => "Enum",
        "fallthrough" => "Fallthrough",
        "false" => "False",
        "final" => "Final",
        "for" => "For",
        "func" => "Func",
        "if" => "If",
        "import" => "Import",
        "in" => "In",
        "inout" => "Inout",
        "is" => "Is",
        "lazy" => "Lazy",
        "let" => "Let",
        "namespace" => "Namespace",
        "nil" => "Nil",
        "private" => "Private",
        "protected" => "Protected",
        "protocol" => "Protocol",
        "public" => "Public",
        "return" => "Return",
        "self" => "Self",
        "static" => "Static",
        "struct" => "Struct",
        "super" => "Super",
        "throw" => "Throw",
        "true" => "True",
        "try" => "Try",
        "var" => "Var",
        "virtual" => "Virtual",
        "void" => "Void",
        "where" => "Where",
        "while" => "While",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_name_lookup() {
        assert_eq!(keyword_name("if"), Some("If"));
        assert_eq!(keyword_name("func"), Some("Func"));
        assert_eq!(keyword_name("nope"), None);
    }

    #[test]
    fn type_string_keyword() {
        let tok = Token::new(
            TokenKind::Keyword("If".into()),
            "if",
            0,
            Location::new(1, 1),
        );
        assert_eq!(tok.type_string(), "keywordIf");
    }

    #[test]
    fn type_string_operator() {
        let tok = Token::new(
            TokenKind::Operator(OperatorPlacement::Infix),
            "+",
            0,
            Location::new(1, 1),
        );
        assert_eq!(tok.type_string(), "operatorInfix");
    }

    #[test]
    fn generated_implies_trivia() {
        let tok = Token::new(TokenKind::Semicolon, ";", 0, Location::new(1, 1)).generated();
        assert!(tok.generated);
        assert!(tok.trivia);
    }
}
