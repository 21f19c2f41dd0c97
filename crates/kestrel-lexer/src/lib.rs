//! The stateful tokenizer. Walks a [`Cursor`] left to right, dispatching on
//! the current character and the top of a [`StateStack`], and produces a
//! flat `Vec<Token>` terminated by `Eof`. Operator tokens are assigned a
//! provisional placement during the main pass and corrected in a second,
//! classification pass once the whole stream is known (`reclassify_operators`).

pub mod cursor;
pub mod state;

use cursor::Cursor;
use kestrel_common::span::{LineIndex, Location};
use kestrel_common::token::{keyword_name, OperatorPlacement, Token, TokenKind};
use state::{LexerState, StateStack};

const OPERATOR_CHARS: &str = "!%&*+,-./:<=>?^|~";
const SINGLETON_OPERATORS: &str = "!?";
const INITIALIZER_OPERATORS: &str = ",.:";

/// Keywords that open a clause which may be followed by a `{` block. Used by
/// the statementBody heuristic: seeing one of these sets `expects_statement_body`,
/// and the next `{` reached while it's still true (and not inside a `(...)`)
/// opens a `StatementBody` instead of a plain `Brace`.
const STATEMENT_HEAD_KEYWORDS: &[&str] = &[
    "If", "While", "For", "Func", "Struct", "Class", "Enum", "Protocol", "Namespace",
    "Case", "Catch", "Defer", "Else", "Do",
];

pub struct Lexer<'src> {
    source: &'src str,
    cursor: Cursor<'src>,
    lines: LineIndex,
    states: StateStack,
    tokens: Vec<Token>,
    expects_statement_body: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            cursor: Cursor::new(source),
            lines: LineIndex::new(source),
            states: StateStack::new(),
            tokens: Vec::new(),
            expects_statement_body: false,
        }
    }

    /// Tokenizes `source` end to end, including trivia. The parser is
    /// responsible for filtering `token.trivia` tokens out of its own view.
    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        lexer.run();
        lexer.tokens
    }

    fn location(&self, pos: u32) -> Location {
        self.lines.location(pos)
    }

    fn push_token(&mut self, token: Token) {
        if token.kind == TokenKind::Unsupported {
            if let Some(last) = self.tokens.last_mut() {
                if last.kind == TokenKind::Unsupported {
                    last.value.push_str(&token.value);
                    return;
                }
            }
        }
        self.tokens.push(token);
    }

    fn run(&mut self) {
        if self.source.starts_with("#!") {
            self.lex_shebang();
        }
        while !self.cursor.is_eof() {
            self.lex_one();
        }
        // Eof is deliberately not trivia: the parser relies on it surviving
        // the trivia filter as the final, always-present token so lookahead
        // past the end of a real program never runs off the stream.
        let eof_pos = self.cursor.pos();
        self.tokens
            .push(Token::new(TokenKind::Eof, "", eof_pos, self.location(eof_pos)));

        reclassify_operators(&mut self.tokens);
    }

    fn lex_one(&mut self) {
        if self.states.top() == Some(LexerState::String) {
            self.lex_string_content();
            return;
        }

        let start = self.cursor.pos();
        let c = match self.cursor.peek() {
            Some(c) => c,
            None => return,
        };

        match c {
            ' ' | '\t' => self.lex_whitespace(start),
            '\r' | '\n' => self.lex_newline(start),
            '/' if self.cursor.peek_next() == Some('/') => self.lex_line_comment(start),
            '/' if self.cursor.peek_next() == Some('*') => self.lex_block_comment(start),
            '\'' => self.lex_string_open(start),
            '0'..='9' => self.lex_number(start),
            '{' => self.lex_lbrace(start),
            '}' => self.lex_rbrace(start),
            '(' => self.lex_lparen(start),
            ')' => self.lex_rparen(start),
            '[' => self.lex_lbracket(start),
            ']' => self.lex_rbracket(start),
            ';' => self.lex_semicolon(start),
            c if is_ident_start(c) => self.lex_identifier(start),
            c if OPERATOR_CHARS.contains(c) => self.lex_operator(start),
            _ => self.lex_unsupported(start),
        }
    }

    fn lex_shebang(&mut self) {
        let start = self.cursor.pos();
        self.cursor.eat_while(|c| c != '\n' && c != '\r');
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::Shebang, value, start, self.location(start)).trivia());
    }

    fn lex_whitespace(&mut self, start: u32) {
        self.cursor.eat_while(|c| c == ' ' || c == '\t');
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(
            Token::new(TokenKind::Whitespace, value, start, self.location(start)).trivia(),
        );
    }

    fn lex_newline(&mut self, start: u32) {
        if self.cursor.peek() == Some('\r') {
            self.cursor.advance();
            if self.cursor.peek() == Some('\n') {
                self.cursor.advance();
            }
        } else {
            self.cursor.advance();
        }
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::Newline, value, start, self.location(start)).trivia());

        // A newline at top level abandons a pending statement header that
        // never got a brace (e.g. a single-line `if cond return x`).
        if self.expects_statement_body && self.states.top() != Some(LexerState::Parenthesis) {
            self.expects_statement_body = false;
        }
    }

    fn lex_line_comment(&mut self, start: u32) {
        self.cursor.advance();
        self.cursor.advance();
        self.cursor.eat_while(|c| c != '\n' && c != '\r');
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(
            Token::new(TokenKind::LineComment, value, start, self.location(start)).trivia(),
        );
    }

    fn lex_block_comment(&mut self, start: u32) {
        self.cursor.advance();
        self.cursor.advance();
        let mut depth = 1u32;
        while depth > 0 {
            match (self.cursor.peek(), self.cursor.peek_next()) {
                (Some('*'), Some('/')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth -= 1;
                }
                (Some('/'), Some('*')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth += 1;
                }
                (Some(_), _) => {
                    self.cursor.advance();
                }
                (None, _) => break,
            }
        }
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(
            Token::new(TokenKind::BlockComment, value, start, self.location(start)).trivia(),
        );
    }

    fn lex_string_open(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::StringOpen, value, start, self.location(start)));
        self.states.push(LexerState::String);
    }

    fn lex_string_content(&mut self) {
        let start = self.cursor.pos();
        match self.cursor.peek() {
            None => {
                self.states.pop();
            }
            Some('\'') => {
                self.cursor.advance();
                let value = self.cursor.slice(start, self.cursor.pos());
                self.push_token(Token::new(
                    TokenKind::StringClose,
                    value,
                    start,
                    self.location(start),
                ));
                self.states.pop();
            }
            Some('\\') if self.cursor.peek_next() == Some('(') => {
                self.cursor.advance();
                self.cursor.advance();
                let value = self.cursor.slice(start, self.cursor.pos());
                self.push_token(Token::new(
                    TokenKind::StringExpressionOpen,
                    value,
                    start,
                    self.location(start),
                ));
                self.states.push(LexerState::StringExpression);
            }
            Some('\\') => {
                // Escapes (`\\ \' \b \f \n \r \t \v`, or anything else) are
                // lexed as a two-character segment; the interpreter validates
                // which escaped characters are meaningful.
                self.cursor.advance();
                self.cursor.advance();
                let value = self.cursor.slice(start, self.cursor.pos());
                self.push_token(
                    Token::new(TokenKind::StringSegment, value, start, self.location(start))
                        .nonmergeable(),
                );
            }
            Some(_) => {
                self.cursor.eat_while(|c| c != '\'' && c != '\\');
                let value = self.cursor.slice(start, self.cursor.pos());
                self.push_token(Token::new(
                    TokenKind::StringSegment,
                    value,
                    start,
                    self.location(start),
                ));
            }
        }
    }

    fn lex_lbrace(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::LBrace, value, start, self.location(start)));

        if self.expects_statement_body && self.states.top() != Some(LexerState::Parenthesis) {
            self.states.push(LexerState::StatementBody);
        } else {
            self.states.push(LexerState::Brace);
        }
        self.expects_statement_body = false;
    }

    fn lex_rbrace(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::RBrace, value, start, self.location(start)));

        let closed = self.states.pop();
        if closed == Some(LexerState::StatementBody) && !self.peeks_else_or_where() {
            let gen_pos = self.cursor.pos();
            self.push_token(
                Token::new(TokenKind::Semicolon, ";", gen_pos, self.location(gen_pos)).generated(),
            );
        }
    }

    fn lex_lparen(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::LParen, value, start, self.location(start)));
        self.states.push(LexerState::Parenthesis);
    }

    fn lex_rparen(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());

        if self.states.top() == Some(LexerState::StringExpression) {
            self.push_token(Token::new(
                TokenKind::StringExpressionClose,
                value,
                start,
                self.location(start),
            ));
            self.states.pop();
        } else {
            self.push_token(Token::new(TokenKind::RParen, value, start, self.location(start)));
            if self.states.top() == Some(LexerState::Parenthesis) {
                self.states.pop();
            }
        }
    }

    fn lex_lbracket(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::LBracket, value, start, self.location(start)));
    }

    fn lex_rbracket(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::RBracket, value, start, self.location(start)));
    }

    fn lex_semicolon(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::Semicolon, value, start, self.location(start)));
    }

    fn lex_number(&mut self, start: u32) {
        self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');

        let mut is_float = false;
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
        }

        if matches!(self.cursor.peek(), Some('e') | Some('E')) {
            let mut lookahead = self.cursor.clone();
            lookahead.advance();
            if matches!(lookahead.peek(), Some('+') | Some('-')) {
                lookahead.advance();
            }
            if lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.cursor.advance();
                if matches!(self.cursor.peek(), Some('+') | Some('-')) {
                    self.cursor.advance();
                }
                self.cursor.eat_while(|c| c.is_ascii_digit());
            }
        }

        let value = self.cursor.slice(start, self.cursor.pos());
        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntegerLiteral
        };
        self.push_token(Token::new(kind, value, start, self.location(start)));
    }

    fn lex_identifier(&mut self, start: u32) {
        self.cursor.eat_while(is_ident_continue);
        let value = self.cursor.slice(start, self.cursor.pos()).to_string();
        let loc = self.location(start);

        if let Some(name) = keyword_name(&value) {
            if STATEMENT_HEAD_KEYWORDS.contains(&name) {
                self.expects_statement_body = true;
            }
            self.push_token(Token::new(TokenKind::Keyword(name.to_string()), value, start, loc));
        } else {
            self.push_token(Token::new(TokenKind::Identifier, value, start, loc));
        }
    }

    fn lex_operator(&mut self, start: u32) {
        let c = self.cursor.peek().expect("lex_operator called at eof");

        if self.states.top() == Some(LexerState::Angle) {
            self.cursor.advance();
            let value = self.cursor.slice(start, self.cursor.pos());
            if c == '>' {
                self.states.pop();
            } else if c == '<' {
                self.states.push(LexerState::Angle);
            }
            self.push_token(Token::new(
                TokenKind::Operator(OperatorPlacement::Infix),
                value,
                start,
                self.location(start),
            ));
            return;
        }

        if c == '<' && self.looks_like_generic_open() && self.angle_closes_ahead() {
            self.cursor.advance();
            let value = self.cursor.slice(start, self.cursor.pos());
            self.push_token(Token::new(
                TokenKind::Operator(OperatorPlacement::Infix),
                value,
                start,
                self.location(start),
            ));
            self.states.push(LexerState::Angle);
            return;
        }

        if SINGLETON_OPERATORS.contains(c) {
            self.cursor.advance();
            let value = self.cursor.slice(start, self.cursor.pos());
            self.push_token(
                Token::new(
                    TokenKind::Operator(OperatorPlacement::Infix),
                    value,
                    start,
                    self.location(start),
                )
                .nonmergeable(),
            );
            return;
        }

        if INITIALIZER_OPERATORS.contains(c) {
            self.cursor.advance();
            if (c == '.' && self.cursor.peek() == Some('.'))
                || (c == ':' && self.cursor.peek() == Some(':'))
            {
                self.cursor.advance();
            }
            let value = self.cursor.slice(start, self.cursor.pos());
            self.push_token(
                Token::new(
                    TokenKind::Operator(OperatorPlacement::Infix),
                    value,
                    start,
                    self.location(start),
                )
                .nonmergeable(),
            );
            return;
        }

        // The leading character reaches here precisely because it didn't
        // qualify for any of the special-cased branches above (including, for
        // `<`, the generic-open lookahead) -- consume it unconditionally,
        // then keep merging only characters that are themselves ordinary
        // continuations.
        self.cursor.advance();
        self.cursor.eat_while(|ch| {
            OPERATOR_CHARS.contains(ch)
                && !INITIALIZER_OPERATORS.contains(ch)
                && !SINGLETON_OPERATORS.contains(ch)
                && ch != '<'
        });
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(
            TokenKind::Operator(OperatorPlacement::Infix),
            value,
            start,
            self.location(start),
        ));
    }

    /// True if the most recent non-trivia token looks like it could name a
    /// type, i.e. `<` right after it would plausibly open a generic clause
    /// rather than mean less-than.
    fn looks_like_generic_open(&self) -> bool {
        matches!(
            self.tokens.iter().rev().find(|t| !t.trivia).map(|t| &t.kind),
            Some(TokenKind::Identifier) | Some(TokenKind::RParen) | Some(TokenKind::RBracket)
        )
    }

    /// Scans ahead from the `<` for a balanced `>` before hitting a
    /// statement boundary. Only committed to as an `Angle` context if one
    /// is found -- otherwise `<` lexes as an ordinary operator.
    fn angle_closes_ahead(&self) -> bool {
        let mut c = self.cursor.clone();
        c.advance();
        let mut depth = 1i32;
        loop {
            match c.peek() {
                None => return false,
                Some(';') | Some('{') | Some('\n') | Some('\r') => return false,
                Some('<') => {
                    depth += 1;
                    c.advance();
                }
                Some('>') => {
                    depth -= 1;
                    c.advance();
                    if depth == 0 {
                        return true;
                    }
                }
                Some(_) => {
                    c.advance();
                }
            }
        }
    }

    /// Looks past trivia (without consuming it) for an `else`/`where`
    /// keyword, so the `statementBody`-close semicolon isn't synthesized
    /// right before one.
    fn peeks_else_or_where(&self) -> bool {
        let mut c = self.cursor.clone();
        loop {
            match c.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    c.advance();
                }
                Some('/') if c.peek_next() == Some('/') => {
                    while let Some(ch) = c.peek() {
                        if ch == '\n' || ch == '\r' {
                            break;
                        }
                        c.advance();
                    }
                }
                Some('/') if c.peek_next() == Some('*') => {
                    c.advance();
                    c.advance();
                    let mut depth = 1;
                    while depth > 0 {
                        match c.peek() {
                            None => break,
                            Some('*') if c.peek_next() == Some('/') => {
                                c.advance();
                                c.advance();
                                depth -= 1;
                            }
                            Some('/') if c.peek_next() == Some('*') => {
                                c.advance();
                                c.advance();
                                depth += 1;
                            }
                            _ => {
                                c.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }

        let start = c.pos();
        c.eat_while(|ch| ch.is_alphanumeric() || ch == '_');
        let word = c.slice(start, c.pos());
        word == "else" || word == "where"
    }

    fn lex_unsupported(&mut self, start: u32) {
        self.cursor.advance();
        let value = self.cursor.slice(start, self.cursor.pos());
        self.push_token(Token::new(TokenKind::Unsupported, value, start, self.location(start)));
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Assigns final `OperatorPlacement`s by looking at the nearest non-trivia
/// neighbor on each side of every operator token. Runs once the full token
/// stream exists, since an operator's placement can depend on a later
/// token (e.g. whether anything follows it at all).
fn reclassify_operators(tokens: &mut [Token]) {
    let significant: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.trivia)
        .map(|(i, _)| i)
        .collect();

    for (pos, &i) in significant.iter().enumerate() {
        if !matches!(tokens[i].kind, TokenKind::Operator(_)) {
            continue;
        }

        let prev_ends_expr = pos
            .checked_sub(1)
            .map(|p| ends_expression(&tokens[significant[p]].kind))
            .unwrap_or(false);

        let next_starts_expr = significant
            .get(pos + 1)
            .map(|&j| starts_expression(&tokens[j].kind))
            .unwrap_or(false);

        // `!`/`?` are never infix -- they're unary, either applied before an
        // operand (logical not) or after one (force-unwrap/optional-chain).
        let is_singleton = tokens[i].value.len() == 1
            && SINGLETON_OPERATORS.contains(tokens[i].value.chars().next().unwrap());

        let placement = if is_singleton {
            if prev_ends_expr {
                OperatorPlacement::Postfix
            } else {
                OperatorPlacement::Prefix
            }
        } else if !prev_ends_expr {
            OperatorPlacement::Prefix
        } else if next_starts_expr {
            OperatorPlacement::Infix
        } else {
            OperatorPlacement::Postfix
        };

        tokens[i].kind = TokenKind::Operator(placement);
    }
}

fn ends_expression(kind: &TokenKind) -> bool {
    match kind {
        TokenKind::Identifier
        | TokenKind::IntegerLiteral
        | TokenKind::FloatLiteral
        | TokenKind::RParen
        | TokenKind::RBracket
        | TokenKind::RBrace
        | TokenKind::StringClose
        | TokenKind::StringExpressionClose
        | TokenKind::Operator(OperatorPlacement::Postfix) => true,
        TokenKind::Keyword(name) => matches!(name.as_str(), "Self" | "Super" | "True" | "False" | "Nil"),
        _ => false,
    }
}

fn starts_expression(kind: &TokenKind) -> bool {
    !matches!(
        kind,
        TokenKind::RParen
            | TokenKind::RBracket
            | TokenKind::RBrace
            | TokenKind::Semicolon
            | TokenKind::StringClose
            | TokenKind::StringExpressionClose
            | TokenKind::Eof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn significant(tokens: &[Token]) -> Vec<&Token> {
        tokens.iter().filter(|t| !t.trivia).collect()
    }

    #[test]
    fn arithmetic_expression() {
        let tokens = Lexer::tokenize("1 + 2 * 3");
        let sig = significant(&tokens);
        let kinds: Vec<&str> = sig.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(kinds, vec!["1", "+", "2", "*", "3", ""]);
        assert_eq!(sig[1].kind, TokenKind::Operator(OperatorPlacement::Infix));
        assert_eq!(sig[3].kind, TokenKind::Operator(OperatorPlacement::Infix));
    }

    #[test]
    fn token_values_reconstruct_source() {
        let source = "let x = 'hi \\(name)!'\n";
        let tokens = Lexer::tokenize(source);
        let rebuilt: String = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(rebuilt, source);
    }

    #[test]
    fn nested_block_comments_consume_to_matching_close() {
        let tokens = Lexer::tokenize("/* outer /* inner */ still outer */ 1");
        let sig = significant(&tokens);
        assert_eq!(sig[0].kind, TokenKind::IntegerLiteral);
        assert_eq!(sig[0].value, "1");
    }

    #[test]
    fn string_interpolation_opens_and_closes_expression_context() {
        let tokens = Lexer::tokenize("'hi \\(name)'");
        let kinds: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
        assert!(matches!(kinds[0], TokenKind::StringOpen));
        assert!(kinds.iter().any(|k| matches!(k, TokenKind::StringExpressionOpen)));
        assert!(kinds.iter().any(|k| matches!(k, TokenKind::Identifier)));
        assert!(kinds.iter().any(|k| matches!(k, TokenKind::StringExpressionClose)));
        assert!(matches!(kinds.last().unwrap(), TokenKind::Eof));
    }

    #[test]
    fn statement_body_close_synthesizes_semicolon() {
        let tokens = Lexer::tokenize("if x { y }");
        let sig = significant(&tokens);
        let last_real = sig.iter().rev().find(|t| t.kind != TokenKind::Eof).unwrap();
        assert_eq!(last_real.kind, TokenKind::Semicolon);
        assert!(last_real.generated);
    }

    #[test]
    fn statement_body_close_before_else_has_no_synthesized_semicolon() {
        let tokens = Lexer::tokenize("if x { y } else { z }");
        let semicolons = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Semicolon && t.generated)
            .count();
        assert_eq!(semicolons, 1);
    }

    #[test]
    fn singleton_operators_never_chain() {
        let tokens = Lexer::tokenize("x!!y");
        let sig = significant(&tokens);
        assert_eq!(sig[1].value, "!");
        assert_eq!(sig[2].value, "!");
        assert_eq!(sig[1].kind, TokenKind::Operator(OperatorPlacement::Postfix));
    }

    #[test]
    fn generic_angle_brackets_lex_as_single_chars() {
        let tokens = Lexer::tokenize("let m: Map<String, Int> = x");
        let sig = significant(&tokens);
        let values: Vec<&str> = sig.iter().map(|t| t.value.as_str()).collect();
        assert!(values.contains(&"<"));
        assert!(values.contains(&">"));
        assert!(values.contains(&","));
    }

    #[test]
    fn comparison_operator_is_infix() {
        let tokens = Lexer::tokenize("a < b");
        let sig = significant(&tokens);
        assert_eq!(sig[1].value, "<");
        assert_eq!(sig[1].kind, TokenKind::Operator(OperatorPlacement::Infix));
    }

    #[test]
    fn unsupported_characters_coalesce() {
        let tokens = Lexer::tokenize("a \u{0}\u{1}\u{2} b");
        let sig = significant(&tokens);
        assert_eq!(sig[1].kind, TokenKind::Unsupported);
        assert_eq!(sig[1].value.chars().count(), 3);
    }

    #[test]
    fn shebang_is_only_recognized_at_offset_zero() {
        let tokens = Lexer::tokenize("#!/usr/bin/env kestrel\nlet x = 1");
        assert_eq!(tokens[0].kind, TokenKind::Shebang);
    }
}
