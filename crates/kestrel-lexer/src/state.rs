/// The lexer's context-state stack. Each entry disambiguates how the rule
/// dispatch loop should interpret the characters at the cursor.
///
/// `Statement`/`StatementBody` implement the "block-as-statement-terminator"
/// mechanic: a `{` seen right after a statement header (and after a
/// newline) opens a `StatementBody`; the matching `}` synthesizes a `;`
/// unless the next non-trivia token is `else`/`where`.
///
/// `Angle` restricts the operator alphabet so that a bare `<`/`>` inside a
/// generic-type argument list doesn't get greedily merged with neighboring
/// operator characters into something like `<=` when the author meant
/// `Map<A, B>` followed by `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerState {
    Comment,
    String,
    StringExpression,
    Statement,
    StatementBody,
    Brace,
    Parenthesis,
    Angle,
}

/// A stack of [`LexerState`]s. Every push on the normal path has a matching
/// pop; an unbalanced stack at EOF is acceptable and handled by the parser's
/// autoclose diagnostics, not here.
#[derive(Debug, Default)]
pub struct StateStack(Vec<LexerState>);

impl StateStack {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, state: LexerState) {
        self.0.push(state);
    }

    pub fn pop(&mut self) -> Option<LexerState> {
        self.0.pop()
    }

    pub fn top(&self) -> Option<LexerState> {
        self.0.last().copied()
    }

    pub fn contains(&self, state: LexerState) -> bool {
        self.0.contains(&state)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}
