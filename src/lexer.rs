//! Lexer for the CMake scripting language.
//!
//! Tokenizes source text into `COMMAND | IDENT | ARG_UNQUOTED | ARG_QUOTED |
//! ARG_BRACKET | PAREN_OPEN | PAREN_CLOSE | END`. Whitespace and line
//! continuations (`\` + newline) separate tokens; `#` outside quotes/
//! brackets runs a comment to end-of-line; `[=*[ ... ]=*]` is a bracket
//! argument whose close must repeat the same count of `=`.

use crate::ast::types::{Token, TokenKind};
use crate::errors::LexError;

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.is_eof() {
                tokens.push(Token::new(TokenKind::End, "", self.line, self.col));
                break;
            }

            let (line, col) = (self.line, self.col);
            let c = self.peek().unwrap();

            if c == '(' {
                self.advance();
                tokens.push(Token::new(TokenKind::ParenOpen, "(", line, col));
                continue;
            }
            if c == ')' {
                self.advance();
                tokens.push(Token::new(TokenKind::ParenClose, ")", line, col));
                continue;
            }
            if c == '"' {
                let text = self.lex_quoted()?;
                tokens.push(Token::new(TokenKind::ArgQuoted, text, line, col));
                continue;
            }
            if c == '[' {
                if let Some(eq_count) = self.peek_bracket_open() {
                    let text = self.lex_bracket(eq_count)?;
                    tokens.push(Token::new(TokenKind::ArgBracket, text, line, col));
                    continue;
                }
            }
            if is_ident_start(c) {
                let ident = self.lex_ident();
                if self.peek_is_paren_after_trivia() {
                    tokens.push(Token::new(TokenKind::Command, ident, line, col));
                } else {
                    tokens.push(Token::new(TokenKind::Ident, ident, line, col));
                }
                continue;
            }

            // Anything else (digits, punctuation, `$`, `;`, etc.) starts an
            // unquoted argument run.
            let text = self.lex_unquoted();
            if text.is_empty() {
                // Single stray byte we don't otherwise recognize: consume it
                // as a one-character unquoted argument to guarantee forward
                // progress.
                let byte = self.advance().unwrap();
                tokens.push(Token::new(
                    TokenKind::ArgUnquoted,
                    byte.to_string(),
                    line,
                    col,
                ));
            } else {
                tokens.push(Token::new(TokenKind::ArgUnquoted, text, line, col));
            }
        }
        Ok(tokens)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    /// Skip whitespace, line continuations (`\` + newline), and `#`
    /// line comments. Does not skip inside quotes/brackets (those are
    /// handled by their own lexing functions).
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// After lexing an identifier, look past whitespace/comments (without
    /// consuming them if no `(` follows) to see whether a command's
    /// argument list opens here.
    fn peek_is_paren_after_trivia(&mut self) -> bool {
        let save = (self.pos, self.line, self.col);
        self.skip_trivia();
        let is_paren = self.peek() == Some('(');
        if !is_paren {
            self.pos = save.0;
            self.line = save.1;
            self.col = save.2;
        }
        is_paren
    }

    fn lex_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    /// `[` followed by zero-or-more `=` followed by `[` opens a bracket
    /// argument. Returns the `=` count if this position actually opens one,
    /// without consuming anything (lookahead only).
    fn peek_bracket_open(&self) -> Option<usize> {
        if self.peek() != Some('[') {
            return None;
        }
        let mut offset = 1;
        let mut eq_count = 0;
        while self.peek_at(offset) == Some('=') {
            eq_count += 1;
            offset += 1;
        }
        if self.peek_at(offset) == Some('[') {
            Some(eq_count)
        } else {
            None
        }
    }

    /// Consumes a full bracket argument (including the `[=*[`/`]=*]`
    /// framing) and returns its raw text verbatim, framing included —
    /// `resolve_args` strips the framing later.
    fn lex_bracket(&mut self, eq_count: usize) -> Result<String, LexError> {
        let (start_line, start_col) = (self.line, self.col);
        let mut text = String::new();

        // Consume opening `[`, `=`*, `[`.
        text.push(self.advance().unwrap()); // '['
        for _ in 0..eq_count {
            text.push(self.advance().unwrap()); // '='
        }
        text.push(self.advance().unwrap()); // '['

        // A single leading newline immediately after the opener is part of
        // the framing, not the payload, per CMake bracket-argument rules.
        if self.peek() == Some('\n') {
            text.push(self.advance().unwrap());
        }

        let close_pattern: String = {
            let mut p = String::from("]");
            p.push_str(&"=".repeat(eq_count));
            p.push(']');
            p
        };

        loop {
            if self.is_eof() {
                return Err(LexError::UnterminatedBracket {
                    line: start_line,
                    col: start_col,
                    open_count: eq_count,
                });
            }
            if self.matches_close(&close_pattern) {
                for _ in 0..close_pattern.chars().count() {
                    text.push(self.advance().unwrap());
                }
                break;
            }
            text.push(self.advance().unwrap());
        }

        Ok(text)
    }

    fn matches_close(&self, pattern: &str) -> bool {
        for (i, expected) in pattern.chars().enumerate() {
            if self.peek_at(i) != Some(expected) {
                return false;
            }
        }
        true
    }

    /// Consumes a `"..."` quoted argument, respecting backslash escapes,
    /// and returns the text *with* the surrounding quotes — callers strip
    /// them later once argument resolution knows the quoting mode.
    fn lex_quoted(&mut self) -> Result<String, LexError> {
        let (start_line, start_col) = (self.line, self.col);
        let mut text = String::new();
        text.push(self.advance().unwrap()); // opening quote

        loop {
            match self.peek() {
                None => {
                    return Err(LexError::UnterminatedQuote {
                        line: start_line,
                        col: start_col,
                    })
                }
                Some('\\') => {
                    text.push(self.advance().unwrap());
                    if let Some(escaped) = self.peek() {
                        text.push(escaped);
                        self.advance();
                    }
                }
                Some('"') => {
                    text.push(self.advance().unwrap());
                    break;
                }
                Some(_) => {
                    text.push(self.advance().unwrap());
                }
            }
        }
        Ok(text)
    }

    /// Consumes a run of non-whitespace characters that may embed `${...}`,
    /// `$ENV{...}`, `$<...>` generator-expression brackets, and `;`.
    /// Stops at unescaped whitespace, an unquoted `#`, or a structural `(`/
    /// `)`/`"`.
    fn lex_unquoted(&mut self) -> String {
        let mut text = String::new();
        let mut brace_depth: i32 = 0;

        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => break,
            };

            if brace_depth == 0 {
                if c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == '#' {
                    break;
                }
                if c == '\\' {
                    text.push(self.advance().unwrap());
                    if let Some(escaped) = self.peek() {
                        text.push(escaped);
                        self.advance();
                    }
                    continue;
                }
            }

            if c == '{' {
                brace_depth += 1;
            } else if c == '}' && brace_depth > 0 {
                brace_depth -= 1;
            }

            text.push(self.advance().unwrap());
        }

        text
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize `source`, producing the full token stream ending in `End`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_command() {
        let tokens = tokenize("set(X 1)").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Command,
                TokenKind::ParenOpen,
                TokenKind::ArgUnquoted,
                TokenKind::ArgUnquoted,
                TokenKind::ParenClose,
                TokenKind::End,
            ]
        );
        assert_eq!(tokens[0].text, "set");
    }

    #[test]
    fn command_with_space_before_paren() {
        let tokens = tokenize("add_executable (foo bar)").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Command);
    }

    #[test]
    fn quoted_argument_keeps_quotes() {
        let tokens = tokenize(r#"set(X "a b")"#).unwrap();
        let quoted = tokens.iter().find(|t| t.kind == TokenKind::ArgQuoted).unwrap();
        assert_eq!(quoted.text, "\"a b\"");
    }

    #[test]
    fn bracket_argument_preserves_semicolons() {
        let tokens = tokenize("set(X [=[a;b]=])").unwrap();
        let bracket = tokens
            .iter()
            .find(|t| t.kind == TokenKind::ArgBracket)
            .unwrap();
        assert_eq!(bracket.text, "[=[a;b]=]");
    }

    #[test]
    fn bracket_requires_matching_equals_count() {
        // `[==[` opened, closed with a single `=` — should not match, so
        // the bracket just keeps consuming until the real close or EOF.
        let tokens = tokenize("set(X [==[a]=]b]==])").unwrap();
        let bracket = tokens
            .iter()
            .find(|t| t.kind == TokenKind::ArgBracket)
            .unwrap();
        assert_eq!(bracket.text, "[==[a]=]b]==]");
    }

    #[test]
    fn unterminated_bracket_is_an_error() {
        let err = tokenize("set(X [=[unterminated)").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedBracket { .. }));
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = tokenize(r#"set(X "unterminated)"#).unwrap_err();
        assert!(matches!(err, LexError::UnterminatedQuote { .. }));
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let tokens = tokenize("set(X 1) # comment\nset(Y 2)").unwrap();
        let commands: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Command)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(commands, vec!["set", "set"]);
    }

    #[test]
    fn line_continuation_joins_lines() {
        let tokens = tokenize("set(X 1 \\\n2)").unwrap();
        let args: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::ArgUnquoted)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(args, vec!["X", "1", "2"]);
    }

    #[test]
    fn generator_expression_bracket_preserved_in_unquoted() {
        let tokens = tokenize("set(X $<$<CONFIG:Debug>:A;B>)").unwrap();
        let arg = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::ArgUnquoted)
            .nth(1)
            .unwrap();
        assert_eq!(arg.text, "$<$<CONFIG:Debug>:A;B>");
    }

    #[test]
    fn nested_parens_are_structural() {
        let tokens = tokenize("if((A))").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Command,
                TokenKind::ParenOpen,
                TokenKind::ParenOpen,
                TokenKind::ArgUnquoted,
                TokenKind::ParenClose,
                TokenKind::ParenClose,
                TokenKind::End,
            ]
        );
    }
}
