//! Top-level error types.
//!
//! One `thiserror` enum per pipeline stage rather than a single
//! catch-all error.

use thiserror::Error;

/// Lexer-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("{line}:{col}: unterminated bracket argument (opened with {open_count} '=' signs)")]
    UnterminatedBracket {
        line: usize,
        col: usize,
        open_count: usize,
    },

    #[error("{line}:{col}: unterminated quoted argument")]
    UnterminatedQuote { line: usize, col: usize },

    #[error("{line}:{col}: invalid control byte 0x{byte:02x}")]
    InvalidControlByte { line: usize, col: usize, byte: u8 },
}

/// Parser-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),

    #[error("{line}: expected '(' after command name '{name}'")]
    ExpectedParenAfterCommand { name: String, line: usize },

    #[error("{line}: unterminated argument list for '{name}' (missing ')')")]
    UnterminatedArgList { name: String, line: usize },

    #[error("{line}: unexpected '{found}', expected '{expected}'")]
    Unexpected {
        found: String,
        expected: String,
        line: usize,
    },

    #[error("{line}: unmatched '{keyword}' with no matching block opener")]
    UnmatchedBlockKeyword { keyword: String, line: usize },

    #[error("{line}: unterminated '{opener}' block, reached end of file")]
    UnterminatedBlock { opener: String, line: usize },
}
