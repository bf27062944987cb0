//! Formula error types
//!
//! These are authoring-time errors: they are reported when a formula is
//! saved or previewed. Evaluation never fails with them; evaluation problems
//! are [`calcol_core::Value::Error`] values instead.

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors from turning formula text into tokens
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("Unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("Unterminated date literal starting at offset {offset}")]
    UnterminatedDate { offset: usize },

    #[error("Invalid date literal '{text}' at offset {offset}")]
    InvalidDate { text: String, offset: usize },

    #[error("Invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },
}

impl LexError {
    /// Byte offset into the formula text, for highlighting
    pub fn offset(&self) -> usize {
        match self {
            LexError::UnterminatedString { offset }
            | LexError::UnterminatedDate { offset }
            | LexError::InvalidDate { offset, .. }
            | LexError::InvalidNumber { offset, .. }
            | LexError::UnexpectedCharacter { offset, .. } => *offset,
        }
    }
}

/// Errors from turning tokens into an AST
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Expected {expected}, found {found} at offset {offset}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        offset: usize,
    },

    #[error("Unexpected {found} after the end of the formula at offset {offset}")]
    TrailingInput { found: String, offset: usize },

    #[error("Unknown function: {name} at offset {offset}")]
    UnknownFunction { name: String, offset: usize },

    /// A bare name that is neither a function call nor `field(...)`
    #[error("Unknown name '{name}' at offset {offset}; refer to columns as field(\"{name}\")")]
    BareIdentifier { name: String, offset: usize },

    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual} at offset {offset}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
        offset: usize,
    },

    #[error("field() takes exactly one quoted column name at offset {offset}")]
    InvalidFieldReference { offset: usize },

    /// Nesting beyond [`MAX_DEPTH`](crate::parser::MAX_DEPTH)
    #[error("Formula is nested too deeply at offset {offset}")]
    TooDeep { offset: usize },
}

impl ParseError {
    /// Byte offset into the formula text, for highlighting
    pub fn offset(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { offset, .. }
            | ParseError::TrailingInput { offset, .. }
            | ParseError::UnknownFunction { offset, .. }
            | ParseError::BareIdentifier { offset, .. }
            | ParseError::ArgumentCount { offset, .. }
            | ParseError::InvalidFieldReference { offset }
            | ParseError::TooDeep { offset } => *offset,
        }
    }
}

/// Errors that can occur while turning formula text into an AST
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula lex error
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),

    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl FormulaError {
    /// Byte offset into the formula text, for highlighting
    pub fn offset(&self) -> usize {
        match self {
            FormulaError::Lex(e) => e.offset(),
            FormulaError::Parse(e) => e.offset(),
        }
    }
}
