//! Formula lexer
//!
//! [`Lexer`] is a lazy iterator over the tokens of a formula. It is `Clone`,
//! so a caller can restart scanning from any point; [`tokenize`] realizes the
//! whole stream up front, which is what the parser consumes.

use crate::error::LexError;
use calcol_core::parse_datetime;
use chrono::{DateTime, Utc};
use std::fmt;

/// Tokenize a formula into a complete token stream ending in [`TokenKind::Eof`]
///
/// # Example
/// ```rust
/// use calcol_formula::{tokenize, TokenKind};
///
/// let tokens = tokenize("1 - -2").unwrap();
/// let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![TokenKind::Number(1.0), TokenKind::Minus, TokenKind::Number(-2.0), TokenKind::Eof]
/// );
/// ```
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).collect()
}

/// A token and the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Date(DateTime<Utc>),

    /// Function name or the reserved word `field`
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Punctuation
    LeftParen,
    RightParen,
    Comma,

    // End of input
    Eof,
}

impl TokenKind {
    /// Whether an operand may follow this token (so `+`/`-` start a signed number)
    fn expects_operand(&self) -> bool {
        !matches!(
            self,
            TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Boolean(_)
                | TokenKind::Date(_)
                | TokenKind::Identifier(_)
                | TokenKind::RightParen
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", calcol_core::format_number(*n)),
            TokenKind::String(s) => write!(f, "string \"{}\"", s),
            TokenKind::Boolean(b) => write!(f, "{}", b),
            TokenKind::Date(d) => write!(f, "date #{}#", calcol_core::format_datetime(d)),
            TokenKind::Identifier(name) => write!(f, "'{}'", name),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Equal => write!(f, "'='"),
            TokenKind::NotEqual => write!(f, "'<>'"),
            TokenKind::LessThan => write!(f, "'<'"),
            TokenKind::LessEqual => write!(f, "'<='"),
            TokenKind::GreaterThan => write!(f, "'>'"),
            TokenKind::GreaterEqual => write!(f, "'>='"),
            TokenKind::LeftParen => write!(f, "'('"),
            TokenKind::RightParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Eof => write!(f, "end of formula"),
        }
    }
}

/// Lazy, restartable formula scanner
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    expect_operand: bool,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            expect_operand: true,
            finished: false,
        }
    }

    /// Rewind to the start of the input
    pub fn reset(&mut self) {
        self.pos = 0;
        self.expect_operand = true;
        self.finished = false;
    }

    fn scan_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let offset = self.pos;
        let c = match self.peek_char() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    offset,
                })
            }
        };

        let kind = match c {
            '+' | '-' if self.expect_operand && self.number_follows_sign() => {
                self.scan_number(offset)?
            }
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '=' => self.single(TokenKind::Equal),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            ',' => self.single(TokenKind::Comma),
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => self.single(TokenKind::LessEqual),
                    Some('>') => self.single(TokenKind::NotEqual),
                    _ => TokenKind::LessThan,
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.single(TokenKind::GreaterEqual)
                } else {
                    TokenKind::GreaterThan
                }
            }
            '"' => self.scan_string(offset)?,
            '#' => self.scan_date(offset)?,
            c if c.is_ascii_digit() => self.scan_number(offset)?,
            '.' if self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()) => {
                self.scan_number(offset)?
            }
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),
            ch => return Err(LexError::UnexpectedCharacter { ch, offset }),
        };

        Ok(Token { kind, offset })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn number_follows_sign(&self) -> bool {
        match self.peek_char_at(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.peek_char_at(2).map_or(false, |c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn scan_string(&mut self, offset: usize) -> Result<TokenKind, LexError> {
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => return Err(LexError::UnterminatedString { offset }),
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::String(s));
                }
                Some('\\') => match self.peek_char_at(1) {
                    Some(escaped @ ('"' | '\\')) => {
                        s.push(escaped);
                        self.advance();
                        self.advance();
                    }
                    // Any other backslash is literal text
                    _ => {
                        s.push('\\');
                        self.advance();
                    }
                },
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_date(&mut self, offset: usize) -> Result<TokenKind, LexError> {
        self.advance(); // Skip opening '#'

        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '#' {
                let text = &self.input[start..self.pos];
                self.advance();
                return parse_datetime(text)
                    .map(TokenKind::Date)
                    .map_err(|_| LexError::InvalidDate {
                        text: text.to_string(),
                        offset,
                    });
            }
            self.advance();
        }

        Err(LexError::UnterminatedDate { offset })
    }

    fn scan_number(&mut self, offset: usize) -> Result<TokenKind, LexError> {
        // Optional sign
        if matches!(self.peek_char(), Some('+' | '-')) {
            self.advance();
        }

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str = &self.input[offset..self.pos];
        num_str
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(TokenKind::Number)
            .ok_or_else(|| LexError::InvalidNumber {
                text: num_str.to_string(),
                offset,
            })
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        if text.eq_ignore_ascii_case("true") {
            TokenKind::Boolean(true)
        } else if text.eq_ignore_ascii_case("false") {
            TokenKind::Boolean(false)
        } else {
            TokenKind::Identifier(text.to_string())
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = self.scan_token();
        match &result {
            Ok(token) => {
                self.expect_operand = token.kind.expects_operand();
                if token.kind == TokenKind::Eof {
                    self.finished = true;
                }
            }
            // A lex error ends the stream
            Err(_) => self.finished = true,
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42"), vec![TokenKind::Number(42.0), TokenKind::Eof]);
        assert_eq!(kinds("3.25"), vec![TokenKind::Number(3.25), TokenKind::Eof]);
        assert_eq!(kinds(".5"), vec![TokenKind::Number(0.5), TokenKind::Eof]);
        assert_eq!(kinds("-7"), vec![TokenKind::Number(-7.0), TokenKind::Eof]);
        assert_eq!(kinds("+7"), vec![TokenKind::Number(7.0), TokenKind::Eof]);
    }

    #[test]
    fn test_sign_only_binds_in_operand_position() {
        assert_eq!(
            kinds("5-3"),
            vec![
                TokenKind::Number(5.0),
                TokenKind::Minus,
                TokenKind::Number(3.0),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("(-3)*-2"),
            vec![
                TokenKind::LeftParen,
                TokenKind::Number(-3.0),
                TokenKind::RightParen,
                TokenKind::Star,
                TokenKind::Number(-2.0),
                TokenKind::Eof
            ]
        );
        // A sign in front of anything but a digit stays an operator
        assert_eq!(kinds("-field")[0], TokenKind::Minus);
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#""In progress""#),
            vec![TokenKind::String("In progress".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds(r#""say \"hi\" \\ C:\tmp""#),
            vec![
                TokenKind::String(r#"say "hi" \ C:\tmp"#.into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_identifiers_and_booleans() {
        assert_eq!(
            kinds("field TRUE false Due_Date2"),
            vec![
                TokenKind::Identifier("field".into()),
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Identifier("Due_Date2".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("1 = 2 <> 3 < 4 <= 5 > 6 >= 7"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Equal,
                TokenKind::Number(2.0),
                TokenKind::NotEqual,
                TokenKind::Number(3.0),
                TokenKind::LessThan,
                TokenKind::Number(4.0),
                TokenKind::LessEqual,
                TokenKind::Number(5.0),
                TokenKind::GreaterThan,
                TokenKind::Number(6.0),
                TokenKind::GreaterEqual,
                TokenKind::Number(7.0),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_date_literal() {
        let tokens = kinds("#2024-05-01#");
        let expected = parse_datetime("2024-05-01").unwrap();
        assert_eq!(tokens, vec![TokenKind::Date(expected), TokenKind::Eof]);
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize(r#"  SUM( 1 ,"x")"#).unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![2, 5, 7, 9, 10, 13, 14]);
    }

    #[test]
    fn test_errors_carry_offsets() {
        assert_eq!(
            tokenize(r#"1 + "abc"#),
            Err(LexError::UnterminatedString { offset: 4 })
        );
        assert_eq!(
            tokenize("1 $ 2"),
            Err(LexError::UnexpectedCharacter { ch: '$', offset: 2 })
        );
        assert_eq!(
            tokenize("#2024-13-01#"),
            Err(LexError::InvalidDate {
                text: "2024-13-01".into(),
                offset: 0
            })
        );
        assert_eq!(
            tokenize("#2024-01-01"),
            Err(LexError::UnterminatedDate { offset: 0 })
        );
    }

    #[test]
    fn test_offsets_count_bytes() {
        assert_eq!(
            tokenize(r#""héllo" ?"#),
            Err(LexError::UnexpectedCharacter { ch: '?', offset: 9 })
        );
    }

    #[test]
    fn test_lexer_is_restartable() {
        let mut lexer = Lexer::new("1 + 2");
        let first: Vec<_> = lexer.by_ref().collect();
        assert!(lexer.next().is_none());

        lexer.reset();
        let second: Vec<_> = lexer.collect();
        assert_eq!(first, second);
    }
}
