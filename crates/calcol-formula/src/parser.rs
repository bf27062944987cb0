//! Formula parser
//!
//! A recursive descent parser over a realized token stream with a fixed
//! operator precedence. Function names and arities are checked here, so a
//! formula that parses can always be dispatched at evaluation time.
//!
//! Both the parser's own recursion and the depth of the resulting tree are
//! capped at [`MAX_DEPTH`], so every later walk over a parsed formula stays
//! shallow.

use crate::ast::{BinaryOperator, Expr};
use crate::error::{FormulaResult, ParseError};
use crate::functions::function_registry;
use crate::lexer::{tokenize, Token, TokenKind};
use calcol_core::Value;

/// Deepest nesting a formula may have
///
/// Counts parentheses, unary operators and calls on the way down, and the
/// depth of the finished tree (a chain of `n` binary operators is `n + 1`
/// deep).
pub const MAX_DEPTH: usize = 100;

/// An expression together with its tree depth
type Parsed = Result<(Expr, usize), ParseError>;

/// Parse formula text into an AST
///
/// This is the only path from text to AST: basic-mode formulas, previews and
/// stored formulas all come through here.
///
/// # Example
/// ```rust
/// use calcol_formula::parse_formula;
///
/// let ast = parse_formula("1+2").unwrap();
/// let ast = parse_formula(r#"field("Budget") - field("Spent")"#).unwrap();
/// let ast = parse_formula(r#"IF(field("Progress") >= 100, "Done", "In progress")"#).unwrap();
/// ```
pub fn parse_formula(text: &str) -> FormulaResult<Expr> {
    let tokens = tokenize(text)?;
    Ok(parse(&tokens)?)
}

/// Parse a token stream (as produced by [`tokenize`]) into an AST
pub fn parse(tokens: &[Token]) -> Result<Expr, ParseError> {
    let mut parser = FormulaParser::new(tokens);
    let (expr, _) = parser.parse_expression()?;

    // Make sure we consumed all input
    let token = parser.current();
    if token.kind != TokenKind::Eof {
        return Err(ParseError::TrailingInput {
            found: token.kind.to_string(),
            offset: token.offset,
        });
    }

    Ok(expr)
}

/// Formula parser
struct FormulaParser<'t> {
    tokens: &'t [Token],
    pos: usize,
    eof: Token,
    nesting: usize,
}

impl<'t> FormulaParser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        let end = tokens.last().map_or(0, |t| t.offset);
        Self {
            tokens,
            pos: 0,
            eof: Token {
                kind: TokenKind::Eof,
                offset: end,
            },
            nesting: 0,
        }
    }

    // === Token helpers ===

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn consume(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            expected,
            found: token.kind.to_string(),
            offset: token.offset,
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<Token, ParseError> {
        if self.current_kind() == kind {
            Ok(self.consume())
        } else {
            Err(self.unexpected(expected))
        }
    }

    // === Depth limits ===

    fn enter(&mut self, offset: usize) -> Result<(), ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_DEPTH {
            return Err(ParseError::TooDeep { offset });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    fn check_depth(depth: usize, offset: usize) -> Result<usize, ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::TooDeep { offset });
        }
        Ok(depth)
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Addition/Subtraction: +, -
    // 3. Multiplication/Division: *, /
    // 4. Unary: -
    // 5. Primary: literals, field(), function calls, parentheses

    fn parse_expression(&mut self) -> Parsed {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Parsed {
        let (mut left, mut depth) = self.parse_additive()?;

        loop {
            let op = match self.current_kind() {
                TokenKind::Equal => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            let offset = self.consume().offset;
            let (right, right_depth) = self.parse_additive()?;
            depth = Self::check_depth(depth.max(right_depth) + 1, offset)?;
            left = Expr::binary(op, left, right);
        }

        Ok((left, depth))
    }

    fn parse_additive(&mut self) -> Parsed {
        let (mut left, mut depth) = self.parse_multiplicative()?;

        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            let offset = self.consume().offset;
            let (right, right_depth) = self.parse_multiplicative()?;
            depth = Self::check_depth(depth.max(right_depth) + 1, offset)?;
            left = Expr::binary(op, left, right);
        }

        Ok((left, depth))
    }

    fn parse_multiplicative(&mut self) -> Parsed {
        let (mut left, mut depth) = self.parse_unary()?;

        loop {
            let op = match self.current_kind() {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => break,
            };

            let offset = self.consume().offset;
            let (right, right_depth) = self.parse_unary()?;
            depth = Self::check_depth(depth.max(right_depth) + 1, offset)?;
            left = Expr::binary(op, left, right);
        }

        Ok((left, depth))
    }

    fn parse_unary(&mut self) -> Parsed {
        // A minus in front of a number literal was already folded in by the lexer
        if matches!(self.current_kind(), TokenKind::Minus) {
            let offset = self.consume().offset;
            self.enter(offset)?;
            let (operand, depth) = self.parse_unary()?;
            self.leave();
            let depth = Self::check_depth(depth + 1, offset)?;
            return Ok((Expr::negate(operand), depth));
        }

        // Prefix plus (no-op)
        if matches!(self.current_kind(), TokenKind::Plus) {
            let offset = self.consume().offset;
            self.enter(offset)?;
            let parsed = self.parse_unary()?;
            self.leave();
            return Ok(parsed);
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Parsed {
        match self.current_kind().clone() {
            TokenKind::Number(n) => {
                self.consume();
                Ok((Expr::Literal(Value::Number(n)), 1))
            }

            TokenKind::String(s) => {
                self.consume();
                Ok((Expr::Literal(Value::Text(s)), 1))
            }

            TokenKind::Boolean(b) => {
                self.consume();
                Ok((Expr::Literal(Value::Bool(b)), 1))
            }

            TokenKind::Date(d) => {
                self.consume();
                Ok((Expr::Literal(Value::DateTime(d)), 1))
            }

            TokenKind::LeftParen => {
                let offset = self.consume().offset;
                self.enter(offset)?;
                let parsed = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                self.leave();
                Ok(parsed)
            }

            TokenKind::Identifier(name) => {
                let token = self.consume();
                if !matches!(self.current_kind(), TokenKind::LeftParen) {
                    return Err(ParseError::BareIdentifier {
                        name,
                        offset: token.offset,
                    });
                }
                if name.eq_ignore_ascii_case("field") {
                    Ok((self.parse_field_reference(token.offset)?, 1))
                } else {
                    self.enter(token.offset)?;
                    let parsed = self.parse_function_call(name, token.offset)?;
                    self.leave();
                    Ok(parsed)
                }
            }

            _ => Err(self.unexpected("a value, field() or a function call")),
        }
    }

    /// `field("Name")`: exactly one string literal, not a general function
    fn parse_field_reference(&mut self, offset: usize) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen, "'('")?;

        let name = match self.current_kind().clone() {
            TokenKind::String(name) => {
                self.consume();
                name
            }
            _ => return Err(ParseError::InvalidFieldReference { offset }),
        };

        if !matches!(self.current_kind(), TokenKind::RightParen) {
            return Err(ParseError::InvalidFieldReference { offset });
        }
        self.consume();

        Ok(Expr::FieldRef(name))
    }

    fn parse_function_call(&mut self, name: String, offset: usize) -> Parsed {
        let func = function_registry()
            .get(&name)
            .ok_or_else(|| ParseError::UnknownFunction {
                name: name.clone(),
                offset,
            })?;

        self.expect(&TokenKind::LeftParen, "'('")?;

        let mut args = Vec::new();
        let mut depth = 0;

        // Parse arguments
        if !matches!(self.current_kind(), TokenKind::RightParen) {
            loop {
                let (arg, arg_depth) = self.parse_expression()?;
                args.push(arg);
                depth = depth.max(arg_depth);

                if !matches!(self.current_kind(), TokenKind::Comma) {
                    break;
                }
                self.consume();
            }
        }

        self.expect(&TokenKind::RightParen, "',' or ')'")?;

        // Check argument count
        if let Some(expected) = func.arity_mismatch(args.len()) {
            return Err(ParseError::ArgumentCount {
                function: func.name.to_string(),
                expected,
                actual: args.len(),
                offset,
            });
        }

        let depth = Self::check_depth(depth + 1, offset)?;
        Ok((
            Expr::Call {
                name: func.name.to_string(),
                args,
            },
            depth,
        ))
    }
}
