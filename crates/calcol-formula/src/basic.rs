//! Basic-mode formulas
//!
//! A basic formula is `left operator right`, each side a literal or one
//! column. It is not evaluated on its own: it is turned into formula text and
//! parsed like any other formula.

use crate::ast::{write_literal, write_quoted, BinaryOperator, Expr};
use crate::error::FormulaResult;
use crate::parser::parse_formula;
use calcol_core::Value;
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Operators offered in basic mode: every binary operator
pub type BasicOperator = BinaryOperator;

/// One side of a basic formula
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `field("Name")`
    Field(String),
    Number(f64),
    Text(String),
    Bool(bool),
    Date(DateTime<Utc>),
}

impl Operand {
    pub fn field<S: Into<String>>(name: S) -> Self {
        Operand::Field(name.into())
    }

    fn to_expr(&self) -> Expr {
        match self {
            Operand::Field(name) => Expr::FieldRef(name.clone()),
            Operand::Number(n) => Expr::Literal(Value::Number(*n)),
            Operand::Text(s) => Expr::Literal(Value::Text(s.clone())),
            Operand::Bool(b) => Expr::Literal(Value::Bool(*b)),
            Operand::Date(dt) => Expr::Literal(Value::DateTime(*dt)),
        }
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        match self {
            Operand::Field(name) => {
                out.push_str("field(");
                write_quoted(out, name)?;
                out.push(')');
                Ok(())
            }
            Operand::Number(n) => write_literal(out, &Value::Number(*n)),
            Operand::Text(s) => write_quoted(out, s),
            Operand::Bool(b) => write_literal(out, &Value::Bool(*b)),
            Operand::Date(dt) => write_literal(out, &Value::DateTime(*dt)),
        }
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Number(n)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Text(s.to_string())
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Bool(b)
    }
}

impl From<DateTime<Utc>> for Operand {
    fn from(dt: DateTime<Utc>) -> Self {
        Operand::Date(dt)
    }
}

/// `left operator right`
#[derive(Debug, Clone, PartialEq)]
pub struct BasicFormula {
    pub left: Operand,
    pub op: BasicOperator,
    pub right: Operand,
}

impl BasicFormula {
    pub fn new(left: Operand, op: BasicOperator, right: Operand) -> Self {
        Self { left, op, right }
    }

    /// Advanced-mode text for this formula; this is what gets stored
    pub fn to_formula_text(&self) -> String {
        let mut text = String::new();
        // Writing into a String cannot fail
        let _ = self
            .left
            .write_text(&mut text)
            .and_then(|_| write!(text, " {} ", self.op))
            .and_then(|_| self.right.write_text(&mut text));
        text
    }

    /// Parse the synthesized text
    pub fn parse(&self) -> FormulaResult<Expr> {
        parse_formula(&self.to_formula_text())
    }

    /// The AST the formula stands for, built without going through text
    pub fn to_expr(&self) -> Expr {
        Expr::binary(self.op, self.left.to_expr(), self.right.to_expr())
    }
}
