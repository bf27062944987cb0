//! # calcol-formula
//!
//! Formula lexer, parser and evaluator for calcol.
//!
//! This crate provides:
//! - Formula lexing and parsing (text → AST), with arity checked at parse time
//! - Basic-mode formulas (`left operator right`) synthesized into the same text path
//! - Formula evaluation (AST + row → value), errors carried as values
//! - Built-in functions (logic, math, string, date)
//! - The column dependency graph used for cycle checks and ordering
//!
//! ## Example
//!
//! ```rust
//! use calcol_core::{RowContext, Value};
//! use calcol_formula::{evaluate, parse_formula, EvalContext, NoColumns};
//!
//! let ast = parse_formula(r#"field("Budget") - field("Spent")"#).unwrap();
//! let row = RowContext::new().with("Budget", 1000.0).with("Spent", 400.0);
//! let ctx = EvalContext::new(&row, &NoColumns, chrono::Utc::now());
//!
//! assert_eq!(evaluate(&ast, &ctx), Value::Number(600.0));
//! ```

pub mod ast;
pub mod basic;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use basic::{BasicFormula, BasicOperator, Operand};
pub use dependency::DependencyGraph;
pub use error::{FormulaError, FormulaResult, LexError, ParseError};
pub use evaluator::{evaluate, ColumnLookup, EvalContext, NoColumns};
pub use functions::{function_registry, FunctionDef, FunctionRegistry};
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::{parse, parse_formula, MAX_DEPTH};
