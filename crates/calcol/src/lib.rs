//! # calcol
//!
//! A formula engine for calculated columns on task-like records.
//!
//! Users attach formulas such as `field("Budget") - field("Spent")` to
//! columns. The engine parses and validates them when they are saved, keeps
//! the column dependency graph acyclic, and when a row's fields change
//! re-evaluates just the affected columns in dependency order.
//!
//! ## Features
//!
//! - Advanced formulas (free text) and basic two-operand formulas, one parser
//! - Parse-time checks for unknown functions, arity and circular references
//! - Spreadsheet-style error values that never abort other columns or rows
//! - One clock reading per pass for `NOW()` and `TODAY()`
//! - Parallel bulk recompute across rows
//!
//! ## Example
//!
//! ```rust
//! use calcol::prelude::*;
//!
//! let engine = Engine::new();
//! engine
//!     .define_column(
//!         "Status",
//!         ColumnKind::Calculated,
//!         Some(r#"IF(field("Progress") >= 100, "Done", "In progress")"#),
//!     )
//!     .unwrap();
//!
//! let row = RowContext::new().with("Progress", 100.0);
//! let outcome = engine.recompute(&row, &["Progress"]);
//! assert_eq!(outcome.changed["Status"], Value::from("Done"));
//! ```

pub mod calculation;
pub mod engine;
pub mod prelude;
pub mod registry;

// Re-export calculation types
pub use calculation::{
    recompute, recompute_all, recompute_all_with_options, recompute_with_options,
    CalculationOptions, CalculationStats, Recalculation,
};
pub use engine::{Engine, FieldsChanged, RowId, RowStore};
pub use registry::{ColumnDefinition, ColumnRegistry, RegistryError};

// Re-export core types
pub use calcol_core::{
    format_datetime, format_number, parse_datetime, CellError, ColumnKind, DeclaredType,
    ErrorKind, RowContext, Value,
};

// Re-export formula types
pub use calcol_formula::{
    evaluate, function_registry, parse_formula, BasicFormula, BasicOperator, BinaryOperator,
    ColumnLookup, DependencyGraph, EvalContext, Expr, FormulaError, FormulaResult, LexError,
    NoColumns, Operand, ParseError,
};
