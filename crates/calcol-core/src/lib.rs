//! # calcol-core
//!
//! Core data structures for the calcol calculated-column engine.
//!
//! This crate provides the fundamental types shared by the formula and
//! registry crates:
//! - [`Value`] - A formula value (number, text, boolean, instant, or error)
//! - [`CellError`] and [`ErrorKind`] - Evaluation errors carried as values
//! - [`ColumnKind`] and [`DeclaredType`] - Column classification
//! - [`RowContext`] - The field values of one record
//!
//! ## Example
//!
//! ```rust
//! use calcol_core::{RowContext, Value};
//!
//! let row = RowContext::new()
//!     .with("Budget", 1000.0)
//!     .with("Owner", "dana");
//!
//! assert_eq!(row.get("Budget"), Some(&Value::Number(1000.0)));
//! assert_eq!(row.get("Budget").unwrap().to_text().unwrap(), "1000");
//! ```

pub mod column;
pub mod error;
pub mod row;
pub mod value;

// Re-exports for convenience
pub use column::{ColumnKind, DeclaredType};
pub use error::{Error, Result};
pub use row::RowContext;
pub use value::{
    format_datetime, format_number, parse_datetime, CellError, ErrorKind, EvalResult, Value,
};
