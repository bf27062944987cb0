//! Prelude module - common imports for calcol users
//!
//! ```rust
//! use calcol::prelude::*;
//! ```

pub use crate::{
    // Recalculation
    recompute,
    recompute_all,
    // Formula authoring
    BasicFormula,
    BinaryOperator,
    CalculationOptions,
    CalculationStats,
    // Columns
    ColumnDefinition,
    ColumnKind,
    ColumnRegistry,
    DeclaredType,
    // Engine facade
    Engine,
    // Values
    ErrorKind,
    FieldsChanged,
    FormulaError,
    Operand,
    Recalculation,
    // Errors
    RegistryError,
    RowContext,
    RowId,
    RowStore,
    Value,
};
