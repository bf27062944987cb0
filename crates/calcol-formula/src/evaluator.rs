//! Formula evaluator
//!
//! Evaluates formula ASTs against one row to produce values. Evaluation never
//! fails: problems come back as [`Value::Error`] and flow through operators and
//! functions like any other value.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::functions::function_registry;
use calcol_core::{CellError, EvalResult, RowContext, Value};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// What the evaluator needs to know about the column registry
///
/// Implemented by the production registry and by whatever a preview uses, so
/// both go through the same evaluation code.
pub trait ColumnLookup {
    /// Whether `name` is a registered calculated column
    fn is_calculated(&self, name: &str) -> bool;
}

/// Lookup for contexts without a registry: nothing is calculated
#[derive(Debug, Clone, Copy, Default)]
pub struct NoColumns;

impl ColumnLookup for NoColumns {
    fn is_calculated(&self, _name: &str) -> bool {
        false
    }
}

/// Context for formula evaluation
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Field values of the row being evaluated
    pub row: &'a RowContext,
    /// Column registry view
    pub columns: &'a dyn ColumnLookup,
    /// Instant captured once for the pass
    pub now: DateTime<Utc>,
}

impl<'a> EvalContext<'a> {
    /// Create a new evaluation context
    pub fn new(row: &'a RowContext, columns: &'a dyn ColumnLookup, now: DateTime<Utc>) -> Self {
        Self { row, columns, now }
    }

    /// Value of a field in the current row
    fn field_value(&self, name: &str) -> Value {
        if let Some(value) = self.row.get(name) {
            return match value {
                Value::Number(n) => into_value(finite(*n)),
                other => other.clone(),
            };
        }

        if self.columns.is_calculated(name) {
            // The coordinator orders precedents first, so this is a bug upstream
            tracing::error!(
                target: "calcol::internal_order",
                column = name,
                "calculated column read before it was computed"
            );
            return Value::Error(CellError::internal_order(format!(
                "column '{}' was read before it was computed",
                name
            )));
        }

        Value::Error(CellError::value_error(format!(
            "column '{}' has no value",
            name
        )))
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &Expr, ctx: &EvalContext) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),

        Expr::FieldRef(name) => ctx.field_value(name),

        Expr::BinaryOp { op, left, right } => {
            let left_val = evaluate(left, ctx);
            let right_val = evaluate(right, ctx);
            into_value(evaluate_binary_op(*op, &left_val, &right_val))
        }

        Expr::UnaryOp { op, operand } => {
            let val = evaluate(operand, ctx);
            into_value(evaluate_unary_op(*op, &val))
        }

        Expr::Call { name, args } => {
            let values = args.iter().map(|arg| evaluate(arg, ctx)).collect();
            call_function(name, values, ctx)
        }
    }
}

fn into_value(result: EvalResult<Value>) -> Value {
    result.unwrap_or_else(Value::Error)
}

/// Reject NaN and infinities
fn finite(n: f64) -> EvalResult<Value> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(CellError::value_error("result is not a finite number"))
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    // Propagate errors, left first
    if let Value::Error(e) = left {
        return Err(e.clone());
    }
    if let Value::Error(e) = right {
        return Err(e.clone());
    }

    match op {
        BinaryOperator::Add => finite(left.to_number()? + right.to_number()?),
        BinaryOperator::Subtract => finite(left.to_number()? - right.to_number()?),
        BinaryOperator::Multiply => finite(left.to_number()? * right.to_number()?),
        BinaryOperator::Divide => {
            let l = left.to_number()?;
            let r = right.to_number()?;
            if r == 0.0 {
                Err(CellError::value_error("division by zero"))
            } else {
                finite(l / r)
            }
        }

        BinaryOperator::Equal => compare(left, right, |o| o == Ordering::Equal),
        BinaryOperator::NotEqual => compare(left, right, |o| o != Ordering::Equal),
        BinaryOperator::LessThan => compare(left, right, |o| o == Ordering::Less),
        BinaryOperator::LessEqual => compare(left, right, |o| o != Ordering::Greater),
        BinaryOperator::GreaterThan => compare(left, right, |o| o == Ordering::Greater),
        BinaryOperator::GreaterEqual => compare(left, right, |o| o != Ordering::Less),
    }
}

fn compare(left: &Value, right: &Value, test: fn(Ordering) -> bool) -> EvalResult<Value> {
    compare_values(left, right).map(|ordering| Value::Bool(test(ordering)))
}

/// Compare two non-error values
fn compare_values(left: &Value, right: &Value) -> EvalResult<Ordering> {
    match (left, right) {
        // Instants compare by time
        (Value::DateTime(l), Value::DateTime(r)) => Ok(l.cmp(r)),

        (Value::DateTime(_), other) | (other, Value::DateTime(_)) => {
            Err(CellError::type_mismatch(format!(
                "cannot compare a date with {}",
                other.type_name()
            )))
        }

        // Strings compare case-insensitively
        (Value::Text(l), Value::Text(r)) => Ok(l.to_lowercase().cmp(&r.to_lowercase())),

        // Booleans: false < true
        (Value::Bool(l), Value::Bool(r)) => Ok(l.cmp(r)),

        // Anything else compares as numbers
        _ => {
            let l = left.to_number()?;
            let r = right.to_number()?;
            l.partial_cmp(&r)
                .ok_or_else(|| CellError::value_error("cannot compare NaN"))
        }
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(op: UnaryOperator, operand: &Value) -> EvalResult<Value> {
    match op {
        UnaryOperator::Negate => Ok(Value::Number(-operand.to_number()?)),
    }
}

/// Dispatch an already-evaluated argument list to a built-in function
pub(crate) fn call_function(name: &str, args: Vec<Value>, ctx: &EvalContext) -> Value {
    let func = match function_registry().get(name) {
        Some(f) => f,
        None => {
            return Value::Error(CellError::value_error(format!(
                "unknown function {}",
                name
            )))
        }
    };

    // The parser checks arity; ASTs built by hand may not have been parsed
    if let Some(expected) = func.arity_mismatch(args.len()) {
        return Value::Error(CellError::value_error(format!(
            "{} takes {} arguments, got {}",
            func.name,
            expected,
            args.len()
        )));
    }

    if func.propagate_errors {
        if let Some(e) = args.iter().find_map(Value::as_error) {
            return Value::Error(e.clone());
        }
    }

    match (func.implementation)(&args, ctx) {
        Ok(Value::Number(n)) => into_value(finite(n)),
        Ok(value) => value,
        Err(e) => Value::Error(e),
    }
}
