//! Row recalculation
//!
//! Given a row and the fields that changed, re-evaluates exactly the
//! calculated columns that depend on them, in dependency order, and reports
//! the values that differ from what the row held before.
//!
//! # Example
//!
//! ```rust
//! use calcol::prelude::*;
//!
//! let mut registry = ColumnRegistry::new();
//! registry
//!     .define_calculated("Remaining", r#"field("Budget") - field("Spent")"#)
//!     .unwrap();
//!
//! let row = RowContext::new()
//!     .with("Budget", 1000.0)
//!     .with("Spent", 600.0)
//!     .with("Remaining", 600.0);
//!
//! let changed = recompute(&row, &["Spent"], &registry);
//! assert_eq!(changed.get("Remaining"), Some(&Value::Number(400.0)));
//! ```

use crate::registry::ColumnRegistry;
use ahash::AHashSet;
use calcol_core::{RowContext, Value};
use calcol_formula::{evaluate, ColumnLookup, EvalContext};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Options for a recalculation pass
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CalculationOptions {
    /// Also re-evaluate columns that call NOW() or TODAY(), and their dependents
    pub include_volatile: bool,
    /// Clock reading for the pass (default: the current time)
    pub now: Option<DateTime<Utc>>,
}

impl CalculationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include volatile columns
    pub fn with_volatile(mut self, include_volatile: bool) -> Self {
        self.include_volatile = include_volatile;
        self
    }

    /// Pin the clock
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// The single clock reading for one pass
    pub(crate) fn clock(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

/// Statistics from a recalculation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalculationStats {
    /// Number of columns evaluated
    pub columns_evaluated: usize,
    /// Number of columns whose value changed
    pub columns_changed: usize,
    /// Number of columns that evaluated to an error
    pub errors: usize,
}

impl CalculationStats {
    /// Add another pass's counts to these
    pub fn merge(&mut self, other: &CalculationStats) {
        self.columns_evaluated += other.columns_evaluated;
        self.columns_changed += other.columns_changed;
        self.errors += other.errors;
    }
}

/// Outcome of a recalculation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recalculation {
    /// Column → new value, only for columns whose value changed
    pub changed: HashMap<String, Value>,
    pub stats: CalculationStats,
}

/// Recompute the columns affected by `changed` fields
///
/// Returns only the values that differ from the row's current ones. An error
/// result always counts as a change. Calculated columns the affected ones read
/// but the row holds no value for are computed as well.
pub fn recompute<S: AsRef<str>>(
    row: &RowContext,
    changed: &[S],
    registry: &ColumnRegistry,
) -> HashMap<String, Value> {
    recompute_with_options(row, changed, registry, &CalculationOptions::default()).changed
}

/// Recompute the columns affected by `changed` fields with custom options
pub fn recompute_with_options<S: AsRef<str>>(
    row: &RowContext,
    changed: &[S],
    registry: &ColumnRegistry,
    options: &CalculationOptions,
) -> Recalculation {
    let seeds = seed_columns(registry, changed, options.include_volatile);
    let order = registry.resolve_evaluation_order(seeds.iter().map(String::as_str));
    let order = complete_order(registry, &seeds, &order, |name| row.contains(name));

    run_pass(row, &order, registry, options.clock())
}

/// Evaluate every calculated column (initial load of a row)
pub fn recompute_all(row: &RowContext, registry: &ColumnRegistry) -> HashMap<String, Value> {
    recompute_all_with_options(row, registry, &CalculationOptions::default()).changed
}

/// Evaluate every calculated column with custom options
pub fn recompute_all_with_options(
    row: &RowContext,
    registry: &ColumnRegistry,
    options: &CalculationOptions,
) -> Recalculation {
    let order = registry.full_evaluation_order();
    run_pass(row, &order, registry, options.clock())
}

/// The changed fields, plus the volatile columns when asked for
pub(crate) fn seed_columns<S: AsRef<str>>(
    registry: &ColumnRegistry,
    changed: &[S],
    include_volatile: bool,
) -> Vec<String> {
    let mut seeds: Vec<String> = changed.iter().map(|name| name.as_ref().to_string()).collect();
    if include_volatile {
        seeds.extend(registry.volatile_columns().map(str::to_string));
    }
    seeds
}

/// Grow `order` until every calculated column it reads is in it or has a value
///
/// `order` is the evaluation order for `seeds`. A row last computed before a
/// calculated column existed has no value for it; that column joins the pass
/// instead of being read as missing.
pub(crate) fn complete_order<'o, F>(
    registry: &ColumnRegistry,
    seeds: &[String],
    order: &'o [String],
    has_value: F,
) -> Cow<'o, [String]>
where
    F: Fn(&str) -> bool,
{
    let mut missing = missing_precedents(registry, order, &has_value);
    if missing.is_empty() {
        return Cow::Borrowed(order);
    }

    let mut seeds = seeds.to_vec();
    loop {
        debug!(columns = ?missing, "computing columns the row has no value for");
        seeds.extend(missing.into_iter().map(str::to_string));
        let order = registry.resolve_evaluation_order(seeds.iter().map(String::as_str));
        missing = missing_precedents(registry, &order, &has_value);
        if missing.is_empty() {
            return Cow::Owned(order);
        }
    }
}

/// Calculated columns read by `order` that are neither in it nor have a value
fn missing_precedents<'r, F>(
    registry: &'r ColumnRegistry,
    order: &[String],
    has_value: &F,
) -> Vec<&'r str>
where
    F: Fn(&str) -> bool,
{
    let in_pass: AHashSet<&str> = order.iter().map(String::as_str).collect();
    let mut missing = Vec::new();
    for name in order {
        for precedent in registry.precedents_of(name) {
            if in_pass.contains(precedent)
                || missing.contains(&precedent)
                || !registry.is_calculated(precedent)
                || has_value(precedent)
            {
                continue;
            }
            missing.push(precedent);
        }
    }
    missing
}

/// Evaluate `order` against a working copy of the row
///
/// Later columns see the values computed earlier in the same pass.
pub(crate) fn run_pass(
    row: &RowContext,
    order: &[String],
    registry: &ColumnRegistry,
    now: DateTime<Utc>,
) -> Recalculation {
    let mut outcome = Recalculation::default();
    if order.is_empty() {
        return outcome;
    }

    let mut working = row.clone();
    for name in order {
        let ast = match registry.column(name).and_then(|c| c.formula()) {
            Some(ast) => ast,
            None => continue,
        };

        let value = {
            let ctx = EvalContext::new(&working, registry, now);
            evaluate(ast, &ctx)
        };
        trace!(column = %name, value = %value, "evaluated column");

        outcome.stats.columns_evaluated += 1;
        if value.is_error() {
            outcome.stats.errors += 1;
        }

        let unchanged = working
            .get(name)
            .map_or(false, |previous| value.unchanged_from(previous));
        if !unchanged {
            outcome.changed.insert(name.clone(), value.clone());
        }
        working.set(name.clone(), value);
    }

    outcome.stats.columns_changed = outcome.changed.len();
    debug!(
        evaluated = outcome.stats.columns_evaluated,
        changed = outcome.stats.columns_changed,
        errors = outcome.stats.errors,
        "recalculated row"
    );

    outcome
}
