//! Engine facade
//!
//! [`Engine`] is what the rest of the application talks to. The column
//! editor defines and deletes columns and previews formulas through it, the
//! task mutation pipeline hands it [`FieldsChanged`] events, and bulk jobs
//! recompute many rows at once.
//!
//! The registry sits behind a single `RwLock`: mutations take the write lock,
//! and every recalculation reads one consistent registry for its whole run.

use crate::calculation::{
    complete_order, run_pass, seed_columns, CalculationOptions, CalculationStats, Recalculation,
};
use crate::registry::{ColumnDefinition, ColumnRegistry, RegistryError};
use ahash::AHashSet;
use calcol_core::{ColumnKind, RowContext, Value};
use calcol_formula::{evaluate, parse_formula, EvalContext, FormulaError};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Identifier of a row in the row store
pub type RowId = u64;

/// Where rows live
///
/// The engine reads base and previously computed field values from the store
/// and writes freshly calculated values back.
pub trait RowStore {
    /// Current value of one field, `None` when the row has none
    fn field_value(&self, row_id: RowId, column: &str) -> Option<Value>;

    /// Persist calculated values; only called with a non-empty map
    fn set_calculated_values(&mut self, row_id: RowId, values: HashMap<String, Value>);
}

/// Base fields of a row were modified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsChanged {
    pub row_id: RowId,
    pub columns: Vec<String>,
}

impl FieldsChanged {
    pub fn new<I, S>(row_id: RowId, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            row_id,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Formula engine shared across threads
#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: Arc<RwLock<ColumnRegistry>>,
    options: CalculationOptions,
    thread_pool: Option<Arc<rayon::ThreadPool>>,
}

impl Engine {
    /// Create an engine with an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine around an existing registry
    pub fn with_registry(registry: ColumnRegistry) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            ..Self::default()
        }
    }

    /// Set the options used by every recalculation
    pub fn with_options(mut self, options: CalculationOptions) -> Self {
        self.options = options;
        self
    }

    /// Run bulk recomputes on a dedicated thread pool instead of the global one
    pub fn with_thread_pool(mut self, thread_pool: Arc<rayon::ThreadPool>) -> Self {
        self.thread_pool = Some(thread_pool);
        self
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    // Mutations replace registry state in one step after validating, so a
    // poisoned lock still guards a consistent registry.
    fn read(&self) -> RwLockReadGuard<'_, ColumnRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ColumnRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read access to the registry
    pub fn registry(&self) -> RwLockReadGuard<'_, ColumnRegistry> {
        self.read()
    }

    // === Column editor ===

    /// Create or redefine a column
    pub fn define_column(
        &self,
        name: &str,
        kind: ColumnKind,
        formula_text: Option<&str>,
    ) -> Result<(), RegistryError> {
        self.write().define_column(name, kind, formula_text)
    }

    /// Delete a column nothing else references
    pub fn delete_column(&self, name: &str) -> Result<ColumnDefinition, RegistryError> {
        self.write().delete_column(name)
    }

    /// Copy of a column definition
    pub fn column(&self, name: &str) -> Option<ColumnDefinition> {
        self.read().column(name).cloned()
    }

    /// Evaluate unsaved formula text against a sample row
    ///
    /// The sample row gets the registry's calculated columns first, so the
    /// preview can reference them, then the formula is parsed and evaluated
    /// exactly as a saved column would be.
    pub fn preview_evaluate(
        &self,
        formula_text: &str,
        sample_row: &RowContext,
    ) -> Result<Value, FormulaError> {
        let ast = parse_formula(formula_text)?;

        let registry = self.read();
        let now = self.options.clock();
        let order = registry.full_evaluation_order();
        let computed = run_pass(sample_row, &order, &registry, now);

        let mut row = sample_row.clone();
        row.extend(computed.changed);

        let ctx = EvalContext::new(&row, &*registry, now);
        Ok(evaluate(&ast, &ctx))
    }

    // === Recalculation ===

    /// Recompute one row after `changed` fields changed
    pub fn recompute<S: AsRef<str>>(&self, row: &RowContext, changed: &[S]) -> Recalculation {
        crate::calculation::recompute_with_options(row, changed, &self.read(), &self.options)
    }

    /// Evaluate every calculated column of one row
    pub fn recompute_all(&self, row: &RowContext) -> Recalculation {
        crate::calculation::recompute_all_with_options(row, &self.read(), &self.options)
    }

    /// React to a field change announced by the mutation pipeline
    ///
    /// Loads what the affected columns read from the store, recomputes, and
    /// writes back the values that changed.
    pub fn handle_fields_changed<S>(&self, store: &mut S, event: &FieldsChanged) -> CalculationStats
    where
        S: RowStore + ?Sized,
    {
        let outcome = {
            let registry = self.read();
            let seeds = seed_columns(&registry, &event.columns, self.options.include_volatile);
            let (order, row) = plan_row(&registry, &*store, event.row_id, &seeds);
            run_pass(&row, &order, &registry, self.options.clock())
        };

        debug!(
            row_id = event.row_id,
            fields = ?event.columns,
            changed = outcome.stats.columns_changed,
            "handled field change"
        );

        if !outcome.changed.is_empty() {
            store.set_calculated_values(event.row_id, outcome.changed);
        }
        outcome.stats
    }

    /// Recompute many rows in parallel after the same fields changed in each
    ///
    /// All rows are computed against one registry snapshot and one clock
    /// reading. Results come back in input order. A row without a value for a
    /// calculated column the pass reads gets that column computed too.
    pub fn recompute_rows<S>(&self, rows: &[RowContext], changed: &[S]) -> Vec<Recalculation>
    where
        S: AsRef<str>,
    {
        let registry = self.read();
        let seeds = seed_columns(&registry, changed, self.options.include_volatile);
        let order = registry.resolve_evaluation_order(seeds.iter().map(String::as_str));
        self.run_bulk(rows, &seeds, &order, &registry)
    }

    /// Evaluate every calculated column of many rows in parallel
    pub fn recompute_all_rows(&self, rows: &[RowContext]) -> Vec<Recalculation> {
        let registry = self.read();
        let order = registry.full_evaluation_order();
        self.run_bulk(rows, &order, &order, &registry)
    }

    fn run_bulk(
        &self,
        rows: &[RowContext],
        seeds: &[String],
        order: &[String],
        registry: &ColumnRegistry,
    ) -> Vec<Recalculation> {
        let now = self.options.clock();
        debug!(rows = rows.len(), columns = order.len(), "bulk recompute");

        let compute = || -> Vec<Recalculation> {
            rows.par_iter()
                .map(|row| {
                    let order = complete_order(registry, seeds, order, |name| row.contains(name));
                    run_pass(row, &order, registry, now)
                })
                .collect()
        };

        match &self.thread_pool {
            Some(pool) => pool.install(compute),
            None => compute(),
        }
    }
}

/// Work out what a change to `seeds` recomputes and load the fields it reads
///
/// A calculated column the store has no value for (one defined after the row
/// was last computed) joins the pass instead of being read as missing.
fn plan_row<S>(
    registry: &ColumnRegistry,
    store: &S,
    row_id: RowId,
    seeds: &[String],
) -> (Vec<String>, RowContext)
where
    S: RowStore + ?Sized,
{
    let order = registry.resolve_evaluation_order(seeds.iter().map(String::as_str));
    let order = complete_order(registry, seeds, &order, |name| {
        store.field_value(row_id, name).is_some()
    })
    .into_owned();
    let in_pass: AHashSet<&str> = order.iter().map(String::as_str).collect();

    let mut row = RowContext::new();
    for name in &order {
        if let Some(previous) = store.field_value(row_id, name) {
            row.set(name.as_str(), previous);
        }
        for precedent in registry.precedents_of(name) {
            if in_pass.contains(precedent) || row.contains(precedent) {
                continue;
            }
            if let Some(value) = store.field_value(row_id, precedent) {
                row.set(precedent, value);
            }
        }
    }

    (order, row)
}
