//! Column registry
//!
//! Holds every column definition together with the parsed formulas and the
//! dependency graph derived from them. Every mutation is validated against a
//! candidate graph first and committed only when it succeeds, so a rejected
//! change leaves the registry exactly as it was.

use ahash::{AHashMap, AHashSet};
use calcol_core::{ColumnKind, DeclaredType};
use calcol_formula::{parse_formula, ColumnLookup, DependencyGraph, Expr, FormulaError};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from registry mutations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("Invalid formula for column '{column}': {source}")]
    InvalidFormula {
        column: String,
        #[source]
        source: FormulaError,
    },

    /// The path starts and ends with the same column
    #[error("Circular reference: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Column '{column}' is used by {}", .dependents.join(", "))]
    ColumnInUse {
        column: String,
        dependents: Vec<String>,
    },

    #[error("Column name cannot be empty")]
    EmptyName,

    #[error("Calculated column '{0}' needs a formula")]
    MissingFormula(String),

    #[error("Static column '{0}' cannot have a formula")]
    UnexpectedFormula(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

/// A column known to the registry
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    name: String,
    kind: ColumnKind,
    formula_text: Option<String>,
    parsed: Option<Expr>,
    declared_type: DeclaredType,
    volatile: bool,
    sequence: u64,
}

impl ColumnDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn is_calculated(&self) -> bool {
        self.kind.is_calculated()
    }

    /// Formula text as authored; this is what gets persisted
    pub fn formula_text(&self) -> Option<&str> {
        self.formula_text.as_deref()
    }

    /// Parsed formula
    pub fn formula(&self) -> Option<&Expr> {
        self.parsed.as_ref()
    }

    /// Display type hint
    pub fn declared_type(&self) -> DeclaredType {
        self.declared_type
    }

    /// Whether the formula reads the clock
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    /// Creation sequence; kept when the column is redefined
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Registry of column definitions and their dependency graph
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: AHashMap<String, ColumnDefinition>,
    graph: DependencyGraph,
    next_sequence: u64,
}

impl ColumnRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or redefine a column
    ///
    /// Calculated columns need formula text, static columns must not have any.
    /// References to columns that do not exist yet are allowed. A formula that
    /// would close a cycle is rejected with the cycle's path.
    pub fn define_column(
        &mut self,
        name: &str,
        kind: ColumnKind,
        formula_text: Option<&str>,
    ) -> Result<(), RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut candidate = self.graph.clone();
        let (parsed, formula_text) = match (kind, formula_text) {
            (ColumnKind::Calculated, None) => {
                return Err(RegistryError::MissingFormula(name.to_string()))
            }
            (ColumnKind::Static, Some(_)) => {
                return Err(RegistryError::UnexpectedFormula(name.to_string()))
            }
            (ColumnKind::Calculated, Some(text)) => {
                let ast = parse_formula(text).map_err(|source| {
                    warn!(column = name, error = %source, "rejected formula");
                    RegistryError::InvalidFormula {
                        column: name.to_string(),
                        source,
                    }
                })?;

                candidate.set_precedents(name, ast.references());
                if let Some(path) = candidate.find_cycle_from(name) {
                    warn!(column = name, cycle = ?path, "rejected circular formula");
                    return Err(RegistryError::CyclicDependency(path));
                }

                (Some(ast), Some(text.to_string()))
            }
            (ColumnKind::Static, None) => {
                candidate.clear_precedents(name);
                (None, None)
            }
        };

        let sequence = match self.columns.get(name) {
            Some(existing) => existing.sequence,
            None => {
                let seq = self.next_sequence;
                self.next_sequence += 1;
                seq
            }
        };

        let definition = ColumnDefinition {
            name: name.to_string(),
            kind,
            declared_type: parsed.as_ref().map_or(DeclaredType::default(), Expr::type_hint),
            volatile: parsed.as_ref().map_or(false, Expr::is_volatile),
            formula_text,
            parsed,
            sequence,
        };

        debug!(
            column = name,
            kind = ?kind,
            sequence,
            precedents = candidate.precedents(name).count(),
            "defined column"
        );

        self.graph = candidate;
        self.columns.insert(name.to_string(), definition);
        Ok(())
    }

    /// Define a static column
    pub fn define_static(&mut self, name: &str) -> Result<(), RegistryError> {
        self.define_column(name, ColumnKind::Static, None)
    }

    /// Define a calculated column
    pub fn define_calculated(&mut self, name: &str, formula: &str) -> Result<(), RegistryError> {
        self.define_column(name, ColumnKind::Calculated, Some(formula))
    }

    /// Delete a column nothing else references
    pub fn delete_column(&mut self, name: &str) -> Result<ColumnDefinition, RegistryError> {
        if !self.columns.contains_key(name) {
            return Err(RegistryError::UnknownColumn(name.to_string()));
        }

        let dependents: Vec<String> = self.graph.dependents(name).map(str::to_string).collect();
        if !dependents.is_empty() {
            warn!(column = name, dependents = ?dependents, "refused to delete referenced column");
            return Err(RegistryError::ColumnInUse {
                column: name.to_string(),
                dependents,
            });
        }

        self.graph.clear_precedents(name);
        let removed = self
            .columns
            .remove(name)
            .ok_or_else(|| RegistryError::UnknownColumn(name.to_string()))?;

        debug!(column = name, "deleted column");
        Ok(removed)
    }

    /// Override the display type hint of a column
    pub fn set_declared_type(
        &mut self,
        name: &str,
        declared_type: DeclaredType,
    ) -> Result<(), RegistryError> {
        let column = self
            .columns
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownColumn(name.to_string()))?;
        column.declared_type = declared_type;
        Ok(())
    }

    /// Calculated columns to re-evaluate after `changed` fields changed
    ///
    /// Includes every calculated column that reads a changed field directly or
    /// transitively, plus changed names that are calculated themselves. Each
    /// column comes after all of its precedents; otherwise older columns go
    /// first.
    pub fn resolve_evaluation_order<'a, I>(&self, changed: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut affected = self.graph.affected_by(changed);
        affected.retain(|name| self.is_calculated(name));
        self.order(&affected)
    }

    /// Every calculated column, in evaluation order
    pub fn full_evaluation_order(&self) -> Vec<String> {
        let all: AHashSet<String> = self
            .columns
            .values()
            .filter(|c| c.is_calculated())
            .map(|c| c.name.clone())
            .collect();
        self.order(&all)
    }

    fn order(&self, columns: &AHashSet<String>) -> Vec<String> {
        self.graph.topological_order(columns, |name| {
            self.columns.get(name).map_or(u64::MAX, |c| c.sequence)
        })
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.get(name)
    }

    /// Check if a column exists
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// All columns in creation order
    pub fn columns(&self) -> Vec<&ColumnDefinition> {
        let mut columns: Vec<_> = self.columns.values().collect();
        columns.sort_by_key(|c| c.sequence);
        columns
    }

    /// Names of calculated columns whose formula reads the clock
    pub fn volatile_columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns
            .values()
            .filter(|c| c.volatile)
            .map(|c| c.name.as_str())
    }

    /// Columns whose formula reads `name` directly
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.graph.dependents(name).collect()
    }

    /// Columns the formula of `name` reads directly
    pub fn precedents_of(&self, name: &str) -> Vec<&str> {
        self.graph.precedents(name).collect()
    }

    /// The dependency graph
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl ColumnLookup for ColumnRegistry {
    fn is_calculated(&self, name: &str) -> bool {
        self.columns
            .get(name)
            .map_or(false, ColumnDefinition::is_calculated)
    }
}
