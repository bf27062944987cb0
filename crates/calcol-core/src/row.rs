//! Row context

use crate::value::Value;
use ahash::AHashMap;

/// The current field values of one record, keyed by column name.
///
/// Owned by the caller. Evaluation only reads it; the recalculation pass works
/// on a copy and writes fresh calculated values into that copy as it goes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowContext {
    values: AHashMap<String, Value>,
}

impl RowContext {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<S: Into<String>, V: Into<Value>>(mut self, column: S, value: V) -> Self {
        self.set(column, value);
        self
    }

    /// Get the value of a column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Set the value of a column, returning the previous value
    pub fn set<S: Into<String>, V: Into<Value>>(&mut self, column: S, value: V) -> Option<Value> {
        self.values.insert(column.into(), value.into())
    }

    /// Remove a column's value
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Check whether the row holds a value for the column
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Iterate over all values (arbitrary order)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields with a value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for RowContext {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut row = RowContext::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

impl<S: Into<String>, V: Into<Value>> Extend<(S, V)> for RowContext {
    fn extend<I: IntoIterator<Item = (S, V)>>(&mut self, iter: I) {
        for (column, value) in iter {
            self.set(column, value);
        }
    }
}
