//! JSON workspace files
//!
//! ```json
//! {
//!   "columns": [
//!     { "name": "Budget", "kind": "static" },
//!     { "name": "Remaining", "kind": "calculated",
//!       "formula": "field(\"Budget\") - field(\"Spent\")" }
//!   ],
//!   "rows": [
//!     { "Budget": 1000, "Spent": 400, "Due": { "date": "2024-06-30" } }
//!   ]
//! }
//! ```
//!
//! Field values are JSON numbers, strings and booleans; instants are written
//! as `{ "date": "<YYYY-MM-DD or RFC 3339>" }`. `null` means the field has no
//! value.

use anyhow::{bail, Context, Result};
use calcol::{
    format_datetime, parse_datetime, ColumnKind, ColumnRegistry, DeclaredType, RegistryError,
    RowContext, Value,
};
use serde::Deserialize;
use serde_json::{json, Map, Value as Json};
use std::path::Path;

/// One column as written in the workspace file
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnEntry {
    pub name: String,
    pub kind: ColumnKind,
    #[serde(default)]
    pub formula: Option<String>,
    /// Overrides the type inferred from the formula
    #[serde(default, rename = "type")]
    pub declared_type: Option<DeclaredType>,
}

/// A workspace file: column definitions plus sample rows
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub columns: Vec<ColumnEntry>,
    #[serde(default)]
    pub rows: Vec<Map<String, Json>>,
}

impl Workspace {
    /// Load a workspace file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse workspace '{}'", path.display()))
    }

    /// Register every column in file order, collecting failures
    pub fn register(&self) -> (ColumnRegistry, Vec<(String, RegistryError)>) {
        let mut registry = ColumnRegistry::new();
        let mut failures = Vec::new();

        for column in &self.columns {
            let result = registry
                .define_column(&column.name, column.kind, column.formula.as_deref())
                .and_then(|()| match column.declared_type {
                    Some(ty) => registry.set_declared_type(&column.name, ty),
                    None => Ok(()),
                });
            if let Err(e) = result {
                failures.push((column.name.clone(), e));
            }
        }

        (registry, failures)
    }

    /// Rows converted to row contexts
    pub fn row_contexts(&self) -> Result<Vec<RowContext>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| row_from_json(row).with_context(|| format!("Invalid row {}", i)))
            .collect()
    }
}

/// Convert a JSON object into a row context
pub fn row_from_json(object: &Map<String, Json>) -> Result<RowContext> {
    let mut row = RowContext::new();
    for (column, value) in object {
        if let Some(value) = value_from_json(value)
            .with_context(|| format!("Invalid value for field '{}'", column))?
        {
            row.set(column.as_str(), value);
        }
    }
    Ok(row)
}

/// Convert a JSON value into a field value; `null` is no value
pub fn value_from_json(json: &Json) -> Result<Option<Value>> {
    let value = match json {
        Json::Null => return Ok(None),
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_f64() {
            Some(n) => Value::Number(n),
            None => bail!("number {} does not fit in a double", n),
        },
        Json::String(s) => Value::Text(s.clone()),
        Json::Object(object) => match object.get("date").and_then(Json::as_str) {
            Some(text) if object.len() == 1 => Value::DateTime(parse_datetime(text)?),
            _ => bail!("objects must look like {{\"date\": \"2024-06-30\"}}"),
        },
        Json::Array(_) => bail!("arrays are not field values"),
    };
    Ok(Some(value))
}

/// Convert a field value into JSON
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Number(n) => json!(n),
        Value::Text(s) => json!(s),
        Value::Bool(b) => json!(b),
        Value::DateTime(dt) => json!({ "date": format_datetime(dt) }),
        Value::Error(e) => json!({ "error": e.kind.as_str(), "message": e.message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcol::ErrorKind;
    use pretty_assertions::assert_eq;

    fn workspace(text: &str) -> Workspace {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(value_from_json(&json!(2.5)).unwrap(), Some(Value::Number(2.5)));
        assert_eq!(value_from_json(&json!("x")).unwrap(), Some(Value::from("x")));
        assert_eq!(value_from_json(&json!(true)).unwrap(), Some(Value::Bool(true)));
        assert_eq!(value_from_json(&Json::Null).unwrap(), None);
        assert_eq!(
            value_from_json(&json!({ "date": "2024-06-30" })).unwrap(),
            Some(Value::DateTime(parse_datetime("2024-06-30").unwrap()))
        );
        assert!(value_from_json(&json!([1, 2])).is_err());
        assert!(value_from_json(&json!({ "date": "soon" })).is_err());
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(value_to_json(&Value::Number(400.0)), json!(400.0));
        assert_eq!(
            value_to_json(&Value::DateTime(parse_datetime("2024-06-30").unwrap())),
            json!({ "date": "2024-06-30T00:00:00Z" })
        );
        assert_eq!(
            value_to_json(&Value::error(ErrorKind::ValueError, "division by zero")),
            json!({ "error": "#VALUE!", "message": "division by zero" })
        );
    }

    #[test]
    fn test_register_collects_failures() {
        let ws = workspace(
            r#"{
                "columns": [
                    { "name": "A", "kind": "calculated", "formula": "field(\"B\") + 1" },
                    { "name": "B", "kind": "calculated", "formula": "field(\"A\") + 1" },
                    { "name": "C", "kind": "calculated", "formula": "1 +" },
                    { "name": "D", "kind": "calculated", "formula": "1", "type": "string" }
                ]
            }"#,
        );
        let (registry, failures) = ws.register();

        let failed: Vec<_> = failures.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(failed, vec!["B", "C"]);
        assert!(matches!(failures[0].1, RegistryError::CyclicDependency(_)));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.column("D").unwrap().declared_type(),
            DeclaredType::String
        );
    }

    #[test]
    fn test_row_contexts() {
        let ws = workspace(
            r#"{ "rows": [ { "Budget": 1000, "Spent": null, "Due": { "date": "2024-06-30" } } ] }"#,
        );
        let rows = ws.row_contexts().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Budget"), Some(&Value::Number(1000.0)));
        assert!(!rows[0].contains("Spent"));
        assert!(rows[0].get("Due").is_some());
    }
}
