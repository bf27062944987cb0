//! Column types

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// How a column gets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ColumnKind {
    /// Value supplied by the row store (budget, spent, progress)
    Static,
    /// Value derived from a formula
    Calculated,
}

impl ColumnKind {
    /// Check if this is a calculated column
    pub fn is_calculated(&self) -> bool {
        matches!(self, ColumnKind::Calculated)
    }
}

/// Result type shown to the user for a calculated column.
///
/// Only used for UI affordances (alignment, editors, icons); evaluation never
/// checks a result against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DeclaredType {
    #[default]
    Number,
    String,
    Boolean,
    Date,
}

impl DeclaredType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclaredType::Number => "number",
            DeclaredType::String => "string",
            DeclaredType::Boolean => "boolean",
            DeclaredType::Date => "date",
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeclaredType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "number" => Ok(DeclaredType::Number),
            "string" | "text" => Ok(DeclaredType::String),
            "boolean" | "bool" => Ok(DeclaredType::Boolean),
            "date" | "datetime" => Ok(DeclaredType::Date),
            _ => Err(Error::UnknownDeclaredType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_type_parse() {
        assert_eq!("Number".parse::<DeclaredType>(), Ok(DeclaredType::Number));
        assert_eq!("text".parse::<DeclaredType>(), Ok(DeclaredType::String));
        assert_eq!("bool".parse::<DeclaredType>(), Ok(DeclaredType::Boolean));
        assert_eq!(" date ".parse::<DeclaredType>(), Ok(DeclaredType::Date));
        assert_eq!(
            "money".parse::<DeclaredType>(),
            Err(Error::UnknownDeclaredType("money".into()))
        );
    }

    #[test]
    fn test_declared_type_display_roundtrips() {
        for ty in [
            DeclaredType::Number,
            DeclaredType::String,
            DeclaredType::Boolean,
            DeclaredType::Date,
        ] {
            assert_eq!(ty.to_string().parse::<DeclaredType>(), Ok(ty));
        }
    }
}
