//! Formula value types
//!
//! [`Value`] is what a formula produces and what a row supplies for each
//! field. Errors are ordinary values: they flow through operators and
//! functions and end up displayed in place of the cell's value.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use std::fmt;

/// Result of a coercion or function step; the error becomes a [`Value::Error`].
pub type EvalResult<T> = std::result::Result<T, CellError>;

/// A formula value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", content = "value", rename_all = "lowercase")
)]
pub enum Value {
    /// Numeric value
    Number(f64),

    /// Text value
    Text(String),

    /// Boolean value
    Bool(bool),

    /// An instant in UTC
    DateTime(DateTime<Utc>),

    /// Evaluation error, displayed in place of a value
    Error(CellError),
}

impl Value {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    /// Create a new error value
    pub fn error<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Value::Error(CellError::new(kind, message))
    }

    /// Check if the value is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Get the error if this is one
    pub fn as_error(&self) -> Option<&CellError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Get the error kind if this is an error
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.as_error().map(|e| e.kind)
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
            Value::DateTime(_) => "date",
            Value::Error(_) => "error",
        }
    }

    /// Coerce to a number.
    ///
    /// Text must hold a finite decimal number; booleans map to 1 and 0;
    /// instants never coerce.
    pub fn to_number(&self) -> EvalResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(CellError::type_mismatch(format!(
                    "\"{}\" is not a number",
                    s
                ))),
            },
            Value::DateTime(_) => Err(CellError::type_mismatch(
                "a date cannot be used as a number",
            )),
            Value::Error(e) => Err(e.clone()),
        }
    }

    /// Coerce to a boolean.
    pub fn to_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(CellError::type_mismatch(format!(
                        "\"{}\" is not true or false",
                        s
                    )))
                }
            }
            Value::DateTime(_) => Err(CellError::type_mismatch(
                "a date cannot be used as true or false",
            )),
            Value::Error(e) => Err(e.clone()),
        }
    }

    /// Canonical stringification, used by the string functions.
    pub fn to_text(&self) -> EvalResult<String> {
        match self {
            Value::Text(s) => Ok(s.clone()),
            Value::Number(n) => Ok(format_number(*n)),
            Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
            Value::DateTime(dt) => Ok(format_datetime(dt)),
            Value::Error(e) => Err(e.clone()),
        }
    }

    /// Require an instant; there is no implicit conversion from numbers or text.
    pub fn to_datetime(&self) -> EvalResult<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Ok(*dt),
            Value::Error(e) => Err(e.clone()),
            other => Err(CellError::type_mismatch(format!(
                "expected a date, got {}",
                other.type_name()
            ))),
        }
    }

    /// Whether a freshly computed value leaves a previously stored one as is.
    ///
    /// Equality is structural except that an error never matches anything,
    /// so a re-raised error is always reported again.
    pub fn unchanged_from(&self, previous: &Value) -> bool {
        !self.is_error() && !previous.is_error() && self == previous
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "{}", format_datetime(dt)),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<CellError> for Value {
    fn from(e: CellError) -> Self {
        Value::Error(e)
    }
}

/// Classes of evaluation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// #TYPE! - An operand or argument has a type that cannot be coerced
    TypeMismatch,
    /// #VALUE! - The types fit but the value is out of domain (division by zero, bad unit)
    ValueError,
    /// #ORDER! - A calculated column was read before it was computed in this pass
    InternalOrder,
}

impl ErrorKind {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TypeMismatch => "#TYPE!",
            ErrorKind::ValueError => "#VALUE!",
            ErrorKind::InternalOrder => "#ORDER!",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An evaluation error with a human-readable explanation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CellError {
    /// Create a new error
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_mismatch<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn value_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ValueError, message)
    }

    pub fn internal_order<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::InternalOrder, message)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.message)
    }
}

/// Format a number without trailing zeros
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        // Also folds -0 into "0"
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Format an instant as ISO-8601 with second precision (`2024-05-01T09:30:00Z`)
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| Error::InvalidDate(text.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidDate(text.to_string()))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(42), Value::Number(42.0));
        assert_eq!(Value::from(3.5), Value::Number(3.5));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from("hello"), Value::Text("hello".into()));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::Number(42.0).to_number(), Ok(42.0));
        assert_eq!(Value::Bool(true).to_number(), Ok(1.0));
        assert_eq!(Value::Bool(false).to_number(), Ok(0.0));
        assert_eq!(Value::text(" 12.5 ").to_number(), Ok(12.5));

        let err = Value::text("n/a").to_number().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);

        // Rust's float parser accepts these, a formula must not
        assert!(Value::text("inf").to_number().is_err());
        assert!(Value::text("NaN").to_number().is_err());
        assert!(Value::text("").to_number().is_err());

        let date = parse_datetime("2024-05-01").unwrap();
        assert_eq!(
            Value::DateTime(date).to_number().unwrap_err().kind,
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_to_bool() {
        assert_eq!(Value::Number(0.0).to_bool(), Ok(false));
        assert_eq!(Value::Number(-2.0).to_bool(), Ok(true));
        assert_eq!(Value::text("TRUE").to_bool(), Ok(true));
        assert_eq!(Value::text("false").to_bool(), Ok(false));
        assert_eq!(
            Value::text("yes").to_bool().unwrap_err().kind,
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_to_text_is_canonical() {
        assert_eq!(Value::Number(400.0).to_text().unwrap(), "400");
        assert_eq!(Value::Number(2.50).to_text().unwrap(), "2.5");
        assert_eq!(Value::Number(-0.0).to_text().unwrap(), "0");
        assert_eq!(Value::Bool(true).to_text().unwrap(), "true");

        let dt = parse_datetime("2024-05-01T09:30:00+02:00").unwrap();
        assert_eq!(Value::DateTime(dt).to_text().unwrap(), "2024-05-01T07:30:00Z");
    }

    #[test]
    fn test_errors_propagate_through_coercion() {
        let err = CellError::value_error("division by zero");
        let value = Value::Error(err.clone());
        assert_eq!(value.to_number(), Err(err.clone()));
        assert_eq!(value.to_bool(), Err(err.clone()));
        assert_eq!(value.to_text(), Err(err.clone()));
        assert_eq!(value.to_datetime(), Err(err));
    }

    #[test]
    fn test_unchanged_from() {
        assert!(Value::Number(1.0).unchanged_from(&Value::Number(1.0)));
        assert!(!Value::Number(1.0).unchanged_from(&Value::Number(2.0)));
        assert!(!Value::Number(1.0).unchanged_from(&Value::text("1")));

        let err = Value::error(ErrorKind::TypeMismatch, "same message");
        assert!(!err.unchanged_from(&err.clone()));
    }

    #[test]
    fn test_error_display() {
        let err = CellError::type_mismatch("\"n/a\" is not a number");
        assert_eq!(err.to_string(), "#TYPE! \"n/a\" is not a number");
        assert_eq!(ErrorKind::InternalOrder.to_string(), "#ORDER!");
    }

    #[test]
    fn test_parse_datetime() {
        let dt = parse_datetime("2024-02-29").unwrap();
        assert_eq!(format_datetime(&dt), "2024-02-29T00:00:00Z");

        assert_eq!(
            parse_datetime("2023-02-29"),
            Err(Error::InvalidDate("2023-02-29".into()))
        );
        assert!(parse_datetime("yesterday").is_err());
    }
}
