//! String functions

use crate::evaluator::EvalContext;
use calcol_core::{EvalResult, Value};

/// CONCAT(value, ...)
pub fn fn_concat(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let mut result = String::new();
    for arg in args {
        result.push_str(&arg.to_text()?);
    }
    Ok(Value::Text(result))
}

/// UPPER(text)
pub fn fn_upper(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    Ok(Value::Text(args[0].to_text()?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    Ok(Value::Text(args[0].to_text()?.to_lowercase()))
}

/// LEN(text) - number of characters
pub fn fn_len(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    Ok(Value::Number(args[0].to_text()?.chars().count() as f64))
}

#[cfg(test)]
mod tests {
    use crate::functions::test_support::call;
    use calcol_core::{parse_datetime, ErrorKind, Value};

    #[test]
    fn test_concat_stringifies_canonically() {
        let args = [
            Value::from("Budget: "),
            Value::Number(1000.0),
            Value::from(" / "),
            Value::Number(0.25),
            Value::from(" "),
            Value::Bool(false),
        ];
        assert_eq!(call("CONCAT", &args), Value::from("Budget: 1000 / 0.25 false"));
    }

    #[test]
    fn test_concat_dates_as_iso() {
        let due = Value::DateTime(parse_datetime("2024-06-30").unwrap());
        assert_eq!(
            call("CONCAT", &[Value::from("due "), due]),
            Value::from("due 2024-06-30T00:00:00Z")
        );
    }

    #[test]
    fn test_concat_propagates_errors() {
        let args = [Value::from("x"), Value::error(ErrorKind::TypeMismatch, "bad")];
        assert_eq!(call("CONCAT", &args).error_kind(), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn test_case_functions() {
        assert_eq!(call("UPPER", &[Value::from("Straße")]), Value::from("STRASSE"));
        assert_eq!(call("LOWER", &[Value::from("MiXeD")]), Value::from("mixed"));
        assert_eq!(call("UPPER", &[Value::Bool(true)]), Value::from("TRUE"));
    }

    #[test]
    fn test_len_counts_characters() {
        assert_eq!(call("LEN", &[Value::from("héllo")]), Value::Number(5.0));
        assert_eq!(call("LEN", &[Value::Number(12.5)]), Value::Number(4.0));
    }
}
