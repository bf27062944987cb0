//! Math functions

use super::numbers;
use crate::evaluator::EvalContext;
use calcol_core::{CellError, EvalResult, Value};

/// SUM(number, ...)
pub fn fn_sum(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    Ok(Value::Number(numbers(args)?.into_iter().sum()))
}

/// AVG(number, ...)
pub fn fn_avg(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let values = numbers(args)?;
    let total: f64 = values.iter().sum();
    Ok(Value::Number(total / values.len() as f64))
}

/// MIN(number, ...)
pub fn fn_min(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let values = numbers(args)?;
    Ok(Value::Number(values.into_iter().fold(f64::INFINITY, f64::min)))
}

/// MAX(number, ...)
pub fn fn_max(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let values = numbers(args)?;
    Ok(Value::Number(
        values.into_iter().fold(f64::NEG_INFINITY, f64::max),
    ))
}

/// ROUND(number, [decimals])
///
/// Rounds half away from zero. Decimals are truncated to an integer and must
/// not be negative.
pub fn fn_round(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let number = args[0].to_number()?;
    let decimals = match args.get(1) {
        Some(v) => v.to_number()?.trunc(),
        None => 0.0,
    };

    if decimals < 0.0 {
        return Err(CellError::value_error(
            "ROUND decimals cannot be negative",
        ));
    }

    // Past 15 places an f64 has nothing left to round
    if decimals > 15.0 {
        return Ok(Value::Number(number));
    }

    let multiplier = 10_f64.powi(decimals as i32);
    Ok(Value::Number((number * multiplier).round() / multiplier))
}

/// ABS(number)
pub fn fn_abs(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    Ok(Value::Number(args[0].to_number()?.abs()))
}

#[cfg(test)]
mod tests {
    use crate::functions::test_support::call;
    use calcol_core::{parse_datetime, ErrorKind, Value};

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn test_aggregates() {
        let args = [n(5.0), n(2.0), n(8.0), n(1.0)];
        assert_eq!(call("SUM", &args), n(16.0));
        assert_eq!(call("AVG", &args), n(4.0));
        assert_eq!(call("MIN", &args), n(1.0));
        assert_eq!(call("MAX", &args), n(8.0));
    }

    #[test]
    fn test_aggregates_coerce_arguments() {
        let args = [n(1.0), Value::from("2"), Value::Bool(true)];
        assert_eq!(call("SUM", &args), n(4.0));
    }

    #[test]
    fn test_aggregates_reject_non_numbers() {
        let args = [n(1.0), Value::from("n/a")];
        assert_eq!(call("SUM", &args).error_kind(), Some(ErrorKind::TypeMismatch));

        let date = Value::DateTime(parse_datetime("2024-01-01").unwrap());
        assert_eq!(call("MAX", &[n(1.0), date]).error_kind(), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn test_aggregates_propagate_first_error() {
        let first = Value::error(ErrorKind::ValueError, "first");
        let second = Value::error(ErrorKind::TypeMismatch, "second");
        assert_eq!(call("AVG", &[n(1.0), first.clone(), second]), first);
    }

    #[test]
    fn test_round() {
        assert_eq!(call("ROUND", &[n(2.5)]), n(3.0));
        assert_eq!(call("ROUND", &[n(-2.5)]), n(-3.0));
        assert_eq!(call("ROUND", &[n(66.666), n(1.0)]), n(66.7));
        assert_eq!(call("ROUND", &[n(1.005), n(2.9)]), n(1.0));
        assert_eq!(call("ROUND", &[n(0.123456), Value::from("3")]), n(0.123));
    }

    #[test]
    fn test_round_negative_decimals() {
        assert_eq!(
            call("ROUND", &[n(1234.0), n(-1.0)]).error_kind(),
            Some(ErrorKind::ValueError)
        );
    }

    #[test]
    fn test_abs() {
        assert_eq!(call("ABS", &[n(-4.5)]), n(4.5));
    }
}
