//! Date/time functions
//!
//! Instants are UTC. `NOW()` and `TODAY()` never read the system clock: they
//! return the instant captured once for the whole recalculation pass, so every
//! column computed together sees the same reading.

use crate::evaluator::EvalContext;
use calcol_core::{parse_datetime, CellError, EvalResult, Value};
use chrono::{DateTime, TimeZone, Utc};

/// Midnight UTC of the instant's day
fn start_of_day(dt: &DateTime<Utc>) -> EvalResult<DateTime<Utc>> {
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .ok_or_else(|| CellError::value_error("date out of range"))
}

/// NOW()
pub fn fn_now(_args: &[Value], ctx: &EvalContext) -> EvalResult<Value> {
    Ok(Value::DateTime(ctx.now))
}

/// TODAY()
pub fn fn_today(_args: &[Value], ctx: &EvalContext) -> EvalResult<Value> {
    Ok(Value::DateTime(start_of_day(&ctx.now)?))
}

/// DATEDIFF(date1, date2, unit) - `date1 - date2` in whole units, truncated toward zero
pub fn fn_datediff(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let first = args[0].to_datetime()?;
    let second = args[1].to_datetime()?;
    let unit = args[2].to_text()?;

    let delta = first - second;
    let amount = match unit.trim().to_ascii_lowercase().as_str() {
        "days" => delta.num_days(),
        "hours" => delta.num_hours(),
        "minutes" => delta.num_minutes(),
        _ => {
            return Err(CellError::value_error(format!(
                "unknown DATEDIFF unit \"{}\" (use days, hours or minutes)",
                unit
            )))
        }
    };

    Ok(Value::Number(amount as f64))
}

/// DATEVALUE(text) - parse `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn fn_datevalue(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    match &args[0] {
        Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
        other => {
            let text = other.to_text()?;
            parse_datetime(&text)
                .map(Value::DateTime)
                .map_err(|e| CellError::value_error(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::functions::test_support::{call, fixed_now};
    use calcol_core::{parse_datetime, ErrorKind, Value};

    fn date(text: &str) -> Value {
        Value::DateTime(parse_datetime(text).unwrap())
    }

    #[test]
    fn test_now_and_today_use_captured_instant() {
        assert_eq!(call("NOW", &[]), Value::DateTime(fixed_now()));
        assert_eq!(call("TODAY", &[]), date("2024-05-01"));
    }

    #[test]
    fn test_datediff_units() {
        let due = date("2024-05-03T12:00:00Z");
        let start = date("2024-05-01T09:30:00Z");
        assert_eq!(
            call("DATEDIFF", &[due.clone(), start.clone(), Value::from("days")]),
            Value::Number(2.0)
        );
        assert_eq!(
            call("DATEDIFF", &[due.clone(), start.clone(), Value::from("HOURS")]),
            Value::Number(50.0)
        );
        assert_eq!(
            call("DATEDIFF", &[due.clone(), start.clone(), Value::from(" Minutes ")]),
            Value::Number(3030.0)
        );
        // Order matters: overdue work comes out negative
        assert_eq!(
            call("DATEDIFF", &[start, due, Value::from("days")]),
            Value::Number(-2.0)
        );
    }

    #[test]
    fn test_datediff_errors() {
        let d = date("2024-05-01");
        assert_eq!(
            call("DATEDIFF", &[d.clone(), d.clone(), Value::from("weeks")]).error_kind(),
            Some(ErrorKind::ValueError)
        );
        // No implicit text or number to date conversion
        assert_eq!(
            call("DATEDIFF", &[Value::from("2024-05-01"), d.clone(), Value::from("days")])
                .error_kind(),
            Some(ErrorKind::TypeMismatch)
        );
        assert_eq!(
            call("DATEDIFF", &[d.clone(), Value::Number(45000.0), Value::from("days")])
                .error_kind(),
            Some(ErrorKind::TypeMismatch)
        );
    }

    #[test]
    fn test_datevalue() {
        assert_eq!(call("DATEVALUE", &[Value::from("2024-06-30")]), date("2024-06-30"));
        assert_eq!(
            call("DATEVALUE", &[Value::from("2024-06-30T08:00:00+02:00")]),
            date("2024-06-30T06:00:00Z")
        );
        assert_eq!(
            call("DATEVALUE", &[Value::from("next friday")]).error_kind(),
            Some(ErrorKind::ValueError)
        );
    }
}
