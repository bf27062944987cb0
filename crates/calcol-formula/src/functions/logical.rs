//! Logical functions

use super::bools;
use crate::evaluator::EvalContext;
use calcol_core::{EvalResult, Value};

/// IF(cond, value_if_true, value_if_false)
///
/// Only the condition and the chosen branch matter: an error in the branch
/// that is not taken does not reach the result.
pub fn fn_if(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let condition = args[0].to_bool()?;
    let chosen = if condition { &args[1] } else { &args[2] };
    Ok(chosen.clone())
}

/// AND(value, ...)
///
/// Every argument is coerced, so a non-boolean argument is an error even
/// when an earlier one is already false.
pub fn fn_and(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let values = bools(args)?;
    Ok(Value::Bool(values.into_iter().all(|b| b)))
}

/// OR(value, ...)
pub fn fn_or(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    let values = bools(args)?;
    Ok(Value::Bool(values.into_iter().any(|b| b)))
}

/// NOT(value)
pub fn fn_not(args: &[Value], _ctx: &EvalContext) -> EvalResult<Value> {
    Ok(Value::Bool(!args[0].to_bool()?))
}

#[cfg(test)]
mod tests {
    use crate::functions::test_support::call;
    use calcol_core::{ErrorKind, Value};

    fn err(kind: ErrorKind) -> Value {
        Value::error(kind, "upstream")
    }

    #[test]
    fn test_if_picks_branch() {
        let args = [Value::Bool(true), Value::from("Done"), Value::from("In progress")];
        assert_eq!(call("IF", &args), Value::from("Done"));

        let args = [Value::Number(0.0), Value::from("Done"), Value::from("In progress")];
        assert_eq!(call("IF", &args), Value::from("In progress"));
    }

    #[test]
    fn test_if_condition_errors() {
        let args = [Value::from("maybe"), Value::Number(1.0), Value::Number(2.0)];
        assert_eq!(call("IF", &args).error_kind(), Some(ErrorKind::TypeMismatch));

        let upstream = err(ErrorKind::ValueError);
        let args = [upstream.clone(), Value::Number(1.0), Value::Number(2.0)];
        assert_eq!(call("IF", &args), upstream);
    }

    #[test]
    fn test_if_ignores_error_in_branch_not_taken() {
        let args = [Value::Bool(false), err(ErrorKind::ValueError), Value::Number(0.0)];
        assert_eq!(call("IF", &args), Value::Number(0.0));

        let args = [Value::Bool(true), err(ErrorKind::ValueError), Value::Number(0.0)];
        assert_eq!(call("IF", &args).error_kind(), Some(ErrorKind::ValueError));
    }

    #[test]
    fn test_and_or_truth_tables() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(call("AND", &[t.clone(), t.clone()]), t);
        assert_eq!(call("AND", &[t.clone(), f.clone()]), f);
        assert_eq!(call("OR", &[f.clone(), t.clone()]), t);
        assert_eq!(call("OR", &[f.clone(), f.clone()]), f);
        assert_eq!(call("AND", &[Value::Number(1.0), Value::from("TRUE")]), t);
        assert_eq!(call("NOT", &[t.clone()]), f);
    }

    #[test]
    fn test_and_or_check_every_argument() {
        let args = [Value::Bool(false), Value::from("nope")];
        assert_eq!(call("AND", &args).error_kind(), Some(ErrorKind::TypeMismatch));

        let args = [Value::Bool(true), err(ErrorKind::ValueError)];
        assert_eq!(call("OR", &args).error_kind(), Some(ErrorKind::ValueError));
    }
}
