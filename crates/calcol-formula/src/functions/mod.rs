//! Built-in formula functions

pub mod date;
pub mod logical;
pub mod math;
pub mod text;

use crate::evaluator::EvalContext;
use ahash::AHashMap;
use calcol_core::{DeclaredType, EvalResult, Value};
use once_cell::sync::Lazy;

/// Function implementation signature
///
/// Arguments arrive evaluated, left to right. An `Err` becomes the call's
/// [`Value::Error`] result.
pub type FunctionImpl = fn(&[Value], &EvalContext) -> EvalResult<Value>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Reads the clock
    pub volatile: bool,
    /// Return the first error argument without calling the implementation.
    /// Off for functions that only look at some of their arguments (IF).
    pub propagate_errors: bool,
    /// Result type, when it does not depend on the arguments
    pub returns: Option<DeclaredType>,
}

impl FunctionDef {
    /// Describe the accepted argument count if `count` is outside it
    pub fn arity_mismatch(&self, count: usize) -> Option<String> {
        let fits = count >= self.min_args && self.max_args.map_or(true, |max| count <= max);
        if fits {
            return None;
        }

        Some(match self.max_args {
            Some(max) if max == self.min_args => format!("exactly {}", max),
            Some(max) => format!("between {} and {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        })
    }
}

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// The built-in function table
pub fn function_registry() -> &'static FunctionRegistry {
    &FUNCTION_REGISTRY
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_logical_functions();
        registry.register_math_functions();
        registry.register_text_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_ascii_uppercase())
    }

    /// Names of all functions, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.values().map(|def| def.name).collect();
        names.sort_unstable();
        names
    }

    fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_ascii_uppercase(), def);
    }

    /// Register a function whose result type is fixed
    fn register_fixed(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        returns: DeclaredType,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
            propagate_errors: true,
            returns: Some(returns),
        });
    }

    fn register_logical_functions(&mut self) {
        // IF only propagates errors from the condition and the chosen branch
        self.register(FunctionDef {
            name: "IF",
            min_args: 3,
            max_args: Some(3),
            implementation: logical::fn_if,
            volatile: false,
            propagate_errors: false,
            returns: None,
        });

        self.register_fixed("AND", 1, None, DeclaredType::Boolean, logical::fn_and);
        self.register_fixed("OR", 1, None, DeclaredType::Boolean, logical::fn_or);
        self.register_fixed("NOT", 1, Some(1), DeclaredType::Boolean, logical::fn_not);
    }

    fn register_math_functions(&mut self) {
        self.register_fixed("SUM", 1, None, DeclaredType::Number, math::fn_sum);
        self.register_fixed("AVG", 1, None, DeclaredType::Number, math::fn_avg);
        self.register_fixed("MIN", 1, None, DeclaredType::Number, math::fn_min);
        self.register_fixed("MAX", 1, None, DeclaredType::Number, math::fn_max);
        self.register_fixed("ROUND", 1, Some(2), DeclaredType::Number, math::fn_round);
        self.register_fixed("ABS", 1, Some(1), DeclaredType::Number, math::fn_abs);
    }

    fn register_text_functions(&mut self) {
        self.register_fixed("CONCAT", 1, None, DeclaredType::String, text::fn_concat);
        self.register_fixed("UPPER", 1, Some(1), DeclaredType::String, text::fn_upper);
        self.register_fixed("LOWER", 1, Some(1), DeclaredType::String, text::fn_lower);
        self.register_fixed("LEN", 1, Some(1), DeclaredType::Number, text::fn_len);
    }

    fn register_date_functions(&mut self) {
        // NOW and TODAY read the pass's captured instant
        self.register(FunctionDef {
            name: "NOW",
            min_args: 0,
            max_args: Some(0),
            implementation: date::fn_now,
            volatile: true,
            propagate_errors: true,
            returns: Some(DeclaredType::Date),
        });

        self.register(FunctionDef {
            name: "TODAY",
            min_args: 0,
            max_args: Some(0),
            implementation: date::fn_today,
            volatile: true,
            propagate_errors: true,
            returns: Some(DeclaredType::Date),
        });

        self.register_fixed("DATEDIFF", 3, Some(3), DeclaredType::Number, date::fn_datediff);
        self.register_fixed("DATEVALUE", 1, Some(1), DeclaredType::Date, date::fn_datevalue);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Coerce every argument to a number
pub(crate) fn numbers(args: &[Value]) -> EvalResult<Vec<f64>> {
    args.iter().map(Value::to_number).collect()
}

/// Coerce every argument to a boolean
pub(crate) fn bools(args: &[Value]) -> EvalResult<Vec<bool>> {
    args.iter().map(Value::to_bool).collect()
}
