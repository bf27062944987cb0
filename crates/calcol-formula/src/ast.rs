//! Formula Abstract Syntax Tree types

use crate::functions::function_registry;
use calcol_core::{format_number, DeclaredType, Value};
use chrono::SecondsFormat;
use std::fmt;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value (number, string, boolean, or date)
    Literal(Value),

    /// `field("Name")` reference to another column of the same row
    FieldRef(String),

    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },

    /// Function call; the name is stored upper-case
    Call { name: String, args: Vec<Expr> },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 10] = [
        BinaryOperator::Add,
        BinaryOperator::Subtract,
        BinaryOperator::Multiply,
        BinaryOperator::Divide,
        BinaryOperator::Equal,
        BinaryOperator::NotEqual,
        BinaryOperator::LessThan,
        BinaryOperator::LessEqual,
        BinaryOperator::GreaterThan,
        BinaryOperator::GreaterEqual,
    ];

    /// Operator as written in formula text
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 1
    }

    /// Binding strength, higher binds tighter
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 1,
            BinaryOperator::Add | BinaryOperator::Subtract => 2,
            BinaryOperator::Multiply | BinaryOperator::Divide => 3,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Expr {
    /// Numeric literal
    pub fn number(n: f64) -> Self {
        Expr::Literal(Value::Number(n))
    }

    /// String literal
    pub fn string<S: Into<String>>(s: S) -> Self {
        Expr::Literal(Value::Text(s.into()))
    }

    /// Column reference
    pub fn field<S: Into<String>>(name: S) -> Self {
        Expr::FieldRef(name.into())
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(operand: Expr) -> Self {
        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(operand),
        }
    }

    /// Column names referenced by `field()`, in order of first appearance
    pub fn references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::FieldRef(name) => {
                if !refs.contains(&name.as_str()) {
                    refs.push(name);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            Expr::UnaryOp { operand, .. } => operand.collect_references(refs),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
        }
    }

    /// Whether the formula reads the clock (`NOW()`, `TODAY()`)
    pub fn is_volatile(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::FieldRef(_) => false,
            Expr::BinaryOp { left, right, .. } => left.is_volatile() || right.is_volatile(),
            Expr::UnaryOp { operand, .. } => operand.is_volatile(),
            Expr::Call { name, args } => {
                function_registry()
                    .get(name)
                    .map_or(false, |def| def.volatile)
                    || args.iter().any(Expr::is_volatile)
            }
        }
    }

    /// Best guess at the result type, used to preselect a column's display type
    pub fn type_hint(&self) -> DeclaredType {
        match self {
            Expr::Literal(Value::Text(_)) => DeclaredType::String,
            Expr::Literal(Value::Bool(_)) => DeclaredType::Boolean,
            Expr::Literal(Value::DateTime(_)) => DeclaredType::Date,
            Expr::Literal(_) | Expr::FieldRef(_) | Expr::UnaryOp { .. } => DeclaredType::Number,
            Expr::BinaryOp { op, .. } if op.is_comparison() => DeclaredType::Boolean,
            Expr::BinaryOp { .. } => DeclaredType::Number,
            Expr::Call { name, args } => match function_registry().get(name) {
                Some(def) => match def.returns {
                    Some(ty) => ty,
                    // Result follows the value-producing argument (IF's branches)
                    None => args
                        .get(1)
                        .map_or(DeclaredType::Number, Expr::type_hint),
                },
                None => DeclaredType::Number,
            },
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::BinaryOp { op, .. } => op.precedence(),
            Expr::UnaryOp { .. } => 4,
            _ => 5,
        }
    }
}

/// Write a string literal with quotes and backslash escapes
pub(crate) fn write_quoted(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        if c == '"' || c == '\\' {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    f.write_char('"')
}

/// Write a literal the way the lexer reads it back
pub(crate) fn write_literal(f: &mut impl fmt::Write, value: &Value) -> fmt::Result {
    match value {
        Value::Number(n) => f.write_str(&format_number(*n)),
        Value::Text(s) => write_quoted(f, s),
        Value::Bool(b) => write!(f, "{}", b),
        // Sub-second digits only when present, so the literal reads back exactly
        Value::DateTime(dt) => {
            write!(f, "#{}#", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        // The parser never produces error literals; render them as text
        Value::Error(e) => write_quoted(f, &e.to_string()),
    }
}

/// Canonical formula text; parsing it yields an equal AST
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write_literal(f, value),
            Expr::FieldRef(name) => {
                f.write_str("field(")?;
                write_quoted(f, name)?;
                f.write_str(")")
            }
            Expr::BinaryOp { op, left, right } => {
                let prec = op.precedence();
                if left.precedence() < prec {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, " {} ", op)?;
                // Left-associative: an equal-precedence right child needs parentheses
                if right.precedence() <= prec {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
            Expr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => match operand.as_ref() {
                // "-5" would lex as a signed literal
                Expr::Literal(Value::Number(_)) | Expr::BinaryOp { .. } => {
                    write!(f, "-({})", operand)
                }
                _ => write!(f, "-{}", operand),
            },
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_references_in_order_without_duplicates() {
        let ast =
            parse_formula(r#"IF(field("B") > 0, field("A") / field("B"), field("C"))"#).unwrap();
        assert_eq!(ast.references(), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_is_volatile() {
        assert!(parse_formula(r#"DATEDIFF(field("Due"), TODAY(), "days")"#)
            .unwrap()
            .is_volatile());
        assert!(!parse_formula(r#"field("Budget") - field("Spent")"#)
            .unwrap()
            .is_volatile());
    }

    #[test]
    fn test_type_hint() {
        let hint = |text: &str| parse_formula(text).unwrap().type_hint();
        assert_eq!(hint(r#"field("Budget") - field("Spent")"#), DeclaredType::Number);
        assert_eq!(hint(r#"field("Progress") >= 100"#), DeclaredType::Boolean);
        assert_eq!(hint(r#"CONCAT("a", 1)"#), DeclaredType::String);
        assert_eq!(hint("TODAY()"), DeclaredType::Date);
        assert_eq!(
            hint(r#"IF(field("Progress") >= 100, "Done", "In progress")"#),
            DeclaredType::String
        );
    }

    #[test]
    fn test_display_is_canonical() {
        let cases = [
            ("1+2*3", "1 + 2 * 3"),
            ("(1+2)*3", "(1 + 2) * 3"),
            ("1-(2-3)", "1 - (2 - 3)"),
            ("(1-2)-3", "1 - 2 - 3"),
            (r#"field("a\"b")"#, r#"field("a\"b")"#),
            ("-(5)", "-(5)"),
            ("-5", "-5"),
            ("round(1.50, 1)", "ROUND(1.5, 1)"),
            ("#2024-05-01#", "#2024-05-01T00:00:00Z#"),
            ("#2024-05-01T09:30:00.5Z#", "#2024-05-01T09:30:00.500Z#"),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_formula(input).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn test_display_reparses_to_equal_ast() {
        let formulas = [
            r#"IF(field("Progress") >= 100, "Done", "In progress")"#,
            r#"ROUND(field("Spent") / field("Budget") * 100, 1)"#,
            r#"-field("x") * -(2 + 3) = -(-4)"#,
            r#"(1 < 2) = (3 > 4)"#,
            r#"CONCAT("C:\\dir", field("Name"), TRUE)"#,
        ];
        for text in formulas {
            let ast = parse_formula(text).unwrap();
            let reparsed = parse_formula(&ast.to_string()).unwrap();
            assert_eq!(reparsed, ast, "round trip of {}", text);
        }
    }

    mod round_trip {
        use super::*;
        use proptest::prelude::*;

        fn leaf() -> impl Strategy<Value = Expr> {
            prop_oneof![
                (-1.0e6f64..1.0e6f64).prop_map(Expr::number),
                "[a-zA-Z \\\\\"#]{0,8}".prop_map(Expr::string),
                any::<bool>().prop_map(|b| Expr::Literal(Value::Bool(b))),
                (0i64..4_000_000_000i64, 0u32..1_000_000_000u32).prop_map(|(secs, nanos)| {
                    Expr::Literal(Value::DateTime(
                        chrono::DateTime::from_timestamp(secs, nanos).unwrap(),
                    ))
                }),
                "[A-Za-z][A-Za-z ]{0,8}".prop_map(Expr::field),
                Just(Expr::Call {
                    name: "NOW".to_string(),
                    args: vec![],
                }),
            ]
        }

        fn expr() -> impl Strategy<Value = Expr> {
            leaf().prop_recursive(4, 32, 3, |inner| {
                prop_oneof![
                    (
                        proptest::sample::select(BinaryOperator::ALL.to_vec()),
                        inner.clone(),
                        inner.clone()
                    )
                        .prop_map(|(op, l, r)| Expr::binary(op, l, r)),
                    inner.clone().prop_map(Expr::negate),
                    proptest::collection::vec(inner.clone(), 1..4).prop_map(|args| Expr::Call {
                        name: "SUM".to_string(),
                        args,
                    }),
                    (inner.clone(), inner.clone(), inner).prop_map(|(c, a, b)| Expr::Call {
                        name: "IF".to_string(),
                        args: vec![c, a, b],
                    }),
                ]
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn display_reparses_to_equal_ast(ast in expr()) {
                let text = ast.to_string();
                let reparsed = parse_formula(&text).unwrap();
                prop_assert_eq!(&reparsed, &ast, "text: {}", text);

                // Same text, same tree
                prop_assert_eq!(parse_formula(&text).unwrap(), reparsed);
            }
        }
    }
}
