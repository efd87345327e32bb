//! Structured validation predicates.
//!
//! Every `Property` validator carries an `Expr` that must hold for a valid
//! value. Renderers translate the tree into target code; [`Expr::holds`] is
//! the reference semantics they have to reproduce. Keywords that only apply
//! to one JSON type hold trivially for values of any other type.

use crate::pattern::Pattern;
use crate::property::JsonType;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
}

impl CmpOp {
    #[must_use]
    pub fn compare<T: PartialOrd>(self, left: T, right: T) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
            Self::Le => left <= right,
            Self::Lt => left < right,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol: &str = match self {
            Self::Eq => "==",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Lt => "<",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    /// The value has one of the given types.
    TypeOf { types: Vec<JsonType> },
    /// String value matches the pattern.
    Matches { pattern: Pattern },
    /// Numeric value compared against a bound (`value <op> bound`).
    Number { cmp: CmpOp, bound: f64 },
    MultipleOf { divisor: f64 },
    /// String length in characters compared against a bound.
    Length { cmp: CmpOp, bound: u64 },
    ItemCount { cmp: CmpOp, bound: u64 },
    PropertyCount { cmp: CmpOp, bound: u64 },
    UniqueItems,
    InSet { values: Vec<Value> },
    Equals { value: Value },
    /// At least one alternative holds. Without alternatives nothing holds,
    /// which is how a `false` schema compiles.
    Any { exprs: Vec<Expr> },
}

impl Expr {
    #[must_use]
    pub fn holds(&self, value: &Value) -> bool {
        match self {
            Self::TypeOf { types } => types.iter().any(|ty| ty.accepts(value)),
            Self::Matches { pattern } => value.as_str().is_none_or(|s| pattern.is_match(s)),
            Self::Number { cmp, bound } => value.as_f64().is_none_or(|n| cmp.compare(n, *bound)),
            Self::MultipleOf { divisor } => value.as_f64().is_none_or(|n| is_multiple_of(n, *divisor)),
            Self::Length { cmp, bound } => value
                .as_str()
                .is_none_or(|s| cmp.compare(s.chars().count() as u64, *bound)),
            Self::ItemCount { cmp, bound } => value
                .as_array()
                .is_none_or(|items| cmp.compare(items.len() as u64, *bound)),
            Self::PropertyCount { cmp, bound } => value
                .as_object()
                .is_none_or(|object| cmp.compare(object.len() as u64, *bound)),
            Self::UniqueItems => value.as_array().is_none_or(|items| {
                items
                    .iter()
                    .enumerate()
                    .all(|(i, item)| !items[i + 1..].contains(item))
            }),
            Self::InSet { values } => values.contains(value),
            Self::Equals { value: expected } => expected == value,
            Self::Any { exprs } => exprs.iter().any(|expr| expr.holds(value)),
        }
    }
}

fn is_multiple_of(value: f64, divisor: f64) -> bool {
    if divisor == 0.0 {
        return false;
    }
    let quotient: f64 = value / divisor;
    (quotient - quotient.round()).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_of_is_structural() {
        let expr = Expr::TypeOf {
            types: vec![JsonType::String],
        };
        assert!(expr.holds(&json!("")));
        assert!(expr.holds(&json!("   ")));
        assert!(!expr.holds(&json!(1)));
    }

    #[test]
    fn keywords_ignore_other_types() {
        let expr = Expr::Length {
            cmp: CmpOp::Ge,
            bound: 3,
        };
        assert!(expr.holds(&json!(1)));
        assert!(!expr.holds(&json!("ab")));
        assert!(expr.holds(&json!("äöü")));
    }

    #[test]
    fn number_bounds() {
        let minimum = Expr::Number {
            cmp: CmpOp::Ge,
            bound: 1.5,
        };
        assert!(minimum.holds(&json!(2)));
        assert!(minimum.holds(&json!(1.5)));
        assert!(!minimum.holds(&json!(1)));
    }

    #[test]
    fn multiple_of_handles_fractions() {
        let expr = Expr::MultipleOf { divisor: 0.1 };
        assert!(expr.holds(&json!(0.3)));
        assert!(!expr.holds(&json!(0.35)));
    }

    #[test]
    fn unique_items() {
        assert!(Expr::UniqueItems.holds(&json!([1, 2, 3])));
        assert!(!Expr::UniqueItems.holds(&json!([1, 2, 1])));
    }

    #[test]
    fn any_of_alternatives() {
        let expr = Expr::Any {
            exprs: vec![
                Expr::Equals { value: json!("a") },
                Expr::InSet {
                    values: vec![json!("b"), json!("c")],
                },
            ],
        };
        assert!(expr.holds(&json!("a")));
        assert!(expr.holds(&json!("c")));
        assert!(!expr.holds(&json!("d")));
    }

    #[test]
    fn empty_any_rejects_everything() {
        let expr = Expr::Any { exprs: Vec::new() };
        assert!(!expr.holds(&json!(null)));
        assert!(!expr.holds(&json!({})));
    }
}
