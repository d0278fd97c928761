//! Compile-time literal values and the arithmetic used by fragment folding.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// A literal known at compile time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(SmolStr),
}

impl Literal {
    /// Parse the text of a `value` fragment.
    ///
    /// Quoted text is a string; `true`/`false` are booleans; otherwise the
    /// text is read as an integer, then a float. Anything else is kept
    /// verbatim as a string.
    pub fn parse(text: &str) -> Literal {
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            return Literal::String(SmolStr::new(&text[1..text.len() - 1]));
        }
        match text {
            "true" => return Literal::Boolean(true),
            "false" => return Literal::Boolean(false),
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return Literal::Integer(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Literal::Float(f);
        }
        Literal::String(SmolStr::new(text))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Boolean(_) => "boolean",
            Literal::String(_) => "string",
        }
    }

    /// Numeric view, if the literal is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Integer(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Integer(_) | Literal::Float(_))
    }

    /// Apply a unary `+` or `-`, if the operand supports it.
    pub fn apply_unary(op: &str, value: &Literal) -> Option<Literal> {
        match (op, value) {
            ("-", Literal::Integer(i)) => i.checked_neg().map(Literal::Integer),
            ("-", Literal::Float(f)) => Some(Literal::Float(-f)),
            ("+", lit) if lit.is_numeric() => Some(lit.clone()),
            _ => None,
        }
    }

    /// Apply a binary arithmetic operator over two literals.
    ///
    /// Integer pairs stay integral except under division, which always
    /// produces a float. Mixed pairs promote to float. Integer overflow
    /// folds to `None`, the same as an inapplicable operator.
    pub fn apply_binary(op: &str, lhs: &Literal, rhs: &Literal) -> Option<Literal> {
        if let (Literal::Integer(a), Literal::Integer(b)) = (lhs, rhs) {
            return match op {
                "+" => a.checked_add(*b).map(Literal::Integer),
                "-" => a.checked_sub(*b).map(Literal::Integer),
                "*" => a.checked_mul(*b).map(Literal::Integer),
                "/" if *b != 0 => Some(Literal::Float(*a as f64 / *b as f64)),
                _ => None,
            };
        }
        let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
        match op {
            "+" => Some(Literal::Float(a + b)),
            "-" => Some(Literal::Float(a - b)),
            "*" => Some(Literal::Float(a * b)),
            "/" if b != 0.0 => Some(Literal::Float(a / b)),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::String(s) => write!(f, "\"{s}\""),
        }
    }
}
