// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use parse_display::Display;
use serde::{Deserialize, Serialize};

use super::*;

/// A wrapper around floats providing implementations of `Eq`, `Ord`, and `Hash`.
pub type F64 = OrderedFloat<f64>;

/// A nullable tagged scalar.
///
/// A null remembers its affinity, so an aggregate can always hand back a null of
/// the type it declared.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cell {
    // NOTE: Null comes first.
    // => NULL sorts before any non-NULL value
    #[display("null")]
    Null(Affinity),
    #[display("{0}")]
    Bool(bool),
    #[display("{0}")]
    Int(i64),
    #[display("{0}")]
    Float(F64),
    #[display("{0}")]
    Timestamp(Timestamp),
    #[display("'{0}'")]
    Text(String),
    #[display("{0}")]
    Blob(Blob),
}

/// An input row, indexed by column.
pub type Row = Vec<Cell>;

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Self::Float(v.into())
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Self::Text(v.into())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Timestamp> for Cell {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Blob> for Cell {
    fn from(v: Blob) -> Self {
        Self::Blob(v)
    }
}

/// Returns the affinity of `a op b`, or an error if the operation is undefined.
fn promote(op: &str, a: Affinity, b: Affinity) -> Result<Affinity, ConvertError> {
    use Affinity::*;
    match (a, b) {
        (Int, Int) => Ok(Int),
        (Int | Float, Int | Float) => Ok(Float),
        (Timestamp, Int) if op == "add" || op == "sub" => Ok(Timestamp),
        (Int, Timestamp) if op == "add" => Ok(Timestamp),
        _ => Err(ConvertError::NoBinaryOp(op.into(), a, b)),
    }
}

/// Implement checked arithmetic between cells.
macro_rules! impl_arith {
    ($name:ident, $op:tt, $checked:ident) => {
        #[doc = concat!("`", stringify!($name), "` of two cells. A null operand yields a null of the result affinity.")]
        pub fn $name(&self, other: &Self) -> Result<Self, ConvertError> {
            use Cell::*;
            let op = stringify!($name);
            let affinity = promote(op, self.affinity(), other.affinity())?;
            Ok(match (self, other) {
                (Null(_), _) | (_, Null(_)) => Null(affinity),
                (Int(x), Int(y)) => match x.$checked(*y) {
                    Some(v) => Int(v),
                    None if *y == 0 => return Err(ConvertError::DivisionByZero),
                    None => return Err(ConvertError::Overflow(op)),
                },
                (Int(x), Float(y)) => Float(F64::from(*x as f64) $op *y),
                (Float(x), Int(y)) => Float(*x $op F64::from(*y as f64)),
                (Float(x), Float(y)) => Float(*x $op *y),
                (Timestamp(t), Int(d)) => {
                    let delta = if op == "sub" { d.checked_neg() } else { Some(*d) };
                    Timestamp(
                        delta
                            .and_then(|d| t.checked_add_micros(d))
                            .ok_or(ConvertError::Overflow(op))?,
                    )
                }
                (Int(d), Timestamp(t)) => {
                    Timestamp(t.checked_add_micros(*d).ok_or(ConvertError::Overflow(op))?)
                }
                _ => {
                    return Err(ConvertError::NoBinaryOp(
                        op.into(),
                        self.affinity(),
                        other.affinity(),
                    ))
                }
            })
        }
    };
}

impl Cell {
    impl_arith!(add, +, checked_add);
    impl_arith!(sub, -, checked_sub);
    impl_arith!(mul, *, checked_mul);
    impl_arith!(div, /, checked_div);
    impl_arith!(rem, %, checked_rem);

    /// Creates a floating-point cell.
    pub fn float(v: f64) -> Self {
        Self::Float(v.into())
    }

    /// Returns the affinity of the cell, null or not.
    pub const fn affinity(&self) -> Affinity {
        match self {
            Self::Null(affinity) => *affinity,
            Self::Bool(_) => Affinity::Bool,
            Self::Int(_) => Affinity::Int,
            Self::Float(_) => Affinity::Float,
            Self::Timestamp(_) => Affinity::Timestamp,
            Self::Text(_) => Affinity::Text,
            Self::Blob(_) => Affinity::Blob,
        }
    }

    /// Returns `true` if value is null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Returns `true` if value is a non-null zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Bool(v) => !*v,
            Self::Int(v) => *v == 0,
            Self::Float(v) => v.0 == 0.0,
            Self::Timestamp(v) => v.micros() == 0,
            Self::Null(_) | Self::Text(_) | Self::Blob(_) => false,
        }
    }

    /// The zero of an affinity.
    pub fn zero_value(affinity: Affinity) -> Result<Self, ConvertError> {
        Ok(match affinity {
            Affinity::Bool => Self::Bool(false),
            Affinity::Int => Self::Int(0),
            Affinity::Float => Self::float(0.0),
            Affinity::Timestamp => Self::Timestamp(Timestamp::from_micros(0)),
            _ => return Err(ConvertError::NoUnaryOp("zero".into(), affinity)),
        })
    }

    /// The one of an affinity.
    pub fn one_value(affinity: Affinity) -> Result<Self, ConvertError> {
        Ok(match affinity {
            Affinity::Bool => Self::Bool(true),
            Affinity::Int => Self::Int(1),
            Affinity::Float => Self::float(1.0),
            _ => return Err(ConvertError::NoUnaryOp("one".into(), affinity)),
        })
    }

    /// Adds one. Null stays null.
    pub fn increment(&self) -> Result<Self, ConvertError> {
        self.add(&Self::one_value(self.affinity())?)
    }

    pub fn neg(&self) -> Result<Self, ConvertError> {
        Ok(match self {
            Self::Null(a) if a.is_numeric() => self.clone(),
            Self::Int(v) => Self::Int(v.checked_neg().ok_or(ConvertError::Overflow("neg"))?),
            Self::Float(v) => Self::Float(-*v),
            _ => return Err(ConvertError::NoUnaryOp("neg".into(), self.affinity())),
        })
    }

    /// Converts a numeric cell to `f64`. Null converts to `None`.
    pub fn to_f64(&self) -> Result<Option<f64>, ConvertError> {
        Ok(match self {
            Self::Null(a) if a.is_numeric() => None,
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(v.0),
            _ => return Err(ConvertError::Cast(self.to_string(), Affinity::Float)),
        })
    }

    /// Converts the cell to a floating-point cell, keeping nulls.
    pub fn to_float(&self) -> Result<Self, ConvertError> {
        Ok(match self.to_f64()? {
            Some(v) => Self::float(v),
            None => Self::Null(Affinity::Float),
        })
    }

    /// Interprets the cell as a boolean. Null is unknown.
    pub fn as_bool(&self) -> Result<Option<bool>, ConvertError> {
        match self {
            Self::Null(Affinity::Bool) => Ok(None),
            Self::Bool(v) => Ok(Some(*v)),
            _ => Err(ConvertError::NotBool(self.affinity())),
        }
    }

    /// Compares two non-null cells. Returns `None` if either side is null.
    ///
    /// Integers and floats compare numerically; any other mix of affinities is an error.
    pub fn compare(&self, other: &Self) -> Result<Option<Ordering>, ConvertError> {
        use Cell::*;
        Ok(Some(match (self, other) {
            (Null(_), _) | (_, Null(_)) => {
                // still reject comparisons that could never be defined
                let (a, b) = (self.affinity(), other.affinity());
                if a != b && !(a.is_numeric() && b.is_numeric()) {
                    return Err(ConvertError::NoCompare(a, b));
                }
                return Ok(None);
            }
            (Bool(x), Bool(y)) => x.cmp(y),
            (Int(x), Int(y)) => x.cmp(y),
            (Float(x), Float(y)) => x.cmp(y),
            (Int(x), Float(y)) => F64::from(*x as f64).cmp(y),
            (Float(x), Int(y)) => x.cmp(&F64::from(*y as f64)),
            (Timestamp(x), Timestamp(y)) => x.cmp(y),
            (Text(x), Text(y)) => x.cmp(y),
            (Blob(x), Blob(y)) => x.cmp(y),
            _ => return Err(ConvertError::NoCompare(self.affinity(), other.affinity())),
        }))
    }

    /// Compares and returns the minimum of two values. Null loses; ties keep `self`.
    pub fn min(self, other: Self) -> Result<Self, ConvertError> {
        Ok(match self.compare(&other)? {
            None if self.is_null() => other,
            None => self,
            Some(Ordering::Greater) => other,
            Some(_) => self,
        })
    }

    /// Compares and returns the maximum of two values. Null loses; ties keep `self`.
    pub fn max(self, other: Self) -> Result<Self, ConvertError> {
        Ok(match self.compare(&other)? {
            None if self.is_null() => other,
            None => self,
            Some(Ordering::Less) => other,
            Some(_) => self,
        })
    }

    /// Square root as a float. Null and negative inputs yield a float null.
    pub fn sqrt(&self) -> Result<Self, ConvertError> {
        Ok(match self.to_f64()? {
            Some(v) if v >= 0.0 => Self::float(v.sqrt()),
            _ => Self::Null(Affinity::Float),
        })
    }

    /// `self` raised to `exp`, as a float.
    pub fn power(&self, exp: &Self) -> Result<Self, ConvertError> {
        Ok(match (self.to_f64()?, exp.to_f64()?) {
            (Some(base), Some(exp)) => Self::float(base.powf(exp)),
            _ => Self::Null(Affinity::Float),
        })
    }

    /// Byte width of this particular value.
    pub fn data_size(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Blob(b) => b.len(),
            _ => self.affinity().fixed_width().unwrap_or(0),
        }
    }
}
