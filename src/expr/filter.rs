// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;

use super::*;

/// A boolean gate deciding whether a row contributes to an aggregate.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Filter {
    /// Accepts every row.
    #[default]
    TrueForAll,
    Predicate(Expr),
}

impl Filter {
    /// Builds a predicate filter, checking that the expression is boolean.
    pub fn predicate(expr: Expr) -> Result<Self, ConvertError> {
        match expr.return_affinity() {
            Affinity::Bool => Ok(Self::Predicate(expr)),
            other => Err(ConvertError::NotBool(other)),
        }
    }

    /// Accepts rows on which `expr` is not null.
    pub fn not_null(expr: Expr) -> Self {
        Self::Predicate(Expr::is_not_null(expr))
    }

    /// Evaluates the predicate against a row. Unknown counts as rejected.
    pub fn render(&self, row: &[Cell]) -> Result<bool, ConvertError> {
        match self {
            Self::TrueForAll => Ok(true),
            Self::Predicate(expr) => Ok(expr.eval(row)?.as_bool()?.unwrap_or(false)),
        }
    }

    /// The underlying expression tree, if any.
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            Self::TrueForAll => None,
            Self::Predicate(expr) => Some(expr),
        }
    }

    pub fn is_true_for_all(&self) -> bool {
        matches!(self, Self::TrueForAll)
    }

    pub fn field_refs(&self) -> FieldRefs {
        self.expr().map(Expr::field_refs).unwrap_or_default()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrueForAll => write!(f, "true"),
            Self::Predicate(expr) => write!(f, "{expr}"),
        }
    }
}
