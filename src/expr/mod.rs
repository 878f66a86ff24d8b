// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Scalar expressions and row filters.
//!
//! Expressions are evaluated against an explicit input row rather than an ambient
//! "current row", so a single tree can be shared by any number of accumulation
//! passes. Deep copies are plain [`Clone`]s of the tree.

use std::collections::BTreeSet;
use std::fmt;

use parse_display::Display;

use crate::types::{Affinity, Cell, ConvertError};

mod filter;

pub use self::filter::*;

/// A set of input column indices.
pub type FieldRefs = BTreeSet<usize>;

/// A scalar expression over one input row.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Cell),
    InputRef(InputRef),
    BinaryOp(BinaryOp),
    UnaryOp(UnaryOp),
    IsNull(Box<Expr>),
}

/// A reference to a column of the input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRef {
    pub index: usize,
    pub affinity: Affinity,
    /// Declared byte width. For fixed-width affinities this is the natural width.
    pub size: usize,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Multiply,
    #[display("/")]
    Divide,
    #[display("%")]
    Modulo,
    #[display("=")]
    Eq,
    #[display("<>")]
    NotEq,
    #[display("<")]
    Lt,
    #[display("<=")]
    LtEq,
    #[display(">")]
    Gt,
    #[display(">=")]
    GtEq,
    #[display("and")]
    And,
    #[display("or")]
    Or,
}

impl BinaryOperator {
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    pub const fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    #[display("-")]
    Minus,
    #[display("not ")]
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOp {
    pub op: BinaryOperator,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub return_affinity: Affinity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOp {
    pub op: UnaryOperator,
    pub expr: Box<Expr>,
}

impl Expr {
    pub fn constant(value: impl Into<Cell>) -> Self {
        Self::Constant(value.into())
    }

    /// A column reference with the natural width of its affinity.
    pub fn input_ref(index: usize, affinity: Affinity) -> Self {
        Self::input_ref_sized(index, affinity, affinity.fixed_width().unwrap_or(0))
    }

    /// A column reference with an explicit declared width, e.g. `CHAR(16)`.
    pub fn input_ref_sized(index: usize, affinity: Affinity, size: usize) -> Self {
        Self::InputRef(InputRef {
            index,
            affinity,
            size,
        })
    }

    /// Builds a binary operation, checking that it is defined for the operand affinities.
    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Result<Self, ConvertError> {
        let (l, r) = (left.return_affinity(), right.return_affinity());
        let return_affinity = if op.is_logical() {
            if l != Affinity::Bool || r != Affinity::Bool {
                return Err(ConvertError::NoBinaryOp(op.to_string(), l, r));
            }
            Affinity::Bool
        } else if op.is_comparison() {
            l.null().compare(&r.null())?;
            Affinity::Bool
        } else {
            apply_arith(op, &l.null(), &r.null())?.affinity()
        };
        Ok(Self::BinaryOp(BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            return_affinity,
        }))
    }

    pub fn unary(op: UnaryOperator, expr: Expr) -> Result<Self, ConvertError> {
        let affinity = expr.return_affinity();
        match op {
            UnaryOperator::Not if affinity != Affinity::Bool => {
                return Err(ConvertError::NoUnaryOp(op.to_string(), affinity))
            }
            UnaryOperator::Minus if !affinity.is_numeric() => {
                return Err(ConvertError::NoUnaryOp(op.to_string(), affinity))
            }
            _ => {}
        }
        Ok(Self::UnaryOp(UnaryOp {
            op,
            expr: Box::new(expr),
        }))
    }

    pub fn is_null(expr: Expr) -> Self {
        Self::IsNull(Box::new(expr))
    }

    pub fn is_not_null(expr: Expr) -> Self {
        Self::UnaryOp(UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(Self::is_null(expr)),
        })
    }

    /// The affinity of the values this expression produces.
    pub fn return_affinity(&self) -> Affinity {
        match self {
            Self::Constant(v) => v.affinity(),
            Self::InputRef(input_ref) => input_ref.affinity,
            Self::BinaryOp(op) => op.return_affinity,
            Self::UnaryOp(op) => op.expr.return_affinity(),
            Self::IsNull(_) => Affinity::Bool,
        }
    }

    /// Declared byte width of the produced values.
    pub fn data_size(&self) -> usize {
        if let Some(width) = self.return_affinity().fixed_width() {
            return width;
        }
        match self {
            Self::Constant(v) => v.data_size(),
            Self::InputRef(input_ref) => input_ref.size,
            Self::BinaryOp(op) => op.left.data_size().max(op.right.data_size()),
            Self::UnaryOp(op) => op.expr.data_size(),
            Self::IsNull(_) => 1,
        }
    }

    /// Evaluate the expression against one input row.
    pub fn eval(&self, row: &[Cell]) -> Result<Cell, ConvertError> {
        match self {
            Self::Constant(v) => Ok(v.clone()),
            Self::InputRef(input_ref) => {
                row.get(input_ref.index)
                    .cloned()
                    .ok_or(ConvertError::ColumnOutOfRange {
                        index: input_ref.index,
                        len: row.len(),
                    })
            }
            Self::BinaryOp(op) => {
                let left = op.left.eval(row)?;
                let right = op.right.eval(row)?;
                if op.op.is_logical() {
                    eval_logical(op.op, left.as_bool()?, right.as_bool()?)
                } else if op.op.is_comparison() {
                    Ok(match left.compare(&right)? {
                        Some(ord) => Cell::Bool(match op.op {
                            BinaryOperator::Eq => ord.is_eq(),
                            BinaryOperator::NotEq => ord.is_ne(),
                            BinaryOperator::Lt => ord.is_lt(),
                            BinaryOperator::LtEq => ord.is_le(),
                            BinaryOperator::Gt => ord.is_gt(),
                            _ => ord.is_ge(),
                        }),
                        None => Cell::Null(Affinity::Bool),
                    })
                } else {
                    apply_arith(op.op, &left, &right)
                }
            }
            Self::UnaryOp(op) => {
                let value = op.expr.eval(row)?;
                match op.op {
                    UnaryOperator::Minus => value.neg(),
                    UnaryOperator::Not => Ok(match value.as_bool()? {
                        Some(b) => Cell::Bool(!b),
                        None => Cell::Null(Affinity::Bool),
                    }),
                }
            }
            Self::IsNull(expr) => Ok(Cell::Bool(expr.eval(row)?.is_null())),
        }
    }

    /// Returns the indices of all input columns read by this expression.
    pub fn field_refs(&self) -> FieldRefs {
        struct Visitor(FieldRefs);
        impl ExprVisitor for Visitor {
            fn visit_input_ref(&mut self, expr: &InputRef) {
                self.0.insert(expr.index);
            }
        }
        let mut visitor = Visitor(FieldRefs::new());
        visitor.visit_expr(self);
        visitor.0
    }
}

fn apply_arith(op: BinaryOperator, left: &Cell, right: &Cell) -> Result<Cell, ConvertError> {
    match op {
        BinaryOperator::Plus => left.add(right),
        BinaryOperator::Minus => left.sub(right),
        BinaryOperator::Multiply => left.mul(right),
        BinaryOperator::Divide => left.div(right),
        BinaryOperator::Modulo => left.rem(right),
        _ => Err(ConvertError::NoBinaryOp(
            op.to_string(),
            left.affinity(),
            right.affinity(),
        )),
    }
}

/// Three-valued `and` / `or`.
fn eval_logical(
    op: BinaryOperator,
    left: Option<bool>,
    right: Option<bool>,
) -> Result<Cell, ConvertError> {
    let result = match (op, left, right) {
        (BinaryOperator::And, Some(false), _) | (BinaryOperator::And, _, Some(false)) => {
            Some(false)
        }
        (BinaryOperator::And, Some(true), Some(true)) => Some(true),
        (BinaryOperator::Or, Some(true), _) | (BinaryOperator::Or, _, Some(true)) => Some(true),
        (BinaryOperator::Or, Some(false), Some(false)) => Some(false),
        (BinaryOperator::And | BinaryOperator::Or, _, _) => None,
        _ => {
            return Err(ConvertError::NoBinaryOp(
                op.to_string(),
                Affinity::Bool,
                Affinity::Bool,
            ))
        }
    };
    Ok(match result {
        Some(b) => Cell::Bool(b),
        None => Cell::Null(Affinity::Bool),
    })
}

/// Walks an expression tree. Override the hooks you care about.
pub trait ExprVisitor {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Constant(v) => self.visit_constant(v),
            Expr::InputRef(e) => self.visit_input_ref(e),
            Expr::BinaryOp(e) => {
                self.visit_expr(&e.left);
                self.visit_expr(&e.right);
            }
            Expr::UnaryOp(e) => self.visit_expr(&e.expr),
            Expr::IsNull(e) => self.visit_expr(e),
        }
    }

    fn visit_constant(&mut self, _: &Cell) {}

    fn visit_input_ref(&mut self, _: &InputRef) {}
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::InputRef(e) => write!(f, "#{}", e.index),
            Self::BinaryOp(e) => write!(f, "({} {} {})", e.left, e.op, e.right),
            Self::UnaryOp(e) => write!(f, "{}{}", e.op, e.expr),
            Self::IsNull(e) => write!(f, "{e} is null"),
        }
    }
}
