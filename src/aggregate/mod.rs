// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Combinable aggregates.
//!
//! # Lifecycle
//!
//! An [`Aggregate`] never owns its running state. Each group holds a [`WorkRecord`]
//! produced by [`Aggregate::initialize`], folds rows into it with
//! [`Aggregate::accumulate`], combines partial records built on disjoint partitions
//! with [`Aggregate::merge`], and finally projects it with [`Aggregate::evaluate`].
//!
//! For every kind except [`first`](Aggregate::first), the evaluated result does not
//! depend on how the input was partitioned nor on the order partial records are
//! merged (up to floating-point rounding). `first` keeps whichever value the merge
//! target already holds, so its result follows the merge order.

use std::fmt;
use std::ops::Index;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Error, Result};
use crate::expr::{Expr, FieldRefs, Filter};
use crate::types::{Affinity, Cell};

mod frequency;
mod leaf;
mod stat;

pub use self::frequency::FREQUENCY_SLOTS;
pub use self::stat::{CoStatFunc, StatFunc, BIVARIATE_SLOTS, UNIVARIATE_SLOTS};

/// The running state of one aggregate for one group.
///
/// The length is fixed when the record is created and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkRecord(SmallVec<[Cell; 6]>);

impl WorkRecord {
    pub fn new(slots: impl IntoIterator<Item = Cell>) -> Self {
        Self(slots.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Cell> {
        self.0.get(slot)
    }

    /// Overwrites one slot. Returns the previous value, or `None` if out of range.
    pub fn set(&mut self, slot: usize, value: Cell) -> Option<Cell> {
        self.0
            .get_mut(slot)
            .map(|old| std::mem::replace(old, value))
    }

    pub fn slots(&self) -> &[Cell] {
        &self.0
    }

    fn slots_mut(&mut self) -> &mut [Cell] {
        &mut self.0
    }
}

impl Index<usize> for WorkRecord {
    type Output = Cell;

    fn index(&self, slot: usize) -> &Cell {
        &self.0[slot]
    }
}

/// The kind of an aggregate and its input expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum AggKind {
    /// Counts every row, whatever the value of the expression.
    CountAll(Expr),
    /// Counts rows on which the expression is not null.
    Count(Expr),
    /// Counts rows on which the expression is null.
    CountNull(Expr),
    Sum(Expr),
    Min(Expr),
    Max(Expr),
    /// The value on the row minimizing `key`.
    MinOf { key: Expr, value: Expr },
    /// The first non-null value. Order-sensitive under merge.
    First(Expr),
    Stat {
        func: StatFunc,
        x: Expr,
        /// Defaults to a weight of one per row.
        weight: Option<Expr>,
    },
    CoStat {
        func: CoStatFunc,
        x: Expr,
        y: Expr,
        weight: Option<Expr>,
    },
    /// Share of filtered rows that also pass `predicate`.
    Frequency { predicate: Filter },
}

/// An aggregate function together with its row filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    kind: AggKind,
    filter: Filter,
}

impl Aggregate {
    fn new(kind: AggKind) -> Self {
        Self {
            kind,
            filter: Filter::TrueForAll,
        }
    }

    pub fn count_all(expr: Expr) -> Self {
        Self::new(AggKind::CountAll(expr))
    }

    pub fn count(expr: Expr) -> Self {
        Self::new(AggKind::Count(expr))
    }

    pub fn count_null(expr: Expr) -> Self {
        Self::new(AggKind::CountNull(expr))
    }

    pub fn sum(expr: Expr) -> Result<Self> {
        require_numeric("sum", &expr)?;
        Ok(Self::new(AggKind::Sum(expr)))
    }

    pub fn min(expr: Expr) -> Self {
        Self::new(AggKind::Min(expr))
    }

    pub fn max(expr: Expr) -> Self {
        Self::new(AggKind::Max(expr))
    }

    pub fn min_of(key: Expr, value: Expr) -> Self {
        Self::new(AggKind::MinOf { key, value })
    }

    pub fn first(expr: Expr) -> Self {
        Self::new(AggKind::First(expr))
    }

    /// A univariate statistic. With a weight, rows with a null weight are filtered out.
    pub fn stat(func: StatFunc, x: Expr, weight: Option<Expr>) -> Result<Self> {
        require_numeric(&func.to_string(), &x)?;
        if let Some(weight) = &weight {
            require_numeric(&func.to_string(), weight)?;
        }
        let filter = weight
            .clone()
            .map_or(Filter::TrueForAll, Filter::not_null);
        Ok(Self {
            kind: AggKind::Stat { func, x, weight },
            filter,
        })
    }

    pub fn mean(x: Expr) -> Result<Self> {
        Self::stat(StatFunc::Mean, x, None)
    }

    pub fn variance(x: Expr) -> Result<Self> {
        Self::stat(StatFunc::Variance, x, None)
    }

    pub fn stddev(x: Expr) -> Result<Self> {
        Self::stat(StatFunc::StdDev, x, None)
    }

    /// A bivariate statistic. With a weight, rows with a null weight are filtered out.
    pub fn co_stat(func: CoStatFunc, x: Expr, y: Expr, weight: Option<Expr>) -> Result<Self> {
        require_numeric(&func.to_string(), &x)?;
        require_numeric(&func.to_string(), &y)?;
        if let Some(weight) = &weight {
            require_numeric(&func.to_string(), weight)?;
        }
        let filter = weight
            .clone()
            .map_or(Filter::TrueForAll, Filter::not_null);
        Ok(Self {
            kind: AggKind::CoStat { func, x, y, weight },
            filter,
        })
    }

    pub fn covariance(x: Expr, y: Expr) -> Result<Self> {
        Self::co_stat(CoStatFunc::Covariance, x, y, None)
    }

    pub fn correlation(x: Expr, y: Expr) -> Result<Self> {
        Self::co_stat(CoStatFunc::Correlation, x, y, None)
    }

    pub fn slope(x: Expr, y: Expr) -> Result<Self> {
        Self::co_stat(CoStatFunc::Slope, x, y, None)
    }

    pub fn intercept(x: Expr, y: Expr) -> Result<Self> {
        Self::co_stat(CoStatFunc::Intercept, x, y, None)
    }

    pub fn frequency(predicate: Filter) -> Self {
        Self::new(AggKind::Frequency { predicate })
    }

    /// Replaces the row filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn kind(&self) -> &AggKind {
        &self.kind
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Number of slots in this aggregate's work record.
    pub fn signature(&self) -> usize {
        match &self.kind {
            AggKind::CountAll(_)
            | AggKind::Count(_)
            | AggKind::CountNull(_)
            | AggKind::Sum(_)
            | AggKind::Min(_)
            | AggKind::Max(_)
            | AggKind::First(_) => 1,
            AggKind::MinOf { .. } => 2,
            AggKind::Stat { .. } => UNIVARIATE_SLOTS,
            AggKind::CoStat { .. } => BIVARIATE_SLOTS,
            AggKind::Frequency { .. } => FREQUENCY_SLOTS,
        }
    }

    /// The affinity of the evaluated result.
    pub fn return_affinity(&self) -> Affinity {
        match &self.kind {
            AggKind::CountAll(_) | AggKind::Count(_) | AggKind::CountNull(_) => Affinity::Int,
            AggKind::Sum(e) | AggKind::Min(e) | AggKind::Max(e) | AggKind::First(e) => {
                e.return_affinity()
            }
            AggKind::MinOf { value, .. } => value.return_affinity(),
            AggKind::Stat { .. } | AggKind::CoStat { .. } | AggKind::Frequency { .. } => {
                Affinity::Float
            }
        }
    }

    /// The affinity of each work record slot.
    pub fn slot_affinities(&self) -> SmallVec<[Affinity; 6]> {
        match &self.kind {
            AggKind::MinOf { key, value } => {
                [key.return_affinity(), value.return_affinity()].into_iter().collect()
            }
            AggKind::Frequency { .. } => [Affinity::Int; FREQUENCY_SLOTS].into_iter().collect(),
            _ => std::iter::repeat(self.return_affinity())
                .take(self.signature())
                .collect(),
        }
    }

    /// Declared byte width of the evaluated result.
    pub fn size(&self) -> usize {
        match &self.kind {
            AggKind::Sum(e) | AggKind::Min(e) | AggKind::Max(e) | AggKind::First(e) => {
                e.data_size()
            }
            AggKind::MinOf { value, .. } => value.data_size(),
            // statistics report at the width of their input
            AggKind::Stat { x, .. } | AggKind::CoStat { x, .. } => x.data_size(),
            _ => self.return_affinity().fixed_width().unwrap_or(0),
        }
    }

    /// Indices of every input column read by the filter or the expressions.
    pub fn field_refs(&self) -> FieldRefs {
        let mut refs = self.filter.field_refs();
        for expr in self.args() {
            refs.extend(expr.field_refs());
        }
        if let AggKind::Frequency { predicate } = &self.kind {
            refs.extend(predicate.field_refs());
        }
        refs
    }

    fn args(&self) -> SmallVec<[&Expr; 3]> {
        let mut args = SmallVec::new();
        match &self.kind {
            AggKind::CountAll(e)
            | AggKind::Count(e)
            | AggKind::CountNull(e)
            | AggKind::Sum(e)
            | AggKind::Min(e)
            | AggKind::Max(e)
            | AggKind::First(e) => args.push(e),
            AggKind::MinOf { key, value } => args.extend([key, value]),
            AggKind::Stat { x, weight, .. } => args.extend(std::iter::once(x).chain(weight)),
            AggKind::CoStat { x, y, weight, .. } => args.extend([x, y].into_iter().chain(weight)),
            AggKind::Frequency { .. } => {}
        }
        args
    }

    fn name(&self) -> String {
        match &self.kind {
            AggKind::CountAll(_) => "count_all".into(),
            AggKind::Count(_) => "count".into(),
            AggKind::CountNull(_) => "count_null".into(),
            AggKind::Sum(_) => "sum".into(),
            AggKind::Min(_) => "min".into(),
            AggKind::Max(_) => "max".into(),
            AggKind::MinOf { .. } => "min_of".into(),
            AggKind::First(_) => "first".into(),
            AggKind::Stat { func, .. } => func.to_string(),
            AggKind::CoStat { func, .. } => func.to_string(),
            AggKind::Frequency { .. } => "frequency".into(),
        }
    }

    /// Returns a fresh identity state.
    pub fn initialize(&self) -> WorkRecord {
        match &self.kind {
            AggKind::CountAll(_) | AggKind::Count(_) | AggKind::CountNull(_) => {
                WorkRecord::new([Cell::Int(0)])
            }
            AggKind::Frequency { .. } => WorkRecord::new(frequency::initialize()),
            _ => WorkRecord::new(self.slot_affinities().into_iter().map(Affinity::null)),
        }
    }

    fn check_record(&self, record: &WorkRecord) -> Result<()> {
        if record.len() != self.signature() {
            return Err(Error::slot_mismatch(0, self.signature(), record.len()));
        }
        Ok(())
    }

    /// Folds one input row into `record`. A row rejected by the filter is a no-op.
    pub fn accumulate(&self, row: &[Cell], record: &mut WorkRecord) -> Result<()> {
        self.check_record(record)?;
        if !self.filter.render(row)? {
            trace!(agg = %self, "row rejected by filter");
            return Ok(());
        }
        let slots = record.slots_mut();
        match &self.kind {
            AggKind::CountAll(_) => leaf::bump(&mut slots[0])?,
            AggKind::Count(e) => {
                if !e.eval(row)?.is_null() {
                    leaf::bump(&mut slots[0])?;
                }
            }
            AggKind::CountNull(e) => {
                if e.eval(row)?.is_null() {
                    leaf::bump(&mut slots[0])?;
                }
            }
            AggKind::Sum(e) => leaf::add(&mut slots[0], &e.eval(row)?)?,
            AggKind::Min(e) => leaf::min(&mut slots[0], &e.eval(row)?)?,
            AggKind::Max(e) => leaf::max(&mut slots[0], &e.eval(row)?)?,
            AggKind::MinOf { key, value } => {
                leaf::min_of(slots, &key.eval(row)?, &value.eval(row)?)?
            }
            AggKind::First(e) => leaf::first(&mut slots[0], &e.eval(row)?),
            AggKind::Stat { x, weight, .. } => {
                let (Some(w), Some(x)) = (eval_weight(weight, row)?, x.eval(row)?.to_f64()?)
                else {
                    return Ok(());
                };
                stat::accumulate_sums(slots, [w, w * x, w * x * x])?;
            }
            AggKind::CoStat { x, y, weight, .. } => {
                let (Some(w), Some(x), Some(y)) = (
                    eval_weight(weight, row)?,
                    x.eval(row)?.to_f64()?,
                    y.eval(row)?.to_f64()?,
                ) else {
                    return Ok(());
                };
                stat::accumulate_sums(slots, [w, w * x, w * x * x, w * y, w * y * y, w * x * y])?;
            }
            AggKind::Frequency { predicate } => frequency::accumulate(predicate, row, slots)?,
        }
        Ok(())
    }

    /// Combines `source` into `target`. `source` is left untouched.
    pub fn merge(&self, source: &WorkRecord, target: &mut WorkRecord) -> Result<()> {
        self.check_record(source)?;
        self.check_record(target)?;
        let (src, dst) = (source.slots(), target.slots_mut());
        match &self.kind {
            AggKind::CountAll(_) | AggKind::Count(_) | AggKind::CountNull(_) | AggKind::Sum(_) => {
                leaf::add(&mut dst[0], &src[0])?
            }
            AggKind::Min(_) => leaf::min(&mut dst[0], &src[0])?,
            AggKind::Max(_) => leaf::max(&mut dst[0], &src[0])?,
            AggKind::MinOf { .. } => leaf::min_of(dst, &src[0], &src[1])?,
            // the target already holds the value observed first
            AggKind::First(_) => leaf::first(&mut dst[0], &src[0]),
            AggKind::Stat { .. } => stat::merge_sums::<UNIVARIATE_SLOTS>(src, dst)?,
            AggKind::CoStat { .. } => stat::merge_sums::<BIVARIATE_SLOTS>(src, dst)?,
            AggKind::Frequency { .. } => frequency::merge(src, dst)?,
        }
        Ok(())
    }

    /// Projects `record` to the final value. Never mutates the record.
    ///
    /// Slightly negative variances are always clamped to zero here; use
    /// [`evaluate_with`](Self::evaluate_with) to follow a collection's
    /// `clamp_negative_variance` option instead.
    pub fn evaluate(&self, record: &WorkRecord) -> Result<Cell> {
        self.evaluate_with(record, true)
    }

    /// Like [`evaluate`](Self::evaluate), choosing whether slightly negative
    /// variances are clamped to zero.
    pub fn evaluate_with(&self, record: &WorkRecord, clamp_variance: bool) -> Result<Cell> {
        self.check_record(record)?;
        let slots = record.slots();
        Ok(match &self.kind {
            AggKind::CountAll(_) | AggKind::Count(_) | AggKind::CountNull(_) => {
                if slots[0].is_null() {
                    Cell::Int(0)
                } else {
                    slots[0].clone()
                }
            }
            AggKind::Sum(_) | AggKind::Min(_) | AggKind::Max(_) | AggKind::First(_) => {
                slots[0].clone()
            }
            AggKind::MinOf { .. } => slots[1].clone(),
            AggKind::Stat { func, .. } => {
                stat::evaluate_univariate(*func, slots, clamp_variance)?
            }
            AggKind::CoStat { func, .. } => {
                stat::evaluate_bivariate(*func, slots, clamp_variance)?
            }
            AggKind::Frequency { .. } => frequency::evaluate(slots)?,
        })
    }
}

fn require_numeric(name: &str, expr: &Expr) -> Result<()> {
    let affinity = expr.return_affinity();
    if !affinity.is_numeric() {
        return Err(Error::invalid_argument(format!(
            "{name} expects a numeric argument, got {affinity}"
        )));
    }
    Ok(())
}

/// Evaluates the weight of a row, defaulting to one.
fn eval_weight(weight: &Option<Expr>, row: &[Cell]) -> Result<Option<f64>> {
    Ok(match weight {
        Some(weight) => weight.eval(row)?.to_f64()?,
        None => Some(1.0),
    })
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AggKind::Frequency { predicate } => write!(f, "frequency({predicate})")?,
            _ => write!(f, "{}({})", self.name(), self.args().iter().join(", "))?,
        }
        if let Filter::Predicate(expr) = &self.filter {
            write!(f, " filter ({expr})")?;
        }
        Ok(())
    }
}
