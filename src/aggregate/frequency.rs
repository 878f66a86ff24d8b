// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Conditional frequency: the share of rows passing a secondary predicate among
//! the rows passing the aggregate's own filter.
//!
//! State is `[denominator, numerator]`, both integer counts starting at zero.

use super::leaf;
use crate::expr::Filter;
use crate::types::{Affinity, Cell, ConvertError};

pub const FREQUENCY_SLOTS: usize = 2;

const DENOMINATOR: usize = 0;
const NUMERATOR: usize = 1;

pub(super) fn initialize() -> [Cell; FREQUENCY_SLOTS] {
    [Cell::Int(0), Cell::Int(0)]
}

/// Counts a row that already passed the primary filter.
pub(super) fn accumulate(
    predicate: &Filter,
    row: &[Cell],
    slots: &mut [Cell],
) -> Result<(), ConvertError> {
    leaf::bump(&mut slots[DENOMINATOR])?;
    if predicate.render(row)? {
        leaf::bump(&mut slots[NUMERATOR])?;
    }
    Ok(())
}

pub(super) fn merge(source: &[Cell], target: &mut [Cell]) -> Result<(), ConvertError> {
    for (src, dst) in source.iter().zip(target.iter_mut()) {
        leaf::add(dst, src)?;
    }
    Ok(())
}

/// `numerator / denominator`, or a float null when nothing passed the filter.
pub(super) fn evaluate(slots: &[Cell]) -> Result<Cell, ConvertError> {
    let denominator = slots[DENOMINATOR].to_f64()?.unwrap_or(0.0);
    if denominator == 0.0 {
        return Ok(Cell::Null(Affinity::Float));
    }
    let numerator = slots[NUMERATOR].to_f64()?.unwrap_or(0.0);
    Ok(Cell::float(numerator / denominator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_over_zero_is_null() {
        assert_eq!(
            evaluate(&initialize()).unwrap(),
            Cell::Null(Affinity::Float)
        );
    }

    #[test]
    fn ratio() {
        let mut target = [Cell::Int(4), Cell::Int(1)];
        merge(&[Cell::Int(4), Cell::Int(2)], &mut target).unwrap();
        assert_eq!(target, [Cell::Int(8), Cell::Int(3)]);
        assert_eq!(evaluate(&target).unwrap(), Cell::float(0.375));
    }
}
