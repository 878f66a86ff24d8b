// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Weighted moment aggregates.
//!
//! Univariate state is `[W, WX, WX2]`, bivariate state is
//! `[W, WX, WX2, WY, WY2, WXY]`. Both shapes share the same accumulate and merge
//! recurrences; the concrete functions differ only in how they project the sums.

use parse_display::Display;

use crate::types::{Affinity, Cell, ConvertError};

/// Slot count of the univariate state.
pub const UNIVARIATE_SLOTS: usize = 3;
/// Slot count of the bivariate state.
pub const BIVARIATE_SLOTS: usize = 6;

/// Projection of the univariate state.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatFunc {
    #[display("mean")]
    Mean,
    #[display("var_pop")]
    Variance,
    #[display("stddev_pop")]
    StdDev,
}

/// Projection of the bivariate state.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoStatFunc {
    #[display("covar_pop")]
    Covariance,
    #[display("corr")]
    Correlation,
    #[display("regr_slope")]
    Slope,
    #[display("regr_intercept")]
    Intercept,
}

/// Reads the running sums. Returns `None` while any of them is still null.
fn read_sums<const N: usize>(slots: &[Cell]) -> Result<Option<[f64; N]>, ConvertError> {
    let mut sums = [0.0; N];
    for (sum, slot) in sums.iter_mut().zip(slots) {
        match slot.to_f64()? {
            Some(v) => *sum = v,
            None => return Ok(None),
        }
    }
    Ok(Some(sums))
}

/// Folds one observation's terms into the running sums.
///
/// A null weight slot means nothing has been observed yet, so the sums are
/// initialized from the terms directly.
pub(super) fn accumulate_sums<const N: usize>(
    slots: &mut [Cell],
    terms: [f64; N],
) -> Result<(), ConvertError> {
    if slots[0].is_null() {
        for (slot, term) in slots.iter_mut().zip(terms) {
            *slot = Cell::float(term);
        }
        return Ok(());
    }
    if let Some(sums) = read_sums::<N>(slots)? {
        for ((slot, sum), term) in slots.iter_mut().zip(sums).zip(terms) {
            *slot = Cell::float(sum + term);
        }
    }
    Ok(())
}

/// Adds `source` sums into `target` elementwise, or adopts `source` if `target`
/// has not observed anything yet.
pub(super) fn merge_sums<const N: usize>(
    source: &[Cell],
    target: &mut [Cell],
) -> Result<(), ConvertError> {
    let Some(src) = read_sums::<N>(source)? else {
        return Ok(());
    };
    if target[0].is_null() {
        target.clone_from_slice(source);
        return Ok(());
    }
    if let Some(dst) = read_sums::<N>(target)? {
        for ((slot, a), b) in target.iter_mut().zip(dst).zip(src) {
            *slot = Cell::float(a + b);
        }
    }
    Ok(())
}

fn variance(sum_sq: f64, mean: f64, weight: f64, clamp: bool) -> f64 {
    let variance = sum_sq / weight - mean * mean;
    if clamp {
        variance.max(0.0)
    } else {
        variance
    }
}

/// Projects `[W, WX, WX2]`. A zero or missing weight evaluates to null.
pub(super) fn evaluate_univariate(
    func: StatFunc,
    slots: &[Cell],
    clamp: bool,
) -> Result<Cell, ConvertError> {
    let null = Cell::Null(Affinity::Float);
    let Some([w, wx, wx2]) = read_sums::<UNIVARIATE_SLOTS>(slots)? else {
        return Ok(null);
    };
    if w == 0.0 {
        return Ok(null);
    }
    let mean = wx / w;
    Ok(match func {
        StatFunc::Mean => Cell::float(mean),
        StatFunc::Variance => Cell::float(variance(wx2, mean, w, clamp)),
        StatFunc::StdDev => Cell::float(variance(wx2, mean, w, clamp)).sqrt()?,
    })
}

/// Projects `[W, WX, WX2, WY, WY2, WXY]`.
///
/// Correlation is null when either standard deviation is zero; slope and
/// intercept are null when the variance of `x` is zero.
pub(super) fn evaluate_bivariate(
    func: CoStatFunc,
    slots: &[Cell],
    clamp: bool,
) -> Result<Cell, ConvertError> {
    let null = Cell::Null(Affinity::Float);
    let Some([w, wx, wx2, wy, wy2, wxy]) = read_sums::<BIVARIATE_SLOTS>(slots)? else {
        return Ok(null);
    };
    if w == 0.0 {
        return Ok(null);
    }
    let (mean_x, mean_y) = (wx / w, wy / w);
    let covariance = wxy / w - mean_x * mean_y;
    let var_x = variance(wx2, mean_x, w, clamp);
    let slope = || (var_x != 0.0).then(|| covariance / var_x);
    let value = match func {
        CoStatFunc::Covariance => Some(covariance),
        CoStatFunc::Correlation => {
            let var_y = variance(wy2, mean_y, w, clamp);
            let (sd_x, sd_y) = (var_x.sqrt(), var_y.sqrt());
            (sd_x != 0.0 && sd_y != 0.0).then(|| covariance / (sd_x * sd_y))
        }
        CoStatFunc::Slope => slope(),
        CoStatFunc::Intercept => slope().map(|slope| mean_y - slope * mean_x),
    };
    Ok(match value {
        Some(v) if !v.is_nan() => Cell::float(v),
        _ => null,
    })
}
