// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Recurrences of the single-value aggregates.
//!
//! Every function here tolerates a still-null slot: the first contribution
//! initializes it, later ones fold into it.

use std::cmp::Ordering;

use crate::types::{Cell, ConvertError};

/// Adds one to a counter. A null counter counts as zero.
pub(super) fn bump(slot: &mut Cell) -> Result<(), ConvertError> {
    *slot = if slot.is_null() {
        Cell::Int(1)
    } else {
        slot.increment()?
    };
    Ok(())
}

/// Adds `value` to a running total. Null values contribute nothing; a null total
/// is replaced by the first non-null value.
pub(super) fn add(slot: &mut Cell, value: &Cell) -> Result<(), ConvertError> {
    if value.is_null() {
        return Ok(());
    }
    *slot = if slot.is_null() {
        value.clone()
    } else {
        slot.add(value)?
    };
    Ok(())
}

/// Keeps the smaller of the slot and `value`. Ties keep the slot.
pub(super) fn min(slot: &mut Cell, value: &Cell) -> Result<(), ConvertError> {
    if let Some(Ordering::Less) = value.compare(slot)? {
        *slot = value.clone();
    } else if slot.is_null() && !value.is_null() {
        *slot = value.clone();
    }
    Ok(())
}

/// Keeps the larger of the slot and `value`. Ties keep the slot.
pub(super) fn max(slot: &mut Cell, value: &Cell) -> Result<(), ConvertError> {
    if let Some(Ordering::Greater) = value.compare(slot)? {
        *slot = value.clone();
    } else if slot.is_null() && !value.is_null() {
        *slot = value.clone();
    }
    Ok(())
}

/// Keeps the slot if it already holds a value.
pub(super) fn first(slot: &mut Cell, value: &Cell) {
    if slot.is_null() {
        *slot = value.clone();
    }
}

/// Replaces the `(key, value)` pair if `key` is strictly smaller than the held key.
/// A null key never wins; ties keep the pair seen first.
pub(super) fn min_of(slots: &mut [Cell], key: &Cell, value: &Cell) -> Result<(), ConvertError> {
    if key.is_null() {
        return Ok(());
    }
    let replace = slots[0].is_null() || key.compare(&slots[0])? == Some(Ordering::Less);
    if replace {
        slots[0] = key.clone();
        slots[1] = value.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Affinity;

    #[test]
    fn bump_from_null() {
        let mut slot = Cell::Null(Affinity::Int);
        bump(&mut slot).unwrap();
        bump(&mut slot).unwrap();
        assert_eq!(slot, Cell::Int(2));
    }

    #[test]
    fn add_skips_null() {
        let mut slot = Cell::Null(Affinity::Int);
        add(&mut slot, &Cell::Null(Affinity::Int)).unwrap();
        assert!(slot.is_null());
        add(&mut slot, &Cell::Int(4)).unwrap();
        add(&mut slot, &Cell::Int(5)).unwrap();
        assert_eq!(slot, Cell::Int(9));
    }

    #[test]
    fn min_max() {
        let mut lo = Cell::Null(Affinity::Text);
        let mut hi = Cell::Null(Affinity::Text);
        for v in ["b", "a", "c"] {
            min(&mut lo, &Cell::from(v)).unwrap();
            max(&mut hi, &Cell::from(v)).unwrap();
        }
        min(&mut lo, &Cell::Null(Affinity::Text)).unwrap();
        assert_eq!(lo, Cell::from("a"));
        assert_eq!(hi, Cell::from("c"));
    }

    #[test]
    fn min_of_keeps_first_tie() {
        let mut slots = [Cell::Null(Affinity::Int), Cell::Null(Affinity::Text)];
        for (k, v) in [(2, "a"), (1, "b"), (1, "c")] {
            min_of(&mut slots, &Cell::Int(k), &Cell::from(v)).unwrap();
        }
        assert_eq!(slots[1], Cell::from("b"));
    }
}
