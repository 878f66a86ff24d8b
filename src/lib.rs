// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Combinable aggregation.
//!
//! Aggregates whose partial states, accumulated independently on disjoint
//! partitions of a group, can be merged into the state of the whole group.
//!
//! ```
//! use rollup::{Aggregate, AggregateCollection, Affinity, Cell, Expr};
//!
//! let mut aggs = AggregateCollection::new();
//! aggs.push("total", Aggregate::sum(Expr::input_ref(0, Affinity::Int)).unwrap());
//!
//! let mut left = aggs.initialize();
//! let mut right = aggs.initialize();
//! aggs.accumulate(&[Cell::Int(1)], &mut left).unwrap();
//! aggs.accumulate(&[Cell::Int(2)], &mut right).unwrap();
//! aggs.merge(&right, &mut left).unwrap();
//! assert_eq!(aggs.evaluate(&left).unwrap(), vec![Cell::Int(3)]);
//! ```

#![deny(unused_must_use)]

pub mod aggregate;
pub mod collection;
mod error;
pub mod expr;
mod options;
pub mod types;

pub use self::aggregate::{AggKind, Aggregate, CoStatFunc, StatFunc, WorkRecord};
pub use self::collection::{AggregateCollection, CompoundRecord, InterimColumn, OutputColumn};
pub use self::error::{Error, Inner, Result};
pub use self::expr::{BinaryOperator, Expr, FieldRefs, Filter, UnaryOperator};
pub use self::options::AggregateOptions;
pub use self::types::{Affinity, Cell, ConvertError, Row};
