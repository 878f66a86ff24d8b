// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Partial states accumulated on any partition of the input and merged in any
//! order evaluate to the same row as a single sequential pass.

use proptest::collection::vec;
use proptest::prelude::*;
use rollup::{
    Affinity, Aggregate, AggregateCollection, AggregateOptions, BinaryOperator, Cell,
    CompoundRecord, Expr, Filter, Row, UnaryOperator,
};

fn x() -> Expr {
    Expr::input_ref(0, Affinity::Int)
}

fn y() -> Expr {
    Expr::input_ref(1, Affinity::Int)
}

/// Every order-insensitive aggregate over `(x, y)` rows.
fn commutative() -> AggregateCollection {
    let neg_x = Expr::unary(UnaryOperator::Minus, x()).unwrap();
    let x_above_y =
        Filter::predicate(Expr::binary(BinaryOperator::Gt, x(), y()).unwrap()).unwrap();

    let mut aggs = AggregateCollection::with_options(AggregateOptions::default_for_test());
    aggs.push("count_all", Aggregate::count_all(x()))
        .push("count", Aggregate::count(x()))
        .push("count_null", Aggregate::count_null(y()))
        .push("sum", Aggregate::sum(x()).unwrap())
        .push("min", Aggregate::min(y()))
        .push("max", Aggregate::max(x()))
        // ties carry equal values, so the winner is irrelevant
        .push("min_of", Aggregate::min_of(x(), neg_x))
        .push("mean", Aggregate::mean(x()).unwrap())
        .push("var", Aggregate::variance(y()).unwrap())
        .push("stddev", Aggregate::stddev(x()).unwrap())
        .push(
            "weighted_mean",
            Aggregate::stat(rollup::StatFunc::Mean, x(), Some(y())).unwrap(),
        )
        .push("covar", Aggregate::covariance(x(), y()).unwrap())
        .push("corr", Aggregate::correlation(x(), y()).unwrap())
        .push("slope", Aggregate::slope(x(), y()).unwrap())
        .push("intercept", Aggregate::intercept(x(), y()).unwrap())
        .push(
            "frequency",
            Aggregate::frequency(x_above_y).with_filter(Filter::not_null(x())),
        );
    aggs
}

fn cell(v: Option<i64>) -> Cell {
    v.map_or(Affinity::Int.null(), Cell::Int)
}

fn sequential(aggs: &AggregateCollection, rows: &[Vec<Cell>]) -> Row {
    let mut record = aggs.initialize();
    for row in rows {
        aggs.accumulate(row, &mut record).unwrap();
    }
    aggs.evaluate(&record).unwrap()
}

fn partial(aggs: &AggregateCollection, rows: &[Vec<Cell>]) -> CompoundRecord {
    let mut record = aggs.initialize();
    for row in rows {
        aggs.accumulate(row, &mut record).unwrap();
    }
    record
}

/// Splits `rows` at `cuts`, accumulates every part on its own clone of the
/// collection, then merges the parts in `order`.
fn partitioned(
    aggs: &AggregateCollection,
    rows: &[Vec<Cell>],
    cuts: &[usize],
    order: &[usize],
) -> Row {
    let mut bounds = cuts.iter().map(|&c| c.min(rows.len())).collect::<Vec<_>>();
    bounds.sort_unstable();
    bounds.insert(0, 0);
    bounds.push(rows.len());

    let parts = bounds
        .windows(2)
        .map(|w| partial(&aggs.clone(), &rows[w[0]..w[1]]))
        .collect::<Vec<_>>();

    let mut target = aggs.initialize();
    for &i in order {
        aggs.merge(&parts[i], &mut target).unwrap();
    }
    aggs.evaluate(&target).unwrap()
}

fn dataset() -> Vec<Vec<Cell>> {
    [
        (Some(3), Some(1)),
        (Some(-2), None),
        (None, Some(4)),
        (Some(7), Some(7)),
        (Some(1), Some(-5)),
        (Some(4), Some(2)),
        (None, None),
        (Some(-2), Some(3)),
    ]
    .into_iter()
    .map(|(x, y)| vec![cell(x), cell(y)])
    .collect()
}

#[test]
fn every_split_point() {
    let aggs = commutative();
    let rows = dataset();
    let expected = sequential(&aggs, &rows);
    for cut in 0..=rows.len() {
        assert_eq!(partitioned(&aggs, &rows, &[cut], &[0, 1]), expected, "cut {cut}");
        assert_eq!(partitioned(&aggs, &rows, &[cut], &[1, 0]), expected, "cut {cut}");
    }
}

#[test]
fn one_row_per_partition() {
    let aggs = commutative();
    let rows = dataset();
    let cuts = (1..rows.len()).collect::<Vec<_>>();
    let order = (0..rows.len()).rev().collect::<Vec<_>>();
    assert_eq!(partitioned(&aggs, &rows, &cuts, &order), sequential(&aggs, &rows));
}

#[test]
fn merging_an_empty_state_is_identity() {
    let aggs = commutative();
    let rows = dataset();
    let mut record = partial(&aggs, &rows);
    let before = record.clone();
    aggs.merge(&aggs.initialize(), &mut record).unwrap();
    assert_eq!(record, before);

    let mut empty = aggs.initialize();
    aggs.merge(&before, &mut empty).unwrap();
    assert_eq!(aggs.evaluate(&empty).unwrap(), sequential(&aggs, &rows));
}

#[test]
fn first_follows_merge_order() {
    let mut aggs = AggregateCollection::new();
    aggs.push("first", Aggregate::first(x()));
    let rows = dataset();
    assert_eq!(sequential(&aggs, &rows), vec![Cell::Int(3)]);
    // in partition order it agrees with a sequential pass
    assert_eq!(partitioned(&aggs, &rows, &[2], &[0, 1]), vec![Cell::Int(3)]);
    // reversed, the later partition's first value wins
    assert_eq!(partitioned(&aggs, &rows, &[2], &[1, 0]), vec![Cell::Int(7)]);
}

#[test]
fn min_of_ties_keep_target() {
    let mut aggs = AggregateCollection::new();
    aggs.push("min_of", Aggregate::min_of(x(), y()));
    let rows = vec![
        vec![Cell::Int(1), Cell::Int(10)],
        vec![Cell::Int(1), Cell::Int(20)],
    ];
    assert_eq!(partitioned(&aggs, &rows, &[1], &[0, 1]), vec![Cell::Int(10)]);
    assert_eq!(partitioned(&aggs, &rows, &[1], &[1, 0]), vec![Cell::Int(20)]);
}

#[test]
fn spilled_records_merge_after_reload() {
    let aggs = commutative();
    let rows = dataset();
    let (head, tail) = rows.split_at(3);

    let spilled = serde_json::to_string(&partial(&aggs, head)).unwrap();
    let reloaded: CompoundRecord = serde_json::from_str(&spilled).unwrap();
    assert_eq!(reloaded, partial(&aggs, head));

    let mut target = partial(&aggs, tail);
    aggs.merge(&reloaded, &mut target).unwrap();
    assert_eq!(aggs.evaluate(&target).unwrap(), sequential(&aggs, &rows));
}

fn rows_strategy() -> impl Strategy<Value = Vec<Vec<Cell>>> {
    let value = || prop::option::weighted(0.8, -50i64..50);
    vec((value(), value()), 0..40)
        .prop_map(|pairs| pairs.into_iter().map(|(x, y)| vec![cell(x), cell(y)]).collect())
}

fn partition_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    vec(0usize..40, 0..6).prop_flat_map(|cuts| {
        let order = (0..=cuts.len()).collect::<Vec<_>>();
        (Just(cuts), Just(order).prop_shuffle())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn any_partition_any_order(rows in rows_strategy(), (cuts, order) in partition_strategy()) {
        let aggs = commutative();
        // integer inputs keep every running sum exact, so results match bit for bit
        prop_assert_eq!(partitioned(&aggs, &rows, &cuts, &order), sequential(&aggs, &rows));
    }
}
