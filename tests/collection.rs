// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use rollup::{
    Affinity, Aggregate, AggregateCollection, AggregateOptions, BinaryOperator, Cell,
    CompoundRecord, Expr, Filter, Inner, WorkRecord,
};

/// `select count(*), sum(qty), max(price), mean(price), frequency(qty > 5) group by ...`
fn orders() -> AggregateCollection {
    let qty = Expr::input_ref(0, Affinity::Int);
    let price = Expr::input_ref(1, Affinity::Float);
    let large = Filter::predicate(
        Expr::binary(BinaryOperator::Gt, qty.clone(), Expr::constant(5i64)).unwrap(),
    )
    .unwrap();

    let mut aggs = AggregateCollection::with_options(AggregateOptions::default_for_test());
    aggs.push("orders", Aggregate::count_all(qty.clone()))
        .push("qty", Aggregate::sum(qty.clone()).unwrap())
        .push("top_price", Aggregate::max(price.clone()))
        .push("avg_price", Aggregate::mean(price).unwrap())
        .push("large_share", Aggregate::frequency(large));
    aggs
}

fn rows() -> Vec<Vec<Cell>> {
    vec![
        vec![Cell::Int(1), Cell::float(10.0)],
        vec![Cell::Int(8), Cell::float(30.0)],
        vec![Affinity::Int.null(), Cell::float(20.0)],
        vec![Cell::Int(6), Affinity::Float.null()],
    ]
}

#[test]
fn evaluate_in_alias_order() {
    let aggs = orders();
    let mut record = aggs.initialize();
    for row in rows() {
        aggs.accumulate(&row, &mut record).unwrap();
    }
    assert_eq!(
        aggs.evaluate(&record).unwrap(),
        vec![
            Cell::Int(4),
            Cell::Int(15),
            Cell::float(30.0),
            Cell::float(20.0),
            Cell::float(0.5),
        ]
    );
    let aliases = aggs
        .output_schema()
        .into_iter()
        .map(|c| c.alias)
        .collect::<Vec<_>>();
    assert_eq!(aliases, ["orders", "qty", "top_price", "avg_price", "large_share"]);
}

#[test]
fn empty_group() {
    let aggs = orders();
    assert_eq!(
        aggs.evaluate(&aggs.initialize()).unwrap(),
        vec![
            Cell::Int(0),
            Affinity::Int.null(),
            Affinity::Float.null(),
            Affinity::Float.null(),
            Affinity::Float.null(),
        ]
    );
}

#[test]
fn interim_schema_matches_records() {
    let aggs = orders();
    let record = aggs.initialize();
    let slots = record.members().iter().map(WorkRecord::len).sum::<usize>();
    assert_eq!(aggs.interim_schema().len(), slots);
    assert_eq!(aggs.signatures(), vec![1, 1, 1, 3, 2]);
    assert!(record.check_shape(&aggs.signatures()).is_ok());
}

#[test]
fn clones_are_independent() {
    let aggs = orders();
    let mut copy = aggs.clone();
    assert_eq!(copy.fingerprint(), aggs.fingerprint());

    copy.clear();
    assert!(copy.is_empty());
    assert_eq!(aggs.len(), 5);
    assert_eq!(copy.field_refs().len(), 0);
    assert_eq!(aggs.field_refs().into_iter().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn reject_foreign_record() {
    let aggs = orders();
    let mut other = AggregateCollection::new();
    other.push("n", Aggregate::count(Expr::input_ref(0, Affinity::Int)));
    assert_ne!(aggs.fingerprint(), other.fingerprint());

    let mut foreign = other.initialize();
    let err = aggs.accumulate(&rows()[0], &mut foreign).unwrap_err();
    assert_eq!(
        err.kind(),
        &Inner::ShapeMismatch {
            expected: 5,
            actual: 1
        }
    );
    let err = aggs.merge(&foreign, &mut aggs.initialize()).unwrap_err();
    assert!(matches!(err.kind(), Inner::ShapeMismatch { .. }));
}

#[test]
fn reject_resized_member() {
    let aggs = orders();
    let mut members = aggs.initialize().into_members();
    members[3] = WorkRecord::new([Affinity::Float.null()]);
    let mut record = CompoundRecord::new(members);

    let err = aggs.evaluate(&record).unwrap_err();
    assert_eq!(
        err.kind(),
        &Inner::SlotMismatch {
            member: 3,
            expected: 3,
            actual: 1
        }
    );
    // the whole record is validated before any member is touched
    let before = record.clone();
    assert!(aggs.accumulate(&rows()[0], &mut record).is_err());
    assert_eq!(record, before);
}

#[test]
fn engine_options_reject_resized_member_untouched() {
    let mut aggs = AggregateCollection::with_options(AggregateOptions::default_for_engine());
    aggs.push("n", Aggregate::count_all(Expr::input_ref(0, Affinity::Int)))
        .push(
            "cheapest",
            Aggregate::min_of(
                Expr::input_ref(0, Affinity::Int),
                Expr::input_ref(0, Affinity::Int),
            ),
        );
    let mut members = aggs.initialize().into_members();
    members[1] = WorkRecord::new([Affinity::Int.null()]);
    let mut record = CompoundRecord::new(members);
    let before = record.clone();

    let err = aggs.accumulate(&[Cell::Int(1)], &mut record).unwrap_err();
    assert_eq!(
        err.kind(),
        &Inner::SlotMismatch {
            member: 1,
            expected: 2,
            actual: 1
        }
    );
    // the count in member 0 must not have seen the row
    assert_eq!(record, before);
}

fn counted_sum(options: AggregateOptions) -> AggregateCollection {
    let mut aggs = AggregateCollection::with_options(options);
    aggs.push("n", Aggregate::count_all(Expr::input_ref(0, Affinity::Int)))
        .push("total", Aggregate::sum(Expr::input_ref(0, Affinity::Int)).unwrap());
    aggs
}

#[test]
fn failed_merge_leaves_target_untouched() {
    let aggs = counted_sum(AggregateOptions::default_for_engine());
    let mut target = aggs.initialize();
    aggs.accumulate(&[Cell::Int(i64::MAX)], &mut target).unwrap();
    let source = target.clone();
    let before = target.clone();

    let err = aggs.merge(&source, &mut target).unwrap_err();
    assert!(matches!(err.kind(), Inner::Convert(_)));
    assert_eq!(target, before);
    assert_eq!(target[0], WorkRecord::new([Cell::Int(1)]));
}

#[test]
fn atomic_accumulate_rolls_back_data_errors() {
    let aggs = counted_sum(AggregateOptions::default_for_test());
    let mut record = aggs.initialize();
    aggs.accumulate(&[Cell::Int(i64::MAX)], &mut record).unwrap();
    let before = record.clone();

    assert!(aggs.accumulate(&[Cell::Int(1)], &mut record).is_err());
    assert_eq!(record, before);
    assert_eq!(aggs.evaluate(&record).unwrap(), vec![Cell::Int(1), Cell::Int(i64::MAX)]);
}

#[test]
fn options_from_json() {
    let options: AggregateOptions =
        serde_json::from_str(r#"{"atomic_accumulate": true}"#).unwrap();
    assert!(options.atomic_accumulate);
    assert!(options.clamp_negative_variance);
    assert_eq!(
        serde_json::from_str::<AggregateOptions>("{}").unwrap(),
        AggregateOptions::default()
    );
}
