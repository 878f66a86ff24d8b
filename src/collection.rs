// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! A set of aliased aggregates evaluated together over the same groups.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::ops::Index;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::{Aggregate, WorkRecord};
use crate::error::{Error, Result};
use crate::expr::FieldRefs;
use crate::options::AggregateOptions;
use crate::types::{Affinity, Cell, Row};

/// One column of the evaluated output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub alias: String,
    pub affinity: Affinity,
    /// Whether the affinity has a natural fixed width.
    pub fixed_size: bool,
    pub size: usize,
}

/// One slot of the flattened compound record, as spilled by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterimColumn {
    pub name: String,
    pub affinity: Affinity,
}

/// The running state of a whole collection for one group: one work record per member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompoundRecord(Vec<WorkRecord>);

impl CompoundRecord {
    pub fn new(members: Vec<WorkRecord>) -> Self {
        Self(members)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn members(&self) -> &[WorkRecord] {
        &self.0
    }

    pub fn into_members(self) -> Vec<WorkRecord> {
        self.0
    }

    /// Checks the member count and every member's slot count against `signatures`.
    pub fn check_shape(&self, signatures: &[usize]) -> Result<()> {
        if self.0.len() != signatures.len() {
            warn!(
                expected = signatures.len(),
                actual = self.0.len(),
                "compound record has wrong member count"
            );
            return Err(Error::shape_mismatch(signatures.len(), self.0.len()));
        }
        for (member, (record, &expected)) in self.0.iter().zip(signatures).enumerate() {
            if record.len() != expected {
                warn!(
                    member,
                    expected,
                    actual = record.len(),
                    "work record has wrong slot count"
                );
                return Err(Error::slot_mismatch(member, expected, record.len()));
            }
        }
        Ok(())
    }
}

impl Index<usize> for CompoundRecord {
    type Output = WorkRecord;

    fn index(&self, member: usize) -> &WorkRecord {
        &self.0[member]
    }
}

/// Aliased aggregates sharing one input row shape.
///
/// `Clone` deep-copies every member together with its expressions and filter,
/// so each partition of a parallel aggregation can own its copy.
#[derive(Debug, Clone, Default)]
pub struct AggregateCollection {
    aggs: Vec<(String, Aggregate)>,
    options: AggregateOptions,
}

impl AggregateCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: AggregateOptions) -> Self {
        Self {
            aggs: vec![],
            options,
        }
    }

    pub fn options(&self) -> &AggregateOptions {
        &self.options
    }

    /// Appends a member. Output columns follow push order.
    pub fn push(&mut self, alias: impl Into<String>, agg: Aggregate) -> &mut Self {
        self.aggs.push((alias.into(), agg));
        self
    }

    pub fn len(&self) -> usize {
        self.aggs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Aggregate)> {
        self.aggs.iter().map(|(alias, agg)| (alias.as_str(), agg))
    }

    /// Removes every member, leaving the collection ready for another plan.
    pub fn clear(&mut self) {
        debug!(members = self.aggs.len(), "clearing aggregate collection");
        self.aggs.clear();
    }

    pub fn output_schema(&self) -> Vec<OutputColumn> {
        self.iter()
            .map(|(alias, agg)| {
                let affinity = agg.return_affinity();
                OutputColumn {
                    alias: alias.into(),
                    affinity,
                    fixed_size: affinity.fixed_width().is_some(),
                    size: agg.size(),
                }
            })
            .collect()
    }

    /// The flattened slot layout of a compound record, one column per slot named
    /// `<alias>.<slot>`.
    pub fn interim_schema(&self) -> Vec<InterimColumn> {
        self.iter()
            .flat_map(|(alias, agg)| {
                agg.slot_affinities()
                    .into_iter()
                    .enumerate()
                    .map(move |(slot, affinity)| InterimColumn {
                        name: format!("{alias}.{slot}"),
                        affinity,
                    })
            })
            .collect()
    }

    pub fn signatures(&self) -> Vec<usize> {
        self.aggs.iter().map(|(_, agg)| agg.signature()).collect()
    }

    /// A hash of the compound record layout. Two collections with equal fingerprints
    /// can exchange compound records.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (_, agg) in &self.aggs {
            agg.signature().hash(&mut hasher);
            agg.slot_affinities().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// The union of the input columns read by every member.
    pub fn field_refs(&self) -> FieldRefs {
        self.aggs
            .iter()
            .flat_map(|(_, agg)| agg.field_refs())
            .collect()
    }

    pub fn initialize(&self) -> CompoundRecord {
        CompoundRecord(self.aggs.iter().map(|(_, agg)| agg.initialize()).collect())
    }

    /// Folds one input row into every member.
    ///
    /// The whole record is validated first, so a shape error leaves it untouched.
    /// With `atomic_accumulate`, a data error in any member does too.
    pub fn accumulate(&self, row: &[Cell], record: &mut CompoundRecord) -> Result<()> {
        record.check_shape(&self.signatures())?;
        if !self.options.atomic_accumulate {
            return self.accumulate_members(row, &mut record.0);
        }
        let mut staged = record.0.clone();
        self.accumulate_members(row, &mut staged)?;
        record.0 = staged;
        Ok(())
    }

    fn accumulate_members(&self, row: &[Cell], members: &mut [WorkRecord]) -> Result<()> {
        for (member, ((_, agg), work)) in self.aggs.iter().zip(members).enumerate() {
            agg.accumulate(row, work).map_err(member_error(member))?;
        }
        Ok(())
    }

    /// Combines `source` into `target` member by member.
    ///
    /// `target` is only written once every member merged, so any error leaves it
    /// untouched.
    pub fn merge(&self, source: &CompoundRecord, target: &mut CompoundRecord) -> Result<()> {
        let signatures = self.signatures();
        source.check_shape(&signatures)?;
        target.check_shape(&signatures)?;
        debug!(members = self.aggs.len(), "merging compound records");
        let mut merged = target.0.clone();
        for (member, ((_, agg), (src, dst))) in self
            .aggs
            .iter()
            .zip(source.0.iter().zip(&mut merged))
            .enumerate()
        {
            agg.merge(src, dst).map_err(member_error(member))?;
        }
        target.0 = merged;
        Ok(())
    }

    /// Projects every member into one output row, in alias order.
    pub fn evaluate(&self, record: &CompoundRecord) -> Result<Row> {
        record.check_shape(&self.signatures())?;
        let clamp = self.options.clamp_negative_variance;
        self.aggs
            .iter()
            .zip(&record.0)
            .enumerate()
            .map(|(member, ((_, agg), work))| {
                agg.evaluate_with(work, clamp)
                    .map_err(member_error(member))
            })
            .collect()
    }
}

/// Logs a failing member and attributes slot mismatches to it.
fn member_error(member: usize) -> impl Fn(Error) -> Error {
    move |e| {
        warn!(member, error = %e, "aggregate member failed");
        e.at_member(member)
    }
}
