// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The physical operator tree and its streaming executors.
//!
//! Like its logical counterpart, `PhysicalPlan` is a closed tagged enum.
//! Cost, output-size and trait derivation are methods over the enum driven
//! by a [`PlannerContext`]; `execute` turns a node into a lazy record
//! stream under a [`QueryContext`].
//!
//! [`PlannerContext`]: crate::planner::PlannerContext
//! [`QueryContext`]: crate::execution::QueryContext

pub mod aggregate;
pub mod dml;
pub mod fetch;
pub mod filter;
pub mod function;
pub mod knn;
pub mod limit;
pub mod merge;
pub mod projection;
pub mod scan;
pub mod sort;
pub mod stream;
pub mod subselect;

use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::binding::{Binding, GroupId};
use crate::cost::Cost;
use crate::error::{QueryError, Result};
use crate::execution::QueryContext;
use crate::logical_plan::{
    aggregate_column, count_column, dml_columns, exists_column, AggregateFunction, FunctionExpr,
};
use crate::model::{ColumnDef, Name};
use crate::planner::PlannerContext;
use crate::predicate::{digest_of, BooleanPredicate, Predicate, ProximityPredicate};
use crate::scalar::Value;
use crate::statistics::NaiveSelectivityCalculator;
use crate::traits::{Order, SortOrder, TraitSet};
use stream::{CancellableStream, SendableRecordStream};

/// Which slice of its source a partitioned node reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionSpec {
    pub index: usize,
    pub of: usize,
}

/// Partition copies receive groups offset by this stride from their
/// original group, keeping sibling ids distinct from binder-assigned ones.
const PARTITION_GROUP_STRIDE: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityScanExec {
    pub entity: Name,
    pub columns: Vec<ColumnDef>,
    pub partition: Option<PartitionSpec>,
    pub group: GroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntitySampleExec {
    pub entity: Name,
    pub columns: Vec<ColumnDef>,
    pub probability: OrderedFloat<f64>,
    pub seed: u64,
    pub partition: Option<PartitionSpec>,
    pub group: GroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexScanExec {
    pub entity: Name,
    pub index: Name,
    pub predicate: Predicate,
    /// The columns the index produces for this predicate.
    pub columns: Vec<ColumnDef>,
    /// The traits the index guarantees for this predicate.
    pub index_traits: TraitSet,
    pub partition: Option<PartitionSpec>,
    pub group: GroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchExec {
    pub input: Arc<PhysicalPlan>,
    pub entity: Name,
    pub fetch: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterExec {
    pub input: Arc<PhysicalPlan>,
    pub predicate: BooleanPredicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubqueryExec {
    pub group: GroupId,
    pub plan: Arc<PhysicalPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterOnSubSelectExec {
    pub input: Arc<PhysicalPlan>,
    pub predicate: BooleanPredicate,
    pub subqueries: Vec<SubqueryExec>,
}

/// Brute-force proximity selection, the scan-side alternative to a
/// proximity index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KnnExec {
    pub input: Arc<PhysicalPlan>,
    pub predicate: ProximityPredicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectExec {
    pub input: Arc<PhysicalPlan>,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectDistinctExec {
    pub input: Arc<PhysicalPlan>,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountExec {
    pub input: Arc<PhysicalPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountEntityExec {
    pub entity: Name,
    pub group: GroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExistsExec {
    pub input: Arc<PhysicalPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateExec {
    pub input: Arc<PhysicalPlan>,
    pub function: AggregateFunction,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionExec {
    pub input: Arc<PhysicalPlan>,
    pub function: FunctionExpr,
    pub out: ColumnDef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimitExec {
    pub input: Arc<PhysicalPlan>,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SkipExec {
    pub input: Arc<PhysicalPlan>,
    pub skip: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortExec {
    pub input: Arc<PhysicalPlan>,
    pub order: Order,
}

/// Re-unifies partitioned siblings. With an order, performs a k-way,
/// order-preserving heap merge; without one, interleaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeExec {
    pub inputs: Vec<Arc<PhysicalPlan>>,
    pub order: Option<Order>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeLimitingSortExec {
    pub inputs: Vec<Arc<PhysicalPlan>>,
    pub order: Order,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsertExec {
    pub entity: Name,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
    pub group: GroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateExec {
    pub input: Arc<PhysicalPlan>,
    pub entity: Name,
    pub assignments: Vec<(ColumnDef, Binding)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteExec {
    pub input: Arc<PhysicalPlan>,
    pub entity: Name,
}

/// A physical operator node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhysicalPlan {
    EntityScan(EntityScanExec),
    EntitySample(EntitySampleExec),
    IndexScan(IndexScanExec),
    Fetch(FetchExec),
    Filter(FilterExec),
    FilterOnSubSelect(FilterOnSubSelectExec),
    Knn(KnnExec),
    Select(SelectExec),
    SelectDistinct(SelectDistinctExec),
    Count(CountExec),
    CountEntity(CountEntityExec),
    Exists(ExistsExec),
    Aggregate(AggregateExec),
    Function(FunctionExec),
    Limit(LimitExec),
    Skip(SkipExec),
    Sort(SortExec),
    Merge(MergeExec),
    MergeLimitingSort(MergeLimitingSortExec),
    Insert(InsertExec),
    Update(UpdateExec),
    Delete(DeleteExec),
}

impl PhysicalPlan {
    /// The direct inputs of this node, subqueries and merge members
    /// included.
    pub fn inputs(&self) -> Vec<&Arc<PhysicalPlan>> {
        match self {
            PhysicalPlan::EntityScan(_)
            | PhysicalPlan::EntitySample(_)
            | PhysicalPlan::IndexScan(_)
            | PhysicalPlan::CountEntity(_)
            | PhysicalPlan::Insert(_) => vec![],
            PhysicalPlan::Fetch(n) => vec![&n.input],
            PhysicalPlan::Filter(n) => vec![&n.input],
            PhysicalPlan::FilterOnSubSelect(n) => {
                let mut inputs = vec![&n.input];
                inputs.extend(n.subqueries.iter().map(|s| &s.plan));
                inputs
            }
            PhysicalPlan::Knn(n) => vec![&n.input],
            PhysicalPlan::Select(n) => vec![&n.input],
            PhysicalPlan::SelectDistinct(n) => vec![&n.input],
            PhysicalPlan::Count(n) => vec![&n.input],
            PhysicalPlan::Exists(n) => vec![&n.input],
            PhysicalPlan::Aggregate(n) => vec![&n.input],
            PhysicalPlan::Function(n) => vec![&n.input],
            PhysicalPlan::Limit(n) => vec![&n.input],
            PhysicalPlan::Skip(n) => vec![&n.input],
            PhysicalPlan::Sort(n) => vec![&n.input],
            PhysicalPlan::Merge(n) => n.inputs.iter().collect(),
            PhysicalPlan::MergeLimitingSort(n) => n.inputs.iter().collect(),
            PhysicalPlan::Update(n) => vec![&n.input],
            PhysicalPlan::Delete(n) => vec![&n.input],
        }
    }

    /// The columns this node emits.
    pub fn columns(&self) -> Vec<ColumnDef> {
        match self {
            PhysicalPlan::EntityScan(n) => n.columns.clone(),
            PhysicalPlan::EntitySample(n) => n.columns.clone(),
            PhysicalPlan::IndexScan(n) => n.columns.clone(),
            PhysicalPlan::Fetch(n) => {
                let mut columns = n.input.columns();
                columns.extend(n.fetch.clone());
                columns
            }
            PhysicalPlan::Filter(n) => n.input.columns(),
            PhysicalPlan::FilterOnSubSelect(n) => n.input.columns(),
            PhysicalPlan::Knn(n) => {
                let mut columns = n.input.columns();
                columns.push(n.predicate.distance_column());
                columns
            }
            PhysicalPlan::Select(n) => n.columns.clone(),
            PhysicalPlan::SelectDistinct(n) => n.columns.clone(),
            PhysicalPlan::Count(_) | PhysicalPlan::CountEntity(_) => vec![count_column()],
            PhysicalPlan::Exists(_) => vec![exists_column()],
            PhysicalPlan::Aggregate(n) => n
                .columns
                .iter()
                .map(|c| aggregate_column(n.function, c))
                .collect(),
            PhysicalPlan::Function(n) => {
                let mut columns = n.input.columns();
                columns.push(n.out.clone());
                columns
            }
            PhysicalPlan::Limit(n) => n.input.columns(),
            PhysicalPlan::Skip(n) => n.input.columns(),
            PhysicalPlan::Sort(n) => n.input.columns(),
            PhysicalPlan::Merge(n) => n.inputs[0].columns(),
            PhysicalPlan::MergeLimitingSort(n) => n.inputs[0].columns(),
            PhysicalPlan::Insert(_) | PhysicalPlan::Update(_) | PhysicalPlan::Delete(_) => {
                dml_columns()
            }
        }
    }

    /// The columns this node reads from its input records. Sources report
    /// their physical columns here.
    pub fn requires(&self) -> Vec<ColumnDef> {
        match self {
            PhysicalPlan::EntityScan(n) => n.columns.clone(),
            PhysicalPlan::EntitySample(n) => n.columns.clone(),
            PhysicalPlan::IndexScan(n) => n.predicate.columns(),
            PhysicalPlan::Filter(n) => n.predicate.columns(),
            PhysicalPlan::FilterOnSubSelect(n) => n.predicate.columns(),
            PhysicalPlan::Knn(n) => vec![n.predicate.query().column.clone()],
            PhysicalPlan::Select(n) => n.columns.clone(),
            PhysicalPlan::SelectDistinct(n) => n.columns.clone(),
            PhysicalPlan::Aggregate(n) => n.columns.clone(),
            PhysicalPlan::Function(n) => n.function.columns(),
            PhysicalPlan::Sort(n) => n.order.iter().map(|(c, _)| c.clone()).collect(),
            PhysicalPlan::MergeLimitingSort(n) => {
                n.order.iter().map(|(c, _)| c.clone()).collect()
            }
            PhysicalPlan::Update(n) => {
                let mut columns = vec![];
                for (_, binding) in &n.assignments {
                    columns.extend(binding.columns());
                }
                columns
            }
            _ => vec![],
        }
    }

    /// The traits of this node, combined with its input traits.
    pub fn traits(&self) -> TraitSet {
        match self {
            PhysicalPlan::EntityScan(_)
            | PhysicalPlan::EntitySample(_)
            | PhysicalPlan::CountEntity(_) => TraitSet::new(),
            PhysicalPlan::IndexScan(n) => n.index_traits.clone(),
            PhysicalPlan::Fetch(n) => TraitSet::inherit(&n.input.traits()),
            // A filter may discard records before an upstream bound is
            // reached, so the limit no longer holds.
            PhysicalPlan::Filter(n) => TraitSet::inherit(&n.input.traits()).without_limit(),
            PhysicalPlan::FilterOnSubSelect(n) => TraitSet::inherit(&n.input.traits())
                .without_limit()
                .not_partitionable(),
            PhysicalPlan::Knn(n) => {
                let direction = if n.predicate.is_nearest() {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                };
                let mut traits = TraitSet::new()
                    .with_order(vec![(n.predicate.distance_column(), direction)])
                    .with_limit(n.predicate.k());
                traits.not_partitionable = n.input.traits().not_partitionable;
                traits
            }
            PhysicalPlan::Select(n) => {
                let mut traits = TraitSet::inherit(&n.input.traits());
                // Order entries over projected-away columns are meaningless
                // downstream.
                if let Some(order) = traits.order.take() {
                    let kept: Order = order
                        .into_iter()
                        .filter(|(c, _)| n.columns.contains(c))
                        .collect();
                    if !kept.is_empty() {
                        traits.order = Some(kept);
                    }
                }
                traits
            }
            PhysicalPlan::SelectDistinct(n) => TraitSet::inherit(&n.input.traits())
                .without_order()
                .without_limit(),
            PhysicalPlan::Count(n) => {
                let mut traits = TraitSet::new().with_limit(1);
                traits.not_partitionable = n.input.traits().not_partitionable;
                traits
            }
            PhysicalPlan::Exists(n) => {
                let mut traits = TraitSet::new().with_limit(1);
                traits.not_partitionable = n.input.traits().not_partitionable;
                traits
            }
            PhysicalPlan::Aggregate(n) => {
                let mut traits = TraitSet::new().with_limit(1);
                traits.not_partitionable = n.input.traits().not_partitionable;
                traits
            }
            PhysicalPlan::Function(n) => TraitSet::inherit(&n.input.traits()),
            PhysicalPlan::Limit(n) => {
                let traits = TraitSet::inherit(&n.input.traits());
                let limit = traits.limit.map(|l| l.min(n.limit)).unwrap_or(n.limit);
                traits.with_limit(limit).not_partitionable()
            }
            PhysicalPlan::Skip(n) => TraitSet::inherit(&n.input.traits())
                .without_limit()
                .not_partitionable(),
            PhysicalPlan::Sort(n) => TraitSet::inherit(&n.input.traits())
                .with_order(n.order.clone()),
            PhysicalPlan::Merge(n) => {
                let mut traits = TraitSet::new().not_partitionable();
                traits.order = n.order.clone();
                traits
            }
            PhysicalPlan::MergeLimitingSort(n) => TraitSet::new()
                .with_order(n.order.clone())
                .with_limit(n.limit)
                .not_partitionable(),
            PhysicalPlan::Insert(_) | PhysicalPlan::Update(_) | PhysicalPlan::Delete(_) => {
                TraitSet::new().not_partitionable()
            }
        }
    }

    /// Estimated number of emitted records.
    pub fn output_size(&self, ctx: &PlannerContext) -> u64 {
        match self {
            PhysicalPlan::EntityScan(n) => {
                partitioned(ctx.row_count(&n.entity), n.partition)
            }
            PhysicalPlan::EntitySample(n) => {
                (partitioned(ctx.row_count(&n.entity), n.partition) as f64 * n.probability.0)
                    .round() as u64
            }
            PhysicalPlan::IndexScan(n) => {
                let rows = partitioned(ctx.row_count(&n.entity), n.partition);
                let estimate = match &n.predicate {
                    Predicate::Proximity(p) => p.k().min(rows),
                    Predicate::Boolean(p) => {
                        let statistics = ctx.statistics(&n.entity, p);
                        NaiveSelectivityCalculator::estimate(p, &statistics).apply(rows)
                    }
                };
                match n.index_traits.limit {
                    Some(limit) => estimate.min(limit),
                    None => estimate,
                }
            }
            PhysicalPlan::Fetch(n) => n.input.output_size(ctx),
            PhysicalPlan::Filter(n) => {
                let rows = n.input.output_size(ctx);
                let statistics = ctx.statistics_for(&n.predicate);
                NaiveSelectivityCalculator::estimate(&n.predicate, &statistics).apply(rows)
            }
            PhysicalPlan::FilterOnSubSelect(n) => {
                let rows = n.input.output_size(ctx);
                let statistics = ctx.statistics_for(&n.predicate);
                NaiveSelectivityCalculator::estimate(&n.predicate, &statistics).apply(rows)
            }
            PhysicalPlan::Knn(n) => n.predicate.k().min(n.input.output_size(ctx)),
            PhysicalPlan::Select(n) => n.input.output_size(ctx),
            PhysicalPlan::SelectDistinct(n) => n.input.output_size(ctx),
            PhysicalPlan::Count(_)
            | PhysicalPlan::CountEntity(_)
            | PhysicalPlan::Exists(_)
            | PhysicalPlan::Aggregate(_) => 1,
            PhysicalPlan::Function(n) => n.input.output_size(ctx),
            PhysicalPlan::Limit(n) => n.limit.min(n.input.output_size(ctx)),
            PhysicalPlan::Skip(n) => n.input.output_size(ctx).saturating_sub(n.skip),
            PhysicalPlan::Sort(n) => n.input.output_size(ctx),
            PhysicalPlan::Merge(n) => n.inputs.iter().map(|i| i.output_size(ctx)).sum(),
            PhysicalPlan::MergeLimitingSort(n) => n
                .limit
                .min(n.inputs.iter().map(|i| i.output_size(ctx)).sum()),
            PhysicalPlan::Insert(n) => n.rows.len() as u64,
            PhysicalPlan::Update(n) => n.input.output_size(ctx),
            PhysicalPlan::Delete(n) => n.input.output_size(ctx),
        }
    }

    /// This node's own cost, excluding its inputs.
    pub fn cost(&self, ctx: &PlannerContext) -> Cost {
        let policy = ctx.policy();
        let rows = self.output_size(ctx) as f64;
        let width = row_width(&self.columns()) as f64;
        match self {
            PhysicalPlan::EntityScan(n) => {
                let scanned = partitioned(ctx.row_count(&n.entity), n.partition) as f64;
                Cost::new(
                    scanned * width * policy.cost_disk_access_read,
                    scanned * policy.cost_memory_access,
                    width,
                    0.0,
                )
            }
            // Sampling still reads every record of its slice.
            PhysicalPlan::EntitySample(n) => {
                let scanned = partitioned(ctx.row_count(&n.entity), n.partition) as f64;
                Cost::new(
                    scanned * width * policy.cost_disk_access_read,
                    scanned * policy.cost_memory_access,
                    width,
                    0.0,
                )
            }
            PhysicalPlan::IndexScan(n) => ctx
                .index_cost(&n.entity, &n.index, &n.predicate)
                .unwrap_or(Cost::INVALID),
            PhysicalPlan::Fetch(n) => {
                let fetched = row_width(&n.fetch) as f64;
                Cost::new(rows * fetched * policy.cost_disk_access_read, 0.0, fetched, 0.0)
            }
            PhysicalPlan::Filter(n) => {
                let input = n.input.output_size(ctx) as f64;
                let atomics = n.predicate.atomics().len() as f64;
                Cost::new(0.0, input * atomics * policy.cost_memory_access, 0.0, 0.0)
            }
            PhysicalPlan::FilterOnSubSelect(n) => {
                let input = n.input.output_size(ctx) as f64;
                let atomics = n.predicate.atomics().len() as f64;
                Cost::new(0.0, input * atomics * policy.cost_memory_access, 0.0, 0.0)
            }
            PhysicalPlan::Knn(n) => {
                let input = n.input.output_size(ctx) as f64;
                let dims = n.predicate.query().column.ty.logical_size() as f64;
                Cost::new(
                    0.0,
                    input * 3.0 * dims * policy.cost_flop,
                    n.predicate.k() as f64 * width,
                    0.0,
                )
            }
            PhysicalPlan::Select(_) => {
                Cost::new(0.0, rows * policy.cost_memory_access, 0.0, 0.0)
            }
            PhysicalPlan::SelectDistinct(n) => {
                let input = n.input.output_size(ctx) as f64;
                Cost::new(0.0, input * policy.cost_memory_access, input * width, 0.0)
            }
            PhysicalPlan::Count(n) => {
                let input = n.input.output_size(ctx) as f64;
                Cost::new(0.0, input * policy.cost_memory_access, 0.0, 0.0)
            }
            PhysicalPlan::Exists(n) => {
                let input = n.input.output_size(ctx) as f64;
                Cost::new(0.0, input * policy.cost_memory_access, 0.0, 0.0)
            }
            PhysicalPlan::CountEntity(_) => {
                Cost::new(policy.cost_disk_access_read, 0.0, 0.0, 0.0)
            }
            PhysicalPlan::Aggregate(n) => {
                let input = n.input.output_size(ctx) as f64;
                let columns = n.columns.len() as f64;
                Cost::new(0.0, input * columns * policy.cost_flop, 0.0, 0.0)
            }
            PhysicalPlan::Function(n) => {
                let input = n.input.output_size(ctx) as f64;
                let flops = ctx.function_flops(&n.function.signature);
                Cost::new(0.0, input * flops * policy.cost_flop, 0.0, 0.0)
            }
            PhysicalPlan::Limit(_) | PhysicalPlan::Skip(_) => {
                Cost::new(0.0, rows * policy.cost_memory_access, 0.0, 0.0)
            }
            PhysicalPlan::Sort(n) => {
                let input = n.input.output_size(ctx) as f64;
                let comparisons = input * input.max(2.0).log2();
                Cost::new(
                    0.0,
                    comparisons * policy.cost_memory_access,
                    input * width,
                    0.0,
                )
            }
            PhysicalPlan::Merge(n) => {
                let input: u64 = n.inputs.iter().map(|i| i.output_size(ctx)).sum();
                Cost::new(0.0, input as f64 * policy.cost_memory_access, 0.0, 0.0)
            }
            PhysicalPlan::MergeLimitingSort(n) => {
                let input: u64 = n.inputs.iter().map(|i| i.output_size(ctx)).sum();
                let comparisons = input as f64 * (n.limit.max(2) as f64).log2();
                Cost::new(
                    0.0,
                    comparisons * policy.cost_memory_access,
                    n.limit as f64 * width,
                    0.0,
                )
            }
            PhysicalPlan::Insert(n) => {
                let written = row_width(&n.columns) as f64;
                Cost::new(rows * written * policy.cost_disk_access_write, 0.0, 0.0, 0.0)
            }
            PhysicalPlan::Update(n) => {
                let input = n.input.output_size(ctx) as f64;
                let written = row_width(
                    &n.assignments.iter().map(|(c, _)| c.clone()).collect::<Vec<_>>(),
                ) as f64;
                Cost::new(input * written * policy.cost_disk_access_write, 0.0, 0.0, 0.0)
            }
            PhysicalPlan::Delete(n) => {
                let input = n.input.output_size(ctx) as f64;
                Cost::new(input * policy.cost_disk_access_write, 0.0, 0.0, 0.0)
            }
        }
    }

    /// Accumulated cost of this node and everything beneath it.
    pub fn total_cost(&self, ctx: &PlannerContext) -> Cost {
        self.inputs()
            .iter()
            .map(|i| i.total_cost(ctx))
            .fold(self.cost(ctx), |a, b| a + b)
    }

    /// The cost of the partitionable share of this subtree, the input to
    /// the parallelisation estimate.
    pub fn parallelisable_cost(&self, ctx: &PlannerContext) -> Cost {
        let own = if self.traits().not_partitionable {
            Cost::ZERO
        } else {
            self.cost(ctx)
        };
        self.inputs()
            .iter()
            .map(|i| i.parallelisable_cost(ctx))
            .fold(own, |a, b| a + b)
    }

    /// Create the `index`-th of `partitions` sibling copies of this
    /// subtree. Fails on subtrees that carry the not-partitionable trait.
    pub fn partition(&self, partitions: usize, index: usize) -> Result<PhysicalPlan> {
        if self.traits().not_partitionable {
            return Err(QueryError::NotSupported(format!(
                "{} cannot be partitioned",
                self.name()
            )));
        }
        let spec = PartitionSpec {
            index,
            of: partitions,
        };
        self.partition_inner(spec)
    }

    fn partition_inner(&self, spec: PartitionSpec) -> Result<PhysicalPlan> {
        let sibling_group = |group: GroupId| {
            GroupId(group.0 * PARTITION_GROUP_STRIDE + 1 + spec.index as u32)
        };
        Ok(match self {
            PhysicalPlan::EntityScan(n) => PhysicalPlan::EntityScan(EntityScanExec {
                partition: Some(spec),
                group: sibling_group(n.group),
                ..n.clone()
            }),
            PhysicalPlan::EntitySample(n) => PhysicalPlan::EntitySample(EntitySampleExec {
                partition: Some(spec),
                group: sibling_group(n.group),
                ..n.clone()
            }),
            PhysicalPlan::IndexScan(n) => PhysicalPlan::IndexScan(IndexScanExec {
                partition: Some(spec),
                group: sibling_group(n.group),
                ..n.clone()
            }),
            PhysicalPlan::CountEntity(_) | PhysicalPlan::Insert(_) => {
                return Err(QueryError::NotSupported(format!(
                    "{} cannot be partitioned",
                    self.name()
                )))
            }
            other => {
                let mut inputs = vec![];
                for input in other.inputs() {
                    inputs.push(Arc::new(input.partition_inner(spec)?));
                }
                with_inputs(other, &inputs)?
            }
        })
    }

    /// Stable structural digest.
    pub fn digest(&self) -> u64 {
        digest_of(self)
    }

    /// Convert this node into its streaming executor.
    pub fn execute(&self, ctx: &QueryContext) -> Result<SendableRecordStream> {
        let stream = match self {
            PhysicalPlan::EntityScan(n) => scan::execute_scan(n, ctx)?,
            PhysicalPlan::EntitySample(n) => scan::execute_sample(n, ctx)?,
            PhysicalPlan::IndexScan(n) => scan::execute_index_scan(n, ctx)?,
            PhysicalPlan::Fetch(n) => fetch::execute(n, ctx)?,
            PhysicalPlan::Filter(n) => filter::execute(n, ctx)?,
            PhysicalPlan::FilterOnSubSelect(n) => subselect::execute(n, ctx)?,
            PhysicalPlan::Knn(n) => knn::execute(n, ctx)?,
            PhysicalPlan::Select(n) => projection::execute_select(n, ctx)?,
            PhysicalPlan::SelectDistinct(n) => projection::execute_distinct(n, ctx)?,
            PhysicalPlan::Count(n) => aggregate::execute_count(n, ctx)?,
            PhysicalPlan::CountEntity(n) => aggregate::execute_count_entity(n, ctx)?,
            PhysicalPlan::Exists(n) => aggregate::execute_exists(n, ctx)?,
            PhysicalPlan::Aggregate(n) => aggregate::execute(n, ctx)?,
            PhysicalPlan::Function(n) => function::execute(n, ctx)?,
            PhysicalPlan::Limit(n) => limit::execute_limit(n, ctx)?,
            PhysicalPlan::Skip(n) => limit::execute_skip(n, ctx)?,
            PhysicalPlan::Sort(n) => sort::execute(n, ctx)?,
            PhysicalPlan::Merge(n) => merge::execute(n, ctx)?,
            PhysicalPlan::MergeLimitingSort(n) => merge::execute_limiting_sort(n, ctx)?,
            PhysicalPlan::Insert(n) => dml::execute_insert(n, ctx)?,
            PhysicalPlan::Update(n) => dml::execute_update(n, ctx)?,
            PhysicalPlan::Delete(n) => dml::execute_delete(n, ctx)?,
        };
        Ok(CancellableStream::wrap(stream, ctx.txn.cancellation()))
    }

    /// The operator name used in plan displays.
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalPlan::EntityScan(_) => "EntityScanExec",
            PhysicalPlan::EntitySample(_) => "EntitySampleExec",
            PhysicalPlan::IndexScan(_) => "IndexScanExec",
            PhysicalPlan::Fetch(_) => "FetchExec",
            PhysicalPlan::Filter(_) => "FilterExec",
            PhysicalPlan::FilterOnSubSelect(_) => "FilterOnSubSelectExec",
            PhysicalPlan::Knn(_) => "KnnExec",
            PhysicalPlan::Select(_) => "SelectExec",
            PhysicalPlan::SelectDistinct(_) => "SelectDistinctExec",
            PhysicalPlan::Count(_) => "CountExec",
            PhysicalPlan::CountEntity(_) => "CountEntityExec",
            PhysicalPlan::Exists(_) => "ExistsExec",
            PhysicalPlan::Aggregate(_) => "AggregateExec",
            PhysicalPlan::Function(_) => "FunctionExec",
            PhysicalPlan::Limit(_) => "LimitExec",
            PhysicalPlan::Skip(_) => "SkipExec",
            PhysicalPlan::Sort(_) => "SortExec",
            PhysicalPlan::Merge(_) => "MergeExec",
            PhysicalPlan::MergeLimitingSort(_) => "MergeLimitingSortExec",
            PhysicalPlan::Insert(_) => "InsertExec",
            PhysicalPlan::Update(_) => "UpdateExec",
            PhysicalPlan::Delete(_) => "DeleteExec",
        }
    }
}

fn partitioned(rows: u64, partition: Option<PartitionSpec>) -> u64 {
    match partition {
        Some(spec) => rows.div_ceil(spec.of as u64),
        None => rows,
    }
}

fn row_width(columns: &[ColumnDef]) -> usize {
    columns.iter().map(|c| c.ty.physical_size()).sum()
}

/// Rebuild a node over new inputs.
pub fn with_inputs(plan: &PhysicalPlan, inputs: &[Arc<PhysicalPlan>]) -> Result<PhysicalPlan> {
    let expected = plan.inputs().len();
    if inputs.len() != expected {
        return Err(QueryError::Internal(format!(
            "{} expects {} inputs, got {}",
            plan.name(),
            expected,
            inputs.len()
        )));
    }
    Ok(match plan {
        PhysicalPlan::EntityScan(_)
        | PhysicalPlan::EntitySample(_)
        | PhysicalPlan::IndexScan(_)
        | PhysicalPlan::CountEntity(_)
        | PhysicalPlan::Insert(_) => plan.clone(),
        PhysicalPlan::Fetch(n) => PhysicalPlan::Fetch(FetchExec {
            input: inputs[0].clone(),
            entity: n.entity.clone(),
            fetch: n.fetch.clone(),
        }),
        PhysicalPlan::Filter(n) => PhysicalPlan::Filter(FilterExec {
            input: inputs[0].clone(),
            predicate: n.predicate.clone(),
        }),
        PhysicalPlan::FilterOnSubSelect(n) => {
            PhysicalPlan::FilterOnSubSelect(FilterOnSubSelectExec {
                input: inputs[0].clone(),
                predicate: n.predicate.clone(),
                subqueries: n
                    .subqueries
                    .iter()
                    .zip(inputs[1..].iter())
                    .map(|(subquery, plan)| SubqueryExec {
                        group: subquery.group,
                        plan: plan.clone(),
                    })
                    .collect(),
            })
        }
        PhysicalPlan::Knn(n) => PhysicalPlan::Knn(KnnExec {
            input: inputs[0].clone(),
            predicate: n.predicate.clone(),
        }),
        PhysicalPlan::Select(n) => PhysicalPlan::Select(SelectExec {
            input: inputs[0].clone(),
            columns: n.columns.clone(),
        }),
        PhysicalPlan::SelectDistinct(n) => PhysicalPlan::SelectDistinct(SelectDistinctExec {
            input: inputs[0].clone(),
            columns: n.columns.clone(),
        }),
        PhysicalPlan::Count(_) => PhysicalPlan::Count(CountExec {
            input: inputs[0].clone(),
        }),
        PhysicalPlan::Exists(_) => PhysicalPlan::Exists(ExistsExec {
            input: inputs[0].clone(),
        }),
        PhysicalPlan::Aggregate(n) => PhysicalPlan::Aggregate(AggregateExec {
            input: inputs[0].clone(),
            function: n.function,
            columns: n.columns.clone(),
        }),
        PhysicalPlan::Function(n) => PhysicalPlan::Function(FunctionExec {
            input: inputs[0].clone(),
            function: n.function.clone(),
            out: n.out.clone(),
        }),
        PhysicalPlan::Limit(n) => PhysicalPlan::Limit(LimitExec {
            input: inputs[0].clone(),
            limit: n.limit,
        }),
        PhysicalPlan::Skip(n) => PhysicalPlan::Skip(SkipExec {
            input: inputs[0].clone(),
            skip: n.skip,
        }),
        PhysicalPlan::Sort(n) => PhysicalPlan::Sort(SortExec {
            input: inputs[0].clone(),
            order: n.order.clone(),
        }),
        PhysicalPlan::Merge(n) => PhysicalPlan::Merge(MergeExec {
            inputs: inputs.to_vec(),
            order: n.order.clone(),
        }),
        PhysicalPlan::MergeLimitingSort(n) => {
            PhysicalPlan::MergeLimitingSort(MergeLimitingSortExec {
                inputs: inputs.to_vec(),
                order: n.order.clone(),
                limit: n.limit,
            })
        }
        PhysicalPlan::Update(n) => PhysicalPlan::Update(UpdateExec {
            input: inputs[0].clone(),
            entity: n.entity.clone(),
            assignments: n.assignments.clone(),
        }),
        PhysicalPlan::Delete(n) => PhysicalPlan::Delete(DeleteExec {
            input: inputs[0].clone(),
            entity: n.entity.clone(),
        }),
    })
}

fn fmt_exec(plan: &PhysicalPlan, f: &mut fmt::Formatter, indent: usize) -> fmt::Result {
    if indent > 0 {
        writeln!(f)?;
        write!(f, "{}", "  ".repeat(indent))?;
    }
    let partition = |p: &Option<PartitionSpec>| match p {
        Some(spec) => format!(" partition={}/{}", spec.index, spec.of),
        None => String::new(),
    };
    match plan {
        PhysicalPlan::EntityScan(n) => {
            let names: Vec<&str> = n.columns.iter().map(|c| c.simple_name()).collect();
            write!(
                f,
                "EntityScanExec: {} [{}]{}",
                n.entity,
                names.join(", "),
                partition(&n.partition)
            )?
        }
        PhysicalPlan::EntitySample(n) => write!(
            f,
            "EntitySampleExec: {} p={} seed={}{}",
            n.entity,
            n.probability,
            n.seed,
            partition(&n.partition)
        )?,
        PhysicalPlan::IndexScan(n) => write!(
            f,
            "IndexScanExec: {} predicate={}{}",
            n.index,
            n.predicate,
            partition(&n.partition)
        )?,
        PhysicalPlan::Fetch(n) => {
            let names: Vec<&str> = n.fetch.iter().map(|c| c.simple_name()).collect();
            write!(f, "FetchExec: [{}]", names.join(", "))?
        }
        PhysicalPlan::Filter(n) => write!(f, "FilterExec: {}", n.predicate)?,
        PhysicalPlan::FilterOnSubSelect(n) => {
            write!(f, "FilterOnSubSelectExec: {}", n.predicate)?
        }
        PhysicalPlan::Knn(n) => write!(f, "KnnExec: {}", n.predicate)?,
        PhysicalPlan::Select(n) => {
            let names: Vec<&str> = n.columns.iter().map(|c| c.simple_name()).collect();
            write!(f, "SelectExec: [{}]", names.join(", "))?
        }
        PhysicalPlan::SelectDistinct(n) => {
            let names: Vec<&str> = n.columns.iter().map(|c| c.simple_name()).collect();
            write!(f, "SelectDistinctExec: [{}]", names.join(", "))?
        }
        PhysicalPlan::Count(_) => write!(f, "CountExec")?,
        PhysicalPlan::CountEntity(n) => write!(f, "CountEntityExec: {}", n.entity)?,
        PhysicalPlan::Exists(_) => write!(f, "ExistsExec")?,
        PhysicalPlan::Aggregate(n) => {
            let names: Vec<&str> = n.columns.iter().map(|c| c.simple_name()).collect();
            write!(f, "AggregateExec: {}([{}])", n.function.name(), names.join(", "))?
        }
        PhysicalPlan::Function(n) => write!(
            f,
            "FunctionExec: {} -> {}",
            n.function.signature,
            n.out.simple_name()
        )?,
        PhysicalPlan::Limit(n) => write!(f, "LimitExec: {}", n.limit)?,
        PhysicalPlan::Skip(n) => write!(f, "SkipExec: {}", n.skip)?,
        PhysicalPlan::Sort(n) => {
            let order: Vec<String> = n
                .order
                .iter()
                .map(|(c, o)| format!("{} {}", c.simple_name(), o))
                .collect();
            write!(f, "SortExec: [{}]", order.join(", "))?
        }
        PhysicalPlan::Merge(n) => match &n.order {
            Some(order) => {
                let order: Vec<String> = order
                    .iter()
                    .map(|(c, o)| format!("{} {}", c.simple_name(), o))
                    .collect();
                write!(f, "MergeExec: order=[{}]", order.join(", "))?
            }
            None => write!(f, "MergeExec")?,
        },
        PhysicalPlan::MergeLimitingSort(n) => {
            let order: Vec<String> = n
                .order
                .iter()
                .map(|(c, o)| format!("{} {}", c.simple_name(), o))
                .collect();
            write!(
                f,
                "MergeLimitingSortExec: order=[{}] limit={}",
                order.join(", "),
                n.limit
            )?
        }
        PhysicalPlan::Insert(n) => write!(f, "InsertExec: {} rows={}", n.entity, n.rows.len())?,
        PhysicalPlan::Update(n) => write!(f, "UpdateExec: {}", n.entity)?,
        PhysicalPlan::Delete(n) => write!(f, "DeleteExec: {}", n.entity)?,
    }
    for input in plan.inputs() {
        fmt_exec(input, f, indent + 1)?;
    }
    Ok(())
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_exec(self, f, 0)
    }
}
