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

//! Intra-query partitioning.
//!
//! The planner walks the selected physical tree from the root, descends
//! through operators that must not be split, and partitions the largest
//! partitionable subtree beneath them when the cost policy judges the
//! parallelisable share worth additional workers. The partitions are
//! re-unified by the merge variant the subtree's traits dictate.

use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::physical_plan::{
    with_inputs, LimitExec, MergeExec, MergeLimitingSortExec, PhysicalPlan,
};
use crate::planner::PlannerContext;

/// Partition `plan` where profitable. Returns an equivalent tree; the input
/// tree is returned unchanged when no subtree benefits.
pub fn try_partition(
    plan: &PhysicalPlan,
    ctx: &PlannerContext,
    max_workers: usize,
) -> Result<PhysicalPlan> {
    if plan.traits().not_partitionable {
        // Descend: a subtree below may still be split.
        let mut inputs = vec![];
        for input in plan.inputs() {
            inputs.push(Arc::new(try_partition(input, ctx, max_workers)?));
        }
        return with_inputs(plan, &inputs);
    }

    let parallelisable = plan.parallelisable_cost(ctx);
    let total = plan.total_cost(ctx);
    let workers = ctx
        .policy()
        .parallelisation(&parallelisable, &total, max_workers);
    if workers <= 1 {
        return Ok(plan.clone());
    }
    debug!(
        "partitioning {} into {} workers",
        plan.name(),
        workers
    );

    let traits = plan.traits();
    let mut partitions = Vec::with_capacity(workers);
    for index in 0..workers {
        partitions.push(Arc::new(plan.partition(workers, index)?));
    }

    Ok(match (traits.limit, traits.order) {
        (Some(limit), Some(order)) => PhysicalPlan::MergeLimitingSort(MergeLimitingSortExec {
            inputs: partitions,
            order,
            limit,
        }),
        (Some(limit), None) => PhysicalPlan::Limit(LimitExec {
            input: Arc::new(PhysicalPlan::Merge(MergeExec {
                inputs: partitions,
                order: None,
            })),
            limit,
        }),
        (None, Some(order)) => PhysicalPlan::Merge(MergeExec {
            inputs: partitions,
            order: Some(order),
        }),
        (None, None) => PhysicalPlan::Merge(MergeExec {
            inputs: partitions,
            order: None,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::GroupId;
    use crate::cost::CostPolicy;
    use crate::function::FunctionRegistry;
    use crate::model::{ColumnDef, Name};
    use crate::physical_plan::{EntityScanExec, KnnExec, SkipExec};
    use crate::predicate::{ProximityPredicate, ProximityQuery};
    use crate::scalar::{Type, Value};
    use crate::binding::{Binding, BindingContext};
    use crate::datasource::memory::{MemCatalog, MemEntity};

    /// An aggressive policy that parallelises any CPU work.
    fn eager_policy() -> CostPolicy {
        CostPolicy {
            speedup_per_worker: 1e-9,
            non_parallelisable_io: 0.0,
            cost_memory_access: 1.0,
            ..CostPolicy::default()
        }
    }

    fn big_entity() -> (Arc<MemCatalog>, Name, Vec<ColumnDef>) {
        let name = Name::entity("s", "big").unwrap();
        let columns = vec![ColumnDef::qualified("s", "big", "id", Type::Long).unwrap()];
        let rows = (0..4096).map(|i| vec![Value::Long(i)]).collect();
        let entity = MemEntity::try_new(name.clone(), columns.clone(), rows).unwrap();
        let catalog = Arc::new(MemCatalog::new());
        catalog.register(entity);
        (catalog, name, columns)
    }

    #[test]
    fn scan_is_partitioned_and_merged() {
        let (catalog, name, columns) = big_entity();
        let ctx = PlannerContext::new(
            catalog,
            Arc::new(FunctionRegistry::new()),
            eager_policy(),
        );
        let scan = PhysicalPlan::EntityScan(EntityScanExec {
            entity: name,
            columns,
            partition: None,
            group: GroupId(0),
        });
        let partitioned = try_partition(&scan, &ctx, 4).unwrap();
        match &partitioned {
            PhysicalPlan::Merge(merge) => {
                assert!(merge.inputs.len() > 1);
                assert!(merge.order.is_none());
                // Sibling copies carry distinct groups.
                let groups: std::collections::HashSet<_> =
                    merge.inputs.iter().map(|i| match i.as_ref() {
                        PhysicalPlan::EntityScan(s) => s.group,
                        other => panic!("unexpected partition {}", other.name()),
                    }).collect();
                assert_eq!(groups.len(), merge.inputs.len());
            }
            other => panic!("expected a merge, got {}", other.name()),
        }
    }

    #[test]
    fn knn_partitions_into_a_limiting_sort_merge() {
        let name = Name::entity("s", "vecs").unwrap();
        let column = ColumnDef::qualified("s", "vecs", "v", Type::FloatVector(2)).unwrap();
        let rows = (0..2048)
            .map(|i| vec![Value::FloatVector(vec![i as f32, 0.0])])
            .collect();
        let entity = MemEntity::try_new(name.clone(), vec![column.clone()], rows).unwrap();
        let catalog = Arc::new(MemCatalog::new());
        catalog.register(entity);
        let ctx = PlannerContext::new(
            catalog,
            Arc::new(FunctionRegistry::new()),
            eager_policy(),
        );

        let bindings = BindingContext::new();
        let knn = PhysicalPlan::Knn(KnnExec {
            input: Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
                entity: name,
                columns: vec![column.clone()],
                partition: None,
                group: GroupId(0),
            })),
            predicate: ProximityPredicate::Nns(ProximityQuery {
                column,
                k: 5,
                distance: Name::function("euclidean").unwrap(),
                query: Binding::Literal(bindings.literal(Value::FloatVector(vec![0.0, 0.0]))),
            }),
        });
        let partitioned = try_partition(&knn, &ctx, 4).unwrap();
        match &partitioned {
            PhysicalPlan::MergeLimitingSort(merge) => {
                assert_eq!(merge.limit, 5);
                assert!(merge.inputs.len() > 1);
            }
            other => panic!("expected a limiting sort merge, got {}", other.name()),
        }
    }

    #[test]
    fn skip_descends_instead_of_partitioning() {
        let (catalog, name, columns) = big_entity();
        let ctx = PlannerContext::new(
            catalog,
            Arc::new(FunctionRegistry::new()),
            eager_policy(),
        );
        let plan = PhysicalPlan::Skip(SkipExec {
            input: Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
                entity: name,
                columns,
                partition: None,
                group: GroupId(0),
            })),
            skip: 3,
        });
        let partitioned = try_partition(&plan, &ctx, 4).unwrap();
        match &partitioned {
            PhysicalPlan::Skip(skip) => {
                assert!(matches!(skip.input.as_ref(), PhysicalPlan::Merge(_)));
            }
            other => panic!("expected the skip to stay on top, got {}", other.name()),
        }
    }
}
