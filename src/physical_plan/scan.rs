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

//! Source executors: entity scan, Bernoulli sampling and index access.

use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::datasource::TupleRange;
use crate::error::Result;
use crate::execution::QueryContext;
use crate::physical_plan::stream::SendableRecordStream;
use crate::physical_plan::{EntitySampleExec, EntityScanExec, IndexScanExec, PartitionSpec};

fn partition_range(
    ctx: &QueryContext,
    entity: &crate::model::Name,
    partition: Option<PartitionSpec>,
) -> Result<Option<TupleRange>> {
    match partition {
        Some(spec) => {
            let tx = ctx.txn.get_tx(entity)?;
            Ok(Some(tx.partition_for(spec.index, spec.of)?))
        }
        None => Ok(None),
    }
}

pub(crate) fn execute_scan(
    node: &EntityScanExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let range = partition_range(ctx, &node.entity, node.partition)?;
    let tx = ctx.txn.get_tx(&node.entity)?;
    tx.scan(&node.columns, range)
}

/// Each scanned record is kept with independent probability `p`, drawn from
/// a deterministically seeded generator.
pub(crate) fn execute_sample(
    node: &EntitySampleExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let range = partition_range(ctx, &node.entity, node.partition)?;
    let tx = ctx.txn.get_tx(&node.entity)?;
    let scan = tx.scan(&node.columns, range)?;

    let probability = node.probability.0;
    let seed = match node.partition {
        Some(spec) => node.seed.wrapping_add(spec.index as u64),
        None => node.seed,
    };
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(Box::pin(scan.filter(move |record| {
        let keep = match record {
            Ok(_) => rng.gen::<f64>() < probability,
            // Errors always pass through.
            Err(_) => true,
        };
        futures::future::ready(keep)
    })))
}

/// A partitioned index scan retrieves its boundary from the parent entity
/// and filters within that tuple range.
pub(crate) fn execute_index_scan(
    node: &IndexScanExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let range = partition_range(ctx, &node.entity, node.partition)?;
    let index = ctx.txn.index(&node.index)?;
    index.filter(&node.predicate, &ctx.bindings, range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingContext, GroupId};
    use crate::datasource::TransactionMode;
    use crate::execution::TransactionContext;
    use crate::function::FunctionRegistry;
    use crate::physical_plan::stream::collect;
    use crate::physical_plan::PhysicalPlan;
    use crate::test_util::{test_catalog, test_columns};
    use ordered_float::OrderedFloat;
    use std::sync::Arc;

    fn context() -> QueryContext {
        QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            BindingContext::new(),
            Arc::new(FunctionRegistry::new()),
        )
    }

    fn sample(seed: u64) -> PhysicalPlan {
        PhysicalPlan::EntitySample(EntitySampleExec {
            entity: crate::model::Name::entity("s", "e").unwrap(),
            columns: test_columns(),
            probability: OrderedFloat(0.5),
            seed,
            partition: None,
            group: GroupId(0),
        })
    }

    #[tokio::test]
    async fn equal_samples_emit_equal_streams() {
        let ctx = context();
        let a = collect(sample(42).execute(&ctx).unwrap()).await.unwrap();
        let b = collect(sample(42).execute(&ctx).unwrap()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn partitioned_scans_cover_the_entity() {
        let ctx = context();
        let scan = PhysicalPlan::EntityScan(EntityScanExec {
            entity: crate::model::Name::entity("s", "e").unwrap(),
            columns: test_columns(),
            partition: None,
            group: GroupId(0),
        });
        let mut partitioned = vec![];
        for i in 0..3 {
            let part = scan.partition(3, i).unwrap();
            partitioned.extend(collect(part.execute(&ctx).unwrap()).await.unwrap());
        }
        let mut whole = collect(scan.execute(&ctx).unwrap()).await.unwrap();
        partitioned.sort_by_key(|r| r.tuple_id());
        whole.sort_by_key(|r| r.tuple_id());
        assert_eq!(partitioned, whole);
    }
}
