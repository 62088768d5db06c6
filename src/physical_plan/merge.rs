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

//! Merge executors for partitioned subtrees.
//!
//! Each upstream partition runs as its own task. The plain merge
//! interleaves whatever arrives; the ordered merge performs a k-way heap
//! merge over already-ordered partitions; the limiting sort merge keeps the
//! best `limit` records across all partitions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use futures::stream::once;
use futures::{StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Result;
use crate::execution::QueryContext;
use crate::model::Record;
use crate::physical_plan::sort::compare_records;
use crate::physical_plan::stream::{iter_stream, SendableRecordStream};
use crate::physical_plan::{MergeExec, MergeLimitingSortExec};
use crate::traits::Order;

/// Channel capacity between a partition task and the merge.
const MERGE_BUFFER: usize = 64;

fn spawn_partitions(
    node_inputs: &[Arc<crate::physical_plan::PhysicalPlan>],
    ctx: &QueryContext,
) -> Result<Vec<SendableRecordStream>> {
    let mut streams = vec![];
    for input in node_inputs {
        streams.push(input.execute(ctx)?);
    }
    Ok(streams)
}

pub(crate) fn execute(node: &MergeExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let streams = spawn_partitions(&node.inputs, ctx)?;
    match &node.order {
        Some(order) => Ok(ordered_merge(streams, order.clone())),
        None => Ok(interleaving_merge(streams)),
    }
}

/// Every partition forwards into one channel; arrival order is unspecified.
fn interleaving_merge(streams: Vec<SendableRecordStream>) -> SendableRecordStream {
    let (sender, receiver) = mpsc::channel(MERGE_BUFFER);
    for mut stream in streams {
        let sender = sender.clone();
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                // A dropped receiver ends the task and closes the cursor.
                if sender.send(item).await.is_err() {
                    break;
                }
            }
        });
    }
    Box::pin(ReceiverStream::new(receiver))
}

struct HeapEntry {
    record: Record,
    source: usize,
    order: Arc<Order>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the record that sorts first.
        compare_records(&other.record, &self.record, &self.order)
    }
}

/// K-way heap merge over partitions that are each ordered already.
fn ordered_merge(streams: Vec<SendableRecordStream>, order: Order) -> SendableRecordStream {
    struct State {
        streams: Vec<SendableRecordStream>,
        heap: BinaryHeap<HeapEntry>,
        order: Arc<Order>,
        started: bool,
        failed: bool,
    }
    let state = State {
        streams,
        heap: BinaryHeap::new(),
        order: Arc::new(order),
        started: false,
        failed: false,
    };
    Box::pin(futures::stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }
        if !state.started {
            state.started = true;
            for index in 0..state.streams.len() {
                match state.streams[index].next().await {
                    Some(Ok(record)) => state.heap.push(HeapEntry {
                        record,
                        source: index,
                        order: state.order.clone(),
                    }),
                    Some(Err(e)) => {
                        state.failed = true;
                        return Some((Err(e), state));
                    }
                    None => {}
                }
            }
        }
        let entry = state.heap.pop()?;
        match state.streams[entry.source].next().await {
            Some(Ok(record)) => state.heap.push(HeapEntry {
                record,
                source: entry.source,
                order: state.order.clone(),
            }),
            Some(Err(e)) => {
                state.failed = true;
                return Some((Err(e), state));
            }
            None => {}
        }
        Some((Ok(entry.record), state))
    }))
}

/// Keeps the `limit` records that sort first across all partitions and
/// emits them in order. A breaker, but with memory bounded by `limit`.
pub(crate) fn execute_limiting_sort(
    node: &MergeLimitingSortExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let streams = spawn_partitions(&node.inputs, ctx)?;
    let order = Arc::new(node.order.clone());
    let limit = node.limit as usize;
    Ok(Box::pin(
        once(async move {
            let mut merged = interleaving_merge(streams);
            // Max-heap per the order: the root is the current worst keeper.
            struct Keeper {
                record: Record,
                order: Arc<Order>,
            }
            impl PartialEq for Keeper {
                fn eq(&self, other: &Self) -> bool {
                    self.cmp(other) == Ordering::Equal
                }
            }
            impl Eq for Keeper {}
            impl PartialOrd for Keeper {
                fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                    Some(self.cmp(other))
                }
            }
            impl Ord for Keeper {
                fn cmp(&self, other: &Self) -> Ordering {
                    compare_records(&self.record, &other.record, &self.order)
                }
            }
            let mut heap: BinaryHeap<Keeper> = BinaryHeap::with_capacity(limit + 1);
            while let Some(record) = merged.next().await {
                heap.push(Keeper {
                    record: record?,
                    order: order.clone(),
                });
                if heap.len() > limit {
                    heap.pop();
                }
            }
            let mut keepers = heap.into_vec();
            keepers.sort_by(|a, b| compare_records(&a.record, &b.record, &order));
            Ok(iter_stream(keepers.into_iter().map(|k| k.record)))
        })
        .try_flatten(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingContext, GroupId};
    use crate::datasource::TransactionMode;
    use crate::execution::TransactionContext;
    use crate::function::FunctionRegistry;
    use crate::model::Name;
    use crate::physical_plan::stream::collect;
    use crate::physical_plan::{EntityScanExec, PhysicalPlan, SortExec};
    use crate::scalar::Value;
    use crate::test_util::{test_catalog, test_columns};
    use crate::traits::SortOrder;

    fn scan() -> PhysicalPlan {
        PhysicalPlan::EntityScan(EntityScanExec {
            entity: Name::entity("s", "e").unwrap(),
            columns: test_columns(),
            partition: None,
            group: GroupId(0),
        })
    }

    fn context() -> QueryContext {
        QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            BindingContext::new(),
            Arc::new(FunctionRegistry::new()),
        )
    }

    #[tokio::test]
    async fn interleaved_merge_preserves_the_multiset() {
        let scan = scan();
        let plan = PhysicalPlan::Merge(MergeExec {
            inputs: (0..3)
                .map(|i| Arc::new(scan.partition(3, i).unwrap()))
                .collect(),
            order: None,
        });
        let mut merged = collect(plan.execute(&context()).unwrap()).await.unwrap();
        let mut whole = collect(scan.execute(&context()).unwrap()).await.unwrap();
        merged.sort_by_key(|r| r.tuple_id());
        whole.sort_by_key(|r| r.tuple_id());
        assert_eq!(merged, whole);
    }

    #[tokio::test]
    async fn ordered_merge_preserves_the_order() {
        let columns = test_columns();
        let order = vec![(columns[0].clone(), SortOrder::Descending)];
        let scan = scan();
        let inputs: Vec<Arc<PhysicalPlan>> = (0..2)
            .map(|i| {
                Arc::new(PhysicalPlan::Sort(SortExec {
                    input: Arc::new(scan.partition(2, i).unwrap()),
                    order: order.clone(),
                }))
            })
            .collect();
        let plan = PhysicalPlan::Merge(MergeExec {
            inputs,
            order: Some(order),
        });
        let records = collect(plan.execute(&context()).unwrap()).await.unwrap();
        let ids: Vec<Value> = records.iter().map(|r| r.values()[0].clone()).collect();
        assert_eq!(ids, (1..=6).rev().map(Value::Long).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn limiting_sort_merge_emits_the_top_of_the_union() {
        let columns = test_columns();
        let order = vec![(columns[0].clone(), SortOrder::Ascending)];
        let scan = scan();
        let plan = PhysicalPlan::MergeLimitingSort(MergeLimitingSortExec {
            inputs: (0..3)
                .map(|i| Arc::new(scan.partition(3, i).unwrap()))
                .collect(),
            order,
            limit: 4,
        });
        let records = collect(plan.execute(&context()).unwrap()).await.unwrap();
        let ids: Vec<Value> = records.iter().map(|r| r.values()[0].clone()).collect();
        assert_eq!(
            ids,
            vec![Value::Long(1), Value::Long(2), Value::Long(3), Value::Long(4)]
        );
    }
}
