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

//! Brute-force proximity selection.
//!
//! A pipeline breaker: every input record is scored against the query
//! vector, a bounded heap keeps the best `k`, and the survivors are emitted
//! in distance order with the distance appended.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use futures::stream::once;
use futures::{StreamExt, TryStreamExt};

use crate::error::{QueryError, Result};
use crate::execution::QueryContext;
use crate::function::Signature;
use crate::model::{ColumnDef, Record, TupleId};
use crate::physical_plan::stream::{iter_stream, SendableRecordStream};
use crate::physical_plan::KnnExec;
use crate::scalar::Value;

/// Heap entry ordered so that the heap root is the current worst match.
struct Scored {
    distance: f64,
    nearest: bool,
    record: Record,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.nearest {
            // Max-heap on distance: the root is the furthest survivor.
            self.distance.total_cmp(&other.distance)
        } else {
            other.distance.total_cmp(&self.distance)
        }
    }
}

pub(crate) fn execute(node: &KnnExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let query_spec = node.predicate.query().clone();
    let nearest = node.predicate.is_nearest();
    let k = node.predicate.k() as usize;

    // Resolve the query vector and the distance kernel up front.
    let probe_record = Record::new(TupleId(0), Vec::<ColumnDef>::new().into(), vec![])?;
    let needle = query_spec.query.value(&probe_record, &ctx.bindings)?;
    let needle_type = needle.value_type().ok_or_else(|| {
        QueryError::BindingNotBound("proximity query vector resolved to NULL".to_string())
    })?;
    let signature = Signature::new(
        query_spec.distance.clone(),
        vec![needle_type, query_spec.column.ty],
    );
    let function = ctx.functions.obtain(&signature)?;

    let mut columns = node.input.columns();
    columns.push(node.predicate.distance_column());
    let columns: Arc<[ColumnDef]> = columns.into();

    let mut input = node.input.execute(ctx)?;
    Ok(Box::pin(
        once(async move {
            let mut heap: BinaryHeap<Scored> = BinaryHeap::with_capacity(k + 1);
            while let Some(record) = input.next().await {
                let record = record?;
                let vector = record.value(&query_spec.column.name)?;
                let distance = match function.invoke(&[needle.clone(), vector.clone()])? {
                    Value::Double(d) => d,
                    Value::Null => continue,
                    other => {
                        return Err(QueryError::TypeMismatch(format!(
                            "distance function {} returned {}",
                            signature, other
                        )))
                    }
                };
                heap.push(Scored {
                    distance,
                    nearest,
                    record,
                });
                if heap.len() > k {
                    heap.pop();
                }
            }
            let mut survivors = heap.into_vec();
            if nearest {
                survivors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            } else {
                survivors.sort_by(|a, b| b.distance.total_cmp(&a.distance));
            }
            let records: Vec<Record> = survivors
                .into_iter()
                .map(|s| {
                    s.record
                        .extended(&columns, vec![Value::Double(s.distance)])
                })
                .collect();
            Ok(iter_stream(records))
        })
        .try_flatten(),
    ))
}
