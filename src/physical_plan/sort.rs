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

//! The sort executor, a pipeline breaker: its input is drained completely
//! before the first record is emitted.

use std::cmp::Ordering;

use futures::stream::once;
use futures::TryStreamExt;

use crate::error::Result;
use crate::execution::QueryContext;
use crate::model::Record;
use crate::physical_plan::stream::{collect, iter_stream, SendableRecordStream};
use crate::physical_plan::SortExec;
use crate::scalar::Value;
use crate::traits::{Order, SortOrder};

/// Compare two records under a sort order. A missing column sorts as
/// `NULL`.
pub(crate) fn compare_records(a: &Record, b: &Record, order: &Order) -> Ordering {
    for (column, direction) in order {
        let left = a.value(&column.name).cloned().unwrap_or(Value::Null);
        let right = b.value(&column.name).cloned().unwrap_or(Value::Null);
        let ordering = match direction {
            SortOrder::Ascending => left.cmp(&right),
            SortOrder::Descending => right.cmp(&left),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

pub(crate) fn execute(node: &SortExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let input = node.input.execute(ctx)?;
    let order = node.order.clone();
    Ok(Box::pin(
        once(async move {
            let mut records = collect(input).await?;
            records.sort_by(|a, b| compare_records(a, b, &order));
            Ok(iter_stream(records))
        })
        .try_flatten(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingContext, GroupId};
    use crate::datasource::TransactionMode;
    use crate::execution::{QueryContext, TransactionContext};
    use crate::function::FunctionRegistry;
    use crate::model::Name;
    use crate::physical_plan::{EntityScanExec, PhysicalPlan};
    use crate::test_util::{test_catalog, test_columns};
    use std::sync::Arc;

    #[tokio::test]
    async fn sort_descending() {
        let columns = test_columns();
        let plan = PhysicalPlan::Sort(SortExec {
            input: Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
                entity: Name::entity("s", "e").unwrap(),
                columns: columns.clone(),
                partition: None,
                group: GroupId(0),
            })),
            order: vec![(columns[0].clone(), SortOrder::Descending)],
        });
        assert!(plan.traits().order.is_some());
        let ctx = QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            BindingContext::new(),
            Arc::new(FunctionRegistry::new()),
        );
        let records = collect(plan.execute(&ctx).unwrap()).await.unwrap();
        let ids: Vec<Value> = records.iter().map(|r| r.values()[0].clone()).collect();
        assert_eq!(
            ids,
            (1..=6).rev().map(Value::Long).collect::<Vec<_>>()
        );
    }
}
