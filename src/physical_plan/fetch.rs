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

//! The fetch executor: re-attaches deferred entity columns by tuple id.

use std::sync::Arc;

use futures::TryStreamExt;

use crate::error::Result;
use crate::execution::QueryContext;
use crate::model::ColumnDef;
use crate::physical_plan::stream::SendableRecordStream;
use crate::physical_plan::FetchExec;

pub(crate) fn execute(node: &FetchExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let input = node.input.execute(ctx)?;
    let tx = ctx.txn.get_tx(&node.entity)?;
    let fetch = node.fetch.clone();
    let mut columns = node.input.columns();
    columns.extend(fetch.clone());
    let columns: Arc<[ColumnDef]> = columns.into();

    Ok(Box::pin(input.and_then(move |record| {
        let tx = tx.clone();
        let fetch = fetch.clone();
        let columns = columns.clone();
        async move {
            let extra = tx.fetch(record.tuple_id(), &fetch).await?;
            Ok(record.extended(&columns, extra))
        }
    })))
}

#[cfg(test)]
mod tests {
    use crate::binding::{BindingContext, GroupId};
    use crate::datasource::TransactionMode;
    use crate::execution::{QueryContext, TransactionContext};
    use crate::function::FunctionRegistry;
    use crate::model::Name;
    use crate::physical_plan::stream::collect;
    use crate::physical_plan::{EntityScanExec, FetchExec, PhysicalPlan};
    use crate::scalar::Value;
    use crate::test_util::{test_catalog, test_columns};
    use std::sync::Arc;

    #[tokio::test]
    async fn fetch_reattaches_deferred_columns() {
        let columns = test_columns();
        let plan = PhysicalPlan::Fetch(FetchExec {
            input: Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
                entity: Name::entity("s", "e").unwrap(),
                columns: vec![columns[0].clone()],
                partition: None,
                group: GroupId(0),
            })),
            entity: Name::entity("s", "e").unwrap(),
            fetch: vec![columns[2].clone(), columns[1].clone()],
        });
        let ctx = QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            BindingContext::new(),
            Arc::new(FunctionRegistry::new()),
        );
        let records = collect(plan.execute(&ctx).unwrap()).await.unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(
            records[0].values(),
            &[Value::Long(1), Value::Double(0.1), Value::from("a")]
        );
        assert_eq!(records[0].columns().len(), 3);
    }
}
