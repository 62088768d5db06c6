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

//! Projection executors. `SelectDistinct` is a pipeline in record order but
//! suppresses repeated value tuples through a hash set.

use std::sync::Arc;

use ahash::AHashSet;
use futures::future::ready;
use futures::TryStreamExt;

use crate::error::Result;
use crate::execution::QueryContext;
use crate::model::ColumnDef;
use crate::physical_plan::stream::SendableRecordStream;
use crate::physical_plan::{SelectDistinctExec, SelectExec};
use crate::scalar::Value;

pub(crate) fn execute_select(
    node: &SelectExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let input = node.input.execute(ctx)?;
    let columns: Arc<[ColumnDef]> = node.columns.clone().into();
    Ok(Box::pin(input.and_then(move |record| {
        ready(record.project(&columns))
    })))
}

pub(crate) fn execute_distinct(
    node: &SelectDistinctExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let input = node.input.execute(ctx)?;
    let columns: Arc<[ColumnDef]> = node.columns.clone().into();
    let mut seen: AHashSet<Vec<Value>> = AHashSet::new();
    Ok(Box::pin(input.try_filter_map(move |record| {
        ready(match record.project(&columns) {
            Ok(projected) => {
                if seen.insert(projected.values().to_vec()) {
                    Ok(Some(projected))
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(e),
        })
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingContext, GroupId};
    use crate::datasource::TransactionMode;
    use crate::execution::{QueryContext, TransactionContext};
    use crate::function::FunctionRegistry;
    use crate::model::Name;
    use crate::physical_plan::stream::collect;
    use crate::physical_plan::{EntityScanExec, PhysicalPlan};
    use crate::test_util::{test_catalog, test_columns};

    fn scan() -> Arc<PhysicalPlan> {
        Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
            entity: Name::entity("s", "e").unwrap(),
            columns: test_columns(),
            partition: None,
            group: GroupId(0),
        }))
    }

    fn context() -> QueryContext {
        QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            BindingContext::new(),
            Arc::new(FunctionRegistry::new()),
        )
    }

    #[tokio::test]
    async fn select_projects_and_reorders() {
        let columns = test_columns();
        let plan = PhysicalPlan::Select(SelectExec {
            input: scan(),
            columns: vec![columns[1].clone(), columns[0].clone()],
        });
        let records = collect(plan.execute(&context()).unwrap()).await.unwrap();
        assert_eq!(records[0].values(), &[Value::from("a"), Value::Long(1)]);
    }

    #[tokio::test]
    async fn distinct_suppresses_duplicates() {
        let columns = test_columns();
        let plan = PhysicalPlan::SelectDistinct(SelectDistinctExec {
            input: scan(),
            columns: vec![columns[1].clone()],
        });
        let records = collect(plan.execute(&context()).unwrap()).await.unwrap();
        let labels: Vec<Value> = records.iter().map(|r| r.values()[0].clone()).collect();
        assert_eq!(
            labels,
            vec![Value::from("a"), Value::from("b"), Value::from("c")]
        );
    }
}
