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

//! Management executors. Each drives its input to completion, applies the
//! writes through the entity sub-transaction and reports a summary record.

use std::time::Instant;

use futures::stream::once;
use futures::{StreamExt, TryStreamExt};

use crate::datasource::LockMode;
use crate::error::Result;
use crate::execution::QueryContext;
use crate::logical_plan::dml_columns;
use crate::model::{Record, TupleId};
use crate::physical_plan::stream::{iter_stream, SendableRecordStream};
use crate::physical_plan::{DeleteExec, InsertExec, UpdateExec};
use crate::scalar::Value;

fn summary(rows: i64, started: Instant) -> Result<Vec<Record>> {
    Ok(vec![Record::new(
        TupleId(0),
        dml_columns().into(),
        vec![
            Value::Long(rows),
            Value::Long(started.elapsed().as_millis() as i64),
        ],
    )?])
}

pub(crate) fn execute_insert(
    node: &InsertExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    ctx.txn.request_lock(&node.entity, LockMode::Exclusive)?;
    let tx = ctx.txn.get_tx(&node.entity)?;
    let columns = node.columns.clone();
    let rows = node.rows.clone();
    Ok(Box::pin(
        once(async move {
            let started = Instant::now();
            let mut inserted = 0i64;
            for row in rows {
                tx.insert(&columns, row).await?;
                inserted += 1;
            }
            Ok(iter_stream(summary(inserted, started)?))
        })
        .try_flatten(),
    ))
}

pub(crate) fn execute_update(
    node: &UpdateExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    ctx.txn.request_lock(&node.entity, LockMode::Exclusive)?;
    let tx = ctx.txn.get_tx(&node.entity)?;
    let mut input = node.input.execute(ctx)?;
    let assignments = node.assignments.clone();
    let bindings = ctx.bindings.clone();
    Ok(Box::pin(
        once(async move {
            let started = Instant::now();
            let mut updated = 0i64;
            while let Some(record) = input.next().await {
                let record = record?;
                let mut values = Vec::with_capacity(assignments.len());
                for (column, binding) in &assignments {
                    values.push((column.clone(), binding.value(&record, &bindings)?));
                }
                tx.update(record.tuple_id(), &values).await?;
                updated += 1;
            }
            Ok(iter_stream(summary(updated, started)?))
        })
        .try_flatten(),
    ))
}

pub(crate) fn execute_delete(
    node: &DeleteExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    ctx.txn.request_lock(&node.entity, LockMode::Exclusive)?;
    let tx = ctx.txn.get_tx(&node.entity)?;
    let mut input = node.input.execute(ctx)?;
    Ok(Box::pin(
        once(async move {
            let started = Instant::now();
            let mut deleted = 0i64;
            while let Some(record) = input.next().await {
                let record = record?;
                tx.delete(record.tuple_id()).await?;
                deleted += 1;
            }
            Ok(iter_stream(summary(deleted, started)?))
        })
        .try_flatten(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, BindingContext, GroupId};
    use crate::datasource::{Entity, TransactionMode};
    use crate::execution::{QueryContext, TransactionContext};
    use crate::function::FunctionRegistry;
    use crate::model::Name;
    use crate::physical_plan::stream::collect;
    use crate::physical_plan::{EntityScanExec, FilterExec, PhysicalPlan};
    use crate::test_util::{equals, test_columns, test_entity};
    use std::sync::Arc;

    fn write_context(catalog: Arc<crate::datasource::memory::MemCatalog>) -> QueryContext {
        QueryContext::new(
            TransactionContext::begin(catalog, TransactionMode::ReadWrite),
            BindingContext::new(),
            Arc::new(FunctionRegistry::new()),
        )
    }

    fn catalog_with(entity: Arc<crate::datasource::memory::MemEntity>) -> Arc<crate::datasource::memory::MemCatalog> {
        let catalog = Arc::new(crate::datasource::memory::MemCatalog::new());
        catalog.register(entity);
        catalog
    }

    #[tokio::test]
    async fn insert_reports_row_count() {
        let entity = test_entity();
        let plan = PhysicalPlan::Insert(InsertExec {
            entity: entity.name().clone(),
            columns: test_columns(),
            rows: vec![
                vec![Value::Long(7), Value::from("d"), Value::Double(0.7)],
                vec![Value::Long(8), Value::from("d"), Value::Double(0.8)],
            ],
            group: GroupId(0),
        });
        let ctx = write_context(catalog_with(entity.clone()));
        let records = collect(plan.execute(&ctx).unwrap()).await.unwrap();
        assert_eq!(records[0].values()[0], Value::Long(2));
        assert_eq!(entity.row_count(), 8);
    }

    #[tokio::test]
    async fn delete_removes_matching_records() {
        let entity = test_entity();
        let bindings = BindingContext::new();
        let predicate = equals(&bindings, test_columns()[1].clone(), Value::from("a"));
        let plan = PhysicalPlan::Delete(DeleteExec {
            input: Arc::new(PhysicalPlan::Filter(FilterExec {
                input: Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
                    entity: entity.name().clone(),
                    columns: test_columns(),
                    partition: None,
                    group: GroupId(0),
                })),
                predicate,
            })),
            entity: entity.name().clone(),
        });
        let ctx = QueryContext::new(
            TransactionContext::begin(catalog_with(entity.clone()), TransactionMode::ReadWrite),
            bindings,
            Arc::new(FunctionRegistry::new()),
        );
        let records = collect(plan.execute(&ctx).unwrap()).await.unwrap();
        assert_eq!(records[0].values()[0], Value::Long(2));
        assert_eq!(entity.row_count(), 4);
    }

    #[tokio::test]
    async fn update_writes_bound_values() {
        let entity = test_entity();
        let bindings = BindingContext::new();
        let new_label = bindings.literal(Value::from("z"));
        let plan = PhysicalPlan::Update(UpdateExec {
            input: Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
                entity: entity.name().clone(),
                columns: test_columns(),
                partition: None,
                group: GroupId(0),
            })),
            entity: entity.name().clone(),
            assignments: vec![(test_columns()[1].clone(), Binding::Literal(new_label))],
        });
        let ctx = QueryContext::new(
            TransactionContext::begin(catalog_with(entity.clone()), TransactionMode::ReadWrite),
            bindings,
            Arc::new(FunctionRegistry::new()),
        );
        let records = collect(plan.execute(&ctx).unwrap()).await.unwrap();
        assert_eq!(records[0].values()[0], Value::Long(6));
        let stats = entity
            .statistics(&Name::column("s", "e", "label").unwrap())
            .unwrap();
        assert_eq!(stats.distinct_entries, Some(1));
    }
}
