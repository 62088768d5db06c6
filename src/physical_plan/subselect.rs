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

//! The filter-on-subselect executor.
//!
//! A pipeline breaker with respect to its subqueries only: every subquery
//! completes and writes its result into the binding context before the
//! first main-input record is evaluated; the main input itself streams.
//!
//! A subquery operand of a binary comparison receives exactly one record
//! (its first), written into the binding as a scalar. A subquery on the
//! right-hand side of `IN` is drained completely, appending every non-null
//! column-0 value to the operand list. Left and right operands are treated
//! symmetrically.

use futures::future::ready;
use futures::stream::once;
use futures::{StreamExt, TryStreamExt};

use crate::binding::{Binding, GroupId, ValueSlot};
use crate::error::{QueryError, Result};
use crate::execution::QueryContext;
use crate::model::Record;
use crate::physical_plan::stream::{collect, SendableRecordStream};
use crate::physical_plan::FilterOnSubSelectExec;
use crate::predicate::{BooleanPredicate, ComparisonOperator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Exactly one record; its column-0 value becomes the binding.
    Scalar,
    /// The full subquery; every non-null column-0 value joins the list.
    List,
}

/// The slots a subquery group must fill, with how to fill them.
fn directives(predicate: &BooleanPredicate, group: GroupId) -> Vec<(ValueSlot, Mode)> {
    let mut out = vec![];
    for atomic in predicate.atomics() {
        let operands = std::iter::once(&atomic.left).chain(atomic.right.iter());
        for binding in operands {
            if let Binding::Subquery {
                depends_on, slot, ..
            } = binding
            {
                if *depends_on == group {
                    let mode = if atomic.op == ComparisonOperator::In {
                        Mode::List
                    } else {
                        Mode::Scalar
                    };
                    out.push((*slot, mode));
                }
            }
        }
    }
    out
}

fn column_zero(record: &Record, group: GroupId) -> Result<crate::scalar::Value> {
    record.values().first().cloned().ok_or_else(|| {
        QueryError::Execution(format!("subquery {} emitted a record without columns", group))
    })
}

pub(crate) fn execute(
    node: &FilterOnSubSelectExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let node = node.clone();
    let ctx = ctx.clone();
    Ok(Box::pin(
        once(async move {
            for subquery in &node.subqueries {
                let targets = directives(&node.predicate, subquery.group);
                if targets.is_empty() {
                    return Err(QueryError::DisconnectedPlan(format!(
                        "no binding depends on subquery {}",
                        subquery.group
                    )));
                }
                let mut stream = subquery.plan.execute(&ctx)?;
                if targets.iter().all(|(_, mode)| *mode == Mode::Scalar) {
                    // One record suffices; dropping the stream afterwards
                    // closes the cursor.
                    let record = match stream.next().await {
                        Some(record) => record?,
                        None => {
                            return Err(QueryError::Execution(format!(
                                "subquery {} produced no record",
                                subquery.group
                            )))
                        }
                    };
                    let value = column_zero(&record, subquery.group)?;
                    for (slot, _) in targets {
                        ctx.bindings.bind(slot, value.clone())?;
                    }
                } else {
                    let records = collect(stream).await?;
                    for (slot, mode) in targets {
                        match mode {
                            Mode::Scalar => {
                                let record = records.first().ok_or_else(|| {
                                    QueryError::Execution(format!(
                                        "subquery {} produced no record",
                                        subquery.group
                                    ))
                                })?;
                                ctx.bindings.bind(slot, column_zero(record, subquery.group)?)?;
                            }
                            Mode::List => {
                                for record in &records {
                                    let value = column_zero(record, subquery.group)?;
                                    if !value.is_null() {
                                        ctx.bindings.append(slot, value)?;
                                    }
                                }
                            }
                        }
                    }
                }
            }

            // Subqueries are settled; the main input streams through the
            // now-complete predicate.
            let main = node.input.execute(&ctx)?;
            let predicate = node.predicate.clone();
            let bindings = ctx.bindings.clone();
            let filtered: SendableRecordStream =
                Box::pin(main.try_filter_map(move |record| {
                    ready(match predicate.is_match(&record, &bindings) {
                        Ok(true) => Ok(Some(record)),
                        Ok(false) => Ok(None),
                        Err(e) => Err(e),
                    })
                }));
            Ok(filtered)
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
    use crate::physical_plan::{
        EntityScanExec, PhysicalPlan, SelectExec, SubqueryExec,
    };
    use crate::predicate::AtomicPredicate;
    use crate::scalar::Value;
    use crate::test_util::{test_catalog, test_columns};
    use std::sync::Arc;

    fn scan() -> Arc<PhysicalPlan> {
        Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
            entity: Name::entity("s", "e").unwrap(),
            columns: test_columns(),
            partition: None,
            group: GroupId(0),
        }))
    }

    #[tokio::test]
    async fn in_subquery_filters_the_main_stream() {
        let columns = test_columns();
        let bindings = BindingContext::new();
        let slot = bindings.slot();
        let group = GroupId(1);

        // Subquery: ids of records labelled "b" -> [3, 4].
        let subquery = PhysicalPlan::Filter(crate::physical_plan::FilterExec {
            input: scan(),
            predicate: crate::test_util::equals(
                &bindings,
                columns[1].clone(),
                Value::from("b"),
            ),
        });
        let subquery = PhysicalPlan::Select(SelectExec {
            input: Arc::new(subquery),
            columns: vec![columns[0].clone()],
        });

        let predicate = BooleanPredicate::from(AtomicPredicate::new(
            Binding::Column(columns[0].clone()),
            ComparisonOperator::In,
            vec![Binding::Subquery {
                depends_on: group,
                column: columns[0].clone(),
                slot,
            }],
        ));
        let plan = PhysicalPlan::FilterOnSubSelect(FilterOnSubSelectExec {
            input: scan(),
            predicate,
            subqueries: vec![SubqueryExec {
                group,
                plan: Arc::new(subquery),
            }],
        });

        let ctx = QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            bindings,
            Arc::new(FunctionRegistry::new()),
        );
        let records = collect(plan.execute(&ctx).unwrap()).await.unwrap();
        let ids: Vec<Value> = records.iter().map(|r| r.values()[0].clone()).collect();
        assert_eq!(ids, vec![Value::Long(3), Value::Long(4)]);
    }

    #[tokio::test]
    async fn scalar_subquery_takes_one_record() {
        let columns = test_columns();
        let bindings = BindingContext::new();
        let slot = bindings.slot();
        let group = GroupId(1);

        // Subquery emits ids 1..6; the comparison binds the first.
        let subquery = PhysicalPlan::Select(SelectExec {
            input: scan(),
            columns: vec![columns[0].clone()],
        });
        let predicate = BooleanPredicate::from(AtomicPredicate::new(
            // Subquery on the LEFT: operands are symmetric.
            Binding::Subquery {
                depends_on: group,
                column: columns[0].clone(),
                slot,
            },
            ComparisonOperator::Less,
            vec![Binding::Column(columns[0].clone())],
        ));
        let plan = PhysicalPlan::FilterOnSubSelect(FilterOnSubSelectExec {
            input: scan(),
            predicate,
            subqueries: vec![SubqueryExec {
                group,
                plan: Arc::new(subquery),
            }],
        });

        let ctx = QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            bindings,
            Arc::new(FunctionRegistry::new()),
        );
        // 1 < id keeps ids 2..6.
        let records = collect(plan.execute(&ctx).unwrap()).await.unwrap();
        assert_eq!(records.len(), 5);
    }

    #[tokio::test]
    async fn empty_scalar_subquery_is_an_error() {
        let columns = test_columns();
        let bindings = BindingContext::new();
        let slot = bindings.slot();
        let group = GroupId(1);

        let subquery = PhysicalPlan::Limit(crate::physical_plan::LimitExec {
            input: scan(),
            limit: 0,
        });
        let predicate = BooleanPredicate::from(AtomicPredicate::new(
            Binding::Column(columns[0].clone()),
            ComparisonOperator::Equal,
            vec![Binding::Subquery {
                depends_on: group,
                column: columns[0].clone(),
                slot,
            }],
        ));
        let plan = PhysicalPlan::FilterOnSubSelect(FilterOnSubSelectExec {
            input: scan(),
            predicate,
            subqueries: vec![SubqueryExec {
                group,
                plan: Arc::new(subquery),
            }],
        });
        let ctx = QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            bindings,
            Arc::new(FunctionRegistry::new()),
        );
        let err = collect(plan.execute(&ctx).unwrap()).await.unwrap_err();
        assert!(matches!(err, QueryError::Execution(_)));
    }
}
