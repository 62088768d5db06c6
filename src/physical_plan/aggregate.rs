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

//! Aggregation executors: count, exists and the numeric aggregates. All of
//! them are pipeline breakers emitting a single record.

use futures::stream::once;
use futures::{StreamExt, TryStreamExt};

use crate::error::{QueryError, Result};
use crate::execution::QueryContext;
use crate::logical_plan::{
    aggregate_column, count_column, exists_column, AggregateFunction,
};
use crate::model::{ColumnDef, Record, TupleId};
use crate::physical_plan::stream::{iter_stream, SendableRecordStream};
use crate::physical_plan::{AggregateExec, CountEntityExec, CountExec, ExistsExec};
use crate::scalar::Value;

fn single(columns: Vec<ColumnDef>, values: Vec<Value>) -> Result<Vec<Record>> {
    Ok(vec![Record::new(TupleId(0), columns.into(), values)?])
}

pub(crate) fn execute_count(node: &CountExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let input = node.input.execute(ctx)?;
    Ok(Box::pin(
        once(async move {
            let count = input.try_fold(0i64, |count, _| async move { Ok(count + 1) }).await?;
            Ok(iter_stream(single(
                vec![count_column()],
                vec![Value::Long(count)],
            )?))
        })
        .try_flatten(),
    ))
}

pub(crate) fn execute_count_entity(
    node: &CountEntityExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let tx = ctx.txn.get_tx(&node.entity)?;
    Ok(Box::pin(
        once(async move {
            let count = tx.count().await?;
            Ok(iter_stream(single(
                vec![count_column()],
                vec![Value::Long(count as i64)],
            )?))
        })
        .try_flatten(),
    ))
}

pub(crate) fn execute_exists(
    node: &ExistsExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let mut input = node.input.execute(ctx)?;
    Ok(Box::pin(
        once(async move {
            let exists = match input.next().await {
                Some(Err(e)) => return Err(e),
                Some(Ok(_)) => true,
                None => false,
            };
            Ok(iter_stream(single(
                vec![exists_column()],
                vec![Value::Boolean(exists)],
            )?))
        })
        .try_flatten(),
    ))
}

struct Accumulator {
    column: ColumnDef,
    function: AggregateFunction,
    sum: Value,
    count: i64,
    min: Option<Value>,
    max: Option<Value>,
}

impl Accumulator {
    fn new(column: ColumnDef, function: AggregateFunction) -> Self {
        Self {
            column,
            function,
            sum: Value::Long(0),
            count: 0,
            min: None,
            max: None,
        }
    }

    fn update(&mut self, record: &Record) -> Result<()> {
        let value = record.value(&self.column.name)?;
        if value.is_null() {
            return Ok(());
        }
        if value.to_f64().is_none() {
            return Err(QueryError::TypeMismatch(format!(
                "cannot aggregate non-numeric value {} in column {}",
                value, self.column.name
            )));
        }
        self.count += 1;
        match self.function {
            AggregateFunction::Sum | AggregateFunction::Mean => {
                self.sum = self.sum.add(value)?;
            }
            AggregateFunction::Min => {
                if self.min.as_ref().map(|m| value < m).unwrap_or(true) {
                    self.min = Some(value.clone());
                }
            }
            AggregateFunction::Max => {
                if self.max.as_ref().map(|m| value > m).unwrap_or(true) {
                    self.max = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self.function {
            AggregateFunction::Sum => self.sum,
            AggregateFunction::Mean => {
                if self.count == 0 {
                    Value::Null
                } else {
                    Value::Double(self.sum.to_f64().unwrap_or(0.0) / self.count as f64)
                }
            }
            AggregateFunction::Min => self.min.unwrap_or(Value::Null),
            AggregateFunction::Max => self.max.unwrap_or(Value::Null),
        }
    }
}

pub(crate) fn execute(node: &AggregateExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let mut input = node.input.execute(ctx)?;
    let function = node.function;
    let columns = node.columns.clone();
    Ok(Box::pin(
        once(async move {
            let mut accumulators: Vec<Accumulator> = columns
                .iter()
                .map(|c| Accumulator::new(c.clone(), function))
                .collect();
            while let Some(record) = input.next().await {
                let record = record?;
                for accumulator in &mut accumulators {
                    accumulator.update(&record)?;
                }
            }
            let out_columns: Vec<ColumnDef> = columns
                .iter()
                .map(|c| aggregate_column(function, c))
                .collect();
            let values: Vec<Value> = accumulators.into_iter().map(|a| a.finish()).collect();
            Ok(iter_stream(single(out_columns, values)?))
        })
        .try_flatten(),
    ))
}
