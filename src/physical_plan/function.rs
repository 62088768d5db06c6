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

//! The function executor.
//!
//! The outermost function materialises its result as a new column; nested
//! function expressions are evaluated in place and never surface as
//! columns. The whole expression tree is resolved against the registry once
//! before the first record flows.

use std::sync::Arc;

use futures::future::ready;
use futures::TryStreamExt;

use crate::binding::{Binding, BindingContext};
use crate::error::Result;
use crate::execution::QueryContext;
use crate::function::{FunctionRegistry, ScalarFunction};
use crate::logical_plan::{FunctionArg, FunctionExpr};
use crate::model::{ColumnDef, Record};
use crate::physical_plan::stream::SendableRecordStream;
use crate::physical_plan::FunctionExec;
use crate::scalar::Value;

/// A function expression with every signature resolved.
pub(crate) struct CompiledFunction {
    function: Arc<dyn ScalarFunction>,
    args: Vec<CompiledArg>,
}

enum CompiledArg {
    Binding(Binding),
    Nested(CompiledFunction),
}

impl CompiledFunction {
    pub(crate) fn compile(
        expr: &FunctionExpr,
        registry: &FunctionRegistry,
    ) -> Result<CompiledFunction> {
        let function = registry.obtain(&expr.signature)?;
        let args = expr
            .args
            .iter()
            .map(|arg| {
                Ok(match arg {
                    FunctionArg::Binding(binding) => CompiledArg::Binding(binding.clone()),
                    FunctionArg::Nested(nested) => {
                        CompiledArg::Nested(CompiledFunction::compile(nested, registry)?)
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledFunction { function, args })
    }

    pub(crate) fn evaluate(&self, record: &Record, bindings: &BindingContext) -> Result<Value> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            values.push(match arg {
                CompiledArg::Binding(binding) => binding.value(record, bindings)?,
                CompiledArg::Nested(nested) => nested.evaluate(record, bindings)?,
            });
        }
        self.function.invoke(&values)
    }
}

pub(crate) fn execute(node: &FunctionExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let compiled = CompiledFunction::compile(&node.function, &ctx.functions)?;
    let input = node.input.execute(ctx)?;
    let bindings = ctx.bindings.clone();
    let mut columns = node.input.columns();
    columns.push(node.out.clone());
    let columns: Arc<[ColumnDef]> = columns.into();

    Ok(Box::pin(input.and_then(move |record| {
        ready(
            compiled
                .evaluate(&record, &bindings)
                .map(|value| record.extended(&columns, vec![value])),
        )
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::GroupId;
    use crate::datasource::TransactionMode;
    use crate::execution::{QueryContext, TransactionContext};
    use crate::function::Signature;
    use crate::model::Name;
    use crate::physical_plan::stream::collect;
    use crate::physical_plan::{EntityScanExec, PhysicalPlan};
    use crate::scalar::Type;
    use crate::test_util::{test_catalog, vector_column};

    #[tokio::test]
    async fn function_appends_its_output_column() {
        let bindings = BindingContext::new();
        let query = bindings.literal(Value::FloatVector(vec![0.0, 0.0]));
        let signature = Signature::new(
            Name::function("euclidean").unwrap(),
            vec![Type::FloatVector(2), Type::FloatVector(2)],
        );
        let out = ColumnDef::qualified("s", "vectors", "d", Type::Double).unwrap();
        let plan = PhysicalPlan::Function(FunctionExec {
            input: Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
                entity: Name::entity("s", "vectors").unwrap(),
                columns: vec![vector_column()],
                partition: None,
                group: GroupId(0),
            })),
            function: FunctionExpr {
                signature,
                args: vec![
                    FunctionArg::Binding(Binding::Literal(query)),
                    FunctionArg::Binding(Binding::Column(vector_column())),
                ],
            },
            out: out.clone(),
        });
        let ctx = QueryContext::new(
            TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly),
            bindings,
            Arc::new(FunctionRegistry::new()),
        );
        let records = collect(plan.execute(&ctx).unwrap()).await.unwrap();
        assert_eq!(records.len(), 4);
        // Distance of [2, 2] from the origin.
        assert_eq!(
            records[2].value(&out.name).unwrap(),
            &Value::Double((8.0f64).sqrt())
        );
    }
}
