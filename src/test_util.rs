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

//! Shared fixtures for unit and integration tests.

use std::sync::Arc;

use crate::binding::{Binding, BindingContext, GroupId};
use crate::datasource::memory::{MemCatalog, MemEntity};
use crate::logical_plan::{EntityScan, LogicalPlan};
use crate::model::{ColumnDef, Name};
use crate::predicate::{AtomicPredicate, BooleanPredicate, ComparisonOperator};
use crate::scalar::{Type, Value};

/// The columns of [`test_entity`]: `id: Long`, `label: String`,
/// `score: Double`.
pub fn test_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::qualified("s", "e", "id", Type::Long).unwrap(),
        ColumnDef::qualified("s", "e", "label", Type::String).unwrap(),
        ColumnDef::qualified("s", "e", "score", Type::Double).unwrap(),
    ]
}

/// A small scalar entity `warren.s.e` with six rows.
pub fn test_entity() -> Arc<MemEntity> {
    MemEntity::try_new(
        Name::entity("s", "e").unwrap(),
        test_columns(),
        vec![
            vec![Value::Long(1), Value::from("a"), Value::Double(0.1)],
            vec![Value::Long(2), Value::from("a"), Value::Double(0.2)],
            vec![Value::Long(3), Value::from("b"), Value::Double(0.3)],
            vec![Value::Long(4), Value::from("b"), Value::Double(0.4)],
            vec![Value::Long(5), Value::from("c"), Value::Double(0.5)],
            vec![Value::Long(6), Value::from("c"), Value::Double(0.6)],
        ],
    )
    .unwrap()
}

/// The vector column of [`vector_entity`].
pub fn vector_column() -> ColumnDef {
    ColumnDef::qualified("s", "vectors", "v", Type::FloatVector(2)).unwrap()
}

/// An entity `warren.s.vectors` with four 2-d vectors on the diagonal.
pub fn vector_entity() -> Arc<MemEntity> {
    MemEntity::try_new(
        Name::entity("s", "vectors").unwrap(),
        vec![
            ColumnDef::qualified("s", "vectors", "id", Type::Long).unwrap(),
            vector_column(),
        ],
        (0..4)
            .map(|i| {
                vec![
                    Value::Long(i),
                    Value::FloatVector(vec![i as f32, i as f32]),
                ]
            })
            .collect(),
    )
    .unwrap()
}

/// A catalogue holding [`test_entity`] and [`vector_entity`].
pub fn test_catalog() -> Arc<MemCatalog> {
    let catalog = Arc::new(MemCatalog::new());
    catalog.register(test_entity());
    catalog.register(vector_entity());
    catalog
}

/// A bare scan of [`test_entity`], the usual starting point for plan tests.
pub fn scan_fixture() -> LogicalPlan {
    LogicalPlan::EntityScan(EntityScan {
        entity: Name::entity("s", "e").unwrap(),
        columns: test_columns(),
        group: GroupId(0),
    })
}

/// An `<column> = <literal>` predicate with its slot registered in `ctx`.
pub fn equals(ctx: &BindingContext, column: ColumnDef, value: Value) -> BooleanPredicate {
    BooleanPredicate::from(AtomicPredicate::new(
        Binding::Column(column),
        ComparisonOperator::Equal,
        vec![Binding::Literal(ctx.literal(value))],
    ))
}
