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

//! End-to-end tests: logical tree in, planned physical tree, streamed
//! records out.

use std::collections::HashSet;
use std::sync::Arc;

use warren::binding::{Binding, BindingContext, GroupId};
use warren::config::SessionConfig;
use warren::datasource::Entity;
use warren::cost::CostPolicy;
use warren::datasource::memory::{MemCatalog, MemEntity};
use warren::datasource::TransactionMode;
use warren::error::QueryError;
use warren::execution::{QueryContext, TransactionContext};
use warren::function::FunctionRegistry;
use warren::logical_plan::{LogicalPlan, LogicalPlanBuilder};
use warren::model::{ColumnDef, Name, Record};
use warren::physical_plan::stream::collect;
use warren::physical_plan::PhysicalPlan;
use warren::planner::{PlannerContext, QueryPlanner};
use warren::predicate::{
    AtomicPredicate, BooleanPredicate, ComparisonOperator, ProximityPredicate, ProximityQuery,
};
use warren::scalar::{Type, Value};

#[ctor::ctor]
fn init() {
    let _ = env_logger::try_init();
}

struct Fixture {
    catalog: Arc<MemCatalog>,
    functions: Arc<FunctionRegistry>,
    bindings: BindingContext,
}

impl Fixture {
    fn new() -> Self {
        Self {
            catalog: Arc::new(MemCatalog::new()),
            functions: Arc::new(FunctionRegistry::new()),
            bindings: BindingContext::new(),
        }
    }

    fn register(&self, entity: Arc<MemEntity>) {
        self.catalog.register(entity);
    }

    fn planner_ctx(&self) -> PlannerContext {
        PlannerContext::new(
            self.catalog.clone(),
            self.functions.clone(),
            CostPolicy::default(),
        )
    }

    fn planner_ctx_with(&self, policy: CostPolicy) -> PlannerContext {
        PlannerContext::new(self.catalog.clone(), self.functions.clone(), policy)
    }

    fn query_ctx(&self, mode: TransactionMode) -> QueryContext {
        QueryContext::new(
            TransactionContext::begin(self.catalog.clone(), mode),
            self.bindings.clone(),
            self.functions.clone(),
        )
    }

    async fn run(&self, physical: &PhysicalPlan) -> Vec<Record> {
        let ctx = self.query_ctx(TransactionMode::ReadOnly);
        collect(physical.execute(&ctx).unwrap()).await.unwrap()
    }

    fn plan(&self, logical: &LogicalPlan, target_partitions: usize) -> PhysicalPlan {
        let planner = QueryPlanner::new(
            SessionConfig::new().with_target_partitions(target_partitions),
        );
        planner
            .plan_and_select(logical, &self.planner_ctx(), false, true)
            .unwrap()
    }
}

fn pairs_entity() -> Arc<MemEntity> {
    MemEntity::try_new(
        Name::entity("s", "pairs").unwrap(),
        vec![
            ColumnDef::qualified("s", "pairs", "id", Type::Long).unwrap(),
            ColumnDef::qualified("s", "pairs", "label", Type::String).unwrap(),
        ],
        vec![
            vec![Value::Long(1), Value::from("a")],
            vec![Value::Long(2), Value::from("a")],
            vec![Value::Long(3), Value::from("b")],
        ],
    )
    .unwrap()
}

fn digits_entity() -> Arc<MemEntity> {
    MemEntity::try_new(
        Name::entity("s", "digits").unwrap(),
        vec![ColumnDef::qualified("s", "digits", "n", Type::Long).unwrap()],
        (0..10).map(|i| vec![Value::Long(i)]).collect(),
    )
    .unwrap()
}

fn diagonal_entity() -> Arc<MemEntity> {
    MemEntity::try_new(
        Name::entity("s", "diag").unwrap(),
        vec![
            ColumnDef::qualified("s", "diag", "id", Type::Long).unwrap(),
            ColumnDef::qualified("s", "diag", "v", Type::FloatVector(2)).unwrap(),
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

#[tokio::test]
async fn select_distinct_after_scan() {
    let fixture = Fixture::new();
    let entity = pairs_entity();
    fixture.register(entity.clone());

    let label = entity.column(&Name::column("s", "pairs", "label").unwrap()).unwrap();
    let logical = LogicalPlanBuilder::scan(entity.as_ref(), None)
        .unwrap()
        .select_distinct(vec![label])
        .build();
    let physical = fixture.plan(&logical, 1);
    let records = fixture.run(&physical).await;

    let values: HashSet<Value> = records.iter().map(|r| r.values()[0].clone()).collect();
    assert_eq!(
        values,
        HashSet::from([Value::from("a"), Value::from("b")])
    );
}

#[tokio::test]
async fn limit_skip_composition() {
    let fixture = Fixture::new();
    let entity = digits_entity();
    fixture.register(entity.clone());

    let logical = LogicalPlanBuilder::scan(entity.as_ref(), None)
        .unwrap()
        .skip(3)
        .limit(4)
        .build();
    let physical = fixture.plan(&logical, 4);
    assert!(physical.traits().not_partitionable);

    let records = fixture.run(&physical).await;
    let values: Vec<Value> = records.iter().map(|r| r.values()[0].clone()).collect();
    assert_eq!(
        values,
        vec![Value::Long(3), Value::Long(4), Value::Long(5), Value::Long(6)]
    );
}

#[tokio::test]
async fn knn_through_a_proximity_index() {
    let fixture = Fixture::new();
    let entity = diagonal_entity();
    entity
        .create_proximity_index(
            Name::index("s", "diag", "v_idx").unwrap(),
            &Name::column("s", "diag", "v").unwrap(),
            Name::function("euclidean").unwrap(),
        )
        .unwrap();
    fixture.register(entity.clone());

    let column = entity.column(&Name::column("s", "diag", "v").unwrap()).unwrap();
    let predicate = ProximityPredicate::Nns(ProximityQuery {
        column,
        k: 3,
        distance: Name::function("euclidean").unwrap(),
        query: Binding::Literal(
            fixture.bindings.literal(Value::FloatVector(vec![0.0, 0.0])),
        ),
    });
    let logical = LogicalPlanBuilder::scan(entity.as_ref(), None)
        .unwrap()
        .proximity(predicate.clone())
        .build();

    let physical = fixture.plan(&logical, 1);
    assert!(
        format!("{}", physical).contains("IndexScanExec"),
        "expected the proximity index to be chosen:\n{}",
        physical
    );

    let records = fixture.run(&physical).await;
    assert_eq!(records.len(), 3);
    let distance = predicate.distance_column();
    let mut last = f64::MIN;
    for (i, record) in records.iter().enumerate() {
        let d = match record.value(&distance.name).unwrap() {
            Value::Double(d) => *d,
            other => panic!("unexpected distance value {}", other),
        };
        assert!(d >= last, "distances must ascend");
        last = d;
        // The three closest to the origin are the first three diagonal
        // points; tuple ids track the insertion order.
        assert_eq!(record.tuple_id().0, i as u64);
    }
}

#[tokio::test]
async fn filter_on_subselect_with_in() {
    let fixture = Fixture::new();
    let main = MemEntity::try_new(
        Name::entity("s", "main").unwrap(),
        vec![ColumnDef::qualified("s", "main", "n", Type::Long).unwrap()],
        (1..=4).map(|i| vec![Value::Long(i)]).collect(),
    )
    .unwrap();
    let sub = MemEntity::try_new(
        Name::entity("s", "sub").unwrap(),
        vec![ColumnDef::qualified("s", "sub", "n", Type::Long).unwrap()],
        [2, 4, 6].iter().map(|i| vec![Value::Long(*i)]).collect(),
    )
    .unwrap();
    fixture.register(main.clone());
    fixture.register(sub.clone());

    let group = GroupId(1);
    let slot = fixture.bindings.slot();
    let main_column = main.column(&Name::column("s", "main", "n").unwrap()).unwrap();
    let sub_column = sub.column(&Name::column("s", "sub", "n").unwrap()).unwrap();

    let subquery = LogicalPlanBuilder::scan_with_group(sub.as_ref(), None, group)
        .unwrap()
        .build();
    let predicate = BooleanPredicate::from(AtomicPredicate::new(
        Binding::Column(main_column),
        ComparisonOperator::In,
        vec![Binding::Subquery {
            depends_on: group,
            column: sub_column,
            slot,
        }],
    ));
    let logical = LogicalPlanBuilder::scan(main.as_ref(), None)
        .unwrap()
        .filter_on_subselect(predicate, vec![(group, subquery)])
        .build();

    let physical = fixture.plan(&logical, 1);
    let records = fixture.run(&physical).await;
    let values: Vec<Value> = records.iter().map(|r| r.values()[0].clone()).collect();
    assert_eq!(values, vec![Value::Long(2), Value::Long(4)]);
}

#[tokio::test]
async fn sample_determinism() {
    let fixture = Fixture::new();
    let entity = digits_entity();
    fixture.register(entity.clone());

    let build = || {
        LogicalPlanBuilder::sample(entity.as_ref(), None, 0.5, 42)
            .unwrap()
            .build()
    };
    let a = fixture.run(&fixture.plan(&build(), 1)).await;
    let b = fixture.run(&fixture.plan(&build(), 1)).await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn boolean_index_is_preferred_when_cheaper() {
    let fixture = Fixture::new();
    let entity = MemEntity::try_new(
        Name::entity("s", "indexed").unwrap(),
        vec![ColumnDef::qualified("s", "indexed", "k", Type::Long).unwrap()],
        (0..512).map(|i| vec![Value::Long(i % 64)]).collect(),
    )
    .unwrap();
    entity
        .create_hash_index(
            Name::index("s", "indexed", "k_idx").unwrap(),
            &Name::column("s", "indexed", "k").unwrap(),
        )
        .unwrap();
    fixture.register(entity.clone());

    let column = entity.column(&Name::column("s", "indexed", "k").unwrap()).unwrap();
    let predicate = BooleanPredicate::from(AtomicPredicate::new(
        Binding::Column(column),
        ComparisonOperator::Equal,
        vec![Binding::Literal(fixture.bindings.literal(Value::Long(7)))],
    ));
    let logical = LogicalPlanBuilder::scan(entity.as_ref(), None)
        .unwrap()
        .filter(predicate)
        .build();

    let physical = fixture.plan(&logical, 1);
    assert!(
        format!("{}", physical).contains("IndexScanExec"),
        "expected an index access:\n{}",
        physical
    );

    let records = fixture.run(&physical).await;
    assert_eq!(records.len(), 8);
    for record in records {
        assert_eq!(record.values()[0], Value::Long(7));
    }
}

/// Partitioning safety: the merged multiset equals the unpartitioned run.
#[tokio::test]
async fn partitioned_execution_preserves_the_multiset() {
    let fixture = Fixture::new();
    let entity = MemEntity::try_new(
        Name::entity("s", "wide").unwrap(),
        vec![ColumnDef::qualified("s", "wide", "n", Type::Long).unwrap()],
        (0..1024).map(|i| vec![Value::Long(i)]).collect(),
    )
    .unwrap();
    fixture.register(entity.clone());

    let eager = CostPolicy {
        speedup_per_worker: 1e-9,
        non_parallelisable_io: 0.0,
        cost_memory_access: 1.0,
        ..CostPolicy::default()
    };
    let logical = LogicalPlanBuilder::scan(entity.as_ref(), None).unwrap().build();
    let planner = QueryPlanner::new(
        SessionConfig::new()
            .with_target_partitions(4)
            .with_policy(eager.clone()),
    );
    let physical = planner
        .plan_and_select(&logical, &fixture.planner_ctx_with(eager), false, false)
        .unwrap();
    assert!(
        matches!(physical, PhysicalPlan::Merge(_)),
        "expected a partitioned plan:\n{}",
        physical
    );

    let mut merged = fixture.run(&physical).await;
    let unpartitioned = fixture.plan(&logical, 1);
    let mut whole = fixture.run(&unpartitioned).await;
    merged.sort_by_key(|r| r.tuple_id());
    whole.sort_by_key(|r| r.tuple_id());
    assert_eq!(merged, whole);
}

/// Cost monotonicity: accumulated cost never shrinks along the tree.
#[test]
fn total_cost_is_monotone() {
    let fixture = Fixture::new();
    let entity = pairs_entity();
    fixture.register(entity.clone());
    let ctx = fixture.planner_ctx();

    let label = entity.column(&Name::column("s", "pairs", "label").unwrap()).unwrap();
    let logical = LogicalPlanBuilder::scan(entity.as_ref(), None)
        .unwrap()
        .filter(BooleanPredicate::from(AtomicPredicate::new(
            Binding::Column(label.clone()),
            ComparisonOperator::Equal,
            vec![Binding::Literal(fixture.bindings.literal(Value::from("a")))],
        )))
        .select_distinct(vec![label])
        .limit(1)
        .build();
    let physical = fixture.plan(&logical, 1);

    fn walk(plan: &PhysicalPlan, ctx: &PlannerContext, policy: &CostPolicy) {
        let own = plan.cost(ctx);
        assert!(own.io >= 0.0 && own.cpu >= 0.0 && own.memory >= 0.0 && own.accuracy >= 0.0);
        let total = policy.score(&plan.total_cost(ctx));
        for input in plan.inputs() {
            let input_total = policy.score(&input.total_cost(ctx));
            assert!(
                total >= input_total,
                "{} has total score {} below its input's {}",
                plan.name(),
                total,
                input_total
            );
            walk(input, ctx, policy);
        }
    }
    walk(&physical, &ctx, &CostPolicy::default());
}

#[tokio::test]
async fn cancellation_terminates_execution_and_rolls_back() {
    let fixture = Fixture::new();
    let entity = digits_entity();
    fixture.register(entity.clone());

    let logical = LogicalPlanBuilder::scan(entity.as_ref(), None).unwrap().build();
    let physical = fixture.plan(&logical, 1);

    let ctx = fixture.query_ctx(TransactionMode::ReadOnly);
    let stream = physical.execute(&ctx).unwrap();
    ctx.txn.cancel();
    let err = collect(stream).await.unwrap_err();
    assert!(matches!(err, QueryError::Cancelled));
    ctx.txn.rollback().await.unwrap();
}

#[tokio::test]
async fn count_pushdown_answers_from_metadata() {
    let fixture = Fixture::new();
    let entity = digits_entity();
    fixture.register(entity.clone());

    let logical = LogicalPlanBuilder::scan(entity.as_ref(), None)
        .unwrap()
        .count()
        .build();
    let physical = fixture.plan(&logical, 1);
    assert!(
        matches!(physical, PhysicalPlan::CountEntity(_)),
        "expected a metadata count:\n{}",
        physical
    );
    let records = fixture.run(&physical).await;
    assert_eq!(records[0].values()[0], Value::Long(10));
}
