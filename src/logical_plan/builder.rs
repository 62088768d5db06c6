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

//! A fluent builder for logical plans, the construction surface the binder
//! collaborator targets.

use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::binding::{Binding, GroupId};
use crate::datasource::Entity;
use crate::error::{QueryError, Result};
use crate::logical_plan::{
    Aggregate, AggregateFunction, Count, CountEntity, Delete, EntitySample, EntityScan, Exists,
    Fetch, Filter, FilterOnSubSelect, Function, FunctionExpr, Insert, Limit, LogicalPlan,
    Proximity, Select, SelectDistinct, Skip, Sort, Subquery, Update,
};
use crate::model::{ColumnDef, Name};
use crate::predicate::{BooleanPredicate, ProximityPredicate};
use crate::scalar::Value;
use crate::traits::Order;

/// Builder for [`LogicalPlan`]s.
///
/// ```
/// # use std::sync::Arc;
/// # use warren::logical_plan::LogicalPlanBuilder;
/// # use warren::test_util::test_entity;
/// let entity = test_entity();
/// let plan = LogicalPlanBuilder::scan(entity.as_ref(), None)
///     .unwrap()
///     .limit(10)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct LogicalPlanBuilder {
    plan: LogicalPlan,
}

impl LogicalPlanBuilder {
    /// Continue building from an existing plan.
    pub fn from(plan: LogicalPlan) -> Self {
        Self { plan }
    }

    /// A full scan of an entity. `columns` of `None` scans all columns.
    pub fn scan(entity: &dyn Entity, columns: Option<Vec<Name>>) -> Result<Self> {
        Self::scan_with_group(entity, columns, GroupId(0))
    }

    /// A full scan assigned to an explicit group, used for subqueries.
    pub fn scan_with_group(
        entity: &dyn Entity,
        columns: Option<Vec<Name>>,
        group: GroupId,
    ) -> Result<Self> {
        Ok(Self {
            plan: LogicalPlan::EntityScan(EntityScan {
                entity: entity.name().clone(),
                columns: resolve_columns(entity, columns)?,
                group,
            }),
        })
    }

    /// A Bernoulli sample of an entity with probability `p` and a fixed
    /// seed.
    pub fn sample(
        entity: &dyn Entity,
        columns: Option<Vec<Name>>,
        probability: f64,
        seed: u64,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(QueryError::NotSupported(format!(
                "sampling probability {} is outside [0, 1]",
                probability
            )));
        }
        Ok(Self {
            plan: LogicalPlan::EntitySample(EntitySample {
                entity: entity.name().clone(),
                columns: resolve_columns(entity, columns)?,
                probability: OrderedFloat(probability),
                seed,
                group: GroupId(0),
            }),
        })
    }

    /// A metadata count of an entity.
    pub fn count_entity(entity: &dyn Entity) -> Self {
        Self {
            plan: LogicalPlan::CountEntity(CountEntity {
                entity: entity.name().clone(),
                group: GroupId(0),
            }),
        }
    }

    /// Insert literal rows into an entity.
    pub fn insert(entity: &dyn Entity, columns: Vec<ColumnDef>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            plan: LogicalPlan::Insert(Insert {
                entity: entity.name().clone(),
                columns,
                rows,
                group: GroupId(0),
            }),
        }
    }

    pub fn filter(self, predicate: BooleanPredicate) -> Self {
        Self {
            plan: LogicalPlan::Filter(Filter {
                input: Arc::new(self.plan),
                predicate,
            }),
        }
    }

    /// Filter through a predicate that depends on subqueries; each subquery
    /// must carry the group its bindings reference.
    pub fn filter_on_subselect(
        self,
        predicate: BooleanPredicate,
        subqueries: Vec<(GroupId, LogicalPlan)>,
    ) -> Self {
        Self {
            plan: LogicalPlan::FilterOnSubSelect(FilterOnSubSelect {
                input: Arc::new(self.plan),
                predicate,
                subqueries: subqueries
                    .into_iter()
                    .map(|(group, plan)| Subquery {
                        group,
                        plan: Arc::new(plan),
                    })
                    .collect(),
            }),
        }
    }

    pub fn proximity(self, predicate: ProximityPredicate) -> Self {
        Self {
            plan: LogicalPlan::Proximity(Proximity {
                input: Arc::new(self.plan),
                predicate,
            }),
        }
    }

    pub fn select(self, columns: Vec<ColumnDef>) -> Self {
        Self {
            plan: LogicalPlan::Select(Select {
                input: Arc::new(self.plan),
                columns,
            }),
        }
    }

    pub fn select_distinct(self, columns: Vec<ColumnDef>) -> Self {
        Self {
            plan: LogicalPlan::SelectDistinct(SelectDistinct {
                input: Arc::new(self.plan),
                columns,
            }),
        }
    }

    pub fn count(self) -> Self {
        Self {
            plan: LogicalPlan::Count(Count {
                input: Arc::new(self.plan),
            }),
        }
    }

    pub fn exists(self) -> Self {
        Self {
            plan: LogicalPlan::Exists(Exists {
                input: Arc::new(self.plan),
            }),
        }
    }

    pub fn aggregate(self, function: AggregateFunction, columns: Vec<ColumnDef>) -> Self {
        Self {
            plan: LogicalPlan::Aggregate(Aggregate {
                input: Arc::new(self.plan),
                function,
                columns,
            }),
        }
    }

    /// Apply a materialising function, appending its result as `out`.
    pub fn function(self, function: FunctionExpr, out: ColumnDef) -> Self {
        Self {
            plan: LogicalPlan::Function(Function {
                input: Arc::new(self.plan),
                function,
                out,
            }),
        }
    }

    pub fn limit(self, limit: u64) -> Self {
        Self {
            plan: LogicalPlan::Limit(Limit {
                input: Arc::new(self.plan),
                limit,
            }),
        }
    }

    pub fn skip(self, skip: u64) -> Self {
        Self {
            plan: LogicalPlan::Skip(Skip {
                input: Arc::new(self.plan),
                skip,
            }),
        }
    }

    pub fn sort(self, order: Order) -> Self {
        Self {
            plan: LogicalPlan::Sort(Sort {
                input: Arc::new(self.plan),
                order,
            }),
        }
    }

    pub fn update(self, entity: &Name, assignments: Vec<(ColumnDef, Binding)>) -> Self {
        Self {
            plan: LogicalPlan::Update(Update {
                input: Arc::new(self.plan),
                entity: entity.clone(),
                assignments,
            }),
        }
    }

    pub fn delete(self, entity: &Name) -> Self {
        Self {
            plan: LogicalPlan::Delete(Delete {
                input: Arc::new(self.plan),
                entity: entity.clone(),
            }),
        }
    }

    pub fn build(self) -> LogicalPlan {
        self.plan
    }
}

fn resolve_columns(entity: &dyn Entity, columns: Option<Vec<Name>>) -> Result<Vec<ColumnDef>> {
    match columns {
        None => Ok(entity.columns()),
        Some(names) => {
            let mut resolved = vec![];
            for name in names {
                if name.is_wildcard() {
                    resolved.extend(entity.columns());
                } else {
                    resolved.push(entity.column(&name)?);
                }
            }
            Ok(resolved)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical_plan::display_plan;
    use crate::test_util::test_entity;

    #[test]
    fn wildcard_resolves_to_all_columns() {
        let entity = test_entity();
        let plan = LogicalPlanBuilder::scan(
            entity.as_ref(),
            Some(vec![Name::column("s", "e", "*").unwrap()]),
        )
        .unwrap()
        .build();
        assert_eq!(plan.columns().len(), 3);
    }

    #[test]
    fn sampling_probability_is_validated() {
        let entity = test_entity();
        assert!(LogicalPlanBuilder::sample(entity.as_ref(), None, 1.5, 42).is_err());
    }

    #[test]
    fn skip_then_limit_builds_the_expected_shape() {
        let entity = test_entity();
        let plan = LogicalPlanBuilder::scan(entity.as_ref(), None)
            .unwrap()
            .skip(3)
            .limit(4)
            .build();
        let expected = "Limit: 4\
        \n  Skip: 3\
        \n    EntityScan: warren.s.e [id, label, score]";
        assert_eq!(display_plan(&plan), expected);
    }
}
