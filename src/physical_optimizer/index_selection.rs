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

//! Boolean index selection.
//!
//! Wherever a `FilterExec` sits directly on an `EntityScanExec`, every index
//! of the entity is asked whether it can process the predicate. The
//! cheapest index that beats the scan-plus-filter alternative replaces the
//! subtree; columns the index does not provide are re-attached through a
//! `FetchExec`. Ties between indexes prefer the one whose traits serve
//! downstream order and limit demands.

use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::physical_plan::{
    with_inputs, EntityScanExec, FetchExec, FilterExec, IndexScanExec, PhysicalPlan,
};
use crate::planner::PlannerContext;
use crate::physical_optimizer::PhysicalOptimizerRule;
use crate::predicate::Predicate;

#[derive(Default)]
pub struct BooleanIndexScan {}

impl BooleanIndexScan {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {}
    }

    fn transform(&self, plan: &PhysicalPlan, ctx: &PlannerContext) -> Result<PhysicalPlan> {
        if let PhysicalPlan::Filter(filter) = plan {
            if let PhysicalPlan::EntityScan(scan) = filter.input.as_ref() {
                if let Some(replacement) = self.replace(filter, scan, ctx)? {
                    return Ok(replacement);
                }
            }
        }
        let mut inputs = vec![];
        for input in plan.inputs() {
            inputs.push(Arc::new(self.transform(input, ctx)?));
        }
        with_inputs(plan, &inputs)
    }

    fn replace(
        &self,
        filter: &FilterExec,
        scan: &EntityScanExec,
        ctx: &PlannerContext,
    ) -> Result<Option<PhysicalPlan>> {
        let predicate = Predicate::Boolean(filter.predicate.clone());
        let policy = ctx.policy();
        let alternative = PhysicalPlan::Filter(filter.clone());
        let alternative_score = policy.score(&alternative.total_cost(ctx));

        let mut best: Option<(f64, PhysicalPlan)> = None;
        for index in ctx.indexes(&scan.entity)? {
            if !index.can_process(&predicate) {
                continue;
            }
            let cost = index.cost(&predicate);
            if cost.is_invalid() {
                continue;
            }
            let score = policy.score(&cost);
            if score >= alternative_score {
                continue;
            }
            let traits = index.traits_for(&predicate);
            let provided = index.columns_for(&predicate);
            let candidate = PhysicalPlan::IndexScan(IndexScanExec {
                entity: scan.entity.clone(),
                index: index.name().clone(),
                predicate: predicate.clone(),
                columns: provided.clone(),
                index_traits: traits.clone(),
                partition: scan.partition,
                group: scan.group,
            });
            // Re-attach the scan columns the index does not produce.
            let missing: Vec<_> = scan
                .columns
                .iter()
                .filter(|c| !provided.iter().any(|p| p.name.matches(&c.name)))
                .cloned()
                .collect();
            let candidate = if missing.is_empty() {
                candidate
            } else {
                PhysicalPlan::Fetch(FetchExec {
                    input: Arc::new(candidate),
                    entity: scan.entity.clone(),
                    fetch: missing,
                })
            };
            let better = match &best {
                None => true,
                Some((best_score, best_plan)) => {
                    score < *best_score
                        || (score == *best_score
                            && !traits_help(best_plan)
                            && (traits.order.is_some() || traits.limit.is_some()))
                }
            };
            if better {
                best = Some((score, candidate));
            }
        }
        if let Some((score, plan)) = best {
            debug!(
                "replacing filtered scan of {} with an index access (score {:.3} < {:.3})",
                scan.entity, score, alternative_score
            );
            return Ok(Some(plan));
        }
        Ok(None)
    }
}

fn traits_help(plan: &PhysicalPlan) -> bool {
    let traits = plan.traits();
    traits.order.is_some() || traits.limit.is_some()
}

impl PhysicalOptimizerRule for BooleanIndexScan {
    fn name(&self) -> &str {
        "boolean_index_scan"
    }

    fn optimize(&self, plan: PhysicalPlan, ctx: &PlannerContext) -> Result<PhysicalPlan> {
        self.transform(&plan, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingContext, GroupId};
    use crate::cost::CostPolicy;
    use crate::function::FunctionRegistry;
    use crate::model::Name;
    use crate::scalar::Value;
    use crate::test_util::{equals, test_catalog, test_columns, test_entity};

    fn context_with(catalog: Arc<crate::datasource::memory::MemCatalog>) -> PlannerContext {
        PlannerContext::new(
            catalog,
            Arc::new(FunctionRegistry::new()),
            CostPolicy::default(),
        )
    }

    fn filtered_scan(bindings: &BindingContext) -> PhysicalPlan {
        PhysicalPlan::Filter(FilterExec {
            input: Arc::new(PhysicalPlan::EntityScan(EntityScanExec {
                entity: Name::entity("s", "e").unwrap(),
                columns: test_columns(),
                partition: None,
                group: GroupId(0),
            })),
            predicate: equals(bindings, test_columns()[0].clone(), Value::Long(3)),
        })
    }

    #[test]
    fn cheaper_index_replaces_the_filtered_scan() {
        let entity = test_entity();
        entity
            .create_hash_index(Name::index("s", "e", "id_idx").unwrap(), &test_columns()[0].name)
            .unwrap();
        let catalog = Arc::new(crate::datasource::memory::MemCatalog::new());
        catalog.register(entity);
        let ctx = context_with(catalog);

        let bindings = BindingContext::new();
        let optimized = BooleanIndexScan::new()
            .optimize(filtered_scan(&bindings), &ctx)
            .unwrap();
        // The index provides only `id`; the other columns come back through
        // a fetch.
        let expected = "FetchExec: [label, score]\
        \n  IndexScanExec: warren.s.e.id_idx predicate=id = ?0";
        assert_eq!(format!("{}", optimized), expected);
    }

    #[test]
    fn without_an_index_the_plan_is_unchanged() {
        let ctx = context_with(test_catalog());
        let bindings = BindingContext::new();
        let plan = filtered_scan(&bindings);
        let optimized = BooleanIndexScan::new().optimize(plan.clone(), &ctx).unwrap();
        assert_eq!(optimized, plan);
    }
}
