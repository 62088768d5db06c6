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

//! The cost-based query planner.
//!
//! Planning runs in three phases: logical rewriting to a fixed point
//! (`optimizer`), implementation of every logical candidate into one or
//! more physical candidates, and physical refinement (`physical_optimizer`).
//! The cheapest executable candidate under the active policy wins, is
//! partitioned where profitable, and lands in the plan cache.

mod cache;

pub use cache::PlanCache;

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use parking_lot::Mutex;

use crate::config::SessionConfig;
use crate::cost::{Cost, CostPolicy};
use crate::datasource::{Catalog, Entity, Index};
use crate::error::{QueryError, Result};
use crate::function::{FunctionRegistry, Signature};
use crate::logical_plan::LogicalPlan;
use crate::model::Name;
use crate::optimizer::Optimizer;
use crate::physical_optimizer::{try_partition, BooleanIndexScan, PhysicalOptimizerRule};
use crate::physical_plan::{
    AggregateExec, CountEntityExec, CountExec, DeleteExec, EntitySampleExec, EntityScanExec,
    ExistsExec, FetchExec, FilterExec, FilterOnSubSelectExec, FunctionExec, IndexScanExec,
    InsertExec, KnnExec, LimitExec, PhysicalPlan, SelectDistinctExec, SelectExec, SkipExec,
    SortExec, SubqueryExec, UpdateExec,
};
use crate::predicate::{BooleanPredicate, Predicate};
use crate::statistics::ValueStatistics;

/// Catalogue access, statistics and the cost policy for one planning run.
/// Entity resolutions are memoised.
pub struct PlannerContext {
    catalog: Arc<dyn Catalog>,
    functions: Arc<FunctionRegistry>,
    policy: CostPolicy,
    entities: Mutex<HashMap<Name, Arc<dyn Entity>>>,
}

impl PlannerContext {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        functions: Arc<FunctionRegistry>,
        policy: CostPolicy,
    ) -> Self {
        Self {
            catalog,
            functions,
            policy,
            entities: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &CostPolicy {
        &self.policy
    }

    pub fn entity(&self, name: &Name) -> Result<Arc<dyn Entity>> {
        let mut entities = self.entities.lock();
        if let Some(entity) = entities.get(name) {
            return Ok(entity.clone());
        }
        let entity = self.catalog.entity(name)?;
        entities.insert(name.clone(), entity.clone());
        Ok(entity)
    }

    pub fn indexes(&self, entity: &Name) -> Result<Vec<Arc<dyn Index>>> {
        Ok(self.entity(entity)?.indexes())
    }

    /// Row-count estimate; unknown entities estimate to zero.
    pub fn row_count(&self, entity: &Name) -> u64 {
        self.entity(entity).map(|e| e.row_count()).unwrap_or(0)
    }

    /// Statistics for every column a predicate reads.
    pub fn statistics_for(&self, predicate: &BooleanPredicate) -> HashMap<Name, ValueStatistics> {
        let mut statistics = HashMap::new();
        for column in predicate.columns() {
            let Some(entity_name) = column.name.entity_name() else {
                continue;
            };
            if let Ok(entity) = self.entity(&entity_name) {
                if let Some(stats) = entity.statistics(&column.name) {
                    statistics.insert(column.name.clone(), stats);
                }
            }
        }
        statistics
    }

    /// Same as [`statistics_for`](Self::statistics_for); the entity argument
    /// merely anchors unqualified lookups.
    pub fn statistics(
        &self,
        _entity: &Name,
        predicate: &BooleanPredicate,
    ) -> HashMap<Name, ValueStatistics> {
        self.statistics_for(predicate)
    }

    /// The cost an index reports for a predicate, if the index exists.
    pub fn index_cost(&self, entity: &Name, index: &Name, predicate: &Predicate) -> Option<Cost> {
        self.indexes(entity)
            .ok()?
            .into_iter()
            .find(|i| i.name() == index)
            .map(|i| i.cost(predicate))
    }

    /// Per-invocation floating point cost of a function.
    pub fn function_flops(&self, signature: &Signature) -> f64 {
        self.functions
            .obtain(signature)
            .map(|f| f.flops())
            .unwrap_or(1.0)
    }
}

/// The three-phase planner with its plan cache.
pub struct QueryPlanner {
    optimizer: Optimizer,
    physical_rules: Vec<Arc<dyn PhysicalOptimizerRule>>,
    cache: PlanCache,
    config: SessionConfig,
}

impl QueryPlanner {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            optimizer: Optimizer::new(),
            physical_rules: vec![Arc::new(BooleanIndexScan::new())],
            cache: PlanCache::new(config.plan_cache_capacity),
            config,
        }
    }

    /// The cached-plan count, exposed for cache coherence tests.
    pub fn cached_plans(&self) -> usize {
        self.cache.len()
    }

    /// Plan a logical tree and select the cheapest physical plan.
    ///
    /// `bypass_cache` forces a recompute even on a cache hit; `cache`
    /// controls whether the result is stored.
    pub fn plan_and_select(
        &self,
        plan: &LogicalPlan,
        ctx: &PlannerContext,
        bypass_cache: bool,
        cache: bool,
    ) -> Result<PhysicalPlan> {
        plan.validate()?;
        let digest = plan.digest();
        if !bypass_cache {
            if let Some(hit) = self.cache.get(digest) {
                debug!("plan cache hit for digest {:x}", digest);
                return Ok(hit);
            }
        }

        // Phase 1: logical rewriting to a fixed point.
        let logical_candidates = self.optimizer.rewrite(plan)?;

        // Phase 2: implementation.
        let mut candidates = vec![];
        for logical in &logical_candidates {
            candidates.extend(implement(logical, ctx)?);
        }

        // Phase 3: physical refinement.
        let mut refined = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            for rule in &self.physical_rules {
                candidate = rule.optimize(candidate, ctx)?;
            }
            refined.push(candidate);
        }

        // Selection: the minimum score under the active policy.
        let policy = ctx.policy();
        let best = refined
            .into_iter()
            .map(|candidate| {
                let score = policy.score(&candidate.total_cost(ctx));
                (score, candidate)
            })
            .filter(|(score, _)| score.is_finite())
            .min_by(|(a, _), (b, _)| a.total_cmp(b));
        let (score, best) = best.ok_or_else(|| {
            QueryError::NotSupported("no executable physical plan was found".to_string())
        })?;
        debug!(
            "selected plan with score {:.6} out of {} logical candidates",
            score,
            logical_candidates.len()
        );

        // Partition where the policy judges it profitable.
        let best = try_partition(&best, ctx, self.config.target_partitions)?;

        if cache {
            self.cache.put(digest, best.clone());
        }
        Ok(best)
    }

    /// The selected plan's display form together with its cost, for
    /// inspection by the surrounding service.
    pub fn explain(&self, plan: &LogicalPlan, ctx: &PlannerContext) -> Result<String> {
        let physical = self.plan_and_select(plan, ctx, true, false)?;
        let cost = physical.total_cost(ctx);
        Ok(format!(
            "{}\ncost: io={:.3} cpu={:.3} memory={:.3} accuracy={:.3} score={:.6}",
            physical,
            cost.io,
            cost.cpu,
            cost.memory,
            cost.accuracy,
            ctx.policy().score(&cost)
        ))
    }
}

/// Phase 2: implement a logical node into its physical candidates.
fn implement(plan: &LogicalPlan, ctx: &PlannerContext) -> Result<Vec<PhysicalPlan>> {
    Ok(match plan {
        LogicalPlan::EntityScan(n) => vec![PhysicalPlan::EntityScan(EntityScanExec {
            entity: n.entity.clone(),
            columns: n.columns.clone(),
            partition: None,
            group: n.group,
        })],
        LogicalPlan::EntitySample(n) => vec![PhysicalPlan::EntitySample(EntitySampleExec {
            entity: n.entity.clone(),
            columns: n.columns.clone(),
            probability: n.probability,
            seed: n.seed,
            partition: None,
            group: n.group,
        })],
        LogicalPlan::IndexScan(n) => {
            let index = ctx
                .indexes(&n.entity)?
                .into_iter()
                .find(|i| i.name() == &n.index)
                .ok_or_else(|| {
                    QueryError::Execution(format!("index {} does not exist", n.index))
                })?;
            if !index.can_process(&n.predicate) {
                return Err(QueryError::NotSupported(format!(
                    "index {} cannot process predicate {}",
                    n.index, n.predicate
                )));
            }
            vec![PhysicalPlan::IndexScan(IndexScanExec {
                entity: n.entity.clone(),
                index: n.index.clone(),
                predicate: n.predicate.clone(),
                columns: index.columns_for(&n.predicate),
                index_traits: index.traits_for(&n.predicate),
                partition: None,
                group: n.group,
            })]
        }
        LogicalPlan::Fetch(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Fetch(FetchExec {
                input,
                entity: n.entity.clone(),
                fetch: n.fetch.clone(),
            })
        })?,
        LogicalPlan::Filter(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Filter(FilterExec {
                input,
                predicate: n.predicate.clone(),
            })
        })?,
        LogicalPlan::FilterOnSubSelect(n) => {
            let mains = implement(&n.input, ctx)?;
            // Every combination of one candidate per subquery.
            let per_subquery: Vec<Vec<SubqueryExec>> = n
                .subqueries
                .iter()
                .map(|subquery| {
                    Ok(implement(&subquery.plan, ctx)?
                        .into_iter()
                        .map(|plan| SubqueryExec {
                            group: subquery.group,
                            plan: Arc::new(plan),
                        })
                        .collect())
                })
                .collect::<Result<_>>()?;
            let combinations: Vec<Vec<SubqueryExec>> = if per_subquery.is_empty() {
                vec![vec![]]
            } else {
                per_subquery
                    .iter()
                    .multi_cartesian_product()
                    .map(|combination| combination.into_iter().cloned().collect())
                    .collect()
            };
            let mut out = vec![];
            for main in &mains {
                for subqueries in &combinations {
                    out.push(PhysicalPlan::FilterOnSubSelect(FilterOnSubSelectExec {
                        input: Arc::new(main.clone()),
                        predicate: n.predicate.clone(),
                        subqueries: subqueries.clone(),
                    }));
                }
            }
            out
        }
        LogicalPlan::Proximity(n) => {
            let mut out = vec![];
            for input in implement(&n.input, ctx)? {
                out.push(PhysicalPlan::Knn(KnnExec {
                    input: Arc::new(input),
                    predicate: n.predicate.clone(),
                }));
            }
            // A proximity index can replace the whole subtree when the
            // input is a bare scan of the same entity.
            if let LogicalPlan::EntityScan(scan) = n.input.as_ref() {
                let predicate = Predicate::Proximity(n.predicate.clone());
                for index in ctx.indexes(&scan.entity)? {
                    if !index.can_process(&predicate) {
                        continue;
                    }
                    if index.cost(&predicate).is_invalid() {
                        continue;
                    }
                    let provided = index.columns_for(&predicate);
                    let candidate = PhysicalPlan::IndexScan(IndexScanExec {
                        entity: scan.entity.clone(),
                        index: index.name().clone(),
                        predicate: predicate.clone(),
                        columns: provided.clone(),
                        index_traits: index.traits_for(&predicate),
                        partition: None,
                        group: scan.group,
                    });
                    let missing: Vec<_> = scan
                        .columns
                        .iter()
                        .filter(|c| !provided.iter().any(|p| p.name.matches(&c.name)))
                        .cloned()
                        .collect();
                    out.push(if missing.is_empty() {
                        candidate
                    } else {
                        PhysicalPlan::Fetch(FetchExec {
                            input: Arc::new(candidate),
                            entity: scan.entity.clone(),
                            fetch: missing,
                        })
                    });
                }
            }
            out
        }
        LogicalPlan::Select(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Select(SelectExec {
                input,
                columns: n.columns.clone(),
            })
        })?,
        LogicalPlan::SelectDistinct(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::SelectDistinct(SelectDistinctExec {
                input,
                columns: n.columns.clone(),
            })
        })?,
        LogicalPlan::Count(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Count(CountExec { input })
        })?,
        LogicalPlan::CountEntity(n) => vec![PhysicalPlan::CountEntity(CountEntityExec {
            entity: n.entity.clone(),
            group: n.group,
        })],
        LogicalPlan::Exists(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Exists(ExistsExec { input })
        })?,
        LogicalPlan::Aggregate(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Aggregate(AggregateExec {
                input,
                function: n.function,
                columns: n.columns.clone(),
            })
        })?,
        LogicalPlan::Function(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Function(FunctionExec {
                input,
                function: n.function.clone(),
                out: n.out.clone(),
            })
        })?,
        LogicalPlan::Limit(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Limit(LimitExec {
                input,
                limit: n.limit,
            })
        })?,
        LogicalPlan::Skip(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Skip(SkipExec {
                input,
                skip: n.skip,
            })
        })?,
        LogicalPlan::Sort(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Sort(SortExec {
                input,
                order: n.order.clone(),
            })
        })?,
        LogicalPlan::Insert(n) => vec![PhysicalPlan::Insert(InsertExec {
            entity: n.entity.clone(),
            columns: n.columns.clone(),
            rows: n.rows.clone(),
            group: n.group,
        })],
        LogicalPlan::Update(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Update(UpdateExec {
                input,
                entity: n.entity.clone(),
                assignments: n.assignments.clone(),
            })
        })?,
        LogicalPlan::Delete(n) => unary(plan, ctx, &n.input, |input| {
            PhysicalPlan::Delete(DeleteExec {
                input,
                entity: n.entity.clone(),
            })
        })?,
    })
}

fn unary<F>(
    _plan: &LogicalPlan,
    ctx: &PlannerContext,
    input: &Arc<LogicalPlan>,
    build: F,
) -> Result<Vec<PhysicalPlan>>
where
    F: Fn(Arc<PhysicalPlan>) -> PhysicalPlan,
{
    Ok(implement(input, ctx)?
        .into_iter()
        .map(|input| build(Arc::new(input)))
        .collect())
}
