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

//! Logical rewrite rules and the driver that applies them to a fixed point.
//!
//! Every rule is a deterministic, idempotent tree-to-tree function. The
//! driver computes the closure of the rule set over the seed tree: candidate
//! trees are deduplicated structurally and the loop ends once a full pass
//! produces nothing new.

mod count_pushdown;
mod defer_fetch;
mod split_conjunction;

pub use count_pushdown::CountPushdown;
pub use defer_fetch::{DeferFetchOnFetch, DeferFetchOnScan};
pub use split_conjunction::{LeftConjunctionRewrite, RightConjunctionRewrite};

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::logical_plan::{from_plan, LogicalPlan};

/// A logical-to-logical rewrite rule.
pub trait RewriteRule: Send + Sync {
    /// A readable name for logging.
    fn name(&self) -> &str;

    /// Cheap applicability test.
    fn can_be_applied(&self, plan: &LogicalPlan) -> bool;

    /// Apply the rule exhaustively. Returns `None` when the tree is already
    /// in the rule's normal form, so `apply(apply(t)) == apply(t)` by
    /// construction.
    fn apply(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>>;
}

/// Apply `f` to every input of `plan` and rebuild it if anything changed.
/// The default recursion step of a rewrite rule.
pub fn map_children<F>(plan: &LogicalPlan, f: F) -> Result<Option<LogicalPlan>>
where
    F: Fn(&LogicalPlan) -> Result<Option<LogicalPlan>>,
{
    let mut changed = false;
    let mut inputs = Vec::with_capacity(plan.inputs().len());
    for input in plan.inputs() {
        match f(input)? {
            Some(new) => {
                changed = true;
                inputs.push(Arc::new(new));
            }
            None => inputs.push(input.clone()),
        }
    }
    if changed {
        Ok(Some(from_plan(plan, &inputs)?))
    } else {
        Ok(None)
    }
}

/// The rewrite phase of the planner.
pub struct Optimizer {
    rules: Vec<Arc<dyn RewriteRule>>,
}

impl Optimizer {
    /// An optimizer with the stock rule set.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Arc::new(LeftConjunctionRewrite::new()),
                Arc::new(RightConjunctionRewrite::new()),
                Arc::new(DeferFetchOnScan::new()),
                Arc::new(DeferFetchOnFetch::new()),
                Arc::new(CountPushdown::new()),
            ],
        }
    }

    /// An optimizer with a custom rule set.
    pub fn with_rules(rules: Vec<Arc<dyn RewriteRule>>) -> Self {
        Self { rules }
    }

    /// The set of equivalent logical trees reachable from `plan`, the seed
    /// tree included and always first.
    pub fn rewrite(&self, plan: &LogicalPlan) -> Result<Vec<LogicalPlan>> {
        let mut candidates = vec![plan.clone()];
        let mut seen: HashSet<LogicalPlan> = candidates.iter().cloned().collect();
        let mut frontier = vec![plan.clone()];
        while !frontier.is_empty() {
            let mut next = vec![];
            for tree in &frontier {
                for rule in &self.rules {
                    if !rule.can_be_applied(tree) {
                        continue;
                    }
                    if let Some(rewritten) = rule.apply(tree)? {
                        if seen.insert(rewritten.clone()) {
                            debug!(
                                "rule {} produced a new candidate tree",
                                rule.name()
                            );
                            candidates.push(rewritten.clone());
                            next.push(rewritten);
                        }
                    }
                }
            }
            frontier = next;
        }
        debug!("rewrite phase produced {} candidate trees", candidates.len());
        Ok(candidates)
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
