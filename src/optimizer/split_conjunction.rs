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

//! Splitting of conjunctive filters.
//!
//! `Filter(A ∧ B)` is equivalent to two stacked filters, and both stacking
//! orders are produced (one per rule) so that pushdown and index matching
//! can work on each conjunct independently.

use std::sync::Arc;

use crate::error::Result;
use crate::logical_plan::{Filter, LogicalPlan};
use crate::optimizer::{map_children, RewriteRule};
use crate::predicate::BooleanPredicate;

/// Flatten nested conjunctions into their conjuncts, left to right.
fn conjuncts(predicate: &BooleanPredicate, out: &mut Vec<BooleanPredicate>) {
    match predicate {
        BooleanPredicate::Conjunction(left, right) => {
            conjuncts(left, out);
            conjuncts(right, out);
        }
        other => out.push(other.clone()),
    }
}

fn split_filters(plan: &LogicalPlan, left_first: bool) -> Result<Option<LogicalPlan>> {
    let recurse = |child: &LogicalPlan| split_filters(child, left_first);
    match plan {
        LogicalPlan::Filter(filter)
            if matches!(filter.predicate, BooleanPredicate::Conjunction(..)) =>
        {
            let mut parts = vec![];
            conjuncts(&filter.predicate, &mut parts);
            if !left_first {
                parts.reverse();
            }
            let mut current = match split_filters(&filter.input, left_first)? {
                Some(new) => new,
                None => filter.input.as_ref().clone(),
            };
            for predicate in parts {
                current = LogicalPlan::Filter(Filter {
                    input: Arc::new(current),
                    predicate,
                });
            }
            Ok(Some(current))
        }
        other => map_children(other, recurse),
    }
}

fn has_conjunctive_filter(plan: &LogicalPlan) -> bool {
    if let LogicalPlan::Filter(filter) = plan {
        if matches!(filter.predicate, BooleanPredicate::Conjunction(..)) {
            return true;
        }
    }
    plan.inputs().iter().any(|i| has_conjunctive_filter(i))
}

/// Split conjunctive filters with the left conjunct applied first.
#[derive(Default)]
pub struct LeftConjunctionRewrite {}

impl LeftConjunctionRewrite {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {}
    }
}

impl RewriteRule for LeftConjunctionRewrite {
    fn name(&self) -> &str {
        "left_conjunction_rewrite"
    }

    fn can_be_applied(&self, plan: &LogicalPlan) -> bool {
        has_conjunctive_filter(plan)
    }

    fn apply(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        split_filters(plan, true)
    }
}

/// Split conjunctive filters with the right conjunct applied first.
#[derive(Default)]
pub struct RightConjunctionRewrite {}

impl RightConjunctionRewrite {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {}
    }
}

impl RewriteRule for RightConjunctionRewrite {
    fn name(&self) -> &str {
        "right_conjunction_rewrite"
    }

    fn can_be_applied(&self, plan: &LogicalPlan) -> bool {
        has_conjunctive_filter(plan)
    }

    fn apply(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        split_filters(plan, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingContext;
    use crate::logical_plan::{display_plan, LogicalPlanBuilder};
    use crate::scalar::Value;
    use crate::test_util::{equals, test_columns, test_entity};

    fn conjunctive_plan() -> LogicalPlan {
        let entity = test_entity();
        let ctx = BindingContext::new();
        let columns = test_columns();
        LogicalPlanBuilder::scan(entity.as_ref(), None)
            .unwrap()
            .filter(
                equals(&ctx, columns[0].clone(), Value::Long(1))
                    .and(equals(&ctx, columns[1].clone(), Value::from("a"))),
            )
            .build()
    }

    #[test]
    fn left_split_applies_left_conjunct_first() {
        let plan = conjunctive_plan();
        let rewritten = LeftConjunctionRewrite::new().apply(&plan).unwrap().unwrap();
        let expected = "Filter: label = ?1\
        \n  Filter: id = ?0\
        \n    EntityScan: warren.s.e [id, label, score]";
        assert_eq!(display_plan(&rewritten), expected);
    }

    #[test]
    fn right_split_applies_right_conjunct_first() {
        let plan = conjunctive_plan();
        let rewritten = RightConjunctionRewrite::new().apply(&plan).unwrap().unwrap();
        let expected = "Filter: id = ?0\
        \n  Filter: label = ?1\
        \n    EntityScan: warren.s.e [id, label, score]";
        assert_eq!(display_plan(&rewritten), expected);
    }

    #[test]
    fn split_is_idempotent() {
        let plan = conjunctive_plan();
        let rule = LeftConjunctionRewrite::new();
        let once = rule.apply(&plan).unwrap().unwrap();
        assert!(rule.apply(&once).unwrap().is_none());
    }

    #[test]
    fn disjunctions_are_left_intact() {
        let entity = test_entity();
        let ctx = BindingContext::new();
        let columns = test_columns();
        let plan = LogicalPlanBuilder::scan(entity.as_ref(), None)
            .unwrap()
            .filter(
                equals(&ctx, columns[0].clone(), Value::Long(1))
                    .or(equals(&ctx, columns[1].clone(), Value::from("a"))),
            )
            .build();
        assert!(LeftConjunctionRewrite::new().apply(&plan).unwrap().is_none());
    }
}
