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

//! Indented, line-per-operator display of logical plans, the format the
//! planner tests assert against.

use std::fmt;

use crate::logical_plan::LogicalPlan;
use crate::model::ColumnDef;

/// The display form of a plan as a `String`.
pub fn display_plan(plan: &LogicalPlan) -> String {
    format!("{}", plan)
}

fn simple_names(columns: &[ColumnDef]) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.simple_name()).collect();
    names.join(", ")
}

pub(crate) fn fmt_plan(
    plan: &LogicalPlan,
    f: &mut fmt::Formatter,
    indent: usize,
) -> fmt::Result {
    if indent > 0 {
        writeln!(f)?;
        write!(f, "{}", "  ".repeat(indent))?;
    }
    match plan {
        LogicalPlan::EntityScan(n) => {
            write!(f, "EntityScan: {} [{}]", n.entity, simple_names(&n.columns))?
        }
        LogicalPlan::EntitySample(n) => write!(
            f,
            "EntitySample: {} p={} seed={}",
            n.entity, n.probability, n.seed
        )?,
        LogicalPlan::IndexScan(n) => {
            write!(f, "IndexScan: {} predicate={}", n.index, n.predicate)?
        }
        LogicalPlan::Fetch(n) => write!(f, "Fetch: [{}]", simple_names(&n.fetch))?,
        LogicalPlan::Filter(n) => write!(f, "Filter: {}", n.predicate)?,
        LogicalPlan::FilterOnSubSelect(n) => {
            write!(f, "FilterOnSubSelect: {}", n.predicate)?
        }
        LogicalPlan::Proximity(n) => write!(f, "Proximity: {}", n.predicate)?,
        LogicalPlan::Select(n) => write!(f, "Select: [{}]", simple_names(&n.columns))?,
        LogicalPlan::SelectDistinct(n) => {
            write!(f, "SelectDistinct: [{}]", simple_names(&n.columns))?
        }
        LogicalPlan::Count(_) => write!(f, "Count")?,
        LogicalPlan::CountEntity(n) => write!(f, "CountEntity: {}", n.entity)?,
        LogicalPlan::Exists(_) => write!(f, "Exists")?,
        LogicalPlan::Aggregate(n) => write!(
            f,
            "Aggregate: {}([{}])",
            n.function.name(),
            simple_names(&n.columns)
        )?,
        LogicalPlan::Function(n) => write!(
            f,
            "Function: {} -> {}",
            n.function.signature,
            n.out.simple_name()
        )?,
        LogicalPlan::Limit(n) => write!(f, "Limit: {}", n.limit)?,
        LogicalPlan::Skip(n) => write!(f, "Skip: {}", n.skip)?,
        LogicalPlan::Sort(n) => {
            let order: Vec<String> = n
                .order
                .iter()
                .map(|(c, o)| format!("{} {}", c.simple_name(), o))
                .collect();
            write!(f, "Sort: [{}]", order.join(", "))?
        }
        LogicalPlan::Insert(n) => {
            write!(f, "Insert: {} rows={}", n.entity, n.rows.len())?
        }
        LogicalPlan::Update(n) => {
            let assignments: Vec<String> = n
                .assignments
                .iter()
                .map(|(c, b)| format!("{}={}", c.simple_name(), b))
                .collect();
            write!(f, "Update: {} [{}]", n.entity, assignments.join(", "))?
        }
        LogicalPlan::Delete(n) => write!(f, "Delete: {}", n.entity)?,
    }
    for input in plan.inputs() {
        fmt_plan(input, f, indent + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical_plan::{Limit, LogicalPlan, Select};
    use crate::test_util::{scan_fixture, test_columns};
    use std::sync::Arc;

    #[test]
    fn nested_plans_indent() {
        let plan = LogicalPlan::Limit(Limit {
            input: Arc::new(LogicalPlan::Select(Select {
                input: Arc::new(scan_fixture()),
                columns: vec![test_columns()[0].clone()],
            })),
            limit: 10,
        });
        let expected = "Limit: 10\
        \n  Select: [id]\
        \n    EntityScan: warren.s.e [id, label, score]";
        assert_eq!(display_plan(&plan), expected);
    }
}
