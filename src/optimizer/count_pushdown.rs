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

//! Answering `Count` over a bare scan from entity metadata.

use crate::error::Result;
use crate::logical_plan::{CountEntity, LogicalPlan};
use crate::optimizer::{map_children, RewriteRule};

/// Replaces `Count(EntityScan)` by a metadata count; scanning records just
/// to count them is never necessary.
#[derive(Default)]
pub struct CountPushdown {}

impl CountPushdown {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {}
    }

    fn transform(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        match plan {
            LogicalPlan::Count(count) => {
                if let LogicalPlan::EntityScan(scan) = count.input.as_ref() {
                    return Ok(Some(LogicalPlan::CountEntity(CountEntity {
                        entity: scan.entity.clone(),
                        group: scan.group,
                    })));
                }
                map_children(plan, |child| self.transform(child))
            }
            other => map_children(other, |child| self.transform(child)),
        }
    }
}

impl RewriteRule for CountPushdown {
    fn name(&self) -> &str {
        "count_pushdown"
    }

    fn can_be_applied(&self, plan: &LogicalPlan) -> bool {
        fn contains(plan: &LogicalPlan) -> bool {
            if let LogicalPlan::Count(count) = plan {
                if matches!(count.input.as_ref(), LogicalPlan::EntityScan(_)) {
                    return true;
                }
            }
            plan.inputs().iter().any(|i| contains(i))
        }
        contains(plan)
    }

    fn apply(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        self.transform(plan)
    }
}
