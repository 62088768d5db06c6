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

//! Physical plan refinement: index-aware access paths and intra-query
//! partitioning.

mod index_selection;
mod parallelize;

pub use index_selection::BooleanIndexScan;
pub use parallelize::try_partition;

use crate::error::Result;
use crate::physical_plan::PhysicalPlan;
use crate::planner::PlannerContext;

/// A physical-to-physical optimizer rule.
pub trait PhysicalOptimizerRule: Send + Sync {
    /// A readable name for logging.
    fn name(&self) -> &str;

    /// Rewrite the plan; returns the input unchanged when nothing applies.
    fn optimize(&self, plan: PhysicalPlan, ctx: &PlannerContext) -> Result<PhysicalPlan>;
}
