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

//! Session configuration for the planner and the runtime.

use crate::cost::CostPolicy;

/// Configuration options, adjusted through `with_*` builder methods.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on workers for a partitioned subtree.
    pub target_partitions: usize,
    /// Number of plans the plan cache retains; zero disables caching.
    pub plan_cache_capacity: usize,
    /// The cost policy driving plan selection and parallelisation.
    pub policy: CostPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_partitions: num_cpus::get(),
            plan_cache_capacity: 128,
            policy: CostPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Customize the upper bound on workers per partitioned subtree.
    pub fn with_target_partitions(mut self, n: usize) -> Self {
        self.target_partitions = n.max(1);
        self
    }

    /// Customize the plan cache capacity.
    pub fn with_plan_cache_capacity(mut self, n: usize) -> Self {
        self.plan_cache_capacity = n;
        self
    }

    /// Customize the cost policy.
    pub fn with_policy(mut self, policy: CostPolicy) -> Self {
        self.policy = policy;
        self
    }
}
