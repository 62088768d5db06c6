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

//! A bounded cache of selected physical plans keyed by the logical tree's
//! structural digest.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::physical_plan::PhysicalPlan;

struct CacheInner {
    plans: HashMap<u64, PhysicalPlan>,
    recency: VecDeque<u64>,
}

/// A process-wide LRU plan cache.
pub struct PlanCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                plans: HashMap::new(),
                recency: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, digest: u64) -> Option<PhysicalPlan> {
        let mut inner = self.inner.lock();
        let plan = inner.plans.get(&digest).cloned()?;
        touch(&mut inner.recency, digest);
        Some(plan)
    }

    pub fn put(&self, digest: u64, plan: PhysicalPlan) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        inner.plans.insert(digest, plan);
        touch(&mut inner.recency, digest);
        while inner.plans.len() > self.capacity {
            if let Some(evicted) = inner.recency.pop_back() {
                inner.plans.remove(&evicted);
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn touch(recency: &mut VecDeque<u64>, digest: u64) {
    if let Some(position) = recency.iter().position(|d| *d == digest) {
        recency.remove(position);
    }
    recency.push_front(digest);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::GroupId;
    use crate::model::Name;
    use crate::physical_plan::CountEntityExec;

    fn plan(i: u32) -> PhysicalPlan {
        PhysicalPlan::CountEntity(CountEntityExec {
            entity: Name::entity("s", "e").unwrap(),
            group: GroupId(i),
        })
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = PlanCache::new(2);
        cache.put(1, plan(1));
        cache.put(2, plan(2));
        assert!(cache.get(1).is_some()); // touches 1, making 2 the oldest
        cache.put(3, plan(3));
        assert!(cache.get(2).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_disables_the_cache() {
        let cache = PlanCache::new(0);
        cache.put(1, plan(1));
        assert!(cache.is_empty());
    }
}
