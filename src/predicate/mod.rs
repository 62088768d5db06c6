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

//! Boolean and proximity predicates.

mod boolean;
mod proximity;

pub use boolean::{AtomicPredicate, BooleanPredicate, ComparisonOperator};
pub use proximity::{ProximityPredicate, ProximityQuery};

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::model::ColumnDef;

/// Any predicate an operator node can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    Boolean(BooleanPredicate),
    Proximity(ProximityPredicate),
}

impl Predicate {
    /// The set of columns the predicate reads.
    pub fn columns(&self) -> Vec<ColumnDef> {
        match self {
            Predicate::Boolean(p) => p.columns(),
            Predicate::Proximity(p) => p.columns(),
        }
    }

    /// Stable, structure-sensitive hash used as a plan-cache key
    /// contribution. Literal parameters contribute their slot, not their
    /// value, so one cached plan serves every parameterisation.
    pub fn digest(&self) -> u64 {
        digest_of(self)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Predicate::Boolean(p) => write!(f, "{}", p),
            Predicate::Proximity(p) => write!(f, "{}", p),
        }
    }
}

impl From<BooleanPredicate> for Predicate {
    fn from(p: BooleanPredicate) -> Self {
        Predicate::Boolean(p)
    }
}

impl From<ProximityPredicate> for Predicate {
    fn from(p: ProximityPredicate) -> Self {
        Predicate::Proximity(p)
    }
}

/// Structural digest of any hashable plan fragment.
pub(crate) fn digest_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
