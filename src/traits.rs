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

//! Orthogonal properties attached to operator nodes: output order, an upper
//! bound on emitted records, and partitionability.

use std::fmt;

use crate::model::ColumnDef;

/// Sort direction of one order column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "ASC"),
            SortOrder::Descending => write!(f, "DESC"),
        }
    }
}

/// The output order of an operator, outermost column first.
pub type Order = Vec<(ColumnDef, SortOrder)>;

/// The closed set of traits an operator node can carry.
///
/// Traits propagate from the input unless an operator overrides them; any
/// node downstream of a `not_partitionable` node is itself not
/// partitionable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TraitSet {
    /// Records are emitted in this order.
    pub order: Option<Order>,
    /// At most this many records are emitted.
    pub limit: Option<u64>,
    /// The subtree must not be split into partitions.
    pub not_partitionable: bool,
}

impl TraitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trait propagation for a pipeline operator: everything carries over.
    pub fn inherit(input: &TraitSet) -> Self {
        input.clone()
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn not_partitionable(mut self) -> Self {
        self.not_partitionable = true;
        self
    }

    /// Drop the order trait, e.g. after an operator that interleaves
    /// records.
    pub fn without_order(mut self) -> Self {
        self.order = None;
        self
    }

    /// Drop the limit trait, e.g. after a filter that may discard records
    /// before the bound is reached.
    pub fn without_limit(mut self) -> Self {
        self.limit = None;
        self
    }
}

impl fmt::Display for TraitSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut parts = vec![];
        if let Some(order) = &self.order {
            let cols: Vec<String> = order
                .iter()
                .map(|(c, o)| format!("{} {}", c.simple_name(), o))
                .collect();
            parts.push(format!("order=[{}]", cols.join(", ")));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }
        if self.not_partitionable {
            parts.push("not-partitionable".to_string());
        }
        write!(f, "{}", parts.join(", "))
    }
}
