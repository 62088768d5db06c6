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

use std::fmt;

use crate::binding::Binding;
use crate::model::{ColumnDef, Name};
use crate::scalar::Type;

/// The shared shape of a proximity search: a vector column, the number of
/// neighbours, the distance function to apply and the query vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProximityQuery {
    /// The vector column searched.
    pub column: ColumnDef,
    /// Number of neighbours to return.
    pub k: u64,
    /// Name of the distance function, resolved through the function
    /// registry.
    pub distance: Name,
    /// The query vector, usually a literal binding.
    pub query: Binding,
}

/// A k-nearest-neighbour (`Nns`) or k-furthest-neighbour (`Fns`) predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProximityPredicate {
    /// Nearest neighbour search: the `k` records with the smallest distance,
    /// in ascending distance order.
    Nns(ProximityQuery),
    /// Furthest neighbour search: the `k` records with the largest distance,
    /// in descending distance order.
    Fns(ProximityQuery),
}

impl ProximityPredicate {
    pub fn query(&self) -> &ProximityQuery {
        match self {
            ProximityPredicate::Nns(q) | ProximityPredicate::Fns(q) => q,
        }
    }

    pub fn k(&self) -> u64 {
        self.query().k
    }

    /// True for nearest-neighbour search, false for furthest.
    pub fn is_nearest(&self) -> bool {
        matches!(self, ProximityPredicate::Nns(_))
    }

    /// The columns the predicate reads.
    pub fn columns(&self) -> Vec<ColumnDef> {
        let query = self.query();
        let mut columns = vec![query.column.clone()];
        columns.extend(query.query.columns());
        columns
    }

    /// The column the distance is emitted under.
    pub fn distance_column(&self) -> ColumnDef {
        let query = self.query();
        let (schema, entity) = match &query.column.name {
            Name::Column { schema, entity, .. } => (schema.clone(), entity.clone()),
            _ => ("_".to_string(), "_".to_string()),
        };
        ColumnDef::new(
            Name::Column {
                schema,
                entity,
                column: "distance".to_string(),
            },
            Type::Double,
            false,
        )
    }

    pub fn digest(&self) -> u64 {
        super::digest_of(self)
    }
}

impl fmt::Display for ProximityPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (kind, q) = match self {
            ProximityPredicate::Nns(q) => ("NNS", q),
            ProximityPredicate::Fns(q) => ("FNS", q),
        };
        write!(
            f,
            "{}({}, k={}, {})",
            kind,
            q.column.simple_name(),
            q.k,
            q.distance.simple()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingContext;
    use crate::scalar::Value;

    #[test]
    fn distance_column_is_qualified_like_the_searched_column() {
        let ctx = BindingContext::new();
        let predicate = ProximityPredicate::Nns(ProximityQuery {
            column: ColumnDef::qualified("s", "e", "v", Type::FloatVector(2)).unwrap(),
            k: 3,
            distance: Name::function("euclidean").unwrap(),
            query: Binding::Literal(ctx.literal(Value::FloatVector(vec![0.0, 0.0]))),
        });
        let distance = predicate.distance_column();
        assert_eq!(distance.name.to_string(), "warren.s.e.distance");
        assert_eq!(distance.ty, Type::Double);
        assert!(predicate.is_nearest());
        assert_eq!(predicate.columns().len(), 1);
    }
}
