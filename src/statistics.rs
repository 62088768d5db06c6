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

//! The statistics facade the planner reads and the naive selectivity
//! estimator built on top of it.

use std::collections::HashMap;

use crate::model::Name;
use crate::predicate::{BooleanPredicate, ComparisonOperator};
use crate::scalar::Value;

/// Statistics about the values stored in one column.
///
/// Every field is optional: a freshly created column has no statistics yet
/// and the estimator falls back to defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueStatistics {
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub distinct_entries: Option<u64>,
    pub non_null_entries: Option<u64>,
    /// Average width of a value in bytes.
    pub avg_width: Option<usize>,
    /// Representative vector length for vector columns.
    pub vector_length: Option<usize>,
}

/// The fraction of records a predicate is expected to let through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selectivity(pub f64);

impl Selectivity {
    pub const ALL: Selectivity = Selectivity(1.0);

    /// Expected output size for the given input row count.
    pub fn apply(&self, rows: u64) -> u64 {
        (rows as f64 * self.0).round() as u64
    }
}

/// Default selectivity of an equality comparison without statistics.
const DEFAULT_EQUALITY_SELECTIVITY: f64 = 0.1;
/// Default selectivity of an open range comparison.
const DEFAULT_RANGE_SELECTIVITY: f64 = 1.0 / 3.0;
/// Default selectivity of an `IS NULL` test.
const DEFAULT_NULL_SELECTIVITY: f64 = 0.1;

/// Naive, independence-assuming selectivity estimation.
///
/// Literal operands are late-bound and invisible at planning time, so the
/// estimator only consults per-column statistics: equality uses
/// `1 / distinct`, ranges and null tests use fixed fractions.
pub struct NaiveSelectivityCalculator;

impl NaiveSelectivityCalculator {
    /// Estimate the selectivity of `predicate` under the given per-column
    /// statistics. The result maps an input row count to an expected output
    /// size through [`Selectivity::apply`].
    pub fn estimate(
        predicate: &BooleanPredicate,
        statistics: &HashMap<Name, ValueStatistics>,
    ) -> Selectivity {
        Selectivity(Self::estimate_inner(predicate, statistics).clamp(0.0, 1.0))
    }

    fn estimate_inner(
        predicate: &BooleanPredicate,
        statistics: &HashMap<Name, ValueStatistics>,
    ) -> f64 {
        match predicate {
            BooleanPredicate::Atomic(atomic) => {
                let stats = atomic
                    .columns()
                    .first()
                    .and_then(|c| statistics.get(&c.name));
                let selectivity = match atomic.op {
                    ComparisonOperator::Equal => stats
                        .and_then(|s| s.distinct_entries)
                        .filter(|d| *d > 0)
                        .map(|d| 1.0 / d as f64)
                        .unwrap_or(DEFAULT_EQUALITY_SELECTIVITY),
                    ComparisonOperator::Greater
                    | ComparisonOperator::GreaterEqual
                    | ComparisonOperator::Less
                    | ComparisonOperator::LessEqual => DEFAULT_RANGE_SELECTIVITY,
                    ComparisonOperator::Between => {
                        DEFAULT_RANGE_SELECTIVITY * DEFAULT_RANGE_SELECTIVITY
                    }
                    ComparisonOperator::In => {
                        let per_operand = stats
                            .and_then(|s| s.distinct_entries)
                            .filter(|d| *d > 0)
                            .map(|d| 1.0 / d as f64)
                            .unwrap_or(DEFAULT_EQUALITY_SELECTIVITY);
                        per_operand * atomic.right.len().max(1) as f64
                    }
                    ComparisonOperator::IsNull => DEFAULT_NULL_SELECTIVITY,
                };
                if atomic.negated {
                    1.0 - selectivity
                } else {
                    selectivity
                }
            }
            BooleanPredicate::Conjunction(left, right) => {
                Self::estimate_inner(left, statistics) * Self::estimate_inner(right, statistics)
            }
            BooleanPredicate::Disjunction(left, right) => {
                let l = Self::estimate_inner(left, statistics);
                let r = Self::estimate_inner(right, statistics);
                1.0 - (1.0 - l) * (1.0 - r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, BindingContext};
    use crate::model::ColumnDef;
    use crate::predicate::AtomicPredicate;
    use crate::scalar::Type;

    fn column() -> ColumnDef {
        ColumnDef::qualified("s", "e", "id", Type::Long).unwrap()
    }

    fn equality() -> BooleanPredicate {
        let ctx = BindingContext::new();
        BooleanPredicate::from(AtomicPredicate::new(
            Binding::Column(column()),
            ComparisonOperator::Equal,
            vec![Binding::Literal(ctx.literal(Value::Long(1)))],
        ))
    }

    #[test]
    fn equality_uses_distinct_count() {
        let mut statistics = HashMap::new();
        statistics.insert(
            column().name,
            ValueStatistics {
                distinct_entries: Some(50),
                ..ValueStatistics::default()
            },
        );
        let s = NaiveSelectivityCalculator::estimate(&equality(), &statistics);
        assert!((s.0 - 0.02).abs() < 1e-9);
        assert_eq!(s.apply(1000), 20);
    }

    #[test]
    fn conjunction_multiplies() {
        let statistics = HashMap::new();
        let pred = equality().and(equality());
        let s = NaiveSelectivityCalculator::estimate(&pred, &statistics);
        assert!((s.0 - 0.01).abs() < 1e-9);
    }

    #[test]
    fn disjunction_is_clamped() {
        let statistics = HashMap::new();
        let mut pred = equality();
        for _ in 0..50 {
            pred = pred.or(equality());
        }
        let s = NaiveSelectivityCalculator::estimate(&pred, &statistics);
        assert!(s.0 <= 1.0 && s.0 > 0.9);
    }

    #[test]
    fn negation_inverts() {
        let ctx = BindingContext::new();
        let pred = BooleanPredicate::from(
            AtomicPredicate::new(
                Binding::Column(column()),
                ComparisonOperator::Equal,
                vec![Binding::Literal(ctx.literal(Value::Long(1)))],
            )
            .negated(),
        );
        let s = NaiveSelectivityCalculator::estimate(&pred, &HashMap::new());
        assert!((s.0 - 0.9).abs() < 1e-9);
    }
}
