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

use crate::binding::{Binding, BindingContext};
use crate::error::{QueryError, Result};
use crate::model::{ColumnDef, Record};
use crate::scalar::Value;

/// Comparison operators of atomic predicates.
///
/// `Between` takes two right-hand operands, `In` any number, `IsNull` none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equal,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Between,
    In,
    IsNull,
}

impl ComparisonOperator {
    fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::GreaterEqual => ">=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessEqual => "<=",
            ComparisonOperator::Between => "BETWEEN",
            ComparisonOperator::In => "IN",
            ComparisonOperator::IsNull => "IS NULL",
        }
    }
}

/// A single comparison, possibly negated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtomicPredicate {
    pub left: Binding,
    pub op: ComparisonOperator,
    pub right: Vec<Binding>,
    pub negated: bool,
}

impl AtomicPredicate {
    pub fn new(left: Binding, op: ComparisonOperator, right: Vec<Binding>) -> Self {
        Self {
            left,
            op,
            right,
            negated: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// The columns this comparison reads.
    pub fn columns(&self) -> Vec<ColumnDef> {
        let mut columns = self.left.columns();
        for binding in &self.right {
            columns.extend(binding.columns());
        }
        columns
    }

    /// The bindings of this comparison that depend on a subquery.
    pub fn subquery_bindings(&self) -> Vec<&Binding> {
        std::iter::once(&self.left)
            .chain(self.right.iter())
            .filter(|b| matches!(b, Binding::Subquery { .. }))
            .collect()
    }

    /// Evaluate against the current record. Comparisons against `NULL` are
    /// false except for `IS NULL`.
    pub fn is_match(&self, record: &Record, ctx: &BindingContext) -> Result<bool> {
        let left = self.left.value(record, ctx)?;
        let matched = match self.op {
            ComparisonOperator::IsNull => left.is_null(),
            ComparisonOperator::In => {
                let mut found = false;
                for binding in &self.right {
                    if binding
                        .values(record, ctx)?
                        .iter()
                        .any(|v| !v.is_null() && !left.is_null() && *v == left)
                    {
                        found = true;
                        break;
                    }
                }
                found
            }
            ComparisonOperator::Between => {
                let (low, high) = match self.right.as_slice() {
                    [low, high] => (low.value(record, ctx)?, high.value(record, ctx)?),
                    other => {
                        return Err(QueryError::Internal(format!(
                            "BETWEEN requires two operands, got {}",
                            other.len()
                        )))
                    }
                };
                !left.is_null() && left >= low && left <= high
            }
            op => {
                let right = self.single_operand(record, ctx)?;
                if left.is_null() || right.is_null() {
                    false
                } else {
                    match op {
                        ComparisonOperator::Equal => left == right,
                        ComparisonOperator::Greater => left > right,
                        ComparisonOperator::GreaterEqual => left >= right,
                        ComparisonOperator::Less => left < right,
                        ComparisonOperator::LessEqual => left <= right,
                        _ => unreachable!("handled above"),
                    }
                }
            }
        };
        Ok(matched != self.negated)
    }

    fn single_operand(&self, record: &Record, ctx: &BindingContext) -> Result<Value> {
        match self.right.as_slice() {
            [binding] => binding.value(record, ctx),
            other => Err(QueryError::Internal(format!(
                "{} requires one operand, got {}",
                self.op.symbol(),
                other.len()
            ))),
        }
    }
}

impl fmt::Display for AtomicPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.negated {
            write!(f, "NOT ")?;
        }
        write!(f, "{} {}", self.left, self.op.symbol())?;
        match self.op {
            ComparisonOperator::IsNull => Ok(()),
            ComparisonOperator::In => {
                let operands: Vec<String> = self.right.iter().map(|b| b.to_string()).collect();
                write!(f, " ({})", operands.join(", "))
            }
            _ => {
                for binding in &self.right {
                    write!(f, " {}", binding)?;
                }
                Ok(())
            }
        }
    }
}

/// A boolean predicate tree over atomic comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BooleanPredicate {
    Atomic(AtomicPredicate),
    Conjunction(Box<BooleanPredicate>, Box<BooleanPredicate>),
    Disjunction(Box<BooleanPredicate>, Box<BooleanPredicate>),
}

impl BooleanPredicate {
    pub fn and(self, other: BooleanPredicate) -> BooleanPredicate {
        BooleanPredicate::Conjunction(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: BooleanPredicate) -> BooleanPredicate {
        BooleanPredicate::Disjunction(Box::new(self), Box::new(other))
    }

    /// The set of columns the predicate reads.
    pub fn columns(&self) -> Vec<ColumnDef> {
        let mut columns = vec![];
        self.for_each_atomic(&mut |atomic| columns.extend(atomic.columns()));
        columns.sort();
        columns.dedup();
        columns
    }

    /// All atomic comparisons in this tree, left to right.
    pub fn atomics(&self) -> Vec<&AtomicPredicate> {
        let mut out = vec![];
        fn walk<'a>(p: &'a BooleanPredicate, out: &mut Vec<&'a AtomicPredicate>) {
            match p {
                BooleanPredicate::Atomic(a) => out.push(a),
                BooleanPredicate::Conjunction(l, r) | BooleanPredicate::Disjunction(l, r) => {
                    walk(l, out);
                    walk(r, out);
                }
            }
        }
        walk(self, &mut out);
        out
    }

    fn for_each_atomic(&self, f: &mut impl FnMut(&AtomicPredicate)) {
        for atomic in self.atomics() {
            f(atomic);
        }
    }

    /// True if any comparison in this tree reads a subquery binding.
    pub fn depends_on_subqueries(&self) -> bool {
        self.atomics()
            .iter()
            .any(|a| !a.subquery_bindings().is_empty())
    }

    /// Stable structural hash, see [`crate::predicate::Predicate::digest`].
    pub fn digest(&self) -> u64 {
        super::digest_of(self)
    }

    /// Evaluate against the current record.
    pub fn is_match(&self, record: &Record, ctx: &BindingContext) -> Result<bool> {
        match self {
            BooleanPredicate::Atomic(a) => a.is_match(record, ctx),
            BooleanPredicate::Conjunction(l, r) => {
                Ok(l.is_match(record, ctx)? && r.is_match(record, ctx)?)
            }
            BooleanPredicate::Disjunction(l, r) => {
                Ok(l.is_match(record, ctx)? || r.is_match(record, ctx)?)
            }
        }
    }
}

impl fmt::Display for BooleanPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BooleanPredicate::Atomic(a) => write!(f, "{}", a),
            BooleanPredicate::Conjunction(l, r) => write!(f, "({} AND {})", l, r),
            BooleanPredicate::Disjunction(l, r) => write!(f, "({} OR {})", l, r),
        }
    }
}

impl From<AtomicPredicate> for BooleanPredicate {
    fn from(a: AtomicPredicate) -> Self {
        BooleanPredicate::Atomic(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TupleId;
    use crate::scalar::Type;
    use std::sync::Arc;

    fn record(id: i64) -> Record {
        let columns: Arc<[ColumnDef]> =
            vec![ColumnDef::qualified("s", "e", "id", Type::Long).unwrap()].into();
        Record::new(TupleId(id as u64), columns, vec![Value::Long(id)]).unwrap()
    }

    fn id_column() -> ColumnDef {
        ColumnDef::qualified("s", "e", "id", Type::Long).unwrap()
    }

    #[test]
    fn equality_and_negation() {
        let ctx = BindingContext::new();
        let literal = Binding::Literal(ctx.literal(Value::Long(3)));
        let eq = AtomicPredicate::new(
            Binding::Column(id_column()),
            ComparisonOperator::Equal,
            vec![literal],
        );
        assert!(eq.is_match(&record(3), &ctx).unwrap());
        assert!(!eq.is_match(&record(4), &ctx).unwrap());
        assert!(eq.clone().negated().is_match(&record(4), &ctx).unwrap());
    }

    #[test]
    fn in_list_ignores_nulls() {
        let ctx = BindingContext::new();
        let list = Binding::Literal(ctx.literal_list(vec![
            Value::Null,
            Value::Long(2),
            Value::Long(4),
        ]));
        let pred = AtomicPredicate::new(
            Binding::Column(id_column()),
            ComparisonOperator::In,
            vec![list],
        );
        assert!(pred.is_match(&record(2), &ctx).unwrap());
        assert!(!pred.is_match(&record(3), &ctx).unwrap());
    }

    #[test]
    fn between_bounds_are_inclusive() {
        let ctx = BindingContext::new();
        let low = Binding::Literal(ctx.literal(Value::Long(2)));
        let high = Binding::Literal(ctx.literal(Value::Long(4)));
        let pred = AtomicPredicate::new(
            Binding::Column(id_column()),
            ComparisonOperator::Between,
            vec![low, high],
        );
        assert!(pred.is_match(&record(2), &ctx).unwrap());
        assert!(pred.is_match(&record(4), &ctx).unwrap());
        assert!(!pred.is_match(&record(5), &ctx).unwrap());
    }

    #[test]
    fn conjunction_and_disjunction() {
        let ctx = BindingContext::new();
        let gt = BooleanPredicate::from(AtomicPredicate::new(
            Binding::Column(id_column()),
            ComparisonOperator::Greater,
            vec![Binding::Literal(ctx.literal(Value::Long(1)))],
        ));
        let lt = BooleanPredicate::from(AtomicPredicate::new(
            Binding::Column(id_column()),
            ComparisonOperator::Less,
            vec![Binding::Literal(ctx.literal(Value::Long(4)))],
        ));
        let both = gt.clone().and(lt.clone());
        assert!(both.is_match(&record(2), &ctx).unwrap());
        assert!(!both.is_match(&record(4), &ctx).unwrap());
        let either = gt.and(lt.clone()).or(lt);
        assert!(either.is_match(&record(0), &ctx).unwrap());
    }

    #[test]
    fn digest_is_structure_sensitive() {
        let ctx = BindingContext::new();
        let slot = ctx.literal(Value::Long(1));
        let eq = |op| {
            BooleanPredicate::from(AtomicPredicate::new(
                Binding::Column(id_column()),
                op,
                vec![Binding::Literal(slot)],
            ))
        };
        assert_eq!(
            eq(ComparisonOperator::Equal).digest(),
            eq(ComparisonOperator::Equal).digest()
        );
        assert_ne!(
            eq(ComparisonOperator::Equal).digest(),
            eq(ComparisonOperator::Less).digest()
        );
    }
}
