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

//! Late-bound value placeholders.
//!
//! A [`Binding`] resolves at execution time to a column value of the current
//! record, a literal parameter, or the result of a subquery. Literal and
//! subquery bindings reference slots in a per-query [`BindingContext`] that
//! is filled immediately before and during execution.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{QueryError, Result};
use crate::model::{ColumnDef, Record};
use crate::scalar::Value;

/// Identifier of an independent sub-plan. Subquery results are routed to
/// their consumers by group id; partitioned sources receive fresh groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Index of a slot within a [`BindingContext`].
///
/// Slots are assigned deterministically while the query is built, so two
/// structurally identical queries agree on their slot layout. This is what
/// allows a cached physical plan to be re-executed with fresh parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueSlot(pub usize);

#[derive(Debug, Clone)]
enum SlotState {
    Empty,
    Scalar(Value),
    List(Vec<Value>),
}

/// A placeholder that resolves late to a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// The value of a column of the current record.
    Column(ColumnDef),
    /// A literal query parameter stored in the binding context.
    Literal(ValueSlot),
    /// The result of a subquery, written by `FilterOnSubSelect` once the
    /// subquery identified by `depends_on` has produced it.
    Subquery {
        depends_on: GroupId,
        column: ColumnDef,
        slot: ValueSlot,
    },
}

impl Binding {
    /// The columns this binding reads from the current record.
    pub fn columns(&self) -> Vec<ColumnDef> {
        match self {
            Binding::Column(c) => vec![c.clone()],
            _ => vec![],
        }
    }

    /// Resolve to a single value.
    pub fn value(&self, record: &Record, ctx: &BindingContext) -> Result<Value> {
        match self {
            Binding::Column(c) => Ok(record.value(&c.name)?.clone()),
            Binding::Literal(slot) => ctx.scalar(*slot),
            Binding::Subquery { slot, .. } => ctx.scalar(*slot),
        }
    }

    /// Resolve to one or many values; a subquery in list position (the
    /// right-hand side of `IN`) contributes every record it emitted.
    pub fn values(&self, record: &Record, ctx: &BindingContext) -> Result<Vec<Value>> {
        match self {
            Binding::Column(c) => Ok(vec![record.value(&c.name)?.clone()]),
            Binding::Literal(slot) => ctx.list(*slot),
            Binding::Subquery { slot, .. } => ctx.list(*slot),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Binding::Column(c) => write!(f, "{}", c.simple_name()),
            Binding::Literal(slot) => write!(f, "?{}", slot.0),
            Binding::Subquery { depends_on, .. } => write!(f, "<{}>", depends_on),
        }
    }
}

/// The per-query store of late-bound values.
///
/// A single-writer structure: the binder registers slots while the query is
/// built, the surrounding service fills literal slots before execution, and
/// `FilterOnSubSelect` fills subquery slots while it drains its subqueries.
/// Shared behind an [`Arc`] so executors can read it concurrently.
#[derive(Debug, Clone, Default)]
pub struct BindingContext {
    slots: Arc<RwLock<Vec<SlotState>>>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot holding the given literal.
    pub fn literal(&self, value: Value) -> ValueSlot {
        let mut slots = self.slots.write();
        slots.push(SlotState::Scalar(value));
        ValueSlot(slots.len() - 1)
    }

    /// Register a slot holding a literal list, the right-hand side of `IN`.
    pub fn literal_list(&self, values: Vec<Value>) -> ValueSlot {
        let mut slots = self.slots.write();
        slots.push(SlotState::List(values));
        ValueSlot(slots.len() - 1)
    }

    /// Register an empty slot to be filled during execution.
    pub fn slot(&self) -> ValueSlot {
        let mut slots = self.slots.write();
        slots.push(SlotState::Empty);
        ValueSlot(slots.len() - 1)
    }

    /// Overwrite a slot with a single value.
    pub fn bind(&self, slot: ValueSlot, value: Value) -> Result<()> {
        let mut slots = self.slots.write();
        let state = slots
            .get_mut(slot.0)
            .ok_or_else(|| QueryError::BindingNotBound(format!("slot {} unknown", slot.0)))?;
        *state = SlotState::Scalar(value);
        Ok(())
    }

    /// Append a value to a slot, turning it into a list.
    pub fn append(&self, slot: ValueSlot, value: Value) -> Result<()> {
        let mut slots = self.slots.write();
        let state = slots
            .get_mut(slot.0)
            .ok_or_else(|| QueryError::BindingNotBound(format!("slot {} unknown", slot.0)))?;
        match state {
            SlotState::Empty => *state = SlotState::List(vec![value]),
            SlotState::List(values) => values.push(value),
            SlotState::Scalar(existing) => {
                *state = SlotState::List(vec![existing.clone(), value])
            }
        }
        Ok(())
    }

    fn scalar(&self, slot: ValueSlot) -> Result<Value> {
        match self.slots.read().get(slot.0) {
            Some(SlotState::Scalar(value)) => Ok(value.clone()),
            Some(SlotState::List(_)) => Err(QueryError::TypeMismatch(format!(
                "slot {} holds a list where a scalar was expected",
                slot.0
            ))),
            _ => Err(QueryError::BindingNotBound(format!(
                "slot {} was never bound",
                slot.0
            ))),
        }
    }

    fn list(&self, slot: ValueSlot) -> Result<Vec<Value>> {
        match self.slots.read().get(slot.0) {
            Some(SlotState::Scalar(value)) => Ok(vec![value.clone()]),
            Some(SlotState::List(values)) => Ok(values.clone()),
            _ => Err(QueryError::BindingNotBound(format!(
                "slot {} was never bound",
                slot.0
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TupleId;
    use crate::scalar::Type;

    #[test]
    fn unbound_slot_is_an_error() {
        let ctx = BindingContext::new();
        let slot = ctx.slot();
        let err = Binding::Literal(slot)
            .value(&empty_record(), &ctx)
            .unwrap_err();
        assert!(matches!(err, QueryError::BindingNotBound(_)));
    }

    #[test]
    fn subquery_slot_fills_late() {
        let ctx = BindingContext::new();
        let slot = ctx.slot();
        ctx.bind(slot, Value::Long(42)).unwrap();
        let binding = Binding::Subquery {
            depends_on: GroupId(1),
            column: ColumnDef::qualified("s", "e", "id", Type::Long).unwrap(),
            slot,
        };
        assert_eq!(
            binding.value(&empty_record(), &ctx).unwrap(),
            Value::Long(42)
        );
    }

    #[test]
    fn append_builds_a_list() {
        let ctx = BindingContext::new();
        let slot = ctx.slot();
        ctx.append(slot, Value::Int(2)).unwrap();
        ctx.append(slot, Value::Int(4)).unwrap();
        assert_eq!(
            ctx.list(slot).unwrap(),
            vec![Value::Int(2), Value::Int(4)]
        );
        assert!(ctx.scalar(slot).is_err());
    }

    fn empty_record() -> Record {
        Record::new(TupleId(0), Vec::<ColumnDef>::new().into(), vec![]).unwrap()
    }
}
