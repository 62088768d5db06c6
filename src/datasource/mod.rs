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

//! The narrow contracts through which the engine consumes its collaborators:
//! the catalogue, entities, their sub-transactions, and indexes.
//!
//! The storage engine, the index implementations and the lock manager live
//! behind these traits; the engine does not prescribe their internals.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::binding::BindingContext;
use crate::cost::Cost;
use crate::error::Result;
use crate::model::{ColumnDef, Name, TupleId};
use crate::physical_plan::stream::SendableRecordStream;
use crate::predicate::Predicate;
use crate::scalar::Value;
use crate::statistics::ValueStatistics;
use crate::traits::TraitSet;

/// The access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// The lock modes a transaction can request on a database object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// A half-open range of tuple ids, the unit of intra-query partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TupleRange {
    pub start: TupleId,
    pub end: TupleId,
}

impl TupleRange {
    pub fn contains(&self, tuple_id: TupleId) -> bool {
        tuple_id >= self.start && tuple_id < self.end
    }
}

impl fmt::Display for TupleRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The catalogue: resolves entity names to entities.
pub trait Catalog: Send + Sync {
    fn entity(&self, name: &Name) -> Result<Arc<dyn Entity>>;
}

/// Metadata surface of an entity, consulted by the planner.
pub trait Entity: Send + Sync {
    fn name(&self) -> &Name;

    /// All columns of the entity.
    fn columns(&self) -> Vec<ColumnDef>;

    /// Resolve a (possibly wildcard) column name against this entity.
    fn column(&self, name: &Name) -> Result<ColumnDef>;

    /// Statistics of a column, if any have been gathered.
    fn statistics(&self, column: &Name) -> Option<ValueStatistics>;

    /// Planner-facing estimate of the number of records.
    fn row_count(&self) -> u64;

    /// The indexes defined on this entity.
    fn indexes(&self) -> Vec<Arc<dyn Index>>;

    /// Open a sub-transaction on this entity.
    fn transaction(&self, mode: TransactionMode) -> Result<Arc<dyn EntityTx>>;
}

/// A sub-transaction on one entity; data access goes through it.
#[async_trait]
pub trait EntityTx: Send + Sync {
    fn name(&self) -> &Name;

    /// Exact record count, e.g. from the entity header.
    async fn count(&self) -> Result<u64>;

    /// Scan the given columns, optionally restricted to a tuple range.
    fn scan(
        &self,
        columns: &[ColumnDef],
        range: Option<TupleRange>,
    ) -> Result<SendableRecordStream>;

    /// Fetch additional column values of a known tuple (back-fetch).
    async fn fetch(&self, tuple_id: TupleId, columns: &[ColumnDef]) -> Result<Vec<Value>>;

    /// The tuple range of partition `index` out of `of` equally sized
    /// partitions.
    fn partition_for(&self, index: usize, of: usize) -> Result<TupleRange>;

    async fn insert(&self, columns: &[ColumnDef], values: Vec<Value>) -> Result<TupleId>;

    async fn update(&self, tuple_id: TupleId, values: &[(ColumnDef, Value)]) -> Result<()>;

    async fn delete(&self, tuple_id: TupleId) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;
}

/// The contract of an index, consulted during planning and execution.
pub trait Index: Send + Sync {
    fn name(&self) -> &Name;

    /// True if the index can evaluate the predicate.
    fn can_process(&self, predicate: &Predicate) -> bool;

    /// Cost of answering the predicate through this index;
    /// [`Cost::INVALID`] when it cannot.
    fn cost(&self, predicate: &Predicate) -> Cost;

    /// The columns the index produces when answering the predicate.
    fn columns_for(&self, predicate: &Predicate) -> Vec<ColumnDef>;

    /// The traits (order, limit) the index guarantees for the predicate.
    fn traits_for(&self, predicate: &Predicate) -> TraitSet;

    /// Evaluate the predicate, returning a cursor over the matching
    /// records, optionally restricted to a tuple range.
    fn filter(
        &self,
        predicate: &Predicate,
        bindings: &BindingContext,
        range: Option<TupleRange>,
    ) -> Result<SendableRecordStream>;
}
