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

//! In-memory implementations of the datasource contracts.
//!
//! [`MemEntity`] keeps its records in a shared vector indexed by tuple id
//! and supports the full sub-transaction surface including rollback via an
//! undo log. Two in-memory indexes are provided: a hash index for equality
//! predicates and a brute-force proximity index for `NNS`/`FNS`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::binding::BindingContext;
use crate::cost::{Cost, CostPolicy};
use crate::datasource::{Catalog, Entity, EntityTx, Index, TransactionMode, TupleRange};
use crate::error::{QueryError, Result};
use crate::function::{FunctionRegistry, ScalarFunction, Signature};
use crate::model::{ColumnDef, Name, Record, TupleId};
use crate::physical_plan::stream::{iter_stream, SendableRecordStream};
use crate::predicate::{BooleanPredicate, ComparisonOperator, Predicate};
use crate::scalar::Value;
use crate::statistics::ValueStatistics;
use crate::traits::{SortOrder, TraitSet};

type Rows = Arc<RwLock<Vec<Option<Vec<Value>>>>>;

/// A simple in-memory catalogue.
#[derive(Default)]
pub struct MemCatalog {
    entities: RwLock<Vec<Arc<dyn Entity>>>,
}

impl MemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entity: Arc<dyn Entity>) {
        self.entities.write().push(entity);
    }
}

impl Catalog for MemCatalog {
    fn entity(&self, name: &Name) -> Result<Arc<dyn Entity>> {
        self.entities
            .read()
            .iter()
            .find(|e| e.name() == name)
            .cloned()
            .ok_or_else(|| QueryError::Execution(format!("entity {} does not exist", name)))
    }
}

/// An in-memory entity.
pub struct MemEntity {
    name: Name,
    columns: Vec<ColumnDef>,
    rows: Rows,
    indexes: RwLock<Vec<Arc<dyn Index>>>,
}

impl MemEntity {
    /// Create an entity from complete rows in entity column order.
    pub fn try_new(name: Name, columns: Vec<ColumnDef>, rows: Vec<Vec<Value>>) -> Result<Arc<Self>> {
        for row in &rows {
            if row.len() != columns.len() {
                return Err(QueryError::TypeMismatch(format!(
                    "row arity {} does not match {} columns of {}",
                    row.len(),
                    columns.len(),
                    name
                )));
            }
        }
        Ok(Arc::new(Self {
            name,
            columns,
            rows: Arc::new(RwLock::new(rows.into_iter().map(Some).collect())),
            indexes: RwLock::new(vec![]),
        }))
    }

    /// Attach a hash index over one column.
    pub fn create_hash_index(self: &Arc<Self>, index_name: Name, column: &Name) -> Result<()> {
        let position = self.column_index(column)?;
        let index = Arc::new(MemHashIndex {
            name: index_name,
            column: self.columns[position].clone(),
            position,
            rows: self.rows.clone(),
        });
        self.indexes.write().push(index);
        Ok(())
    }

    /// Attach a brute-force proximity index over one vector column.
    pub fn create_proximity_index(
        self: &Arc<Self>,
        index_name: Name,
        column: &Name,
        distance: Name,
    ) -> Result<()> {
        let column = self.column(column)?;
        let signature = Signature::new(distance.clone(), vec![column.ty, column.ty]);
        let function = FunctionRegistry::new().obtain(&signature)?;
        let position = self.column_index(&column.name)?;
        let index = Arc::new(MemProximityIndex {
            name: index_name,
            column,
            position,
            distance,
            function,
            rows: self.rows.clone(),
        });
        self.indexes.write().push(index);
        Ok(())
    }

    fn column_index(&self, name: &Name) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name.matches(name) || name.matches(&c.name))
            .ok_or_else(|| {
                QueryError::Execution(format!("column {} does not exist in {}", name, self.name))
            })
    }
}

impl Entity for MemEntity {
    fn name(&self) -> &Name {
        &self.name
    }

    fn columns(&self) -> Vec<ColumnDef> {
        self.columns.clone()
    }

    fn column(&self, name: &Name) -> Result<ColumnDef> {
        Ok(self.columns[self.column_index(name)?].clone())
    }

    fn statistics(&self, column: &Name) -> Option<ValueStatistics> {
        let position = self.column_index(column).ok()?;
        let definition = &self.columns[position];
        let rows = self.rows.read();
        let mut statistics = ValueStatistics::default();
        let mut distinct = HashSet::new();
        let mut non_null = 0u64;
        let mut width = 0usize;
        let mut present = 0usize;
        for row in rows.iter().flatten() {
            let value = &row[position];
            present += 1;
            width += value
                .value_type()
                .map(|t| t.physical_size())
                .unwrap_or_default();
            if !value.is_null() {
                non_null += 1;
                distinct.insert(value.clone());
                if statistics.min.as_ref().map(|m| value < m).unwrap_or(true) {
                    statistics.min = Some(value.clone());
                }
                if statistics.max.as_ref().map(|m| value > m).unwrap_or(true) {
                    statistics.max = Some(value.clone());
                }
            }
        }
        statistics.distinct_entries = Some(distinct.len() as u64);
        statistics.non_null_entries = Some(non_null);
        if present > 0 {
            statistics.avg_width = Some(width / present);
        }
        if definition.ty.is_vector() {
            statistics.vector_length = Some(definition.ty.logical_size());
        }
        Some(statistics)
    }

    fn row_count(&self) -> u64 {
        self.rows.read().iter().flatten().count() as u64
    }

    fn indexes(&self) -> Vec<Arc<dyn Index>> {
        self.indexes.read().clone()
    }

    fn transaction(&self, mode: TransactionMode) -> Result<Arc<dyn EntityTx>> {
        Ok(Arc::new(MemEntityTx {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.clone(),
            mode,
            undo: Mutex::new(vec![]),
        }))
    }
}

enum Undo {
    Inserted(TupleId),
    Updated(TupleId, Vec<Value>),
    Deleted(TupleId, Vec<Value>),
}

/// Sub-transaction on a [`MemEntity`]. Writes are applied in place and
/// reverted through the undo log on rollback.
pub struct MemEntityTx {
    name: Name,
    columns: Vec<ColumnDef>,
    rows: Rows,
    mode: TransactionMode,
    undo: Mutex<Vec<Undo>>,
}

impl MemEntityTx {
    fn check_writable(&self) -> Result<()> {
        match self.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(QueryError::NotSupported(format!(
                "transaction on {} is read-only",
                self.name
            ))),
        }
    }

    fn positions(&self, columns: &[ColumnDef]) -> Result<Vec<usize>> {
        columns
            .iter()
            .map(|c| {
                self.columns
                    .iter()
                    .position(|e| e.name == c.name)
                    .ok_or_else(|| {
                        QueryError::Execution(format!(
                            "column {} does not exist in {}",
                            c.name, self.name
                        ))
                    })
            })
            .collect()
    }
}

#[async_trait]
impl EntityTx for MemEntityTx {
    fn name(&self) -> &Name {
        &self.name
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.rows.read().iter().flatten().count() as u64)
    }

    fn scan(
        &self,
        columns: &[ColumnDef],
        range: Option<TupleRange>,
    ) -> Result<SendableRecordStream> {
        let positions = self.positions(columns)?;
        let schema: Arc<[ColumnDef]> = columns.to_vec().into();
        let rows = self.rows.read();
        let mut records = vec![];
        for (id, row) in rows.iter().enumerate() {
            let tuple_id = TupleId(id as u64);
            if let Some(range) = &range {
                if !range.contains(tuple_id) {
                    continue;
                }
            }
            if let Some(row) = row {
                let values = positions.iter().map(|p| row[*p].clone()).collect();
                records.push(Record::new(tuple_id, schema.clone(), values)?);
            }
        }
        Ok(iter_stream(records))
    }

    async fn fetch(&self, tuple_id: TupleId, columns: &[ColumnDef]) -> Result<Vec<Value>> {
        let positions = self.positions(columns)?;
        let rows = self.rows.read();
        let row = rows
            .get(tuple_id.0 as usize)
            .and_then(|r| r.as_ref())
            .ok_or_else(|| {
                QueryError::Execution(format!("tuple {} does not exist in {}", tuple_id, self.name))
            })?;
        Ok(positions.iter().map(|p| row[*p].clone()).collect())
    }

    fn partition_for(&self, index: usize, of: usize) -> Result<TupleRange> {
        if of == 0 || index >= of {
            return Err(QueryError::NotSupported(format!(
                "partition {} of {} is undefined",
                index, of
            )));
        }
        let total = self.rows.read().len() as u64;
        let step = total.div_ceil(of as u64);
        let start = step * index as u64;
        Ok(TupleRange {
            start: TupleId(start.min(total)),
            end: TupleId((start + step).min(total)),
        })
    }

    async fn insert(&self, columns: &[ColumnDef], values: Vec<Value>) -> Result<TupleId> {
        self.check_writable()?;
        if columns.len() != values.len() {
            return Err(QueryError::TypeMismatch(format!(
                "insert into {} with {} columns but {} values",
                self.name,
                columns.len(),
                values.len()
            )));
        }
        let positions = self.positions(columns)?;
        let mut row = vec![Value::Null; self.columns.len()];
        for (position, value) in positions.into_iter().zip(values) {
            row[position] = value;
        }
        for (definition, value) in self.columns.iter().zip(row.iter()) {
            if value.is_null() && !definition.nullable {
                return Err(QueryError::TypeMismatch(format!(
                    "column {} is not nullable",
                    definition.name
                )));
            }
        }
        let mut rows = self.rows.write();
        rows.push(Some(row));
        let tuple_id = TupleId(rows.len() as u64 - 1);
        self.undo.lock().push(Undo::Inserted(tuple_id));
        Ok(tuple_id)
    }

    async fn update(&self, tuple_id: TupleId, values: &[(ColumnDef, Value)]) -> Result<()> {
        self.check_writable()?;
        let positions =
            self.positions(&values.iter().map(|(c, _)| c.clone()).collect::<Vec<_>>())?;
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(tuple_id.0 as usize)
            .and_then(|r| r.as_mut())
            .ok_or_else(|| {
                QueryError::Execution(format!("tuple {} does not exist in {}", tuple_id, self.name))
            })?;
        self.undo.lock().push(Undo::Updated(tuple_id, row.clone()));
        for (position, (_, value)) in positions.into_iter().zip(values) {
            row[position] = value.clone();
        }
        Ok(())
    }

    async fn delete(&self, tuple_id: TupleId) -> Result<()> {
        self.check_writable()?;
        let mut rows = self.rows.write();
        let slot = rows.get_mut(tuple_id.0 as usize).ok_or_else(|| {
            QueryError::Execution(format!("tuple {} does not exist in {}", tuple_id, self.name))
        })?;
        match slot.take() {
            Some(old) => {
                self.undo.lock().push(Undo::Deleted(tuple_id, old));
                Ok(())
            }
            None => Err(QueryError::Execution(format!(
                "tuple {} was already deleted from {}",
                tuple_id, self.name
            ))),
        }
    }

    async fn commit(&self) -> Result<()> {
        self.undo.lock().clear();
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut undo = self.undo.lock();
        let mut rows = self.rows.write();
        while let Some(entry) = undo.pop() {
            match entry {
                Undo::Inserted(tuple_id) => {
                    rows[tuple_id.0 as usize] = None;
                }
                Undo::Updated(tuple_id, old) | Undo::Deleted(tuple_id, old) => {
                    rows[tuple_id.0 as usize] = Some(old);
                }
            }
        }
        Ok(())
    }
}

/// Hash index over a single column; answers non-negated equality atomics.
pub struct MemHashIndex {
    name: Name,
    column: ColumnDef,
    position: usize,
    rows: Rows,
}

impl MemHashIndex {
    fn matching_atomic<'a>(&self, predicate: &'a Predicate) -> Option<&'a BooleanPredicate> {
        match predicate {
            Predicate::Boolean(boolean @ BooleanPredicate::Atomic(atomic)) => {
                let on_column = atomic
                    .left
                    .columns()
                    .iter()
                    .any(|c| c.name == self.column.name);
                (on_column && atomic.op == ComparisonOperator::Equal && !atomic.negated)
                    .then_some(boolean)
            }
            _ => None,
        }
    }
}

impl Index for MemHashIndex {
    fn name(&self) -> &Name {
        &self.name
    }

    fn can_process(&self, predicate: &Predicate) -> bool {
        self.matching_atomic(predicate).is_some()
    }

    fn cost(&self, predicate: &Predicate) -> Cost {
        if !self.can_process(predicate) {
            return Cost::INVALID;
        }
        // Expected bucket size under a uniform distribution; the defaults
        // keep the reported units comparable with the engine's policy.
        let policy = CostPolicy::default();
        let rows = self.rows.read();
        let total = rows.iter().flatten().count() as f64;
        let distinct = rows
            .iter()
            .flatten()
            .map(|row| row[self.position].clone())
            .collect::<HashSet<_>>()
            .len()
            .max(1) as f64;
        let expected = (total / distinct).max(1.0);
        let width = self.column.ty.physical_size() as f64;
        Cost::new(
            expected * width * policy.cost_disk_access_read,
            expected * policy.cost_memory_access,
            width,
            0.0,
        )
    }

    fn columns_for(&self, _predicate: &Predicate) -> Vec<ColumnDef> {
        vec![self.column.clone()]
    }

    fn traits_for(&self, _predicate: &Predicate) -> TraitSet {
        TraitSet::new()
    }

    fn filter(
        &self,
        predicate: &Predicate,
        bindings: &BindingContext,
        range: Option<TupleRange>,
    ) -> Result<SendableRecordStream> {
        let boolean = self
            .matching_atomic(predicate)
            .ok_or_else(|| {
                QueryError::NotSupported(format!(
                    "index {} cannot process predicate {}",
                    self.name, predicate
                ))
            })?
            .clone();
        let schema: Arc<[ColumnDef]> = vec![self.column.clone()].into();
        let position = self.position;
        let rows = self.rows.read();
        let mut records = vec![];
        for (id, row) in rows.iter().enumerate() {
            let tuple_id = TupleId(id as u64);
            if let Some(range) = &range {
                if !range.contains(tuple_id) {
                    continue;
                }
            }
            if let Some(row) = row {
                let record =
                    Record::new(tuple_id, schema.clone(), vec![row[position].clone()])?;
                if boolean.is_match(&record, bindings)? {
                    records.push(record);
                }
            }
        }
        Ok(iter_stream(records))
    }
}

/// Brute-force proximity index; answers `NNS`/`FNS` on its column with the
/// distance function it was created for.
pub struct MemProximityIndex {
    name: Name,
    column: ColumnDef,
    position: usize,
    distance: Name,
    function: Arc<dyn ScalarFunction>,
    rows: Rows,
}

impl MemProximityIndex {
    fn matching_query<'a>(
        &self,
        predicate: &'a Predicate,
    ) -> Option<&'a crate::predicate::ProximityPredicate> {
        match predicate {
            Predicate::Proximity(proximity) => {
                let query = proximity.query();
                (query.column.name == self.column.name && query.distance == self.distance)
                    .then_some(proximity)
            }
            _ => None,
        }
    }
}

impl Index for MemProximityIndex {
    fn name(&self) -> &Name {
        &self.name
    }

    fn can_process(&self, predicate: &Predicate) -> bool {
        self.matching_query(predicate).is_some()
    }

    fn cost(&self, predicate: &Predicate) -> Cost {
        if !self.can_process(predicate) {
            return Cost::INVALID;
        }
        let policy = CostPolicy::default();
        let rows = self.rows.read().iter().flatten().count() as f64;
        let width = self.column.ty.physical_size() as f64;
        Cost::new(
            rows * width * policy.cost_disk_access_read,
            rows * self.function.flops() * policy.cost_flop,
            width,
            0.0,
        )
    }

    fn columns_for(&self, predicate: &Predicate) -> Vec<ColumnDef> {
        match predicate {
            Predicate::Proximity(proximity) => {
                vec![self.column.clone(), proximity.distance_column()]
            }
            _ => vec![self.column.clone()],
        }
    }

    fn traits_for(&self, predicate: &Predicate) -> TraitSet {
        match predicate {
            Predicate::Proximity(proximity) => {
                let direction = if proximity.is_nearest() {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                };
                TraitSet::new()
                    .with_order(vec![(proximity.distance_column(), direction)])
                    .with_limit(proximity.k())
            }
            _ => TraitSet::new(),
        }
    }

    fn filter(
        &self,
        predicate: &Predicate,
        bindings: &BindingContext,
        range: Option<TupleRange>,
    ) -> Result<SendableRecordStream> {
        let proximity = self
            .matching_query(predicate)
            .ok_or_else(|| {
                QueryError::NotSupported(format!(
                    "index {} cannot process predicate {}",
                    self.name, predicate
                ))
            })?
            .clone();
        let query = proximity.query();
        let empty = Record::new(TupleId(0), Vec::<ColumnDef>::new().into(), vec![])?;
        let needle = query.query.value(&empty, bindings)?;
        let schema: Arc<[ColumnDef]> =
            vec![self.column.clone(), proximity.distance_column()].into();
        let position = self.position;

        let rows = self.rows.read();
        let mut scored: Vec<(f64, Record)> = vec![];
        for (id, row) in rows.iter().enumerate() {
            let tuple_id = TupleId(id as u64);
            if let Some(range) = &range {
                if !range.contains(tuple_id) {
                    continue;
                }
            }
            if let Some(row) = row {
                let vector = row[position].clone();
                let distance = match self.function.invoke(&[needle.clone(), vector.clone()])? {
                    Value::Double(d) => d,
                    Value::Null => continue,
                    other => {
                        return Err(QueryError::TypeMismatch(format!(
                            "distance function returned {}",
                            other
                        )))
                    }
                };
                scored.push((
                    distance,
                    Record::new(
                        tuple_id,
                        schema.clone(),
                        vec![vector, Value::Double(distance)],
                    )?,
                ));
            }
        }
        if proximity.is_nearest() {
            scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        } else {
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        }
        scored.truncate(proximity.k() as usize);
        Ok(iter_stream(scored.into_iter().map(|(_, r)| r)))
    }
}
