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
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::model::{ColumnDef, Name};
use crate::scalar::Value;

/// Stable identifier of a record within its entity. Partition boundaries and
/// back-fetches are expressed as `TupleId` ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleId(pub u64);

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An ordered tuple of typed values with a stable [`TupleId`].
///
/// Records are immutable in transit: operators assemble new records through
/// [`Record::new`], [`Record::project`] or [`Record::extended`] but never
/// mutate a record emitted by another operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    tuple_id: TupleId,
    columns: Arc<[ColumnDef]>,
    values: Arc<[Value]>,
}

impl Record {
    pub fn new(tuple_id: TupleId, columns: Arc<[ColumnDef]>, values: Vec<Value>) -> Result<Self> {
        if columns.len() != values.len() {
            return crate::internal_err!(
                "record arity mismatch: {} columns but {} values",
                columns.len(),
                values.len()
            );
        }
        Ok(Self {
            tuple_id,
            columns,
            values: values.into(),
        })
    }

    pub fn tuple_id(&self) -> TupleId {
        self.tuple_id
    }

    pub fn columns(&self) -> &Arc<[ColumnDef]> {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Position of a column within this record.
    pub fn index_of(&self, name: &Name) -> Option<usize> {
        self.columns.iter().position(|c| &c.name == name)
    }

    /// The value of the given column.
    pub fn value(&self, name: &Name) -> Result<&Value> {
        self.index_of(name)
            .map(|i| &self.values[i])
            .ok_or_else(|| {
                QueryError::DisconnectedPlan(format!(
                    "column {} is not produced by the upstream operator",
                    name
                ))
            })
    }

    /// A new record holding only the given columns, in the given order.
    pub fn project(&self, columns: &Arc<[ColumnDef]>) -> Result<Record> {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns.iter() {
            values.push(self.value(&column.name)?.clone());
        }
        Ok(Record {
            tuple_id: self.tuple_id,
            columns: columns.clone(),
            values: values.into(),
        })
    }

    /// A new record with additional columns appended, used by `Fetch` and
    /// materialising functions.
    pub fn extended(&self, columns: &Arc<[ColumnDef]>, extra: Vec<Value>) -> Record {
        Record {
            tuple_id: self.tuple_id,
            columns: columns.clone(),
            values: self
                .values
                .iter()
                .cloned()
                .chain(extra)
                .collect::<Vec<_>>()
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Type;

    fn columns() -> Arc<[ColumnDef]> {
        vec![
            ColumnDef::qualified("s", "e", "id", Type::Long).unwrap(),
            ColumnDef::qualified("s", "e", "label", Type::String).unwrap(),
        ]
        .into()
    }

    #[test]
    fn value_lookup() {
        let record = Record::new(
            TupleId(1),
            columns(),
            vec![Value::Long(7), Value::from("a")],
        )
        .unwrap();
        let name = Name::column("s", "e", "label").unwrap();
        assert_eq!(record.value(&name).unwrap(), &Value::from("a"));
        assert!(record.value(&Name::column("s", "e", "nope").unwrap()).is_err());
    }

    #[test]
    fn arity_is_checked() {
        assert!(Record::new(TupleId(0), columns(), vec![Value::Long(1)]).is_err());
    }

    #[test]
    fn projection_keeps_tuple_id() {
        let record = Record::new(
            TupleId(9),
            columns(),
            vec![Value::Long(7), Value::from("a")],
        )
        .unwrap();
        let sub: Arc<[ColumnDef]> =
            vec![ColumnDef::qualified("s", "e", "label", Type::String).unwrap()].into();
        let projected = record.project(&sub).unwrap();
        assert_eq!(projected.tuple_id(), TupleId(9));
        assert_eq!(projected.values(), &[Value::from("a")]);
    }
}
