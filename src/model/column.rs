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

use crate::error::Result;
use crate::model::Name;
use crate::scalar::Type;

/// Definition of a column: qualified name, element type and nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnDef {
    pub name: Name,
    pub ty: Type,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: Name, ty: Type, nullable: bool) -> Self {
        Self { name, ty, nullable }
    }

    /// Convenience constructor for a fully qualified, non-nullable column.
    pub fn qualified(schema: &str, entity: &str, column: &str, ty: Type) -> Result<Self> {
        Ok(Self {
            name: Name::column(schema, entity, column)?,
            ty,
            nullable: false,
        })
    }

    /// The bare column name without qualification.
    pub fn simple_name(&self) -> &str {
        self.name.simple()
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.ty)
    }
}
