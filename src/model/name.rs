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

use crate::error::{QueryError, Result};

/// The path delimiter in fully qualified names.
pub const NAME_DELIMITER: char = '.';

/// The wildcard a column name may use in its last component.
pub const NAME_WILDCARD: &str = "*";

/// A fully qualified name of a database object.
///
/// Components are lower-cased on construction. The delimiter and the
/// wildcard are forbidden inside components, except that a `Column` name may
/// use `*` as its column component for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Name {
    Root,
    Function {
        function: String,
    },
    Schema {
        schema: String,
    },
    Entity {
        schema: String,
        entity: String,
    },
    Sequence {
        schema: String,
        entity: String,
        sequence: String,
    },
    Index {
        schema: String,
        entity: String,
        index: String,
    },
    Column {
        schema: String,
        entity: String,
        column: String,
    },
}

fn component(raw: &str, wildcard_ok: bool) -> Result<String> {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() {
        return Err(QueryError::NotSupported(
            "name components must not be empty".to_string(),
        ));
    }
    if lower.contains(NAME_DELIMITER) || (!wildcard_ok && lower.contains(NAME_WILDCARD)) {
        return Err(QueryError::NotSupported(format!(
            "name component '{}' contains a reserved character",
            raw
        )));
    }
    Ok(lower)
}

impl Name {
    pub fn schema(schema: &str) -> Result<Name> {
        Ok(Name::Schema {
            schema: component(schema, false)?,
        })
    }

    pub fn function(function: &str) -> Result<Name> {
        Ok(Name::Function {
            function: component(function, false)?,
        })
    }

    pub fn entity(schema: &str, entity: &str) -> Result<Name> {
        Ok(Name::Entity {
            schema: component(schema, false)?,
            entity: component(entity, false)?,
        })
    }

    pub fn sequence(schema: &str, entity: &str, sequence: &str) -> Result<Name> {
        Ok(Name::Sequence {
            schema: component(schema, false)?,
            entity: component(entity, false)?,
            sequence: component(sequence, false)?,
        })
    }

    pub fn index(schema: &str, entity: &str, index: &str) -> Result<Name> {
        Ok(Name::Index {
            schema: component(schema, false)?,
            entity: component(entity, false)?,
            index: component(index, false)?,
        })
    }

    pub fn column(schema: &str, entity: &str, column: &str) -> Result<Name> {
        Ok(Name::Column {
            schema: component(schema, false)?,
            entity: component(entity, false)?,
            column: component(column, true)?,
        })
    }

    /// The entity a column, index or sequence belongs to.
    pub fn entity_name(&self) -> Option<Name> {
        match self {
            Name::Entity { .. } => Some(self.clone()),
            Name::Sequence { schema, entity, .. }
            | Name::Index { schema, entity, .. }
            | Name::Column { schema, entity, .. } => Some(Name::Entity {
                schema: schema.clone(),
                entity: entity.clone(),
            }),
            _ => None,
        }
    }

    /// The last path component, e.g. the bare column name.
    pub fn simple(&self) -> &str {
        match self {
            Name::Root => "warren",
            Name::Function { function } => function,
            Name::Schema { schema } => schema,
            Name::Entity { entity, .. } => entity,
            Name::Sequence { sequence, .. } => sequence,
            Name::Index { index, .. } => index,
            Name::Column { column, .. } => column,
        }
    }

    /// True if this column name carries the `*` wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Name::Column { column, .. } if column == NAME_WILDCARD)
    }

    /// Wildcard-aware matching: `schema.entity.*` matches every column of
    /// the entity. Non-column names match by equality.
    pub fn matches(&self, other: &Name) -> bool {
        match (self, other) {
            (
                Name::Column {
                    schema: s1,
                    entity: e1,
                    column: c1,
                },
                Name::Column {
                    schema: s2,
                    entity: e2,
                    column: c2,
                },
            ) => s1 == s2 && e1 == e2 && (c1 == NAME_WILDCARD || c1 == c2),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Name::Root => write!(f, "warren"),
            Name::Function { function } => write!(f, "warren.{}", function),
            Name::Schema { schema } => write!(f, "warren.{}", schema),
            Name::Entity { schema, entity } => write!(f, "warren.{}.{}", schema, entity),
            Name::Sequence {
                schema,
                entity,
                sequence,
            } => write!(f, "warren.{}.{}.{}", schema, entity, sequence),
            Name::Index {
                schema,
                entity,
                index,
            } => write!(f, "warren.{}.{}.{}", schema, entity, index),
            Name::Column {
                schema,
                entity,
                column,
            } => write!(f, "warren.{}.{}.{}", schema, entity, column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lower_cased() {
        let name = Name::entity("Warehouse", "Features").unwrap();
        assert_eq!(name.to_string(), "warren.warehouse.features");
    }

    #[test]
    fn delimiter_is_rejected() {
        assert!(Name::schema("a.b").is_err());
        assert!(Name::entity("a", "b*").is_err());
    }

    #[test]
    fn column_wildcard_matches() {
        let star = Name::column("s", "e", "*").unwrap();
        let id = Name::column("s", "e", "id").unwrap();
        let other = Name::column("s", "other", "id").unwrap();
        assert!(star.is_wildcard());
        assert!(star.matches(&id));
        assert!(!star.matches(&other));
        assert!(!id.matches(&star));
    }

    #[test]
    fn entity_of_column() {
        let id = Name::column("s", "e", "id").unwrap();
        assert_eq!(id.entity_name(), Some(Name::entity("s", "e").unwrap()));
    }
}
