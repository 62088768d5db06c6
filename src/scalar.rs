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

//! The closed set of value types the engine understands and the tagged
//! [`Value`] union that flows through operators.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use ordered_float::OrderedFloat;

use crate::error::{QueryError, Result};

/// The closed set of column types.
///
/// Vector types are fixed-length; the length is part of the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Complex32,
    Complex64,
    String,
    ByteString,
    BooleanVector(usize),
    IntVector(usize),
    LongVector(usize),
    FloatVector(usize),
    DoubleVector(usize),
}

impl Type {
    /// Number of primitive elements a value of this type holds.
    pub fn logical_size(&self) -> usize {
        match self {
            Type::BooleanVector(d)
            | Type::IntVector(d)
            | Type::LongVector(d)
            | Type::FloatVector(d)
            | Type::DoubleVector(d) => *d,
            _ => 1,
        }
    }

    /// Size in bytes of a single value of this type. Variable-width types
    /// report the width of their reference.
    pub fn physical_size(&self) -> usize {
        match self {
            Type::Boolean | Type::Byte => 1,
            Type::Short => 2,
            Type::Int | Type::Float => 4,
            Type::Long | Type::Double | Type::Complex32 => 8,
            Type::Complex64 => 16,
            Type::String | Type::ByteString => 8,
            Type::BooleanVector(d) => *d,
            Type::IntVector(d) | Type::FloatVector(d) => 4 * d,
            Type::LongVector(d) | Type::DoubleVector(d) => 8 * d,
        }
    }

    /// True for scalar numeric types, the domain of the aggregation
    /// operators.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Byte | Type::Short | Type::Int | Type::Long | Type::Float | Type::Double
        )
    }

    /// True for the fixed-length vector types, the domain of proximity
    /// predicates.
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            Type::BooleanVector(_)
                | Type::IntVector(_)
                | Type::LongVector(_)
                | Type::FloatVector(_)
                | Type::DoubleVector(_)
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::BooleanVector(d) => write!(f, "BooleanVector({})", d),
            Type::IntVector(d) => write!(f, "IntVector({})", d),
            Type::LongVector(d) => write!(f, "LongVector({})", d),
            Type::FloatVector(d) => write!(f, "FloatVector({})", d),
            Type::DoubleVector(d) => write!(f, "DoubleVector({})", d),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A single value as it travels between operators.
///
/// `Null` is a value of every type; nullability is declared on the column.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Complex32(f32, f32),
    Complex64(f64, f64),
    String(String),
    ByteString(Vec<u8>),
    BooleanVector(Vec<bool>),
    IntVector(Vec<i32>),
    LongVector(Vec<i64>),
    FloatVector(Vec<f32>),
    DoubleVector(Vec<f64>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type of this value, `None` for `Null`.
    pub fn value_type(&self) -> Option<Type> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => Type::Boolean,
            Value::Byte(_) => Type::Byte,
            Value::Short(_) => Type::Short,
            Value::Int(_) => Type::Int,
            Value::Long(_) => Type::Long,
            Value::Float(_) => Type::Float,
            Value::Double(_) => Type::Double,
            Value::Complex32(..) => Type::Complex32,
            Value::Complex64(..) => Type::Complex64,
            Value::String(_) => Type::String,
            Value::ByteString(_) => Type::ByteString,
            Value::BooleanVector(v) => Type::BooleanVector(v.len()),
            Value::IntVector(v) => Type::IntVector(v.len()),
            Value::LongVector(v) => Type::LongVector(v.len()),
            Value::FloatVector(v) => Type::FloatVector(v.len()),
            Value::DoubleVector(v) => Type::DoubleVector(v.len()),
        })
    }

    /// Numeric view of a scalar value, used by aggregation and selectivity
    /// estimation.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Byte(v) => Some(*v as f64),
            Value::Short(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// View of a vector value as `f64` components, used by the distance
    /// functions.
    pub fn as_f64_slice(&self) -> Option<Vec<f64>> {
        match self {
            Value::IntVector(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Value::LongVector(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Value::FloatVector(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Value::DoubleVector(v) => Some(v.clone()),
            Value::BooleanVector(v) => {
                Some(v.iter().map(|x| if *x { 1.0 } else { 0.0 }).collect())
            }
            _ => None,
        }
    }

    /// Checked numeric addition, used by the `Sum` and `Mean` aggregates.
    pub fn add(&self, other: &Value) -> Result<Value> {
        match (self.to_f64(), other.to_f64()) {
            (Some(_), Some(_)) => match (self, other) {
                (Value::Double(a), b) => Ok(Value::Double(a + b.to_f64().unwrap_or(0.0))),
                (a, Value::Double(b)) => Ok(Value::Double(a.to_f64().unwrap_or(0.0) + b)),
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
                (Value::Long(a), Value::Long(b)) => Ok(Value::Long(a + b)),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (a, b) => Ok(Value::Double(
                    a.to_f64().unwrap_or(0.0) + b.to_f64().unwrap_or(0.0),
                )),
            },
            _ => Err(QueryError::TypeMismatch(format!(
                "cannot add {} and {}",
                self, other
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    /// Total order over values. Values of the same type compare naturally,
    /// numeric scalars compare across types through `f64`, `Null` sorts
    /// first, and unrelated types fall back to the type tag order.
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Boolean(a), Boolean(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (ByteString(a), ByteString(b)) => a.cmp(b),
            (BooleanVector(a), BooleanVector(b)) => a.cmp(b),
            (IntVector(a), IntVector(b)) => a.cmp(b),
            (LongVector(a), LongVector(b)) => a.cmp(b),
            (FloatVector(a), FloatVector(b)) => ordered_f32(a).cmp(&ordered_f32(b)),
            (DoubleVector(a), DoubleVector(b)) => ordered_f64(a).cmp(&ordered_f64(b)),
            (Complex32(ar, ai), Complex32(br, bi)) => (OrderedFloat(*ar), OrderedFloat(*ai))
                .cmp(&(OrderedFloat(*br), OrderedFloat(*bi))),
            (Complex64(ar, ai), Complex64(br, bi)) => (OrderedFloat(*ar), OrderedFloat(*ai))
                .cmp(&(OrderedFloat(*br), OrderedFloat(*bi))),
            (a, b) => match (a.to_f64(), b.to_f64()) {
                (Some(x), Some(y)) => OrderedFloat(x).cmp(&OrderedFloat(y)),
                _ => tag(a).cmp(&tag(b)),
            },
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Value::*;
        match self {
            Null => 0u8.hash(state),
            Boolean(v) => v.hash(state),
            // Numeric scalars hash through f64 so that cross-type equal
            // values collide, matching `Ord`.
            Byte(_) | Short(_) | Int(_) | Long(_) | Float(_) | Double(_) => {
                OrderedFloat(self.to_f64().unwrap_or(f64::NAN)).hash(state)
            }
            Complex32(r, i) => {
                OrderedFloat(*r).hash(state);
                OrderedFloat(*i).hash(state);
            }
            Complex64(r, i) => {
                OrderedFloat(*r).hash(state);
                OrderedFloat(*i).hash(state);
            }
            String(v) => v.hash(state),
            ByteString(v) => v.hash(state),
            BooleanVector(v) => v.hash(state),
            IntVector(v) => v.hash(state),
            LongVector(v) => v.hash(state),
            FloatVector(v) => ordered_f32(v).hash(state),
            DoubleVector(v) => ordered_f64(v).hash(state),
        }
    }
}

fn ordered_f32(v: &[f32]) -> Vec<OrderedFloat<f32>> {
    v.iter().copied().map(OrderedFloat).collect()
}

fn ordered_f64(v: &[f64]) -> Vec<OrderedFloat<f64>> {
    v.iter().copied().map(OrderedFloat).collect()
}

fn tag(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Byte(_) => 2,
        Value::Short(_) => 3,
        Value::Int(_) => 4,
        Value::Long(_) => 5,
        Value::Float(_) => 6,
        Value::Double(_) => 7,
        Value::Complex32(..) => 8,
        Value::Complex64(..) => 9,
        Value::String(_) => 10,
        Value::ByteString(_) => 11,
        Value::BooleanVector(_) => 12,
        Value::IntVector(_) => 13,
        Value::LongVector(_) => 14,
        Value::FloatVector(_) => 15,
        Value::DoubleVector(_) => 16,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Complex32(r, i) => write!(f, "{}+{}i", r, i),
            Value::Complex64(r, i) => write!(f, "{}+{}i", r, i),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::ByteString(v) => write!(f, "0x{}", v.len()),
            Value::BooleanVector(v) => write!(f, "[bool;{}]", v.len()),
            Value::IntVector(v) => write!(f, "[int;{}]", v.len()),
            Value::LongVector(v) => write!(f, "[long;{}]", v.len()),
            Value::FloatVector(v) => write!(f, "[float;{}]", v.len()),
            Value::DoubleVector(v) => write!(f, "[double;{}]", v.len()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_sizes() {
        assert_eq!(Type::FloatVector(128).logical_size(), 128);
        assert_eq!(Type::FloatVector(128).physical_size(), 512);
        assert_eq!(Type::Long.physical_size(), 8);
        assert_eq!(Type::Long.logical_size(), 1);
    }

    #[test]
    fn cross_type_numeric_order() {
        assert_eq!(Value::Int(3).cmp(&Value::Long(3)), Ordering::Equal);
        assert!(Value::Int(3) < Value::Double(3.5));
        assert!(Value::Null < Value::Int(i32::MIN));
    }

    #[test]
    fn float_values_are_hashable() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Value::Double(1.5));
        set.insert(Value::Double(1.5));
        set.insert(Value::FloatVector(vec![1.0, 2.0]));
        set.insert(Value::FloatVector(vec![1.0, 2.0]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn add_preserves_integer_types() {
        let v = Value::Long(40).add(&Value::Long(2)).unwrap();
        assert_eq!(v, Value::Long(42));
        assert!(Value::String("a".into()).add(&Value::Long(1)).is_err());
    }
}
