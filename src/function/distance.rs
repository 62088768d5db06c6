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

//! Built-in vector distance functions.
//!
//! Each metric is exposed through a [`FunctionGenerator`] that instantiates
//! one kernel per concrete vector signature, so `euclidean(FloatVector(128),
//! FloatVector(128))` and `euclidean(DoubleVector(3), DoubleVector(3))` are
//! distinct functions under one open name.

use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::function::{
    FunctionGenerator, OpenSignature, ScalarFunction, Signature, TypeShape,
};
use crate::model::Name;
use crate::scalar::{Type, Value};

/// The distance metrics shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Euclidean,
    SquaredEuclidean,
    Manhattan,
}

impl Metric {
    fn name(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::SquaredEuclidean => "squaredeuclidean",
            Metric::Manhattan => "manhattan",
        }
    }

    fn compute(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Metric::Euclidean => Metric::SquaredEuclidean.compute(a, b).sqrt(),
            Metric::SquaredEuclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
            Metric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
        }
    }

    /// Floating point operations per invocation for a given dimension.
    fn flops(&self, dims: usize) -> f64 {
        match self {
            Metric::Euclidean => (3 * dims + 1) as f64,
            Metric::SquaredEuclidean => (3 * dims) as f64,
            Metric::Manhattan => (3 * dims) as f64,
        }
    }
}

struct DistanceFunction {
    metric: Metric,
    signature: Signature,
    dims: usize,
}

impl ScalarFunction for DistanceFunction {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self) -> Type {
        Type::Double
    }

    fn invoke(&self, args: &[Value]) -> Result<Value> {
        let (query, probe) = match args {
            [a, b] => (a, b),
            other => {
                return Err(QueryError::TypeMismatch(format!(
                    "{} takes two arguments, got {}",
                    self.signature,
                    other.len()
                )))
            }
        };
        if probe.is_null() || query.is_null() {
            return Ok(Value::Null);
        }
        let a = query.as_f64_slice().ok_or_else(|| type_error(&self.signature, query))?;
        let b = probe.as_f64_slice().ok_or_else(|| type_error(&self.signature, probe))?;
        if a.len() != self.dims || b.len() != self.dims {
            return Err(QueryError::TypeMismatch(format!(
                "{} expects vectors of dimension {}, got {} and {}",
                self.signature,
                self.dims,
                a.len(),
                b.len()
            )));
        }
        Ok(Value::Double(self.metric.compute(&a, &b)))
    }

    fn flops(&self) -> f64 {
        self.metric.flops(self.dims)
    }
}

fn type_error(signature: &Signature, value: &Value) -> QueryError {
    QueryError::TypeMismatch(format!("{} cannot process value {}", signature, value))
}

struct DistanceGenerator {
    metric: Metric,
    name: Name,
}

impl DistanceGenerator {
    fn new(metric: Metric) -> Result<Self> {
        Ok(Self {
            name: Name::function(metric.name())?,
            metric,
        })
    }
}

impl FunctionGenerator for DistanceGenerator {
    fn name(&self) -> &Name {
        &self.name
    }

    fn resolve(&self, open: &OpenSignature) -> Vec<Signature> {
        if open.name != self.name || open.args.len() != 2 {
            return vec![];
        }
        // A closed signature can only be offered when at least one argument
        // shape pins the vector type; the other must agree.
        let pinned: Vec<Type> = open
            .args
            .iter()
            .filter_map(|shape| match shape {
                TypeShape::Exact(ty) if ty.is_vector() => Some(*ty),
                _ => None,
            })
            .collect();
        match pinned.as_slice() {
            [ty] if open.args.iter().all(|s| s.matches(ty)) => {
                vec![Signature::new(self.name.clone(), vec![*ty, *ty])]
            }
            [a, b] if a == b => vec![Signature::new(self.name.clone(), vec![*a, *a])],
            _ => vec![],
        }
    }

    fn generate(&self, signature: &Signature) -> Result<Arc<dyn ScalarFunction>> {
        match signature.args.as_slice() {
            [a, b] if a == b && a.is_vector() => Ok(Arc::new(DistanceFunction {
                metric: self.metric,
                signature: signature.clone(),
                dims: a.logical_size(),
            })),
            _ => Err(QueryError::NotSupported(format!(
                "{} cannot be instantiated for {}",
                self.name, signature
            ))),
        }
    }
}

/// The generators registered by [`FunctionRegistry::new`].
///
/// [`FunctionRegistry::new`]: crate::function::FunctionRegistry::new
pub fn builtin_generators() -> Vec<Arc<dyn FunctionGenerator>> {
    [Metric::Euclidean, Metric::SquaredEuclidean, Metric::Manhattan]
        .into_iter()
        .map(|metric| {
            Arc::new(DistanceGenerator::new(metric).expect("static names are valid"))
                as Arc<dyn FunctionGenerator>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance() {
        let generator = DistanceGenerator::new(Metric::Manhattan).unwrap();
        let signature = Signature::new(
            generator.name.clone(),
            vec![Type::DoubleVector(2), Type::DoubleVector(2)],
        );
        let function = generator.generate(&signature).unwrap();
        let d = function
            .invoke(&[
                Value::DoubleVector(vec![1.0, 1.0]),
                Value::DoubleVector(vec![-1.0, 2.0]),
            ])
            .unwrap();
        assert_eq!(d, Value::Double(3.0));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let generator = DistanceGenerator::new(Metric::Euclidean).unwrap();
        let signature = Signature::new(
            generator.name.clone(),
            vec![Type::FloatVector(3), Type::FloatVector(3)],
        );
        let function = generator.generate(&signature).unwrap();
        let err = function
            .invoke(&[
                Value::FloatVector(vec![0.0; 3]),
                Value::FloatVector(vec![0.0; 4]),
            ])
            .unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch(_)));
    }

    #[test]
    fn resolve_requires_matching_vector_types() {
        let generator = DistanceGenerator::new(Metric::Euclidean).unwrap();
        let open = OpenSignature::new(
            generator.name.clone(),
            vec![TypeShape::Exact(Type::FloatVector(4)), TypeShape::Vector],
        );
        let resolved = generator.resolve(&open);
        assert_eq!(resolved.len(), 1);
        assert_eq!(
            resolved[0].args,
            vec![Type::FloatVector(4), Type::FloatVector(4)]
        );
        let mismatched = OpenSignature::new(
            generator.name.clone(),
            vec![
                TypeShape::Exact(Type::FloatVector(4)),
                TypeShape::Exact(Type::FloatVector(5)),
            ],
        );
        assert!(generator.resolve(&mismatched).is_empty());
    }
}
