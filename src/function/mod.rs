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

//! Scalar functions, their signatures and the process-wide registry.
//!
//! Functions are resolved by closed signature. A [`FunctionGenerator`] acts
//! as the polymorphism seam: it consumes an open signature (argument type
//! shapes) and yields concrete functions, e.g. one distance kernel per
//! vector type and dimension.

pub mod distance;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{QueryError, Result};
use crate::model::Name;
use crate::scalar::{Type, Value};

/// A closed function signature: name plus concrete argument types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: Name,
    pub args: Vec<Type>,
}

impl Signature {
    pub fn new(name: Name, args: Vec<Type>) -> Self {
        Self { name, args }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(|t| t.to_string()).collect();
        write!(f, "{}({})", self.name.simple(), args.join(", "))
    }
}

/// The shape an open signature constrains an argument to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    Any,
    Numeric,
    Vector,
    Exact(Type),
}

impl TypeShape {
    pub fn matches(&self, ty: &Type) -> bool {
        match self {
            TypeShape::Any => true,
            TypeShape::Numeric => ty.is_numeric(),
            TypeShape::Vector => ty.is_vector(),
            TypeShape::Exact(exact) => exact == ty,
        }
    }
}

/// An open signature: name plus argument shapes, resolved by a generator
/// into the closed signatures it can instantiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSignature {
    pub name: Name,
    pub args: Vec<TypeShape>,
}

impl OpenSignature {
    pub fn new(name: Name, args: Vec<TypeShape>) -> Self {
        Self { name, args }
    }

    pub fn matches(&self, signature: &Signature) -> bool {
        self.name == signature.name
            && self.args.len() == signature.args.len()
            && self
                .args
                .iter()
                .zip(signature.args.iter())
                .all(|(shape, ty)| shape.matches(ty))
    }
}

/// A scalar function as obtained from the registry.
pub trait ScalarFunction: Send + Sync {
    fn signature(&self) -> &Signature;

    fn return_type(&self) -> Type;

    /// Apply the function to one argument tuple.
    fn invoke(&self, args: &[Value]) -> Result<Value>;

    /// Estimated floating point operations per invocation, consumed by the
    /// cost model.
    fn flops(&self) -> f64 {
        1.0
    }
}

/// Produces concrete functions for the closed signatures it can serve.
pub trait FunctionGenerator: Send + Sync {
    fn name(&self) -> &Name;

    /// The closed signatures this generator offers for an open signature.
    fn resolve(&self, open: &OpenSignature) -> Vec<Signature>;

    /// Instantiate the function for one of the resolved signatures.
    fn generate(&self, signature: &Signature) -> Result<Arc<dyn ScalarFunction>>;
}

/// The process-wide function registry.
///
/// Immutable after initialisation except through the registration APIs,
/// which reject signature collisions.
pub struct FunctionRegistry {
    functions: DashMap<Signature, Arc<dyn ScalarFunction>>,
    generators: RwLock<Vec<Arc<dyn FunctionGenerator>>>,
}

impl FunctionRegistry {
    /// An empty registry without any built-ins.
    pub fn empty() -> Self {
        Self {
            functions: DashMap::new(),
            generators: RwLock::new(vec![]),
        }
    }

    /// A registry with the built-in distance generators registered.
    pub fn new() -> Self {
        let registry = Self::empty();
        for generator in distance::builtin_generators() {
            registry
                .register_generator(generator)
                .expect("built-in generators do not collide");
        }
        registry
    }

    /// Register a concrete function. Rejects signature collisions.
    pub fn register(&self, function: Arc<dyn ScalarFunction>) -> Result<()> {
        let signature = function.signature().clone();
        match self.functions.entry(signature.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(QueryError::NotSupported(format!(
                "a function with signature {} is already registered",
                signature
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(function);
                Ok(())
            }
        }
    }

    /// Register a generator. Rejects a second generator for the same name.
    pub fn register_generator(&self, generator: Arc<dyn FunctionGenerator>) -> Result<()> {
        let mut generators = self.generators.write();
        if generators.iter().any(|g| g.name() == generator.name()) {
            return Err(QueryError::NotSupported(format!(
                "a generator for {} is already registered",
                generator.name()
            )));
        }
        generators.push(generator);
        Ok(())
    }

    /// Obtain the function for a closed signature, instantiating it through
    /// a generator on first use.
    pub fn obtain(&self, signature: &Signature) -> Result<Arc<dyn ScalarFunction>> {
        if let Some(function) = self.functions.get(signature) {
            return Ok(function.value().clone());
        }
        let generators = self.generators.read();
        for generator in generators.iter() {
            if generator.name() != &signature.name {
                continue;
            }
            let open = OpenSignature::new(
                signature.name.clone(),
                signature.args.iter().map(|t| TypeShape::Exact(*t)).collect(),
            );
            if generator.resolve(&open).contains(signature) {
                let function = generator.generate(signature)?;
                self.functions.insert(signature.clone(), function.clone());
                return Ok(function);
            }
        }
        Err(QueryError::NotSupported(format!(
            "no function registered for signature {}",
            signature
        )))
    }

    /// All closed signatures the registered generators offer for an open
    /// signature.
    pub fn resolve(&self, open: &OpenSignature) -> Vec<Signature> {
        let generators = self.generators.read();
        generators
            .iter()
            .filter(|g| g.name() == &open.name)
            .flat_map(|g| g.resolve(open))
            .collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always42 {
        signature: Signature,
    }

    impl ScalarFunction for Always42 {
        fn signature(&self) -> &Signature {
            &self.signature
        }

        fn return_type(&self) -> Type {
            Type::Long
        }

        fn invoke(&self, _args: &[Value]) -> Result<Value> {
            Ok(Value::Long(42))
        }
    }

    fn answer() -> Arc<dyn ScalarFunction> {
        Arc::new(Always42 {
            signature: Signature::new(Name::function("answer").unwrap(), vec![]),
        })
    }

    #[test]
    fn registration_rejects_collisions() {
        let registry = FunctionRegistry::empty();
        registry.register(answer()).unwrap();
        let err = registry.register(answer()).unwrap_err();
        assert!(matches!(err, QueryError::NotSupported(_)));
    }

    #[test]
    fn obtain_unknown_signature_fails() {
        let registry = FunctionRegistry::empty();
        let signature = Signature::new(Name::function("nope").unwrap(), vec![Type::Long]);
        assert!(registry.obtain(&signature).is_err());
    }

    #[test]
    fn obtain_via_generator() {
        let registry = FunctionRegistry::new();
        let signature = Signature::new(
            Name::function("euclidean").unwrap(),
            vec![Type::FloatVector(2), Type::FloatVector(2)],
        );
        let function = registry.obtain(&signature).unwrap();
        assert_eq!(function.return_type(), Type::Double);
        let d = function
            .invoke(&[
                Value::FloatVector(vec![0.0, 0.0]),
                Value::FloatVector(vec![3.0, 4.0]),
            ])
            .unwrap();
        assert_eq!(d, Value::Double(5.0));
    }
}
