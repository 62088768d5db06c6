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

//! Error types shared by the planner and the execution runtime.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = QueryError> = std::result::Result<T, E>;

/// The error kinds a query can fail with.
///
/// Planner errors (`NotSupported`, `DisconnectedPlan`) are raised before any
/// record flows; runtime errors propagate through the record streams and are
/// handled by the owning transaction.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The operation is explicitly unsupported, e.g. partitioning a subtree
    /// that carries the not-partitionable trait.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// A physical tree was converted to an executor while required inputs
    /// were missing. Indicates a planner bug.
    #[error("Plan is disconnected: {0}")]
    DisconnectedPlan(String),

    /// A binding was read during execution without ever being connected to a
    /// binding context.
    #[error("Binding has not been bound: {0}")]
    BindingNotBound(String),

    /// A projection or function received a value of an incompatible type.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A storage or index failure surfaced by a cursor.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The transaction's cancellation flag was tripped.
    #[error("Query was cancelled")]
    Cancelled,

    /// An internal invariant was violated. Indicates a bug.
    #[error("Internal error: {0}. This was likely caused by a bug, please file a bug report")]
    Internal(String),
}

impl QueryError {
    /// True for the terminal cancellation outcome, which callers treat
    /// differently from data-source failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }
}

/// Shorthand to construct a [`QueryError::Internal`].
#[macro_export]
macro_rules! internal_err {
    ($($arg:tt)*) => {
        Err($crate::error::QueryError::Internal(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = QueryError::NotSupported("partitioning a skip".to_string());
        assert_eq!(
            e.to_string(),
            "Operation not supported: partitioning a skip"
        );
        assert!(!e.is_cancelled());
        assert!(QueryError::Cancelled.is_cancelled());
    }
}
