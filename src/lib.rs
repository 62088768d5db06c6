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

//! Warren is the query engine core of a column store specialised for
//! similarity search over high-dimensional vector data.
//!
//! The crate covers the path from a bound logical operator tree to a lazy
//! stream of records: rule-based logical rewriting, cost-based selection
//! among physical candidates, index-aware access paths, intra-query
//! partitioning, late binding of parameters, and streaming execution under
//! a transactional context. Storage engines, index implementations and the
//! lock manager are consumed through the narrow contracts in
//! [`datasource`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use warren::binding::BindingContext;
//! use warren::config::SessionConfig;
//! use warren::cost::CostPolicy;
//! use warren::datasource::TransactionMode;
//! use warren::execution::{QueryContext, TransactionContext};
//! use warren::function::FunctionRegistry;
//! use warren::logical_plan::LogicalPlanBuilder;
//! use warren::physical_plan::stream::collect;
//! use warren::planner::{PlannerContext, QueryPlanner};
//! use warren::test_util::{test_catalog, test_entity};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> warren::error::Result<()> {
//! let catalog = test_catalog();
//! let functions = Arc::new(FunctionRegistry::new());
//! let entity = test_entity();
//!
//! // Bind: build a logical tree.
//! let logical = LogicalPlanBuilder::scan(entity.as_ref(), None)?.limit(3).build();
//!
//! // Plan: rewrite, implement, select.
//! let planner = QueryPlanner::new(SessionConfig::new());
//! let ctx = PlannerContext::new(catalog.clone(), functions.clone(), CostPolicy::default());
//! let physical = planner.plan_and_select(&logical, &ctx, false, true)?;
//!
//! // Execute: stream records under a transaction.
//! let txn = TransactionContext::begin(catalog, TransactionMode::ReadOnly);
//! let query = QueryContext::new(txn.clone(), BindingContext::new(), functions);
//! let records = collect(physical.execute(&query)?).await?;
//! assert_eq!(records.len(), 3);
//! txn.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod config;
pub mod cost;
pub mod datasource;
pub mod error;
pub mod execution;
pub mod function;
pub mod logical_plan;
pub mod model;
pub mod optimizer;
pub mod physical_optimizer;
pub mod physical_plan;
pub mod planner;
pub mod predicate;
pub mod scalar;
pub mod statistics;
pub mod test_util;
pub mod traits;

pub use error::{QueryError, Result};
