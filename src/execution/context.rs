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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::binding::BindingContext;
use crate::datasource::{Catalog, Entity, EntityTx, Index, LockMode, TransactionMode};
use crate::error::{QueryError, Result};
use crate::function::FunctionRegistry;
use crate::model::Name;
use crate::physical_plan::stream::CancellationFlag;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// A transaction spanning one or more queries.
///
/// Sub-transactions are opened lazily per entity on first [`get_tx`] and
/// closed together on [`commit`] or [`rollback`]. Opening a sub-transaction
/// takes a shared lock on the entity to block close-during-use; write
/// operators upgrade to an exclusive lock before touching it.
///
/// [`get_tx`]: TransactionContext::get_tx
/// [`commit`]: TransactionContext::commit
/// [`rollback`]: TransactionContext::rollback
pub struct TransactionContext {
    id: u64,
    mode: TransactionMode,
    catalog: Arc<dyn Catalog>,
    cancellation: CancellationFlag,
    txs: Mutex<HashMap<Name, Arc<dyn EntityTx>>>,
    locks: Mutex<HashMap<Name, LockMode>>,
    state: Mutex<TransactionState>,
}

impl TransactionContext {
    /// Begin a new transaction against the given catalogue.
    pub fn begin(catalog: Arc<dyn Catalog>, mode: TransactionMode) -> Arc<Self> {
        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        debug!("beginning transaction {} ({:?})", id, mode);
        Arc::new(Self {
            id,
            mode,
            catalog,
            cancellation: CancellationFlag::new(),
            txs: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            state: Mutex::new(TransactionState::Active),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// The cancellation flag operators observe between records.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Trip the cancellation flag. Streams terminate with
    /// [`QueryError::Cancelled`] at their next record boundary; the owner
    /// is expected to roll back.
    pub fn cancel(&self) {
        debug!("cancelling transaction {}", self.id);
        self.cancellation.cancel();
    }

    fn check_active(&self) -> Result<()> {
        match *self.state.lock() {
            TransactionState::Active => Ok(()),
            state => Err(QueryError::Execution(format!(
                "transaction {} is no longer active ({:?})",
                self.id, state
            ))),
        }
    }

    /// Resolve an entity through the catalogue.
    pub fn entity(&self, name: &Name) -> Result<Arc<dyn Entity>> {
        self.catalog.entity(name)
    }

    /// Resolve an index through its entity.
    pub fn index(&self, name: &Name) -> Result<Arc<dyn Index>> {
        let entity_name = name.entity_name().ok_or_else(|| {
            QueryError::Execution(format!("{} does not name an index", name))
        })?;
        self.entity(&entity_name)?
            .indexes()
            .into_iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| QueryError::Execution(format!("index {} does not exist", name)))
    }

    /// The sub-transaction for an entity, created on first use.
    pub fn get_tx(&self, entity: &Name) -> Result<Arc<dyn EntityTx>> {
        self.check_active()?;
        let mut txs = self.txs.lock();
        if let Some(tx) = txs.get(entity) {
            return Ok(tx.clone());
        }
        self.request_lock(entity, LockMode::Shared)?;
        let tx = self.entity(entity)?.transaction(self.mode)?;
        txs.insert(entity.clone(), tx.clone());
        Ok(tx)
    }

    /// Record a lock request on a database object. Shared requests never
    /// downgrade an exclusive hold.
    pub fn request_lock(&self, dbo: &Name, mode: LockMode) -> Result<()> {
        self.check_active()?;
        if mode == LockMode::Exclusive && self.mode == TransactionMode::ReadOnly {
            return Err(QueryError::NotSupported(format!(
                "transaction {} is read-only and cannot lock {} exclusively",
                self.id, dbo
            )));
        }
        let mut locks = self.locks.lock();
        let entry = locks.entry(dbo.clone()).or_insert(mode);
        if mode == LockMode::Exclusive {
            *entry = LockMode::Exclusive;
        }
        Ok(())
    }

    /// The lock currently recorded for a database object.
    pub fn lock_on(&self, dbo: &Name) -> Option<LockMode> {
        self.locks.lock().get(dbo).copied()
    }

    /// Commit every sub-transaction and close this context.
    pub async fn commit(&self) -> Result<()> {
        self.check_active()?;
        let txs: Vec<Arc<dyn EntityTx>> = self.txs.lock().values().cloned().collect();
        for tx in txs {
            tx.commit().await?;
        }
        *self.state.lock() = TransactionState::Committed;
        self.locks.lock().clear();
        debug!("committed transaction {}", self.id);
        Ok(())
    }

    /// Roll back every sub-transaction and close this context.
    pub async fn rollback(&self) -> Result<()> {
        self.check_active()?;
        let txs: Vec<Arc<dyn EntityTx>> = self.txs.lock().values().cloned().collect();
        for tx in txs {
            tx.rollback().await?;
        }
        *self.state.lock() = TransactionState::RolledBack;
        self.locks.lock().clear();
        debug!("rolled back transaction {}", self.id);
        Ok(())
    }
}

/// Everything one query execution needs: the transaction, the late-bound
/// parameters and the function registry.
#[derive(Clone)]
pub struct QueryContext {
    pub txn: Arc<TransactionContext>,
    pub bindings: BindingContext,
    pub functions: Arc<FunctionRegistry>,
}

impl QueryContext {
    pub fn new(
        txn: Arc<TransactionContext>,
        bindings: BindingContext,
        functions: Arc<FunctionRegistry>,
    ) -> Self {
        Self {
            txn,
            bindings,
            functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TupleId;
    use crate::scalar::Value;
    use crate::test_util::{test_catalog, test_columns};

    fn entity_name() -> Name {
        Name::entity("s", "e").unwrap()
    }

    #[tokio::test]
    async fn sub_transactions_are_created_lazily_and_shared() {
        let txn = TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly);
        assert!(txn.lock_on(&entity_name()).is_none());
        let a = txn.get_tx(&entity_name()).unwrap();
        let b = txn.get_tx(&entity_name()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(txn.lock_on(&entity_name()), Some(LockMode::Shared));
    }

    #[tokio::test]
    async fn exclusive_lock_requires_read_write() {
        let txn = TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly);
        assert!(txn
            .request_lock(&entity_name(), LockMode::Exclusive)
            .is_err());

        let txn = TransactionContext::begin(test_catalog(), TransactionMode::ReadWrite);
        txn.request_lock(&entity_name(), LockMode::Exclusive).unwrap();
        // A later shared request never downgrades.
        txn.request_lock(&entity_name(), LockMode::Shared).unwrap();
        assert_eq!(txn.lock_on(&entity_name()), Some(LockMode::Exclusive));
    }

    #[tokio::test]
    async fn closed_transactions_reject_further_use() {
        let txn = TransactionContext::begin(test_catalog(), TransactionMode::ReadWrite);
        let tx = txn.get_tx(&entity_name()).unwrap();
        tx.insert(&test_columns(), vec![Value::Long(7), Value::from("x"), Value::Double(0.7)])
            .await
            .unwrap();
        txn.rollback().await.unwrap();
        assert!(txn.get_tx(&entity_name()).is_err());
        assert!(txn.commit().await.is_err());

        // The rollback reverted the insert.
        let check = TransactionContext::begin(test_catalog(), TransactionMode::ReadOnly);
        let tx = check.get_tx(&entity_name()).unwrap();
        assert!(tx.fetch(TupleId(6), &test_columns()).await.is_err());
    }
}
