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

//! The record stream type produced by every executor and the adapters
//! shared between operators.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;

use crate::error::{QueryError, Result};
use crate::model::Record;

/// A lazy stream of records, the unit of data flow between operators.
pub type SendableRecordStream = Pin<Box<dyn Stream<Item = Result<Record>> + Send>>;

/// A stream over an in-memory collection of records.
pub fn iter_stream<I>(records: I) -> SendableRecordStream
where
    I: IntoIterator<Item = Record>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(records.into_iter().map(Ok)))
}

/// An empty stream.
pub fn empty_stream() -> SendableRecordStream {
    Box::pin(futures::stream::empty())
}

/// Drain a stream into a vector; the standard sink for pipeline breakers
/// and tests.
pub async fn collect(mut stream: SendableRecordStream) -> Result<Vec<Record>> {
    let mut records = vec![];
    while let Some(record) = stream.next().await {
        records.push(record?);
    }
    Ok(records)
}

/// A cooperative cancellation flag handed out by the transaction.
///
/// Operators observe it between records; tripping it terminates every
/// stream derived from the transaction with [`QueryError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Error if the flag has been tripped.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pin_project! {
    /// Wraps an operator's output so that cancellation is observed between
    /// records. Dropping the wrapper drops the wrapped stream and thereby
    /// closes every cursor beneath it.
    pub struct CancellableStream {
        #[pin]
        inner: SendableRecordStream,
        flag: CancellationFlag,
        done: bool,
    }
}

impl CancellableStream {
    pub fn wrap(inner: SendableRecordStream, flag: CancellationFlag) -> SendableRecordStream {
        Box::pin(CancellableStream {
            inner,
            flag,
            done: false,
        })
    }
}

impl Stream for CancellableStream {
    type Item = Result<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        if this.flag.is_cancelled() {
            *this.done = true;
            return Poll::Ready(Some(Err(QueryError::Cancelled)));
        }
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Err(e))) => {
                *this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, Record, TupleId};
    use crate::scalar::{Type, Value};

    fn record(id: u64) -> Record {
        let columns: std::sync::Arc<[ColumnDef]> =
            vec![ColumnDef::qualified("s", "e", "id", Type::Long).unwrap()].into();
        Record::new(TupleId(id), columns, vec![Value::Long(id as i64)]).unwrap()
    }

    #[tokio::test]
    async fn cancellation_terminates_the_stream() {
        let flag = CancellationFlag::new();
        let stream = CancellableStream::wrap(iter_stream(vec![record(0), record(1)]), flag.clone());
        flag.cancel();
        let err = collect(stream).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn untripped_flag_is_transparent() {
        let flag = CancellationFlag::new();
        let stream = CancellableStream::wrap(iter_stream(vec![record(0), record(1)]), flag);
        assert_eq!(collect(stream).await.unwrap().len(), 2);
    }
}
