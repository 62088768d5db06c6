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

//! The streaming filter executor.

use futures::future::ready;
use futures::TryStreamExt;

use crate::error::Result;
use crate::execution::QueryContext;
use crate::physical_plan::stream::SendableRecordStream;
use crate::physical_plan::FilterExec;

pub(crate) fn execute(node: &FilterExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let input = node.input.execute(ctx)?;
    let predicate = node.predicate.clone();
    let bindings = ctx.bindings.clone();
    Ok(Box::pin(input.try_filter_map(move |record| {
        ready(match predicate.is_match(&record, &bindings) {
            Ok(true) => Ok(Some(record)),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        })
    })))
}
