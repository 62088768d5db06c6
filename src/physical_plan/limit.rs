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

//! Limit and skip executors. Skip streams once its threshold has passed.

use futures::future::ready;
use futures::{StreamExt, TryStreamExt};

use crate::error::Result;
use crate::execution::QueryContext;
use crate::physical_plan::stream::SendableRecordStream;
use crate::physical_plan::{LimitExec, SkipExec};

pub(crate) fn execute_limit(
    node: &LimitExec,
    ctx: &QueryContext,
) -> Result<SendableRecordStream> {
    let input = node.input.execute(ctx)?;
    Ok(Box::pin(input.take(node.limit as usize)))
}

pub(crate) fn execute_skip(node: &SkipExec, ctx: &QueryContext) -> Result<SendableRecordStream> {
    let input = node.input.execute(ctx)?;
    // Only records count towards the threshold; an error passes through.
    let mut remaining = node.skip;
    Ok(Box::pin(input.try_filter_map(move |record| {
        let keep = if remaining > 0 {
            remaining -= 1;
            false
        } else {
            true
        };
        ready(Ok(keep.then_some(record)))
    })))
}
