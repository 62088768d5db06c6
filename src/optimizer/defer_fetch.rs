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

//! The two fetch-deferral rules.
//!
//! *DeferFetchOnScan* narrows an `EntityScan` to the columns required before
//! the first use of the remaining ones and re-introduces those through a
//! single `Fetch` at that point; columns no operator consumes are pruned.
//! *DeferFetchOnFetch* then moves every `Fetch` to the latest position at
//! which its columns are first needed, splitting or eliminating it along
//! the way.
//!
//! Both rules operate on maximal unary chains bottoming out at a source;
//! what the chain's consumer can observe is bounded by the columns the
//! chain's top operator emits.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::logical_plan::{from_plan, EntityScan, Fetch, LogicalPlan};
use crate::model::{ColumnDef, Name};
use crate::optimizer::{map_children, RewriteRule};

/// A maximal unary chain: operators listed bottom-up, plus the source node
/// beneath them. `None` if the walk hits an n-ary node before a source.
fn decompose(plan: &LogicalPlan) -> Option<(Vec<LogicalPlan>, LogicalPlan)> {
    let mut ops = vec![];
    let mut current = plan.clone();
    loop {
        let inputs = current.inputs();
        match inputs.len() {
            0 => {
                ops.reverse();
                return Some((ops, current));
            }
            1 => {
                let next = inputs[0].as_ref().clone();
                ops.push(current);
                current = next;
            }
            _ => return None,
        }
    }
}

/// Rebuild the chain over a (possibly replaced) source.
fn recompose(ops: &[LogicalPlan], source: LogicalPlan) -> Result<LogicalPlan> {
    let mut current = source;
    for op in ops {
        current = from_plan(op, &[Arc::new(current)])?;
    }
    Ok(current)
}

fn to_set(columns: &[ColumnDef]) -> BTreeSet<ColumnDef> {
    columns.iter().cloned().collect()
}

fn ordered_subset(original: &[ColumnDef], keep: &BTreeSet<ColumnDef>) -> Vec<ColumnDef> {
    original.iter().filter(|c| keep.contains(c)).cloned().collect()
}

fn contains_node(plan: &LogicalPlan, predicate: &impl Fn(&LogicalPlan) -> bool) -> bool {
    predicate(plan) || plan.inputs().iter().any(|i| contains_node(i, predicate))
}

/// Narrow scans and defer the remaining columns into a single `Fetch`.
#[derive(Default)]
pub struct DeferFetchOnScan {}

impl DeferFetchOnScan {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {}
    }

    fn transform(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        if let Some(rewritten) = self.defer(plan)? {
            return Ok(Some(rewritten));
        }
        map_children(plan, |child| self.transform(child))
    }

    fn defer(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let Some((ops, source)) = decompose(plan) else {
            return Ok(None);
        };
        let LogicalPlan::EntityScan(scan) = &source else {
            return Ok(None);
        };
        if ops.is_empty() {
            return Ok(None);
        }
        let scanned = to_set(&scan.columns);

        // What each operator needs from the scan, and what the chain's
        // consumer can still observe through the top operator.
        let used: Vec<BTreeSet<ColumnDef>> = ops
            .iter()
            .map(|op| {
                to_set(&op.requires())
                    .intersection(&scanned)
                    .cloned()
                    .collect()
            })
            .collect();
        let top_out: BTreeSet<ColumnDef> = to_set(&ops[ops.len() - 1].columns())
            .intersection(&scanned)
            .cloned()
            .collect();
        let mut total: BTreeSet<ColumnDef> = top_out.clone();
        for u in &used {
            total.extend(u.iter().cloned());
        }

        let scan_cols = used[0].clone();
        let deferred: BTreeSet<ColumnDef> = total.difference(&scan_cols).cloned().collect();

        let new_columns = ordered_subset(&scan.columns, &scan_cols);
        if new_columns == scan.columns && deferred.is_empty() {
            return Ok(None);
        }
        let new_scan = LogicalPlan::EntityScan(EntityScan {
            entity: scan.entity.clone(),
            columns: new_columns,
            group: scan.group,
        });

        if deferred.is_empty() {
            // Pure pruning, nothing left to fetch later.
            return Ok(Some(recompose(&ops, new_scan)?));
        }

        // Position the fetch immediately before the first operator that
        // needs a deferred column; if only the consumer does, it goes on
        // top.
        let position = (1..ops.len())
            .find(|i| !used[*i].is_subset(&scan_cols))
            .unwrap_or(ops.len());
        let fetch = LogicalPlan::Fetch(Fetch {
            input: Arc::new(recompose(&ops[..position], new_scan)?),
            entity: scan.entity.clone(),
            fetch: ordered_subset(&scan.columns, &deferred),
        });
        let rewritten = recompose(&ops[position..], fetch)?;
        if rewritten == *plan {
            Ok(None)
        } else {
            Ok(Some(rewritten))
        }
    }
}

impl RewriteRule for DeferFetchOnScan {
    fn name(&self) -> &str {
        "defer_fetch_on_scan"
    }

    fn can_be_applied(&self, plan: &LogicalPlan) -> bool {
        contains_node(plan, &|node| matches!(node, LogicalPlan::EntityScan(_)))
    }

    fn apply(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        self.transform(plan)
    }
}

/// Move, split or eliminate existing `Fetch` operators.
#[derive(Default)]
pub struct DeferFetchOnFetch {}

impl DeferFetchOnFetch {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {}
    }

    fn transform(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        if let Some(rewritten) = self.redistribute(plan)? {
            return Ok(Some(rewritten));
        }
        map_children(plan, |child| self.transform(child))
    }

    /// Strip every `Fetch` out of the chain and re-insert one fetch group
    /// per first-need position.
    fn redistribute(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let Some((ops, source)) = decompose(plan) else {
            return Ok(None);
        };
        if !ops.iter().any(|op| matches!(op, LogicalPlan::Fetch(_))) {
            return Ok(None);
        }
        let top_out = to_set(&ops[ops.len() - 1].columns());

        // The operators that stay, with their original chain position.
        let kept: Vec<(usize, &LogicalPlan)> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| !matches!(op, LogicalPlan::Fetch(_)))
            .collect();

        // Destination of every fetched column: the first kept operator above
        // its fetch that requires it, the consumer, or nowhere. One fetch
        // group per entity and destination.
        #[derive(PartialEq, Eq)]
        enum Destination {
            Before(usize),
            Top,
        }
        let mut groups: Vec<(Name, Destination, Vec<ColumnDef>)> = vec![];
        let mut assigned: BTreeSet<ColumnDef> = BTreeSet::new();
        for (index, op) in ops.iter().enumerate() {
            let LogicalPlan::Fetch(fetch) = op else {
                continue;
            };
            for column in &fetch.fetch {
                if !assigned.insert(column.clone()) {
                    continue;
                }
                let destination = kept
                    .iter()
                    .filter(|(i, _)| *i > index)
                    .find(|(_, op)| to_set(&op.requires()).contains(column))
                    .map(|(i, _)| Destination::Before(*i));
                let destination = match destination {
                    Some(d) => d,
                    None if top_out.contains(column) => Destination::Top,
                    None => continue, // never used again: eliminated
                };
                match groups
                    .iter_mut()
                    .find(|(entity, d, _)| entity == &fetch.entity && *d == destination)
                {
                    Some((_, _, columns)) => columns.push(column.clone()),
                    None => groups.push((fetch.entity.clone(), destination, vec![column.clone()])),
                }
            }
        }

        // Rebuild the chain with the redistributed fetches.
        let mut current = source;
        for &(index, op) in &kept {
            for (entity, destination, columns) in &groups {
                if matches!(destination, Destination::Before(i) if *i == index) {
                    current = LogicalPlan::Fetch(Fetch {
                        input: Arc::new(current),
                        entity: entity.clone(),
                        fetch: columns.clone(),
                    });
                }
            }
            current = from_plan(op, &[Arc::new(current)])?;
        }
        for (entity, destination, columns) in &groups {
            if matches!(destination, Destination::Top) {
                current = LogicalPlan::Fetch(Fetch {
                    input: Arc::new(current),
                    entity: entity.clone(),
                    fetch: columns.clone(),
                });
            }
        }

        if current == *plan {
            Ok(None)
        } else {
            Ok(Some(current))
        }
    }
}

impl RewriteRule for DeferFetchOnFetch {
    fn name(&self) -> &str {
        "defer_fetch_on_fetch"
    }

    fn can_be_applied(&self, plan: &LogicalPlan) -> bool {
        contains_node(plan, &|node| matches!(node, LogicalPlan::Fetch(_)))
    }

    fn apply(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        self.transform(plan)
    }
}
