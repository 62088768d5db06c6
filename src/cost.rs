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

//! The multi-dimensional cost model and the policy that turns cost vectors
//! into comparable scores and parallelisation decisions.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// A cost estimate along four dimensions: IO, CPU, memory and accuracy.
///
/// Accuracy is a penalty: `0.0` means exact results, larger values mean the
/// plan trades accuracy for speed (e.g. approximate indexes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    pub io: f64,
    pub cpu: f64,
    pub memory: f64,
    pub accuracy: f64,
}

impl Cost {
    /// A zero cost, the additive identity.
    pub const ZERO: Cost = Cost {
        io: 0.0,
        cpu: 0.0,
        memory: 0.0,
        accuracy: 0.0,
    };

    /// A cost that rejects the plan carrying it under every policy.
    pub const INVALID: Cost = Cost {
        io: f64::INFINITY,
        cpu: f64::INFINITY,
        memory: f64::INFINITY,
        accuracy: f64::INFINITY,
    };

    pub fn new(io: f64, cpu: f64, memory: f64, accuracy: f64) -> Self {
        Self {
            io,
            cpu,
            memory,
            accuracy,
        }
    }

    pub fn is_invalid(&self) -> bool {
        !self.io.is_finite()
            || !self.cpu.is_finite()
            || !self.memory.is_finite()
            || !self.accuracy.is_finite()
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost {
            io: self.io + rhs.io,
            cpu: self.cpu + rhs.cpu,
            memory: self.memory + rhs.memory,
            accuracy: self.accuracy + rhs.accuracy,
        }
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        *self = *self + rhs;
    }
}

impl Mul<f64> for Cost {
    type Output = Cost;

    fn mul(self, rhs: f64) -> Cost {
        Cost {
            io: self.io * rhs,
            cpu: self.cpu * rhs,
            memory: self.memory * rhs,
            accuracy: self.accuracy * rhs,
        }
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Cost {
        iter.fold(Cost::ZERO, |a, b| a + b)
    }
}

/// Weights and thresholds that turn [`Cost`] vectors into scores and worker
/// counts. The unit costs are policy inputs, not constants of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CostPolicy {
    /// Weight of the IO dimension.
    pub wio: f64,
    /// Weight of the CPU dimension.
    pub wcpu: f64,
    /// Weight of the memory dimension.
    pub wmemory: f64,
    /// Weight of the accuracy dimension.
    pub waccuracy: f64,
    /// Minimal marginal speedup an additional worker must deliver.
    pub speedup_per_worker: f64,
    /// Fraction of IO cost that cannot be parallelised.
    pub non_parallelisable_io: f64,
    /// Cost of reading a byte from disk.
    pub cost_disk_access_read: f64,
    /// Cost of writing a byte to disk.
    pub cost_disk_access_write: f64,
    /// Cost of touching a byte in memory.
    pub cost_memory_access: f64,
    /// Cost of a floating point operation.
    pub cost_flop: f64,
}

impl Default for CostPolicy {
    fn default() -> Self {
        Self {
            wio: 0.6,
            wcpu: 0.3,
            wmemory: 0.07,
            waccuracy: 0.03,
            speedup_per_worker: 0.5,
            non_parallelisable_io: 0.25,
            cost_disk_access_read: 1e-5,
            cost_disk_access_write: 5e-5,
            cost_memory_access: 1e-7,
            cost_flop: 1e-9,
        }
    }
}

impl CostPolicy {
    /// The scalar score of a cost vector: `Σ wᵢ·cᵢ`. Lower is better.
    pub fn score(&self, cost: &Cost) -> f64 {
        self.wio * cost.io
            + self.wcpu * cost.cpu
            + self.wmemory * cost.memory
            + self.waccuracy * cost.accuracy
    }

    /// Amdahl-style estimate of the optimal number of workers for a plan
    /// whose parallelisable share is `cp` out of a total of `ct`.
    ///
    /// Walks `p = 2..=max_workers` and returns the largest `p` whose
    /// marginal speedup over `p - 1` still meets `speedup_per_worker`. A 1%
    /// coordination overhead of the parallelisable share is charged
    /// regardless of `p`.
    pub fn parallelisation(&self, cp: &Cost, ct: &Cost, max_workers: usize) -> usize {
        if cp.cpu < 1.0 || max_workers <= 2 {
            return 1;
        }
        let total = self.score(ct);
        if total <= 0.0 {
            return 1;
        }

        // The serial share: everything outside cp plus the IO fraction that
        // never parallelises.
        let parallel = self.score(&Cost {
            io: cp.io * (1.0 - self.non_parallelisable_io),
            ..*cp
        });
        let serial = (total - parallel).max(0.0);
        let overhead = 0.01 * parallel;

        let speedup = |p: f64| total / (serial + parallel / p + overhead);

        let mut best = 1;
        for p in 2..=max_workers {
            let marginal = speedup(p as f64) - speedup((p - 1) as f64);
            if marginal < self.speedup_per_worker {
                break;
            }
            best = p;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_invalid() {
        assert_eq!(Cost::ZERO + Cost::ZERO, Cost::ZERO);
        assert!(Cost::INVALID.is_invalid());
        assert!(!Cost::ZERO.is_invalid());
        assert!(CostPolicy::default().score(&Cost::INVALID).is_infinite());
    }

    #[test]
    fn vector_arithmetic() {
        let a = Cost::new(1.0, 2.0, 3.0, 0.0);
        let b = Cost::new(0.5, 0.5, 0.5, 1.0);
        assert_eq!(a + b, Cost::new(1.5, 2.5, 3.5, 1.0));
        assert_eq!(a * 2.0, Cost::new(2.0, 4.0, 6.0, 0.0));
        assert_eq!(vec![a, b].into_iter().sum::<Cost>(), a + b);
    }

    #[test]
    fn no_parallelism_for_tiny_cpu() {
        let policy = CostPolicy::default();
        let cp = Cost::new(100.0, 0.5, 0.0, 0.0);
        assert_eq!(policy.parallelisation(&cp, &cp, 16), 1);
    }

    #[test]
    fn no_parallelism_for_two_workers_max() {
        let policy = CostPolicy::default();
        let cp = Cost::new(100.0, 100.0, 0.0, 0.0);
        assert_eq!(policy.parallelisation(&cp, &cp, 2), 1);
    }

    #[test]
    fn fully_parallel_plan_uses_many_workers() {
        let policy = CostPolicy {
            speedup_per_worker: 0.01,
            non_parallelisable_io: 0.0,
            ..CostPolicy::default()
        };
        let cp = Cost::new(0.0, 1000.0, 0.0, 0.0);
        let p = policy.parallelisation(&cp, &cp, 8);
        assert!(p > 2, "expected several workers, got {}", p);
    }

    #[test]
    fn serial_share_limits_workers() {
        let policy = CostPolicy {
            speedup_per_worker: 0.5,
            ..CostPolicy::default()
        };
        // Mostly serial: only a tenth of the plan parallelises.
        let ct = Cost::new(0.0, 1000.0, 0.0, 0.0);
        let cp = Cost::new(0.0, 100.0, 0.0, 0.0);
        assert_eq!(policy.parallelisation(&cp, &ct, 64), 1);
    }
}
