// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Minimum-time objective: sum of the per-step durations.

use super::ObjectiveTerm;

/// sum_t dt_t over the given time-step indices.
pub struct MinTimeObjective {
    dt_indices: Vec<usize>,
    structure: Vec<(usize, usize)>,
}

impl MinTimeObjective {
    /// Minimize the total duration over the given Z indices.
    pub fn new(dt_indices: Vec<usize>) -> Self {
        Self {
            dt_indices,
            structure: Vec::new(),
        }
    }

    /// Convenience constructor for the standard layout: the T-1 step
    /// durations that enter the dynamics (the shared trailing duplicate is
    /// excluded).
    pub fn for_layout(vardim: usize, t_steps: usize) -> Self {
        let dt_offset = vardim * t_steps;
        Self::new((0..t_steps - 1).map(|t| dt_offset + t).collect())
    }
}

impl ObjectiveTerm for MinTimeObjective {
    fn name(&self) -> &'static str {
        "min_time"
    }

    fn value(&self, z: &[f64]) -> f64 {
        self.dt_indices.iter().map(|&i| z[i]).sum()
    }

    fn gradient_into(&self, _z: &[f64], grad: &mut [f64]) {
        for &i in &self.dt_indices {
            grad[i] += 1.0;
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values_into(&self, _z: &[f64], _out: &mut [f64]) {}
}
