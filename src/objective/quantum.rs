// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal quantum cost: Q * sum_i cost(psi_i(T), goal_i).

use ndarray::{Array1, ArrayView1};
use std::sync::Arc;

use super::ObjectiveTerm;
use crate::cost::StateCost;
use crate::model::QuantumSystem;

/// Weighted terminal cost over all tracked quantum states.
pub struct QuantumObjective {
    system: Arc<QuantumSystem>,
    cost: StateCost,
    t_steps: usize,
    q_weight: f64,
    cost_structure: Vec<(usize, usize)>,
    structure: Vec<(usize, usize)>,
}

impl QuantumObjective {
    /// Build the terminal cost term for weight `q_weight`.
    pub fn new(
        system: Arc<QuantumSystem>,
        cost: StateCost,
        t_steps: usize,
        q_weight: f64,
    ) -> Self {
        let cost_structure = cost.hessian_structure(system.isodim);
        let mut structure = Vec::with_capacity(system.nqstates * cost_structure.len());
        for i in 0..system.nqstates {
            let base = system.wfn_range(t_steps - 1, i).start;
            for &(k, j) in &cost_structure {
                structure.push((base + k, base + j));
            }
        }
        Self {
            system,
            cost,
            t_steps,
            q_weight,
            cost_structure,
            structure,
        }
    }

    fn terminal_state<'a>(&self, z: &'a [f64], i: usize) -> ArrayView1<'a, f64> {
        ArrayView1::from(&z[self.system.wfn_range(self.t_steps - 1, i)])
    }
}

impl ObjectiveTerm for QuantumObjective {
    fn name(&self) -> &'static str {
        self.cost.name()
    }

    fn value(&self, z: &[f64]) -> f64 {
        let mut total = 0.0;
        for i in 0..self.system.nqstates {
            total += self
                .cost
                .value(self.terminal_state(z, i), &self.system.psi_goal[i]);
        }
        self.q_weight * total
    }

    fn gradient_into(&self, z: &[f64], grad: &mut [f64]) {
        let mut g = Array1::zeros(self.system.isodim);
        for i in 0..self.system.nqstates {
            self.cost
                .gradient_into(self.terminal_state(z, i), &self.system.psi_goal[i], &mut g);
            let base = self.system.wfn_range(self.t_steps - 1, i).start;
            for r in 0..self.system.isodim {
                grad[base + r] += self.q_weight * g[r];
            }
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values_into(&self, z: &[f64], out: &mut [f64]) {
        let n = self.cost_structure.len();
        for i in 0..self.system.nqstates {
            let chunk = &mut out[i * n..(i + 1) * n];
            self.cost.hessian_values_into(
                self.terminal_state(z, i),
                &self.system.psi_goal[i],
                chunk,
            );
            for v in chunk.iter_mut() {
                *v *= self.q_weight;
            }
        }
    }
}
