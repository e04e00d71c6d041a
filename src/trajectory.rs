// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trajectory container: the flat decision vector with named views.
//!
//! Layout of Z:
//!
//! ```text
//!   [ vardim * T step block | T time steps (last = shared dt_bar) |
//!     T * l1_count s1 slacks | T * l1_count s2 slacks ]
//! ```
//!
//! Seeding is by linear interpolation from the initial to the goal states
//! with optional Gaussian jitter, or by exact rollout of the drift under
//! exp(G_drift dt). Mutation happens only through seeding or the solver's
//! final read-back.

use indexmap::IndexMap;
use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::error::{DimensionError, Error, Result};
use crate::expm::matrix_exp;
use crate::model::QuantumSystem;

/// Index arithmetic of a flat decision vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZLayout {
    pub vardim: usize,
    pub nstates: usize,
    pub n_wfn_states: usize,
    pub isodim: usize,
    pub nqstates: usize,
    pub ncontrols: usize,
    pub t_steps: usize,
    /// Number of L1-regularized components per step (0 when disabled).
    pub l1_count: usize,
}

impl ZLayout {
    /// Layout for `t_steps` steps of the given system.
    pub fn new(system: &QuantumSystem, t_steps: usize, l1_count: usize) -> Self {
        Self {
            vardim: system.vardim,
            nstates: system.nstates,
            n_wfn_states: system.n_wfn_states,
            isodim: system.isodim,
            nqstates: system.nqstates,
            ncontrols: system.ncontrols,
            t_steps,
            l1_count,
        }
    }

    /// Offset of the time-step block.
    pub fn dt_offset(&self) -> usize {
        self.vardim * self.t_steps
    }

    /// Z index of dt_t.
    pub fn dt_index(&self, t: usize) -> usize {
        self.dt_offset() + t
    }

    /// Z index of the shared trailing duplicate dt_bar.
    pub fn dt_shared_index(&self) -> usize {
        self.dt_offset() + self.t_steps - 1
    }

    /// Offset of the slack block.
    pub fn slack_offset(&self) -> usize {
        self.dt_offset() + self.t_steps
    }

    /// Z index of s1 slack `r` at step `t`.
    pub fn slack1_index(&self, t: usize, r: usize) -> usize {
        self.slack_offset() + t * self.l1_count + r
    }

    /// Z index of s2 slack `r` at step `t`.
    pub fn slack2_index(&self, t: usize, r: usize) -> usize {
        self.slack_offset() + self.t_steps * self.l1_count + t * self.l1_count + r
    }

    /// Total number of decision variables.
    pub fn num_vars(&self) -> usize {
        self.vardim * self.t_steps + self.t_steps + 2 * self.l1_count * self.t_steps
    }
}

/// The flat decision vector plus named component index sets.
#[derive(Debug, Clone)]
pub struct Trajectory {
    layout: ZLayout,
    data: Vec<f64>,
    components: IndexMap<String, Vec<usize>>,
}

impl Trajectory {
    /// All-zero trajectory for the layout.
    pub fn zeros(layout: ZLayout) -> Self {
        let mut components = IndexMap::new();
        let mut x = Vec::with_capacity(layout.n_wfn_states * layout.t_steps);
        let mut u = Vec::with_capacity(layout.ncontrols * layout.t_steps);
        for t in 0..layout.t_steps {
            let base = t * layout.vardim;
            x.extend(base..base + layout.n_wfn_states);
            u.extend(base + layout.nstates..base + layout.vardim);
        }
        components.insert("x".to_string(), x);
        components.insert("u".to_string(), u);
        components.insert(
            "dt".to_string(),
            (0..layout.t_steps).map(|t| layout.dt_index(t)).collect(),
        );

        Self {
            layout,
            data: vec![0.0; layout.num_vars()],
            components,
        }
    }

    /// Seed by per-state linear interpolation from psi_init to psi_goal
    /// with Gaussian jitter of standard deviation `sigma` (0 disables) on
    /// the wavefunction values.
    pub fn linear_interpolation(
        system: &QuantumSystem,
        layout: ZLayout,
        dt: f64,
        sigma: f64,
        seed: u64,
    ) -> Result<Self> {
        check_layout(system, &layout)?;
        if dt <= 0.0 {
            return Err(Error::Config(format!("dt must be positive, got {dt}")));
        }
        let mut traj = Self::zeros(layout);
        let t_steps = layout.t_steps;
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = if sigma > 0.0 {
            Some(Normal::new(0.0, sigma).map_err(|e| Error::Config(e.to_string()))?)
        } else {
            None
        };

        for t in 0..t_steps {
            let alpha = t as f64 / (t_steps - 1) as f64;
            for i in 0..system.nqstates {
                let range = system.wfn_range(t, i);
                let init = &system.psi_init[i];
                let goal = &system.psi_goal[i];
                for (r, idx) in range.enumerate() {
                    let mut v = (1.0 - alpha) * init[r] + alpha * goal[r];
                    if let Some(n) = &normal {
                        v += n.sample(&mut rng);
                    }
                    traj.data[idx] = v;
                }
            }
            traj.data[layout.dt_index(t)] = dt;
        }
        Ok(traj)
    }

    /// Seed by exact rollout of the drift Hamiltonian (zero controls)
    /// under exp(G_drift dt).
    pub fn rollout(system: &QuantumSystem, layout: ZLayout, dt: f64) -> Result<Self> {
        check_layout(system, &layout)?;
        if dt <= 0.0 {
            return Err(Error::Config(format!("dt must be positive, got {dt}")));
        }
        let mut traj = Self::zeros(layout);
        let u = matrix_exp(&(&system.g_drift * dt))?;

        for i in 0..system.nqstates {
            let range = system.wfn_range(0, i);
            for (r, idx) in range.enumerate() {
                traj.data[idx] = system.psi_init[i][r];
            }
        }
        for t in 0..layout.t_steps {
            traj.data[layout.dt_index(t)] = dt;
            if t + 1 == layout.t_steps {
                break;
            }
            for i in 0..system.nqstates {
                let cur: Vec<f64> = traj.data[system.wfn_range(t, i)].to_vec();
                let next = u.dot(&ArrayView1::from(&cur[..]));
                for (r, idx) in system.wfn_range(t + 1, i).enumerate() {
                    traj.data[idx] = next[r];
                }
            }
        }
        Ok(traj)
    }

    /// The layout of this trajectory.
    pub fn layout(&self) -> &ZLayout {
        &self.layout
    }

    /// Flat decision vector.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Read a solution vector back into the container.
    pub fn read_back(&mut self, z: &[f64]) -> Result<()> {
        if z.len() != self.data.len() {
            return Err(DimensionError::Mismatch {
                context: "solution vector".into(),
                expected: self.data.len(),
                actual: z.len(),
            }
            .into());
        }
        self.data.copy_from_slice(z);
        Ok(())
    }

    /// Register a named component index set.
    pub fn add_component(&mut self, name: &str, indices: Vec<usize>) {
        self.components.insert(name.to_string(), indices);
    }

    /// Look up a named component index set.
    pub fn component(&self, name: &str) -> Option<&[usize]> {
        self.components.get(name).map(|v| v.as_slice())
    }

    /// Iso wavefunction of state `i` at step `t`.
    pub fn state(&self, t: usize, i: usize) -> ArrayView1<'_, f64> {
        let base = t * self.layout.vardim + i * self.layout.isodim;
        ArrayView1::from(&self.data[base..base + self.layout.isodim])
    }

    /// Top-order controls u at step `t`.
    pub fn controls(&self, t: usize) -> &[f64] {
        let base = t * self.layout.vardim + self.layout.nstates;
        &self.data[base..base + self.layout.ncontrols]
    }

    /// Duration of step `t`.
    pub fn dt(&self, t: usize) -> f64 {
        self.data[self.layout.dt_index(t)]
    }

    /// Cumulative time grid: T entries, starting at zero.
    pub fn times(&self) -> Vec<f64> {
        let mut ts = Vec::with_capacity(self.layout.t_steps);
        let mut acc = 0.0;
        for t in 0..self.layout.t_steps {
            ts.push(acc);
            acc += self.dt(t);
        }
        ts
    }

    /// Total duration over the T-1 dynamic steps.
    pub fn duration(&self) -> f64 {
        (0..self.layout.t_steps - 1).map(|t| self.dt(t)).sum()
    }
}

fn check_layout(system: &QuantumSystem, layout: &ZLayout) -> Result<()> {
    if layout.vardim != system.vardim || layout.n_wfn_states != system.n_wfn_states {
        return Err(DimensionError::Mismatch {
            context: "trajectory layout".into(),
            expected: system.vardim,
            actual: layout.vardim,
        }
        .into());
    }
    if layout.t_steps < 2 {
        return Err(Error::Config(format!(
            "need at least 2 time steps, got {}",
            layout.t_steps
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso::iso_norm;
    use crate::test_utils::x_gate_system;
    use approx::assert_relative_eq;

    fn layout(t_steps: usize, l1: usize) -> (QuantumSystem, ZLayout) {
        let sys = x_gate_system();
        let layout = ZLayout::new(&sys, t_steps, l1);
        (sys, layout)
    }

    #[test]
    fn test_layout_indexing() {
        let (_, l) = layout(5, 2);
        assert_eq!(l.dt_offset(), 70);
        assert_eq!(l.dt_index(4), 74);
        assert_eq!(l.dt_shared_index(), 74);
        assert_eq!(l.slack_offset(), 75);
        assert_eq!(l.slack1_index(0, 0), 75);
        assert_eq!(l.slack1_index(1, 1), 78);
        assert_eq!(l.slack2_index(0, 0), 85);
        assert_eq!(l.num_vars(), 70 + 5 + 20);
    }

    #[test]
    fn test_zero_trajectory_components() {
        let (_, l) = layout(3, 0);
        let traj = Trajectory::zeros(l);
        assert_eq!(traj.data().len(), l.num_vars());
        assert_eq!(traj.component("x").unwrap().len(), 8 * 3);
        assert_eq!(traj.component("u").unwrap().len(), 2 * 3);
        assert_eq!(traj.component("dt").unwrap(), &[42, 43, 44]);
        assert!(traj.component("nope").is_none());
    }

    #[test]
    fn test_linear_interpolation_endpoints() {
        let (sys, l) = layout(5, 0);
        let traj = Trajectory::linear_interpolation(&sys, l, 0.01, 0.0, 0).unwrap();
        for i in 0..sys.nqstates {
            for r in 0..sys.isodim {
                assert_relative_eq!(traj.state(0, i)[r], sys.psi_init[i][r]);
                assert_relative_eq!(traj.state(4, i)[r], sys.psi_goal[i][r]);
            }
        }
        for t in 0..5 {
            assert_relative_eq!(traj.dt(t), 0.01);
        }
        // augmented values and controls start at zero
        for t in 0..5 {
            for v in traj.controls(t) {
                assert_eq!(*v, 0.0);
            }
        }
    }

    #[test]
    fn test_jitter_is_seeded_and_reproducible() {
        let (sys, l) = layout(5, 0);
        let a = Trajectory::linear_interpolation(&sys, l, 0.01, 0.1, 7).unwrap();
        let b = Trajectory::linear_interpolation(&sys, l, 0.01, 0.1, 7).unwrap();
        let c = Trajectory::linear_interpolation(&sys, l, 0.01, 0.1, 8).unwrap();
        assert_eq!(a.data(), b.data());
        assert_ne!(a.data(), c.data());
    }

    #[test]
    fn test_rollout_preserves_norm() {
        let (sys, l) = layout(6, 0);
        let traj = Trajectory::rollout(&sys, l, 0.05).unwrap();
        for t in 0..6 {
            for i in 0..sys.nqstates {
                assert_relative_eq!(
                    iso_norm(&traj.state(t, i).to_owned()),
                    1.0,
                    epsilon = 1e-10
                );
            }
        }
    }

    #[test]
    fn test_times_accumulate() {
        let (sys, l) = layout(4, 0);
        let traj = Trajectory::linear_interpolation(&sys, l, 0.5, 0.0, 0).unwrap();
        assert_eq!(traj.times(), vec![0.0, 0.5, 1.0, 1.5]);
        assert_relative_eq!(traj.duration(), 1.5);
    }

    #[test]
    fn test_read_back_checks_length() {
        let (_, l) = layout(3, 0);
        let mut traj = Trajectory::zeros(l);
        assert!(traj.read_back(&vec![0.0; 3]).is_err());
        let z = vec![1.0; l.num_vars()];
        traj.read_back(&z).unwrap();
        assert_eq!(traj.data()[0], 1.0);
    }

    #[test]
    fn test_bad_dt_rejected() {
        let (sys, l) = layout(3, 0);
        assert!(Trajectory::linear_interpolation(&sys, l, 0.0, 0.0, 0).is_err());
        assert!(Trajectory::linear_interpolation(&sys, l, -1.0, 0.0, 0).is_err());
    }
}
