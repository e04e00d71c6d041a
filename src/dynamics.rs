// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Global dynamics constraints: residual F(Z), sparse Jacobian, and the
//! multiplier-contracted Hessian of the Lagrangian.
//!
//! For each of the T-1 steps the row block stacks the nqstates * isodim
//! integrator residuals first (matching the state layout of a step slice)
//! and the n_aug_states forward-Euler residuals of the augmented control
//! chain second:
//!
//! ```text
//!   aug'[d][k] - aug[d][k] - dt * next[d][k] = 0
//! ```
//!
//! where `next` is the next-derivative block, or the top-order control u for
//! the last block.
//!
//! Sparsity is exchanged as (structure, values) coordinate pairs. The
//! structure vectors are computed once at construction and never change;
//! values are written positionally on every call. Repeated coordinates are
//! summed by the consumer. Hessian entries are emitted in the lower
//! triangle (row >= col in decision-vector order).

use ndarray::{Array1, Array2, ArrayView1};
use std::sync::Arc;
use tracing::debug;

use crate::integrator::{Integrator, StepOperators};
use crate::model::QuantumSystem;

/// Per-call scratch, allocated once at construction.
struct Scratch {
    ops: StepOperators,
    d_prev: Array2<f64>,
    d_next: Array2<f64>,
    vec: Array1<f64>,
    deltas: Vec<Array1<f64>>,
    sums: Vec<Array1<f64>>,
}

/// Dynamics constraint assembler over T-1 steps.
pub struct Dynamics {
    system: Arc<QuantumSystem>,
    integrator: Integrator,
    t_steps: usize,
    dt_offset: usize,
    jac_structure: Vec<(usize, usize)>,
    hess_structure: Vec<(usize, usize)>,
    jac_step_nnz: usize,
    hess_step_nnz: usize,
    scratch: Scratch,
}

impl Dynamics {
    /// Build the assembler and emit both sparsity structures.
    pub fn new(system: Arc<QuantumSystem>, integrator: Integrator, t_steps: usize) -> Self {
        assert!(t_steps >= 2, "need at least two time steps");
        let dt_offset = system.vardim * t_steps;
        let (jac_structure, jac_step_nnz) =
            build_jacobian_structure(&system, t_steps, dt_offset);
        let (hess_structure, hess_step_nnz) =
            build_hessian_structure(&system, &integrator, t_steps, dt_offset);

        debug!(
            rows = system.nstates * (t_steps - 1),
            jac_nnz = jac_structure.len(),
            hess_nnz = hess_structure.len(),
            order = integrator.order(),
            "assembled dynamics sparsity"
        );

        let scratch = Scratch {
            ops: StepOperators::new(&system, &integrator),
            d_prev: Array2::zeros((system.isodim, system.isodim)),
            d_next: Array2::zeros((system.isodim, system.isodim)),
            vec: Array1::zeros(system.isodim),
            deltas: vec![Array1::zeros(system.isodim); system.nqstates],
            sums: vec![Array1::zeros(system.isodim); system.nqstates],
        };

        Self {
            system,
            integrator,
            t_steps,
            dt_offset,
            jac_structure,
            hess_structure,
            jac_step_nnz,
            hess_step_nnz,
            scratch,
        }
    }

    /// The system this assembler was built for.
    pub fn system(&self) -> &Arc<QuantumSystem> {
        &self.system
    }

    /// The integration scheme in use.
    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    /// Number of time steps T.
    pub fn t_steps(&self) -> usize {
        self.t_steps
    }

    /// Number of constraint rows: nstates * (T - 1).
    pub fn num_rows(&self) -> usize {
        self.system.nstates * (self.t_steps - 1)
    }

    /// Offset of the time-step block in Z.
    pub fn dt_offset(&self) -> usize {
        self.dt_offset
    }

    /// Minimum decision-vector length consumed by the dynamics.
    pub fn min_z_len(&self) -> usize {
        self.dt_offset + self.t_steps
    }

    /// Constant Jacobian sparsity, coordinate form.
    pub fn jacobian_structure(&self) -> &[(usize, usize)] {
        &self.jac_structure
    }

    /// Constant lower-triangle Hessian sparsity, coordinate form.
    pub fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.hess_structure
    }

    /// Write F(Z) into `out` (length [`Self::num_rows`]).
    pub fn residual_into(&mut self, z: &[f64], out: &mut [f64]) {
        debug_assert!(z.len() >= self.min_z_len());
        debug_assert_eq!(out.len(), self.num_rows());
        let Dynamics {
            system,
            integrator,
            scratch,
            t_steps,
            dt_offset,
            ..
        } = self;
        let sys = &**system;

        for t in 0..*t_steps - 1 {
            let dt = z[*dt_offset + t];
            let amps = &z[sys.drive_amp_range(t)];
            integrator.prepare_step(sys, amps, &mut scratch.ops);

            for i in 0..sys.nqstates {
                let psi_t = ArrayView1::from(&z[sys.wfn_range(t, i)]);
                let psi_next = ArrayView1::from(&z[sys.wfn_range(t + 1, i)]);
                let row = t * sys.nstates + i * sys.isodim;
                integrator.residual_into(
                    &scratch.ops,
                    dt,
                    psi_t,
                    psi_next,
                    &mut out[row..row + sys.isodim],
                );
            }

            for d in 0..sys.augdim {
                for k in 0..sys.ncontrols {
                    let row = t * sys.nstates + sys.n_wfn_states + d * sys.ncontrols + k;
                    let cur = z[sys.aug_index(t, d, k)];
                    let ahead = z[sys.aug_index(t + 1, d, k)];
                    let next_val = z[aug_next_index(sys, t, d, k)];
                    out[row] = ahead - cur - dt * next_val;
                }
            }
        }
    }

    /// Write Jacobian values in structure order.
    pub fn jacobian_values_into(&mut self, z: &[f64], out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.jac_structure.len());
        let Dynamics {
            system,
            integrator,
            scratch,
            t_steps,
            dt_offset,
            jac_step_nnz,
            ..
        } = self;
        let sys = &**system;

        for (t, chunk) in out.chunks_mut(*jac_step_nnz).enumerate().take(*t_steps - 1) {
            let dt = z[*dt_offset + t];
            let amps = &z[sys.drive_amp_range(t)];
            integrator.prepare_step(sys, amps, &mut scratch.ops);
            integrator.state_jacobians_into(
                &scratch.ops,
                dt,
                &mut scratch.d_prev,
                &mut scratch.d_next,
            );
            fill_state_differences(sys, t, z, &mut scratch.deltas, &mut scratch.sums);

            let mut idx = 0;
            for i in 0..sys.nqstates {
                for r in 0..sys.isodim {
                    for c in 0..sys.isodim {
                        chunk[idx] = scratch.d_prev[[r, c]];
                        idx += 1;
                    }
                }
                for k in 0..sys.ncontrols {
                    integrator.drive_partial_into(
                        &scratch.ops,
                        k,
                        &sys.g_drives[k],
                        dt,
                        &scratch.deltas[i],
                        &scratch.sums[i],
                        &mut scratch.vec,
                    );
                    for r in 0..sys.isodim {
                        chunk[idx] = scratch.vec[r];
                        idx += 1;
                    }
                }
                for r in 0..sys.isodim {
                    for c in 0..sys.isodim {
                        chunk[idx] = scratch.d_next[[r, c]];
                        idx += 1;
                    }
                }
                integrator.dt_partial_into(
                    &scratch.ops,
                    dt,
                    &scratch.deltas[i],
                    &scratch.sums[i],
                    &mut scratch.vec,
                );
                for r in 0..sys.isodim {
                    chunk[idx] = scratch.vec[r];
                    idx += 1;
                }
            }

            for d in 0..sys.augdim {
                for k in 0..sys.ncontrols {
                    let next_val = z[aug_next_index(sys, t, d, k)];
                    chunk[idx] = -1.0;
                    chunk[idx + 1] = 1.0;
                    chunk[idx + 2] = -dt;
                    chunk[idx + 3] = -next_val;
                    idx += 4;
                }
            }
            debug_assert_eq!(idx, *jac_step_nnz);
        }
    }

    /// Write mu-contracted Hessian-of-Lagrangian values in structure order.
    ///
    /// `mu` holds the dynamics-row multipliers only (length
    /// [`Self::num_rows`]).
    pub fn hessian_values_into(&mut self, z: &[f64], mu: &[f64], out: &mut [f64]) {
        debug_assert_eq!(mu.len(), self.num_rows());
        debug_assert_eq!(out.len(), self.hess_structure.len());
        let Dynamics {
            system,
            integrator,
            scratch,
            t_steps,
            dt_offset,
            hess_step_nnz,
            ..
        } = self;
        let sys = &**system;
        let fourth = integrator.is_fourth_order();

        for (t, chunk) in out
            .chunks_mut(*hess_step_nnz)
            .enumerate()
            .take(*t_steps - 1)
        {
            let dt = z[*dt_offset + t];
            let amps = &z[sys.drive_amp_range(t)];
            integrator.prepare_step(sys, amps, &mut scratch.ops);
            fill_state_differences(sys, t, z, &mut scratch.deltas, &mut scratch.sums);

            let mu_state =
                |i: usize| ArrayView1::from(&mu[t * sys.nstates + i * sys.isodim..][..sys.isodim]);

            let mut idx = 0;
            for i in 0..sys.nqstates {
                for k in 0..sys.ncontrols {
                    integrator.drive_state_prev_into(
                        &scratch.ops,
                        k,
                        &sys.g_drives[k],
                        dt,
                        mu_state(i),
                        &mut scratch.vec,
                    );
                    for c in 0..sys.isodim {
                        chunk[idx] = scratch.vec[c];
                        idx += 1;
                    }
                }
                for k in 0..sys.ncontrols {
                    integrator.drive_state_next_into(
                        &scratch.ops,
                        k,
                        &sys.g_drives[k],
                        dt,
                        mu_state(i),
                        &mut scratch.vec,
                    );
                    for c in 0..sys.isodim {
                        chunk[idx] = scratch.vec[c];
                        idx += 1;
                    }
                }
            }

            if fourth {
                for j in 0..sys.ncontrols {
                    for k in 0..=j {
                        let mut v = 0.0;
                        for i in 0..sys.nqstates {
                            v += integrator.drive_drive_entry(
                                j,
                                k,
                                dt,
                                mu_state(i),
                                &scratch.deltas[i],
                            );
                        }
                        chunk[idx] = v;
                        idx += 1;
                    }
                }
            }

            for i in 0..sys.nqstates {
                integrator.dt_state_prev_into(&scratch.ops, dt, mu_state(i), &mut scratch.vec);
                for c in 0..sys.isodim {
                    chunk[idx] = scratch.vec[c];
                    idx += 1;
                }
            }
            for i in 0..sys.nqstates {
                integrator.dt_state_next_into(&scratch.ops, dt, mu_state(i), &mut scratch.vec);
                for c in 0..sys.isodim {
                    chunk[idx] = scratch.vec[c];
                    idx += 1;
                }
            }

            for k in 0..sys.ncontrols {
                let mut v = 0.0;
                for i in 0..sys.nqstates {
                    v += integrator.dt_drive_entry(
                        &scratch.ops,
                        k,
                        &sys.g_drives[k],
                        dt,
                        mu_state(i),
                        &scratch.deltas[i],
                        &scratch.sums[i],
                    );
                }
                chunk[idx] = v;
                idx += 1;
            }

            if fourth {
                let mut v = 0.0;
                for i in 0..sys.nqstates {
                    v += integrator.dt_dt_entry(&scratch.ops, mu_state(i), &scratch.deltas[i]);
                }
                chunk[idx] = v;
                idx += 1;
            }

            for d in 0..sys.augdim {
                for k in 0..sys.ncontrols {
                    let aug_row = t * sys.nstates + sys.n_wfn_states + d * sys.ncontrols + k;
                    chunk[idx] = -mu[aug_row];
                    idx += 1;
                }
            }
            debug_assert_eq!(idx, *hess_step_nnz);
        }
    }
}

/// Absolute Z-index of the driver of augmented value (d, k) at step t: the
/// next-order augmented value, or the top-order control for the last block.
fn aug_next_index(sys: &QuantumSystem, t: usize, d: usize, k: usize) -> usize {
    if d + 1 < sys.augdim {
        sys.aug_index(t, d + 1, k)
    } else {
        sys.control_range(t).start + k
    }
}

fn fill_state_differences(
    sys: &QuantumSystem,
    t: usize,
    z: &[f64],
    deltas: &mut [Array1<f64>],
    sums: &mut [Array1<f64>],
) {
    for i in 0..sys.nqstates {
        let cur = &z[sys.wfn_range(t, i)];
        let next = &z[sys.wfn_range(t + 1, i)];
        for r in 0..sys.isodim {
            deltas[i][r] = next[r] - cur[r];
            sums[i][r] = next[r] + cur[r];
        }
    }
}

fn build_jacobian_structure(
    sys: &QuantumSystem,
    t_steps: usize,
    dt_offset: usize,
) -> (Vec<(usize, usize)>, usize) {
    let per_qstate = 2 * sys.isodim * sys.isodim + sys.ncontrols * sys.isodim + sys.isodim;
    let step_nnz = sys.nqstates * per_qstate + sys.augdim * sys.ncontrols * 4;
    let mut structure = Vec::with_capacity(step_nnz * (t_steps - 1));

    for t in 0..t_steps - 1 {
        let amp_base = sys.drive_amp_range(t).start;
        for i in 0..sys.nqstates {
            let row_base = t * sys.nstates + i * sys.isodim;
            let psi_t_base = sys.wfn_range(t, i).start;
            let psi_next_base = sys.wfn_range(t + 1, i).start;
            for r in 0..sys.isodim {
                for c in 0..sys.isodim {
                    structure.push((row_base + r, psi_t_base + c));
                }
            }
            for k in 0..sys.ncontrols {
                for r in 0..sys.isodim {
                    structure.push((row_base + r, amp_base + k));
                }
            }
            for r in 0..sys.isodim {
                for c in 0..sys.isodim {
                    structure.push((row_base + r, psi_next_base + c));
                }
            }
            for r in 0..sys.isodim {
                structure.push((row_base + r, dt_offset + t));
            }
        }
        for d in 0..sys.augdim {
            for k in 0..sys.ncontrols {
                let row = t * sys.nstates + sys.n_wfn_states + d * sys.ncontrols + k;
                structure.push((row, sys.aug_index(t, d, k)));
                structure.push((row, sys.aug_index(t + 1, d, k)));
                structure.push((row, aug_next_index(sys, t, d, k)));
                structure.push((row, dt_offset + t));
            }
        }
    }
    debug_assert_eq!(structure.len(), step_nnz * (t_steps - 1));
    (structure, step_nnz)
}

fn build_hessian_structure(
    sys: &QuantumSystem,
    integrator: &Integrator,
    t_steps: usize,
    dt_offset: usize,
) -> (Vec<(usize, usize)>, usize) {
    let fourth = integrator.is_fourth_order();
    let nc = sys.ncontrols;
    let mut step_nnz = 2 * sys.nqstates * nc * sys.isodim // drive-state blocks
        + 2 * sys.nqstates * sys.isodim                   // dt-state rows
        + nc                                              // dt-drive
        + sys.augdim * nc; // aug bilinear dt-next
    if fourth {
        step_nnz += nc * (nc + 1) / 2 + 1;
    }
    let mut structure = Vec::with_capacity(step_nnz * (t_steps - 1));

    for t in 0..t_steps - 1 {
        let amp_base = sys.drive_amp_range(t).start;
        let dt_col = dt_offset + t;

        for i in 0..sys.nqstates {
            let psi_t_base = sys.wfn_range(t, i).start;
            let psi_next_base = sys.wfn_range(t + 1, i).start;
            for k in 0..nc {
                for c in 0..sys.isodim {
                    structure.push((amp_base + k, psi_t_base + c));
                }
            }
            for k in 0..nc {
                for c in 0..sys.isodim {
                    structure.push((psi_next_base + c, amp_base + k));
                }
            }
        }

        if fourth {
            for j in 0..nc {
                for k in 0..=j {
                    structure.push((amp_base + j, amp_base + k));
                }
            }
        }

        for i in 0..sys.nqstates {
            let psi_t_base = sys.wfn_range(t, i).start;
            for c in 0..sys.isodim {
                structure.push((dt_col, psi_t_base + c));
            }
        }
        for i in 0..sys.nqstates {
            let psi_next_base = sys.wfn_range(t + 1, i).start;
            for c in 0..sys.isodim {
                structure.push((dt_col, psi_next_base + c));
            }
        }

        for k in 0..nc {
            structure.push((dt_col, amp_base + k));
        }

        if fourth {
            structure.push((dt_col, dt_col));
        }

        for d in 0..sys.augdim {
            for k in 0..nc {
                structure.push((dt_col, aug_next_index(sys, t, d, k)));
            }
        }
    }
    debug_assert_eq!(structure.len(), step_nnz * (t_steps - 1));
    (structure, step_nnz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{densify_coo, random_z, x_gate_system};
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const T: usize = 5;

    fn make(fourth: bool) -> Dynamics {
        let sys = Arc::new(x_gate_system());
        let integ = if fourth {
            Integrator::fourth_order(&sys)
        } else {
            Integrator::second_order()
        };
        Dynamics::new(sys, integ, T)
    }

    fn z_with_dts(dyns: &Dynamics, seed: u64) -> Vec<f64> {
        let mut z = random_z(dyns.min_z_len(), seed);
        // keep time steps positive and well scaled
        for t in 0..dyns.t_steps() {
            z[dyns.dt_offset() + t] = 0.01 + 0.002 * t as f64;
        }
        z
    }

    fn residual(dyns: &mut Dynamics, z: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; dyns.num_rows()];
        dyns.residual_into(z, &mut out);
        out
    }

    #[test]
    fn test_row_and_nnz_counts() {
        let dyns = make(true);
        assert_eq!(dyns.num_rows(), 12 * (T - 1));
        assert_eq!(dyns.jacobian_structure().len() % (T - 1), 0);
        assert_eq!(dyns.hessian_structure().len() % (T - 1), 0);
        // all structure entries in range
        let n = dyns.min_z_len();
        for &(r, c) in dyns.jacobian_structure() {
            assert!(r < dyns.num_rows() && c < n);
        }
        for &(r, c) in dyns.hessian_structure() {
            assert!(r < n && c < n);
            assert!(r >= c, "hessian entries must be lower triangle");
        }
    }

    #[test]
    fn test_second_order_has_fewer_hessian_entries() {
        let sop = make(false);
        let fop = make(true);
        assert!(sop.hessian_structure().len() < fop.hessian_structure().len());
    }

    #[test]
    fn test_residual_vanishes_on_rollout_trajectory() {
        for fourth in [false, true] {
            let mut dyns = make(fourth);
            let sys = Arc::clone(dyns.system());
            let mut z = vec![0.0; dyns.min_z_len()];
            let dt = 0.02;
            for t in 0..T {
                z[dyns.dt_offset() + t] = dt;
            }

            let mut rng = StdRng::seed_from_u64(42);
            // seed step 0 states and controls
            for i in 0..sys.nqstates {
                for (off, v) in z[sys.wfn_range(0, i)]
                    .iter_mut()
                    .zip(sys.psi_init[i].iter())
                {
                    *off = *v;
                }
            }
            for t in 0..T {
                for k in 0..sys.ncontrols {
                    let u_idx = sys.control_range(t).start + k;
                    z[u_idx] = rng.gen_range(-0.5..0.5);
                }
            }
            // augmented chain by forward Euler, states by the scheme propagator
            for t in 0..T - 1 {
                for d in (0..sys.augdim).rev() {
                    for k in 0..sys.ncontrols {
                        let cur = z[sys.aug_index(t, d, k)];
                        let nxt = z[super::aug_next_index(&sys, t, d, k)];
                        z[sys.aug_index(t + 1, d, k)] = cur + dt * nxt;
                    }
                }
                let amps: Vec<f64> = z[sys.drive_amp_range(t)].to_vec();
                let g = sys.step_generator(&amps);
                let u = dyns.integrator().pade_propagator(&g, dt).unwrap();
                for i in 0..sys.nqstates {
                    let psi: ndarray::Array1<f64> =
                        ndarray::ArrayView1::from(&z[sys.wfn_range(t, i)]).to_owned();
                    let next = u.dot(&psi);
                    for (off, v) in z[sys.wfn_range(t + 1, i)].iter_mut().zip(next.iter()) {
                        *off = *v;
                    }
                }
            }

            let out = residual(&mut dyns, &z);
            for v in out {
                assert!(v.abs() < 1e-10, "residual {v} should vanish on rollout");
            }
        }
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        for fourth in [false, true] {
            let mut dyns = make(fourth);
            let z = z_with_dts(&dyns, 7);
            let m = dyns.num_rows();
            let n = dyns.min_z_len();

            let mut vals = vec![0.0; dyns.jacobian_structure().len()];
            dyns.jacobian_values_into(&z, &mut vals);
            let structure = dyns.jacobian_structure().to_vec();
            let analytic = densify_coo(&structure, &vals, m, n, false);

            let h = 1e-6;
            let mut fd = Array2::<f64>::zeros((m, n));
            for j in 0..n {
                let mut zp = z.clone();
                let mut zm = z.clone();
                zp[j] += h;
                zm[j] -= h;
                let fp = residual(&mut dyns, &zp);
                let fm = residual(&mut dyns, &zm);
                for r in 0..m {
                    fd[[r, j]] = (fp[r] - fm[r]) / (2.0 * h);
                }
            }

            for r in 0..m {
                for c in 0..n {
                    assert_relative_eq!(
                        analytic[[r, c]],
                        fd[[r, c]],
                        epsilon = 1e-5,
                        max_relative = 1e-5
                    );
                }
            }
        }
    }

    #[test]
    fn test_hessian_matches_finite_differences_of_mu_jacobian() {
        for fourth in [false, true] {
            let mut dyns = make(fourth);
            let z = z_with_dts(&dyns, 11);
            let m = dyns.num_rows();
            let n = dyns.min_z_len();
            let mu = random_z(m, 99);

            let mut vals = vec![0.0; dyns.hessian_structure().len()];
            dyns.hessian_values_into(&z, &mu, &mut vals);
            let structure = dyns.hessian_structure().to_vec();
            let analytic = densify_coo(&structure, &vals, n, n, true);

            // gradient of <mu, F> from the analytic Jacobian
            let jac_structure = dyns.jacobian_structure().to_vec();
            let grad_at = |dyns: &mut Dynamics, z: &[f64]| -> Vec<f64> {
                let mut jv = vec![0.0; jac_structure.len()];
                dyns.jacobian_values_into(z, &mut jv);
                let mut g = vec![0.0; n];
                for (&(r, c), &v) in jac_structure.iter().zip(jv.iter()) {
                    g[c] += mu[r] * v;
                }
                g
            };

            let h = 1e-6;
            let mut fd = Array2::<f64>::zeros((n, n));
            for j in 0..n {
                let mut zp = z.clone();
                let mut zm = z.clone();
                zp[j] += h;
                zm[j] -= h;
                let gp = grad_at(&mut dyns, &zp);
                let gm = grad_at(&mut dyns, &zm);
                for r in 0..n {
                    fd[[r, j]] = (gp[r] - gm[r]) / (2.0 * h);
                }
            }

            for r in 0..n {
                for c in 0..n {
                    assert_relative_eq!(
                        analytic[[r, c]],
                        fd[[r, c]],
                        epsilon = 1e-5,
                        max_relative = 1e-5
                    );
                }
            }
        }
    }

    #[test]
    fn test_second_order_drive_drive_block_absent() {
        let sop = make(false);
        let sys = sop.system();
        // no (a, a) coordinates in the second-order structure
        for t in 0..T - 1 {
            let amps = sys.drive_amp_range(t);
            for &(r, c) in sop.hessian_structure() {
                assert!(
                    !(amps.contains(&r) && amps.contains(&c)),
                    "unexpected drive-drive entry at ({r}, {c})"
                );
            }
        }
    }

    #[test]
    fn test_structures_are_deterministic() {
        let a = make(true);
        let b = make(true);
        assert_eq!(a.jacobian_structure(), b.jacobian_structure());
        assert_eq!(a.hessian_structure(), b.hessian_structure());
    }
}
