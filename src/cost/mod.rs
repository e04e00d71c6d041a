// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-state scalar cost functions with hand-derived analytic gradients and
//! sparse upper-triangle Hessians.
//!
//! Each cost operates on a single iso wavefunction of length `isodim`
//! against a fixed iso goal (costs that do not use the goal ignore it).
//! With r = <goal, psi> and q = <iso(i goal), psi>, the complex overlap
//! satisfies |<goal|psi>|^2 = r^2 + q^2; all fidelity-family derivatives
//! reduce to rank-structured combinations of the goal and its i-rotation.
//!
//! Hessians are exchanged as a fixed list of (k, j) positions with k <= j
//! plus positional values, the same coordinate convention used by the
//! objective algebra.

use ndarray::{Array1, Array2, ArrayView1};
use num_complex::Complex64;

use crate::error::DimensionError;
use crate::iso::{iso_operator, iso_times_i};

/// Scalar cost over one iso wavefunction.
#[derive(Debug, Clone)]
pub enum StateCost {
    /// |1 - |<psi|goal>|^2|, invariant under global phase.
    Infidelity,
    /// 1 - <iso(psi), iso(goal)>^2, treating iso vectors as plain real
    /// vectors (experimental).
    IsoInfidelity,
    /// 1 - |<psi|goal>|, an overlap-norm surrogate (experimental).
    Geodesic,
    /// (1 - r)^2 + q^2, pinning the global phase (experimental).
    Quaternionic,
    /// Re <psi| H |psi> as the quadratic form of the symmetric real
    /// representation of H.
    Energy(Array2<f64>),
    /// tr(rho log rho) for the pure state rho = |psi><psi|: identically
    /// zero, returned as such with zero derivatives rather than evaluating
    /// log on the singular spectrum.
    NegEntropy,
    /// -sum of real parts (experimental).
    PureReal,
    /// sum of squared imaginary parts (experimental).
    Real,
}

impl StateCost {
    /// Energy cost for a Hermitian Hamiltonian.
    pub fn energy(h: &Array2<Complex64>) -> Result<Self, DimensionError> {
        Ok(StateCost::Energy(iso_operator(h)?))
    }

    /// Term label for objective metadata.
    pub fn name(&self) -> &'static str {
        match self {
            StateCost::Infidelity => "infidelity",
            StateCost::IsoInfidelity => "iso_infidelity",
            StateCost::Geodesic => "geodesic",
            StateCost::Quaternionic => "quaternionic",
            StateCost::Energy(_) => "energy",
            StateCost::NegEntropy => "neg_entropy",
            StateCost::PureReal => "pure_real",
            StateCost::Real => "real",
        }
    }

    /// Evaluate the cost.
    pub fn value(&self, psi: ArrayView1<f64>, goal: &Array1<f64>) -> f64 {
        match self {
            StateCost::Infidelity => {
                let (r, q) = overlap_parts(psi, goal);
                (1.0 - (r * r + q * q)).abs()
            }
            StateCost::IsoInfidelity => {
                let r = goal.dot(&psi);
                1.0 - r * r
            }
            StateCost::Geodesic => {
                let (r, q) = overlap_parts(psi, goal);
                1.0 - (r * r + q * q).sqrt()
            }
            StateCost::Quaternionic => {
                let (r, q) = overlap_parts(psi, goal);
                (1.0 - r) * (1.0 - r) + q * q
            }
            StateCost::Energy(m) => {
                let m_psi = m.dot(&psi);
                psi.dot(&m_psi)
            }
            StateCost::NegEntropy => 0.0,
            StateCost::PureReal => {
                let n = psi.len() / 2;
                -psi.iter().take(n).sum::<f64>()
            }
            StateCost::Real => {
                let n = psi.len() / 2;
                psi.iter().skip(n).map(|v| v * v).sum()
            }
        }
    }

    /// Analytic gradient, written into `out`.
    pub fn gradient_into(&self, psi: ArrayView1<f64>, goal: &Array1<f64>, out: &mut Array1<f64>) {
        match self {
            StateCost::Infidelity => {
                let rot = iso_times_i(goal);
                let (r, q) = overlap_parts(psi, goal);
                let s = if 1.0 - (r * r + q * q) >= 0.0 { 1.0 } else { -1.0 };
                for i in 0..out.len() {
                    out[i] = -2.0 * s * (r * goal[i] + q * rot[i]);
                }
            }
            StateCost::IsoInfidelity => {
                let r = goal.dot(&psi);
                for i in 0..out.len() {
                    out[i] = -2.0 * r * goal[i];
                }
            }
            StateCost::Geodesic => {
                let rot = iso_times_i(goal);
                let (r, q) = overlap_parts(psi, goal);
                let f = (r * r + q * q).sqrt();
                for i in 0..out.len() {
                    out[i] = -(r * goal[i] + q * rot[i]) / f;
                }
            }
            StateCost::Quaternionic => {
                let rot = iso_times_i(goal);
                let (r, q) = overlap_parts(psi, goal);
                for i in 0..out.len() {
                    out[i] = -2.0 * (1.0 - r) * goal[i] + 2.0 * q * rot[i];
                }
            }
            StateCost::Energy(m) => {
                let m_psi = m.dot(&psi);
                for i in 0..out.len() {
                    out[i] = 2.0 * m_psi[i];
                }
            }
            StateCost::NegEntropy => out.fill(0.0),
            StateCost::PureReal => {
                let n = psi.len() / 2;
                for i in 0..out.len() {
                    out[i] = if i < n { -1.0 } else { 0.0 };
                }
            }
            StateCost::Real => {
                let n = psi.len() / 2;
                for i in 0..out.len() {
                    out[i] = if i >= n { 2.0 * psi[i] } else { 0.0 };
                }
            }
        }
    }

    /// Fixed upper-triangle Hessian sparsity for state dimension `isodim`.
    pub fn hessian_structure(&self, isodim: usize) -> Vec<(usize, usize)> {
        match self {
            StateCost::NegEntropy | StateCost::PureReal => Vec::new(),
            StateCost::Real => {
                let n = isodim / 2;
                (n..isodim).map(|i| (i, i)).collect()
            }
            _ => {
                let mut s = Vec::with_capacity(isodim * (isodim + 1) / 2);
                for k in 0..isodim {
                    for j in k..isodim {
                        s.push((k, j));
                    }
                }
                s
            }
        }
    }

    /// Hessian values in [`Self::hessian_structure`] order.
    pub fn hessian_values_into(
        &self,
        psi: ArrayView1<f64>,
        goal: &Array1<f64>,
        out: &mut [f64],
    ) {
        let isodim = psi.len();
        match self {
            StateCost::Infidelity => {
                let rot = iso_times_i(goal);
                let (r, q) = overlap_parts(psi, goal);
                let s = if 1.0 - (r * r + q * q) >= 0.0 { 1.0 } else { -1.0 };
                let mut idx = 0;
                for k in 0..isodim {
                    for j in k..isodim {
                        out[idx] = -2.0 * s * (goal[k] * goal[j] + rot[k] * rot[j]);
                        idx += 1;
                    }
                }
            }
            StateCost::IsoInfidelity => {
                let mut idx = 0;
                for k in 0..isodim {
                    for j in k..isodim {
                        out[idx] = -2.0 * goal[k] * goal[j];
                        idx += 1;
                    }
                }
            }
            StateCost::Geodesic => {
                let rot = iso_times_i(goal);
                let (r, q) = overlap_parts(psi, goal);
                let f = (r * r + q * q).sqrt();
                let f3 = f * f * f;
                let mut idx = 0;
                for k in 0..isodim {
                    for j in k..isodim {
                        let wk = r * goal[k] + q * rot[k];
                        let wj = r * goal[j] + q * rot[j];
                        out[idx] =
                            -(goal[k] * goal[j] + rot[k] * rot[j]) / f + wk * wj / f3;
                        idx += 1;
                    }
                }
            }
            StateCost::Quaternionic => {
                let rot = iso_times_i(goal);
                let mut idx = 0;
                for k in 0..isodim {
                    for j in k..isodim {
                        out[idx] = 2.0 * (goal[k] * goal[j] + rot[k] * rot[j]);
                        idx += 1;
                    }
                }
            }
            StateCost::Energy(m) => {
                let mut idx = 0;
                for k in 0..isodim {
                    for j in k..isodim {
                        out[idx] = 2.0 * m[[k, j]];
                        idx += 1;
                    }
                }
            }
            StateCost::NegEntropy | StateCost::PureReal => {}
            StateCost::Real => {
                for v in out.iter_mut() {
                    *v = 2.0;
                }
            }
        }
    }
}

fn overlap_parts(psi: ArrayView1<f64>, goal: &Array1<f64>) -> (f64, f64) {
    let r = goal.dot(&psi);
    let q = iso_times_i(goal).dot(&psi);
    (r, q)
}
