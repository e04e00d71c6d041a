// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Immutable system model: drift and drive generators, dimensions, bounds,
//! and the augmented-state layout of one time-step slice.
//!
//! A step slice of the decision vector is laid out as
//!
//! ```text
//!   [ wavefunctions | augmented controls | top-order controls u ]
//!     n_wfn_states    n_aug_states         ncontrols
//! ```
//!
//! with the augmented block split into `augdim` sub-blocks of `ncontrols`
//! values in increasing derivative order. The drive amplitudes that enter
//! the generator are the sub-block of order zero, or order one when the
//! integral-of-control block is carried.

pub mod transmon;
pub mod two_qubit;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use std::ops::Range;

use crate::error::{DimensionError, Error, Result};
use crate::iso::{generator, ket_to_iso};

/// Options applied on top of the generic constructor arguments.
#[derive(Debug, Clone)]
pub struct SystemOptions {
    /// Number of control derivatives carried as augmented states.
    pub control_order: usize,
    /// Carry the running integral of each control as an extra augmented block.
    pub include_integral: bool,
    /// Global phase applied to every goal state before embedding.
    pub goal_phase: Option<f64>,
}

impl Default for SystemOptions {
    fn default() -> Self {
        Self {
            control_order: 2,
            include_integral: false,
            goal_phase: None,
        }
    }
}

/// Immutable per-problem system model.
#[derive(Debug, Clone)]
pub struct QuantumSystem {
    /// 2 x Hilbert dimension.
    pub isodim: usize,
    /// Number of initial states tracked in parallel.
    pub nqstates: usize,
    /// nqstates * isodim.
    pub n_wfn_states: usize,
    /// Number of drives.
    pub ncontrols: usize,
    /// Control derivatives carried as augmented states.
    pub control_order: usize,
    /// Whether the integral block is carried.
    pub include_integral: bool,
    /// control_order + (1 if integral block).
    pub augdim: usize,
    /// ncontrols * augdim.
    pub n_aug_states: usize,
    /// n_wfn_states + n_aug_states.
    pub nstates: usize,
    /// nstates + ncontrols: width of one time-step slice.
    pub vardim: usize,
    /// Real drift generator G(H_drift).
    pub g_drift: Array2<f64>,
    /// Real drive generators G(H_drives[k]).
    pub g_drives: Vec<Array2<f64>>,
    /// Amplitude bound per drive.
    pub control_bounds: Vec<f64>,
    /// Iso initial states.
    pub psi_init: Vec<Array1<f64>>,
    /// Iso goal states.
    pub psi_goal: Vec<Array1<f64>>,
}

impl QuantumSystem {
    /// Build a system from Hamiltonians and one or more initial/goal kets.
    ///
    /// # Errors
    ///
    /// - `Dimension` if any operator is not square, drives disagree with the
    ///   drift in size, states disagree with the Hilbert dimension, or the
    ///   bound array length differs from the number of drives.
    /// - `Config` if `control_order` is zero or no initial state is given.
    pub fn new(
        h_drift: &Array2<Complex64>,
        h_drives: &[Array2<Complex64>],
        psi_init: &[Array1<Complex64>],
        psi_goal: &[Array1<Complex64>],
        control_bounds: &[f64],
        options: SystemOptions,
    ) -> Result<Self> {
        if options.control_order == 0 {
            return Err(Error::Config("control_order must be >= 1".into()));
        }
        if psi_init.is_empty() {
            return Err(Error::Config("at least one initial state is required".into()));
        }
        if psi_goal.len() != psi_init.len() {
            return Err(DimensionError::Mismatch {
                context: "goal states".into(),
                expected: psi_init.len(),
                actual: psi_goal.len(),
            }
            .into());
        }
        if control_bounds.len() != h_drives.len() {
            return Err(DimensionError::Mismatch {
                context: "control_bounds".into(),
                expected: h_drives.len(),
                actual: control_bounds.len(),
            }
            .into());
        }

        let dim = h_drift.nrows();
        let g_drift = generator(h_drift)?;
        let mut g_drives = Vec::with_capacity(h_drives.len());
        for h in h_drives {
            if h.nrows() != dim || h.ncols() != dim {
                return Err(DimensionError::Mismatch {
                    context: "drive Hamiltonian size".into(),
                    expected: dim,
                    actual: h.nrows(),
                }
                .into());
            }
            g_drives.push(generator(h)?);
        }

        for psi in psi_init.iter().chain(psi_goal.iter()) {
            if psi.len() != dim {
                return Err(DimensionError::Mismatch {
                    context: "state dimension".into(),
                    expected: dim,
                    actual: psi.len(),
                }
                .into());
            }
        }

        let phase = options
            .goal_phase
            .map(|phi| Complex64::from_polar(1.0, phi))
            .unwrap_or(Complex64::new(1.0, 0.0));

        let isodim = 2 * dim;
        let nqstates = psi_init.len();
        let n_wfn_states = nqstates * isodim;
        let ncontrols = h_drives.len();
        let augdim = options.control_order + usize::from(options.include_integral);
        let n_aug_states = ncontrols * augdim;
        let nstates = n_wfn_states + n_aug_states;

        Ok(Self {
            isodim,
            nqstates,
            n_wfn_states,
            ncontrols,
            control_order: options.control_order,
            include_integral: options.include_integral,
            augdim,
            n_aug_states,
            nstates,
            vardim: nstates + ncontrols,
            g_drift,
            g_drives,
            control_bounds: control_bounds.to_vec(),
            psi_init: psi_init.iter().map(ket_to_iso).collect(),
            psi_goal: psi_goal
                .iter()
                .map(|psi| ket_to_iso(&psi.mapv(|z| phase * z)))
                .collect(),
        })
    }

    /// Convenience constructor for a single tracked state.
    pub fn new_single(
        h_drift: &Array2<Complex64>,
        h_drives: &[Array2<Complex64>],
        psi_init: &Array1<Complex64>,
        psi_goal: &Array1<Complex64>,
        control_bounds: &[f64],
        options: SystemOptions,
    ) -> Result<Self> {
        Self::new(
            h_drift,
            h_drives,
            std::slice::from_ref(psi_init),
            std::slice::from_ref(psi_goal),
            control_bounds,
            options,
        )
    }

    /// Derivative-order sub-block holding the drive amplitudes.
    pub fn drive_block(&self) -> usize {
        usize::from(self.include_integral)
    }

    /// Offset of step `t` in the flat vector.
    pub fn step_offset(&self, t: usize) -> usize {
        t * self.vardim
    }

    /// Index range of the `i`-th iso wavefunction at step `t`.
    pub fn wfn_range(&self, t: usize, i: usize) -> Range<usize> {
        let base = self.step_offset(t) + i * self.isodim;
        base..base + self.isodim
    }

    /// Index range of the whole augmented block at step `t`.
    pub fn aug_range(&self, t: usize) -> Range<usize> {
        let base = self.step_offset(t) + self.n_wfn_states;
        base..base + self.n_aug_states
    }

    /// Index of augmented value of derivative order `order` for control `k`
    /// at step `t`.
    pub fn aug_index(&self, t: usize, order: usize, k: usize) -> usize {
        self.step_offset(t) + self.n_wfn_states + order * self.ncontrols + k
    }

    /// Index range of the drive amplitudes entering the generator at step `t`.
    pub fn drive_amp_range(&self, t: usize) -> Range<usize> {
        let base = self.aug_index(t, self.drive_block(), 0);
        base..base + self.ncontrols
    }

    /// Index range of the top-order controls u at step `t`.
    pub fn control_range(&self, t: usize) -> Range<usize> {
        let base = self.step_offset(t) + self.nstates;
        base..base + self.ncontrols
    }

    /// Per-step generator G = G_drift + sum_k a_k G_drives[k].
    pub fn step_generator(&self, amps: &[f64]) -> Array2<f64> {
        let mut g = self.g_drift.clone();
        for (a, gk) in amps.iter().zip(self.g_drives.iter()) {
            g.scaled_add(*a, gk);
        }
        g
    }

    /// In-place variant of [`step_generator`] for preallocated scratch.
    pub fn step_generator_into(&self, amps: &[f64], out: &mut Array2<f64>) {
        out.assign(&self.g_drift);
        for (a, gk) in amps.iter().zip(self.g_drives.iter()) {
            out.scaled_add(*a, gk);
        }
    }
}
