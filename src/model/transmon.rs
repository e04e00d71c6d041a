// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Transmon system synthesized from physical parameters.
//!
//! H_drift = omega n + (alpha/2) n (n - 1), with the standard I/Q drive pair
//! (a + a^dag)/2 and i(a^dag - a)/2 truncated to `levels` levels. Frequencies
//! are angular, in units of 1/time-step (the caller picks the time scale).

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::{QuantumSystem, SystemOptions};
use crate::error::{Error, Result};
use crate::iso::gates::{annihilate, number_op};

/// Physical parameters of a driven transmon.
#[derive(Debug, Clone)]
pub struct TransmonParams {
    /// Number of levels kept in the truncation.
    pub levels: usize,
    /// Qubit angular frequency.
    pub omega: f64,
    /// Anharmonicity (negative for a transmon).
    pub anharmonicity: f64,
    /// Common amplitude bound for the I and Q drives.
    pub drive_bound: f64,
}

/// Drift and drive Hamiltonians of a transmon.
pub fn transmon_hamiltonians(
    params: &TransmonParams,
) -> Result<(Array2<Complex64>, Vec<Array2<Complex64>>)> {
    if params.levels < 2 {
        return Err(Error::Config(format!(
            "transmon needs at least 2 levels, got {}",
            params.levels
        )));
    }
    if params.drive_bound <= 0.0 {
        return Err(Error::Config(format!(
            "drive_bound must be positive, got {}",
            params.drive_bound
        )));
    }

    let n = number_op(params.levels);
    let n_n_minus_1 = n.dot(&n) - &n;
    let h_drift =
        n.mapv(|z| params.omega * z) + n_n_minus_1.mapv(|z| 0.5 * params.anharmonicity * z);

    let a = annihilate(params.levels);
    let a_dag = a.t().mapv(|z| z.conj());
    let h_x = (&a + &a_dag).mapv(|z| 0.5 * z);
    let h_y = (&a_dag - &a).mapv(|z| Complex64::i() * 0.5 * z);

    Ok((h_drift, vec![h_x, h_y]))
}

/// Build a transmon [`QuantumSystem`] for the given initial and goal kets.
pub fn transmon_system(
    params: &TransmonParams,
    psi_init: &[Array1<Complex64>],
    psi_goal: &[Array1<Complex64>],
    options: SystemOptions,
) -> Result<QuantumSystem> {
    let (h_drift, h_drives) = transmon_hamiltonians(params)?;
    QuantumSystem::new(
        &h_drift,
        &h_drives,
        psi_init,
        psi_goal,
        &[params.drive_bound, params.drive_bound],
        options,
    )
}
