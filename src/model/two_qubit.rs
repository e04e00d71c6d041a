// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Two coupled qubits with exchange coupling and independent X/Y drives.
//!
//! H_drift = (omega1/2) sz (x) I + (omega2/2) I (x) sz
//!         + g (s+ (x) s- + s- (x) s+)

use ndarray::linalg::kron;
use ndarray::{Array1, Array2};
use num_complex::Complex64;

use super::{QuantumSystem, SystemOptions};
use crate::error::{Error, Result};
use crate::iso::gates::{annihilate, sigma_x, sigma_y, sigma_z};

/// Physical parameters of a coupled qubit pair.
#[derive(Debug, Clone)]
pub struct TwoQubitParams {
    /// Angular frequency of qubit 1.
    pub omega1: f64,
    /// Angular frequency of qubit 2.
    pub omega2: f64,
    /// Exchange coupling strength.
    pub coupling: f64,
    /// Amplitude bound shared by all four drives.
    pub drive_bound: f64,
}

/// Drift and drive Hamiltonians of the coupled pair.
pub fn two_qubit_hamiltonians(
    params: &TwoQubitParams,
) -> Result<(Array2<Complex64>, Vec<Array2<Complex64>>)> {
    if params.drive_bound <= 0.0 {
        return Err(Error::Config(format!(
            "drive_bound must be positive, got {}",
            params.drive_bound
        )));
    }

    let eye: Array2<Complex64> = Array2::from_diag_elem(2, Complex64::new(1.0, 0.0));
    let s_minus = annihilate(2);
    let s_plus = s_minus.t().mapv(|z| z.conj());

    let h_drift = kron(&sigma_z(), &eye).mapv(|z| 0.5 * params.omega1 * z)
        + kron(&eye, &sigma_z()).mapv(|z| 0.5 * params.omega2 * z)
        + (kron(&s_plus, &s_minus) + kron(&s_minus, &s_plus)).mapv(|z| params.coupling * z);

    let h_drives = vec![
        kron(&sigma_x(), &eye).mapv(|z| 0.5 * z),
        kron(&sigma_y(), &eye).mapv(|z| 0.5 * z),
        kron(&eye, &sigma_x()).mapv(|z| 0.5 * z),
        kron(&eye, &sigma_y()).mapv(|z| 0.5 * z),
    ];

    Ok((h_drift, h_drives))
}

/// Build a two-qubit [`QuantumSystem`] for the given initial and goal kets.
pub fn two_qubit_system(
    params: &TwoQubitParams,
    psi_init: &[Array1<Complex64>],
    psi_goal: &[Array1<Complex64>],
    options: SystemOptions,
) -> Result<QuantumSystem> {
    let (h_drift, h_drives) = two_qubit_hamiltonians(params)?;
    let bounds = vec![params.drive_bound; h_drives.len()];
    QuantumSystem::new(&h_drift, &h_drives, psi_init, psi_goal, &bounds, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn params() -> TwoQubitParams {
        TwoQubitParams {
            omega1: 1.1,
            omega2: 0.9,
            coupling: 0.05,
            drive_bound: 0.3,
        }
    }

    #[test]
    fn test_drift_is_hermitian() {
        let (h, _) = two_qubit_hamiltonians(&params()).unwrap();
        let h_dag = h.t().mapv(|z| z.conj());
        for (a, b) in h.iter().zip(h_dag.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-15);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_coupling_swaps_excitation() {
        // <01| H |10> = g
        let (h, _) = two_qubit_hamiltonians(&params()).unwrap();
        assert_relative_eq!(h[[1, 2]].re, params().coupling, epsilon = 1e-15);
        assert_relative_eq!(h[[2, 1]].re, params().coupling, epsilon = 1e-15);
    }

    #[test]
    fn test_system_has_four_drives() {
        let psi = array![c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0)];
        let goal = array![c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0)];
        let sys = two_qubit_system(
            &params(),
            std::slice::from_ref(&psi),
            std::slice::from_ref(&goal),
            SystemOptions::default(),
        )
        .unwrap();
        assert_eq!(sys.ncontrols, 4);
        assert_eq!(sys.isodim, 8);
        assert_eq!(sys.control_bounds.len(), 4);
    }
}
