// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test utilities: fixtures and finite-difference harnesses.

use ndarray::{array, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::iso::gates::{sigma_x, sigma_y, sigma_z};
use crate::model::{QuantumSystem, SystemOptions};

/// Single-qubit X-gate fixture: H_drift = sz/2, drives [sx/2, sy/2],
/// both basis states tracked, bounds [1.0, 0.5].
pub fn x_gate_system() -> QuantumSystem {
    let c = |re: f64, im: f64| Complex64::new(re, im);
    let h_drift = sigma_z().mapv(|z| 0.5 * z);
    let h_drives = vec![sigma_x().mapv(|z| 0.5 * z), sigma_y().mapv(|z| 0.5 * z)];
    let psi0 = vec![
        array![c(1.0, 0.0), c(0.0, 0.0)],
        array![c(0.0, 0.0), c(1.0, 0.0)],
    ];
    let goal: Vec<_> = psi0.iter().map(|p| sigma_x().dot(p)).collect();
    QuantumSystem::new(
        &h_drift,
        &h_drives,
        &psi0,
        &goal,
        &[1.0, 0.5],
        SystemOptions::default(),
    )
    .unwrap()
}

/// Uniform random decision vector in [-1, 1]^n, seeded.
pub fn random_z(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Central-difference gradient of a scalar function.
pub fn fd_gradient<F: FnMut(&[f64]) -> f64>(mut f: F, z: &[f64], h: f64) -> Vec<f64> {
    let mut grad = vec![0.0; z.len()];
    for j in 0..z.len() {
        let mut zp = z.to_vec();
        let mut zm = z.to_vec();
        zp[j] += h;
        zm[j] -= h;
        grad[j] = (f(&zp) - f(&zm)) / (2.0 * h);
    }
    grad
}

/// Densify a coordinate list, summing repeated entries. With `symmetrize`
/// the entries are treated as one triangle of a symmetric matrix and
/// mirrored.
pub fn densify_coo(
    structure: &[(usize, usize)],
    values: &[f64],
    nrows: usize,
    ncols: usize,
    symmetrize: bool,
) -> Array2<f64> {
    assert_eq!(structure.len(), values.len());
    let mut dense = Array2::zeros((nrows, ncols));
    for (&(r, c), &v) in structure.iter().zip(values.iter()) {
        dense[[r, c]] += v;
        if symmetrize && r != c {
            dense[[c, r]] += v;
        }
    }
    dense
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_z_is_seeded() {
        assert_eq!(random_z(8, 1), random_z(8, 1));
        assert_ne!(random_z(8, 1), random_z(8, 2));
    }

    #[test]
    fn test_fd_gradient_of_quadratic() {
        let f = |z: &[f64]| z.iter().map(|v| v * v).sum::<f64>();
        let z = vec![0.3, -0.7];
        let g = fd_gradient(f, &z, 1e-6);
        assert!((g[0] - 0.6).abs() < 1e-8);
        assert!((g[1] + 1.4).abs() < 1e-8);
    }

    #[test]
    fn test_densify_sums_repeats_and_mirrors() {
        let structure = [(1, 0), (1, 0), (1, 1)];
        let values = [2.0, 3.0, 4.0];
        let dense = densify_coo(&structure, &values, 2, 2, true);
        assert_eq!(dense[[1, 0]], 5.0);
        assert_eq!(dense[[0, 1]], 5.0);
        assert_eq!(dense[[1, 1]], 4.0);
    }
}
