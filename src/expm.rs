// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dense real-matrix exponential.
//!
//! Scaling-and-squaring with a degree-13 Pade approximant, specialized to
//! the real-embedded generators (antisymmetric G, so exp(G t) is
//! orthogonal). Backs the exact-rollout trajectory seed and serves as the
//! reference propagator when validating the collocation schemes.
//!
//! Ref: Higham (2005), "The Scaling and Squaring Method for the Matrix
//! Exponential Revisited", SIAM J. Matrix Anal. Appl. 26(4), 1179.

use ndarray::{Array1, Array2, Axis};

use crate::error::NumericError;

/// Unnormalized numerator coefficients b_0..b_13 of the degree-13 Pade
/// approximant to exp (Higham 2005, eq. 10.33 scaled by b_0). The
/// denominator shares the table with the sign of the odd terms flipped, and
/// the trailing rational solve makes the common scale irrelevant.
const B: [f64; 14] = [
    64_764_752_532_480_000.0,
    32_382_376_266_240_000.0,
    7_771_770_303_897_600.0,
    1_187_353_796_428_800.0,
    129_060_195_264_000.0,
    10_559_470_521_600.0,
    670_442_572_800.0,
    33_522_128_640.0,
    1_323_241_920.0,
    40_840_800.0,
    960_960.0,
    16_380.0,
    182.0,
    1.0,
];

/// 1-norm bound under which the degree-13 approximant is accurate to
/// machine precision (Higham 2005, Table 10.2).
const THETA_13: f64 = 5.37;

/// Compute exp(A) for a square real matrix.
///
/// # Panics
/// Panics if `a` is not square.
pub fn matrix_exp(a: &Array2<f64>) -> Result<Array2<f64>, NumericError> {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "matrix_exp requires a square matrix");

    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    if n == 1 {
        return Ok(Array2::from_elem((1, 1), a[[0, 0]].exp()));
    }

    // bring the norm under THETA_13, approximate, then undo the scaling
    // by repeated squaring
    let norm = one_norm(a);
    let squarings = if norm > THETA_13 {
        (norm / THETA_13).log2().ceil() as i32
    } else {
        0
    };

    let scaled = a / 2f64.powi(squarings);
    let mut result = pade_13(&scaled)?;
    for _ in 0..squarings {
        result = result.dot(&result);
    }
    Ok(result)
}

/// Degree-13 Pade approximant of exp at a matrix with 1-norm below
/// [`THETA_13`].
///
/// The numerator splits into even and odd parts sharing the denominator:
/// with O the odd part and E the even part, exp(A) ~ (E - O)^{-1} (E + O).
/// Both parts are assembled from A^2, A^4, A^6 with the top half of each
/// polynomial factored through an extra A^6 product, which is the minimal
/// multiplication count for this degree.
fn pade_13(a: &Array2<f64>) -> Result<Array2<f64>, NumericError> {
    let eye: Array2<f64> = Array2::eye(a.nrows());

    let p2 = a.dot(a);
    let p4 = p2.dot(&p2);
    let p6 = p4.dot(&p2);

    let odd_high = &p6 * B[13] + &p4 * B[11] + &p2 * B[9];
    let odd_low = &p6 * B[7] + &p4 * B[5] + &p2 * B[3] + &eye * B[1];
    let odd = a.dot(&(odd_high.dot(&p6) + odd_low));

    let even_high = &p6 * B[12] + &p4 * B[10] + &p2 * B[8];
    let even_low = &p6 * B[6] + &p4 * B[4] + &p2 * B[2] + &eye * B[0];
    let even = even_high.dot(&p6) + even_low;

    lu_solve(&even - &odd, &even + &odd, "pade denominator")
}

/// Solve A X = B by LU factorization with partial pivoting.
///
/// The factorization overwrites a copy of A in place (unit lower triangle
/// below the diagonal, upper triangle on and above it) and records the row
/// exchanges in a permutation vector; each right-hand-side column is then
/// run through forward and back substitution.
pub(crate) fn lu_solve(
    a: Array2<f64>,
    b: Array2<f64>,
    context: &str,
) -> Result<Array2<f64>, NumericError> {
    let n = a.nrows();
    assert_eq!(n, a.ncols());
    assert_eq!(n, b.nrows());

    let mut lu = a;
    let mut perm: Vec<usize> = (0..n).collect();

    for k in 0..n {
        let mut p = k;
        for r in k + 1..n {
            if lu[[r, k]].abs() > lu[[p, k]].abs() {
                p = r;
            }
        }
        if lu[[p, k]].abs() < 1e-14 {
            return Err(NumericError::Singular {
                context: context.to_string(),
            });
        }
        if p != k {
            perm.swap(k, p);
            for j in 0..n {
                lu.swap([k, j], [p, j]);
            }
        }

        let inv_diag = 1.0 / lu[[k, k]];
        for r in k + 1..n {
            let multiplier = lu[[r, k]] * inv_diag;
            lu[[r, k]] = multiplier;
            for j in k + 1..n {
                let upper = lu[[k, j]];
                lu[[r, j]] -= multiplier * upper;
            }
        }
    }

    let m = b.ncols();
    let mut x = Array2::zeros((n, m));
    let mut work: Array1<f64> = Array1::zeros(n);
    for j in 0..m {
        for i in 0..n {
            let mut s = b[[perm[i], j]];
            for k in 0..i {
                s -= lu[[i, k]] * work[k];
            }
            work[i] = s;
        }
        for i in (0..n).rev() {
            let mut s = work[i];
            for k in i + 1..n {
                s -= lu[[i, k]] * x[[k, j]];
            }
            x[[i, j]] = s / lu[[i, i]];
        }
    }
    Ok(x)
}

/// Max absolute column sum.
fn one_norm(a: &Array2<f64>) -> f64 {
    a.axis_iter(Axis(1))
        .map(|col| col.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso::gates::{sigma_x, sigma_z};
    use crate::iso::{generator, ket_to_iso};
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};
    use num_complex::Complex64;

    fn assert_matrix_close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) {
        assert_eq!(a.shape(), b.shape());
        for ((i, j), val) in a.indexed_iter() {
            let diff = (val - b[[i, j]]).abs();
            assert!(
                diff < tol,
                "Mismatch at ({}, {}): {} vs {} (diff={})",
                i,
                j,
                val,
                b[[i, j]],
                diff
            );
        }
    }

    #[test]
    fn test_exp_of_zero_is_identity() {
        let zero = Array2::<f64>::zeros((4, 4));
        let result = matrix_exp(&zero).unwrap();
        assert_matrix_close(&result, &Array2::eye(4), 1e-14);
    }

    #[test]
    fn test_exp_of_diagonal_exponentiates_entries() {
        let a = array![[1.0, 0.0], [0.0, 2.0]];
        let result = matrix_exp(&a).unwrap();
        assert_relative_eq!(result[[0, 0]], 1.0_f64.exp(), epsilon = 1e-12);
        assert_relative_eq!(result[[1, 1]], 2.0_f64.exp(), epsilon = 1e-12);
        assert!(result[[0, 1]].abs() < 1e-14);
        assert!(result[[1, 0]].abs() < 1e-14);
    }

    #[test]
    fn test_exp_of_rotation_generator() {
        // exp(theta J) is a rotation by theta for J = [[0,-1],[1,0]]
        let theta = 0.7;
        let j = array![[0.0, -theta], [theta, 0.0]];
        let r = matrix_exp(&j).unwrap();
        assert_relative_eq!(r[[0, 0]], theta.cos(), epsilon = 1e-12);
        assert_relative_eq!(r[[0, 1]], -theta.sin(), epsilon = 1e-12);
        assert_relative_eq!(r[[1, 0]], theta.sin(), epsilon = 1e-12);
        assert_relative_eq!(r[[1, 1]], theta.cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_scaling_path_handles_large_norms() {
        let a = array![[100.0, 0.0], [0.0, -100.0]];
        let result = matrix_exp(&a).unwrap();
        let e100 = 100.0_f64.exp();
        assert!((result[[0, 0]] - e100).abs() / e100 < 1e-10);
        assert!((result[[1, 1]] - (-100.0_f64).exp()).abs() < 1e-30);
    }

    #[test]
    fn test_exp_of_generator_is_orthogonal() {
        // exp(G t) for antisymmetric G must preserve norms
        let g = generator(&(sigma_x() + sigma_z())).unwrap();
        let u = matrix_exp(&(&g * 0.3)).unwrap();
        let product = u.t().dot(&u);
        assert_matrix_close(&product, &Array2::eye(4), 1e-12);
    }

    #[test]
    fn test_exp_matches_complex_evolution() {
        // exp(G(H) t) iso(psi) == iso(exp(-i H t) psi) for H = sz with known
        // closed form exp(-i sz t) = diag(e^{-it}, e^{it}).
        let t = 0.37;
        let g = generator(&sigma_z()).unwrap();
        let psi = array![Complex64::new(0.6, 0.1), Complex64::new(0.2, -0.7)];

        let lhs = matrix_exp(&(&g * t)).unwrap().dot(&ket_to_iso(&psi));

        let phase_m = Complex64::from_polar(1.0, -t);
        let phase_p = Complex64::from_polar(1.0, t);
        let evolved: Array1<Complex64> = array![phase_m * psi[0], phase_p * psi[1]];
        let rhs = ket_to_iso(&evolved);

        for (a, b) in lhs.iter().zip(rhs.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_lu_solve_recovers_known_solution() {
        // A X = A I should give the identity back
        let a = array![[2.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        let x = lu_solve(a.clone(), a, "test").unwrap();
        assert_matrix_close(&x, &Array2::eye(3), 1e-12);
    }

    #[test]
    fn test_lu_solve_pivots_on_zero_leading_entry() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![[3.0], [4.0]];
        let x = lu_solve(a, b, "test").unwrap();
        assert_relative_eq!(x[[0, 0]], 4.0, epsilon = 1e-14);
        assert_relative_eq!(x[[1, 0]], 3.0, epsilon = 1e-14);
    }

    #[test]
    fn test_lu_solve_rejects_singular_systems() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = Array2::eye(2);
        assert!(lu_solve(a, b, "test").is_err());
    }
}
