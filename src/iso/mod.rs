// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Real embedding ("iso") algebra for quantum states and operators.
//!
//! A complex vector in C^n is stored as a real vector in R^2n with the real
//! parts first and the imaginary parts second. A complex operator M acting on
//! C^n becomes the real 2n x 2n matrix
//!
//! ```text
//!   R(M) = [[Re M, -Im M],
//!           [Im M,  Re M]]
//! ```
//!
//! which is multiplicative: R(M N) = R(M) R(N). Schrodinger evolution
//! d/dt psi = -i H psi becomes d/dt iso(psi) = G(H) iso(psi) with the
//! antisymmetric generator G(H) = R(-i H) = I2 (x) Im H - J2 (x) Re H.

pub mod gates;

use ndarray::linalg::kron;
use ndarray::{array, s, Array1, Array2};
use num_complex::Complex64;
use std::ops::Range;

use crate::error::DimensionError;

/// Embed a complex ket into its real iso vector: real parts, then imaginary.
pub fn ket_to_iso(psi: &Array1<Complex64>) -> Array1<f64> {
    let n = psi.len();
    let mut out = Array1::zeros(2 * n);
    for (i, z) in psi.iter().enumerate() {
        out[i] = z.re;
        out[n + i] = z.im;
    }
    out
}

/// Recover the complex ket from an iso vector. Inverse of [`ket_to_iso`].
///
/// # Panics
/// Panics if the iso vector has odd length.
pub fn iso_to_ket(iso: &Array1<f64>) -> Array1<Complex64> {
    let len = iso.len();
    assert!(len % 2 == 0, "iso vector must have even length, got {}", len);
    let n = len / 2;
    Array1::from_shape_fn(n, |i| Complex64::new(iso[i], iso[n + i]))
}

/// Multiplication by i in the real embedding: iso(psi) -> iso(i psi).
pub fn iso_times_i(v: &Array1<f64>) -> Array1<f64> {
    let len = v.len();
    assert!(len % 2 == 0, "iso vector must have even length, got {}", len);
    let n = len / 2;
    let mut out = Array1::zeros(len);
    for i in 0..n {
        out[i] = -v[n + i];
        out[n + i] = v[i];
    }
    out
}

/// Real representation R(M) of a complex operator.
///
/// For Hermitian M the result is symmetric; it is the quadratic form of
/// Re <psi| M |psi> over iso vectors.
pub fn iso_operator(m: &Array2<Complex64>) -> Result<Array2<f64>, DimensionError> {
    if m.nrows() != m.ncols() {
        return Err(DimensionError::NotSquare {
            rows: m.nrows(),
            cols: m.ncols(),
        });
    }
    let re = m.mapv(|z| z.re);
    let im = m.mapv(|z| z.im);
    let i2: Array2<f64> = Array2::eye(2);
    let j2: Array2<f64> = array![[0.0, -1.0], [1.0, 0.0]];
    Ok(kron(&i2, &re) + kron(&j2, &im))
}

/// Real generator G(H) = I2 (x) Im H - J2 (x) Re H of a Hamiltonian H.
///
/// G(H) is antisymmetric for Hermitian H and satisfies
/// d/dt iso(psi) = G(H) iso(psi) for d/dt psi = -i H psi.
pub fn generator(h: &Array2<Complex64>) -> Result<Array2<f64>, DimensionError> {
    if h.nrows() != h.ncols() {
        return Err(DimensionError::NotSquare {
            rows: h.nrows(),
            cols: h.ncols(),
        });
    }
    let re = h.mapv(|z| z.re);
    let im = h.mapv(|z| z.im);
    let i2: Array2<f64> = Array2::eye(2);
    let j2: Array2<f64> = array![[0.0, -1.0], [1.0, 0.0]];
    Ok(kron(&i2, &im) - kron(&j2, &re))
}

/// Contiguous index range of time step `t` in the flat decision vector.
pub fn step_slice(t: usize, vardim: usize) -> Range<usize> {
    t * vardim..(t + 1) * vardim
}

/// Absolute indices of an arbitrary within-step offset pattern at step `t`.
pub fn step_indices(t: usize, offsets: &[usize], vardim: usize) -> Vec<usize> {
    offsets.iter().map(|&k| t * vardim + k).collect()
}

/// Squared overlap |<psi | phi>|^2 of two iso vectors.
///
/// With r = <iso(phi), iso(psi)> and q = <iso(i phi), iso(psi)> the complex
/// overlap satisfies |<phi|psi>|^2 = r^2 + q^2.
pub fn overlap_sq(psi: &Array1<f64>, phi: &Array1<f64>) -> f64 {
    let r = phi.dot(psi);
    let q = iso_times_i(phi).dot(psi);
    r * r + q * q
}

/// Euclidean norm of the wavefunction block of an iso vector.
pub fn iso_norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// View the `i`-th length-`n` sub-vector of a flat buffer.
pub fn subvector(buf: &Array1<f64>, i: usize, n: usize) -> ndarray::ArrayView1<'_, f64> {
    buf.slice(s![i * n..(i + 1) * n])
}
