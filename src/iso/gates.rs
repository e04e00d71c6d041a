// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Registry of constant gate matrices.
//!
//! Gate goals for state-transfer problems are built by applying one of these
//! to the initial states, e.g. `psi_goal = gate("X").unwrap().dot(&psi)`.

use ndarray::{array, Array2};
use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// Pauli X.
pub fn sigma_x() -> Array2<Complex64> {
    array![[c(0.0, 0.0), c(1.0, 0.0)], [c(1.0, 0.0), c(0.0, 0.0)]]
}

/// Pauli Y.
pub fn sigma_y() -> Array2<Complex64> {
    array![[c(0.0, 0.0), c(0.0, -1.0)], [c(0.0, 1.0), c(0.0, 0.0)]]
}

/// Pauli Z.
pub fn sigma_z() -> Array2<Complex64> {
    array![[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(-1.0, 0.0)]]
}

/// Qubit annihilation operator truncated to `levels` levels.
pub fn annihilate(levels: usize) -> Array2<Complex64> {
    let mut a = Array2::zeros((levels, levels));
    for i in 1..levels {
        a[[i - 1, i]] = c((i as f64).sqrt(), 0.0);
    }
    a
}

/// Number operator truncated to `levels` levels.
pub fn number_op(levels: usize) -> Array2<Complex64> {
    let mut n = Array2::zeros((levels, levels));
    for i in 0..levels {
        n[[i, i]] = c(i as f64, 0.0);
    }
    n
}

/// Look up a named gate. Known symbols: `I`, `X`, `Y`, `Z`, `H`, `S`, `T`
/// (single-qubit) and `CX`, `CZ` (two-qubit).
pub fn gate(name: &str) -> Option<Array2<Complex64>> {
    let g = match name {
        "I" => Array2::from_diag_elem(2, c(1.0, 0.0)),
        "X" => sigma_x(),
        "Y" => sigma_y(),
        "Z" => sigma_z(),
        "H" => {
            let h = FRAC_1_SQRT_2;
            array![[c(h, 0.0), c(h, 0.0)], [c(h, 0.0), c(-h, 0.0)]]
        }
        "S" => array![[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(0.0, 1.0)]],
        "T" => array![
            [c(1.0, 0.0), c(0.0, 0.0)],
            [c(0.0, 0.0), c(FRAC_1_SQRT_2, FRAC_1_SQRT_2)]
        ],
        "CX" => {
            let mut m = Array2::from_diag_elem(4, c(1.0, 0.0));
            m[[2, 2]] = c(0.0, 0.0);
            m[[3, 3]] = c(0.0, 0.0);
            m[[2, 3]] = c(1.0, 0.0);
            m[[3, 2]] = c(1.0, 0.0);
            m
        }
        "CZ" => {
            let mut m = Array2::from_diag_elem(4, c(1.0, 0.0));
            m[[3, 3]] = c(-1.0, 0.0);
            m
        }
        _ => return None,
    };
    Some(g)
}
