// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quadratic, smoothness, and L1-slack regularizers.

use super::ObjectiveTerm;

/// (R/2) * sum over times of ||Z[slice(t, offsets)]||^2.
pub struct QuadraticRegularizer {
    indices: Vec<usize>,
    r_weight: f64,
    structure: Vec<(usize, usize)>,
}

impl QuadraticRegularizer {
    /// Regularize the within-step `offsets` at every step in `times`.
    pub fn new(offsets: &[usize], vardim: usize, times: &[usize], r_weight: f64) -> Self {
        let mut indices = Vec::with_capacity(offsets.len() * times.len());
        for &t in times {
            for &k in offsets {
                indices.push(t * vardim + k);
            }
        }
        let structure = indices.iter().map(|&i| (i, i)).collect();
        Self {
            indices,
            r_weight,
            structure,
        }
    }
}

impl ObjectiveTerm for QuadraticRegularizer {
    fn name(&self) -> &'static str {
        "quadratic_regularizer"
    }

    fn value(&self, z: &[f64]) -> f64 {
        0.5 * self.r_weight * self.indices.iter().map(|&i| z[i] * z[i]).sum::<f64>()
    }

    fn gradient_into(&self, z: &[f64], grad: &mut [f64]) {
        for &i in &self.indices {
            grad[i] += self.r_weight * z[i];
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values_into(&self, _z: &[f64], out: &mut [f64]) {
        for v in out.iter_mut() {
            *v = self.r_weight;
        }
    }
}

/// (R/2) * sum over consecutive listed times of ||v_{t+1} - v_t||^2, where
/// v_t = Z[slice(t, offsets)].
///
/// The Hessian is emitted per difference pair as (s,s) R, (t,t) R, (s,t) -R;
/// summing the repeated diagonal coordinates yields the tridiagonal-like
/// pattern (R at the endpoints, 2R in the interior).
pub struct QuadraticSmoothnessRegularizer {
    pairs: Vec<(usize, usize)>,
    r_weight: f64,
    structure: Vec<(usize, usize)>,
}

impl QuadraticSmoothnessRegularizer {
    /// Penalize differences of `offsets` between consecutive steps of
    /// `times`.
    pub fn new(offsets: &[usize], vardim: usize, times: &[usize], r_weight: f64) -> Self {
        let mut pairs = Vec::new();
        for w in times.windows(2) {
            for &k in offsets {
                pairs.push((w[0] * vardim + k, w[1] * vardim + k));
            }
        }
        let mut structure = Vec::with_capacity(3 * pairs.len());
        for &(s, t) in &pairs {
            structure.push((s, s));
            structure.push((t, t));
            structure.push((s.min(t), s.max(t)));
        }
        Self {
            pairs,
            r_weight,
            structure,
        }
    }
}

impl ObjectiveTerm for QuadraticSmoothnessRegularizer {
    fn name(&self) -> &'static str {
        "smoothness_regularizer"
    }

    fn value(&self, z: &[f64]) -> f64 {
        let mut total = 0.0;
        for &(s, t) in &self.pairs {
            let d = z[t] - z[s];
            total += d * d;
        }
        0.5 * self.r_weight * total
    }

    fn gradient_into(&self, z: &[f64], grad: &mut [f64]) {
        for &(s, t) in &self.pairs {
            let d = z[t] - z[s];
            grad[s] -= self.r_weight * d;
            grad[t] += self.r_weight * d;
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values_into(&self, _z: &[f64], out: &mut [f64]) {
        for chunk in out.chunks_mut(3) {
            chunk[0] = self.r_weight;
            chunk[1] = self.r_weight;
            chunk[2] = -self.r_weight;
        }
    }
}

/// alpha * sum (s1 + s2) over the slack variables of an L1 penalty.
pub struct L1SlackRegularizer {
    s1: Vec<usize>,
    s2: Vec<usize>,
    alpha: f64,
    structure: Vec<(usize, usize)>,
}

impl L1SlackRegularizer {
    /// Sum the given slack index sets with weight `alpha`.
    pub fn new(s1: Vec<usize>, s2: Vec<usize>, alpha: f64) -> Self {
        assert_eq!(s1.len(), s2.len(), "slack index sets must pair up");
        Self {
            s1,
            s2,
            alpha,
            structure: Vec::new(),
        }
    }
}

impl ObjectiveTerm for L1SlackRegularizer {
    fn name(&self) -> &'static str {
        "l1_slack_regularizer"
    }

    fn value(&self, z: &[f64]) -> f64 {
        let sum: f64 = self.s1.iter().chain(self.s2.iter()).map(|&i| z[i]).sum();
        self.alpha * sum
    }

    fn gradient_into(&self, _z: &[f64], grad: &mut [f64]) {
        for &i in self.s1.iter().chain(self.s2.iter()) {
            grad[i] += self.alpha;
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values_into(&self, _z: &[f64], _out: &mut [f64]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Objective;
    use crate::test_utils::{fd_gradient, random_z};
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic_regularizer_value_and_gradient() {
        let vardim = 4;
        let times = [0, 1, 2];
        let reg = QuadraticRegularizer::new(&[2, 3], vardim, &times, 2.0);
        let z = random_z(12, 5);

        let expected: f64 = times
            .iter()
            .flat_map(|&t| [z[t * 4 + 2], z[t * 4 + 3]])
            .map(|v| v * v)
            .sum();
        assert_relative_eq!(reg.value(&z), expected, epsilon = 1e-12);

        let obj = Objective::from_term(reg);
        let mut grad = vec![0.0; 12];
        obj.gradient_into(&z, &mut grad);
        let fd = fd_gradient(|z| obj.value(z), &z, 1e-6);
        for i in 0..12 {
            assert_relative_eq!(grad[i], fd[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_smoothness_interior_diagonal_sums_to_2r() {
        let vardim = 2;
        let times = [0, 1, 2];
        let r = 0.7;
        let reg = QuadraticSmoothnessRegularizer::new(&[0], vardim, &times, r);
        let z = random_z(6, 6);

        let mut dense = vec![vec![0.0; 6]; 6];
        let structure = reg.hessian_structure().to_vec();
        let mut vals = vec![0.0; structure.len()];
        reg.hessian_values_into(&z, &mut vals);
        for (&(k, j), &v) in structure.iter().zip(vals.iter()) {
            dense[k][j] += v;
        }
        // endpoints R, interior 2R, off-diagonal -R
        assert_relative_eq!(dense[0][0], r);
        assert_relative_eq!(dense[2][2], 2.0 * r);
        assert_relative_eq!(dense[4][4], r);
        assert_relative_eq!(dense[0][2], -r);
        assert_relative_eq!(dense[2][4], -r);
    }

    #[test]
    fn test_smoothness_gradient_matches_finite_differences() {
        let reg = QuadraticSmoothnessRegularizer::new(&[0, 1], 3, &[0, 1, 2, 3], 1.3);
        let obj = Objective::from_term(reg);
        let z = random_z(12, 7);
        let mut grad = vec![0.0; 12];
        obj.gradient_into(&z, &mut grad);
        let fd = fd_gradient(|z| obj.value(z), &z, 1e-6);
        for i in 0..12 {
            assert_relative_eq!(grad[i], fd[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_l1_slack_regularizer_is_linear() {
        let reg = L1SlackRegularizer::new(vec![0, 1], vec![2, 3], 0.5);
        let z = vec![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(reg.value(&z), 0.5 * 10.0);
        let mut grad = vec![0.0; 4];
        reg.gradient_into(&z, &mut grad);
        assert_eq!(grad, vec![0.5; 4]);
        assert!(reg.hessian_structure().is_empty());
    }
}
