// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input validation for problem data and read-back waveforms.

use ndarray::ArrayView1;

use crate::config::ResourceLimits;
use crate::error::{DimensionError, Error, NumericError, Result};

/// Validate a control waveform: length, finiteness, amplitude.
pub fn validate_waveform(
    waveform: &[f64],
    expected_len: usize,
    max_amplitude: f64,
) -> Result<()> {
    if waveform.len() != expected_len {
        return Err(DimensionError::Mismatch {
            context: "waveform length".into(),
            expected: expected_len,
            actual: waveform.len(),
        }
        .into());
    }
    for (i, val) in waveform.iter().enumerate() {
        if !val.is_finite() {
            return Err(NumericError::NonFinite {
                what: "waveform".into(),
                index: i,
            }
            .into());
        }
        if val.abs() > max_amplitude {
            return Err(Error::Config(format!(
                "waveform amplitude {val} at index {i} exceeds bound {max_amplitude}"
            )));
        }
    }
    Ok(())
}

/// Validate an iso state: finite and normalized to `tol`.
pub fn validate_state_norm(state: ArrayView1<'_, f64>, tol: f64) -> Result<()> {
    let mut norm_sq = 0.0;
    for (i, v) in state.iter().enumerate() {
        if !v.is_finite() {
            return Err(NumericError::NonFinite {
                what: "state".into(),
                index: i,
            }
            .into());
        }
        norm_sq += v * v;
    }
    if (norm_sq.sqrt() - 1.0).abs() > tol {
        return Err(Error::Config(format!(
            "state norm {} deviates from 1 by more than {tol}",
            norm_sq.sqrt()
        )));
    }
    Ok(())
}

/// Validate problem shape against the resource limits.
pub fn validate_problem_size(
    isodim: usize,
    ncontrols: usize,
    t_steps: usize,
    limits: &ResourceLimits,
) -> Result<()> {
    let hilbert_dim = isodim / 2;
    if hilbert_dim > limits.max_hilbert_dim as usize {
        return Err(Error::Config(format!(
            "Hilbert dimension {hilbert_dim} exceeds limit {}",
            limits.max_hilbert_dim
        )));
    }
    if ncontrols > limits.max_controls as usize {
        return Err(Error::Config(format!(
            "{ncontrols} drives exceed limit {}",
            limits.max_controls
        )));
    }
    if t_steps > limits.max_time_steps as usize {
        return Err(Error::Config(format!(
            "{t_steps} time steps exceed limit {}",
            limits.max_time_steps
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_validate_waveform() {
        let wf = vec![0.1, -0.3, 0.5];
        assert!(validate_waveform(&wf, 3, 1.0).is_ok());
        assert!(validate_waveform(&wf, 4, 1.0).is_err());
        assert!(validate_waveform(&wf, 3, 0.4).is_err());

        let mut bad = wf.clone();
        bad[1] = f64::NAN;
        assert!(validate_waveform(&bad, 3, 1.0).is_err());
    }

    #[test]
    fn test_validate_state_norm() {
        let good = array![0.6, 0.8, 0.0, 0.0];
        assert!(validate_state_norm(good.view(), 1e-10).is_ok());

        let unnormalized = array![1.0, 1.0, 0.0, 0.0];
        assert!(validate_state_norm(unnormalized.view(), 1e-10).is_err());

        let non_finite = array![f64::INFINITY, 0.0];
        assert!(validate_state_norm(non_finite.view(), 1e-10).is_err());
    }

    #[test]
    fn test_validate_problem_size() {
        let limits = ResourceLimits::default();
        assert!(validate_problem_size(8, 2, 100, &limits).is_ok());
        assert!(validate_problem_size(1000, 2, 100, &limits).is_err());
        assert!(validate_problem_size(8, 100, 100, &limits).is_err());
        assert!(validate_problem_size(8, 2, 1_000_000, &limits).is_err());
    }
}
