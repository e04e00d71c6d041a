// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Constraint library.
//!
//! Box-type constraints attach to the NLP as variable bounds; row-type
//! constraints (all-equal time steps, L1 slack identities) append linear
//! equality rows after the dynamics rows, with constant Jacobian entries.

use crate::error::{DimensionError, Error, Result};

/// Kinds of constraints attachable to a problem.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Pin Z[slice(t, offsets)] to fixed values at every listed step.
    Equality {
        times: Vec<usize>,
        offsets: Vec<usize>,
        values: Vec<f64>,
        vardim: usize,
    },
    /// |Z[slice(t, offsets)]| <= bounds componentwise at every listed step.
    Bounds {
        times: Vec<usize>,
        offsets: Vec<usize>,
        bounds: Vec<f64>,
        vardim: usize,
    },
    /// dt_min <= dt_t <= dt_max for every step.
    TimeStepBounds {
        dt_min: f64,
        dt_max: f64,
        dt_offset: usize,
        t_steps: usize,
    },
    /// dt_t = dt for every step (fixed-time mode).
    TimeStepEquality {
        dt: f64,
        dt_offset: usize,
        t_steps: usize,
    },
    /// Rows dt_t - dt_bar = 0 tying every step to the trailing shared value.
    TimeStepsAllEqual { dt_offset: usize, t_steps: usize },
    /// Rows s1_i - s2_i - Z[x_i] = 0 with s1, s2 >= 0.
    L1Slack {
        x_indices: Vec<usize>,
        s1: Vec<usize>,
        s2: Vec<usize>,
    },
}

impl Constraint {
    /// Equality constraint with validation.
    pub fn equality(
        times: Vec<usize>,
        offsets: Vec<usize>,
        values: Vec<f64>,
        vardim: usize,
    ) -> Result<Self> {
        if values.len() != offsets.len() {
            return Err(DimensionError::Mismatch {
                context: "equality values".into(),
                expected: offsets.len(),
                actual: values.len(),
            }
            .into());
        }
        Ok(Constraint::Equality {
            times,
            offsets,
            values,
            vardim,
        })
    }

    /// Symmetric bounds constraint with validation.
    pub fn bounds(
        times: Vec<usize>,
        offsets: Vec<usize>,
        bounds: Vec<f64>,
        vardim: usize,
    ) -> Result<Self> {
        if bounds.len() != offsets.len() {
            return Err(DimensionError::Mismatch {
                context: "bounds array".into(),
                expected: offsets.len(),
                actual: bounds.len(),
            }
            .into());
        }
        if let Some(b) = bounds.iter().find(|b| **b < 0.0) {
            return Err(Error::Config(format!("bound must be non-negative, got {b}")));
        }
        Ok(Constraint::Bounds {
            times,
            offsets,
            bounds,
            vardim,
        })
    }

    /// Time-step bounds with validation.
    pub fn time_step_bounds(
        dt_min: f64,
        dt_max: f64,
        dt_offset: usize,
        t_steps: usize,
    ) -> Result<Self> {
        if !(dt_min.is_finite() && dt_max.is_finite()) || dt_min <= 0.0 || dt_max < dt_min {
            return Err(Error::Config(format!(
                "need 0 < dt_min <= dt_max, got [{dt_min}, {dt_max}]"
            )));
        }
        Ok(Constraint::TimeStepBounds {
            dt_min,
            dt_max,
            dt_offset,
            t_steps,
        })
    }

    /// L1 slack identity rows with validation.
    pub fn l1_slack(x_indices: Vec<usize>, s1: Vec<usize>, s2: Vec<usize>) -> Result<Self> {
        if s1.len() != x_indices.len() || s2.len() != x_indices.len() {
            return Err(DimensionError::Mismatch {
                context: "slack index sets".into(),
                expected: x_indices.len(),
                actual: s1.len().min(s2.len()),
            }
            .into());
        }
        Ok(Constraint::L1Slack { x_indices, s1, s2 })
    }

    /// Tighten variable bounds in place (box-type constraints).
    pub fn apply_bounds(&self, lb: &mut [f64], ub: &mut [f64]) {
        match self {
            Constraint::Equality {
                times,
                offsets,
                values,
                vardim,
            } => {
                for &t in times {
                    for (&k, &v) in offsets.iter().zip(values.iter()) {
                        let idx = t * vardim + k;
                        lb[idx] = v;
                        ub[idx] = v;
                    }
                }
            }
            Constraint::Bounds {
                times,
                offsets,
                bounds,
                vardim,
            } => {
                for &t in times {
                    for (&k, &b) in offsets.iter().zip(bounds.iter()) {
                        let idx = t * vardim + k;
                        lb[idx] = lb[idx].max(-b);
                        ub[idx] = ub[idx].min(b);
                    }
                }
            }
            Constraint::TimeStepBounds {
                dt_min,
                dt_max,
                dt_offset,
                t_steps,
            } => {
                for t in 0..*t_steps {
                    lb[dt_offset + t] = *dt_min;
                    ub[dt_offset + t] = *dt_max;
                }
            }
            Constraint::TimeStepEquality {
                dt,
                dt_offset,
                t_steps,
            } => {
                for t in 0..*t_steps {
                    lb[dt_offset + t] = *dt;
                    ub[dt_offset + t] = *dt;
                }
            }
            Constraint::TimeStepsAllEqual { .. } => {}
            Constraint::L1Slack { s1, s2, .. } => {
                for &i in s1.iter().chain(s2.iter()) {
                    lb[i] = 0.0;
                }
            }
        }
    }

    /// Number of equality rows this constraint appends.
    pub fn num_rows(&self) -> usize {
        match self {
            Constraint::TimeStepsAllEqual { t_steps, .. } => t_steps - 1,
            Constraint::L1Slack { x_indices, .. } => x_indices.len(),
            _ => 0,
        }
    }

    /// Evaluate the appended rows.
    pub fn residual_into(&self, z: &[f64], out: &mut [f64]) {
        match self {
            Constraint::TimeStepsAllEqual { dt_offset, t_steps } => {
                let shared = z[dt_offset + t_steps - 1];
                for t in 0..t_steps - 1 {
                    out[t] = z[dt_offset + t] - shared;
                }
            }
            Constraint::L1Slack { x_indices, s1, s2 } => {
                for (r, ((&x, &a), &b)) in
                    x_indices.iter().zip(s1.iter()).zip(s2.iter()).enumerate()
                {
                    out[r] = z[a] - z[b] - z[x];
                }
            }
            _ => debug_assert_eq!(self.num_rows(), 0),
        }
    }

    /// Constant Jacobian coordinates of the appended rows, offset by
    /// `row_offset`.
    pub fn jacobian_structure(&self, row_offset: usize) -> Vec<(usize, usize)> {
        match self {
            Constraint::TimeStepsAllEqual { dt_offset, t_steps } => {
                let shared_col = dt_offset + t_steps - 1;
                let mut s = Vec::with_capacity(2 * (t_steps - 1));
                for t in 0..t_steps - 1 {
                    s.push((row_offset + t, dt_offset + t));
                    s.push((row_offset + t, shared_col));
                }
                s
            }
            Constraint::L1Slack { x_indices, s1, s2 } => {
                let mut s = Vec::with_capacity(3 * x_indices.len());
                for (r, ((&x, &a), &b)) in
                    x_indices.iter().zip(s1.iter()).zip(s2.iter()).enumerate()
                {
                    s.push((row_offset + r, a));
                    s.push((row_offset + r, b));
                    s.push((row_offset + r, x));
                }
                s
            }
            _ => Vec::new(),
        }
    }

    /// Constant Jacobian values in [`Self::jacobian_structure`] order.
    pub fn jacobian_values_into(&self, out: &mut [f64]) {
        match self {
            Constraint::TimeStepsAllEqual { .. } => {
                for chunk in out.chunks_mut(2) {
                    chunk[0] = 1.0;
                    chunk[1] = -1.0;
                }
            }
            Constraint::L1Slack { .. } => {
                for chunk in out.chunks_mut(3) {
                    chunk[0] = 1.0;
                    chunk[1] = -1.0;
                    chunk[2] = -1.0;
                }
            }
            _ => debug_assert!(out.is_empty()),
        }
    }
}
