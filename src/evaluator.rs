// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! NLP evaluator: packages dynamics, objective, and constraints behind the
//! solver callback contract.
//!
//! The constraint vector stacks the dynamics rows first and the linear rows
//! of row-type constraints after them. The Lagrangian Hessian structure
//! concatenates the objective entries (flipped from the upper-triangle
//! convention of the objective algebra into the solver's lower triangle)
//! with the dynamics entries; repeated coordinates are summed by the
//! solver.
//!
//! Callbacks never mutate the structures, never perform I/O, and report
//! NaN/Inf through [`NumericError`] without partially mutating solver
//! state.

use tracing::info;

use crate::constraint::Constraint;
use crate::dynamics::Dynamics;
use crate::error::{NumericError, Result};
use crate::objective::Objective;
use crate::solver::NlpProblem;
use crate::trajectory::ZLayout;

/// Assembled NLP callbacks for one problem.
pub struct Evaluator {
    dynamics: Dynamics,
    objective: Objective,
    constraints: Vec<Constraint>,
    layout: ZLayout,
    lb: Vec<f64>,
    ub: Vec<f64>,
    jac_structure: Vec<(usize, usize)>,
    hess_structure: Vec<(usize, usize)>,
    obj_hess_nnz: usize,
    dyn_jac_nnz: usize,
    con_jac_nnz: Vec<usize>,
    num_rows: usize,
}

impl Evaluator {
    /// Assemble callbacks; computes all structures and variable bounds once.
    pub fn new(
        dynamics: Dynamics,
        objective: Objective,
        constraints: Vec<Constraint>,
        layout: ZLayout,
    ) -> Self {
        let n = layout.num_vars();
        let mut lb = vec![f64::NEG_INFINITY; n];
        let mut ub = vec![f64::INFINITY; n];
        for c in &constraints {
            c.apply_bounds(&mut lb, &mut ub);
        }

        let dyn_rows = dynamics.num_rows();
        let dyn_jac_nnz = dynamics.jacobian_structure().len();
        let mut jac_structure = dynamics.jacobian_structure().to_vec();
        let mut con_jac_nnz = Vec::with_capacity(constraints.len());
        let mut row_offset = dyn_rows;
        for c in &constraints {
            let s = c.jacobian_structure(row_offset);
            con_jac_nnz.push(s.len());
            jac_structure.extend(s);
            row_offset += c.num_rows();
        }

        let obj_upper = objective.hessian_structure();
        let obj_hess_nnz = obj_upper.len();
        let mut hess_structure = Vec::with_capacity(obj_hess_nnz + dynamics.hessian_structure().len());
        for &(k, j) in &obj_upper {
            hess_structure.push((k.max(j), k.min(j)));
        }
        hess_structure.extend_from_slice(dynamics.hessian_structure());

        info!(
            variables = n,
            rows = row_offset,
            jac_nnz = jac_structure.len(),
            hess_nnz = hess_structure.len(),
            terms = ?objective.term_names(),
            "assembled evaluator"
        );

        Self {
            dynamics,
            objective,
            constraints,
            layout,
            lb,
            ub,
            jac_structure,
            hess_structure,
            obj_hess_nnz,
            dyn_jac_nnz,
            con_jac_nnz,
            num_rows: row_offset,
        }
    }

    /// The decision-vector layout of this problem.
    pub fn layout(&self) -> &ZLayout {
        &self.layout
    }

    /// The dynamics assembler.
    pub fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    /// The objective.
    pub fn objective_terms(&self) -> &Objective {
        &self.objective
    }
}

fn check_finite(buf: &[f64], what: &str) -> Result<()> {
    for (i, v) in buf.iter().enumerate() {
        if !v.is_finite() {
            return Err(NumericError::NonFinite {
                what: what.to_string(),
                index: i,
            }
            .into());
        }
    }
    Ok(())
}

impl NlpProblem for Evaluator {
    fn num_variables(&self) -> usize {
        self.layout.num_vars()
    }

    fn num_constraints(&self) -> usize {
        self.num_rows
    }

    fn variable_bounds(&self) -> (&[f64], &[f64]) {
        (&self.lb, &self.ub)
    }

    fn objective(&mut self, z: &[f64]) -> Result<f64> {
        let v = self.objective.value(z);
        if !v.is_finite() {
            return Err(NumericError::NonFinite {
                what: "objective".to_string(),
                index: 0,
            }
            .into());
        }
        Ok(v)
    }

    fn gradient(&mut self, z: &[f64], out: &mut [f64]) -> Result<()> {
        self.objective.gradient_into(z, out);
        check_finite(out, "objective gradient")
    }

    fn constraints(&mut self, z: &[f64], out: &mut [f64]) -> Result<()> {
        let dyn_rows = self.dynamics.num_rows();
        self.dynamics.residual_into(z, &mut out[..dyn_rows]);
        let mut offset = dyn_rows;
        for c in &self.constraints {
            let rows = c.num_rows();
            c.residual_into(z, &mut out[offset..offset + rows]);
            offset += rows;
        }
        check_finite(out, "constraint residual")
    }

    fn jacobian_structure(&self) -> &[(usize, usize)] {
        &self.jac_structure
    }

    fn jacobian_values(&mut self, z: &[f64], out: &mut [f64]) -> Result<()> {
        self.dynamics
            .jacobian_values_into(z, &mut out[..self.dyn_jac_nnz]);
        let mut offset = self.dyn_jac_nnz;
        for (c, &nnz) in self.constraints.iter().zip(self.con_jac_nnz.iter()) {
            c.jacobian_values_into(&mut out[offset..offset + nnz]);
            offset += nnz;
        }
        check_finite(out, "jacobian values")
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.hess_structure
    }

    fn hessian_values(
        &mut self,
        z: &[f64],
        sigma: f64,
        mu: &[f64],
        out: &mut [f64],
    ) -> Result<()> {
        let (obj_out, dyn_out) = out.split_at_mut(self.obj_hess_nnz);
        self.objective.hessian_values_into(z, obj_out);
        for v in obj_out.iter_mut() {
            *v *= sigma;
        }
        let dyn_rows = self.dynamics.num_rows();
        self.dynamics
            .hessian_values_into(z, &mu[..dyn_rows], dyn_out);
        check_finite(out, "hessian values")
    }
}
