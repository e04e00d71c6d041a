// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Problem assembly: maps a system, an integrator, and a set of options
//! into a seeded trajectory plus an [`Evaluator`] behind the solver
//! contract.
//!
//! Modes:
//! - fixed time: every dt pinned to a constant, objective = terminal
//!   quantum cost + control regularizer;
//! - free time: dt bounded (optionally tied all-equal), same objective;
//! - min time: objective = total duration + control regularizer +
//!   smoothness regularizer, with the terminal states pinned to the
//!   warm-start targets by equality.
//!
//! Controls (the augmented block and u) are pinned to zero at both
//! endpoints by default, matching the behavior of fixed-endpoint pulse
//! shaping; `zero_endpoint_controls` exposes the switch.

use std::sync::Arc;
use tracing::{info, warn};

use crate::constraint::Constraint;
use crate::cost::StateCost;
use crate::dynamics::Dynamics;
use crate::error::{ConstraintViolation, Error, Result};
use crate::evaluator::Evaluator;
use crate::integrator::Integrator;
use crate::model::QuantumSystem;
use crate::objective::{
    L1SlackRegularizer, MinTimeObjective, Objective, QuadraticRegularizer,
    QuadraticSmoothnessRegularizer, QuantumObjective,
};
use crate::config::ResourceLimits;
use crate::solver::{NlpSolver, SolverStatus};
use crate::trajectory::{Trajectory, ZLayout};
use crate::validation::{validate_problem_size, validate_state_norm};

/// Time-grid handling.
#[derive(Debug, Clone)]
pub enum TimeMode {
    /// Every step pinned to `dt`.
    Fixed { dt: f64 },
    /// Steps bounded in [dt_min, dt_max]; `all_equal` ties them to the
    /// shared trailing duplicate.
    Free {
        dt_min: f64,
        dt_max: f64,
        all_equal: bool,
    },
    /// Minimize total duration with steps bounded in [dt_min, dt_max].
    MinTime { dt_min: f64, dt_max: f64 },
}

/// Assembly options.
#[derive(Debug, Clone)]
pub struct ProblemOptions {
    /// Number of knot points T.
    pub t_steps: usize,
    /// Time-grid mode.
    pub mode: TimeMode,
    /// Terminal cost (fixed- and free-time modes).
    pub cost: StateCost,
    /// Terminal cost weight Q.
    pub q_weight: f64,
    /// Quadratic weight on the top-order controls u.
    pub r_control: f64,
    /// Smoothness weight on u (min-time mode).
    pub r_smoothness: f64,
    /// Symmetric bound on u, if any.
    pub u_bound: Option<f64>,
    /// Pin augmented controls and u to zero at both endpoints.
    pub zero_endpoint_controls: bool,
    /// Within-step offsets to L1-regularize (empty disables slacks).
    pub l1_offsets: Vec<usize>,
    /// L1 weight alpha.
    pub l1_alpha: f64,
    /// Gaussian jitter sigma for the interpolation seed (0 disables).
    pub seed_sigma: f64,
    /// RNG seed for the jitter.
    pub seed: u64,
    /// Seed step duration; defaults to the mode's dt (fixed) or the
    /// midpoint of [dt_min, dt_max].
    pub seed_dt: Option<f64>,
}

impl Default for ProblemOptions {
    fn default() -> Self {
        Self {
            t_steps: 10,
            mode: TimeMode::Fixed { dt: 0.01 },
            cost: StateCost::Infidelity,
            q_weight: 100.0,
            r_control: 1e-2,
            r_smoothness: 1e-2,
            u_bound: None,
            zero_endpoint_controls: true,
            l1_offsets: Vec::new(),
            l1_alpha: 1.0,
            seed_sigma: 0.0,
            seed: 0,
            seed_dt: None,
        }
    }
}

impl ProblemOptions {
    fn initial_dt(&self) -> f64 {
        if let Some(dt) = self.seed_dt {
            return dt;
        }
        match self.mode {
            TimeMode::Fixed { dt } => dt,
            TimeMode::Free { dt_min, dt_max, .. } | TimeMode::MinTime { dt_min, dt_max } => {
                0.5 * (dt_min + dt_max)
            }
        }
    }

    fn validate(&self, system: &QuantumSystem) -> Result<()> {
        if self.t_steps < 2 {
            return Err(Error::Config(format!(
                "t_steps must be >= 2, got {}",
                self.t_steps
            )));
        }
        if self.q_weight < 0.0 || self.r_control < 0.0 || self.r_smoothness < 0.0 {
            return Err(Error::Config("weights must be non-negative".into()));
        }
        if let TimeMode::Fixed { dt } = self.mode {
            if dt <= 0.0 {
                return Err(Error::Config(format!("dt must be positive, got {dt}")));
            }
        }
        for &k in &self.l1_offsets {
            if k >= system.vardim {
                return Err(Error::Config(format!(
                    "L1 offset {k} outside the step slice (vardim {})",
                    system.vardim
                )));
            }
        }
        if self.l1_offsets.is_empty() && self.l1_alpha != 1.0 {
            warn!("l1_alpha set but no L1 offsets given; slack penalty is inactive");
        }
        Ok(())
    }
}

/// A fully assembled optimal-control problem.
pub struct QuantumControlProblem {
    system: Arc<QuantumSystem>,
    evaluator: Evaluator,
    trajectory: Trajectory,
}

impl QuantumControlProblem {
    /// Assemble the NLP for the given system, scheme, and options.
    pub fn new(
        system: Arc<QuantumSystem>,
        integrator: Integrator,
        options: ProblemOptions,
    ) -> Result<Self> {
        options.validate(&system)?;
        let t_steps = options.t_steps;
        validate_problem_size(
            system.isodim,
            system.ncontrols,
            t_steps,
            &ResourceLimits::default(),
        )?;
        for psi in system.psi_init.iter().chain(system.psi_goal.iter()) {
            validate_state_norm(psi.view(), 1e-6)?;
        }
        let layout = ZLayout::new(&system, t_steps, options.l1_offsets.len());
        let trajectory = Trajectory::linear_interpolation(
            &system,
            layout,
            options.initial_dt(),
            options.seed_sigma,
            options.seed,
        )?;

        let u_offsets: Vec<usize> = (system.nstates..system.vardim).collect();
        let all_times: Vec<usize> = (0..t_steps).collect();

        let mut objective = match options.mode {
            TimeMode::MinTime { .. } => {
                Objective::from_term(MinTimeObjective::for_layout(system.vardim, t_steps))
                    + Objective::from_term(QuadraticRegularizer::new(
                        &u_offsets,
                        system.vardim,
                        &all_times,
                        options.r_control,
                    ))
                    + Objective::from_term(QuadraticSmoothnessRegularizer::new(
                        &u_offsets,
                        system.vardim,
                        &all_times,
                        options.r_smoothness,
                    ))
            }
            _ => {
                Objective::from_term(QuantumObjective::new(
                    Arc::clone(&system),
                    options.cost.clone(),
                    t_steps,
                    options.q_weight,
                )) + Objective::from_term(QuadraticRegularizer::new(
                    &u_offsets,
                    system.vardim,
                    &all_times,
                    options.r_control,
                ))
            }
        };

        let mut constraints = Vec::new();

        // initial states
        constraints.push(Constraint::equality(
            vec![0],
            (0..system.n_wfn_states).collect(),
            system
                .psi_init
                .iter()
                .flat_map(|p| p.iter().copied())
                .collect(),
            system.vardim,
        )?);

        if options.zero_endpoint_controls {
            let ctl_offsets: Vec<usize> = (system.n_wfn_states..system.vardim).collect();
            constraints.push(Constraint::equality(
                vec![0, t_steps - 1],
                ctl_offsets.clone(),
                vec![0.0; ctl_offsets.len()],
                system.vardim,
            )?);
        }

        // interior drive-amplitude bounds
        let interior: Vec<usize> = (1..t_steps - 1).collect();
        if !interior.is_empty() {
            let amp_offsets: Vec<usize> = {
                let base = system.n_wfn_states + system.drive_block() * system.ncontrols;
                (base..base + system.ncontrols).collect()
            };
            constraints.push(Constraint::bounds(
                interior.clone(),
                amp_offsets,
                system.control_bounds.clone(),
                system.vardim,
            )?);

            if let Some(b) = options.u_bound {
                constraints.push(Constraint::bounds(
                    interior,
                    u_offsets.clone(),
                    vec![b; system.ncontrols],
                    system.vardim,
                )?);
            }
        }

        match options.mode {
            TimeMode::Fixed { dt } => {
                constraints.push(Constraint::TimeStepEquality {
                    dt,
                    dt_offset: layout.dt_offset(),
                    t_steps,
                });
            }
            TimeMode::Free {
                dt_min,
                dt_max,
                all_equal,
            } => {
                constraints.push(Constraint::time_step_bounds(
                    dt_min,
                    dt_max,
                    layout.dt_offset(),
                    t_steps,
                )?);
                if all_equal {
                    constraints.push(Constraint::TimeStepsAllEqual {
                        dt_offset: layout.dt_offset(),
                        t_steps,
                    });
                }
            }
            TimeMode::MinTime { dt_min, dt_max } => {
                constraints.push(Constraint::time_step_bounds(
                    dt_min,
                    dt_max,
                    layout.dt_offset(),
                    t_steps,
                )?);
                // pin the terminal states to the warm-start targets
                let mut values = Vec::with_capacity(system.n_wfn_states);
                for i in 0..system.nqstates {
                    values.extend(trajectory.state(t_steps - 1, i).iter().copied());
                }
                constraints.push(Constraint::equality(
                    vec![t_steps - 1],
                    (0..system.n_wfn_states).collect(),
                    values,
                    system.vardim,
                )?);
            }
        }

        if !options.l1_offsets.is_empty() {
            let mut x_indices = Vec::new();
            let mut s1 = Vec::new();
            let mut s2 = Vec::new();
            for t in 0..t_steps {
                for (r, &k) in options.l1_offsets.iter().enumerate() {
                    x_indices.push(t * system.vardim + k);
                    s1.push(layout.slack1_index(t, r));
                    s2.push(layout.slack2_index(t, r));
                }
            }
            constraints.push(Constraint::l1_slack(x_indices, s1.clone(), s2.clone())?);
            objective.push(L1SlackRegularizer::new(s1, s2, options.l1_alpha));
        }

        let dynamics = Dynamics::new(Arc::clone(&system), integrator, t_steps);
        let evaluator = Evaluator::new(dynamics, objective, constraints, layout);

        info!(
            t_steps,
            nqstates = system.nqstates,
            ncontrols = system.ncontrols,
            variables = layout.num_vars(),
            "assembled control problem"
        );

        Ok(Self {
            system,
            evaluator,
            trajectory,
        })
    }

    /// The system under control.
    pub fn system(&self) -> &Arc<QuantumSystem> {
        &self.system
    }

    /// The assembled evaluator (the solver-facing object).
    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// The current trajectory (seed before solving, solution after).
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Mean terminal infidelity over the tracked states.
    pub fn final_infidelity(&self) -> f64 {
        let t = self.trajectory.layout().t_steps - 1;
        let cost = StateCost::Infidelity;
        let mut total = 0.0;
        for i in 0..self.system.nqstates {
            total += cost.value(self.trajectory.state(t, i), &self.system.psi_goal[i]);
        }
        total / self.system.nqstates as f64
    }

    /// Run a solver from the seeded trajectory and read the result back.
    ///
    /// # Errors
    ///
    /// `Infeasible` (with the achieved infidelity) when the solver reports
    /// an infeasible terminal point; solver-side failures pass through.
    pub fn solve_with<S: NlpSolver>(&mut self, solver: &mut S) -> Result<SolverStatus> {
        let mut z = self.trajectory.data().to_vec();
        let status = solver.solve(&mut self.evaluator, &mut z)?;
        self.trajectory.read_back(&z)?;
        info!(status = %status, infidelity = self.final_infidelity(), "solve finished");
        if !status.is_feasible() {
            return Err(ConstraintViolation {
                message: status.to_string(),
                final_infidelity: self.final_infidelity(),
            }
            .into());
        }
        Ok(status)
    }
}
