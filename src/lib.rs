// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS pulse-level optimal control: direct collocation NLP assembly.
//!
//! This crate formulates quantum optimal control problems as large, sparse
//! nonlinear programs and exposes them to a generic interior-point solver
//! through a minimal callback contract. The quantum evolution is real
//! embedded, the collocation equalities come from second- and fourth-order
//! Pade schemes with fully analytic first and second derivatives, and the
//! objective is an additive algebra of terminal costs and regularizers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            QuantumControlProblem              │
//! ├──────────────────┬────────────────────────────┤
//! │    Evaluator     │        Trajectory          │
//! │  (NlpProblem)    │  (seeding / read-back)     │
//! ├─────────┬────────┴──────┬─────────────────────┤
//! │ Dynamics│   Objective   │     Constraints     │
//! ├─────────┴───────┬───────┴─────────────────────┤
//! │   Integrators   │        Cost library         │
//! ├─────────────────┴───────────────┬─────────────┤
//! │     System model (generators)   │ Iso algebra │
//! └─────────────────────────────────┴─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`iso`]: real embedding and the generator G(H)
//! - [`model`]: system model and physical-parameter specializations
//! - [`integrator`]: collocation schemes and their analytic derivatives
//! - [`dynamics`]: global constraint residual, Jacobian, Lagrangian Hessian
//! - [`cost`]: per-state scalar costs
//! - [`objective`]: additive objective algebra
//! - [`constraint`]: bound and linear-row constraints
//! - [`problem`]: mode assembly and the solve entry point
//! - [`evaluator`]: the solver-facing callback object
//! - [`trajectory`]: decision-vector container
//! - [`solver`]: the consumed solver contract
//! - [`expm`]: dense real-matrix exponential
//! - [`config`]: configuration management
//! - [`validation`]: input validation utilities
//! - [`error`]: error types

pub mod config;
pub mod constraint;
pub mod cost;
pub mod dynamics;
pub mod error;
pub mod evaluator;
pub mod expm;
pub mod integrator;
pub mod iso;
pub mod model;
pub mod objective;
pub mod problem;
pub mod solver;
pub mod trajectory;
pub mod validation;

pub use config::Config;
pub use cost::StateCost;
pub use error::{Error, Result};
pub use evaluator::Evaluator;
pub use integrator::Integrator;
pub use model::{QuantumSystem, SystemOptions};
pub use objective::Objective;
pub use problem::{ProblemOptions, QuantumControlProblem, TimeMode};
pub use solver::{NlpProblem, NlpSolver, SolverStatus};
pub use trajectory::{Trajectory, ZLayout};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
