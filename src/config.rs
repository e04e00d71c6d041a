// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the collocation engine.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. config.yaml file
//! 3. Environment variables (QUBITOS_QOC_*)

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{Error, Result};
use crate::problem::{ProblemOptions, TimeMode};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Problem assembly settings
    #[serde(default)]
    pub problem: ProblemConfig,

    /// Solver handoff settings
    #[serde(default)]
    pub solver: SolverConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resource limits
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["config.yaml", "config.yml", "/etc/qubitos/collocation.yaml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("QUBITOS_QOC_MODE") {
            match val.as_str() {
                "fixed_time" => self.problem.mode = ModeConfig::FixedTime,
                "free_time" => self.problem.mode = ModeConfig::FreeTime,
                "min_time" => self.problem.mode = ModeConfig::MinTime,
                _ => {}
            }
        }
        if let Ok(val) = env::var("QUBITOS_QOC_T_STEPS") {
            if let Ok(t) = val.parse() {
                self.problem.t_steps = t;
            }
        }
        if let Ok(val) = env::var("QUBITOS_QOC_DT") {
            if let Ok(dt) = val.parse() {
                self.problem.dt = dt;
            }
        }
        if let Ok(val) = env::var("QUBITOS_QOC_MAX_ITERATIONS") {
            if let Ok(n) = val.parse() {
                self.solver.max_iterations = n;
            }
        }
        if let Ok(val) = env::var("QUBITOS_QOC_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.problem.t_steps < 2 {
            return Err(Error::Config("t_steps must be >= 2".into()));
        }
        if self.problem.t_steps as u32 > self.limits.max_time_steps {
            return Err(Error::Config(format!(
                "t_steps {} exceeds limit {}",
                self.problem.t_steps, self.limits.max_time_steps
            )));
        }
        if self.problem.dt <= 0.0 {
            return Err(Error::Config("dt must be positive".into()));
        }
        if self.problem.dt_min <= 0.0 || self.problem.dt_max < self.problem.dt_min {
            return Err(Error::Config(format!(
                "need 0 < dt_min <= dt_max, got [{}, {}]",
                self.problem.dt_min, self.problem.dt_max
            )));
        }
        if !matches!(self.problem.integrator_order, 2 | 4) {
            return Err(Error::Config(format!(
                "integrator_order must be 2 or 4, got {}",
                self.problem.integrator_order
            )));
        }
        if self.solver.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be > 0".into()));
        }
        if self.problem.t_steps > 1000 {
            tracing::warn!(
                t_steps = self.problem.t_steps,
                "very fine time grid; NLP assembly will be large"
            );
        }
        Ok(())
    }
}

/// Time-grid mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeConfig {
    FixedTime,
    FreeTime,
    MinTime,
}

/// Problem assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemConfig {
    /// Time-grid mode
    #[serde(default = "default_mode")]
    pub mode: ModeConfig,

    /// Number of knot points
    #[serde(default = "default_t_steps")]
    pub t_steps: usize,

    /// Step duration (fixed-time mode and seeding)
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Lower step-duration bound (free/min-time modes)
    #[serde(default = "default_dt_min")]
    pub dt_min: f64,

    /// Upper step-duration bound (free/min-time modes)
    #[serde(default = "default_dt_max")]
    pub dt_max: f64,

    /// Tie all steps to a shared duration (free-time mode)
    #[serde(default)]
    pub all_equal_dts: bool,

    /// Terminal cost weight Q
    #[serde(default = "default_q_weight")]
    pub q_weight: f64,

    /// Control regularizer weight
    #[serde(default = "default_r_control")]
    pub r_control: f64,

    /// Smoothness regularizer weight (min-time mode)
    #[serde(default = "default_r_smoothness")]
    pub r_smoothness: f64,

    /// Integration scheme order (2 or 4)
    #[serde(default = "default_integrator_order")]
    pub integrator_order: usize,

    /// Pin augmented controls and u to zero at both endpoints
    #[serde(default = "default_true")]
    pub zero_endpoint_controls: bool,

    /// Gaussian jitter sigma for the interpolation seed
    #[serde(default)]
    pub seed_sigma: f64,

    /// RNG seed for the jitter
    #[serde(default)]
    pub seed: u64,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            t_steps: default_t_steps(),
            dt: default_dt(),
            dt_min: default_dt_min(),
            dt_max: default_dt_max(),
            all_equal_dts: false,
            q_weight: default_q_weight(),
            r_control: default_r_control(),
            r_smoothness: default_r_smoothness(),
            integrator_order: default_integrator_order(),
            zero_endpoint_controls: true,
            seed_sigma: 0.0,
            seed: 0,
        }
    }
}

impl ProblemConfig {
    /// Map onto assembly options.
    pub fn to_options(&self) -> ProblemOptions {
        let mode = match self.mode {
            ModeConfig::FixedTime => TimeMode::Fixed { dt: self.dt },
            ModeConfig::FreeTime => TimeMode::Free {
                dt_min: self.dt_min,
                dt_max: self.dt_max,
                all_equal: self.all_equal_dts,
            },
            ModeConfig::MinTime => TimeMode::MinTime {
                dt_min: self.dt_min,
                dt_max: self.dt_max,
            },
        };
        ProblemOptions {
            t_steps: self.t_steps,
            mode,
            q_weight: self.q_weight,
            r_control: self.r_control,
            r_smoothness: self.r_smoothness,
            zero_endpoint_controls: self.zero_endpoint_controls,
            seed_sigma: self.seed_sigma,
            seed: self.seed,
            seed_dt: Some(self.dt),
            ..Default::default()
        }
    }
}

fn default_mode() -> ModeConfig {
    ModeConfig::FixedTime
}

fn default_t_steps() -> usize {
    10
}

fn default_dt() -> f64 {
    0.01
}

fn default_dt_min() -> f64 {
    0.005
}

fn default_dt_max() -> f64 {
    0.05
}

fn default_q_weight() -> f64 {
    100.0
}

fn default_r_control() -> f64 {
    1e-2
}

fn default_r_smoothness() -> f64 {
    1e-2
}

fn default_integrator_order() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Solver handoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Maximum solver iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Convergence tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Solver print level (0 = quiet)
    #[serde(default)]
    pub print_level: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            print_level: 0,
        }
    }
}

fn default_max_iterations() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-8
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "json".into()
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum Hilbert space dimension
    #[serde(default = "default_max_hilbert_dim")]
    pub max_hilbert_dim: u32,

    /// Maximum time steps
    #[serde(default = "default_max_time_steps")]
    pub max_time_steps: u32,

    /// Maximum number of drives
    #[serde(default = "default_max_controls")]
    pub max_controls: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_hilbert_dim: default_max_hilbert_dim(),
            max_time_steps: default_max_time_steps(),
            max_controls: default_max_controls(),
        }
    }
}

fn default_max_hilbert_dim() -> u32 {
    64
}

fn default_max_time_steps() -> u32 {
    10_000
}

fn default_max_controls() -> u32 {
    16
}
