//! Stochastic neural-mass model of a single cortical column.
//!
//! The column integrates excitatory and inhibitory membrane potentials,
//! second-order synaptic kinetics and a sodium-dependent potassium current
//! with a four-stage stochastic Runge-Kutta scheme.

pub mod config;
pub mod error;
pub mod neuro;
pub mod simulation;

pub use config::SimulationConfig;
pub use error::{ParamError, SimulationError};
pub use neuro::column::{Column, StateVar};
pub use neuro::params::{ColumnParams, DEFAULT_DT, Parameters};
pub use simulation::Simulation;
