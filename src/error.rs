use std::path::PathBuf;

use thiserror::Error;

use crate::neuro::column::StateVar;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("parameter `{name}` must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("parameter `{name}` must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("parameter `{name}` must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("state diverged at t = {time_ms} ms: {var} = {value}")]
    Diverged {
        time_ms: f64,
        var: StateVar,
        value: f64,
    },
}
