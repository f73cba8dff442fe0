use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::neuro::column::StateVar;
use crate::neuro::params::{ColumnParams, DEFAULT_DT, ensure_non_negative, ensure_positive};
use crate::neuro::stimuli::{Perturbation, StimulusSpec};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub vars: Vec<StateVar>,
    pub sample_every_ms: f64,
    pub record_input: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            vars: vec![StateVar::Vp, StateVar::Vi, StateVar::Na],
            sample_every_ms: 1.0,
            record_input: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Integration step (ms)
    pub dt: f64,
    pub duration_ms: f64,
    /// Seed for the membrane noise; entropy when absent
    pub seed: Option<u64>,
    pub params: ColumnParams,
    pub record: RecordConfig,
    pub stimuli: Vec<StimulusSpec>,
    pub perturbations: Vec<Perturbation>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            duration_ms: 30_000.0,
            seed: None,
            params: ColumnParams::default(),
            record: RecordConfig::default(),
            stimuli: Vec::new(),
            perturbations: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimulationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), "loaded simulation config");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, SimulationError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        ensure_positive("dt", self.dt)?;
        ensure_non_negative("duration_ms", self.duration_ms)?;
        ensure_positive("record.sample_every_ms", self.record.sample_every_ms)?;
        self.params.validate()?;

        if self.record.sample_every_ms < self.dt {
            return Err(SimulationError::InvalidConfig(format!(
                "sampling interval {} ms is shorter than the time step {} ms",
                self.record.sample_every_ms, self.dt
            )));
        }
        if let Some(p) = self.perturbations.iter().find(|p| p.at_ms < 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "perturbation scheduled at negative time {} ms",
                p.at_ms
            )));
        }
        Ok(())
    }

    /// Number of integration steps covering `duration_ms`.
    pub fn steps(&self) -> u64 {
        (self.duration_ms / self.dt).round() as u64
    }

    pub fn sample_every_ticks(&self) -> u64 {
        ((self.record.sample_every_ms / self.dt).round() as u64).max(1)
    }
}
