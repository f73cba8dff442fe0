use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::neuro::column::{Column, StateVar};
use crate::neuro::noise::NoiseSource;

pub const INPUT_SERIES: &str = "input";

/// Sampled time series of one simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub dt: f64,
    pub sample_interval_ms: f64,
    pub time_ms: Vec<f64>,
    pub series: BTreeMap<String, Vec<f64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.time_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_ms.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn summary(&self, name: &str) -> Option<SeriesSummary> {
        let values = self.get(name)?;
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Some(SeriesSummary {
            mean,
            std: var.sqrt(),
            min,
            max,
        })
    }

    /// Share of samples strictly above `level`.
    pub fn fraction_above(&self, name: &str, level: f64) -> Option<f64> {
        let values = self.get(name)?;
        if values.is_empty() {
            return None;
        }
        let above = values.iter().filter(|&&v| v > level).count();
        Some(above as f64 / values.len() as f64)
    }
}

/// Samples selected column variables every `sample_every` ticks.
pub struct Recorder {
    vars: Vec<StateVar>,
    record_input: bool,
    sample_every: u64,
    trace: Trace,
}

impl Recorder {
    pub fn new(vars: Vec<StateVar>, record_input: bool, sample_every: u64, dt: f64) -> Self {
        let sample_every = sample_every.max(1);
        let mut series: BTreeMap<String, Vec<f64>> = vars
            .iter()
            .map(|var| (var.name().to_string(), Vec::new()))
            .collect();
        if record_input {
            series.insert(INPUT_SERIES.to_string(), Vec::new());
        }

        Self {
            vars,
            record_input,
            sample_every,
            trace: Trace {
                dt,
                sample_interval_ms: sample_every as f64 * dt,
                time_ms: Vec::new(),
                series,
            },
        }
    }

    pub fn vars(&self) -> &[StateVar] {
        &self.vars
    }

    /// Records the state reached after `tick` steps, if `tick` is on the grid.
    pub fn sample<N: NoiseSource>(&mut self, tick: u64, column: &Column<N>) {
        if tick % self.sample_every != 0 {
            return;
        }

        self.trace.time_ms.push(tick as f64 * self.trace.dt);
        for var in &self.vars {
            if let Some(series) = self.trace.series.get_mut(var.name()) {
                series.push(*column.value_ref(*var));
            }
        }
        if self.record_input {
            if let Some(series) = self.trace.series.get_mut(INPUT_SERIES) {
                series.push(column.input());
            }
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn into_trace(self) -> Trace {
        self.trace
    }

    pub fn clear(&mut self) {
        self.trace.time_ms.clear();
        for series in self.trace.series.values_mut() {
            series.clear();
        }
    }

    /// Drops all but the most recent `keep` samples.
    pub fn truncate_front(&mut self, keep: usize) {
        let excess = self.trace.time_ms.len().saturating_sub(keep);
        if excess == 0 {
            return;
        }
        self.trace.time_ms.drain(..excess);
        for series in self.trace.series.values_mut() {
            series.drain(..excess.min(series.len()));
        }
    }
}
