use std::path::Path;

use anyhow::Context;
use cortical_column::SimulationConfig;

pub mod gui;
pub mod run;
pub mod sweep;

/// Loads `path`, or the defaults when no config is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SimulationConfig> {
    match path {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(SimulationConfig::default()),
    }
}
