use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::neuro::column::Column;
use crate::neuro::noise::{NoiseSource, NormalStream};
use crate::neuro::recorder::{Recorder, Trace};
use crate::neuro::stimuli::StimulusRunner;

/// A column driven by a stimulation protocol and sampled by a recorder.
pub struct Simulation<N: NoiseSource = NormalStream> {
    pub column: Column<N>,
    pub stimuli: StimulusRunner,
    pub recorder: Recorder,
    dt: f64,
    tick: u64,
}

impl Simulation<NormalStream> {
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let column = match config.seed {
            Some(seed) => Column::with_seed(config.params, seed)?,
            None => Column::new(config.params)?,
        };

        let mut simulation = Self::with_column(column, config);
        for (id, spec) in config.stimuli.iter().enumerate() {
            simulation.stimuli.fire(id as u64, spec, 0);
        }
        for perturbation in &config.perturbations {
            simulation.stimuli.schedule(perturbation, 0);
        }

        tracing::info!(
            dt = config.dt,
            duration_ms = config.duration_ms,
            stimuli = config.stimuli.len(),
            perturbations = config.perturbations.len(),
            "simulation ready"
        );

        Ok(simulation)
    }
}

impl<N: NoiseSource> Simulation<N> {
    /// Wraps an existing column; stimuli from `config` are not armed.
    pub fn with_column(column: Column<N>, config: &SimulationConfig) -> Self {
        let recorder = Recorder::new(
            config.record.vars.clone(),
            config.record.record_input,
            config.sample_every_ticks(),
            config.dt,
        );

        Self {
            column,
            stimuli: StimulusRunner::new(config.dt),
            recorder,
            dt: config.dt,
            tick: 0,
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time_ms(&self) -> f64 {
        self.tick as f64 * self.dt
    }

    pub fn step(&mut self) -> Result<(), SimulationError> {
        self.stimuli.apply(self.tick, &mut self.column);
        self.column.iterate_ode(self.dt);
        self.tick += 1;

        if let Some((var, value)) = self.column.first_non_finite() {
            let time_ms = self.time_ms();
            tracing::warn!(time_ms, %var, value, "column state diverged");
            return Err(SimulationError::Diverged {
                time_ms,
                var,
                value,
            });
        }

        self.recorder.sample(self.tick, &self.column);
        Ok(())
    }

    pub fn run_steps(&mut self, steps: u64) -> Result<(), SimulationError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    pub fn run_for(&mut self, duration_ms: f64) -> Result<(), SimulationError> {
        let steps = (duration_ms / self.dt).max(0.0).round() as u64;
        self.run_steps(steps)
    }

    pub fn trace(&self) -> &Trace {
        self.recorder.trace()
    }

    pub fn into_trace(self) -> Trace {
        self.recorder.into_trace()
    }
}
