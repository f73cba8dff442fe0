use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use cortical_column::neuro::recorder::Trace;
use cortical_column::neuro::stimuli::{StimulusMode, StimulusSpec};
use cortical_column::{Simulation, SimulationConfig};
use plotly::common::Mode;
use plotly::{Plot, Scatter};

use crate::cli::RunArgs;

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let mut simulation = Simulation::from_config(&config)?;
    simulation
        .run_steps(config.steps())
        .with_context(|| format!("simulating {} ms", config.duration_ms))?;

    let trace = simulation.into_trace();
    print_summary(&trace);

    if let Some(path) = &args.out {
        write_trace(&trace, path)?;
        tracing::info!(path = %path.display(), samples = trace.len(), "trace written");
    }

    if let Some(path) = &args.plot {
        plot_trace(&trace, path);
        tracing::info!(path = %path.display(), "plot written");
    }

    Ok(())
}

fn apply_overrides(config: &mut SimulationConfig, args: &RunArgs) {
    if let Some(duration) = args.duration {
        config.duration_ms = duration;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(amplitude) = args.input {
        config.stimuli.push(StimulusSpec {
            mode: StimulusMode::CurrentStep {
                amplitude,
                start: 0.0,
                stop: config.duration_ms,
            },
            enabled: true,
        });
    }
}

fn print_summary(trace: &Trace) {
    println!(
        "{} samples every {} ms",
        trace.len(),
        trace.sample_interval_ms
    );
    for name in trace.series.keys() {
        if let Some(s) = trace.summary(name) {
            println!(
                "{name:>6}: mean {:>10.4}  std {:>9.4}  min {:>10.4}  max {:>10.4}",
                s.mean, s.std, s.min, s.max
            );
        }
    }
}

fn write_trace(trace: &Trace, path: &Path) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating trace file {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), trace)
        .with_context(|| format!("writing trace to {}", path.display()))?;
    Ok(())
}

fn plot_trace(trace: &Trace, path: &Path) {
    let mut plot = Plot::new();
    for (name, values) in &trace.series {
        let series = Scatter::new(trace.time_ms.clone(), values.clone())
            .name(name.as_str())
            .mode(Mode::Lines);
        plot.add_trace(series);
    }
    plot.write_html(path);
}
