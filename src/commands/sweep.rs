use anyhow::Context;
use cortical_column::{Simulation, SimulationConfig, StateVar};
use rayon::prelude::*;

use crate::cli::{SweepArgs, SweepParam};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepRow {
    pub value: f64,
    pub vp_mean: f64,
    pub vp_std: f64,
    /// Share of samples with Vp above the excitatory threshold
    pub up_fraction: f64,
    pub na_mean: f64,
}

pub fn run(args: SweepArgs) -> anyhow::Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(duration) = args.duration {
        config.duration_ms = duration;
    }

    let rows = sweep(&config, args.param, &args.values)?;

    println!(
        "{:>10} {:>10} {:>9} {:>8} {:>9}",
        "value", "Vp mean", "Vp std", "up", "Na mean"
    );
    for row in rows {
        println!(
            "{:>10.4} {:>10.4} {:>9.4} {:>8.3} {:>9.4}",
            row.value, row.vp_mean, row.vp_std, row.up_fraction, row.na_mean
        );
    }

    Ok(())
}

fn with_value(config: &SimulationConfig, param: SweepParam, value: f64) -> SimulationConfig {
    let mut config = config.clone();
    match param {
        SweepParam::SigmaP => config.params.sigma_p = value,
        SweepParam::GKna => config.params.g_kna = value,
        SweepParam::Dphi => config.params.dphi = value,
    }
    for var in [StateVar::Vp, StateVar::Na] {
        if !config.record.vars.contains(&var) {
            config.record.vars.push(var);
        }
    }
    config
}

/// One independent column per value; columns share nothing, so they run on
/// the rayon pool.
pub fn sweep(
    config: &SimulationConfig,
    param: SweepParam,
    values: &[f64],
) -> anyhow::Result<Vec<SweepRow>> {
    values
        .par_iter()
        .map(|&value| {
            let config = with_value(config, param, value);
            let mut simulation = Simulation::from_config(&config)
                .with_context(|| format!("{param:?} = {value}"))?;
            simulation
                .run_steps(config.steps())
                .with_context(|| format!("{param:?} = {value}"))?;

            let theta_p = simulation.column.parameters().theta_p;
            let trace = simulation.into_trace();
            let vp = trace
                .summary(StateVar::Vp.name())
                .context("no Vp samples recorded")?;
            let na = trace
                .summary(StateVar::Na.name())
                .context("no Na samples recorded")?;
            let up_fraction = trace
                .fraction_above(StateVar::Vp.name(), theta_p)
                .unwrap_or(0.0);

            tracing::debug!(?param, value, vp_mean = vp.mean, up_fraction, "sweep point done");

            Ok(SweepRow {
                value,
                vp_mean: vp.mean,
                vp_std: vp.std,
                up_fraction,
                na_mean: na.mean,
            })
        })
        .collect()
}
