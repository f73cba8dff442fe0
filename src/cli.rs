use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "cortical-column",
    version,
    about = "Stochastic neural-mass model of a cortical column",
    long_about = None
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate one column and write its trace
    Run(RunArgs),
    /// Run one column per parameter value in parallel
    Sweep(SweepArgs),
    /// Live view of a running column
    Gui {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON simulation config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Simulated time in ms, overrides the config
    #[arg(short, long)]
    pub duration: Option<f64>,

    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Constant external drive added for the whole run
    #[arg(short, long)]
    pub input: Option<f64>,

    /// Write the trace as JSON
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Render the trace to an HTML plot
    #[arg(short, long)]
    pub plot: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    #[arg(long, value_enum)]
    pub param: SweepParam,

    #[arg(long, value_delimiter = ',', required = true)]
    pub values: Vec<f64>,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub duration: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SweepParam {
    SigmaP,
    GKna,
    Dphi,
}
