use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParamError;
use crate::neuro::noise::{NoiseSource, NormalStream};
use crate::neuro::params::{ColumnParams, Parameters, srk};

/// Base value plus the four RK stage values.
pub const RK_SLOTS: usize = 5;
pub const STATE_DIM: usize = 11;
/// Vp and Vi carry membrane noise.
pub const NOISE_CHANNELS: usize = 2;

pub type Stages = [f64; RK_SLOTS];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateVar {
    Vp,
    Vi,
    Na,
    #[serde(rename = "s_ep")]
    SEp,
    #[serde(rename = "s_ei")]
    SEi,
    #[serde(rename = "s_gp")]
    SGp,
    #[serde(rename = "s_gi")]
    SGi,
    #[serde(rename = "x_ep")]
    XEp,
    #[serde(rename = "x_ei")]
    XEi,
    #[serde(rename = "x_gp")]
    XGp,
    #[serde(rename = "x_gi")]
    XGi,
}

impl StateVar {
    pub const ALL: [StateVar; STATE_DIM] = [
        StateVar::Vp,
        StateVar::Vi,
        StateVar::Na,
        StateVar::SEp,
        StateVar::SEi,
        StateVar::SGp,
        StateVar::SGi,
        StateVar::XEp,
        StateVar::XEi,
        StateVar::XGp,
        StateVar::XGi,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StateVar::Vp => "Vp",
            StateVar::Vi => "Vi",
            StateVar::Na => "Na",
            StateVar::SEp => "s_ep",
            StateVar::SEi => "s_ei",
            StateVar::SGp => "s_gp",
            StateVar::SGi => "s_gi",
            StateVar::XEp => "x_ep",
            StateVar::XEi => "x_ei",
            StateVar::XGp => "x_gp",
            StateVar::XGi => "x_gi",
        }
    }

    /// Index of the noise stream driving this variable, if any.
    pub fn noise_channel(self) -> Option<usize> {
        match self {
            StateVar::Vp => Some(0),
            StateVar::Vi => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for StateVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateVar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateVar::ALL
            .into_iter()
            .find(|var| var.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown state variable `{s}`"))
    }
}

/// Resting values: leak potentials, equilibrium sodium, silent synapses.
pub fn resting_state(params: &Parameters) -> [f64; STATE_DIM] {
    let mut y = [0.0; STATE_DIM];
    y[StateVar::Vp as usize] = params.e_l_p;
    y[StateVar::Vi as usize] = params.e_l_i;
    y[StateVar::Na as usize] = params.na_eq;
    y
}

fn init(value: f64) -> Stages {
    [value, 0.0, 0.0, 0.0, 0.0]
}

/// One cortical column: 11 coupled state variables advanced by a
/// stochastic RK4 scheme with additive membrane noise.
#[derive(Clone, Debug)]
pub struct Column<N: NoiseSource = NormalStream> {
    pub(crate) params: Parameters,
    pub(crate) input: f64,
    pub(crate) vars: [Stages; STATE_DIM],
    noise: [N; NOISE_CHANNELS],
    /// Two samples per channel, refreshed at the start of every step
    draws: [[f64; 2]; NOISE_CHANNELS],
}

impl Column<NormalStream> {
    pub fn new(params: impl Into<ColumnParams>) -> Result<Self, ParamError> {
        Self::with_noise(params, [NormalStream::from_entropy(), NormalStream::from_entropy()])
    }

    pub fn with_seed(params: impl Into<ColumnParams>, seed: u64) -> Result<Self, ParamError> {
        Self::with_noise(params, NormalStream::family(seed))
    }
}

impl<N: NoiseSource> Column<N> {
    pub fn with_noise(
        params: impl Into<ColumnParams>,
        noise: [N; NOISE_CHANNELS],
    ) -> Result<Self, ParamError> {
        let params = params.into();
        params.validate()?;

        tracing::debug!(
            sigma_p = params.sigma_p,
            g_kna = params.g_kna,
            dphi = params.dphi,
            "constructing cortical column"
        );

        let params = Parameters::from_column_params(params);
        let vars = resting_state(&params).map(init);

        Ok(Self {
            params,
            input: 0.0,
            vars,
            noise,
            draws: [[0.0; 2]; NOISE_CHANNELS],
        })
    }

    pub fn set_input(&mut self, input: f64) {
        self.input = input;
    }

    pub fn input(&self) -> f64 {
        self.input
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn noise_sources(&self) -> &[N; NOISE_CHANNELS] {
        &self.noise
    }

    /// Advances every state variable by one step of length `dt` (ms).
    pub fn iterate_ode(&mut self, dt: f64) {
        self.draw_noise();
        for stage in 0..4 {
            self.set_rk(stage, dt);
        }
        self.add_rk(dt);
    }

    fn draw_noise(&mut self) {
        for (draws, source) in self.draws.iter_mut().zip(self.noise.iter_mut()) {
            draws[0] = source.sample();
            draws[1] = source.sample();
        }
    }

    fn stage_values(&self, slot: usize) -> [f64; STATE_DIM] {
        std::array::from_fn(|i| self.vars[i][slot])
    }

    /// Noise added to the stage values of `channel` at `stage`.
    fn noise_stage(&self, stage: usize, channel: usize, dt: f64) -> f64 {
        let [xi1, xi2] = self.draws[channel];
        srk::B[stage] * dt.sqrt() * self.params.dphi * (xi1 + xi2 / 3f64.sqrt())
    }

    /// Noise folded into the final combination of `channel`.
    fn noise_final(&self, channel: usize, dt: f64) -> f64 {
        let [xi1, xi2] = self.draws[channel];
        dt.sqrt() * self.params.dphi * (xi1 - xi2 * 3f64.sqrt()) / 4.0
    }

    fn set_rk(&mut self, stage: usize, dt: f64) {
        let y = self.stage_values(stage);
        let dy = self.params.derivatives(&y, self.input);

        for var in StateVar::ALL {
            let i = var as usize;
            let noise = var
                .noise_channel()
                .map_or(0.0, |channel| self.noise_stage(stage, channel, dt));
            self.vars[i][stage + 1] = self.vars[i][0] + srk::A[stage] * dt * dy[i] + noise;
        }
    }

    fn add_rk(&mut self, dt: f64) {
        for var in StateVar::ALL {
            let i = var as usize;
            let slots = self.vars[i];
            let combined = srk::WEIGHTS
                .iter()
                .zip(slots.iter())
                .map(|(w, v)| w * v)
                .sum::<f64>()
                / 6.0;
            let noise = var
                .noise_channel()
                .map_or(0.0, |channel| self.noise_final(channel, dt));
            self.vars[i][0] = combined + noise;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuro::noise::FixedSequence;
    use crate::neuro::params::{DEFAULT_DT, adaptation};

    fn quiet_column() -> Column<FixedSequence> {
        Column::with_noise(
            ColumnParams::new(4.0, 1.33, 0.0),
            [FixedSequence::zeros(), FixedSequence::zeros()],
        )
        .unwrap()
    }

    fn rk4_reference(
        params: &Parameters,
        mut y: [f64; STATE_DIM],
        input: f64,
        dt: f64,
        steps: usize,
    ) -> [f64; STATE_DIM] {
        let offset = |y: &[f64; STATE_DIM], k: &[f64; STATE_DIM], h: f64| {
            std::array::from_fn::<f64, STATE_DIM, _>(|i| y[i] + h * k[i])
        };
        for _ in 0..steps {
            let k1 = params.derivatives(&y, input);
            let k2 = params.derivatives(&offset(&y, &k1, dt / 2.0), input);
            let k3 = params.derivatives(&offset(&y, &k2, dt / 2.0), input);
            let k4 = params.derivatives(&offset(&y, &k3, dt), input);
            for i in 0..STATE_DIM {
                y[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
            }
        }
        y
    }

    #[test]
    fn starts_at_rest() {
        let column = Column::with_seed(ColumnParams::default(), 1).unwrap();
        assert_eq!(column.value(StateVar::Vp), -66.0);
        assert_eq!(column.value(StateVar::Vi), -64.0);
        assert_eq!(column.value(StateVar::Na), adaptation::NA_EQ);
        for var in &StateVar::ALL[3..] {
            assert_eq!(column.value(*var), 0.0);
        }
        assert_eq!(column.input(), 0.0);
    }

    #[test]
    fn rejects_non_finite_parameters() {
        assert!(Column::with_seed([f64::NAN, 1.33, 2.0], 1).is_err());
        assert!(Column::with_seed([4.0, 1.33, -0.5], 1).is_err());
    }

    #[test]
    fn identical_seeds_give_identical_trajectories() {
        let mut a = Column::with_seed(ColumnParams::default(), 42).unwrap();
        let mut b = Column::with_seed(ColumnParams::default(), 42).unwrap();
        let mut c = Column::with_seed(ColumnParams::default(), 43).unwrap();

        for step in 0..1_000 {
            let input = if step % 200 < 50 { 1.5 } else { 0.0 };
            for column in [&mut a, &mut b, &mut c] {
                column.set_input(input);
                column.iterate_ode(DEFAULT_DT);
            }
            assert_eq!(a.snapshot(), b.snapshot());
        }
        assert_ne!(a.snapshot(), c.snapshot());
    }

    #[test]
    fn without_noise_reduces_to_classical_rk4() {
        let mut column = quiet_column();
        let expected = rk4_reference(
            column.parameters(),
            resting_state(column.parameters()),
            0.0,
            0.1,
            10,
        );
        for _ in 0..10 {
            column.iterate_ode(0.1);
        }
        let actual = column.snapshot();
        for var in StateVar::ALL {
            let i = var as usize;
            assert!(
                (actual[i] - expected[i]).abs() < 1e-9,
                "{var}: {} vs {}",
                actual[i],
                expected[i]
            );
        }
    }

    #[test]
    fn driven_column_also_matches_rk4() {
        let mut column = quiet_column();
        column.set_input(2.0);
        let expected = rk4_reference(
            column.parameters(),
            resting_state(column.parameters()),
            2.0,
            0.1,
            50,
        );
        for _ in 0..50 {
            column.iterate_ode(0.1);
        }
        let actual = column.snapshot();
        for i in 0..STATE_DIM {
            assert!((actual[i] - expected[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn stays_near_rest_without_input_or_noise() {
        let mut column = quiet_column();
        let start = column.snapshot();
        for _ in 0..100 {
            column.iterate_ode(DEFAULT_DT);
        }
        let end = column.snapshot();

        let bound = |var: StateVar| (end[var as usize] - start[var as usize]).abs();
        assert!(bound(StateVar::Vp) < 5.0, "Vp drifted {}", bound(StateVar::Vp));
        assert!(bound(StateVar::Vi) < 1.0);
        assert!(bound(StateVar::Na) < 0.1);
        for var in &StateVar::ALL[3..] {
            assert!(bound(*var) < 0.5, "{var} drifted {}", bound(*var));
        }
    }

    #[test]
    fn sodium_relaxes_monotonically_to_equilibrium() {
        let mut column = quiet_column();
        let na_eq = column.parameters().na_eq;
        let offset = 5.0;
        column.access().set_value(StateVar::Na, na_eq + offset);

        let mut previous = column.value(StateVar::Na);
        for _ in 0..5_000 {
            column.iterate_ode(DEFAULT_DT);
            let na = column.value(StateVar::Na);
            assert!(na <= previous, "Na rose from {previous} to {na}");
            previous = na;
        }
        assert!(previous > na_eq);
        assert!((previous - na_eq) < 0.5 * offset, "Na still at {previous}");
    }

    #[test]
    fn draws_two_samples_per_noisy_variable_each_step() {
        let mut column = Column::with_noise(
            ColumnParams::default(),
            [FixedSequence::zeros(), FixedSequence::zeros()],
        )
        .unwrap();
        for _ in 0..7 {
            column.iterate_ode(DEFAULT_DT);
        }
        for source in column.noise_sources() {
            assert_eq!(source.draws, 14);
        }
    }

    #[test]
    fn stage_and_final_noise_sum_to_one_wiener_increment() {
        let params = ColumnParams::default();
        let (xi1, xi2) = (1.0, 0.5);
        let mut noisy = Column::with_noise(
            params,
            [
                FixedSequence::new(vec![xi1, xi2]),
                FixedSequence::zeros(),
            ],
        )
        .unwrap();
        let mut silent =
            Column::with_noise(params, [FixedSequence::zeros(), FixedSequence::zeros()]).unwrap();

        noisy.iterate_ode(DEFAULT_DT);
        silent.iterate_ode(DEFAULT_DT);

        let increment = DEFAULT_DT.sqrt() * params.dphi * xi1;
        let diff = noisy.value(StateVar::Vp) - silent.value(StateVar::Vp);
        assert!(
            (diff - increment).abs() < 0.02 * increment,
            "{diff} vs {increment}"
        );
        // Vi only sees the Vp noise through the synaptic chain.
        assert!((noisy.value(StateVar::Vi) - silent.value(StateVar::Vi)).abs() < 1e-6);
    }

    #[test]
    fn strong_input_saturates_the_firing_rate() {
        let response = |input: f64| {
            let mut column = quiet_column();
            column.set_input(input);
            for _ in 0..1_000 {
                column.iterate_ode(DEFAULT_DT);
            }
            column.parameters().qp(column.value(StateVar::Vp))
        };

        let baseline = response(0.0);
        let single = response(5.0) - baseline;
        let double = response(10.0) - baseline;

        assert!(single > 0.0 && double > 0.0);
        let ratio = double / single;
        assert!(ratio < 1.5, "response scaled almost linearly: {ratio}");
    }

    #[test]
    fn input_persists_between_steps() {
        let mut column = quiet_column();
        column.set_input(0.75);
        column.iterate_ode(DEFAULT_DT);
        column.iterate_ode(DEFAULT_DT);
        assert_eq!(column.input(), 0.75);
    }

    #[test]
    fn state_var_names_round_trip() {
        for var in StateVar::ALL {
            assert_eq!(var.name().parse::<StateVar>(), Ok(var));
        }
        assert!("Vq".parse::<StateVar>().is_err());
        assert_eq!(
            serde_json::to_string(&StateVar::SGi).unwrap(),
            "\"s_gi\""
        );
    }

    #[test]
    fn columns_can_move_between_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<Column>();
    }
}
