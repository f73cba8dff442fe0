use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Default integration step shared by every column in a driver (ms).
pub const DEFAULT_DT: f64 = 0.1;

pub mod membrane {
    /// Excitatory membrane time constant (ms)
    pub const TAU_P: f64 = 30.0;
    /// Inhibitory membrane time constant (ms)
    pub const TAU_I: f64 = 30.0;
}

pub mod firing {
    /// Maximum firing rates (ms^-1)
    pub const QP_MAX: f64 = 30.0e-3;
    pub const QI_MAX: f64 = 60.0e-3;

    /// Sigmoid thresholds (mV)
    pub const THETA_P: f64 = -58.5;
    pub const THETA_I: f64 = -58.5;

    /// Sigmoid gains (mV)
    pub const SIGMA_P: f64 = 4.0;
    pub const SIGMA_I: f64 = 6.0;

    /// pi / sqrt(3), maps the gain onto the logistic slope
    pub const C1: f64 = 1.813_799_364_234_217_8;
}

pub mod adaptation {
    /// Sodium influx per spike (mM ms)
    pub const ALPHA_NA: f64 = 2.0;
    /// Sodium time constant (ms)
    pub const TAU_NA: f64 = 1.0;
    /// Na-K pump strength (mM/ms)
    pub const R_PUMP: f64 = 0.09;
    /// Equilibrium sodium concentration (mM)
    pub const NA_EQ: f64 = 9.5;
    /// Pump saturation constant, 15^3 (mM^3)
    pub const PUMP_SATURATION: f64 = 3375.0;

    /// KNa activation: W_MAX / (1 + (HALF / Na)^HILL)
    pub const W_KNA_MAX: f64 = 0.37;
    pub const W_KNA_HALF: f64 = 38.7;
    pub const W_KNA_HILL: f64 = 3.5;
}

pub mod synapse {
    /// PSP rise rates (ms^-1)
    pub const GAMMA_E: f64 = 70.0e-3;
    pub const GAMMA_G: f64 = 58.6e-3;
}

pub mod conductance {
    pub const G_L: f64 = 1.0;
    pub const G_AMPA: f64 = 1.0;
    pub const G_GABA: f64 = 1.0;
    /// Sodium-dependent potassium conductance (mS/cm^2)
    pub const G_KNA: f64 = 1.33;
}

pub mod reversal {
    // mV
    pub const E_AMPA: f64 = 0.0;
    pub const E_GABA: f64 = -70.0;
    pub const E_L_P: f64 = -66.0;
    pub const E_L_I: f64 = -64.0;
    pub const E_K: f64 = -100.0;
}

pub mod noise {
    /// Diffusion amplitude of the membrane noise
    pub const DPHI: f64 = 2.0;
}

pub mod connectivity {
    pub const N_PP: f64 = 120.0;
    pub const N_IP: f64 = 72.0;
    pub const N_PI: f64 = 90.0;
    pub const N_II: f64 = 90.0;
}

pub mod srk {
    /// Stage time-step coefficients
    pub const A: [f64; 4] = [0.5, 0.5, 1.0, 1.0];
    /// Stage noise coefficients
    pub const B: [f64; 4] = [0.75, 0.75, 0.0, 0.0];
    /// Weights of [base, stage 1..4] in the final combination, over 6
    pub const WEIGHTS: [f64; 5] = [-3.0, 2.0, 4.0, 2.0, 1.0];
}

/// The three parameters that vary between experiments.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnParams {
    pub sigma_p: f64,
    pub g_kna: f64,
    pub dphi: f64,
}

impl Default for ColumnParams {
    fn default() -> Self {
        Self {
            sigma_p: firing::SIGMA_P,
            g_kna: conductance::G_KNA,
            dphi: noise::DPHI,
        }
    }
}

impl ColumnParams {
    pub fn new(sigma_p: f64, g_kna: f64, dphi: f64) -> Self {
        Self {
            sigma_p,
            g_kna,
            dphi,
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        ensure_positive("sigma_p", self.sigma_p)?;
        ensure_non_negative("g_kna", self.g_kna)?;
        ensure_non_negative("dphi", self.dphi)?;
        Ok(())
    }
}

impl From<[f64; 3]> for ColumnParams {
    fn from([sigma_p, g_kna, dphi]: [f64; 3]) -> Self {
        Self::new(sigma_p, g_kna, dphi)
    }
}

/// Connectivity pathway, named after source and target population.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pathway {
    /// exc -> exc
    Pp,
    /// exc -> inh
    Ip,
    /// inh -> exc
    Pi,
    /// inh -> inh
    Ii,
}

/// Full biophysical parameter set of one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub tau_p: f64,
    pub tau_i: f64,

    pub qp_max: f64,
    pub qi_max: f64,
    pub theta_p: f64,
    pub theta_i: f64,
    pub sigma_p: f64,
    pub sigma_i: f64,

    pub alpha_na: f64,
    pub tau_na: f64,
    pub r_pump: f64,
    pub na_eq: f64,

    pub gamma_e: f64,
    pub gamma_g: f64,

    pub g_l: f64,
    pub g_ampa: f64,
    pub g_gaba: f64,
    pub g_kna: f64,

    pub e_ampa: f64,
    pub e_gaba: f64,
    pub e_l_p: f64,
    pub e_l_i: f64,
    pub e_k: f64,

    pub dphi: f64,

    pub n_pp: f64,
    pub n_ip: f64,
    pub n_pi: f64,
    pub n_ii: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self::from_column_params(ColumnParams::default())
    }
}

impl Parameters {
    pub fn from_column_params(params: ColumnParams) -> Self {
        Self {
            tau_p: membrane::TAU_P,
            tau_i: membrane::TAU_I,

            qp_max: firing::QP_MAX,
            qi_max: firing::QI_MAX,
            theta_p: firing::THETA_P,
            theta_i: firing::THETA_I,
            sigma_p: params.sigma_p,
            sigma_i: firing::SIGMA_I,

            alpha_na: adaptation::ALPHA_NA,
            tau_na: adaptation::TAU_NA,
            r_pump: adaptation::R_PUMP,
            na_eq: adaptation::NA_EQ,

            gamma_e: synapse::GAMMA_E,
            gamma_g: synapse::GAMMA_G,

            g_l: conductance::G_L,
            g_ampa: conductance::G_AMPA,
            g_gaba: conductance::G_GABA,
            g_kna: params.g_kna,

            e_ampa: reversal::E_AMPA,
            e_gaba: reversal::E_GABA,
            e_l_p: reversal::E_L_P,
            e_l_i: reversal::E_L_I,
            e_k: reversal::E_K,

            dphi: params.dphi,

            n_pp: connectivity::N_PP,
            n_ip: connectivity::N_IP,
            n_pi: connectivity::N_PI,
            n_ii: connectivity::N_II,
        }
    }

    pub fn column_params(&self) -> ColumnParams {
        ColumnParams::new(self.sigma_p, self.g_kna, self.dphi)
    }

    pub fn connectivity_mut(&mut self, pathway: Pathway) -> &mut f64 {
        match pathway {
            Pathway::Pp => &mut self.n_pp,
            Pathway::Ip => &mut self.n_ip,
            Pathway::Pi => &mut self.n_pi,
            Pathway::Ii => &mut self.n_ii,
        }
    }
}

fn ensure_finite(name: &'static str, value: f64) -> Result<(), ParamError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParamError::NonFinite { name, value })
    }
}

pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<(), ParamError> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ParamError::NotPositive { name, value })
    }
}

pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<(), ParamError> {
    ensure_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ParamError::Negative { name, value })
    }
}
