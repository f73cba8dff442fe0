//! Right-hand side of the column model.
//!
//! Every function here is pure in the stage values it receives; the
//! integrator decides which RK slot they come from.

use crate::neuro::column::{STATE_DIM, StateVar};
use crate::neuro::params::{Parameters, adaptation, firing};

/// Logistic firing-rate curve shared by both populations.
pub fn sigmoid(v: f64, q_max: f64, theta: f64, sigma: f64) -> f64 {
    q_max / (1.0 + (-firing::C1 * (v - theta) / sigma).exp())
}

impl Parameters {
    pub fn qp(&self, vp: f64) -> f64 {
        sigmoid(vp, self.qp_max, self.theta_p, self.sigma_p)
    }

    pub fn qi(&self, vi: f64) -> f64 {
        sigmoid(vi, self.qi_max, self.theta_i, self.sigma_i)
    }

    pub fn i_ep(&self, s_ep: f64, vp: f64) -> f64 {
        self.g_ampa * s_ep * (vp - self.e_ampa)
    }

    pub fn i_ei(&self, s_ei: f64, vi: f64) -> f64 {
        self.g_ampa * s_ei * (vi - self.e_ampa)
    }

    pub fn i_gp(&self, s_gp: f64, vp: f64) -> f64 {
        self.g_gaba * s_gp * (vp - self.e_gaba)
    }

    pub fn i_gi(&self, s_gi: f64, vi: f64) -> f64 {
        self.g_gaba * s_gi * (vi - self.e_gaba)
    }

    pub fn i_leak_p(&self, vp: f64) -> f64 {
        self.g_l * (vp - self.e_l_p)
    }

    pub fn i_leak_i(&self, vi: f64) -> f64 {
        self.g_l * (vi - self.e_l_i)
    }

    /// Sodium-dependent potassium current onto the excitatory population.
    pub fn i_kna(&self, na: f64, vp: f64) -> f64 {
        let w_kna = adaptation::W_KNA_MAX
            / (1.0 + (adaptation::W_KNA_HALF / na).powf(adaptation::W_KNA_HILL));
        self.g_kna * w_kna * (vp - self.e_k)
    }

    /// Net Na-K pump removal; zero at `na_eq`.
    pub fn na_pump(&self, na: f64) -> f64 {
        self.r_pump * (pump_fraction(na) - pump_fraction(self.na_eq))
    }

    /// Time derivative of every state variable at `y` under drive `input`.
    pub fn derivatives(&self, y: &[f64; STATE_DIM], input: f64) -> [f64; STATE_DIM] {
        use StateVar::*;

        let vp = y[Vp as usize];
        let vi = y[Vi as usize];
        let na = y[Na as usize];
        let s_ep = y[SEp as usize];
        let s_ei = y[SEi as usize];
        let s_gp = y[SGp as usize];
        let s_gi = y[SGi as usize];
        let x_ep = y[XEp as usize];
        let x_ei = y[XEi as usize];
        let x_gp = y[XGp as usize];
        let x_gi = y[XGi as usize];

        let qp = self.qp(vp);
        let qi = self.qi(vi);
        let ge2 = self.gamma_e * self.gamma_e;
        let gg2 = self.gamma_g * self.gamma_g;

        let mut dy = [0.0; STATE_DIM];
        dy[Vp as usize] = -(self.i_leak_p(vp) + self.i_ep(s_ep, vp) + self.i_gp(s_gp, vp))
            / self.tau_p
            - self.i_kna(na, vp);
        dy[Vi as usize] =
            -(self.i_leak_i(vi) + self.i_ei(s_ei, vi) + self.i_gi(s_gi, vi)) / self.tau_i;
        dy[Na as usize] = (self.alpha_na * qp - self.na_pump(na)) / self.tau_na;

        dy[SEp as usize] = x_ep;
        dy[SEi as usize] = x_ei;
        dy[SGp as usize] = x_gp;
        dy[SGi as usize] = x_gi;

        dy[XEp as usize] = ge2 * (self.n_pp * qp + input - s_ep) - 2.0 * self.gamma_e * x_ep;
        dy[XEi as usize] = ge2 * (self.n_ip * qp - s_ei) - 2.0 * self.gamma_e * x_ei;
        dy[XGp as usize] = gg2 * (self.n_pi * qi - s_gp) - 2.0 * self.gamma_g * x_gp;
        dy[XGi as usize] = gg2 * (self.n_ii * qi - s_gi) - 2.0 * self.gamma_g * x_gi;

        dy
    }
}

fn pump_fraction(na: f64) -> f64 {
    let na3 = na.powi(3);
    na3 / (na3 + adaptation::PUMP_SATURATION)
}
