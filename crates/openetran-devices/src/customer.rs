//! Customer service entrance: pole-top transformer secondary coupling and
//! house ground.
//!
//! The X2 bushing current is reconstructed from the house-ground current
//! and the time integral of the primary voltage,
//! Ix2 = 2 Ki Ihg + 2 Kv integral(V dt), with the coupling coefficients
//! derived from the transformer and service-drop geometry.

use openetran_core::{Pole, PRIM_L};

pub struct Customer {
    pub pole: usize,
    pub from: usize,
    pub to: usize,
    /// Index of the house ground spawned for this customer.
    pub ground: usize,

    /// 2 * Ki.
    ki: f64,
    /// 2 * Kv * dT.
    kv: f64,

    integral: f64,
    /// X2 current this step, monitored by IX2 ammeters.
    pub ix2: f64,
    pub ix2_peak: f64,
    /// Peak house-ground current.
    pub ihg: f64,
    /// Peak primary voltage.
    pub vp: f64,
}

/// Service-drop and transformer geometry, as read from the input card.
pub struct CustomerGeometry {
    /// Transformer turns ratio.
    pub n: f64,
    /// Primary inductance, H.
    pub lp: f64,
    /// Secondary leg inductances, H.
    pub ls1: f64,
    pub ls2: f64,
    /// Phase and neutral conductor radii, m.
    pub ra: f64,
    pub rn: f64,
    /// Phase-to-neutral and phase-to-phase spacings, m.
    pub dan: f64,
    pub daa: f64,
    /// Service-drop length, m.
    pub span: f64,
}

impl CustomerGeometry {
    /// Coupling coefficients (Ki, Kv) for the X2 current reconstruction.
    pub fn coupling(&self) -> (f64, f64) {
        let l = self.span;
        let la = PRIM_L * l * ((2.0 * l / self.ra).ln() - 1.0);
        let ln_ = PRIM_L * l * ((2.0 * l / self.rn).ln() - 1.0);
        let laa = PRIM_L * l * ((2.0 * l / self.daa).ln() - 1.0);
        let lan = PRIM_L * l * ((2.0 * l / self.dan).ln() - 1.0);
        let lfw = 4.0 * self.lp / self.n / self.n + self.ls1 + self.ls2;
        let denom = 0.5 * (self.ls1 + self.ls2) + la + 2.0 * ln_ + laa - 4.0 * lan
            - 0.5 * (self.ls1 - self.ls2) * (self.ls1 - self.ls2) / (lfw + 2.0 * la - 2.0 * laa);
        let ki = (ln_ - lan) / denom;
        let kv = (self.ls2 - self.ls1) / self.n / (lfw + 2.0 * la - 2.0 * laa) / denom;
        (ki, kv)
    }
}

impl Customer {
    pub fn new(pole: usize, from: usize, to: usize, ground: usize, ki: f64, kv: f64, dt: f64) -> Customer {
        Customer {
            pole,
            from,
            to,
            ground,
            ki: 2.0 * ki,
            kv: 2.0 * kv * dt,
            integral: 0.0,
            ix2: 0.0,
            ix2_peak: 0.0,
            ihg: 0.0,
            vp: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.ix2 = 0.0;
        self.ihg = 0.0;
        self.vp = 0.0;
        self.integral = 0.0;
        self.ix2_peak = 0.0;
    }

    /// Integrate the primary voltage and track peaks; `hg_amps` is the
    /// house-ground current solved this step.
    pub fn update(&mut self, pole: &Pole, hg_amps: f64) {
        let v = pole.branch_voltage(self.from, self.to);
        self.integral += v * self.kv;
        let i_new = self.ki * hg_amps + self.integral;
        if hg_amps.abs() > self.ihg.abs() {
            self.ihg = hg_amps;
        }
        if v.abs() > self.vp.abs() {
            self.vp = v;
        }
        if i_new.abs() > self.ix2_peak.abs() {
            self.ix2_peak = i_new;
        }
        self.ix2 = i_new;
    }

    /// The integral constant scales with dT across a time-step switch.
    pub fn change_dt(&mut self, dt_ratio_new_over_old: f64) {
        self.kv *= dt_ratio_new_over_old;
    }
}
