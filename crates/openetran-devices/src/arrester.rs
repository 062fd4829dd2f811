//! Gapped piecewise-linear arrester.
//!
//! A two-state machine: non-conducting until the gap sparks over at v_gap,
//! then a single V-I slope r_slope (offset by the knee bias) in series with
//! a lead inductance. Conduction clears as soon as the voltage across the
//! V-I segment falls below v_knee. A state change edits the pole Ybus and
//! forces a re-solve of the current step.

use openetran_core::Pole;

pub struct Arrester {
    pub pole: usize,
    pub from: usize,
    pub to: usize,

    v_knee: f64,
    v_gap: f64,
    r_slope: f64,
    knee_bias: f64,
    gap_bias: f64,
    /// Lead inductance, H.
    l: f64,
    zl: f64,
    /// Conducting-branch admittance 1 / (r_slope + 2L/dT).
    pub y: f64,
    yr: f64,
    yzl: f64,

    i_bias: f64,
    pub conducting: bool,
    h: f64,
    i: f64,
    i_past: f64,
    /// Discharge current this step, monitored by IARR ammeters.
    pub amps: f64,

    pub t_start: f64,
    pub t_peak: f64,
    pub i_peak: f64,
    pub energy: f64,
    pub charge: f64,

    /// Transitions taken within the current step's re-solve loop; a second
    /// one indicates the state machine is oscillating.
    pub transitions: u8,
}

impl Arrester {
    pub fn new(
        pole: usize,
        from: usize,
        to: usize,
        v_gap: f64,
        v_knee: f64,
        r_slope: f64,
        l: f64,
        dt: f64,
    ) -> Arrester {
        let v_knee = v_knee.abs();
        let r_slope = r_slope.abs();
        let v_gap = if v_gap < v_knee { v_knee } else { v_gap };
        let zl = 2.0 * l / dt;
        let y = 1.0 / (r_slope + zl);
        let mut a = Arrester {
            pole,
            from,
            to,
            v_knee,
            v_gap,
            r_slope,
            knee_bias: v_knee / r_slope,
            gap_bias: v_gap / r_slope,
            l,
            zl,
            y,
            yr: y * r_slope,
            yzl: y * zl,
            i_bias: 0.0,
            conducting: false,
            h: 0.0,
            i: 0.0,
            i_past: 0.0,
            amps: 0.0,
            t_start: 0.0,
            t_peak: 0.0,
            i_peak: 0.0,
            energy: 0.0,
            charge: 0.0,
            transitions: 0,
        };
        a.reset();
        a
    }

    pub fn reset(&mut self) {
        self.i_bias = self.gap_bias;
        self.t_start = 0.0;
        self.t_peak = 0.0;
        self.energy = 0.0;
        self.charge = 0.0;
        self.i_peak = 0.0;
        self.h = 0.0;
        self.i = 0.0;
        self.i_past = 0.0;
        self.amps = 0.0;
        self.conducting = false;
        self.transitions = 0;
    }

    /// Add the arrester injection at the pole, if conducting.
    pub fn inject(&self, pole: &mut Pole) {
        if self.conducting {
            pole.inject_branch(self.from, self.to, self.i_past);
        }
    }

    /// Look for sparkover or clearing against this step's solution.
    /// Returns true when the state changed (the pole Ybus was edited and
    /// the step must be re-solved).
    pub fn check(&mut self, pole: &mut Pole, t: f64, dt: f64) -> bool {
        let volts = pole.branch_voltage(self.from, self.to);
        let pos_now = volts > 0.0;
        let mut changed = false;

        if self.conducting {
            let amps = volts * self.y + self.i_past;
            self.amps = amps;
            let vr = if pos_now {
                self.r_slope * (amps + self.i_bias)
            } else {
                self.r_slope * (amps - self.i_bias)
            };
            self.i_bias = self.knee_bias;
            let vl = volts - vr;
            self.energy += dt * amps * vr;
            self.charge += dt * amps;
            if self.zl > 0.0 {
                self.h = amps + vl / self.zl;
            }
            self.i = self.h * self.yzl;
            if pos_now {
                self.i -= self.yr * self.i_bias;
            } else {
                self.i += self.yr * self.i_bias;
            }
            if amps.abs() > self.i_peak.abs() {
                self.i_peak = amps;
                self.t_peak = t;
            }
            if vr.abs() < self.v_knee {
                // dropped below the knee - stop conduction
                self.conducting = false;
                self.transitions += 1;
                pole.add_y(self.from, self.to, -self.y);
                self.h = 0.0;
                self.i = 0.0;
                changed = true;
            }
        } else if volts.abs() > self.v_gap {
            self.conducting = true;
            self.transitions += 1;
            pole.add_y(self.from, self.to, self.y);
            self.i_bias = self.gap_bias;
            self.i = if pos_now {
                -self.yr * self.i_bias
            } else {
                self.yr * self.i_bias
            };
            self.i_past = self.i; // injection takes effect on the re-solve
            if self.t_start < dt {
                self.t_start = t;
            }
            changed = true;
        }
        changed
    }

    pub fn update_history(&mut self) {
        self.i_past = self.i;
    }

    /// Remove the conducting stamp at end-of-run so a reset starts from a
    /// clean Ybus; fold discharge duty into the running maxima.
    pub fn answers_cleanup(&mut self, pole: &mut Pole) {
        if self.conducting {
            pole.add_y(self.from, self.to, -self.y);
            self.conducting = false;
        }
    }

    /// Recompute companion values for a new dT. If conducting, the Ybus
    /// edit and the history transform happen here.
    pub fn change_dt(&mut self, pole: &mut Pole, dt: f64) {
        let old_y = self.y;
        self.zl = 2.0 * self.l / dt;
        self.y = 1.0 / (self.r_slope + self.zl);
        self.yr = self.y * self.r_slope;
        self.yzl = self.y * self.zl;
        if self.conducting {
            pole.add_y(self.from, self.to, self.y - old_y);
            let volts = pole.branch_voltage(self.from, self.to);
            let pos_now = volts > 0.0;
            let vr = if pos_now {
                self.r_slope * (self.amps + self.i_bias)
            } else {
                self.r_slope * (self.amps - self.i_bias)
            };
            let vl = volts - vr;
            if self.zl > 0.0 {
                self.h = self.amps + vl / self.zl;
            }
            self.i = self.h * self.yzl;
            if pos_now {
                self.i -= self.yr * self.i_bias;
            } else {
                self.i += self.yr * self.i_bias;
            }
            self.i_past = self.i;
        }
    }

    pub fn restore_dt(&mut self, dt: f64) {
        self.zl = 2.0 * self.l / dt;
        self.y = 1.0 / (self.r_slope + self.zl);
        self.yr = self.y * self.r_slope;
        self.yzl = self.y * self.zl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pole_with_voltage(v: f64) -> Pole {
        let mut p = Pole::new(1, 1);
        p.solve = true;
        p.voltage[1] = v;
        p
    }

    #[test]
    fn stays_off_below_gap_voltage() {
        let mut a = Arrester::new(0, 1, 0, 40e3, 30e3, 1.0, 0.0, 1e-9);
        let mut p = pole_with_voltage(39e3);
        assert!(!a.check(&mut p, 1e-9, 1e-9));
        assert!(!a.conducting);
        assert_eq!(p.ybus[(0, 0)], 0.0);
    }

    #[test]
    fn sparks_over_above_gap_and_stamps_y() {
        let dt = 1e-9;
        let mut a = Arrester::new(0, 1, 0, 40e3, 30e3, 1.0, 0.0, dt);
        let mut p = pole_with_voltage(41e3);
        assert!(a.check(&mut p, 5.0 * dt, dt));
        assert!(a.conducting);
        assert!((p.ybus[(0, 0)] - a.y).abs() < 1e-12);
        assert_eq!(a.t_start, 5.0 * dt);
        // negative-polarity sparkover biases the other way
        let mut b = Arrester::new(0, 1, 0, 40e3, 30e3, 1.0, 0.0, dt);
        let mut pn = pole_with_voltage(-41e3);
        assert!(b.check(&mut pn, dt, dt));
        assert!(b.i > 0.0);
    }

    #[test]
    fn clears_when_segment_voltage_drops_below_knee() {
        let dt = 1e-9;
        let mut a = Arrester::new(0, 1, 0, 40e3, 30e3, 1.0, 0.0, dt);
        let mut p = pole_with_voltage(41e3);
        a.check(&mut p, dt, dt);
        a.update_history();
        // tail: voltage collapses, current reverses through the knee
        p.voltage[1] = 1e3;
        a.check(&mut p, 2.0 * dt, dt);
        assert!(!a.conducting);
        assert!(p.ybus[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn accumulates_energy_and_charge_while_conducting() {
        let dt = 1e-6;
        let mut a = Arrester::new(0, 1, 0, 40e3, 30e3, 1.0, 0.0, dt);
        let mut p = pole_with_voltage(50e3);
        a.check(&mut p, dt, dt); // sparkover
        a.update_history();
        a.check(&mut p, 2.0 * dt, dt); // conducting pass
        assert!(a.energy > 0.0);
        assert!(a.charge > 0.0);
        assert!(a.i_peak.abs() > 0.0);
    }
}
