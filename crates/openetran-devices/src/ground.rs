//! Impulse ground: nonlinear soil-ionisation resistance in series with a
//! lead inductance.
//!
//! The linear network always sees R60 + the lead; a back-EMF bias current
//! makes the terminal voltage equal Ri * I, where Ri = R60 / sqrt(1 + I/Ig)
//! is the ionised resistance.

use openetran_core::{Pole, TWOPI};

pub struct Ground {
    pub pole: usize,
    pub from: usize,
    pub to: usize,

    pub r60: f64,
    y60: f64,
    /// Soil ionisation current, e0 * rho / (2 pi R60^2).
    pub ig: f64,
    /// Lead inductance, H (already multiplied by lead length).
    l: f64,
    zl: f64,
    /// Stamped admittance 1 / (R60 + 2L/dT).
    pub y: f64,
    yr: f64,
    yzl: f64,

    /// Current impulse resistance.
    pub ri: f64,
    h: f64,
    i: f64,
    i_bias: f64,
    /// Total branch current, monitored by IPG ammeters.
    pub amps: f64,
}

impl Ground {
    pub fn new(pole: usize, from: usize, to: usize, r60: f64, rho: f64, e0: f64, l: f64, dt: f64) -> Ground {
        let zl = 2.0 * l / dt;
        let y = 1.0 / (r60 + zl);
        let mut g = Ground {
            pole,
            from,
            to,
            r60,
            y60: 1.0 / r60,
            ig: e0 * rho / (TWOPI * r60 * r60),
            l,
            zl,
            y,
            yr: y * r60,
            yzl: y * zl,
            ri: r60,
            h: 0.0,
            i: 0.0,
            i_bias: 0.0,
            amps: 0.0,
        };
        g.reset();
        g
    }

    /// Stamp the linear admittance at the parent pole; call once at setup.
    pub fn stamp(&self, pole: &mut Pole) {
        pole.add_y(self.from, self.to, self.y);
        pole.solve = true;
    }

    pub fn reset(&mut self) {
        self.h = 0.0;
        self.i = 0.0;
        self.i_bias = 0.0;
        self.amps = 0.0;
        self.ri = self.r60;
    }

    /// Add the bias plus inductive history current at the pole.
    pub fn inject(&self, pole: &mut Pole) {
        pole.inject_branch(self.from, self.to, self.i);
    }

    /// Update the ionised resistance and the back-EMF for the next step,
    /// from this step's solved voltages.
    pub fn check(&mut self, pole: &Pole) {
        let vt = pole.branch_voltage(self.from, self.to);
        let it = vt * self.y + self.i;
        self.amps = it;
        self.ri = self.r60 / (1.0 + it.abs() / self.ig).sqrt();
        let vg = it * self.ri;
        self.i_bias = vg * (1.0 / self.ri - self.y60);
        let vl = vt - vg;
        if self.zl > 0.0 {
            self.h = it + vl / self.zl;
        }
        self.i = self.h * self.yzl + self.i_bias * self.yr;
    }

    /// Recompute companion values for a new time step and return the Ybus
    /// delta to stamp. History is transformed so the terminal current is
    /// continuous across the switch.
    pub fn change_dt(&mut self, pole: &Pole, dt: f64) -> f64 {
        let old_y = self.y;
        self.zl = 2.0 * self.l / dt;
        self.y = 1.0 / (self.r60 + self.zl);
        self.yr = self.y * self.r60;
        self.yzl = self.y * self.zl;

        let vt = pole.branch_voltage(self.from, self.to);
        let vg = self.amps * self.ri;
        let vl = vt - vg;
        if self.zl > 0.0 {
            self.h = self.amps + vl / self.zl;
        } else {
            self.h = 0.0;
        }
        self.i = self.h * self.yzl + self.i_bias * self.yr;
        self.y - old_y
    }

    /// Restore companion values for the original time step; returns the
    /// Ybus delta.
    pub fn restore_dt(&mut self, dt: f64) -> f64 {
        let old_y = self.y;
        self.zl = 2.0 * self.l / dt;
        self.y = 1.0 / (self.r60 + self.zl);
        self.yr = self.y * self.r60;
        self.yzl = self.y * self.zl;
        self.y - old_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solved_pole(v1: f64) -> Pole {
        let mut p = Pole::new(1, 1);
        p.voltage[1] = v1;
        p
    }

    #[test]
    fn ionisation_halves_resistance_at_three_ig() {
        // Ri = R60 / sqrt(1 + I/Ig); at I = 3 Ig it drops to R60/2
        let mut g = Ground::new(0, 1, 0, 10.0, 100.0, 400e3, 0.0, 1e-6);
        let i_test = 3.0 * g.ig;
        let p = solved_pole(i_test / g.y);
        g.check(&p);
        assert!((g.ri - 5.0).abs() / 5.0 < 1e-12);
    }

    #[test]
    fn bias_produces_ionised_terminal_voltage() {
        // with no lead inductance the back-EMF satisfies
        // R60 * (I - i_bias) = Ri * I, so the linear network using R60
        // still delivers the ionised ground voltage
        let mut g = Ground::new(0, 1, 0, 25.0, 100.0, 400e3, 0.0, 1e-6);
        let p = solved_pole(1000.0);
        g.check(&p);
        let it = g.amps;
        let vg = it * g.ri;
        assert!((25.0 * (it - g.i) - vg).abs() < 1e-6);
        assert!(g.ri < 25.0);
    }

    #[test]
    fn reset_restores_sixty_hertz_resistance() {
        let mut g = Ground::new(0, 1, 0, 10.0, 100.0, 400e3, 1e-6, 1e-7);
        let p = solved_pole(5e5);
        g.check(&p);
        assert!(g.ri < 10.0);
        g.reset();
        assert_eq!(g.ri, 10.0);
        assert_eq!(g.amps, 0.0);
    }
}
