//! Destructive-effect insulator flashover model.
//!
//! Integrates (|v| - vb)^beta * dT into separate positive and negative
//! accumulators so the model remembers both leaders across polarity
//! reversals. Reaching de_max on either side latches a flashover and
//! shorts the branch.

use openetran_core::{Pole, Y_SHORT};

pub struct Insulator {
    pub pole: usize,
    pub from: usize,
    pub to: usize,

    pub cfo: f64,
    vb: f64,
    beta: f64,
    de_max: f64,

    de_pos: f64,
    de_neg: f64,
    pub t_flash: f64,
    pub si: f64,
    pub flashed: bool,
}

impl Insulator {
    /// `vb` and `de` come from the input card normalized to CFO = 100 kV
    /// and are rescaled here.
    pub fn new(pole: usize, from: usize, to: usize, cfo: f64, vb: f64, beta: f64, de: f64) -> Insulator {
        let cfo = cfo.abs();
        Insulator {
            pole,
            from,
            to,
            cfo,
            vb: vb * cfo / 100.0e3,
            beta,
            de_max: de * (cfo / 100.0e3).powf(beta),
            de_pos: 0.0,
            de_neg: 0.0,
            t_flash: 0.0,
            si: 0.0,
            flashed: false,
        }
    }

    pub fn reset(&mut self) {
        self.de_pos = 0.0;
        self.de_neg = 0.0;
        self.t_flash = 0.0;
        self.si = 0.0;
        self.flashed = false;
    }

    /// Integrate the destructive effect for this step. Returns true on the
    /// step the insulator latches; the branch is shorted in the pole Ybus.
    /// Disabled while running on the second time step.
    pub fn check(&mut self, pole: &mut Pole, t: f64, dt: f64, dt_switched: bool) -> bool {
        if self.flashed || dt_switched {
            return false;
        }
        let volts = pole.branch_voltage(self.from, self.to);
        let mag = volts.abs() - self.vb;
        if mag > 0.0 {
            let de_inc = mag.powf(self.beta) * dt;
            if volts >= 0.0 {
                self.de_pos += de_inc;
            } else {
                self.de_neg += de_inc;
            }
        }
        if self.de_pos >= self.de_max || self.de_neg >= self.de_max {
            self.flashed = true;
            self.t_flash = t;
            pole.add_y(self.from, self.to, Y_SHORT);
            return true;
        }
        false
    }

    /// Final severity index; un-shorts the branch so a reset starts clean.
    pub fn answers_cleanup(&mut self, pole: &mut Pole) -> f64 {
        if self.flashed {
            self.si = 1.0;
            pole.add_y(self.from, self.to, -Y_SHORT);
        } else {
            let highest = self.de_pos.max(self.de_neg);
            self.si = (highest / self.de_max).powf(1.0 / self.beta);
        }
        self.si
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_wave_integrates_exactly() {
        // de = (A - vb)^beta * T for a square wave of amplitude A
        let beta: f64 = 1.36;
        let amp: f64 = 200.0e3;
        let vb: f64 = 1.5e5 * 0.77; // vb for CFO = 150 kV at the usual 77% ratio
        let duration: f64 = 2.0e-6;
        let de_max = (amp - vb).powf(beta) * duration;
        // card values are normalized to CFO = 100 kV; feed raw values by
        // passing cfo = 100 kV scale factors through
        let mut ins = Insulator::new(0, 1, 0, 100.0e3, vb, beta, de_max);

        let dt = 1.0e-8;
        let steps = (duration / dt).ceil() as usize;
        let mut p = Pole::new(1, 1);
        p.voltage[1] = amp;
        let mut flashed_at = None;
        for s in 0..steps + 2 {
            if ins.check(&mut p, s as f64 * dt, dt, false) {
                flashed_at = Some(s);
                break;
            }
        }
        // cumulative de crosses de_max at the expected step
        assert_eq!(flashed_at, Some(steps - 1));
    }

    #[test]
    fn polarity_keeps_separate_accumulators() {
        let mut ins = Insulator::new(0, 1, 0, 100.0e3, 0.0, 1.0, 1.0);
        let mut p = Pole::new(1, 1);
        p.voltage[1] = 100.0;
        ins.check(&mut p, 0.0, 1e-3, false);
        p.voltage[1] = -100.0;
        ins.check(&mut p, 1e-3, 1e-3, false);
        assert!((ins.de_pos - 0.1).abs() < 1e-12);
        assert!((ins.de_neg - 0.1).abs() < 1e-12);
        assert!(!ins.flashed);
    }

    #[test]
    fn flashover_shorts_and_cleanup_unshorts() {
        let mut ins = Insulator::new(0, 1, 0, 100.0e3, 0.0, 1.0, 1e-9);
        let mut p = Pole::new(1, 1);
        p.voltage[1] = 1000.0;
        assert!(ins.check(&mut p, 5e-6, 1e-5, false));
        assert!((p.ybus[(0, 0)] - Y_SHORT).abs() < 1e-12);
        let si = ins.answers_cleanup(&mut p);
        assert_eq!(si, 1.0);
        assert!(p.ybus[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn severity_index_below_threshold() {
        let beta = 2.0;
        let mut ins = Insulator::new(0, 1, 0, 100.0e3, 0.0, beta, 4.0);
        let mut p = Pole::new(1, 1);
        p.voltage[1] = 1.0;
        ins.check(&mut p, 0.0, 1.0, false); // de_pos = 1.0
        let si = ins.answers_cleanup(&mut p);
        assert!((si - (1.0f64 / 4.0).powf(0.5)).abs() < 1e-12);
    }

    #[test]
    fn disabled_after_dt_switch() {
        let mut ins = Insulator::new(0, 1, 0, 100.0e3, 0.0, 1.0, 1e-9);
        let mut p = Pole::new(1, 1);
        p.voltage[1] = 1e6;
        assert!(!ins.check(&mut p, 0.0, 1.0, true));
        assert!(!ins.flashed);
    }
}
