//! Leader-progression flashover model.
//!
//! Two counter-propagating leaders shorten the remaining gap at
//! dx = |v| k dT (|v|/x - e0) whenever the drive exceeds the inception
//! gradient and the polarity matches. Every step's voltage is kept in a
//! replay buffer so the severity index of a non-flashing run can be found
//! afterwards by bisecting a voltage scale factor.

use openetran_core::{Pole, Y_SHORT};

const SCALE_TOLERANCE: f64 = 0.0001;
const MAX_SCALE: f64 = 100.0;
const MIN_SCALE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    NotFlashed,
    Flashed,
    /// Keep recording the waveshape and peaks but never latch.
    Disabled,
}

pub struct Lpm {
    pub pole: usize,
    pub from: usize,
    pub to: usize,

    pub cfo: f64,
    e0: f64,
    k: f64,
    /// Gap length, m: CFO / 560 kV/m.
    d: f64,

    xpos: f64,
    xneg: f64,
    vpk_pos: f64,
    vpk_neg: f64,
    pub t_flash: f64,
    pub si: f64,
    pub mode: FlashMode,
    disable_flash: bool,

    /// Per-step voltage replay for the post-run severity bisection.
    pts: Vec<f32>,
}

impl Lpm {
    pub fn new(pole: usize, from: usize, to: usize, cfo: f64, e0: f64, k: f64) -> Lpm {
        let disable_flash = cfo < 0.0;
        let cfo = cfo.abs();
        let mut lpm = Lpm {
            pole,
            from,
            to,
            cfo,
            e0,
            k,
            d: 0.0,
            xpos: 0.0,
            xneg: 0.0,
            vpk_pos: 0.0,
            vpk_neg: 0.0,
            t_flash: 0.0,
            si: 0.0,
            mode: FlashMode::NotFlashed,
            disable_flash,
            pts: Vec::new(),
        };
        lpm.reset(0.0, 1.0);
        lpm
    }

    /// Reallocate the replay buffer for a run of tmax/dt steps and zero the
    /// leader state.
    pub fn reset(&mut self, tmax: f64, dt: f64) {
        let nsteps = (tmax / dt) as usize + 2;
        self.d = self.cfo / 560.0e3;
        self.xpos = self.d;
        self.xneg = self.d;
        self.t_flash = 0.0;
        self.vpk_pos = 0.0;
        self.vpk_neg = 0.0;
        self.si = 0.0;
        self.mode = if self.disable_flash {
            FlashMode::Disabled
        } else {
            FlashMode::NotFlashed
        };
        self.pts.clear();
        self.pts.resize(nsteps, 0.0);
    }

    /// Advance the leaders for this step and record the voltage. Returns
    /// true on the step a flashover latches.
    pub fn check(&mut self, pole: &mut Pole, t: f64, dt: f64, step: usize, dt_switched: bool) -> bool {
        // the replay buffer is sized for the first dT only
        if dt_switched {
            return false;
        }
        if self.mode == FlashMode::Flashed {
            return false;
        }
        let volts = pole.branch_voltage(self.from, self.to);
        if step < self.pts.len() {
            self.pts[step] = volts as f32;
        }
        let (sign, x) = if volts > 0.0 {
            (1, self.xpos)
        } else if volts < 0.0 {
            (-1, self.xneg)
        } else {
            // no voltage means no leader propagation
            return false;
        };
        let vmag = volts.abs();
        let ds = vmag * self.k * dt;
        let ds2 = ds * vmag / x;
        let dx = ds2 - ds * self.e0;
        if sign > 0 {
            if dx > 0.0 {
                self.xpos -= dx;
            }
            if vmag > self.vpk_pos {
                self.vpk_pos = vmag;
            }
        } else {
            if dx > 0.0 {
                self.xneg -= dx;
            }
            if vmag > self.vpk_neg {
                self.vpk_neg = vmag;
            }
        }
        if self.mode == FlashMode::Disabled {
            return false;
        }
        if self.xpos <= 0.0 || self.xneg <= 0.0 {
            self.mode = FlashMode::Flashed;
            self.t_flash = t;
            pole.add_y(self.from, self.to, Y_SHORT);
            return true;
        }
        false
    }

    /// Replay the recorded voltages scaled by `scale`; true if the scaled
    /// run would flash over.
    fn flashes_over(&self, scale: f64, nsteps: usize, dt: f64) -> bool {
        let mut sign = 0;
        let mut x = 1.0;
        let mut xpos = self.d;
        let mut xneg = self.d;
        for i in 0..nsteps.min(self.pts.len()) {
            let mut volts = scale * self.pts[i] as f64;
            if volts > 0.0 {
                sign = 1;
                x = xpos;
            } else if volts < 0.0 {
                sign = -1;
                x = xneg;
            }
            volts = volts.abs();
            let ds = volts * self.k * dt;
            let ds2 = ds * volts / x;
            let dx = ds2 - ds * self.e0;
            if sign > 0 && dx > 0.0 {
                xpos -= dx;
            } else if dx > 0.0 {
                xneg -= dx;
            }
            if xpos <= 0.0 || xneg <= 0.0 {
                return true;
            }
        }
        false
    }

    /// Severity index by bisection over a voltage scale factor:
    /// SI = 1/s where s is the smallest scale that just causes flashover
    /// in a replay of the recorded trace.
    pub fn calculate_si(&self, tmax: f64, dt: f64) -> f64 {
        let nsteps = (tmax / dt) as usize + 1;
        if self.mode == FlashMode::Flashed {
            return 1.0;
        }
        if self.vpk_pos <= 0.0 && self.vpk_neg <= 0.0 {
            return 0.0;
        }
        // bracket the root
        let mut scale_low = 1.0;
        let mut scale_high = 1.0;
        while scale_low > MIN_SCALE && self.flashes_over(scale_low, nsteps, dt) {
            scale_low *= 0.5;
        }
        while scale_high < MAX_SCALE && !self.flashes_over(scale_high, nsteps, dt) {
            scale_high *= 2.0;
        }
        while scale_high - scale_low > SCALE_TOLERANCE {
            let scale_mid = 0.5 * (scale_high + scale_low);
            if self.flashes_over(scale_mid, nsteps, dt) {
                scale_high = scale_mid;
            } else {
                scale_low = scale_mid;
            }
        }
        1.0 / (0.5 * (scale_high + scale_low))
    }

    /// Cheap severity estimate without the bisection.
    pub fn estimate_si(&self) -> f64 {
        const SI_FOR_FO_STARTED: f64 = 0.9999;
        if self.mode == FlashMode::Flashed {
            return 1.0;
        }
        let si_pos = if self.xpos < self.d {
            SI_FOR_FO_STARTED
        } else if self.vpk_pos > 0.0 {
            self.vpk_pos / self.cfo
        } else {
            0.0
        };
        let si_neg = if self.xneg < self.d {
            SI_FOR_FO_STARTED
        } else if self.vpk_neg > 0.0 {
            self.vpk_neg / self.cfo
        } else {
            0.0
        };
        si_pos.max(si_neg)
    }

    /// Final severity index; un-shorts the branch after a flashover.
    pub fn answers_cleanup(&mut self, pole: &mut Pole, want_si_calculation: bool, tmax: f64, dt: f64) -> f64 {
        if self.mode == FlashMode::Flashed {
            self.si = 1.0;
            pole.add_y(self.from, self.to, -Y_SHORT);
        } else if want_si_calculation {
            self.si = self.calculate_si(tmax, dt);
        } else {
            self.si = self.estimate_si();
        }
        self.si
    }
}
