//! Lightning stroke current source: 1-cosine front with an exponential
//! tail.

use openetran_core::{CFKONST, CTKONST, ETKONST, Pole, TWOPI};

pub struct Surge {
    pub pole: usize,
    pub from: usize,
    pub to: usize,

    pub peak: f64,
    pub front: f64,
    pub tail: f64,
    cfront: f64,
    #[allow(dead_code)]
    ctail: f64,
    tailadvance: f64,
    pub tstart: f64,
    tau: f64,
}

impl Surge {
    pub fn new(pole: usize, from: usize, to: usize, peak: f64, tf: f64, tt: f64, tstart: f64) -> Surge {
        let mut s = Surge {
            pole,
            from,
            to,
            peak: 0.0,
            front: 0.0,
            tail: 0.0,
            cfront: 0.0,
            ctail: 0.0,
            tailadvance: 0.0,
            tstart: 0.0,
            tau: 0.0,
        };
        s.move_to(pole, from, to, peak, tf, tt, tstart);
        s
    }

    /// Re-aim the stroke; used repeatedly by the critical-current driver.
    pub fn move_to(&mut self, pole: usize, from: usize, to: usize, peak: f64, tf: f64, tt: f64, tstart: f64) {
        self.pole = pole;
        self.from = from;
        self.to = to;
        self.front = tf;
        self.tail = tt;
        self.cfront = TWOPI / (CFKONST * tf);
        self.ctail = TWOPI / (CTKONST * tt);
        self.tailadvance = 0.5 * CFKONST * tf;
        self.tstart = tstart;
        self.tau = ETKONST * (tt - self.tailadvance);
        self.peak = peak;
    }

    /// Stroke current at simulation time `t`.
    pub fn current(&self, t: f64) -> f64 {
        let x = t - self.tstart;
        if x <= 0.0 {
            return 0.0;
        }
        if x > self.tailadvance {
            self.peak * (-(x - self.tailadvance) / self.tau).exp()
        } else {
            self.peak * 0.5 * (1.0 - (x * self.cfront).cos())
        }
    }

    pub fn inject(&self, pole: &mut Pole, t: f64) {
        let x = t - self.tstart;
        if x > 0.0 {
            let i = self.current(t);
            pole.injection[self.from] += i;
            pole.injection[self.to] -= i;
        }
    }

    /// Time of crest after onset.
    pub fn crest_time(&self) -> f64 {
        self.tailadvance
    }
}
