//! Steep-front stroke source with a concave front.
//!
//! The waveshape is a Bezier fit through a fixed knot schedule: a concave
//! rise through the 10/30/90% points with the maximum steepness applied
//! around 90%, a flat crest, and exponential-tail knots at half-tau
//! spacing.

use openetran_core::{BezierFit, ETKONST, Pole};

const DX_LOW: f64 = 0.300;
const DX_HIGH: f64 = 0.005;
const DKNOT: f64 = 1.005;

pub struct SteepFront {
    pub pole: usize,
    pub from: usize,
    pub to: usize,

    pub peak: f64,
    pub front: f64,
    pub tail: f64,
    pub tstart: f64,
    /// Per-unit maximum steepness; the absolute steepness is
    /// pu_si * peak / front.
    pub pu_si: f64,
    pub si: f64,
    shape: BezierFit,
}

impl SteepFront {
    pub fn new(pole: usize, from: usize, to: usize, peak: f64, tf: f64, tt: f64, tstart: f64, pu_si: f64) -> SteepFront {
        let mut s = SteepFront {
            pole,
            from,
            to,
            peak: 0.0,
            front: 0.0,
            tail: 0.0,
            tstart: 0.0,
            pu_si,
            si: 0.0,
            shape: BezierFit::new(&[0.0, 1.0], &[0.0, 0.0], true),
        };
        s.move_to(pole, from, to, peak, tf, tt, tstart, pu_si);
        s
    }

    /// Rebuild the waveshape for a new target and stroke parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn move_to(&mut self, pole: usize, from: usize, to: usize, peak: f64, tf: f64, tt: f64, tstart: f64, pu_si: f64) {
        self.pole = pole;
        self.from = from;
        self.to = to;
        self.front = tf;
        self.tail = tt;
        self.tstart = tstart;
        self.peak = peak;
        self.pu_si = pu_si;
        let si = pu_si * peak / tf;
        self.si = si;

        let t10 = 0.78 * tf;
        let t30 = 1.16 * tf;
        let t90 = 1.76 * tf;
        let mut xpts = Vec::with_capacity(16);
        let mut ypts = Vec::with_capacity(16);
        xpts.push(0.0);
        ypts.push(0.0);
        xpts.push(t10);
        ypts.push(0.10 * peak);
        xpts.push(t30);
        ypts.push(0.30 * peak);
        xpts.push(t30 * DKNOT);
        ypts.push(0.30 * peak * DKNOT);
        let mut dx = DX_LOW * peak / si;
        xpts.push(t90 - dx);
        ypts.push((0.90 - DX_LOW) * peak);
        xpts.push(t90);
        ypts.push(0.90 * peak);
        dx = DX_HIGH * peak / si;
        xpts.push(t90 + dx);
        ypts.push((0.90 + DX_HIGH) * peak);
        let mut x = t90 + dx * 0.1 / DX_HIGH;
        xpts.push(x);
        ypts.push(peak);
        x *= 1.2;
        xpts.push(x);
        ypts.push(peak);
        let xstart = x;
        let t50 = tt - xstart;
        let tau = ETKONST * t50;
        let dxt = 0.5 * tau;
        for _ in 0..6 {
            x += dxt;
            xpts.push(x);
            ypts.push(peak * (-(x - xstart) / tau).exp());
        }
        x *= 10.0;
        xpts.push(x);
        ypts.push(peak * (-(x - xstart) / tau).exp());

        self.shape = BezierFit::new(&xpts, &ypts, false);
    }

    pub fn current(&self, t: f64) -> f64 {
        let x = t - self.tstart;
        if x > 0.0 { self.shape.eval(x) } else { 0.0 }
    }

    pub fn inject(&self, pole: &mut Pole, t: f64) {
        let x = t - self.tstart;
        if x > 0.0 {
            let i = self.shape.eval(x);
            pole.injection[self.from] += i;
            pole.injection[self.to] -= i;
        }
    }
}
