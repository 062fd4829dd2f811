//! Travelling-wave line between two poles.
//!
//! Each line owns two history-current matrices, one per direction, with
//! one column per time step of travel time. The column index cycles:
//! the entry read at step k was written a full transit earlier, which is
//! the whole of the Bergeron method.

use nalgebra::DMatrix;
use openetran_core::Pole;

use crate::span::Span;

pub struct Line {
    /// Pole arena indices of the two ends.
    pub left: usize,
    pub right: usize,
    /// Span arena index with the impedances and transformations.
    pub span: usize,

    /// Travel steps in use; collapses to 1 under the second time step.
    pub steps: usize,
    alloc_steps: usize,
    /// History currents for waves travelling left-to-right.
    hist_left: DMatrix<f64>,
    /// History currents for waves travelling right-to-left.
    hist_right: DMatrix<f64>,
}

impl Line {
    pub fn new(left: usize, right: usize, span: usize, conductors: usize, travel_steps: usize) -> Line {
        let steps = travel_steps.max(1);
        Line {
            left,
            right,
            span,
            steps,
            alloc_steps: steps,
            hist_left: DMatrix::zeros(conductors, steps),
            hist_right: DMatrix::zeros(conductors, steps),
        }
    }

    /// Preload every slot with the dc current that sustains the span's
    /// initial voltage (trapped charge).
    pub fn init_history(&mut self, span: &Span) {
        for i in 0..span.conductors {
            let idc = -span.ym[(i, i)] * span.vm[i];
            for j in 0..self.alloc_steps {
                self.hist_left[(i, j)] = idc;
                self.hist_right[(i, j)] = idc;
            }
        }
    }

    /// Subtract this step's history column from both poles' modal
    /// injections (non-network path; the modal-to-phase conversion happens
    /// once per pole afterwards).
    pub fn inject_imode(&self, left: &mut Pole, right: &mut Pole, step: usize) {
        let k = step % self.steps;
        for i in 0..self.hist_left.nrows() {
            left.imode[i] -= self.hist_left[(i, k)];
            right.imode[i] -= self.hist_right[(i, k)];
        }
    }

    /// Convert this step's history column to phase coordinates through the
    /// line's own span and add it to the pole injections (network path).
    pub fn inject_iphase(&self, span: &Span, left: &mut Pole, right: &mut Pole, step: usize) {
        let k = step % self.steps;
        for (pole, hist) in [(left, &self.hist_left), (right, &self.hist_right)] {
            for i in 0..span.conductors {
                pole.imode[i] = -hist[(i, k)];
            }
            for row in 0..span.conductors {
                let mut acc = 0.0;
                for col in 0..span.conductors {
                    acc += span.ti[(row, col)] * pole.imode[col];
                }
                pole.injection[row + 1] += acc;
            }
        }
    }

    /// Write the next history column from the solved modal voltages at the
    /// two ends (lossless Bergeron relation).
    pub fn update_history(&mut self, span: &Span, vl: &nalgebra::DVector<f64>, vr: &nalgebra::DVector<f64>, step: usize) {
        let k = step % self.steps;
        for i in 0..span.conductors {
            let y = span.ym[(i, i)];
            let ilr = vl[i] * y + self.hist_left[(i, k)];
            let irl = vr[i] * y + self.hist_right[(i, k)];
            self.hist_left[(i, k)] = -vr[i] * y - irl;
            self.hist_right[(i, k)] = -vl[i] * y - ilr;
        }
    }

    /// Network path: convert both poles' phase voltages to this line's
    /// modes, then update the history column.
    pub fn update_vmode_and_history(&mut self, span: &Span, left: &mut Pole, right: &mut Pole, step: usize) {
        for pole in [&mut *left, &mut *right] {
            for row in 0..span.conductors {
                let mut acc = 0.0;
                for col in 0..span.conductors {
                    acc += span.tvt[(row, col)] * pole.voltage[col + 1];
                }
                pole.vmode[row] = acc;
            }
        }
        let vl = left.vmode.clone();
        let vr = right.vmode.clone();
        self.update_history(span, &vl, &vr, step);
    }

    /// Collapse the circular buffer into slot 0 for the second time step.
    pub fn collapse(&mut self, step: usize) {
        let k = step % self.steps;
        for i in 0..self.hist_left.nrows() {
            self.hist_left[(i, 0)] = self.hist_left[(i, k)];
            self.hist_right[(i, 0)] = self.hist_right[(i, k)];
        }
        self.steps = 1;
    }

    /// Reinstate the full travel time after a restore.
    pub fn restore(&mut self) {
        self.steps = self.alloc_steps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    fn single_span() -> Span {
        Span::from_cables(1, 1, &[(0, 300.0, 3.0e8, 0.0)]).unwrap()
    }

    #[test]
    fn history_delay_equals_travel_steps() {
        let span = single_span();
        let steps = 5;
        let mut line = Line::new(0, 1, 0, 1, steps);
        line.init_history(&span);

        // write a marker at step 2, then watch it come back steps later
        let vl = nalgebra::dvector![300.0];
        let vr = nalgebra::dvector![0.0];
        line.update_history(&span, &vl, &vr, 2);
        // hist_right[0, 2] carries the left-end wave: -v y - (v y + 0)
        assert!((line.hist_right[(0, 2)] + 2.0).abs() < 1e-12);

        // at step 2 + steps the same column is read again
        let mut pl = Pole::new(1, 1);
        let mut pr = Pole::new(2, 1);
        line.inject_imode(&mut pl, &mut pr, 2 + steps);
        assert!((pr.imode[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn trapped_charge_preloads_dc_current() {
        let span = Span::from_cables(1, 1, &[(0, 50.0, 3.0e8, 100.0)]).unwrap();
        let mut line = Line::new(0, 1, 0, 1, 3);
        line.init_history(&span);
        // idc = -vm / z
        assert!((line.hist_left[(0, 1)] + 100.0 / 50.0).abs() < 1e-12);
    }

    #[test]
    fn collapse_and_restore_cycle() {
        let span = single_span();
        let mut line = Line::new(0, 1, 0, 1, 4);
        line.init_history(&span);
        line.hist_left[(0, 3)] = 7.0;
        line.collapse(3); // step 3 -> slot 3 copied to slot 0
        assert_eq!(line.steps, 1);
        assert_eq!(line.hist_left[(0, 0)], 7.0);
        line.restore();
        assert_eq!(line.steps, 4);
    }
}
