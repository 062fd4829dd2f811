//! Constant current source sustaining power-frequency offsets.
//!
//! Created for surge-impedance terminations (Yp * vp_offset) and for
//! resistors whose nodes carry an initial dc voltage.

use nalgebra::DVector;
use openetran_core::Pole;

pub struct DcSource {
    pub pole: usize,
    /// Per-node currents over nodes 1..=nodes (0-based storage).
    pub val: DVector<f64>,
}

impl DcSource {
    pub fn new(pole: usize, val: DVector<f64>) -> DcSource {
        DcSource { pole, val }
    }

    pub fn inject(&self, pole: &mut Pole) {
        for i in 0..self.val.len() {
            pole.injection[i + 1] += self.val[i];
        }
    }
}
