//! Pole-top transformer, modelled as a series RL branch.
//!
//! The primary looks inductive to a lightning surge; the secondary-side
//! coupling is carried by the customer model.

use openetran_core::error::{Error, Result};
use openetran_core::{Pole, V_MIN};

pub struct Transformer {
    pub pole: usize,
    pub from: usize,
    pub to: usize,
    res: f64,
    ind: f64,
    pub y: f64,
    zi: f64,
    yi: f64,
    pub h: f64,
}

impl Transformer {
    pub fn new(pole: usize, from: usize, to: usize, res: f64, ind: f64, dt: f64) -> Transformer {
        let y = 1.0 / (res + 2.0 * ind / dt);
        Transformer {
            pole,
            from,
            to,
            res,
            ind,
            y,
            zi: 1.0 - 2.0 * res * y,
            yi: 2.0 * y * (1.0 - res * y),
            h: 0.0,
        }
    }

    pub fn stamp(&self, pole: &mut Pole) {
        pole.add_y(self.from, self.to, self.y);
        pole.solve = true;
    }

    pub fn reset(&mut self) {
        self.h = 0.0;
    }

    pub fn init_history(&mut self, vdc: f64) -> Result<()> {
        if vdc.abs() >= V_MIN {
            let denom = 1.0 - self.zi;
            if denom != 0.0 {
                self.h = vdc * self.yi / denom;
                log::warn!(
                    "lossy transformer from {} to {} has an initial dc voltage; results may be invalid",
                    self.from,
                    self.to
                );
            } else {
                return Err(Error::LosslessInductorDc {
                    from: self.from,
                    to: self.to,
                });
            }
        }
        Ok(())
    }

    pub fn inject(&self, pole: &mut Pole) {
        pole.inject_branch(self.from, self.to, self.h);
    }

    pub fn update(&mut self, pole: &Pole) {
        self.h = self.zi * self.h + self.yi * pole.branch_voltage(self.from, self.to);
    }

    pub fn change_dt(&mut self, pole: &Pole, dt: f64) -> f64 {
        let old_y = self.y;
        let vt = pole.branch_voltage(self.from, self.to);
        let it = old_y * vt + self.h;

        self.y = 1.0 / (self.res + 2.0 * self.ind / dt);
        self.yi = 2.0 * self.y * (1.0 - self.res * self.y);
        self.zi = 1.0 - 2.0 * self.res * self.y;
        self.h = self.y * ((2.0 * self.ind / dt - self.res) * it + vt);
        self.y - old_y
    }

    pub fn restore_dt(&mut self, dt: f64) -> f64 {
        let old_y = self.y;
        self.y = 1.0 / (self.res + 2.0 * self.ind / dt);
        self.yi = 2.0 * self.y * (1.0 - self.res * self.y);
        self.zi = 1.0 - 2.0 * self.res * self.y;
        self.y - old_y
    }
}
