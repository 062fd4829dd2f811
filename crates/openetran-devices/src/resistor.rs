//! Linear shunt or branch resistor.

use openetran_core::{Pole, Y_SHORT};

pub struct Resistor {
    pub pole: usize,
    pub from: usize,
    pub to: usize,
    pub r: f64,
    pub y: f64,
}

impl Resistor {
    pub fn new(pole: usize, from: usize, to: usize, r: f64) -> Resistor {
        let y = if r != 0.0 { 1.0 / r } else { Y_SHORT };
        Resistor { pole, from, to, r, y }
    }

    pub fn stamp(&self, pole: &mut Pole) {
        pole.add_y(self.from, self.to, self.y);
        pole.solve = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ohms_stamps_a_short() {
        let r = Resistor::new(0, 1, 0, 0.0);
        assert_eq!(r.y, Y_SHORT);
    }
}
