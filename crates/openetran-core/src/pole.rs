//! Per-pole nodal admittance structure.
//!
//! Node 0 is ground at every pole and is excluded from the matrix; the
//! `voltage` and `injection` vectors carry it at index 0, pinned to zero.
//! A pole with no shunts or sources keeps `solve == false` and only passes
//! travelling waves through.

use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::matrix::DenseLu;
use crate::Y_OPEN;

pub struct Pole {
    /// 1-based pole number along the feeder.
    pub location: usize,
    /// Number of solved nodes (ground excluded).
    pub nodes: usize,
    /// False until a shunt, source, or meter requires a nodal solution.
    pub solve: bool,
    /// True whenever `ybus` has been edited since the last factorization.
    pub dirty: bool,

    /// Nodal admittance matrix over nodes 1..=nodes.
    pub ybus: DMatrix<f64>,
    lu: Option<DenseLu>,

    /// Node voltages, length nodes+1, index 0 is ground.
    pub voltage: DVector<f64>,
    /// Injected nodal currents, length nodes+1, index 0 is ground.
    pub injection: DVector<f64>,
    /// Modal voltage workspace for the travelling-wave update.
    pub vmode: DVector<f64>,
    /// Modal current injections accumulated by the lines each step.
    pub imode: DVector<f64>,

    /// Node pairs of the nonlinear compensation ports, in registration order.
    pub ports: Vec<(usize, usize)>,
    /// Thevenin resistance matrix over the ports; rebuilt at factorization.
    pub rthev: DMatrix<f64>,
}

impl Pole {
    pub fn new(location: usize, nodes: usize) -> Pole {
        Pole {
            location,
            nodes,
            solve: false,
            dirty: true,
            ybus: DMatrix::zeros(nodes, nodes),
            lu: None,
            voltage: DVector::zeros(nodes + 1),
            injection: DVector::zeros(nodes + 1),
            vmode: DVector::zeros(nodes),
            imode: DVector::zeros(nodes),
            ports: Vec::new(),
            rthev: DMatrix::zeros(0, 0),
        }
    }

    pub fn num_nonlinear(&self) -> usize {
        self.ports.len()
    }

    /// Stamp a branch admittance between nodes `j` and `k` (0 = ground).
    pub fn add_y(&mut self, j: usize, k: usize, y: f64) {
        if j != 0 {
            self.ybus[(j - 1, j - 1)] += y;
        }
        if k != 0 {
            self.ybus[(k - 1, k - 1)] += y;
        }
        if j != 0 && k != 0 {
            self.ybus[(j - 1, k - 1)] -= y;
            self.ybus[(k - 1, j - 1)] -= y;
        }
        self.dirty = true;
    }

    /// Add a full admittance block (surge-impedance termination or line end).
    /// `m` may be smaller than the pole matrix when fewer conductors than
    /// nodes are defined; it lands in the upper-left corner.
    pub fn add_y_block(&mut self, m: &DMatrix<f64>) {
        let n = m.nrows();
        for i in 0..n {
            for j in 0..n {
                self.ybus[(i, j)] += m[(i, j)];
            }
        }
        self.dirty = true;
    }

    /// Register a nonlinear compensation port; returns its index.
    pub fn add_port(&mut self, from: usize, to: usize) -> usize {
        self.ports.push((from, to));
        self.solve = true;
        self.ports.len() - 1
    }

    /// Voltage across a branch; node 0 reads as zero.
    pub fn branch_voltage(&self, from: usize, to: usize) -> f64 {
        self.voltage[from] - self.voltage[to]
    }

    /// Subtract `i` from node `from` and add it to node `to` of the
    /// injection vector, the convention for a branch current flowing
    /// from -> to.
    pub fn inject_branch(&mut self, from: usize, to: usize, i: f64) {
        self.injection[from] -= i;
        self.injection[to] += i;
    }

    pub fn zero_injection(&mut self) {
        self.injection.fill(0.0);
        self.imode.fill(0.0);
    }

    /// Factor the Ybus if it is dirty, then rebuild the Thevenin reduction
    /// over the nonlinear ports. Zero or negative diagonals are replaced by
    /// a small open-circuit admittance so unused nodes stay regular.
    pub fn triangulate(&mut self) -> Result<()> {
        if !(self.dirty && self.solve) {
            return Ok(());
        }
        let mut work = self.ybus.clone();
        for i in 0..self.nodes {
            if work[(i, i)] <= 0.0 {
                work[(i, i)] = Y_OPEN;
            }
        }
        self.lu = Some(DenseLu::factor(work)?);
        if !self.ports.is_empty() {
            self.build_rthev()?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Rthev[i][j] = voltage across port i when unit current enters port j,
    /// from the factored Ybus.
    fn build_rthev(&mut self) -> Result<()> {
        let np = self.ports.len();
        let lu = self.lu.as_ref().expect("triangulate factors before build_rthev");
        let mut rcols = DMatrix::zeros(np, self.nodes);
        for (i, &(from, to)) in self.ports.iter().enumerate() {
            let mut rhs = DVector::zeros(self.nodes);
            if from > 0 {
                rhs[from - 1] = 1.0;
            }
            if to > 0 {
                rhs[to - 1] = -1.0;
            }
            lu.solve_in_place(&mut rhs)?;
            for j in 0..self.nodes {
                rcols[(i, j)] = rhs[j];
            }
        }
        let mut rthev = DMatrix::zeros(np, np);
        for i in 0..np {
            for (j, &(from, to)) in self.ports.iter().enumerate() {
                if from > 0 {
                    rthev[(i, j)] += rcols[(i, from - 1)];
                }
                if to > 0 {
                    rthev[(i, j)] -= rcols[(i, to - 1)];
                }
            }
        }
        self.rthev = rthev;
        Ok(())
    }

    /// Back-substitute the injection vector into node voltages. The ground
    /// entry stays zero by exclusion.
    pub fn solve_linear(&mut self) -> Result<()> {
        if !self.solve {
            return Ok(());
        }
        let lu = self
            .lu
            .as_ref()
            .expect("pole must be triangulated before solving");
        let mut rhs = DVector::from_fn(self.nodes, |i, _| self.injection[i + 1]);
        lu.solve_in_place(&mut rhs)?;
        for i in 0..self.nodes {
            self.voltage[i + 1] = rhs[i];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_y_is_symmetric() {
        let mut p = Pole::new(1, 3);
        p.add_y(1, 2, 0.5);
        p.add_y(3, 0, 2.0);
        assert_eq!(p.ybus[(0, 0)], 0.5);
        assert_eq!(p.ybus[(1, 1)], 0.5);
        assert_eq!(p.ybus[(0, 1)], -0.5);
        assert_eq!(p.ybus[(1, 0)], -0.5);
        assert_eq!(p.ybus[(2, 2)], 2.0);
        assert!(p.dirty);
    }

    #[test]
    fn solve_matches_injection() {
        // two shunts to ground, one branch between them
        let mut p = Pole::new(1, 2);
        p.solve = true;
        p.add_y(1, 0, 1.0);
        p.add_y(2, 0, 2.0);
        p.add_y(1, 2, 0.5);
        p.triangulate().unwrap();
        p.injection[1] = 3.0;
        p.injection[2] = -1.0;
        p.solve_linear().unwrap();
        // residual check: Ybus * v = i
        for row in 0..2 {
            let mut acc = 0.0;
            for col in 0..2 {
                acc += p.ybus[(row, col)] * p.voltage[col + 1];
            }
            assert!((acc - p.injection[row + 1]).abs() < 1e-9);
        }
        assert_eq!(p.voltage[0], 0.0);
    }

    #[test]
    fn unused_node_gets_open_guard() {
        let mut p = Pole::new(1, 2);
        p.solve = true;
        p.add_y(1, 0, 1.0);
        // node 2 has no connection at all; factoring must still succeed
        p.triangulate().unwrap();
        p.injection[1] = 1.0;
        p.solve_linear().unwrap();
        assert!((p.voltage[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rthev_matches_hand_solution() {
        // single node with y = 0.25 to ground; a port across it sees 4 ohms
        let mut p = Pole::new(1, 1);
        p.solve = true;
        p.add_y(1, 0, 0.25);
        p.add_port(1, 0);
        p.triangulate().unwrap();
        assert!((p.rthev[(0, 0)] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn rthev_couples_shared_nodes() {
        // two ports sharing node 1: y1 = 1.0 from node 1 to ground
        let mut p = Pole::new(1, 2);
        p.solve = true;
        p.add_y(1, 0, 1.0);
        p.add_y(2, 0, 2.0);
        p.add_port(1, 0);
        p.add_port(2, 0);
        p.triangulate().unwrap();
        assert!((p.rthev[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((p.rthev[(1, 1)] - 0.5).abs() < 1e-12);
        assert!(p.rthev[(0, 1)].abs() < 1e-12);
    }
}
