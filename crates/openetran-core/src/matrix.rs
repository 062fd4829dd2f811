//! Dense linear-algebra kernels.
//!
//! Pole matrices are small (at most 16x16), so everything here is dense.
//! The LU factorization is kept so a factored pole can be back-substituted
//! every time step without refactoring.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// A dense LU factorization with partial pivoting, reusable for repeated
/// back-substitution against the same matrix.
pub struct DenseLu {
    lu: nalgebra::linalg::LU<f64, nalgebra::Dyn, nalgebra::Dyn>,
    size: usize,
}

impl DenseLu {
    /// Factor a square matrix, consuming it.
    pub fn factor(a: DMatrix<f64>) -> Result<DenseLu> {
        if a.nrows() != a.ncols() {
            return Err(Error::SubscriptRange(format!(
                "LU of a {}x{} matrix",
                a.nrows(),
                a.ncols()
            )));
        }
        let size = a.nrows();
        let lu = a.lu();
        // A singular factorization only shows up at solve time in nalgebra,
        // so probe the diagonal of U here.
        for i in 0..size {
            if lu.u()[(i, i)].abs() == 0.0 {
                return Err(Error::MathCalc("singular matrix in LU factor".into()));
            }
        }
        Ok(DenseLu { lu, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Back-substitute in place: `b` comes in as the right-hand side and
    /// leaves as the solution.
    pub fn solve_in_place(&self, b: &mut DVector<f64>) -> Result<()> {
        if b.len() != self.size {
            return Err(Error::SubscriptRange(format!(
                "rhs length {} against LU size {}",
                b.len(),
                self.size
            )));
        }
        if self.lu.solve_mut(b) {
            Ok(())
        } else {
            Err(Error::MathCalc("singular matrix in back-substitution".into()))
        }
    }

    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        let mut x = b.clone();
        self.solve_in_place(&mut x)?;
        Ok(x)
    }
}

/// Invert a square matrix through LU.
pub fn invert(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    a.clone()
        .try_inverse()
        .ok_or_else(|| Error::MathCalc("singular matrix in inversion".into()))
}

/// Eigen-decompose a real symmetric matrix, with eigenvalues (and their
/// eigenvector columns) sorted ascending.
pub fn sym_eigen_sorted(a: &DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
    if a.nrows() != a.ncols() {
        return Err(Error::SubscriptRange(format!(
            "eigensolve of a {}x{} matrix",
            a.nrows(),
            a.ncols()
        )));
    }
    let n = a.nrows();
    let eig = nalgebra::SymmetricEigen::new(a.clone());

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eig.eigenvalues[i]
            .partial_cmp(&eig.eigenvalues[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let values = DVector::from_fn(n, |i, _| eig.eigenvalues[order[i]]);
    let vectors = DMatrix::from_fn(n, n, |i, j| eig.eigenvectors[(i, order[j])]);
    Ok((values, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn lu_solves_simple_system() {
        // 2x + y = 5, x + 3y = 6 -> x = 1.8, y = 1.4
        let a = dmatrix![2.0, 1.0; 1.0, 3.0];
        let b = dvector![5.0, 6.0];
        let lu = DenseLu::factor(a).unwrap();
        let x = lu.solve(&b).unwrap();
        assert!((x[0] - 1.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn lu_reports_singular() {
        let a = dmatrix![1.0, 2.0; 2.0, 4.0];
        assert!(matches!(DenseLu::factor(a), Err(Error::MathCalc(_))));
    }

    #[test]
    fn lu_solution_satisfies_residual_bound() {
        let n = 12;
        let a = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                n as f64 + 1.0
            } else {
                1.0 / ((i as f64 - j as f64).abs() + 1.0)
            }
        });
        let b = DVector::from_fn(n, |i, _| (i + 1) as f64);
        let lu = DenseLu::factor(a.clone()).unwrap();
        let x = lu.solve(&b).unwrap();
        let resid = (&a * &x - &b).abs().max();
        assert!(resid < 1e-9 * b.abs().max());
    }

    #[test]
    fn eigen_sorted_ascending_and_orthogonal() {
        let a = dmatrix![400.0, 150.0; 150.0, 400.0];
        let (vals, vecs) = sym_eigen_sorted(&a).unwrap();
        assert!((vals[0] - 250.0).abs() < 1e-9);
        assert!((vals[1] - 550.0).abs() < 1e-9);
        // columns reproduce A = V * diag * V^T
        let rebuilt = &vecs * DMatrix::from_diagonal(&vals) * vecs.transpose();
        assert!((rebuilt - a).abs().max() < 1e-9);
    }

    #[test]
    fn invert_round_trips() {
        let a = dmatrix![3.0, 1.0; 1.0, 2.0];
        let inv = invert(&a).unwrap();
        let ident = &a * inv;
        assert!((ident - DMatrix::<f64>::identity(2, 2)).abs().max() < 1e-12);
    }
}
