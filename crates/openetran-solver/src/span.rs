//! Multi-conductor span definition and modal decomposition.
//!
//! From conductor geometry the span builds the surge-impedance matrix
//! Zp[i][i] = 60 ln(2 y_i / r_i),
//! Zp[i][j] = 60 ln(sqrt(dx^2 + (y_i + y_j)^2) / sqrt(dx^2 + dy^2)),
//! then eigen-decomposes it into independent modes: Ti holds the
//! eigenvectors (ascending eigenvalue order), Tvt = Ti^-1 maps phase
//! voltages to modal, and Zm = Ti^T Zp Ti is diagonal to within roundoff.
//! Cable spans bypass the eigensolve with a diagonal definition.

use nalgebra::{DMatrix, DVector};
use openetran_core::error::{Error, Result};
use openetran_core::matrix::{invert, sym_eigen_sorted};
use openetran_core::LIGHT;

pub struct Span {
    pub id: i64,
    /// Conductors in this span (may be fewer than pole nodes).
    pub conductors: usize,

    /// Phase surge-impedance matrix and its inverse.
    pub zp: DMatrix<f64>,
    pub yp: DMatrix<f64>,
    /// Modal impedance (diagonal) and its inverse.
    pub zm: DMatrix<f64>,
    pub ym: DMatrix<f64>,
    /// Modal current -> phase current.
    pub ti: DMatrix<f64>,
    pub tit: DMatrix<f64>,
    pub tv: DMatrix<f64>,
    /// Phase voltage -> modal voltage.
    pub tvt: DMatrix<f64>,

    /// Initial power-frequency phase voltages.
    pub vp_offset: DVector<f64>,
    /// The same offsets in modal coordinates.
    pub vm: DVector<f64>,

    pub wave_velocity: f64,
}

impl Span {
    /// Build a span from overhead-conductor geometry. Slices are indexed
    /// by conductor, all the same length.
    pub fn from_geometry(
        id: i64,
        x: &[f64],
        height: &[f64],
        radius: &[f64],
        voltage: &[f64],
    ) -> Result<Span> {
        let n = x.len();
        for i in 0..n {
            if radius[i] <= 0.0 {
                return Err(Error::BadRadius {
                    index: i,
                    radius: radius[i],
                });
            }
            if height[i] <= 0.0 {
                return Err(Error::BadHeight {
                    index: i,
                    height: height[i],
                });
            }
        }

        let mut zp = DMatrix::zeros(n, n);
        for i in 0..n {
            zp[(i, i)] = 60.0 * (2.0 * height[i] / radius[i]).ln();
            for j in i + 1..n {
                let dx = x[i] - x[j];
                let dy = height[i] - height[j];
                if dx.abs() < 0.001 && dy.abs() < 0.001 {
                    return Err(Error::OverlappingConductors { i, j });
                }
                let hs = height[i] + height[j];
                let z = 60.0 * ((dx * dx + hs * hs).sqrt() / (dx * dx + dy * dy).sqrt()).ln();
                zp[(i, j)] = z;
                zp[(j, i)] = z;
            }
        }

        let (_lambda, ti) = sym_eigen_sorted(&zp)?;
        let tit = ti.transpose();
        let tvt = invert(&ti)?;
        let tv = tvt.transpose();
        let zm = &tit * &zp * &ti;
        let yp = invert(&zp)?;
        let ym = invert(&zm)?;

        let vp_offset = DVector::from_column_slice(voltage);
        let vm = &tvt * &vp_offset;

        Ok(Span {
            id,
            conductors: n,
            zp,
            yp,
            zm,
            ym,
            ti,
            tit,
            tv,
            tvt,
            vp_offset,
            vm,
            wave_velocity: LIGHT,
        })
    }

    /// Build an uncoupled span from per-cable surge impedances. `cables`
    /// holds (0-based index, Zs, v_prop, vpf); `n` is the node count.
    pub fn from_cables(id: i64, n: usize, cables: &[(usize, f64, f64, f64)]) -> Result<Span> {
        let mut span = Span {
            id,
            conductors: n,
            zp: DMatrix::zeros(n, n),
            yp: DMatrix::zeros(n, n),
            zm: DMatrix::zeros(n, n),
            ym: DMatrix::zeros(n, n),
            ti: DMatrix::zeros(n, n),
            tit: DMatrix::zeros(n, n),
            tv: DMatrix::zeros(n, n),
            tvt: DMatrix::zeros(n, n),
            vp_offset: DVector::zeros(n),
            vm: DVector::zeros(n),
            wave_velocity: LIGHT,
        };
        for &(i, z_surge, v_prop, vpf) in cables {
            if i >= n {
                return Err(Error::BadConductorNumber(i as i64 + 1));
            }
            span.wave_velocity = v_prop;
            span.ti[(i, i)] = 1.0;
            span.tit[(i, i)] = 1.0;
            span.tv[(i, i)] = 1.0;
            span.tvt[(i, i)] = 1.0;
            span.zp[(i, i)] = z_surge;
            span.zm[(i, i)] = z_surge;
            span.yp[(i, i)] = 1.0 / z_surge;
            span.ym[(i, i)] = 1.0 / z_surge;
            span.vp_offset[i] = vpf;
        }
        span.reset();
        Ok(span)
    }

    /// Recompute the modal initial voltages from the phase offsets.
    pub fn reset(&mut self) {
        self.vm = &self.tvt * &self.vp_offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_conductor_span_is_trivially_modal() {
        let s = Span::from_geometry(1, &[0.0], &[10.0], &[0.00667], &[0.0]).unwrap();
        let z = 60.0 * (2.0 * 10.0 / 0.00667f64).ln();
        assert!((s.zp[(0, 0)] - z).abs() < 1e-9);
        assert!((s.zm[(0, 0)] - z).abs() < 1e-6);
        assert!((s.ym[(0, 0)] - 1.0 / z).abs() < 1e-12);
        assert_eq!(s.wave_velocity, LIGHT);
    }

    #[test]
    fn modal_transform_diagonalizes_symmetric_coupling() {
        // two identical conductors: modes are the even and odd combinations
        // with eigenvalues Zs -/+ Zm of the coupling
        let s = Span::from_geometry(1, &[-1.0, 1.0], &[10.0, 10.0], &[0.01, 0.01], &[0.0, 0.0])
            .unwrap();
        assert!(s.zm[(0, 1)].abs() < 1e-8);
        assert!(s.zm[(1, 0)].abs() < 1e-8);
        let zs = s.zp[(0, 0)];
        let zmut = s.zp[(0, 1)];
        let lo = s.zm[(0, 0)].min(s.zm[(1, 1)]);
        let hi = s.zm[(0, 0)].max(s.zm[(1, 1)]);
        assert!((lo - (zs - zmut)).abs() < 1e-6);
        assert!((hi - (zs + zmut)).abs() < 1e-6);
    }

    #[test]
    fn identity_ti_zm_tvt_recovers_zp() {
        let s = Span::from_geometry(
            1,
            &[-1.5, 0.0, 1.5],
            &[10.0, 11.0, 10.0],
            &[0.01, 0.01, 0.01],
            &[0.0, 0.0, 0.0],
        )
        .unwrap();
        let rebuilt = &s.ti * &s.zm * &s.tvt;
        assert!((rebuilt - &s.zp).abs().max() < 1e-6);
    }

    #[test]
    fn overlap_and_bad_geometry_are_rejected() {
        assert!(matches!(
            Span::from_geometry(1, &[0.0, 0.0], &[10.0, 10.0], &[0.01, 0.01], &[0.0, 0.0]),
            Err(Error::OverlappingConductors { .. })
        ));
        assert!(matches!(
            Span::from_geometry(1, &[0.0], &[10.0], &[-0.01], &[0.0]),
            Err(Error::BadRadius { .. })
        ));
        assert!(matches!(
            Span::from_geometry(1, &[0.0], &[-10.0], &[0.01], &[0.0]),
            Err(Error::BadHeight { .. })
        ));
    }

    #[test]
    fn cable_span_takes_definition_verbatim() {
        let s = Span::from_cables(2, 2, &[(0, 30.0, 1.5e8, 0.0), (1, 45.0, 1.5e8, 120.0)]).unwrap();
        assert_eq!(s.zp[(0, 0)], 30.0);
        assert_eq!(s.ym[(1, 1)], 1.0 / 45.0);
        assert_eq!(s.wave_velocity, 1.5e8);
        assert_eq!(s.vp_offset[1], 120.0);
        // initial modal voltage equals the phase voltage for uncoupled cables
        assert_eq!(s.vm[1], 120.0);
    }
}
