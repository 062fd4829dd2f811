//! Core structures for the OpenETran transient simulation engine.
//!
//! This crate provides:
//! - Dense linear-algebra kernels (LU with partial pivoting, symmetric
//!   eigensolve) used by the pole solver and the span setup
//! - The piecewise-cubic Bezier interpolant used for arrester V-I
//!   characteristics and steep-front surge waveshapes
//! - The per-pole nodal admittance structure (Ybus, factors, injections,
//!   Thevenin reduction over nonlinear ports)
//! - The error taxonomy with stable process exit codes

pub mod bezier;
pub mod error;
pub mod matrix;
pub mod pole;

pub use bezier::BezierFit;
pub use error::{Error, Result};
pub use pole::Pole;

/// 2*pi, truncated; kept at this precision for reproducible numerics.
pub const TWOPI: f64 = 6.2831853;

/// Voltages below this are treated as zero when checking initial conditions.
pub const V_MIN: f64 = 1.0e-3;

/// Admittance stamped for a "short circuit" (flashed insulator).
pub const Y_SHORT: f64 = 1.0e3;

/// Admittance substituted on unused Ybus diagonals to keep the LU regular.
pub const Y_OPEN: f64 = 1.0e-9;

/// Speed of light in m/s; default travelling-wave velocity on overhead spans.
pub const LIGHT: f64 = 3.0e8;

/// Primitive inductance coefficient for service-drop geometry, H/m.
pub const PRIM_L: f64 = 2.0e-7;

/// Front-shape constant for the 1-cosine surge front.
pub const CFKONST: f64 = 2.815863;

/// Tail-shape constant for the 1-cosine surge front.
pub const CTKONST: f64 = 4.0;

/// Exponential-tail time constant multiplier: tau = ETKONST * tail time.
pub const ETKONST: f64 = 1.442695;
