//! Transient engine and analysis drivers for OpenETran.
//!
//! The crate assembles a `Simulation` from a parsed deck and runs the
//! Dommel time-step loop: travelling-wave history injections, per-pole
//! nodal solutions with Newton compensation of the Bezier arresters, the
//! flashover integrators, the second-dT switch, and the outer Brent
//! iteration for critical flashover currents.

pub mod brent;
pub mod build;
pub mod compensation;
pub mod engine;
pub mod icrit;
pub mod line;
pub mod plot;
pub mod span;

pub use compensation::NrStats;
pub use engine::{Answers, Simulation};
pub use icrit::{find_critical_currents, IcritRequest, MAX_WIRES_HIT};
pub use line::Line;
pub use plot::{MeterInfo, SampleSink};
pub use span::Span;
