//! Device models for OpenETran.
//!
//! This crate provides the element models of the transient engine:
//! - Linear shunts and branches: R, series RL (inductor, transformer), C
//! - Impulse ground with soil ionisation, customer/service-drop coupling
//! - Flashover models: destructive-effect insulator and leader progression
//! - Surge protection: gapped piecewise-linear arrester, Bezier arrester
//!   (with optional series gap and Cigre dynamic conductance), pipe gap
//! - Surge sources: 1-cosine front, concave steep front, dc offset sources
//! - Instrumentation: meters and monitors
//!
//! Every device references its parent pole by index and operates on the
//! pole's nodal structure through the methods of `openetran_core::Pole`.

pub mod arrbez;
pub mod arrester;
pub mod capacitor;
pub mod customer;
pub mod ground;
pub mod inductor;
pub mod insulator;
pub mod lpm;
pub mod meter;
pub mod monitor;
pub mod pipegap;
pub mod resistor;
pub mod source;
pub mod steepfront;
pub mod surge;
pub mod transformer;

pub use arrbez::{ArrBez, ArrChar, ArrMinMax, ArrSize};
pub use arrester::Arrester;
pub use capacitor::Capacitor;
pub use customer::Customer;
pub use ground::Ground;
pub use inductor::Inductor;
pub use insulator::Insulator;
pub use lpm::Lpm;
pub use meter::{Meter, MeterKind};
pub use monitor::Monitor;
pub use pipegap::PipeGap;
pub use resistor::Resistor;
pub use source::DcSource;
pub use steepfront::SteepFront;
pub use surge::Surge;
pub use transformer::Transformer;
