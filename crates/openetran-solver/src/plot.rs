//! Plot-output seam between the engine and the writers.
//!
//! The engine pushes one row of meter values per time step into a
//! `SampleSink`; the CLI provides CSV, TAB, and ELT implementations.
//! Sinks are infallible from the engine's point of view and surface any
//! I/O problem after the run.

use openetran_devices::MeterKind;

/// Everything a writer needs to name one plot column.
#[derive(Debug, Clone)]
pub struct MeterInfo {
    pub kind: MeterKind,
    /// 1-based pole number.
    pub pole: usize,
    pub from: usize,
    pub to: usize,
    pub pole_label: String,
    pub from_label: String,
    pub to_label: String,
    /// Text-format column name, `P{pole}:{from}-{to}` style.
    pub text_name: String,
}

pub trait SampleSink {
    /// Called once before the first step with the plot columns in output
    /// order (voltage meters first, then current meters).
    fn begin(&mut self, meters: &[MeterInfo], dt: f64, tmax: f64);

    /// One row per time step.
    fn sample(&mut self, t: f64, values: &[f64]);

    /// Called after the last step with the final time and step count.
    fn finish(&mut self, t: f64, step: usize);
}
