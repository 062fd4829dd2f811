//! Voltage monitors for external callers.
//!
//! A monitor names a pole and node pair; after setup it links to the
//! matching voltmeter and to any insulator or LPM on the same pair, then
//! records a per-step voltage trace and summarizes peak and severity.

pub struct Monitor {
    pub pole: usize,
    pub from: usize,
    pub to: usize,

    pub peak: f64,
    pub si: f64,
    pub pts: Vec<f64>,

    /// Linked meter/insulator/LPM arena indices, resolved at run start.
    pub meter: Option<usize>,
    pub ins_de: Option<usize>,
    pub ins_lpm: Option<usize>,
}

impl Monitor {
    pub fn new(pole: usize, from: usize, to: usize, npts: usize) -> Monitor {
        Monitor {
            pole,
            from,
            to,
            peak: 0.0,
            si: 0.0,
            pts: vec![0.0; npts],
            meter: None,
            ins_de: None,
            ins_lpm: None,
        }
    }

    /// True when this monitor watches the branch (in either direction).
    pub fn matches(&self, pole: usize, from: usize, to: usize) -> bool {
        self.pole == pole && ((self.from == from && self.to == to) || (self.from == to && self.to == from))
    }

    pub fn record(&mut self, step: usize, volts: f64) {
        if self.meter.is_some() && step < self.pts.len() {
            self.pts[step] = volts;
        }
    }
}
