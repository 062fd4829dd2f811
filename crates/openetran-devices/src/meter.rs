//! Peak meters.
//!
//! A voltmeter reads the voltage between two nodes of its pole; an ammeter
//! reads the monitored current of a specific device instance. Both keep
//! the signed extremum seen so far. Current kinds mirror the plot-name
//! suffixes IARR, IPG, IHG, IX2, and IPIPE.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterKind {
    Voltage,
    ArresterCurrent,
    /// Bezier-arrester discharge current; shares the IARR plot suffix.
    ArrbezCurrent,
    GroundCurrent,
    HouseGroundCurrent,
    TransformerX2,
    PipegapCurrent,
}

impl MeterKind {
    pub fn is_voltage(self) -> bool {
        self == MeterKind::Voltage
    }

    /// Plot-name suffix for current meters.
    pub fn suffix(self) -> &'static str {
        match self {
            MeterKind::Voltage => "",
            MeterKind::ArresterCurrent | MeterKind::ArrbezCurrent => "IARR",
            MeterKind::GroundCurrent => "IPG",
            MeterKind::HouseGroundCurrent => "IHG",
            MeterKind::TransformerX2 => "IX2",
            MeterKind::PipegapCurrent => "IPIPE",
        }
    }
}

pub struct Meter {
    pub kind: MeterKind,
    /// 1-based pole number.
    pub pole: usize,
    pub from: usize,
    /// Second node for voltmeters; unused for ammeters.
    pub to: usize,
    /// Arena index of the monitored device, for ammeters.
    pub target: usize,
    /// Signed peak of the monitored quantity.
    pub peak: f64,
}

impl Meter {
    pub fn voltmeter(pole: usize, from: usize, to: usize) -> Meter {
        Meter {
            kind: MeterKind::Voltage,
            pole,
            from,
            to,
            target: 0,
            peak: 0.0,
        }
    }

    pub fn ammeter(kind: MeterKind, pole: usize, from: usize, target: usize) -> Meter {
        Meter {
            kind,
            pole,
            from,
            to: 0,
            target,
            peak: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.peak = 0.0;
    }

    pub fn record(&mut self, value: f64) {
        if value.abs() > self.peak.abs() {
            self.peak = value;
        }
    }

    /// Column name for text plot headers.
    pub fn text_name(&self) -> String {
        if self.kind.is_voltage() {
            format!("P{}:{}-{}", self.pole, self.from, self.to)
        } else {
            format!("P{}:{}-{}", self.pole, self.from, self.kind.suffix())
        }
    }
}
