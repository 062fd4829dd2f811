//! Parsed deck model, consumed by the simulation builder.

/// Simulation control from the first logical line of the deck.
#[derive(Debug, Clone)]
pub struct Control {
    pub nodes: usize,
    /// Zero in network mode until the line cards determine it.
    pub poles: usize,
    pub span_length: f64,
    pub left_end_z: bool,
    pub right_end_z: bool,
    pub dt: f64,
    pub tmax: f64,
    /// Present when the deck uses the second-dT mechanism.
    pub dt_switch_time: Option<f64>,
    /// True when the deck uses `time`/`span`/`line` network input.
    pub network: bool,
}

#[derive(Debug, Clone)]
pub struct ConductorCard {
    /// 1-based conductor number.
    pub number: usize,
    pub height: f64,
    pub x: f64,
    pub radius: f64,
    pub voltage: f64,
}

#[derive(Debug, Clone)]
pub struct CableCard {
    pub number: usize,
    pub z_surge: f64,
    pub v_prop: f64,
    pub vpf: f64,
}

#[derive(Debug, Clone)]
pub enum SpanKind {
    Geometry(Vec<ConductorCard>),
    Cables(Vec<CableCard>),
}

#[derive(Debug, Clone)]
pub struct SpanCard {
    pub id: i64,
    pub kind: SpanKind,
}

#[derive(Debug, Clone)]
pub struct LineCard {
    pub from: usize,
    pub to: usize,
    pub span_id: i64,
    pub length: f64,
    pub term_left: bool,
    pub term_right: bool,
}

/// One expanded (pole, from-node, to-node) connection of a device card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wiring {
    pub pole: usize,
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone)]
pub enum DeviceCard {
    Ground {
        r60: f64,
        rho: f64,
        e0: f64,
        /// Lead inductance, H, already scaled by lead length.
        l: f64,
        monitor: bool,
        at: Vec<Wiring>,
    },
    Resistor {
        r: f64,
        at: Vec<Wiring>,
    },
    Inductor {
        res: f64,
        ind: f64,
        at: Vec<Wiring>,
    },
    Capacitor {
        c: f64,
        at: Vec<Wiring>,
    },
    Transformer {
        res: f64,
        ind: f64,
        at: Vec<Wiring>,
    },
    Customer {
        rhg: f64,
        rho: f64,
        e0: f64,
        /// House-ground lead inductance, H, already scaled by depth.
        lhg: f64,
        n: f64,
        lp: f64,
        ls1: f64,
        ls2: f64,
        /// Common meter inductance, H, already scaled by drop length.
        lcm: f64,
        ra: f64,
        rn: f64,
        dan: f64,
        daa: f64,
        span: f64,
        at: Vec<Wiring>,
    },
    Insulator {
        cfo: f64,
        vb: f64,
        beta: f64,
        de: f64,
        at: Vec<Wiring>,
    },
    Lpm {
        cfo: f64,
        e0: f64,
        k: f64,
        at: Vec<Wiring>,
    },
    Arrester {
        v_gap: f64,
        v_knee: f64,
        r_slope: f64,
        /// Lead inductance, H, already scaled by lead length.
        l: f64,
        monitor: bool,
        at: Vec<Wiring>,
    },
    ArrBez {
        v_gap: f64,
        v10: f64,
        uref_pu: f64,
        l: f64,
        monitor: bool,
        at: Vec<Wiring>,
    },
    PipeGap {
        v_knee: f64,
        r_slope: f64,
        monitor: bool,
        at: Vec<Wiring>,
    },
    Surge {
        peak: f64,
        front: f64,
        tail: f64,
        tstart: f64,
        at: Vec<Wiring>,
    },
    SteepFront {
        peak: f64,
        front: f64,
        tail: f64,
        tstart: f64,
        pu_si: f64,
        at: Vec<Wiring>,
    },
    Meter {
        /// 0 = voltage; 1..=5 select IARR, IPG, IHG, IX2, IPIPE.
        mtype: i64,
        at: Vec<Wiring>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Deck {
    pub control: Control,
    pub spans: Vec<SpanCard>,
    pub lines: Vec<LineCard>,
    pub devices: Vec<DeviceCard>,
    pub pole_labels: Vec<(usize, String)>,
    pub phase_labels: Vec<(usize, String)>,
}

impl Default for Control {
    fn default() -> Control {
        Control {
            nodes: 0,
            poles: 0,
            span_length: 0.0,
            left_end_z: false,
            right_end_z: false,
            dt: 0.0,
            tmax: 0.0,
            dt_switch_time: None,
            network: false,
        }
    }
}
