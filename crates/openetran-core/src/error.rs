//! Error taxonomy with the stable numeric codes used as process exit status.

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the engine can report, each mapped to a stable exit code.
///
/// Validation errors (1, 4-15, 21-22) are raised during setup with the
/// offending indices; numeric errors (16-20) are fatal and surface through
/// the same path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("wires {i} and {j} overlap")]
    OverlappingConductors { i: usize, j: usize },

    #[error("can't allocate memory")]
    OutOfMemory,

    #[error("no input available for the transient simulation")]
    MissingInput,

    #[error("inductor from {from} to {to} has initial dc voltage but no resistance")]
    LosslessInductorDc { from: usize, to: usize },

    #[error("can't read the number of phases")]
    PhaseCountRead,

    #[error("bad number of phases: {0}")]
    BadPhaseCount(i64),

    #[error("bad number of poles: {0}")]
    BadPoleCount(i64),

    #[error("too many conductors: {0}")]
    TooManyConductors(usize),

    #[error("bad conductor number: {0}")]
    BadConductorNumber(i64),

    #[error("span is missing conductors")]
    MissingConductor,

    #[error("bad radius {radius} on conductor {index}")]
    BadRadius { index: usize, radius: f64 },

    #[error("bad height {height} on conductor {index}")]
    BadHeight { index: usize, height: f64 },

    #[error("unmatched pair entry for node {0}")]
    UnmatchedPair(i64),

    #[error("bad pair {j}, {k} on a component")]
    BadPair { j: i64, k: i64 },

    #[error("bad pole {0} on a component")]
    BadPole(i64),

    #[error("transient solution stopped: {0}")]
    TransientStopped(String),

    #[error("arrester energy calculation stopped")]
    ArresterEnergyStopped,

    #[error("can't allocate memory in the math library")]
    MathAlloc,

    #[error("calculation error in the math library: {0}")]
    MathCalc(String),

    #[error("subscript out of range: {0}")]
    SubscriptRange(String),

    #[error("no arrester discharge voltage defined")]
    BadArresterVi,

    #[error("mixed conductor and cable input in the same span")]
    MixedSpanInput,
}

impl Error {
    /// The stable numeric code, used as the process exit status.
    pub fn code(&self) -> i32 {
        match self {
            Error::OverlappingConductors { .. } => 1,
            Error::OutOfMemory => 2,
            Error::MissingInput => 3,
            Error::LosslessInductorDc { .. } => 4,
            Error::PhaseCountRead => 5,
            Error::BadPhaseCount(_) => 6,
            Error::BadPoleCount(_) => 7,
            Error::TooManyConductors(_) => 8,
            Error::BadConductorNumber(_) => 9,
            Error::MissingConductor => 10,
            Error::BadRadius { .. } => 11,
            Error::BadHeight { .. } => 12,
            Error::UnmatchedPair(_) => 13,
            Error::BadPair { .. } => 14,
            Error::BadPole(_) => 15,
            Error::TransientStopped(_) => 16,
            Error::ArresterEnergyStopped => 17,
            Error::MathAlloc => 18,
            Error::MathCalc(_) => 19,
            Error::SubscriptRange(_) => 20,
            Error::BadArresterVi => 21,
            Error::MixedSpanInput => 22,
        }
    }

    /// One-line error kind for the stderr report.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::OverlappingConductors { .. } => "Overlapping conductors",
            Error::OutOfMemory => "Can't allocate memory",
            Error::MissingInput => "No input available for lt simulation",
            Error::LosslessInductorDc { .. } => "Initial DC voltage on inductor",
            Error::PhaseCountRead => "Can't read number of phases",
            Error::BadPhaseCount(_) => "Bad number of phases",
            Error::BadPoleCount(_) => "Bad number of poles",
            Error::TooManyConductors(_) => "Too many conductors",
            Error::BadConductorNumber(_) => "Bad conductor number",
            Error::MissingConductor => "Missing a conductor",
            Error::BadRadius { .. } => "Bad conductor radius",
            Error::BadHeight { .. } => "Bad conductor height",
            Error::UnmatchedPair(_) => "Unmatched pair input",
            Error::BadPair { .. } => "Bad pair number on component",
            Error::BadPole(_) => "Bad pole number on component",
            Error::TransientStopped(_) => "Transient simulation stopped (convergence failure)",
            Error::ArresterEnergyStopped => {
                "Arrester energy calculation stopped (convergence failure)"
            }
            Error::MathAlloc => "Can't allocate memory in math library",
            Error::MathCalc(_) => "Calculation error in math library",
            Error::SubscriptRange(_) => "Subscript out of range",
            Error::BadArresterVi => "No arrester discharge voltage defined",
            Error::MixedSpanInput => "Mixed conductor and cable input for same span",
        }
    }
}
