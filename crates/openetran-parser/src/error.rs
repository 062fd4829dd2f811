//! Parser errors.
//!
//! Setup validation failures carry the engine's stable error codes;
//! structural problems in the deck itself surface as syntax errors.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Setup(#[from] openetran_core::Error),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

impl Error {
    pub fn syntax(line: usize, message: impl Into<String>) -> Error {
        Error::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Process exit code; syntax errors report as unreadable input.
    pub fn code(&self) -> i32 {
        match self {
            Error::Setup(e) => e.code(),
            Error::Syntax { .. } => openetran_core::Error::PhaseCountRead.code(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::Setup(e) => e.kind(),
            Error::Syntax { .. } => "Can't read number of phases",
        }
    }
}
