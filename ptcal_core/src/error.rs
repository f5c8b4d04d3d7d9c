use thiserror::Error;

/// Frame payload could not be interpreted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame length mismatch: expected {expected} payload bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Why a regression could not be computed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InsufficientReason {
    #[error("x has {x} values but y has {y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("no data points")]
    Empty,
    #[error("at least 2 data points required, got {0}")]
    TooFewPoints(usize),
    #[error("all x values are identical; slope is undefined")]
    DegenerateX,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timeout waiting for serial data")]
    Timeout,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("acquisition exhausted after {attempts} attempts (last error: {last})")]
    AcquisitionExhausted { attempts: u32, last: String },
    #[error("incomplete sample for sensor {sensor}: expected {expected} readings, got {actual}")]
    IncompleteSample {
        sensor: usize,
        expected: usize,
        actual: usize,
    },
    #[error("insufficient data for sensor {sensor}: {reason}")]
    InsufficientData {
        sensor: usize,
        reason: InsufficientReason,
    },
    #[error("corrupt calibration log: {0}")]
    CorruptCalibration(String),
    #[error("dimension mismatch: {readings} readings vs {coefficients} coefficients")]
    DimensionMismatch { readings: usize, coefficients: usize },
    #[error("unknown bank: {0}")]
    UnknownBank(String),
    #[error("io error: {0}")]
    Io(String),
}

impl CalError {
    /// Transport and decode failures are retried inside the averager; every
    /// other kind surfaces to the caller unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CalError::Transport(_) | CalError::Timeout | CalError::Decode(_)
        )
    }
}

impl From<std::io::Error> for CalError {
    fn from(e: std::io::Error) -> Self {
        CalError::Io(e.to_string())
    }
}

impl From<csv::Error> for CalError {
    fn from(e: csv::Error) -> Self {
        CalError::Io(e.to_string())
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing serial link")]
    MissingLink,
    #[error("missing bank name")]
    MissingName,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = std::result::Result<T, CalError>;
pub use eyre::Report;
