use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial error: {0}")]
    Serial(String),
    #[error("serial port not found: {0}")]
    PortNotFound(String),
    #[error("serial read timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "hardware")]
impl From<serialport::Error> for HwError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => HwError::PortNotFound(e.description),
            serialport::ErrorKind::Io(kind) if kind == std::io::ErrorKind::TimedOut => {
                HwError::Timeout
            }
            _ => HwError::Serial(e.description),
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
