use std::fmt;

use crate::types::HvacMode;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Status { endpoint: String, status: u16 },
    Decode(serde_json::Error),
    Io(std::io::Error),
    /// Snapshot fetch failed; the previous snapshot is still cached.
    Refresh(Box<Error>),
    /// Write rejected or failed; the cached value is untouched.
    Write { id: String, source: Box<Error> },
    UnknownParameter(String),
    MissingName(String),
    ReadOnly(String),
    RangeViolation { id: String, value: f64, min: f64 },
    /// NaN or infinite value for a numeric write.
    InvalidNumber { id: String, value: f64 },
    UnsupportedMode(HvacMode),
    NoActivePreset,
    InvalidSchedule(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status { endpoint, status } => {
                write!(f, "gateway returned status {status} for {endpoint}")
            }
            Error::Decode(e) => write!(f, "decode error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Refresh(e) => write!(f, "refresh failed: {e}"),
            Error::Write { id, source } => write!(f, "write to parameter {id} failed: {source}"),
            Error::UnknownParameter(id) => write!(f, "unknown parameter: {id}"),
            Error::MissingName(id) => write!(f, "parameter {id} has no name"),
            Error::ReadOnly(id) => write!(f, "parameter {id} is read-only"),
            Error::RangeViolation { id, value, min } => {
                write!(f, "value {value} for parameter {id} is below minimum {min}")
            }
            Error::InvalidNumber { id, value } => {
                write!(f, "value {value} for parameter {id} is not a finite number")
            }
            Error::UnsupportedMode(mode) => write!(f, "unsupported mode: {mode:?}"),
            Error::NoActivePreset => write!(f, "no active preset to route the temperature to"),
            Error::InvalidSchedule(msg) => write!(f, "invalid schedule: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Refresh(e) => Some(e.as_ref()),
            Error::Write { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
