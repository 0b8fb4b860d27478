use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used across the crate's fallible boundaries.
pub type Result<T> = std::result::Result<T, LrErr>;

/// Failures outside the numeric core: loading configuration, parsing datasets and
/// persisting models.
#[derive(Debug)]
pub enum LrErr {
    Io(io::Error),
    Json(serde_json::Error),
    InvalidConfig(String),
    Parse { line: usize, reason: String },
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
}

impl Display for LrErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LrErr::Io(e) => write!(f, "io error: {e}"),
            LrErr::Json(e) => write!(f, "json error: {e}"),
            LrErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            LrErr::Parse { line, reason } => write!(f, "parse error at line {line}: {reason}"),
            LrErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
        }
    }
}

impl Error for LrErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LrErr::Io(e) => Some(e),
            LrErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LrErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for LrErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
