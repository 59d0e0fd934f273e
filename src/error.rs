use std::fmt;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration or an unrecoverable bootstrap failure.
    Config(String),
    /// An invariant breach or other unexpected internal condition.
    Internal(String),
    /// A transport-level failure talking to another node.
    Network(String),
    /// A malformed request or argument.
    Parse(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg)
            | Error::Internal(msg)
            | Error::Network(msg)
            | Error::Parse(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<std::net::AddrParseError> for Error {
    fn from(err: std::net::AddrParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
