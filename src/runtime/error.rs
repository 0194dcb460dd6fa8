use crate::language::{errors::ParseError, token::Location};
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Clone, Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{message}")]
    Runtime {
        message: String,
        location: Option<Location>,
    },
    #[error("assertion failure: {label}")]
    Assertion {
        label: String,
        location: Option<Location>,
    },
    #[error("Unknown identifier `{name}`")]
    UnknownIdentifier {
        name: String,
        location: Option<Location>,
    },
}

impl RuntimeError {
    pub fn runtime(message: impl Into<String>, location: Option<&Location>) -> Self {
        RuntimeError::Runtime {
            message: message.into(),
            location: location.cloned(),
        }
    }

    pub fn unknown(name: impl Into<String>, location: Option<&Location>) -> Self {
        RuntimeError::UnknownIdentifier {
            name: name.into(),
            location: location.cloned(),
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            RuntimeError::Parse(err) => Some(&err.location),
            RuntimeError::Runtime { location, .. }
            | RuntimeError::Assertion { location, .. }
            | RuntimeError::UnknownIdentifier { location, .. } => location.as_ref(),
        }
    }

    /// Short category label used by the drivers when reporting.
    pub fn category(&self) -> &'static str {
        match self {
            RuntimeError::Parse(_) => "parse error",
            RuntimeError::Runtime { .. } => "runtime error",
            RuntimeError::Assertion { .. } => "assertion error",
            RuntimeError::UnknownIdentifier { .. } => "unknown identifier",
        }
    }
}
