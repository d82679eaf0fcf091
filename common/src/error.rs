use thiserror::Error;

/// Failure of a single network fetch. None of these are fatal; callers log the
/// error and keep whatever they held before.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {0}")]
    Protocol(u16),
    #[error("malformed payload: {0}")]
    Parse(String),
    #[error("lookup reported failure: {0}")]
    Logical(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Protocol,
    Parse,
    Logical,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Transport(_) => FetchErrorKind::Transport,
            Self::Protocol(_) => FetchErrorKind::Protocol,
            Self::Parse(_) => FetchErrorKind::Parse,
            Self::Logical(_) => FetchErrorKind::Logical,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// The radio refused to start an association attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("link error: {0}")]
pub struct LinkError(pub String);
