use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure classes shared by the store backends and the mutation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A guarded statement matched nothing: stale status assumption, role
    /// mismatch, or the row vanished. Never retried.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The operation is unsupported by the current backend or configuration.
    #[error("{0} is not available with this configuration")]
    Capability(&'static str),

    /// Network or subprocess failure. Carries the backend's own diagnostic
    /// text where one exists.
    #[error("{0}")]
    Transport(String),

    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    #[error("wanted item not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }

    pub fn is_capability(&self) -> bool {
        matches!(self, Error::Capability(_))
    }
}
