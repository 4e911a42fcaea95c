use crate::transport::TransportError;

/// Failure modes surfaced to callers.
///
/// HTTP-level errors (4xx/5xx) are deliberately absent: the server answered,
/// so the status and body come back as a normal [`crate::ResponseEnvelope`]
/// for the caller to branch on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Misconfigured auth scheme or a missing signing secret. Fatal, never
    /// retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller passed an incompatible parameter shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection-level failure after exhausting host rotation.
    #[error("transport failure after {attempts} attempts: {source}")]
    Transport {
        attempts: usize,
        #[source]
        source: TransportError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
