use thiserror::Error;

/// Error kinds surfaced across the registry, credential service, and the
/// WebSocket/multiplexer plumbing. Call sites match on kind rather than
/// parsing messages.
#[derive(Debug, Error)]
pub enum TetherError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("agent identifier already registered: {0}")]
    Collision(String),

    #[error("no such agent: {0}")]
    NotFound(String),
}

impl From<yamux::ConnectionError> for TetherError {
    fn from(err: yamux::ConnectionError) -> Self {
        TetherError::Protocol(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for TetherError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        TetherError::Authorization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TetherError>;

/// True if an I/O error is the expected "other side already closed" family
/// that the splice primitive must swallow rather than log.
pub fn is_expected_close(err: &std::io::Error) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        err.kind(),
        BrokenPipe | ConnectionReset | ConnectionAborted | UnexpectedEof | NotConnected
    )
}
