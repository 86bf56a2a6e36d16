use thiserror::Error;

/// Errors that can occur when parsing wire messages
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing kind header")]
    MissingKind,

    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    #[error("invalid message body: {0}")]
    InvalidBody(String),
}
