use thiserror::Error;
use transport::TransportError;

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Write call attempted on a container without a signer
    #[error("method {0} sends a transaction and requires a signer")]
    MissingSigner(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Listener registered for an event that was not requested
    #[error("event {0} is not part of this subscription")]
    NotSubscribed(String),

    #[error("failed to decode output of {method}: {reason}")]
    Decode { method: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
