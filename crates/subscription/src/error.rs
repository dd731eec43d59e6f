use std::{sync::Arc, time::Duration};
use thiserror::Error;
use transport::TransportError;

#[derive(Debug, Clone, Error)]
pub enum SubscriptionError {
    /// A confirmation listener is already registered on this subscription
    #[error("a confirmation listener is already registered")]
    AlreadyListening,

    /// Confirmation not observed within the bound
    #[error("confirmation not observed within {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The caller's confirmation callback returned an error or panicked
    #[error("confirmation callback failed: {0}")]
    CallbackFailure(Arc<eyre::Report>),

    /// Error from the transport, surfaced unchanged
    #[error(transparent)]
    Transport(#[from] TransportError),
}
