//! Observable, time-bounded tracking of submitted write calls.
//!
//! A write call hands back a [`TransactionSubscription`] immediately. The
//! submission resolves in the background through a [`PendingOperation`], and
//! the caller observes confirmation, failure or timeout through callbacks.

mod error;
pub mod metrics;
mod pending;
mod transaction;

pub use error::SubscriptionError;
pub use pending::PendingOperation;
pub use transaction::{
    ConfirmationCallback, FailureCallback, SubscriptionState, TransactionSubscription,
    DEFAULT_CONFIRMATION_TIMEOUT,
};
