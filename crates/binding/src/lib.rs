//! Contract bindings derived at runtime from a JSON ABI descriptor.
//!
//! A [`Contract`] pairs an address and a descriptor with a transport and an
//! optional signer. Every `function` entry becomes a callable method:
//! - `view` and `pure` entries run as read calls and return decoded values
//! - `nonpayable` and `payable` entries are signed, submitted and handed back
//!   as a [`TransactionSubscription`](subscription::TransactionSubscription)

mod binder;
mod contract;
mod error;
mod event;
pub mod validation;

pub use binder::{bind, BoundSurface, CallStrategy, Method};
pub use contract::{CallOutcome, Contract};
pub use error::BindingError;
pub use event::EventSubscription;

pub use alloy_dyn_abi::DynSolValue;
pub use alloy_json_abi::JsonAbi;
