//! Transport and signer interfaces consumed by contract bindings.
//!
//! A [`Transport`] submits calls, looks up receipts and fans out ledger events
//! to listeners keyed by [`ListenerKey`]. A [`Signer`] authorizes write calls.
//! The crate ships one concrete implementation of each:
//! - [`RpcTransport`] backed by an alloy provider
//! - [`LocalSigner`] backed by a local private key

mod hub;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod rpc;
mod signer;

use alloy_primitives::{Bytes, TxHash};
use alloy_rpc_types::TransactionRequest;
pub use hub::EventHub;
pub use rpc::{create_provider, RpcTransport};
pub use signer::{LocalSigner, SignFuture, Signer};
use std::{future::Future, sync::Arc};
use thiserror::Error;

/// Callback invoked by a transport for every event emitted under its key.
pub type Listener = Arc<dyn Fn(TransportEvent) + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Error parsing or validating URLs
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    /// Error with private key
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Error returned by the RPC endpoint
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The signer refused or failed to sign
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Listener was removed before the transaction was included
    #[error("Transaction {0} dropped before inclusion")]
    Dropped(TxHash),

    /// The submission task ended without producing a result
    #[error("Submission aborted before resolving")]
    Aborted,
}

/// Key under which listeners are registered on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKey {
    /// Fires once per new block.
    Block,
    /// Fires once, with the receipt, when the transaction is included.
    Transaction(TxHash),
}

/// Handle returned by [`Transport::on`], used to deregister the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Event delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new block with the given number was observed.
    Block(u64),
    /// A watched transaction was included.
    Receipt(Receipt),
}

/// Finalized record of a transaction's inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction hash
    pub transaction_hash: TxHash,
    /// Block number where the transaction was included
    pub block_number: u64,
    /// Whether execution succeeded
    pub status: bool,
    /// Gas used
    pub gas_used: u64,
    /// Number of blocks including and built on top of the inclusion block
    pub confirmations: u64,
}

impl Receipt {
    /// Confirmation count of a transaction included at `block_number` when the chain head is `head`.
    pub const fn confirmations_at(block_number: u64, head: u64) -> u64 {
        head.saturating_sub(block_number) + 1
    }
}

/// Identifying record of a submitted write, available once the submission resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub hash: TxHash,
    pub nonce: u64,
}

/// Source of call execution, transaction broadcast and ledger events.
///
/// One transport is shared by every binding and subscription created from it,
/// so listeners must be isolated by their [`ListenerKey`].
pub trait Transport: Send + Sync + 'static {
    /// Execute a read-only call and return the raw output.
    fn call(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Sign `tx` with `signer` and broadcast it.
    ///
    /// Resolves once the transaction has a hash; inclusion is observed separately.
    fn submit(
        &self,
        tx: TransactionRequest,
        signer: &dyn Signer,
    ) -> impl Future<Output = Result<SubmittedTransaction, TransportError>> + Send;

    /// Look up the receipt of `hash`, `None` if not yet included.
    fn get_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<Receipt>, TransportError>> + Send;

    /// Register a listener under `key`.
    fn on(&self, key: ListenerKey, listener: Listener) -> ListenerId;

    /// Deregister a listener. Returns false if it was not registered.
    fn remove_listener(&self, key: &ListenerKey, id: ListenerId) -> bool;

    /// Wait until `hash` is included and return its receipt.
    fn wait_for_inclusion(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Receipt, TransportError>> + Send;
}
