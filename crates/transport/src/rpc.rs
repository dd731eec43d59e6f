//! Transport backed by an alloy JSON-RPC provider.

use crate::{
    EventHub, Listener, ListenerId, ListenerKey, Receipt, Signer, SubmittedTransaction,
    Transport, TransportError, TransportEvent,
};
use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_rpc_types_eth::TransactionReceipt;
use parking_lot::Mutex;
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{sync::oneshot, time};
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, info, warn};

/// Convenience function to create an ethereum rpc provider from url.
pub fn create_provider(rpc_url: &str) -> Result<impl Provider + Clone, TransportError> {
    let url = rpc_url
        .parse()
        .map_err(|e| TransportError::InvalidUrl(format!("{}", e)))?;
    let provider = ProviderBuilder::new().connect_http(url);

    Ok(provider)
}

/// [`Transport`] over an alloy provider.
///
/// A background task polls the chain head every `poll_interval`, emitting a
/// [`ListenerKey::Block`] event per new block and delivering receipts to
/// listeners watching a transaction hash. The task stops once the transport
/// is dropped.
#[derive(Debug)]
pub struct RpcTransport<P> {
    provider: P,
    hub: EventHub,
}

impl<P> RpcTransport<P>
where
    P: Provider + Clone + 'static,
{
    /// Create the transport and start its block poller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(provider: P, poll_interval: Duration) -> Arc<Self> {
        let transport = Arc::new(Self {
            provider,
            hub: EventHub::new(),
        });

        tokio::spawn(poll_blocks(Arc::downgrade(&transport), poll_interval));

        transport
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Fill missing transaction fields using the provider.
    async fn fill_transaction(
        &self,
        mut tx: TransactionRequest,
        from: Address,
    ) -> Result<TransactionRequest, TransportError> {
        if tx.from.is_none() {
            tx.from = Some(from);
        }

        if tx.chain_id.is_none() {
            tx.chain_id = Some(self.provider.get_chain_id().await.map_err(rpc_error)?);
        }

        if tx.nonce.is_none() {
            let nonce = self
                .provider
                .get_transaction_count(from)
                .await
                .map_err(rpc_error)?;
            tx.nonce = Some(nonce);
        }

        // Fees before gas: estimation may depend on them
        if tx.max_fee_per_gas.is_none() || tx.max_priority_fee_per_gas.is_none() {
            let fee_estimate = self
                .provider
                .estimate_eip1559_fees()
                .await
                .map_err(rpc_error)?;
            if tx.max_fee_per_gas.is_none() {
                tx.max_fee_per_gas = Some(fee_estimate.max_fee_per_gas);
            }
            if tx.max_priority_fee_per_gas.is_none() {
                tx.max_priority_fee_per_gas = Some(fee_estimate.max_priority_fee_per_gas);
            }
        }

        if tx.gas.is_none() {
            tx.gas = Some(
                self.provider
                    .estimate_gas(tx.clone())
                    .await
                    .map_err(rpc_error)?,
            );
        }

        Ok(tx)
    }

    async fn fetch_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, TransportError> {
        let Some(receipt) = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_error)?
        else {
            return Ok(None);
        };

        let head = self.provider.get_block_number().await.map_err(rpc_error)?;
        Ok(Some(convert_receipt(&receipt, head)))
    }

    /// Emit a block event if the head advanced and deliver receipts of watched transactions.
    async fn poll_once(&self, last_block: &mut Option<u64>) -> Result<(), TransportError> {
        let head = self.provider.get_block_number().await.map_err(rpc_error)?;
        if last_block.is_some_and(|last| head <= last) {
            return Ok(());
        }
        *last_block = Some(head);

        self.hub
            .emit(&ListenerKey::Block, &TransportEvent::Block(head));

        for hash in self.hub.watched_transactions() {
            if let Some(receipt) = self.fetch_receipt(hash).await? {
                debug!(hash = %hash, block = receipt.block_number, "Delivering receipt");
                self.hub.emit_once(
                    &ListenerKey::Transaction(hash),
                    &TransportEvent::Receipt(receipt),
                );
            }
        }

        Ok(())
    }
}

async fn poll_blocks<P>(transport: Weak<RpcTransport<P>>, poll_interval: Duration)
where
    P: Provider + Clone + 'static,
{
    let mut interval = time::interval(poll_interval);
    let mut last_block = None;

    loop {
        interval.tick().await;

        let Some(transport) = transport.upgrade() else {
            debug!("Transport dropped, stopping block poller");
            return;
        };

        if let Err(e) = transport.poll_once(&mut last_block).await {
            warn!(error = %e, "Block poll failed, will retry");
        }
    }
}

impl<P> Transport for RpcTransport<P>
where
    P: Provider + Clone + 'static,
{
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, TransportError> {
        Retry::start(retry_strategy(), || async {
            self.provider.call(tx.clone()).await.map_err(|e| {
                warn!(error = %e, "eth_call failed, will retry");
                rpc_error(e)
            })
        })
        .await
    }

    async fn submit(
        &self,
        tx: TransactionRequest,
        signer: &dyn Signer,
    ) -> Result<SubmittedTransaction, TransportError> {
        let filled = self.fill_transaction(tx, signer.address()).await?;
        let nonce = filled.nonce.unwrap_or_default();

        let raw = signer
            .sign_transaction(filled)
            .await
            .map_err(|e| TransportError::Signing(e.to_string()))?;

        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(rpc_error)?;
        let hash = *pending.tx_hash();

        info!(hash = %hash, nonce, from = %signer.address(), "Transaction submitted");

        Ok(SubmittedTransaction { hash, nonce })
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, TransportError> {
        Retry::start(retry_strategy(), || async {
            self.fetch_receipt(hash).await.map_err(|e| {
                warn!(hash = %hash, error = %e, "Receipt lookup failed, will retry");
                e
            })
        })
        .await
    }

    fn on(&self, key: ListenerKey, listener: Listener) -> ListenerId {
        self.hub.on(key, listener)
    }

    fn remove_listener(&self, key: &ListenerKey, id: ListenerId) -> bool {
        self.hub.remove_listener(key, id)
    }

    async fn wait_for_inclusion(&self, hash: TxHash) -> Result<Receipt, TransportError> {
        if let Some(receipt) = self.get_receipt(hash).await? {
            return Ok(receipt);
        }

        let (sender, receiver) = oneshot::channel();
        let sender = Mutex::new(Some(sender));
        let key = ListenerKey::Transaction(hash);
        let id = self.hub.on(
            key,
            Arc::new(move |event| {
                if let TransportEvent::Receipt(receipt) = event {
                    if let Some(sender) = sender.lock().take() {
                        let _ = sender.send(receipt);
                    }
                }
            }),
        );

        let result = receiver.await.map_err(|_| TransportError::Dropped(hash));
        self.hub.remove_listener(&key, id);
        result
    }
}

fn convert_receipt(receipt: &TransactionReceipt, head: u64) -> Receipt {
    let block_number = receipt.block_number.unwrap_or(head);

    Receipt {
        transaction_hash: receipt.transaction_hash,
        block_number,
        status: receipt.status(),
        gas_used: receipt.gas_used,
        confirmations: Receipt::confirmations_at(block_number, head),
    }
}

/// 100ms, 200ms, 400ms.
fn retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2).factor(50).take(3)
}

fn rpc_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Rpc(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url() {
        let result = create_provider("not a url");
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_retry_strategy() {
        let delays: Vec<_> = retry_strategy().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }
}
