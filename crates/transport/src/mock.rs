//! In-memory [`Transport`] for tests.
//!
//! Blocks only advance when the test says so, which makes the interleaving of
//! submission, inclusion and listener registration fully scriptable.

use crate::{
    EventHub, Listener, ListenerId, ListenerKey, Receipt, Signer, SubmittedTransaction,
    Transport, TransportError, TransportEvent,
};
use alloy_primitives::{keccak256, Bytes, Selector, TxHash};
use alloy_rpc_types::TransactionRequest;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct MockState {
    head: u64,
    next_nonce: u64,
    /// Inclusion block and status per transaction
    included: HashMap<TxHash, (u64, bool)>,
    call_results: HashMap<Selector, Bytes>,
    submit_error: Option<TransportError>,
    submitted: Vec<TransactionRequest>,
    interactions: usize,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    hub: EventHub,
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer read calls whose input starts with `selector` with `output`.
    pub fn set_call_result(&self, selector: Selector, output: impl Into<Bytes>) {
        self.state
            .lock()
            .call_results
            .insert(selector, output.into());
    }

    /// Make every following submission fail with `error`.
    pub fn fail_submissions(&self, error: TransportError) {
        self.state.lock().submit_error = Some(error);
    }

    /// Transactions submitted so far, with `from` set to the signer address.
    pub fn submitted(&self) -> Vec<TransactionRequest> {
        self.state.lock().submitted.clone()
    }

    /// Number of calls made through the [`Transport`] interface.
    pub fn interactions(&self) -> usize {
        self.state.lock().interactions
    }

    pub fn head(&self) -> u64 {
        self.state.lock().head
    }

    pub fn listener_count(&self, key: &ListenerKey) -> usize {
        self.hub.listener_count(key)
    }

    /// Mine a new empty block and notify block listeners.
    pub fn advance_block(&self) -> u64 {
        let head = {
            let mut state = self.state.lock();
            state.head += 1;
            state.head
        };

        self.hub
            .emit(&ListenerKey::Block, &TransportEvent::Block(head));
        head
    }

    /// Record `hash` as included in the current head without notifying anyone.
    ///
    /// Models a transaction finalized before a listener was registered.
    pub fn include_silently(&self, hash: TxHash) -> Receipt {
        let mut state = self.state.lock();
        let head = state.head;
        state.included.insert(hash, (head, true));
        receipt(hash, head, true, head)
    }

    /// Include `hash` in a new block, notify block listeners, then deliver the
    /// receipt to listeners watching `hash`.
    pub fn mine(&self, hash: TxHash) -> Receipt {
        self.mine_with_status(hash, true)
    }

    pub fn mine_with_status(&self, hash: TxHash, status: bool) -> Receipt {
        let head = {
            let mut state = self.state.lock();
            state.head += 1;
            let head = state.head;
            state.included.insert(hash, (head, status));
            head
        };

        let receipt = receipt(hash, head, status, head);
        self.hub
            .emit(&ListenerKey::Block, &TransportEvent::Block(head));
        self.hub.emit_once(
            &ListenerKey::Transaction(hash),
            &TransportEvent::Receipt(receipt.clone()),
        );
        receipt
    }

    fn lookup(&self, hash: TxHash) -> Option<Receipt> {
        let state = self.state.lock();
        state
            .included
            .get(&hash)
            .map(|&(block, status)| receipt(hash, block, status, state.head))
    }
}

fn receipt(hash: TxHash, block_number: u64, status: bool, head: u64) -> Receipt {
    Receipt {
        transaction_hash: hash,
        block_number,
        status,
        gas_used: 21_000,
        confirmations: Receipt::confirmations_at(block_number, head),
    }
}

impl Transport for MockTransport {
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        state.interactions += 1;

        let input = tx.input.input().cloned().unwrap_or_default();
        if input.len() < 4 {
            return Err(TransportError::Rpc("execution reverted".to_string()));
        }

        state
            .call_results
            .get(&Selector::from_slice(&input[..4]))
            .cloned()
            .ok_or_else(|| TransportError::Rpc("execution reverted".to_string()))
    }

    async fn submit(
        &self,
        mut tx: TransactionRequest,
        signer: &dyn Signer,
    ) -> Result<SubmittedTransaction, TransportError> {
        let mut state = self.state.lock();
        state.interactions += 1;

        tx.from = Some(signer.address());
        let nonce = state.next_nonce;
        tx.nonce = Some(nonce);
        state.submitted.push(tx);

        if let Some(error) = state.submit_error.clone() {
            return Err(error);
        }

        state.next_nonce += 1;
        let hash = keccak256(nonce.to_be_bytes());
        Ok(SubmittedTransaction { hash, nonce })
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, TransportError> {
        self.state.lock().interactions += 1;
        Ok(self.lookup(hash))
    }

    fn on(&self, key: ListenerKey, listener: Listener) -> ListenerId {
        self.hub.on(key, listener)
    }

    fn remove_listener(&self, key: &ListenerKey, id: ListenerId) -> bool {
        self.hub.remove_listener(key, id)
    }

    async fn wait_for_inclusion(&self, hash: TxHash) -> Result<Receipt, TransportError> {
        if let Some(receipt) = self.lookup(hash) {
            return Ok(receipt);
        }

        let (sender, receiver) = tokio::sync::oneshot::channel();
        let sender = Mutex::new(Some(sender));
        let key = ListenerKey::Transaction(hash);
        let id = self.hub.on(
            key,
            std::sync::Arc::new(move |event| {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalSigner;
    use alloy_network::TransactionBuilder;
    use alloy_primitives::Address;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[tokio::test]
    async fn test_submit_assigns_nonces() {
        let transport = MockTransport::new();
        let signer = LocalSigner::from_private_key(KEY_ONE).unwrap();

        let first = transport
            .submit(TransactionRequest::default(), &signer)
            .await
            .unwrap();
        let second = transport
            .submit(TransactionRequest::default(), &signer)
            .await
            .unwrap();

        assert_eq!(first.nonce, 0);
        assert_eq!(second.nonce, 1);
        assert_ne!(first.hash, second.hash);
        assert_eq!(transport.submitted()[0].from, Some(signer.address()));
    }

    #[tokio::test]
    async fn test_call_result_by_selector() {
        let transport = MockTransport::new();
        let selector = Selector::from([0xde, 0xad, 0xbe, 0xef]);
        transport.set_call_result(selector, vec![1, 2, 3]);

        let tx = TransactionRequest::default()
            .with_to(Address::repeat_byte(1))
            .with_input(vec![0xde, 0xad, 0xbe, 0xef, 0x00]);
        let output = transport.call(tx).await.unwrap();
        assert_eq!(output, Bytes::from(vec![1, 2, 3]));

        let unknown = TransactionRequest::default().with_input(vec![0, 0, 0, 0]);
        assert!(transport.call(unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_receipt_confirmations_grow() {
        let transport = MockTransport::new();
        let hash = TxHash::repeat_byte(7);

        assert_eq!(transport.get_receipt(hash).await.unwrap(), None);

        transport.mine(hash);
        assert_eq!(
            transport.get_receipt(hash).await.unwrap().unwrap().confirmations,
            1
        );

        transport.advance_block();
        assert_eq!(
            transport.get_receipt(hash).await.unwrap().unwrap().confirmations,
            2
        );
    }

    #[tokio::test]
    async fn test_wait_for_inclusion() {
        let transport = std::sync::Arc::new(MockTransport::new());
        let hash = TxHash::repeat_byte(9);

        let waiter = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.wait_for_inclusion(hash).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(transport.listener_count(&ListenerKey::Transaction(hash)), 1);

        transport.mine(hash);
        let receipt = waiter.await.unwrap().unwrap();
        assert_eq!(receipt.transaction_hash, hash);
        assert_eq!(transport.listener_count(&ListenerKey::Transaction(hash)), 0);
    }
}
