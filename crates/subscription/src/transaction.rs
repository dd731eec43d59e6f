//! State machine tracking one submitted write until confirmation, failure or timeout.
//!
//! ```text
//! Pending ──resolve──▶ Idle ──on_confirmation──▶ Listening ──┬─ receipt delivered ─▶ Terminated
//!                                                            ├─ timeout ───────────▶ Terminated
//!                                                            └─ remove_listener ───▶ Terminated
//! ```
//!
//! At most one confirmation listener is registered at a time. Every path out of
//! `Listening` goes through the same deregistration step, which removes the
//! transport listener and cancels the timeout timer.

use crate::{metrics, PendingOperation, SubscriptionError};
use alloy_primitives::TxHash;
use parking_lot::Mutex;
use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};
use tokio::{runtime::Handle, task::JoinHandle, time};
use tracing::{debug, info, warn};
use transport::{Listener, ListenerId, ListenerKey, Receipt, Transport, TransportEvent};

/// How long a confirmation listener stays attached before it is retired.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_millis(2_000);

pub type ConfirmationCallback = Arc<dyn Fn(&Receipt) -> eyre::Result<()> + Send + Sync>;
pub type FailureCallback = Arc<dyn Fn(SubscriptionError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Submission not resolved yet, no listener
    Pending,
    /// Submission resolved, no listener
    Idle,
    /// A confirmation listener is registered
    Listening,
    /// The last registered listener was retired
    Terminated,
}

/// Observable handle for a submitted write.
///
/// Clones share the same listener slot and failure handler. An attached
/// listener keeps running after the last handle is dropped.
pub struct TransactionSubscription<T: Transport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: Transport> {
    pending: PendingOperation,
    transport: Arc<T>,
    timeout: Duration,
    slot: Mutex<Slot>,
    on_failure: Mutex<Option<FailureCallback>>,
    /// Serializes callback execution
    dispatch: tokio::sync::Mutex<()>,
}

/// Releases a claimed slot unless registration reached the transport.
struct Reservation<'a, T: Transport> {
    inner: &'a Inner<T>,
    generation: u64,
}

impl<T: Transport> Drop for Reservation<'_, T> {
    fn drop(&mut self) {
        self.inner.release(self.generation);
    }
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveListener>,
    next_generation: u64,
    terminated: bool,
}

impl Slot {
    fn is_attached(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.registration.is_some())
    }
}

struct ActiveListener {
    generation: u64,
    callback: ConfirmationCallback,
    /// `None` while the pending handle is still resolving
    registration: Option<(ListenerKey, ListenerId)>,
    timer: Option<JoinHandle<()>>,
    delivered: bool,
}

impl<T: Transport> TransactionSubscription<T> {
    pub fn new(pending: PendingOperation, transport: Arc<T>) -> Self {
        Self::with_timeout(pending, transport, DEFAULT_CONFIRMATION_TIMEOUT)
    }

    pub fn with_timeout(pending: PendingOperation, transport: Arc<T>, timeout: Duration) -> Self {
        metrics::record_created();

        Self {
            inner: Arc::new(Inner {
                pending,
                transport,
                timeout,
                slot: Mutex::new(Slot::default()),
                on_failure: Mutex::new(None),
                dispatch: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn pending(&self) -> &PendingOperation {
        &self.inner.pending
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Hash of the submitted transaction, once the submission has resolved.
    pub fn hash(&self) -> Option<TxHash> {
        self.inner
            .pending
            .try_get()
            .and_then(|result| result.ok())
            .map(|tx| tx.hash)
    }

    pub fn state(&self) -> SubscriptionState {
        let slot = self.inner.slot.lock();
        if slot.is_attached() {
            SubscriptionState::Listening
        } else if slot.terminated {
            SubscriptionState::Terminated
        } else if self.inner.pending.is_resolved() {
            SubscriptionState::Idle
        } else {
            SubscriptionState::Pending
        }
    }

    /// True iff a confirmation listener is attached to the transport.
    ///
    /// A registration still waiting for the submission to resolve is not
    /// attached yet, but it already blocks a second registration.
    pub fn has_listener(&self) -> bool {
        self.inner.slot.lock().is_attached()
    }

    /// Set the sole failure handler, replacing any previous one.
    ///
    /// Receives timeouts, callback failures and receipt lookup errors. Without
    /// a handler those errors are logged and dropped.
    pub fn on_failure<F>(&self, callback: F)
    where
        F: Fn(SubscriptionError) + Send + Sync + 'static,
    {
        *self.inner.on_failure.lock() = Some(Arc::new(callback));
    }

    /// Register the confirmation listener.
    ///
    /// Fails with [`SubscriptionError::AlreadyListening`] if one is registered.
    /// Otherwise waits for the submission to resolve and attaches to the
    /// transport: if the transaction is already included the callback runs on
    /// every following block, else it runs once when the receipt arrives.
    ///
    /// Dropping the returned future before it completes gives the slot back.
    /// Once attached, the listener outlives every handle to the subscription
    /// and only retires on delivery, timeout or explicit removal.
    pub async fn on_confirmation<F>(&self, callback: F) -> Result<(), SubscriptionError>
    where
        F: Fn(&Receipt) -> eyre::Result<()> + Send + Sync + 'static,
    {
        let reservation = Reservation {
            generation: self.inner.reserve(Arc::new(callback))?,
            inner: &self.inner,
        };

        let tx = self.inner.pending.resolve().await?;
        let existing = self.inner.transport.get_receipt(tx.hash).await?;

        let key = if existing.is_some() {
            ListenerKey::Block
        } else {
            ListenerKey::Transaction(tx.hash)
        };

        Inner::attach(&self.inner, reservation.generation, tx.hash, key);
        Ok(())
    }

    /// Deregister the confirmation listener. No-op without one.
    pub fn remove_listener(&self) {
        self.inner.retire();
    }

    /// Alias of [`Self::remove_listener`].
    pub fn off(&self) {
        self.remove_listener();
    }

    /// Alias of [`Self::remove_listener`].
    pub fn unsubscribe(&self) {
        self.remove_listener();
    }

    /// Alias of [`Self::remove_listener`].
    pub fn remove_all_listeners(&self) {
        self.remove_listener();
    }

    /// Wait until the transaction is included, without registering a listener.
    pub async fn wait_for_settlement(&self) -> Result<Receipt, SubscriptionError> {
        let tx = self.inner.pending.resolve().await?;
        Ok(self.inner.transport.wait_for_inclusion(tx.hash).await?)
    }
}

impl<T: Transport> Clone for TransactionSubscription<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for TransactionSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionSubscription")
            .field("state", &self.state())
            .field("hash", &self.hash())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl<T: Transport> Inner<T> {
    /// Claim the listener slot.
    fn reserve(&self, callback: ConfirmationCallback) -> Result<u64, SubscriptionError> {
        let mut slot = self.slot.lock();
        if slot.active.is_some() {
            return Err(SubscriptionError::AlreadyListening);
        }

        let generation = slot.next_generation;
        slot.next_generation += 1;
        slot.active = Some(ActiveListener {
            generation,
            callback,
            registration: None,
            timer: None,
            delivered: false,
        });

        Ok(generation)
    }

    /// Give the slot back after a failed or abandoned registration.
    fn release(&self, generation: u64) {
        let mut slot = self.slot.lock();
        if slot
            .active
            .as_ref()
            .is_some_and(|active| active.generation == generation && active.registration.is_none())
        {
            slot.active = None;
            debug!("Unattached confirmation listener released");
        }
    }

    /// The transport listener and the timer own the subscription until the
    /// listener retires, so dropping every handle does not cancel it.
    fn attach(this: &Arc<Self>, generation: u64, hash: TxHash, key: ListenerKey) {
        let inner = this.clone();
        let handle = Handle::current();
        let listener: Listener = Arc::new(move |event: TransportEvent| {
            handle.spawn(inner.clone().deliver(generation, hash, event));
        });

        let id = this.transport.on(key, listener);

        let attached = {
            let mut slot = this.slot.lock();
            match slot.active.as_mut() {
                Some(active) if active.generation == generation => {
                    active.registration = Some((key, id));
                    active.timer = Some(Self::start_timer(this, generation));
                    true
                }
                _ => false,
            }
        };

        if attached {
            metrics::record_listener_attached();
            debug!(
                hash = %hash,
                ?key,
                timeout_ms = this.timeout.as_millis() as u64,
                "Confirmation listener attached"
            );
        } else {
            // Removed while the submission was resolving
            this.transport.remove_listener(&key, id);
            debug!(hash = %hash, "Listener removed before attaching");
        }
    }

    fn start_timer(this: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let inner = this.clone();

        tokio::spawn(async move {
            time::sleep(inner.timeout).await;
            inner.expire(generation);
        })
    }

    async fn deliver(self: Arc<Self>, generation: u64, hash: TxHash, event: TransportEvent) {
        let _guard = self.dispatch.lock().await;

        if !self.is_active(generation) {
            return;
        }

        let (receipt, once) = match event {
            TransportEvent::Receipt(receipt) => (receipt, true),
            TransportEvent::Block(_) => match self.transport.get_receipt(hash).await {
                Ok(Some(receipt)) => (receipt, false),
                Ok(None) => {
                    debug!(hash = %hash, "Receipt no longer available");
                    return;
                }
                Err(e) => {
                    self.fail(e.into());
                    return;
                }
            },
        };

        // The listener may have been retired while the receipt was looked up
        let Some(callback) = self.claim_delivery(generation) else {
            return;
        };

        info!(
            hash = %hash,
            block = receipt.block_number,
            confirmations = receipt.confirmations,
            status = receipt.status,
            "Transaction confirmed"
        );
        metrics::record_confirmation();

        if let Err(e) = invoke(&callback, &receipt) {
            metrics::record_callback_failure();
            self.fail(SubscriptionError::CallbackFailure(Arc::new(e)));
        }

        if once {
            if let Some(active) = self.take_active(Some(generation)) {
                self.deregister(active);
            }
        }
    }

    fn is_active(&self, generation: u64) -> bool {
        self.slot
            .lock()
            .active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    fn claim_delivery(&self, generation: u64) -> Option<ConfirmationCallback> {
        let mut slot = self.slot.lock();
        let active = slot
            .active
            .as_mut()
            .filter(|active| active.generation == generation)?;
        active.delivered = true;
        Some(active.callback.clone())
    }

    fn expire(&self, generation: u64) {
        let Some(mut active) = self.take_active(Some(generation)) else {
            return;
        };

        // This runs on the timer task itself
        active.timer = None;
        let delivered = active.delivered;
        self.deregister(active);
        metrics::record_timeout();

        if delivered {
            debug!(timeout_ms = self.timeout.as_millis() as u64, "Listener retired");
        } else {
            self.fail(SubscriptionError::Timeout(self.timeout));
        }
    }

    fn retire(&self) {
        if let Some(active) = self.take_active(None) {
            self.deregister(active);
            debug!("Confirmation listener removed");
        }
    }

    /// Empty the slot, optionally only if it holds `generation`.
    fn take_active(&self, generation: Option<u64>) -> Option<ActiveListener> {
        let mut slot = self.slot.lock();
        let current = slot.active.as_ref()?.generation;
        if generation.is_some_and(|expected| expected != current) {
            return None;
        }

        slot.terminated = true;
        slot.active.take()
    }

    fn deregister(&self, mut active: ActiveListener) {
        if let Some((key, id)) = active.registration.take() {
            self.transport.remove_listener(&key, id);
            metrics::record_listener_detached();
        }

        if let Some(timer) = active.timer.take() {
            timer.abort();
        }
    }

    fn fail(&self, error: SubscriptionError) {
        let handler = self.on_failure.lock().clone();
        match handler {
            Some(handler) => handler(error),
            None => warn!(error = %error, "No failure handler registered, dropping error"),
        }
    }
}

impl<T: Transport> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(active) = self.slot.get_mut().active.take() {
            self.deregister(active);
        }
    }
}

fn invoke(callback: &ConfirmationCallback, receipt: &Receipt) -> eyre::Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(receipt))) {
        Ok(result) => result,
        Err(payload) => Err(eyre::eyre!(
            "callback panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
