use std::future::Future;
use tokio::sync::watch;
use tracing::warn;
use transport::{SubmittedTransaction, TransportError};

type Resolution = Option<Result<SubmittedTransaction, TransportError>>;

/// Handle to a submitted write that resolves to its hash and nonce.
///
/// The submission runs eagerly on its own task, so it proceeds whether or not
/// anyone awaits the handle. Clones observe the same resolution.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    receiver: watch::Receiver<Resolution>,
}

impl PendingOperation {
    /// Run `submission` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(submission: F) -> Self
    where
        F: Future<Output = Result<SubmittedTransaction, TransportError>> + Send + 'static,
    {
        let (sender, receiver) = watch::channel(None);

        tokio::spawn(async move {
            let result = submission.await;
            if let Err(e) = &result {
                warn!(error = %e, "Submission failed");
            }
            sender.send_replace(Some(result));
        });

        Self { receiver }
    }

    /// Handle that is already resolved.
    pub fn resolved(tx: SubmittedTransaction) -> Self {
        let (_, receiver) = watch::channel(Some(Ok(tx)));
        Self { receiver }
    }

    /// Wait for the submission to resolve.
    pub async fn resolve(&self) -> Result<SubmittedTransaction, TransportError> {
        let mut receiver = self.receiver.clone();
        let resolution = receiver
            .wait_for(Option::is_some)
            .await
            .map(|value| value.clone());

        match resolution {
            Ok(Some(result)) => result,
            _ => Err(TransportError::Aborted),
        }
    }

    /// Resolution if already available.
    pub fn try_get(&self) -> Option<Result<SubmittedTransaction, TransportError>> {
        self.receiver.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.receiver.borrow().is_some()
    }
}
