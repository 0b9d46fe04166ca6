//! Cooperative cancellation of bulk operations.
//!
//! A [`CancelRx`] is checked before each step of an operation and raced against backend calls
//! other than the final set-based statement, which runs to completion once sent. A cancelled
//! operation still drops its staging relation before returning [`ErrorKind::Cancelled`].

use std::future::Future;

use tokio::sync::watch;

use crate::bail;
use crate::bulk_error;
use crate::error::{BulkResult, ErrorKind};

/// Transmitter side of the cancellation channel.
#[derive(Debug, Clone)]
pub struct CancelTx(watch::Sender<bool>);

impl CancelTx {
    /// Wraps a watch sender into a [`CancelTx`].
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Requests every subscribed operation to stop.
    pub fn cancel(&self) {
        // Infallible, so cancelling works even when no operation is subscribed.
        self.0.send_replace(true);
    }

    /// Creates a new cancellation receiver subscription.
    pub fn subscribe(&self) -> CancelRx {
        self.0.subscribe()
    }
}

/// Receiver side of the cancellation channel.
pub type CancelRx = watch::Receiver<bool>;

/// Creates a new cancellation channel in the not cancelled state.
pub fn create_cancel_signal() -> (CancelTx, CancelRx) {
    let (tx, rx) = watch::channel(false);
    (CancelTx::new(tx), rx)
}

/// Fails with [`ErrorKind::Cancelled`] if cancellation was requested.
pub(crate) fn ensure_not_cancelled(cancel_rx: Option<&CancelRx>) -> BulkResult<()> {
    if let Some(cancel_rx) = cancel_rx
        && *cancel_rx.borrow()
    {
        bail!(
            ErrorKind::Cancelled,
            "Bulk operation cancelled",
            "Cancellation was requested before the next step started"
        );
    }

    Ok(())
}

/// Runs a future until it completes or cancellation is requested, whichever comes first.
///
/// A dropped [`CancelTx`] never cancels.
pub(crate) async fn run_cancellable<F, T>(cancel_rx: Option<&CancelRx>, future: F) -> BulkResult<T>
where
    F: Future<Output = BulkResult<T>>,
{
    let Some(cancel_rx) = cancel_rx else {
        return future.await;
    };

    let mut cancel_rx = cancel_rx.clone();
    let cancelled = async move {
        if cancel_rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        biased;

        _ = cancelled => Err(bulk_error!(
            ErrorKind::Cancelled,
            "Bulk operation cancelled",
            "Cancellation was requested while waiting on the database"
        )),
        result = future => result,
    }
}
