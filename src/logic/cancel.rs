use std::future::Future;
use tokio::sync::watch;

use crate::error::{PreviewError, PreviewResult};

/// Cancels every load guarded by the paired [`CancelToken`]s.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Runs `fut` unless the request is cancelled first, in which case the
    /// future is dropped and `Cancelled` is returned.
    pub async fn guard<T, F>(&self, fut: F) -> PreviewResult<T>
    where
        F: Future<Output = PreviewResult<T>>,
    {
        if self.is_cancelled() {
            return Err(PreviewError::Cancelled);
        }

        let mut rx = self.rx.clone();
        let cancelled = async move {
            // A dropped handle can no longer cancel.
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = fut => result,
            _ = cancelled => Err(PreviewError::Cancelled),
        }
    }
}
