//! Per-request cancellation and status reporting.

use std::sync::Arc;

use rota_core::{RequestStatus, Result, RotaError};
use tokio::sync::watch;

/// Called on every status transition of a request.
pub type StatusCallback = Arc<dyn Fn(RequestStatus) + Send + Sync>;

/// Cancels the request its token was handed to.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// A linked handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

/// Optional hooks a caller attaches to one change request.
#[derive(Clone, Default)]
pub struct RequestContext {
    cancel: Option<CancelToken>,
    on_status: Option<StatusCallback>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("cancel", &self.cancel)
            .field("on_status", &self.on_status.is_some())
            .finish()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_status(mut self, callback: StatusCallback) -> Self {
        self.on_status = Some(callback);
        self
    }

    pub fn report(&self, status: RequestStatus) {
        if let Some(callback) = &self.on_status {
            callback(status);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |t| t.is_cancelled())
    }

    /// Resolves once cancelled; pending forever without a token.
    pub async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Fail with `Cancelled` if cancellation was requested.
    pub fn ensure_active(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(RotaError::Cancelled {
                reason: format!("cancelled before {}", stage),
            });
        }
        Ok(())
    }
}
