//! Runs change requests in the background and tracks them.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rota_core::{RequestStatus, RotaError};
use rota_resolver::{cancel_pair, RequestContext};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::{AppState, RequestRecord};

/// Change request executor.
pub struct Engine {
    state: AppState,
}

impl Engine {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Track a new request and start processing it.
    ///
    /// The returned handle finishes once the outcome is recorded.
    pub async fn submit(&self, text: String, current_date: NaiveDate) -> (Uuid, JoinHandle<()>) {
        let id = Uuid::new_v4();
        let (status_tx, status_rx) = watch::channel(RequestStatus::Received);
        let (cancel, token) = cancel_pair();

        self.state
            .store_request(RequestRecord {
                id,
                text: text.clone(),
                current_date,
                received_at: Utc::now(),
                status: status_rx,
                cancel,
                result: None,
                error: None,
            })
            .await;

        let state = self.state.clone();
        let task = tokio::spawn(async move {
            let ctx = RequestContext::new()
                .with_cancel(token)
                .on_status(Arc::new(move |status| {
                    status_tx.send_replace(status);
                }));

            info!(request = %id, "Processing change request");
            let outcome = state
                .pipeline
                .process_change_request_with(&text, current_date, &ctx)
                .await;

            match &outcome {
                Ok(result) => info!(request = %id, status = ?result.status(), "Change request finished"),
                Err(RotaError::Cancelled { .. }) => info!(request = %id, "Change request cancelled"),
                Err(e) => error!(request = %id, error = %e, "Change request failed"),
            }
            state.finish_request(id, outcome).await;
        });

        (id, task)
    }

    /// Ask a running request to stop. Returns `None` for unknown ids.
    ///
    /// Only honoured before the commit starts; the caller sees the real
    /// outcome through the request's status.
    pub async fn cancel(&self, id: Uuid) -> Option<RequestRecord> {
        let record = self.state.get_request(id).await?;
        if record.current_status().is_active() {
            record.cancel.cancel();
            info!(request = %id, "Cancellation requested");
        }
        Some(record)
    }
}
