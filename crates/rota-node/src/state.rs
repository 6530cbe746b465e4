//! Application state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rota_core::{ChangeResult, RequestStatus, RotaError};
use rota_resolver::{CancelHandle, ChangePipeline};
use rota_state::ScheduleStore;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Tracked change requests.
    pub requests: Arc<RwLock<HashMap<Uuid, RequestRecord>>>,

    /// The change pipeline.
    pub pipeline: Arc<ChangePipeline>,

    /// The schedule store behind the pipeline.
    pub store: Arc<dyn ScheduleStore>,

    /// How many requests to keep once they have an outcome.
    request_limit: usize,
}

/// One change request and where it is in the pipeline.
#[derive(Clone)]
pub struct RequestRecord {
    pub id: Uuid,
    pub text: String,
    pub current_date: NaiveDate,
    pub received_at: DateTime<Utc>,

    /// Latest status; updated by the pipeline as it moves.
    pub status: watch::Receiver<RequestStatus>,

    pub cancel: CancelHandle,

    /// Terminal outcome, once there is one.
    pub result: Option<ChangeResult>,

    /// Error (if failed or cancelled).
    pub error: Option<RotaError>,
}

impl RequestRecord {
    pub fn current_status(&self) -> RequestStatus {
        *self.status.borrow()
    }

    /// True once the outcome has been recorded.
    pub fn is_finished(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }
}

/// Drop the oldest finished requests until at most `limit` remain.
/// Requests still in flight are never dropped.
fn evict_finished(requests: &mut HashMap<Uuid, RequestRecord>, limit: usize) {
    let Some(excess) = requests.len().checked_sub(limit).filter(|n| *n > 0) else {
        return;
    };
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = requests
        .values()
        .filter(|r| r.is_finished())
        .map(|r| (r.received_at, r.id))
        .collect();
    finished.sort();
    for (_, id) in finished.into_iter().take(excess) {
        requests.remove(&id);
    }
}

impl AppState {
    pub fn new(pipeline: ChangePipeline, request_limit: usize) -> Self {
        let store = pipeline.store().clone();
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            pipeline: Arc::new(pipeline),
            store,
            request_limit,
        }
    }

    /// Track a request.
    pub async fn store_request(&self, record: RequestRecord) {
        let mut requests = self.requests.write().await;
        requests.insert(record.id, record);
        evict_finished(&mut requests, self.request_limit);
    }

    /// Get a request by ID.
    pub async fn get_request(&self, id: Uuid) -> Option<RequestRecord> {
        let requests = self.requests.read().await;
        requests.get(&id).cloned()
    }

    /// Record the terminal outcome of a request.
    pub async fn finish_request(&self, id: Uuid, outcome: Result<ChangeResult, RotaError>) {
        let mut requests = self.requests.write().await;
        if let Some(record) = requests.get_mut(&id) {
            match outcome {
                Ok(result) => record.result = Some(result),
                Err(error) => record.error = Some(error),
            }
        }
    }

    /// All requests, newest first.
    pub async fn list_requests(&self) -> Vec<RequestRecord> {
        let requests = self.requests.read().await;
        let mut records: Vec<RequestRecord> = requests.values().cloned().collect();
        records.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        records
    }
}
