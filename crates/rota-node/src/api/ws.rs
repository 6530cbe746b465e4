//! WebSocket endpoints.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use chrono::NaiveDate;
use futures::StreamExt;
use rota_core::{DateRange, EmployeeNumber, RequestStatus};
use rota_state::SubscriptionFilter;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::state::AppState;

/// Messages sent on the change request stream.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestStreamMessage {
    StatusUpdate { request_id: Uuid, status: RequestStatus },
    Error { message: String },
}

/// Optional narrowing of the schedule stream.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleStreamQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub employee: Option<EmployeeNumber>,
}

impl ScheduleStreamQuery {
    fn filter(&self) -> SubscriptionFilter {
        let range = match (self.start, self.end) {
            (None, None) => None,
            (start, end) => DateRange::new(start.unwrap_or(NaiveDate::MIN), end.unwrap_or(NaiveDate::MAX)).ok(),
        };
        SubscriptionFilter {
            range,
            employee: self.employee.clone(),
            change_types: None,
        }
    }
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, msg: &T) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode websocket message");
            false
        }
    }
}

/// Status stream for one change request; closes at a terminal status.
pub async fn request_stream(
    ws: WebSocketUpgrade,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_request_stream(socket, id, state))
}

async fn handle_request_stream(mut socket: WebSocket, request_id: Uuid, state: AppState) {
    let Some(record) = state.get_request(request_id).await else {
        let msg = RequestStreamMessage::Error {
            message: format!("Change request {} not found", request_id),
        };
        send_json(&mut socket, &msg).await;
        return;
    };

    let mut statuses = WatchStream::new(record.status);
    loop {
        tokio::select! {
            status = statuses.next() => {
                let Some(status) = status else { break };
                let msg = RequestStreamMessage::StatusUpdate { request_id, status };
                if !send_json(&mut socket, &msg).await || status.is_terminal() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Committed schedule changes as they happen.
pub async fn schedule_stream(
    ws: WebSocketUpgrade,
    Query(query): Query<ScheduleStreamQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_schedule_stream(socket, query.filter(), state))
}

async fn handle_schedule_stream(mut socket: WebSocket, filter: SubscriptionFilter, state: AppState) {
    let subscriptions = state.store.subscriptions();
    let mut subscription = subscriptions.subscribe(filter).await;
    let subscription_id = subscription.id;

    let hello = serde_json::json!({
        "type": "connected",
        "version": state.store.version().await,
        "subscription_id": subscription_id,
    });
    if socket.send(Message::Text(hello.to_string())).await.is_err() {
        subscriptions.unsubscribe(subscription_id).await;
        return;
    }

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else { break };
                let msg = serde_json::json!({ "type": "schedule_change", "event": event });
                if socket.send(Message::Text(msg.to_string())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    subscriptions.unsubscribe(subscription_id).await;
}
