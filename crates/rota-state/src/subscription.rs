//! Change notifications for committed schedule writes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rota_core::{DateRange, EmployeeNumber, ScheduleEntry};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// One date changed by a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleChangeEvent {
    pub date: NaiveDate,

    /// Entry after the commit (None if the date was cleared).
    pub new_entry: Option<ScheduleEntry>,

    /// Entry before the commit (None if the date had no entry).
    pub old_entry: Option<ScheduleEntry>,

    pub change_type: ChangeType,

    /// Commit that produced this change.
    pub commit_id: Uuid,

    pub timestamp: DateTime<Utc>,
}

impl ScheduleChangeEvent {
    /// True if `employee` is assigned before or after the change.
    pub fn involves(&self, employee: &EmployeeNumber) -> bool {
        [&self.old_entry, &self.new_entry]
            .into_iter()
            .flatten()
            .any(|entry| entry.assignments.values().any(|e| e == employee))
    }
}

/// Type of schedule change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Date had no entry before.
    Created,
    /// Existing entry replaced.
    Updated,
    /// Entry cleared.
    Deleted,
}

/// Narrows which committed dates a subscriber hears about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// Only dates inside this range.
    pub range: Option<DateRange>,

    /// Only changes touching this employee.
    pub employee: Option<EmployeeNumber>,

    /// Only these kinds of change; all when `None`.
    pub change_types: Option<Vec<ChangeType>>,
}

impl SubscriptionFilter {
    pub fn range(range: DateRange) -> Self {
        Self {
            range: Some(range),
            ..Default::default()
        }
    }

    pub fn employee(employee: impl Into<EmployeeNumber>) -> Self {
        Self {
            employee: Some(employee.into()),
            ..Default::default()
        }
    }

    /// Whether `event` passes every criterion that is set.
    pub fn matches(&self, event: &ScheduleChangeEvent) -> bool {
        if let Some(range) = &self.range {
            if !range.contains(event.date) {
                return false;
            }
        }

        if let Some(employee) = &self.employee {
            if !event.involves(employee) {
                return false;
            }
        }

        if let Some(types) = &self.change_types {
            if !types.contains(&event.change_type) {
                return false;
            }
        }

        true
    }
}

/// A subscription to schedule changes.
pub struct ScheduleSubscription {
    pub id: Uuid,
    pub filter: SubscriptionFilter,
    pub receiver: broadcast::Receiver<ScheduleChangeEvent>,
}

impl ScheduleSubscription {
    /// Next event that passes the filter; `None` once the store is gone.
    ///
    /// Lagging subscribers skip the events they missed.
    pub async fn next(&mut self) -> Option<ScheduleChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(subscription = %self.id, skipped, "Subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Fan-out of commit events to subscribers.
pub struct SubscriptionManager {
    sender: broadcast::Sender<ScheduleChangeEvent>,

    /// Live subscribers by id.
    subscriptions: Arc<RwLock<HashMap<Uuid, SubscriptionFilter>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn subscribe(&self, filter: SubscriptionFilter) -> ScheduleSubscription {
        let id = Uuid::new_v4();
        let receiver = self.sender.subscribe();

        let mut subs = self.subscriptions.write().await;
        subs.insert(id, filter.clone());

        ScheduleSubscription { id, filter, receiver }
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        let mut subs = self.subscriptions.write().await;
        subs.remove(&id);
    }

    /// Broadcast an event. Subscribers filter locally.
    pub fn publish(&self, event: ScheduleChangeEvent) {
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
