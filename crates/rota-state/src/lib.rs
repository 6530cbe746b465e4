//! # Rota State
//!
//! Versioned schedule store.
//!
//! Every date carries a version token. Writes name the version they were
//! derived from and are rejected as stale when the store has moved on, so two
//! requests racing on the same dates can never both land.

pub mod snapshot;
pub mod store;
pub mod subscription;

pub use snapshot::StoreSnapshot;
pub use store::{EmployeeUpdate, InMemoryScheduleStore, ScheduleStore, StoredEntry};
pub use subscription::{ChangeType, ScheduleChangeEvent, ScheduleSubscription, SubscriptionFilter, SubscriptionManager};
