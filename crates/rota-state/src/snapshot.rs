//! Point-in-time copies of the store.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rota_core::{DateRange, Employee, ScheduleEntry};
use rota_rules::RuleSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point-in-time snapshot of schedule, roster and rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Unique ID for this snapshot.
    pub id: Uuid,

    /// Store version at snapshot time.
    pub version: u64,

    /// Roster and rule-set version at snapshot time.
    pub catalog_version: u64,

    pub timestamp: DateTime<Utc>,

    /// Live entries by date.
    pub entries: BTreeMap<NaiveDate, ScheduleEntry>,

    pub roster: Vec<Employee>,

    pub rules: RuleSet,
}

impl StoreSnapshot {
    pub fn get(&self, date: NaiveDate) -> Option<&ScheduleEntry> {
        self.entries.get(&date)
    }

    pub fn range(&self, range: DateRange) -> Vec<&ScheduleEntry> {
        self.entries
            .range(range.start..=range.end)
            .map(|(_, e)| e)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare persisted content, ignoring snapshot identity and capture time.
    pub fn same_state(&self, other: &StoreSnapshot) -> bool {
        self.version == other.version
            && self.catalog_version == other.catalog_version
            && self.entries == other.entries
            && self.roster == other.roster
            && self.rules == other.rules
    }
}
