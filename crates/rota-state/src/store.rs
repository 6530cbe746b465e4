//! Schedule store implementations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rota_core::{
    CommitRecord, DateRange, EditSet, Employee, EmployeeNumber, Result, Role, RotaError,
    ScheduleEntry,
};
use rota_rules::RuleSet;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::snapshot::StoreSnapshot;
use crate::subscription::{ChangeType, ScheduleChangeEvent, SubscriptionManager};

/// One version of a date's entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub entry: ScheduleEntry,

    /// When this version was written.
    pub timestamp: DateTime<Utc>,

    /// Whether this version cleared the date (tombstone).
    pub deleted: bool,
}

/// Partial employee update; `None` leaves the field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub known_absences: Option<BTreeSet<NaiveDate>>,
    pub metadata: Option<serde_json::Value>,
}

/// Trait for schedule stores.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Current entry for a date.
    async fn get(&self, date: NaiveDate) -> Result<Option<ScheduleEntry>>;

    /// Current entries inside `range`, ascending by date.
    async fn range(&self, range: DateRange) -> Result<Vec<ScheduleEntry>>;

    /// Apply an edit set atomically.
    ///
    /// Fails with `StaleWrite` if any entry or guard version moved since it
    /// was read, and with `ReferentialIntegrity` if the result would name an
    /// unknown employee. On failure nothing is written.
    async fn put(&self, edits: &EditSet) -> Result<CommitRecord>;

    /// Every version ever written for a date, oldest first.
    async fn history(&self, date: NaiveDate) -> Result<Vec<StoredEntry>>;

    /// Entry for a date as of a store version.
    async fn entry_at(&self, date: NaiveDate, version: u64) -> Result<Option<ScheduleEntry>>;

    /// Roster in registration order.
    async fn roster(&self) -> Result<Vec<Employee>>;

    async fn employee(&self, number: &EmployeeNumber) -> Result<Employee>;

    async fn register_employee(&self, employee: Employee) -> Result<Employee>;

    async fn update_employee(&self, number: &EmployeeNumber, update: EmployeeUpdate) -> Result<Employee>;

    /// Remove an employee. Fails if any current entry still assigns them.
    async fn remove_employee(&self, number: &EmployeeNumber) -> Result<Employee>;

    async fn rules(&self) -> Result<RuleSet>;

    async fn replace_rules(&self, rules: RuleSet) -> Result<()>;

    /// Most recent commits, newest first.
    async fn commits(&self, limit: usize) -> Result<Vec<CommitRecord>>;

    /// Days each employee holds each role within `range`.
    async fn assignment_counts(&self, range: DateRange) -> Result<BTreeMap<EmployeeNumber, BTreeMap<Role, usize>>>;

    /// Point-in-time copy of everything the store holds.
    async fn snapshot(&self) -> Result<StoreSnapshot>;

    fn subscriptions(&self) -> &SubscriptionManager;

    /// Version of the last schedule commit.
    async fn version(&self) -> u64;

    /// Version of the roster and rule set.
    async fn catalog_version(&self) -> u64;
}

struct Inner {
    /// date -> list of versions (append-only).
    entries: BTreeMap<NaiveDate, Vec<StoredEntry>>,
    roster: Vec<Employee>,
    rules: RuleSet,
    commits: Vec<CommitRecord>,
    version: u64,
    catalog_version: u64,
}

impl Inner {
    fn live(&self, date: NaiveDate) -> Option<&ScheduleEntry> {
        self.entries
            .get(&date)
            .and_then(|versions| versions.last())
            .filter(|stored| !stored.deleted)
            .map(|stored| &stored.entry)
    }

    fn live_version(&self, date: NaiveDate) -> Option<u64> {
        self.live(date).map(|e| e.version)
    }

    fn live_entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries
            .values()
            .filter_map(|versions| versions.last())
            .filter(|stored| !stored.deleted)
            .map(|stored| &stored.entry)
    }

    fn position(&self, number: &EmployeeNumber) -> Option<usize> {
        self.roster.iter().position(|e| &e.employee_number == number)
    }

    /// Dates whose reads no longer hold.
    fn stale_dates(&self, edits: &EditSet) -> Vec<NaiveDate> {
        let mut stale: Vec<NaiveDate> = edits
            .entries
            .iter()
            .filter(|e| self.live_version(e.date) != e.expected_version)
            .map(|e| e.date)
            .chain(
                edits
                    .guards
                    .iter()
                    .filter(|g| self.live_version(g.date) != g.expected_version)
                    .map(|g| g.date),
            )
            .collect();

        if let Some(expected) = edits.catalog_version {
            if expected != self.catalog_version {
                stale.extend(edits.entries.iter().map(|e| e.date));
                stale.extend(edits.absences.iter().map(|a| a.date));
            }
        }

        stale.sort();
        stale.dedup();
        stale
    }
}

/// In-memory implementation of [`ScheduleStore`].
///
/// A single lock guards entries, roster and rules, so a commit's checks and
/// writes happen in one critical section.
pub struct InMemoryScheduleStore {
    inner: Arc<RwLock<Inner>>,
    subscriptions: Arc<SubscriptionManager>,
}

impl InMemoryScheduleStore {
    /// Empty store with the default rule set.
    pub fn new() -> Self {
        Self::with_rules(RuleSet::default_rules())
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: BTreeMap::new(),
                roster: Vec::new(),
                rules,
                commits: Vec::new(),
                version: 0,
                catalog_version: 0,
            })),
            subscriptions: Arc::new(SubscriptionManager::new()),
        }
    }
}

impl Default for InMemoryScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<ScheduleEntry>> {
        let inner = self.inner.read().await;
        Ok(inner.live(date).cloned())
    }

    async fn range(&self, range: DateRange) -> Result<Vec<ScheduleEntry>> {
        let inner = self.inner.read().await;
        let entries = inner
            .entries
            .range(range.start..=range.end)
            .filter_map(|(_, versions)| versions.last())
            .filter(|stored| !stored.deleted)
            .map(|stored| stored.entry.clone())
            .collect();
        Ok(entries)
    }

    async fn put(&self, edits: &EditSet) -> Result<CommitRecord> {
        if edits.is_empty() {
            return Err(RotaError::InvalidInput(
                "edit set changes nothing".to_string(),
            ));
        }

        let mut distinct = BTreeSet::new();
        if let Some(dup) = edits.entries.iter().find(|e| !distinct.insert(e.date)) {
            return Err(RotaError::InvalidInput(format!(
                "edit set touches {} more than once",
                dup.date
            )));
        }

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let stale = inner.stale_dates(edits);
        if !stale.is_empty() {
            tracing::debug!(dates = ?stale, "Rejected stale write");
            return Err(RotaError::StaleWrite { dates: stale });
        }

        for number in edits.referenced_employees() {
            if inner.position(number).is_none() {
                return Err(RotaError::ReferentialIntegrity {
                    employee_number: number.clone(),
                    context: "not on the roster".to_string(),
                });
            }
        }

        inner.version += 1;
        let version = inner.version;
        let record = CommitRecord::new(version, edits.clone());
        let now = record.timestamp;

        let mut events = Vec::new();
        for edit in edits.entries.iter().filter(|e| !e.is_noop()) {
            let old_entry = inner.live(edit.date).cloned();
            let deleted = edit.after.is_empty();
            let entry = ScheduleEntry {
                date: edit.date,
                assignments: edit.after.clone(),
                version,
            };

            inner.entries.entry(edit.date).or_default().push(StoredEntry {
                entry: entry.clone(),
                timestamp: now,
                deleted,
            });

            let change_type = match (old_entry.is_some(), deleted) {
                (_, true) => ChangeType::Deleted,
                (false, false) => ChangeType::Created,
                (true, false) => ChangeType::Updated,
            };
            events.push(ScheduleChangeEvent {
                date: edit.date,
                new_entry: (!deleted).then_some(entry),
                old_entry,
                change_type,
                commit_id: record.id,
                timestamp: now,
            });
        }

        if !edits.absences.is_empty() {
            for absence in &edits.absences {
                if let Some(employee) = inner
                    .roster
                    .iter_mut()
                    .find(|e| e.employee_number == absence.employee_number)
                {
                    employee.known_absences.insert(absence.date);
                }
            }
            inner.catalog_version += 1;
        }

        inner.commits.push(record.clone());

        tracing::info!(
            commit = %record.id,
            version,
            dates = ?edits.dates(),
            fingerprint = %record.fingerprint,
            "Committed edit set"
        );

        for event in events {
            self.subscriptions.publish(event);
        }

        Ok(record)
    }

    async fn history(&self, date: NaiveDate) -> Result<Vec<StoredEntry>> {
        let inner = self.inner.read().await;
        Ok(inner.entries.get(&date).cloned().unwrap_or_default())
    }

    async fn entry_at(&self, date: NaiveDate, version: u64) -> Result<Option<ScheduleEntry>> {
        let inner = self.inner.read().await;
        let entry = inner
            .entries
            .get(&date)
            .and_then(|versions| versions.iter().rev().find(|s| s.entry.version <= version))
            .filter(|stored| !stored.deleted)
            .map(|stored| stored.entry.clone());
        Ok(entry)
    }

    async fn roster(&self) -> Result<Vec<Employee>> {
        let inner = self.inner.read().await;
        Ok(inner.roster.clone())
    }

    async fn employee(&self, number: &EmployeeNumber) -> Result<Employee> {
        let inner = self.inner.read().await;
        inner
            .roster
            .iter()
            .find(|e| &e.employee_number == number)
            .cloned()
            .ok_or_else(|| RotaError::employee_not_found(number))
    }

    async fn register_employee(&self, employee: Employee) -> Result<Employee> {
        employee.validate()?;

        let mut inner = self.inner.write().await;
        if inner.position(&employee.employee_number).is_some() {
            return Err(RotaError::Conflict(format!(
                "employee {} already registered",
                employee.employee_number
            )));
        }

        inner.roster.push(employee.clone());
        inner.catalog_version += 1;

        tracing::info!(employee = %employee.employee_number, name = %employee.name, "Registered employee");

        Ok(employee)
    }

    async fn update_employee(&self, number: &EmployeeNumber, update: EmployeeUpdate) -> Result<Employee> {
        let mut inner = self.inner.write().await;
        let index = inner
            .position(number)
            .ok_or_else(|| RotaError::employee_not_found(number))?;

        let mut employee = inner.roster[index].clone();
        if let Some(name) = update.name {
            employee.name = name;
        }
        if let Some(absences) = update.known_absences {
            employee.known_absences = absences;
        }
        if let Some(metadata) = update.metadata {
            employee.metadata = metadata;
        }
        employee.validate()?;

        inner.roster[index] = employee.clone();
        inner.catalog_version += 1;

        Ok(employee)
    }

    async fn remove_employee(&self, number: &EmployeeNumber) -> Result<Employee> {
        let mut inner = self.inner.write().await;
        let index = inner
            .position(number)
            .ok_or_else(|| RotaError::employee_not_found(number))?;

        let referenced_on = inner
            .live_entries()
            .find(|entry| entry.assignments.values().any(|e| e == number))
            .map(|entry| entry.date);
        if let Some(date) = referenced_on {
            return Err(RotaError::ReferentialIntegrity {
                employee_number: number.clone(),
                context: format!("still assigned on {}", date),
            });
        }

        let removed = inner.roster.remove(index);
        inner.catalog_version += 1;

        tracing::info!(employee = %number, "Removed employee");

        Ok(removed)
    }

    async fn rules(&self) -> Result<RuleSet> {
        let inner = self.inner.read().await;
        Ok(inner.rules.clone())
    }

    async fn replace_rules(&self, rules: RuleSet) -> Result<()> {
        rules.validate()?;

        let mut inner = self.inner.write().await;
        inner.rules = rules;
        inner.catalog_version += 1;

        tracing::info!(rules = inner.rules.rules.len(), "Replaced rule set");

        Ok(())
    }

    async fn commits(&self, limit: usize) -> Result<Vec<CommitRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.commits.iter().rev().take(limit).cloned().collect())
    }

    async fn assignment_counts(&self, range: DateRange) -> Result<BTreeMap<EmployeeNumber, BTreeMap<Role, usize>>> {
        let inner = self.inner.read().await;

        let mut counts: BTreeMap<EmployeeNumber, BTreeMap<Role, usize>> = inner
            .roster
            .iter()
            .map(|e| (e.employee_number.clone(), BTreeMap::new()))
            .collect();

        for entry in inner.live_entries().filter(|e| range.contains(e.date)) {
            for (role, employee) in &entry.assignments {
                *counts
                    .entry(employee.clone())
                    .or_default()
                    .entry(role.clone())
                    .or_default() += 1;
            }
        }

        Ok(counts)
    }

    async fn snapshot(&self) -> Result<StoreSnapshot> {
        let inner = self.inner.read().await;

        let entries = inner
            .live_entries()
            .map(|e| (e.date, e.clone()))
            .collect();

        Ok(StoreSnapshot {
            id: Uuid::new_v4(),
            version: inner.version,
            catalog_version: inner.catalog_version,
            timestamp: Utc::now(),
            entries,
            roster: inner.roster.clone(),
            rules: inner.rules.clone(),
        })
    }

    fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    async fn version(&self) -> u64 {
        self.inner.read().await.version
    }

    async fn catalog_version(&self) -> u64 {
        self.inner.read().await.catalog_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionFilter;
    use rota_core::{AbsenceEdit, Assignments, EntryEdit, VersionGuard};

    fn april(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn staffed(employee: &str) -> Assignments {
        let mut a = Assignments::new();
        a.insert(Role::first_line_support(), EmployeeNumber::new(employee));
        a
    }

    fn write(date: NaiveDate, expected_version: Option<u64>, before: Assignments, after: Assignments) -> EditSet {
        EditSet {
            entries: vec![EntryEdit {
                date,
                expected_version,
                before,
                after,
            }],
            ..EditSet::default()
        }
    }

    async fn store_with_roster() -> InMemoryScheduleStore {
        let store = InMemoryScheduleStore::new();
        store.register_employee(Employee::new("EMP001", "John Smith")).await.unwrap();
        store.register_employee(Employee::new("EMP002", "Jane Doe")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = store_with_roster().await;

        let record = store
            .put(&write(april(1), None, Assignments::new(), staffed("EMP001")))
            .await
            .unwrap();

        let entry = store.get(april(1)).await.unwrap().unwrap();
        assert_eq!(entry.version, record.version);
        assert_eq!(entry.assigned(&Role::first_line_support()).unwrap().as_str(), "EMP001");
        assert!(record.verify());
    }

    #[tokio::test]
    async fn test_stale_write_rejected() {
        let store = store_with_roster().await;
        store
            .put(&write(april(1), None, Assignments::new(), staffed("EMP001")))
            .await
            .unwrap();

        // Derived from "no entry", but an entry now exists.
        let err = store
            .put(&write(april(1), None, Assignments::new(), staffed("EMP002")))
            .await
            .unwrap_err();

        assert_eq!(err, RotaError::StaleWrite { dates: vec![april(1)] });
        assert_eq!(store.version().await, 1);
    }

    #[tokio::test]
    async fn test_guard_detects_write_skew() {
        let store = store_with_roster().await;
        let mut edits = write(april(1), None, Assignments::new(), staffed("EMP001"));
        edits.guards.push(VersionGuard {
            date: april(2),
            expected_version: None,
        });

        store
            .put(&write(april(2), None, Assignments::new(), staffed("EMP002")))
            .await
            .unwrap();

        let err = store.put(&edits).await.unwrap_err();
        assert_eq!(err, RotaError::StaleWrite { dates: vec![april(2)] });
        assert!(store.get(april(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_catalog_version_guard() {
        let store = store_with_roster().await;
        let mut edits = write(april(1), None, Assignments::new(), staffed("EMP001"));
        edits.catalog_version = Some(store.catalog_version().await);

        store
            .update_employee(
                &"EMP001".into(),
                EmployeeUpdate {
                    known_absences: Some([april(1)].into_iter().collect()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            store.put(&edits).await,
            Err(RotaError::StaleWrite { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_employee_rejected_without_partial_write() {
        let store = store_with_roster().await;
        let before = store.snapshot().await.unwrap();

        let mut edits = write(april(1), None, Assignments::new(), staffed("EMP001"));
        edits.entries.push(EntryEdit {
            date: april(2),
            expected_version: None,
            before: Assignments::new(),
            after: staffed("EMP404"),
        });

        let err = store.put(&edits).await.unwrap_err();
        assert!(matches!(err, RotaError::ReferentialIntegrity { .. }));
        assert!(before.same_state(&store.snapshot().await.unwrap()));
    }

    #[tokio::test]
    async fn test_clear_leaves_tombstone() {
        let store = store_with_roster().await;
        let first = store
            .put(&write(april(1), None, Assignments::new(), staffed("EMP001")))
            .await
            .unwrap();
        store
            .put(&write(april(1), Some(first.version), staffed("EMP001"), Assignments::new()))
            .await
            .unwrap();

        assert!(store.get(april(1)).await.unwrap().is_none());

        let history = store.history(april(1)).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].deleted);

        let then = store.entry_at(april(1), first.version).await.unwrap();
        assert_eq!(then.unwrap().version, first.version);
    }

    #[tokio::test]
    async fn test_absences_recorded_on_roster() {
        let store = store_with_roster().await;
        let catalog = store.catalog_version().await;
        let mut edits = EditSet::new();
        edits.absences.push(AbsenceEdit {
            employee_number: "EMP002".into(),
            date: april(3),
        });

        store.put(&edits).await.unwrap();

        let employee = store.employee(&"EMP002".into()).await.unwrap();
        assert!(employee.is_absent_on(april(3)));
        assert_eq!(store.catalog_version().await, catalog + 1);
    }

    #[tokio::test]
    async fn test_remove_referenced_employee_fails() {
        let store = store_with_roster().await;
        store
            .put(&write(april(1), None, Assignments::new(), staffed("EMP001")))
            .await
            .unwrap();

        let err = store.remove_employee(&"EMP001".into()).await.unwrap_err();
        assert!(matches!(err, RotaError::ReferentialIntegrity { .. }));

        let removed = store.remove_employee(&"EMP002".into()).await.unwrap();
        assert_eq!(removed.name, "Jane Doe");
        assert_eq!(store.roster().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let store = store_with_roster().await;
        let err = store
            .register_employee(Employee::new("EMP001", "Someone Else"))
            .await
            .unwrap_err();
        assert!(matches!(err, RotaError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_commits_newest_first_and_counts() {
        let store = store_with_roster().await;
        store
            .put(&write(april(1), None, Assignments::new(), staffed("EMP001")))
            .await
            .unwrap();
        let second = store
            .put(&write(april(2), None, Assignments::new(), staffed("EMP001")))
            .await
            .unwrap();

        let commits = store.commits(10).await.unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, second.id);

        let week = DateRange::new(april(1), april(7)).unwrap();
        let counts = store.assignment_counts(week).await.unwrap();
        assert_eq!(counts[&EmployeeNumber::new("EMP001")][&Role::first_line_support()], 2);
        assert!(counts[&EmployeeNumber::new("EMP002")].is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_events() {
        let store = store_with_roster().await;
        let mut sub = store.subscriptions().subscribe(SubscriptionFilter::default()).await;

        let record = store
            .put(&write(april(1), None, Assignments::new(), staffed("EMP001")))
            .await
            .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.commit_id, record.id);
        assert_eq!(event.change_type, ChangeType::Created);
    }

    #[tokio::test]
    async fn test_empty_edit_set_rejected() {
        let store = store_with_roster().await;
        assert!(matches!(
            store.put(&EditSet::new()).await,
            Err(RotaError::InvalidInput(_))
        ));
    }
}
