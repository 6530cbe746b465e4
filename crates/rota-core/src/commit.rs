//! Edit sets and commit records.
//!
//! An [`EditSet`] is the minimal collection of entry changes a request needs.
//! A [`CommitRecord`] is the proof that an edit set landed in the store.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::{Assignments, EmployeeNumber, Role};

/// Replacement of one date's assignments, guarded by the version it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryEdit {
    pub date: NaiveDate,

    /// Version of the entry when it was read; `None` means the date had no entry.
    pub expected_version: Option<u64>,

    /// Assignments as read.
    pub before: Assignments,

    /// Assignments to write. Empty removes the entry.
    pub after: Assignments,
}

/// A single role change on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentChange {
    pub date: NaiveDate,
    pub role: Role,
    pub from: Option<EmployeeNumber>,
    pub to: Option<EmployeeNumber>,
}

impl EntryEdit {
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }

    /// Per-role differences between `before` and `after`.
    pub fn changes(&self) -> Vec<AssignmentChange> {
        let roles: BTreeSet<&Role> = self.before.keys().chain(self.after.keys()).collect();
        roles
            .into_iter()
            .filter_map(|role| {
                let from = self.before.get(role).cloned();
                let to = self.after.get(role).cloned();
                (from != to).then(|| AssignmentChange {
                    date: self.date,
                    role: role.clone(),
                    from,
                    to,
                })
            })
            .collect()
    }
}

/// Record that an employee is unavailable on a date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbsenceEdit {
    pub employee_number: EmployeeNumber,
    pub date: NaiveDate,
}

/// A date that was read but not changed; its version must still match at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionGuard {
    pub date: NaiveDate,
    pub expected_version: Option<u64>,
}

/// The full set of changes for one request. Applied all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditSet {
    /// Entry replacements, ascending by date.
    pub entries: Vec<EntryEdit>,

    /// Absences to record on the roster.
    #[serde(default)]
    pub absences: Vec<AbsenceEdit>,

    /// Unchanged dates the edit was validated against.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guards: Vec<VersionGuard>,

    /// Roster and rule-set version the edit was validated against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_version: Option<u64>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(EntryEdit::is_noop) && self.absences.is_empty()
    }

    /// Dates whose entries change.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.entries
            .iter()
            .filter(|e| !e.is_noop())
            .map(|e| e.date)
            .collect()
    }

    /// Every employee the written state refers to.
    pub fn referenced_employees(&self) -> BTreeSet<&EmployeeNumber> {
        self.entries
            .iter()
            .flat_map(|e| e.after.values())
            .chain(self.absences.iter().map(|a| &a.employee_number))
            .collect()
    }

    /// Flattened per-role changes.
    pub fn changes(&self) -> Vec<AssignmentChange> {
        self.entries.iter().flat_map(EntryEdit::changes).collect()
    }

    /// SHA-256 over the written state, stable across runs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.date.to_string().as_bytes());
            hasher.update(b"|");
            for (role, employee) in &entry.after {
                hasher.update(role.as_str().as_bytes());
                hasher.update(b"=");
                hasher.update(employee.as_str().as_bytes());
                hasher.update(b";");
            }
            hasher.update(b"\n");
        }
        for absence in &self.absences {
            hasher.update(b"absent:");
            hasher.update(absence.employee_number.as_str().as_bytes());
            hasher.update(b"@");
            hasher.update(absence.date.to_string().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Proof that an edit set was committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Unique identifier for this commit.
    pub id: Uuid,

    /// Store version assigned to every entry written by this commit.
    pub version: u64,

    /// When the commit landed.
    pub timestamp: DateTime<Utc>,

    /// What was written.
    pub edits: EditSet,

    /// [`EditSet::fingerprint`] of `edits`.
    pub fingerprint: String,
}

impl CommitRecord {
    pub fn new(version: u64, edits: EditSet) -> Self {
        let fingerprint = edits.fingerprint();
        Self {
            id: Uuid::new_v4(),
            version,
            timestamp: Utc::now(),
            edits,
            fingerprint,
        }
    }

    /// Verify the fingerprint still matches the edits.
    pub fn verify(&self) -> bool {
        self.edits.fingerprint() == self.fingerprint
    }
}
