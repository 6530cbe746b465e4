//! Demo roster and a week of first-line cover.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use rota_core::{EditSet, Employee, EmployeeNumber, EntryEdit, Result, Role, RotaError, ScheduleEntry};
use rota_state::{EmployeeUpdate, ScheduleStore};
use tracing::{info, warn};

const DEMO_EMPLOYEES: [(&str, &str); 5] = [
    ("EMP001", "Lars Larsson"),
    ("EMP002", "Dagobert Dagobertsson"),
    ("EMP003", "Karl-Gustav Karlgustavsson"),
    ("EMP004", "Kerstin Kerstinsdotter"),
    ("EMP005", "Maj-Britt Majbrittdotter"),
];

/// Employee -> absent every Nth day, counted from [`absence_epoch`].
const ABSENCE_PATTERNS: [(&str, i64); 3] = [("EMP001", 3), ("EMP002", 5), ("EMP004", 7)];

const ABSENCE_HORIZON_DAYS: i64 = 30;
const FRONT_FILL_DAYS: i64 = 7;

fn absence_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

/// Absence dates for `number` in the next 30 days.
pub fn demo_absences(number: &str, today: NaiveDate) -> BTreeSet<NaiveDate> {
    let Some((_, every)) = ABSENCE_PATTERNS.iter().find(|(n, _)| *n == number) else {
        return BTreeSet::new();
    };
    (0..ABSENCE_HORIZON_DAYS)
        .map(|offset| today + Duration::days(offset))
        .filter(|date| (*date - absence_epoch()).num_days().rem_euclid(*every) == 0)
        .collect()
}

/// Register (or refresh) the demo roster and front-fill first-line cover
/// for the next week. Dates that already have an entry are left alone.
pub async fn seed_demo(store: &dyn ScheduleStore, today: NaiveDate) -> Result<()> {
    let mut roster: Vec<Employee> = Vec::new();
    for (number, name) in DEMO_EMPLOYEES {
        let employee = Employee::new(number, name).with_absences(demo_absences(number, today));
        let stored = match store.register_employee(employee.clone()).await {
            Ok(stored) => stored,
            Err(RotaError::Conflict(_)) => {
                let update = EmployeeUpdate {
                    known_absences: Some(employee.known_absences.clone()),
                    ..Default::default()
                };
                store.update_employee(&employee.employee_number, update).await?
            }
            Err(e) => return Err(e),
        };
        roster.push(stored);
    }
    info!(employees = roster.len(), "Seeded demo roster");

    let mut filled = 0;
    for offset in 0..FRONT_FILL_DAYS {
        let date = today + Duration::days(offset);
        if store.get(date).await?.is_some() {
            continue;
        }

        let available: Vec<&Employee> = roster.iter().filter(|e| !e.is_absent_on(date)).collect();
        let index = offset as usize;
        // Round-robin over whoever is in; everyone absent falls back to the full roster.
        let pick: EmployeeNumber = if available.is_empty() {
            roster[index % roster.len()].employee_number.clone()
        } else {
            available[index % available.len()].employee_number.clone()
        };

        let edits = EditSet {
            entries: vec![EntryEdit {
                date,
                expected_version: None,
                before: Default::default(),
                after: ScheduleEntry::new(date).with(Role::first_line_support(), pick).assignments,
            }],
            ..EditSet::default()
        };
        match store.put(&edits).await {
            Ok(_) => filled += 1,
            Err(e) => warn!(%date, error = %e, "Could not front-fill date"),
        }
    }
    info!(days = filled, "Front-filled first-line cover");

    Ok(())
}
