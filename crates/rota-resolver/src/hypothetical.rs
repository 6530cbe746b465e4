//! Applying an intent to a detached copy of the schedule.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rota_core::{ChangeAction, EmployeeNumber, Role, ScheduleChangeIntent, Violation};
use rota_rules::ScheduleSlice;

/// One role on one date.
pub type Slot = (NaiveDate, Role);

/// What applying an intent fixed in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hypothetical {
    /// Slots the intent set to a specific person. Resolution never moves them.
    pub pinned: BTreeSet<Slot>,

    /// Employees that must not be picked to fill in.
    pub excluded: BTreeSet<EmployeeNumber>,

    /// Slots a substitution vacated without naming who takes over, with
    /// the employee who held them.
    pub open: Vec<(Slot, EmployeeNumber)>,

    /// Violations of the request itself. No reassignment clears them.
    pub blocked: Vec<Violation>,
}

impl Hypothetical {
    pub fn is_pinned(&self, date: NaiveDate, role: &Role) -> bool {
        self.pinned.contains(&(date, role.clone()))
    }
}

/// `role` on `date` belongs to `holder`, so `wanted` cannot simply take it.
pub fn occupied(date: NaiveDate, role: &Role, holder: &EmployeeNumber, wanted: &EmployeeNumber) -> Violation {
    Violation {
        rule: "slot already held".to_string(),
        kind: "occupied".to_string(),
        dates: vec![date],
        employees: vec![holder.clone()],
        role: Some(role.clone()),
        message: format!("{role} on {date} is held by {holder}; {wanted} needs a substitution to take it"),
    }
}

/// Put `employee` in an empty (or already theirs) slot and pin it.
fn take_slot(
    slice: &mut ScheduleSlice,
    hypothetical: &mut Hypothetical,
    date: NaiveDate,
    role: Role,
    employee: &EmployeeNumber,
) {
    match slice.assigned(date, &role).cloned() {
        Some(holder) if &holder != employee => {
            hypothetical.blocked.push(occupied(date, &role, &holder, employee));
        }
        _ => {
            slice.assign(date, role.clone(), employee.clone());
        }
    }
    hypothetical.pinned.insert((date, role));
}

/// Roles the intent acts on for `employee` on `date`.
fn affected_roles(slice: &ScheduleSlice, intent: &ScheduleChangeIntent, date: NaiveDate) -> Vec<Role> {
    let held = slice.roles_on(&intent.target_employee, date);
    match &intent.role {
        Some(role) => held.into_iter().filter(|r| r == role).collect(),
        None => held,
    }
}

/// Apply `intent` to `slice` in place.
pub fn apply_intent(slice: &mut ScheduleSlice, intent: &ScheduleChangeIntent) -> Hypothetical {
    let mut hypothetical = Hypothetical::default();
    let target = &intent.target_employee;

    if intent.action.releases_target() {
        hypothetical.excluded.insert(target.clone());
    }

    for date in intent.date_range.days() {
        match &intent.action {
            ChangeAction::Assign => {
                let role = intent.role.clone().unwrap_or_else(Role::first_line_support);
                take_slot(slice, &mut hypothetical, date, role, target);
            }
            ChangeAction::Unassign => {
                for role in affected_roles(slice, intent, date) {
                    slice.vacate(date, &role);
                }
            }
            ChangeAction::TimeOff => {
                for role in slice.roles_on(target, date) {
                    slice.vacate(date, &role);
                }
                if let Some(employee) = slice.employee_mut(target) {
                    employee.known_absences.insert(date);
                }
            }
            ChangeAction::Substitute { replacement } => {
                let roles = affected_roles(slice, intent, date);
                match replacement {
                    Some(replacement) if roles.is_empty() => {
                        if let Some(role) = &intent.role {
                            take_slot(slice, &mut hypothetical, date, role.clone(), replacement);
                        }
                    }
                    Some(replacement) => {
                        for role in roles {
                            slice.assign(date, role.clone(), replacement.clone());
                            hypothetical.pinned.insert((date, role));
                        }
                    }
                    None => {
                        for role in roles {
                            slice.vacate(date, &role);
                            hypothetical.open.push(((date, role), target.clone()));
                        }
                    }
                }
            }
        }
    }

    hypothetical
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::{DateRange, Employee, ScheduleEntry};

    fn april(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn slice() -> ScheduleSlice {
        let window = DateRange::new(april(1), april(7)).unwrap();
        let roster = vec![Employee::new("EMP001", "John Smith"), Employee::new("EMP002", "Jane Doe")];
        let entries = vec![
            ScheduleEntry::new(april(1))
                .with(Role::first_line_support(), "EMP001")
                .with(Role::new("on_call"), "EMP001"),
            ScheduleEntry::new(april(2)).with(Role::first_line_support(), "EMP002"),
        ];
        ScheduleSlice::from_entries(window, entries, roster)
    }

    fn intent(action: ChangeAction, target: &str, day: u32) -> ScheduleChangeIntent {
        ScheduleChangeIntent::builder()
            .target(target)
            .on(april(day))
            .action(action)
            .build()
            .unwrap()
    }

    #[test]
    fn test_time_off_vacates_every_role_and_records_absence() {
        let mut s = slice();
        let h = apply_intent(&mut s, &intent(ChangeAction::TimeOff, "EMP001", 1));

        assert!(s.assignments(april(1)).is_none());
        assert!(s.is_absent(&"EMP001".into(), april(1)));
        assert!(h.excluded.contains(&EmployeeNumber::new("EMP001")));
        assert!(h.pinned.is_empty());
    }

    #[test]
    fn test_assign_pins_default_role() {
        let mut s = slice();
        let h = apply_intent(&mut s, &intent(ChangeAction::Assign, "EMP001", 2));

        assert_eq!(s.assigned(april(2), &Role::first_line_support()), Some(&"EMP001".into()));
        assert!(h.is_pinned(april(2), &Role::first_line_support()));
        assert!(h.excluded.is_empty());
    }

    #[test]
    fn test_unassign_respects_role_filter() {
        let mut s = slice();
        let mut i = intent(ChangeAction::Unassign, "EMP001", 1);
        i.role = Some(Role::new("on_call"));
        apply_intent(&mut s, &i);

        assert_eq!(s.roles_on(&"EMP001".into(), april(1)), vec![Role::first_line_support()]);
    }

    #[test]
    fn test_named_substitute_takes_over_roles() {
        let mut s = slice();
        let i = intent(
            ChangeAction::Substitute {
                replacement: Some("EMP002".into()),
            },
            "EMP001",
            1,
        );
        let h = apply_intent(&mut s, &i);

        assert_eq!(s.roles_on(&"EMP002".into(), april(1)).len(), 2);
        assert_eq!(h.pinned.len(), 2);
    }

    #[test]
    fn test_assign_never_displaces_holder() {
        let mut s = slice();
        let h = apply_intent(&mut s, &intent(ChangeAction::Assign, "EMP001", 2));

        assert_eq!(s.assigned(april(2), &Role::first_line_support()), Some(&"EMP002".into()));
        assert_eq!(h.blocked.len(), 1);
        assert_eq!(h.blocked[0].kind, "occupied");
        assert_eq!(h.blocked[0].employees, vec![EmployeeNumber::new("EMP002")]);
        assert!(h.is_pinned(april(2), &Role::first_line_support()));
    }

    #[test]
    fn test_open_substitution_leaves_slots_to_fill() {
        let mut s = slice();
        let h = apply_intent(&mut s, &intent(ChangeAction::Substitute { replacement: None }, "EMP001", 1));

        assert!(s.assignments(april(1)).is_none());
        assert_eq!(h.open.len(), 2);
        assert!(h.open.iter().all(|(_, held_by)| held_by.as_str() == "EMP001"));
        assert!(h.blocked.is_empty());
    }
}
