//! In-memory view of a schedule window that rules evaluate against.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rota_core::{Assignments, DateRange, Employee, EmployeeNumber, Role, ScheduleEntry};

/// A window of the schedule plus the roster, detached from the store.
///
/// Slices are cheap to clone and are mutated freely to build hypothetical
/// schedules; nothing here touches persisted state.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSlice {
    /// Dates this slice has authoritative knowledge of.
    pub window: DateRange,

    /// Assignments per date. Dates without an entry are absent.
    pub days: BTreeMap<NaiveDate, Assignments>,

    /// Roster in registration order.
    pub roster: Vec<Employee>,
}

impl ScheduleSlice {
    pub fn new(window: DateRange, roster: Vec<Employee>) -> Self {
        Self {
            window,
            days: BTreeMap::new(),
            roster,
        }
    }

    /// Build a slice from stored entries; entries outside `window` are dropped.
    pub fn from_entries(
        window: DateRange,
        entries: impl IntoIterator<Item = ScheduleEntry>,
        roster: Vec<Employee>,
    ) -> Self {
        let days = entries
            .into_iter()
            .filter(|e| window.contains(e.date) && !e.is_empty())
            .map(|e| (e.date, e.assignments))
            .collect();
        Self {
            window,
            days,
            roster,
        }
    }

    pub fn assignments(&self, date: NaiveDate) -> Option<&Assignments> {
        self.days.get(&date)
    }

    pub fn assigned(&self, date: NaiveDate, role: &Role) -> Option<&EmployeeNumber> {
        self.days.get(&date).and_then(|a| a.get(role))
    }

    /// Put `employee` in `role` on `date`, returning whoever held it before.
    pub fn assign(
        &mut self,
        date: NaiveDate,
        role: Role,
        employee: EmployeeNumber,
    ) -> Option<EmployeeNumber> {
        self.days.entry(date).or_default().insert(role, employee)
    }

    /// Leave `role` unstaffed on `date`, returning whoever held it.
    pub fn vacate(&mut self, date: NaiveDate, role: &Role) -> Option<EmployeeNumber> {
        let day = self.days.get_mut(&date)?;
        let previous = day.remove(role);
        if day.is_empty() {
            self.days.remove(&date);
        }
        previous
    }

    pub fn employee(&self, number: &EmployeeNumber) -> Option<&Employee> {
        self.roster.iter().find(|e| &e.employee_number == number)
    }

    pub fn employee_mut(&mut self, number: &EmployeeNumber) -> Option<&mut Employee> {
        self.roster.iter_mut().find(|e| &e.employee_number == number)
    }

    /// Position of the employee in the roster; unknown employees sort last.
    pub fn roster_index(&self, number: &EmployeeNumber) -> usize {
        self.roster
            .iter()
            .position(|e| &e.employee_number == number)
            .unwrap_or(usize::MAX)
    }

    pub fn is_absent(&self, number: &EmployeeNumber, date: NaiveDate) -> bool {
        self.employee(number)
            .map(|e| e.is_absent_on(date))
            .unwrap_or(false)
    }

    /// Roles `employee` holds on `date`.
    pub fn roles_on(&self, employee: &EmployeeNumber, date: NaiveDate) -> Vec<Role> {
        self.days
            .get(&date)
            .map(|a| {
                a.iter()
                    .filter(|(_, e)| *e == employee)
                    .map(|(r, _)| r.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True if `employee` holds any role on `date` (or `role`, when given).
    pub fn works_on(&self, employee: &EmployeeNumber, date: NaiveDate, role: Option<&Role>) -> bool {
        match self.days.get(&date) {
            Some(day) => day
                .iter()
                .any(|(r, e)| e == employee && role.map_or(true, |wanted| wanted == r)),
            None => false,
        }
    }

    /// Days worked by `employee` within `range`.
    pub fn load(&self, employee: &EmployeeNumber, range: DateRange) -> usize {
        self.days
            .range(range.start..=range.end)
            .filter(|(_, day)| day.values().any(|e| e == employee))
            .count()
    }

    /// Employees that appear in any assignment within `range`, sorted.
    pub fn employees_in(&self, range: DateRange) -> Vec<EmployeeNumber> {
        let mut employees: Vec<EmployeeNumber> = self
            .days
            .range(range.start..=range.end)
            .flat_map(|(_, day)| day.values().cloned())
            .collect();
        employees.sort();
        employees.dedup();
        employees
    }

    /// Entries for the given dates as they stand in this slice.
    pub fn entries_for(&self, dates: &[NaiveDate]) -> Vec<ScheduleEntry> {
        dates
            .iter()
            .map(|date| ScheduleEntry {
                date: *date,
                assignments: self.days.get(date).cloned().unwrap_or_default(),
                version: 0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn april(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn slice() -> ScheduleSlice {
        let window = DateRange::new(april(1), april(7)).unwrap();
        let roster = vec![Employee::new("EMP001", "John Smith"), Employee::new("EMP002", "Jane Doe")];
        let entries = vec![
            ScheduleEntry::new(april(1)).with(Role::first_line_support(), "EMP001"),
            ScheduleEntry::new(april(2)).with(Role::first_line_support(), "EMP001"),
            ScheduleEntry::new(april(9)).with(Role::first_line_support(), "EMP002"),
        ];
        ScheduleSlice::from_entries(window, entries, roster)
    }

    #[test]
    fn test_from_entries_drops_outside_window() {
        let s = slice();
        assert_eq!(s.days.len(), 2);
        assert!(s.assignments(april(9)).is_none());
    }

    #[test]
    fn test_assign_and_vacate() {
        let mut s = slice();
        let previous = s.assign(april(1), Role::first_line_support(), "EMP002".into());
        assert_eq!(previous, Some("EMP001".into()));
        assert_eq!(s.vacate(april(1), &Role::first_line_support()), Some("EMP002".into()));
        assert!(s.assignments(april(1)).is_none());
    }

    #[test]
    fn test_load_counts_days() {
        let s = slice();
        let week = DateRange::new(april(1), april(7)).unwrap();
        assert_eq!(s.load(&"EMP001".into(), week), 2);
        assert_eq!(s.load(&"EMP002".into(), week), 0);
        assert_eq!(s.roster_index(&"EMP002".into()), 1);
        assert_eq!(s.roster_index(&"EMP404".into()), usize::MAX);
    }
}
