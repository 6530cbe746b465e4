//! Eligibility ranking for automatic reassignment.
//!
//! An employee can fill a slot when they are not the displaced employee, not
//! released by the request, not absent or blacked out that day, and not
//! already working that day. Eligible employees are ordered by
//! `(days worked in the window, roster position)`; with load balancing off,
//! by roster position alone. The order is total, so resolution is
//! reproducible.

use chrono::NaiveDate;
use rota_core::{DateRange, EmployeeNumber};
use rota_rules::{RuleSet, ScheduleSlice};

use crate::config::ResolverConfig;
use crate::hypothetical::Hypothetical;

/// Employees that may take a slot on `date`, best first.
pub fn eligible_substitutes(
    slice: &ScheduleSlice,
    rules: &RuleSet,
    hypothetical: &Hypothetical,
    date: NaiveDate,
    displaced: Option<&EmployeeNumber>,
    window: DateRange,
    config: &ResolverConfig,
) -> Vec<EmployeeNumber> {
    let mut ranked: Vec<(usize, usize, EmployeeNumber)> = slice
        .roster
        .iter()
        .enumerate()
        .map(|(index, e)| (index, &e.employee_number))
        .filter(|(_, number)| Some(*number) != displaced)
        .filter(|(_, number)| !hypothetical.excluded.contains(*number))
        .filter(|(_, number)| !slice.works_on(number, date, None))
        .filter(|(_, number)| !rules.bars(slice, number, date) && !slice.is_absent(number, date))
        .map(|(index, number)| {
            let load = if config.balance_load {
                slice.load(number, window)
            } else {
                0
            };
            (load, index, number.clone())
        })
        .collect();

    ranked.sort();
    ranked.into_iter().map(|(_, _, number)| number).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::{Employee, Role, ScheduleEntry};
    use rota_rules::{Rule, RuleKind};

    fn april(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn week() -> DateRange {
        DateRange::new(april(1), april(7)).unwrap()
    }

    fn slice() -> ScheduleSlice {
        let roster = vec![
            Employee::new("EMP001", "John Smith"),
            Employee::new("EMP002", "Jane Doe"),
            Employee::new("EMP003", "Ann Lee").with_absences([april(3)]),
            Employee::new("EMP004", "Bob Ray"),
        ];
        let fls = Role::first_line_support();
        let entries = vec![
            ScheduleEntry::new(april(1)).with(fls.clone(), "EMP002"),
            ScheduleEntry::new(april(2)).with(fls.clone(), "EMP002"),
            ScheduleEntry::new(april(4)).with(fls, "EMP004"),
        ];
        ScheduleSlice::from_entries(week(), entries, roster)
    }

    fn numbers(list: &[EmployeeNumber]) -> Vec<&str> {
        list.iter().map(|n| n.as_str()).collect()
    }

    #[test]
    fn test_least_loaded_first_then_roster_order() {
        let s = slice();
        let h = Hypothetical::default();
        let ranked = eligible_substitutes(&s, &RuleSet::default(), &h, april(5), None, week(), &ResolverConfig::default());
        assert_eq!(numbers(&ranked), vec!["EMP001", "EMP003", "EMP004", "EMP002"]);
    }

    #[test]
    fn test_roster_order_without_balancing() {
        let s = slice();
        let h = Hypothetical::default();
        let config = ResolverConfig { balance_load: false };
        let ranked = eligible_substitutes(&s, &RuleSet::default(), &h, april(5), None, week(), &config);
        assert_eq!(numbers(&ranked), vec!["EMP001", "EMP002", "EMP003", "EMP004"]);
    }

    #[test]
    fn test_exclusions() {
        let s = slice();
        let mut h = Hypothetical::default();
        h.excluded.insert("EMP001".into());
        let blackout = RuleSet::new(vec![Rule::new(
            "bob blackout",
            RuleKind::BlackoutDate {
                dates: vec![april(3)],
                employees: vec!["EMP004".into()],
            },
        )])
        .unwrap();

        let displaced = EmployeeNumber::new("EMP002");
        let ranked = eligible_substitutes(&s, &blackout, &h, april(3), Some(&displaced), week(), &ResolverConfig::default());
        // EMP001 excluded, EMP002 displaced, EMP003 absent, EMP004 blacked out.
        assert!(ranked.is_empty());
    }
}
