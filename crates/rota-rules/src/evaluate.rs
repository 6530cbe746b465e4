//! Evaluators, one per [`RuleKind`].
//!
//! Every evaluator is a pure function of the slice and the scope it is
//! handed. Output is deterministic: dates ascend, roles and employees
//! follow their sort order.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rota_core::{DateRange, EmployeeNumber, Role, Violation};

use crate::rule::{Days, Predicate, Rule, RuleKind};
use crate::slice::ScheduleSlice;

type Evaluator = fn(&Rule, &ScheduleSlice, DateRange) -> Vec<Violation>;

/// Route a rule to its evaluator.
pub fn dispatch(rule: &Rule, slice: &ScheduleSlice, scope: DateRange) -> Vec<Violation> {
    let evaluator: Evaluator = match rule.kind {
        RuleKind::CoverageMinimum { .. } => coverage_minimum,
        RuleKind::BlackoutDate { .. } => blackout_date,
        RuleKind::ConsecutiveDayLimit { .. } => consecutive_day_limit,
        RuleKind::RoleExclusivity { .. } => role_exclusivity,
        RuleKind::WeeklyLimit { .. } => weekly_limit,
        RuleKind::RespectAbsences => respect_absences,
        RuleKind::CustomPredicate { .. } => custom_predicate,
    };
    evaluator(rule, slice, scope)
}

fn violation(
    rule: &Rule,
    dates: Vec<NaiveDate>,
    employees: Vec<EmployeeNumber>,
    role: Option<Role>,
    message: String,
) -> Violation {
    Violation {
        rule: rule.name.clone(),
        kind: rule.kind.tag().to_string(),
        dates,
        employees,
        role,
        message,
    }
}

fn coverage_minimum(rule: &Rule, slice: &ScheduleSlice, scope: DateRange) -> Vec<Violation> {
    let RuleKind::CoverageMinimum { role, days } = &rule.kind else {
        return Vec::new();
    };
    scope
        .days()
        .filter(|date| days.includes(*date) && slice.assigned(*date, role).is_none())
        .map(|date| {
            violation(
                rule,
                vec![date],
                Vec::new(),
                Some(role.clone()),
                format!(
                    "{} must be staffed {}; nobody is assigned on {} ({})",
                    role,
                    days.describe(),
                    date,
                    date.weekday()
                ),
            )
        })
        .collect()
}

fn blackout_date(rule: &Rule, slice: &ScheduleSlice, scope: DateRange) -> Vec<Violation> {
    let RuleKind::BlackoutDate { dates, employees } = &rule.kind else {
        return Vec::new();
    };
    let mut blocked: Vec<NaiveDate> = dates.iter().copied().filter(|d| scope.contains(*d)).collect();
    blocked.sort();
    blocked.dedup();

    let mut out = Vec::new();
    for date in blocked {
        let Some(day) = slice.assignments(date) else {
            continue;
        };
        for (role, employee) in day {
            if employees.is_empty() || employees.contains(employee) {
                out.push(violation(
                    rule,
                    vec![date],
                    vec![employee.clone()],
                    Some(role.clone()),
                    format!("{} is scheduled as {} on blackout date {}", employee, role, date),
                ));
            }
        }
    }
    out
}

fn consecutive_day_limit(rule: &Rule, slice: &ScheduleSlice, scope: DateRange) -> Vec<Violation> {
    let RuleKind::ConsecutiveDayLimit { max_days, role } = &rule.kind else {
        return Vec::new();
    };
    let limit = *max_days as usize;
    let mut out = Vec::new();

    for employee in slice.employees_in(scope) {
        let mut run: Vec<NaiveDate> = Vec::new();
        // One trailing `None` closes a run that reaches the end of scope.
        let days = scope.days().map(Some).chain(std::iter::once(None));
        for date in days {
            match date {
                Some(d) if slice.works_on(&employee, d, role.as_ref()) => run.push(d),
                _ => {
                    if run.len() > limit {
                        out.push(violation(
                            rule,
                            run.clone(),
                            vec![employee.clone()],
                            role.clone(),
                            format!(
                                "{} works {} consecutive days ({} to {}); the limit is {}",
                                employee,
                                run.len(),
                                run[0],
                                run[run.len() - 1],
                                limit
                            ),
                        ));
                    }
                    run.clear();
                }
            }
        }
    }
    out.sort_by(|a, b| a.dates.cmp(&b.dates).then(a.employees.cmp(&b.employees)));
    out
}

fn role_exclusivity(rule: &Rule, slice: &ScheduleSlice, scope: DateRange) -> Vec<Violation> {
    let RuleKind::RoleExclusivity { roles } = &rule.kind else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for date in scope.days() {
        let Some(day) = slice.assignments(date) else {
            continue;
        };
        let mut held: BTreeMap<&EmployeeNumber, Vec<&Role>> = BTreeMap::new();
        for (role, employee) in day {
            if roles.contains(role) {
                held.entry(employee).or_default().push(role);
            }
        }
        for (employee, held_roles) in held {
            if held_roles.len() > 1 {
                let names: Vec<&str> = held_roles.iter().map(|r| r.as_str()).collect();
                out.push(violation(
                    rule,
                    vec![date],
                    vec![employee.clone()],
                    None,
                    format!(
                        "{} holds mutually exclusive roles {} on {}",
                        employee,
                        names.join(" and "),
                        date
                    ),
                ));
            }
        }
    }
    out
}

fn weekly_limit(rule: &Rule, slice: &ScheduleSlice, scope: DateRange) -> Vec<Violation> {
    let RuleKind::WeeklyLimit { max_days } = &rule.kind else {
        return Vec::new();
    };
    let limit = *max_days as usize;

    // (iso year, iso week) -> employee -> dates worked
    let mut weeks: BTreeMap<(i32, u32), BTreeMap<EmployeeNumber, Vec<NaiveDate>>> = BTreeMap::new();
    for (date, day) in slice.days.range(scope.start..=scope.end) {
        let week = date.iso_week();
        let bucket = weeks.entry((week.year(), week.week())).or_default();
        let mut seen: Vec<&EmployeeNumber> = Vec::new();
        for employee in day.values() {
            if !seen.contains(&employee) {
                seen.push(employee);
                bucket.entry(employee.clone()).or_default().push(*date);
            }
        }
    }

    let mut out = Vec::new();
    for ((year, week), employees) in weeks {
        for (employee, dates) in employees {
            if dates.len() > limit {
                out.push(violation(
                    rule,
                    dates.clone(),
                    vec![employee.clone()],
                    None,
                    format!(
                        "{} works {} days in week {}-W{:02}; the limit is {}",
                        employee,
                        dates.len(),
                        year,
                        week,
                        limit
                    ),
                ));
            }
        }
    }
    out
}

fn respect_absences(rule: &Rule, slice: &ScheduleSlice, scope: DateRange) -> Vec<Violation> {
    let mut out = Vec::new();
    for (date, day) in slice.days.range(scope.start..=scope.end) {
        for (role, employee) in day {
            if slice.is_absent(employee, *date) {
                out.push(violation(
                    rule,
                    vec![*date],
                    vec![employee.clone()],
                    Some(role.clone()),
                    format!("{} is absent on {} but assigned as {}", employee, date, role),
                ));
            }
        }
    }
    out
}

fn custom_predicate(rule: &Rule, slice: &ScheduleSlice, scope: DateRange) -> Vec<Violation> {
    let RuleKind::CustomPredicate {
        description,
        require,
    } = &rule.kind
    else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (date, day) in slice.days.range(scope.start..=scope.end) {
        for (role, employee) in day {
            if !require.matches(*date, role, employee) {
                out.push(violation(
                    rule,
                    vec![*date],
                    vec![employee.clone()],
                    Some(role.clone()),
                    format!("{} as {} on {}: {}", employee, role, date, description),
                ));
            }
        }
    }
    out
}

/// Convenience for tests and callers building predicates in code.
pub fn forbid_employee_on(employee: impl Into<EmployeeNumber>, days: Days) -> Predicate {
    Predicate::Not {
        predicate: Box::new(Predicate::All {
            of: vec![
                Predicate::EmployeeIs {
                    employee: employee.into(),
                },
                Predicate::OnDays { days },
            ],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{DayName, RuleSet};
    use proptest::prelude::*;
    use rota_core::{Employee, ScheduleEntry};

    fn april(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn roster() -> Vec<Employee> {
        vec![
            Employee::new("EMP001", "John Smith"),
            Employee::new("EMP002", "Jane Doe").with_absences([april(3)]),
            Employee::new("EMP003", "Karl Gustav"),
        ]
    }

    fn fls() -> Role {
        Role::first_line_support()
    }

    fn slice_with(assignments: &[(u32, &str, &str)]) -> ScheduleSlice {
        let window = DateRange::new(april(1), april(14)).unwrap();
        let mut slice = ScheduleSlice::new(window, roster());
        for (day, role, employee) in assignments {
            slice.assign(april(*day), Role::new(role), (*employee).into());
        }
        slice
    }

    fn week() -> DateRange {
        DateRange::new(april(1), april(7)).unwrap()
    }

    #[test]
    fn test_coverage_flags_unstaffed_weekdays_only() {
        let rule = Rule::new(
            "coverage",
            RuleKind::CoverageMinimum {
                role: fls(),
                days: Days::Weekdays,
            },
        );
        let slice = slice_with(&[(1, "first_line_support", "EMP001")]);
        let violations = rule.evaluate(&slice, week());
        // 2..5 April are unstaffed weekdays; 6 and 7 are the weekend.
        let dates: Vec<NaiveDate> = violations.iter().flat_map(|v| v.dates.clone()).collect();
        assert_eq!(dates, vec![april(2), april(3), april(4), april(5)]);
        assert!(violations[0].message.contains("first_line_support must be staffed"));
    }

    #[test]
    fn test_blackout_for_everyone_and_for_listed() {
        let everyone = Rule::new(
            "closed",
            RuleKind::BlackoutDate {
                dates: vec![april(2)],
                employees: vec![],
            },
        );
        let listed = Rule::new(
            "EMP003 blackout",
            RuleKind::BlackoutDate {
                dates: vec![april(2)],
                employees: vec!["EMP003".into()],
            },
        );
        let slice = slice_with(&[(2, "first_line_support", "EMP001"), (2, "on_call", "EMP003")]);
        assert_eq!(everyone.evaluate(&slice, week()).len(), 2);
        let only = listed.evaluate(&slice, week());
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].employees, vec![EmployeeNumber::from("EMP003")]);
    }

    #[test]
    fn test_consecutive_limit_reports_whole_run() {
        let rule = Rule::new(
            "limit",
            RuleKind::ConsecutiveDayLimit {
                max_days: 2,
                role: None,
            },
        );
        let slice = slice_with(&[
            (1, "first_line_support", "EMP001"),
            (2, "first_line_support", "EMP001"),
            (3, "first_line_support", "EMP001"),
            (5, "first_line_support", "EMP001"),
            (6, "first_line_support", "EMP001"),
        ]);
        let violations = rule.evaluate(&slice, DateRange::single(april(2)));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].dates, vec![april(1), april(2), april(3)]);
    }

    #[test]
    fn test_consecutive_limit_run_at_scope_end() {
        let rule = Rule::new(
            "limit",
            RuleKind::ConsecutiveDayLimit {
                max_days: 1,
                role: Some(fls()),
            },
        );
        let slice = slice_with(&[(13, "first_line_support", "EMP002"), (14, "first_line_support", "EMP002")]);
        let violations = rule.evaluate(&slice, DateRange::single(april(14)));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].dates, vec![april(13), april(14)]);
    }

    #[test]
    fn test_role_exclusivity() {
        let rule = Rule::new(
            "exclusive",
            RuleKind::RoleExclusivity {
                roles: vec![fls(), Role::new("on_call")],
            },
        );
        let slice = slice_with(&[(1, "first_line_support", "EMP001"), (1, "on_call", "EMP001")]);
        let violations = rule.evaluate(&slice, week());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("mutually exclusive"));
    }

    #[test]
    fn test_weekly_limit_counts_per_iso_week() {
        let rule = Rule::new("weekly", RuleKind::WeeklyLimit { max_days: 3 });
        let slice = slice_with(&[
            (1, "first_line_support", "EMP001"),
            (2, "first_line_support", "EMP001"),
            (3, "first_line_support", "EMP001"),
            (4, "first_line_support", "EMP001"),
            // Next ISO week
            (8, "first_line_support", "EMP001"),
        ]);
        let violations = rule.evaluate(&slice, DateRange::single(april(4)));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].dates.len(), 4);
        assert!(violations[0].message.contains("2024-W14"));
    }

    #[test]
    fn test_respect_absences() {
        let rule = Rule::new("absences", RuleKind::RespectAbsences);
        let slice = slice_with(&[(3, "first_line_support", "EMP002")]);
        let violations = rule.evaluate(&slice, week());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].employees, vec![EmployeeNumber::from("EMP002")]);
    }

    #[test]
    fn test_custom_predicate() {
        let rule = Rule::new(
            "no fridays",
            RuleKind::CustomPredicate {
                description: "EMP003 does not work Fridays".into(),
                require: forbid_employee_on("EMP003", Days::On(vec![DayName::Fri])),
            },
        );
        let slice = slice_with(&[(5, "first_line_support", "EMP003"), (4, "first_line_support", "EMP003")]);
        let violations = rule.evaluate(&slice, week());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].dates, vec![april(5)]);
    }

    #[test]
    fn test_disabled_rule_is_silent() {
        let mut rule = Rule::new("absences", RuleKind::RespectAbsences);
        rule.enabled = false;
        let slice = slice_with(&[(3, "first_line_support", "EMP002")]);
        assert!(rule.evaluate(&slice, week()).is_empty());
    }

    #[test]
    fn test_scope_is_clamped_to_slice() {
        let rule = Rule::new(
            "coverage",
            RuleKind::CoverageMinimum {
                role: fls(),
                days: Days::EveryDay,
            },
        );
        let slice = ScheduleSlice::new(DateRange::single(april(1)), roster());
        let violations = rule.evaluate(&slice, DateRange::new(april(1), april(30)).unwrap());
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_evaluation_does_not_mutate_slice() {
        let slice = slice_with(&[(1, "first_line_support", "EMP001")]);
        let before = slice.clone();
        let _ = RuleSet::default_rules().evaluate(&slice, week());
        assert_eq!(slice, before);
    }

    fn mixed_rules() -> Vec<Rule> {
        vec![
            Rule::new(
                "coverage",
                RuleKind::CoverageMinimum {
                    role: fls(),
                    days: Days::Weekdays,
                },
            ),
            Rule::new(
                "limit",
                RuleKind::ConsecutiveDayLimit {
                    max_days: 2,
                    role: None,
                },
            ),
            Rule::new("weekly", RuleKind::WeeklyLimit { max_days: 3 }),
            Rule::new("absences", RuleKind::RespectAbsences),
            Rule::new(
                "closed",
                RuleKind::BlackoutDate {
                    dates: vec![april(10)],
                    employees: vec![],
                },
            ),
        ]
    }

    proptest! {
        #[test]
        fn prop_violations_independent_of_rule_order(
            assignments in proptest::collection::vec((1u32..=14, 0usize..3), 0..14),
            order in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle(),
        ) {
            let employees = ["EMP001", "EMP002", "EMP003"];
            let mut slice = ScheduleSlice::new(DateRange::new(april(1), april(14)).unwrap(), roster());
            for (day, who) in &assignments {
                slice.assign(april(*day), fls(), employees[*who].into());
            }
            let rules = mixed_rules();
            let shuffled: Vec<Rule> = order.iter().map(|i| rules[*i].clone()).collect();

            let edited = DateRange::new(april(3), april(10)).unwrap();
            let mut a = RuleSet { rules }.evaluate(&slice, edited);
            let mut b = RuleSet { rules: shuffled }.evaluate(&slice, edited);
            let key = |v: &Violation| (v.rule.clone(), v.dates.clone(), v.employees.clone());
            a.sort_by_key(key);
            b.sort_by_key(key);
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn test_entries_round_trip_through_slice() {
        let entries = vec![ScheduleEntry::new(april(1)).with(fls(), "EMP001")];
        let slice = ScheduleSlice::from_entries(week(), entries, roster());
        let back = slice.entries_for(&[april(1)]);
        assert_eq!(back[0].assigned(&fls()), Some(&EmployeeNumber::from("EMP001")));
    }
}
