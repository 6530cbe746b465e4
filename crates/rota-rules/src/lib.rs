//! # Rota Rules
//!
//! Constraints a valid schedule must satisfy.
//!
//! A rule is data (a kind tag plus parameters) dispatched to a fixed set of
//! evaluators, so rule sets can be edited at runtime without recompiling.
//! Evaluation is pure: it reads a [`ScheduleSlice`] and returns violations.

pub mod evaluate;
pub mod rule;
pub mod slice;

pub use rule::{DayName, Days, Predicate, Rule, RuleKind, RuleSet};
pub use slice::ScheduleSlice;
