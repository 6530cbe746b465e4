//! # Rota Core
//!
//! Core data model for the rota scheduling pipeline.
//!
//! This crate provides the fundamental building blocks:
//! - [`Employee`] and [`ScheduleEntry`] - the roster and the per-date assignments
//! - [`ScheduleChangeIntent`] - structured form of a natural-language change request
//! - [`EditSet`] and [`CommitRecord`] - the minimal change to apply, and proof it landed
//! - [`ConflictReport`] and [`ChangeResult`] - terminal outcomes of a change request
//! - [`RotaError`] - error taxonomy shared by every component

pub mod commit;
pub mod error;
pub mod intent;
pub mod report;
pub mod types;

// Re-exports for convenience
pub use commit::{AbsenceEdit, AssignmentChange, CommitRecord, EditSet, EntryEdit, VersionGuard};
pub use error::{Result, RotaError};
pub use intent::{Ambiguity, ChangeAction, IntentBuilder, ScheduleChangeIntent};
pub use report::{ChangeResult, Conflict, ConflictReport, ProposedResolution, Reassignment, Violation};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::commit::{CommitRecord, EditSet, EntryEdit};
    pub use crate::error::{Result, RotaError};
    pub use crate::intent::{Ambiguity, ChangeAction, ScheduleChangeIntent};
    pub use crate::report::{ChangeResult, ConflictReport, Violation};
    pub use crate::types::{Assignments, DateRange, Employee, EmployeeNumber, Role, ScheduleEntry};
}
