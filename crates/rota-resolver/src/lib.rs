//! # Rota Resolver
//!
//! Validation and application of schedule change intents.
//!
//! - [`ConflictResolver`] applies an intent to a detached slice, evaluates the
//!   rule set and tries one reassignment per violation
//! - [`MutationApplier`] commits the resulting edit set, re-resolving on
//!   stale writes up to a retry bound
//! - [`ChangePipeline`] runs free text or structured intents end to end

pub mod applier;
pub mod cancel;
pub mod config;
pub mod hypothetical;
pub mod pipeline;
pub mod ranking;
pub mod resolver;

pub use applier::{ApplyOutcome, MutationApplier};
pub use cancel::{cancel_pair, CancelHandle, CancelToken, RequestContext, StatusCallback};
pub use config::{ApplierConfig, ResolverConfig};
pub use hypothetical::{apply_intent, Hypothetical, Slot};
pub use pipeline::ChangePipeline;
pub use ranking::eligible_substitutes;
pub use resolver::{resolve_against, Baseline, ConflictResolver, Proposal, Resolution, ResolveMode, Resolver};
