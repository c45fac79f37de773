//! Snapguard retention crate - time-based deletion of flagged screenshots.
//!
//! Runs a periodic sweep that erases records whose deletion date has
//! passed, together with their on-disk files, and supports marking a
//! record for immediate deletion.

pub mod scheduler;

pub use scheduler::{deletion_date_after_hours, RetentionScheduler, SweepOutcome};
