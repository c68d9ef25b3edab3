//! tfn-ledger
//!
//! Attendance Ledger: one fact per (subscriber, meal type, date).
//!
//! Uniqueness is the store's job (a constraint, not a pre-read). The service
//! validates, pre-checks batches so the caller gets a complete duplicate
//! list, and still treats a constraint violation at insert time as the
//! authoritative Conflict signal.

mod service;
mod store;
pub mod summary;
pub mod validate;

pub use service::AttendanceLedger;
pub use store::AttendanceStore;
pub use summary::{
    DailySummary, GroupBy, LifetimeCounters, MealBreakdown, RangeSummary, SubscriberHistory,
    SummaryGroup,
};

/// Message carried by every single-record duplicate Conflict.
pub const ALREADY_RECORDED: &str =
    "Attendance already recorded for this subscriber, meal type, and date";

/// Message carried by batch duplicate Conflicts.
pub const DUPLICATE_BATCH: &str = "Duplicate attendance records found";
