//! tfn-billing
//!
//! Billing Engine. A bill is an immutable value snapshot of a ledger window;
//! the live ledger is only consulted again at read time, by [`reconcile`],
//! which never writes.

mod engine;
mod numbering;
mod reconcile;
mod snapshot;
mod store;

pub use engine::{BillView, BillingEngine, GenerateBill};
pub use numbering::BillNumbering;
pub use reconcile::{reconcile, BillReconciliation, RepricedEntry};
pub use snapshot::build_snapshot;
pub use store::{BillStatusChange, BillStore};

/// NotFound message when a billing window has no attendance.
pub const NO_ATTENDANCE_IN_RANGE: &str = "no attendance in range";
