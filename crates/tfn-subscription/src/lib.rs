//! tfn-subscription
//!
//! Subscription state machine plus the expiry sweep.
//!
//! ```text
//!   active <----> paused
//!     |  \        /  |
//!     |   expired    |      (sweep or explicit)
//!      \            /
//!        cancelled          (explicit)
//! ```
//!
//! Expired and cancelled are terminal. Every applied transition is a single
//! conditional write in the store, so concurrent sweeps and status updates
//! converge without extra locking.

mod lifecycle;
mod service;
pub mod stats;
mod store;

pub use lifecycle::{
    allowed_sources, apply_patch, check_transition, validate_input, EDITABLE, MAX_MEALS_INCLUDED,
};
pub use service::{SubscriptionLifecycle, SweepFailure, SweepReport, MAX_EXPIRING_WINDOW_DAYS};
pub use stats::SubscriptionStats;
pub use store::SubscriptionStore;

/// Actor recorded on sweep-driven notifications.
pub const SYSTEM_ACTOR: &str = "system";
