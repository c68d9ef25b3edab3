//! tfn-notify
//!
//! Notification fan-out. The persisted notification log is the source of
//! truth; live push channels are a process-local delivery optimisation that
//! vanishes on restart.

mod fanout;
mod registry;
mod store;

pub use fanout::{EmitReport, Fanout, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
pub use registry::{ChannelGuard, ChannelId, ChannelRegistry, PushFrame};
pub use store::NotificationStore;
