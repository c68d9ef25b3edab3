//! tfn-testkit
//!
//! In-memory doubles for every store trait plus a fully wired service
//! harness. Scenario tests under `tests/` drive the real services through
//! these; nothing here talks to Postgres.

mod clock;
mod memory;
mod sink;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tfn_billing::{BillNumbering, BillingEngine};
use tfn_ledger::AttendanceLedger;
use tfn_notify::{ChannelRegistry, Fanout};
use tfn_schemas::{Identity, Role, SubscriberId};
use tfn_subscription::SubscriptionLifecycle;

pub use clock::FixedClock;
pub use memory::MemoryStore;
pub use sink::RecordingSink;

pub const OWNER_PHONE: &str = "9000000000";

pub fn owner() -> Identity {
    Identity {
        subscriber_id: phone(OWNER_PHONE),
        name: "Kitchen Owner".to_string(),
        role: Role::Owner,
    }
}

pub fn member(phone_number: &str, name: &str) -> Identity {
    Identity {
        subscriber_id: phone(phone_number),
        name: name.to_string(),
        role: Role::Member,
    }
}

/// Panics on malformed input; test fixtures only.
pub fn phone(raw: &str) -> SubscriberId {
    match SubscriberId::parse(raw) {
        Ok(id) => id,
        Err(e) => panic!("bad fixture phone {raw}: {e}"),
    }
}

pub fn date(raw: &str) -> NaiveDate {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => d,
        Err(e) => panic!("bad fixture date {raw}: {e}"),
    }
}

/// Every service wired over one [`MemoryStore`], with notifications going
/// through a real [`Fanout`].
#[derive(Clone)]
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub fanout: Fanout,
    pub ledger: AttendanceLedger,
    pub billing: BillingEngine,
    pub subscriptions: SubscriptionLifecycle,
}

impl Harness {
    pub fn new(today: NaiveDate) -> Self {
        Self::with_push_timeout(today, Duration::from_millis(200))
    }

    pub fn with_push_timeout(today: NaiveDate, push_timeout: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(today));
        let fanout = Fanout::new(store.clone(), ChannelRegistry::new(8), push_timeout);
        let sink = Arc::new(fanout.clone());

        let ledger = AttendanceLedger::new(store.clone(), clock.clone(), sink.clone());
        let billing = BillingEngine::new(
            store.clone(),
            store.clone(),
            sink.clone(),
            BillNumbering::default(),
        );
        let subscriptions = SubscriptionLifecycle::new(store.clone(), clock.clone(), sink);

        Self {
            store,
            clock,
            fanout,
            ledger,
            billing,
            subscriptions,
        }
    }
}
