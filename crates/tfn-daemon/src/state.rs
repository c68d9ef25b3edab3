//! Shared runtime state for tfn-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The services inside
//! are cheap `Arc` handles; this module owns nothing async itself apart
//! from the sweep ticker.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tfn_billing::{BillNumbering, BillStore, BillingEngine};
use tfn_config::TiffinConfig;
use tfn_ledger::{AttendanceLedger, AttendanceStore};
use tfn_notify::{ChannelRegistry, Fanout, NotificationStore};
use tfn_schemas::{Clock, CredentialVerifier};
use tfn_subscription::{SubscriptionLifecycle, SubscriptionStore};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub clock: Arc<dyn Clock>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub ledger: AttendanceLedger,
    pub billing: BillingEngine,
    pub subscriptions: SubscriptionLifecycle,
    pub fanout: Fanout,
}

impl AppState {
    /// Wire every service over one store. The same `Fanout` is both the
    /// notification service and the sink every other service emits into.
    pub fn wire<S>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn CredentialVerifier>,
        cfg: &TiffinConfig,
    ) -> Self
    where
        S: AttendanceStore + BillStore + SubscriptionStore + NotificationStore + 'static,
    {
        let fanout = Fanout::new(
            store.clone(),
            ChannelRegistry::new(cfg.notify.channel_buffer),
            cfg.notify.push_timeout(),
        );
        let sink = Arc::new(fanout.clone());
        let numbering = BillNumbering::new(&cfg.billing.number_prefix, cfg.billing.number_width);

        Self {
            build: BuildInfo {
                service: "tfn-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            ledger: AttendanceLedger::new(store.clone(), clock.clone(), sink.clone()),
            billing: BillingEngine::new(store.clone(), store.clone(), sink.clone(), numbering),
            subscriptions: SubscriptionLifecycle::new(store, clock.clone(), sink),
            clock,
            verifier,
            fanout,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that runs the expiry sweep every `interval`.
///
/// The first tick fires immediately so a restart catches up at once. A
/// failed sweep is logged and retried on the next tick.
pub fn spawn_sweep(subscriptions: SubscriptionLifecycle, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match subscriptions.sweep_now().await {
                Ok(report) if !report.expired.is_empty() || !report.failed.is_empty() => {
                    info!(
                        expired = report.expired.len(),
                        failed = report.failed.len(),
                        "sweep/tick"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "sweep/tick_failed"),
            }
        }
    });
}
