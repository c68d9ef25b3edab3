//! Command handler modules for tfn-cli.
//!
//! Shared wiring used by multiple command paths lives here.
//! Command-specific logic lives in the submodules.

pub mod bill;
pub mod sweep;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tfn_billing::{BillNumbering, BillingEngine};
use tfn_config::{ConfigConsumer, TiffinConfig, UnusedKeyPolicy};
use tfn_db::PgStore;
use tfn_notify::{ChannelRegistry, Fanout};
use tfn_schemas::{Clock, Identity, NotificationSink, Role, SubscriberId, SystemClock};
use tfn_subscription::SubscriptionLifecycle;
use tracing::warn;

const SHELL_READER: &str = "0000000000";

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Config from `TIFFIN_CONFIG`, with keys the CLI never reads reported.
pub fn load_settings() -> Result<TiffinConfig> {
    let loaded = tfn_config::load_from_env()?;
    let unused =
        tfn_config::report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config/unused_keys");
    }
    loaded.settings()
}

/// Connected, migrated store plus the business clock.
pub struct Wiring {
    pub store: Arc<PgStore>,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn NotificationSink>,
    pub cfg: TiffinConfig,
}

impl Wiring {
    pub async fn connect() -> Result<Self> {
        let cfg = load_settings()?;
        let clock: Arc<dyn Clock> =
            Arc::new(SystemClock::from_name(&cfg.clock.timezone).context("clock.timezone")?);
        let pool = tfn_db::connect_from_env(cfg.db.max_connections).await?;
        tfn_db::migrate(&pool).await?;
        let store = Arc::new(PgStore::new(pool));

        // No process-local push channels here: notifications are persisted
        // and picked up by clients through the daemon's inbox.
        let sink: Arc<dyn NotificationSink> = Arc::new(Fanout::new(
            store.clone(),
            ChannelRegistry::new(cfg.notify.channel_buffer),
            cfg.notify.push_timeout(),
        ));

        Ok(Self {
            store,
            clock,
            sink,
            cfg,
        })
    }

    pub fn billing(&self) -> BillingEngine {
        let numbering =
            BillNumbering::new(&self.cfg.billing.number_prefix, self.cfg.billing.number_width);
        BillingEngine::new(
            self.store.clone(),
            self.store.clone(),
            self.sink.clone(),
            numbering,
        )
    }

    pub fn subscriptions(&self) -> SubscriptionLifecycle {
        SubscriptionLifecycle::new(self.store.clone(), self.clock.clone(), self.sink.clone())
    }
}

/// Owner identity for an operator acting from the shell.
pub fn operator(by: &str) -> Result<Identity> {
    let subscriber_id = SubscriberId::parse(by).with_context(|| format!("invalid --by '{by}'"))?;
    Ok(Identity {
        subscriber_id,
        name: "operator".to_string(),
        role: Role::Owner,
    })
}

/// Owner identity for read-only commands; nothing it does is attributed.
pub fn reader() -> Result<Identity> {
    Ok(Identity {
        subscriber_id: SubscriberId::parse(SHELL_READER)?,
        name: "shell".to_string(),
        role: Role::Owner,
    })
}

pub fn parse_date(flag: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid {flag} '{raw}', expected YYYY-MM-DD"))
}
