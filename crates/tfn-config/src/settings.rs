//! Typed view over the merged config JSON. Every field has a default so an
//! empty config is a valid dev setup.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tfn_schemas::Role;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiffinConfig {
    pub server: ServerSettings,
    pub db: DbSettings,
    pub billing: BillingSettings,
    pub notify: NotifySettings,
    pub sweep: SweepSettings,
    pub clock: ClockSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    pub max_connections: u32,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    pub number_prefix: String,
    pub number_width: usize,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            number_prefix: "BILL".to_string(),
            number_width: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub push_timeout_ms: u64,
    pub channel_buffer: usize,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            push_timeout_ms: 250,
            channel_buffer: 64,
        }
    }
}

impl NotifySettings {
    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
        }
    }
}

impl SweepSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub timezone: String,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub credentials: Vec<CredentialSpec>,
}

/// One bearer credential. `token_env` is the NAME of the env var holding
/// the token; the token itself never appears in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSpec {
    pub token_env: String,
    pub subscriber_id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TiffinConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: TiffinConfig =
            serde_json::from_value(config_json.clone()).context("config does not match schema")?;
        cfg.check()?;
        Ok(cfg)
    }

    fn check(&self) -> Result<()> {
        if self.billing.number_prefix.trim().is_empty() {
            bail!("CONFIG_INVALID billing.number_prefix must not be empty");
        }
        if !(1..=12).contains(&self.billing.number_width) {
            bail!("CONFIG_INVALID billing.number_width must be in 1..=12");
        }
        if self.notify.push_timeout_ms == 0 {
            bail!("CONFIG_INVALID notify.push_timeout_ms must be > 0");
        }
        if self.notify.channel_buffer == 0 {
            bail!("CONFIG_INVALID notify.channel_buffer must be > 0");
        }
        if self.sweep.interval_secs == 0 {
            bail!("CONFIG_INVALID sweep.interval_secs must be > 0");
        }
        if self.db.max_connections == 0 {
            bail!("CONFIG_INVALID db.max_connections must be > 0");
        }
        Ok(())
    }
}
