//! Bearer credential resolution.
//!
//! Config stores env var NAMES. [`resolve_credentials`] is called once at
//! startup and the result handed to the verifier; nothing else reads the
//! environment for tokens. Errors mention the NAME, never the value.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tfn_schemas::{Role, SubscriberId};

use crate::settings::TiffinConfig;

#[derive(Clone)]
pub struct ResolvedCredential {
    pub token: String,
    pub subscriber_id: SubscriberId,
    pub name: String,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("token", &"<REDACTED>")
            .field("subscriber_id", &self.subscriber_id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Every configured credential is required: a missing env var is a startup
/// error rather than a silently disabled login.
pub fn resolve_credentials(cfg: &TiffinConfig) -> Result<Vec<ResolvedCredential>> {
    let mut out = Vec::with_capacity(cfg.auth.credentials.len());
    for (i, spec) in cfg.auth.credentials.iter().enumerate() {
        let Some(token) = resolve_env(&spec.token_env) else {
            bail!(
                "SECRETS_MISSING auth.credentials[{i}]: env var '{}' is not set or empty",
                spec.token_env
            );
        };
        let subscriber_id = match SubscriberId::parse(&spec.subscriber_id) {
            Ok(id) => id,
            Err(_) => bail!(
                "CONFIG_INVALID auth.credentials[{i}].subscriber_id is not a 10-digit phone number"
            ),
        };
        out.push(ResolvedCredential {
            token,
            subscriber_id,
            name: spec.name.clone(),
            role: spec.role,
            expires_at: spec.expires_at,
        });
    }
    Ok(out)
}
