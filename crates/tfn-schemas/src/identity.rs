use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, SubscriberId, TiffinError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Runs the kitchen: records attendance, generates bills, runs sweeps.
    Owner,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "owner" => Ok(Role::Owner),
            "member" => Ok(Role::Member),
            other => Err(TiffinError::validation(
                "role",
                format!("unknown role '{other}'"),
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified caller. Trusted for every operator-attributed field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subscriber_id: SubscriberId,
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    /// Value written into recorded_by / generated_by / sent_by.
    pub fn actor(&self) -> String {
        self.subscriber_id.to_string()
    }

    pub fn require_owner(&self) -> Result<()> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(TiffinError::Forbidden("owner role required".to_string()))
        }
    }

    /// Members may only touch their own data; owners may touch anyone's.
    pub fn require_self_or_owner(&self, subscriber: &SubscriberId) -> Result<()> {
        if self.is_owner() || &self.subscriber_id == subscriber {
            Ok(())
        } else {
            Err(TiffinError::Forbidden(
                "not permitted to access another subscriber's data".to_string(),
            ))
        }
    }
}

/// External credential collaborator: bearer token in, identity out.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Fails `Unauthorized` for unknown or expired tokens.
    async fn verify(&self, token: &str) -> Result<Identity>;
}
