//! Bearer authentication.
//!
//! [`Caller`] is the extractor every protected handler takes; it resolves
//! the `Authorization: Bearer <token>` header through the configured
//! [`CredentialVerifier`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tfn_config::ResolvedCredential;
use tfn_schemas::{Clock, CredentialVerifier, Identity, Result, TiffinError};

use crate::{error::ApiError, state::AppState};

/// Verified identity of the request's caller.
#[derive(Clone, Debug)]
pub struct Caller(pub Identity);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        st: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| TiffinError::Unauthorized("missing bearer token".to_string()))?;
        let token = raw
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TiffinError::Unauthorized("malformed authorization header".to_string()))?;
        let identity = st.verifier.verify(token).await?;
        Ok(Caller(identity))
    }
}

/// Fixed token table built from resolved config credentials.
pub struct StaticCredentialVerifier {
    by_token: HashMap<String, ResolvedCredential>,
    clock: Arc<dyn Clock>,
}

impl StaticCredentialVerifier {
    pub fn new(credentials: Vec<ResolvedCredential>, clock: Arc<dyn Clock>) -> Self {
        Self {
            by_token: credentials
                .into_iter()
                .map(|c| (c.token.clone(), c))
                .collect(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentialVerifier {
    async fn verify(&self, token: &str) -> Result<Identity> {
        let cred = self
            .by_token
            .get(token)
            .ok_or_else(|| TiffinError::Unauthorized("invalid credentials".to_string()))?;
        if cred.expires_at.is_some_and(|at| at <= self.clock.now()) {
            return Err(TiffinError::Unauthorized("credentials expired".to_string()));
        }
        Ok(Identity {
            subscriber_id: cred.subscriber_id.clone(),
            name: cred.name.clone(),
            role: cred.role,
        })
    }
}
