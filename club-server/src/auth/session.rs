//! Server-side session revocation
//!
//! Tokens are stateless, so signing out records a revocation time per uid.
//! Any token issued at or before that time is rejected afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use shared::{AppError, AppResult};

use crate::profile::SessionControl;

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    /// uid -> revocation time, seconds
    revoked: Arc<DashMap<String, i64>>,
    /// uid -> issue time of the newest accepted token, seconds
    latest: Arc<DashMap<String, i64>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, uid: &str) {
        self.revoked.insert(uid.to_string(), Utc::now().timestamp());
    }

    /// Whether a token for `uid` issued at `issued_at` is still usable
    pub fn is_valid(&self, uid: &str, issued_at: i64) -> bool {
        self.revoked
            .get(uid)
            .is_none_or(|revoked_at| issued_at > *revoked_at)
    }

    /// Remember an accepted token so a later sign-in outlives a revocation
    pub fn record_token(&self, uid: &str, issued_at: i64) {
        let mut latest = self.latest.entry(uid.to_string()).or_insert(issued_at);
        if issued_at > *latest {
            *latest = issued_at;
        }
    }

    /// Revoked and not signed in again since
    pub fn is_revoked(&self, uid: &str) -> bool {
        let Some(revoked_at) = self.revoked.get(uid).map(|r| *r) else {
            return false;
        };
        self.latest
            .get(uid)
            .is_none_or(|latest| *latest <= revoked_at)
    }
}

#[async_trait]
impl SessionControl for SessionRegistry {
    async fn refresh_token(&self, uid: &str) -> AppResult<()> {
        if self.is_revoked(uid) {
            return Err(AppError::session_expired());
        }
        Ok(())
    }

    async fn sign_out(&self, uid: &str) -> AppResult<()> {
        self.revoke(uid);
        crate::security_log!("INFO", "session_revoked", uid = uid);
        Ok(())
    }
}
