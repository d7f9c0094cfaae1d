//! Admin sessions and the admin action log.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use argon2::{Argon2, PasswordVerifier, password_hash::PasswordHash};
use chrono::{DateTime, Duration, Utc};
use evote_common::config::AdminConfig;
use evote_common::{AppError, AppResult, IdGenerator};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Entries kept by [`AdminActionLog`] before the oldest is evicted.
pub const ACTION_LOG_CAPACITY: usize = 50;

/// An issued admin bearer token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Single configured administrator, bearer-token sessions held in memory.
#[derive(Clone)]
pub struct AdminAuthService {
    config: AdminConfig,
    sessions: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
    id_gen: IdGenerator,
}

impl AdminAuthService {
    /// Create a new admin auth service.
    #[must_use]
    pub fn new(config: AdminConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            id_gen: IdGenerator::new(),
        }
    }

    /// Check credentials and open a session.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<AdminSession> {
        let password_ok = verify_password(password, &self.config.password_hash)?;
        if username != self.config.username || !password_ok {
            warn!(username = %username, "Rejected admin login");
            return Err(AppError::Unauthorized);
        }

        let token = self.id_gen.generate_token();
        let expires_at = Utc::now() + Duration::seconds(self.config.session_ttl_secs);
        self.sessions.write().await.insert(token.clone(), expires_at);

        info!("Admin logged in");
        Ok(AdminSession { token, expires_at })
    }

    /// Validate a bearer token.
    pub async fn authenticate(&self, token: &str) -> AppResult<()> {
        match self.sessions.read().await.get(token) {
            Some(expires_at) if *expires_at > Utc::now() => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Drop expired sessions (called periodically).
    pub async fn cleanup_expired_sessions(&self) {
        let now = Utc::now();
        self.sessions.write().await.retain(|_, exp| *exp > now);
    }
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Config(format!("Invalid admin password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// What an admin-log entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminActionKind {
    ElectionCreated,
    ElectionUpdated,
    ElectionStatusChanged,
    ElectionDeleted,
    ResultsReleased,
    VoteCast,
    VoterRegistered,
    VoterRemoved,
}

/// One admin-log entry. `seq` increases monotonically across evictions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAction {
    pub seq: u64,
    pub kind: AdminActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub election_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voter_id: Option<String>,
    pub details: String,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct ActionLogInner {
    entries: VecDeque<AdminAction>,
    next_seq: u64,
}

/// Bounded ring buffer of recent admin-visible events.
///
/// Clients poll it with the last `seq` they saw to decide whether to refresh.
/// Nothing reads it for correctness.
#[derive(Clone)]
pub struct AdminActionLog {
    inner: Arc<RwLock<ActionLogInner>>,
    capacity: usize,
}

impl Default for AdminActionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminActionLog {
    /// Create a log holding [`ACTION_LOG_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(ACTION_LOG_CAPACITY)
    }

    /// Create a log with a custom capacity (at least 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ActionLogInner::default())),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, evicting the oldest when full. Returns its `seq`.
    pub async fn record(
        &self,
        kind: AdminActionKind,
        election_id: Option<&str>,
        voter_id: Option<&str>,
        details: impl Into<String>,
    ) -> u64 {
        let mut inner = self.inner.write().await;
        inner.next_seq += 1;
        let seq = inner.next_seq;
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(AdminAction {
            seq,
            kind,
            election_id: election_id.map(str::to_string),
            voter_id: voter_id.map(str::to_string),
            details: details.into(),
            at: Utc::now(),
        });
        seq
    }

    /// All retained entries, oldest first.
    pub async fn recent(&self) -> Vec<AdminAction> {
        self.inner.read().await.entries.iter().cloned().collect()
    }

    /// Retained entries with `seq` greater than `seq`.
    pub async fn since(&self, seq: u64) -> Vec<AdminAction> {
        self.inner
            .read()
            .await
            .entries
            .iter()
            .filter(|a| a.seq > seq)
            .cloned()
            .collect()
    }

    /// Highest `seq` issued so far (0 if none).
    pub async fn latest_seq(&self) -> u64 {
        self.inner.read().await.next_seq
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use argon2::{
        PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    fn admin_config(password: &str) -> AdminConfig {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string();
        AdminConfig {
            username: "admin".to_string(),
            password_hash: hash,
            session_ttl_secs: 60,
        }
    }

    #[tokio::test]
    async fn test_login_authenticate_logout() {
        let service = AdminAuthService::new(admin_config("s3cret"));

        let session = service.login("admin", "s3cret").await.unwrap();
        assert!(service.authenticate(&session.token).await.is_ok());

        service.logout(&session.token).await;
        assert!(matches!(
            service.authenticate(&session.token).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let service = AdminAuthService::new(admin_config("s3cret"));

        assert!(matches!(
            service.login("admin", "wrong").await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            service.login("root", "s3cret").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let mut config = admin_config("pw");
        config.session_ttl_secs = -1;
        let service = AdminAuthService::new(config);

        let session = service.login("admin", "pw").await.unwrap();
        assert!(service.authenticate(&session.token).await.is_err());

        service.cleanup_expired_sessions().await;
        assert!(service.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_action_log_evicts_oldest_first() {
        let log = AdminActionLog::new();

        for i in 0..(ACTION_LOG_CAPACITY as u64 + 5) {
            log.record(AdminActionKind::VoteCast, Some("e1"), None, format!("vote {i}"))
                .await;
        }

        let recent = log.recent().await;
        assert_eq!(recent.len(), ACTION_LOG_CAPACITY);
        assert_eq!(recent[0].seq, 6);
        assert_eq!(recent.last().unwrap().seq, ACTION_LOG_CAPACITY as u64 + 5);
    }

    #[tokio::test]
    async fn test_action_log_since() {
        let log = AdminActionLog::with_capacity(3);
        let first = log
            .record(AdminActionKind::ElectionCreated, Some("e1"), None, "created")
            .await;
        log.record(AdminActionKind::VoteCast, Some("e1"), Some("v1"), "vote")
            .await;

        let newer = log.since(first).await;
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].kind, AdminActionKind::VoteCast);
        assert!(log.since(log.latest_seq().await).await.is_empty());
    }
}
