//! Voter service: registration and verification.

use chrono::{DateTime, Duration, Utc};
use evote_common::config::VerificationConfig;
use evote_common::{
    AppError, AppResult, IdGenerator, generate_numeric_code, hash_aadhaar, is_valid_aadhaar,
    sha256_hex,
};
use evote_db::{
    entities::{voter, voting_history},
    repositories::{VoterRepository, VotingRepository},
};
use sea_orm::Set;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::admin::{AdminActionKind, AdminActionLog};

const OTP_DIGITS: usize = 6;

/// Input for registering a voter.
#[derive(Debug, Clone)]
pub struct RegisterVoterInput {
    pub aadhaar_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Result of issuing an OTP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
    pub voter_id: String,
    pub expires_at: DateTime<Utc>,
    /// Present only when OTPs are configured to be returned to the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// Voter service for business logic.
#[derive(Clone)]
pub struct VoterService {
    voter_repo: VoterRepository,
    voting_repo: VotingRepository,
    config: VerificationConfig,
    action_log: AdminActionLog,
    id_gen: IdGenerator,
}

impl VoterService {
    /// Create a new voter service.
    #[must_use]
    pub const fn new(
        voter_repo: VoterRepository,
        voting_repo: VotingRepository,
        config: VerificationConfig,
        action_log: AdminActionLog,
    ) -> Self {
        Self {
            voter_repo,
            voting_repo,
            config,
            action_log,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new, unverified voter.
    pub async fn register(&self, input: RegisterVoterInput) -> AppResult<voter::Model> {
        let aadhaar_id = input.aadhaar_id.trim();
        if !is_valid_aadhaar(aadhaar_id) {
            return Err(AppError::Validation(
                "Aadhaar number must be exactly 12 digits".to_string(),
            ));
        }
        let name = input.name.trim();
        if name.is_empty() || name.chars().count() > 128 {
            return Err(AppError::Validation(
                "Name must be between 1 and 128 characters".to_string(),
            ));
        }
        if self.voter_repo.find_by_aadhaar_id(aadhaar_id).await?.is_some() {
            return Err(AppError::AlreadyExists(
                "A voter with this Aadhaar number is already registered".to_string(),
            ));
        }

        let model = voter::ActiveModel {
            id: Set(self.id_gen.generate()),
            aadhaar_id: Set(aadhaar_id.to_string()),
            aadhaar_hash: Set(hash_aadhaar(aadhaar_id)),
            name: Set(name.to_string()),
            email: Set(non_empty(input.email)),
            phone: Set(non_empty(input.phone)),
            otp_hash: Set(None),
            otp_expires_at: Set(None),
            otp_attempts: Set(0),
            locked_until: Set(None),
            otp_verified: Set(false),
            fingerprint_hash: Set(None),
            biometric_verified: Set(false),
            is_verified: Set(false),
            has_voted: Set(json!({})),
            schema_version: Set(voter::SCHEMA_VERSION),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        let voter = self.voter_repo.create(model).await?;

        info!(voter_id = %voter.id, "Voter registered");
        self.action_log
            .record(
                AdminActionKind::VoterRegistered,
                None,
                Some(&voter.id),
                "Voter registered",
            )
            .await;

        Ok(voter)
    }

    /// Issue a fresh OTP, replacing any outstanding one.
    pub async fn send_otp(&self, aadhaar_id: &str) -> AppResult<OtpIssued> {
        let voter = self.voter_repo.get_by_aadhaar_id(aadhaar_id.trim()).await?;
        let now = Utc::now();
        if voter.is_locked(now) {
            return Err(AppError::Locked(
                "Too many failed attempts; try again later".to_string(),
            ));
        }

        let lock_expired = voter.locked_until.is_some();
        let otp = generate_numeric_code(OTP_DIGITS);
        let expires_at = now + Duration::seconds(self.config.otp_ttl_secs);

        let voter_id = voter.id.clone();
        let mut active: voter::ActiveModel = voter.into();
        active.otp_hash = Set(Some(sha256_hex(&otp)));
        active.otp_expires_at = Set(Some(expires_at.into()));
        // Failed guesses carry over until a lockout has run its course.
        if lock_expired {
            active.otp_attempts = Set(0);
            active.locked_until = Set(None);
        }
        active.updated_at = Set(Some(now.into()));
        self.voter_repo.update(active).await?;

        info!(voter_id = %voter_id, "OTP issued");
        Ok(OtpIssued {
            voter_id,
            expires_at,
            otp: self.config.expose_otp.then_some(otp),
        })
    }

    /// Check an OTP. Repeated failures lock the voter out.
    pub async fn verify_otp(&self, aadhaar_id: &str, code: &str) -> AppResult<voter::Model> {
        let voter = self.voter_repo.get_by_aadhaar_id(aadhaar_id.trim()).await?;
        let now = Utc::now();
        if voter.is_locked(now) {
            return Err(AppError::Locked(
                "Too many failed attempts; try again later".to_string(),
            ));
        }

        let Some(expected) = voter.otp_hash.clone() else {
            return Err(AppError::VerificationFailed(
                "No OTP has been requested".to_string(),
            ));
        };
        if voter.otp_expires_at.is_none_or(|exp| exp < now) {
            return Err(AppError::VerificationFailed("OTP has expired".to_string()));
        }

        if sha256_hex(code.trim()) != expected {
            let attempts = voter.otp_attempts + 1;
            let locked = attempts >= self.config.otp_max_attempts;
            let voter_id = voter.id.clone();

            let mut active: voter::ActiveModel = voter.into();
            active.otp_attempts = Set(attempts);
            if locked {
                active.locked_until =
                    Set(Some((now + Duration::seconds(self.config.lockout_secs)).into()));
                active.otp_hash = Set(None);
                active.otp_expires_at = Set(None);
            }
            active.updated_at = Set(Some(now.into()));
            self.voter_repo.update(active).await?;

            if locked {
                warn!(voter_id = %voter_id, "Voter locked out after failed OTP attempts");
                return Err(AppError::Locked(
                    "Too many failed attempts; try again later".to_string(),
                ));
            }
            return Err(AppError::VerificationFailed(format!(
                "Invalid OTP ({} attempts left)",
                self.config.otp_max_attempts - attempts
            )));
        }

        let biometric = voter.biometric_verified;
        let mut active: voter::ActiveModel = voter.into();
        active.otp_hash = Set(None);
        active.otp_expires_at = Set(None);
        active.otp_attempts = Set(0);
        active.otp_verified = Set(true);
        active.is_verified = Set(biometric);
        active.updated_at = Set(Some(now.into()));
        let voter = self.voter_repo.update(active).await?;

        info!(voter_id = %voter.id, verified = voter.is_verified, "OTP verified");
        Ok(voter)
    }

    /// Store a simulated fingerprint template. Re-registering replaces it.
    pub async fn register_fingerprint(&self, voter_id: &str, data: &str) -> AppResult<voter::Model> {
        if data.trim().is_empty() {
            return Err(AppError::Validation(
                "Fingerprint data is required".to_string(),
            ));
        }
        let voter = self.voter_repo.get_by_id(voter_id).await?;

        let mut active: voter::ActiveModel = voter.into();
        active.fingerprint_hash = Set(Some(sha256_hex(data)));
        active.biometric_verified = Set(false);
        active.is_verified = Set(false);
        active.updated_at = Set(Some(Utc::now().into()));
        self.voter_repo.update(active).await
    }

    /// Compare a simulated fingerprint against the stored template.
    pub async fn verify_fingerprint(&self, voter_id: &str, data: &str) -> AppResult<voter::Model> {
        let voter = self.voter_repo.get_by_id(voter_id).await?;
        let Some(expected) = voter.fingerprint_hash.as_deref() else {
            return Err(AppError::VerificationFailed(
                "No fingerprint registered".to_string(),
            ));
        };
        if sha256_hex(data) != expected {
            return Err(AppError::VerificationFailed(
                "Fingerprint does not match".to_string(),
            ));
        }
        self.mark_biometric_verified(voter).await
    }

    /// Record a passed biometric check (fingerprint or passkey).
    pub async fn set_biometric_verified(&self, voter_id: &str) -> AppResult<voter::Model> {
        let voter = self.voter_repo.get_by_id(voter_id).await?;
        self.mark_biometric_verified(voter).await
    }

    async fn mark_biometric_verified(&self, voter: voter::Model) -> AppResult<voter::Model> {
        let otp = voter.otp_verified;
        let mut active: voter::ActiveModel = voter.into();
        active.biometric_verified = Set(true);
        active.is_verified = Set(otp);
        active.updated_at = Set(Some(Utc::now().into()));
        let voter = self.voter_repo.update(active).await?;

        info!(voter_id = %voter.id, verified = voter.is_verified, "Biometric verified");
        Ok(voter)
    }

    /// Get a voter by ID.
    pub async fn get(&self, voter_id: &str) -> AppResult<voter::Model> {
        self.voter_repo.get_by_id(voter_id).await
    }

    /// Get a voter by Aadhaar number.
    pub async fn find_by_aadhaar(&self, aadhaar_id: &str) -> AppResult<voter::Model> {
        self.voter_repo.get_by_aadhaar_id(aadhaar_id.trim()).await
    }

    /// A voter's history, most recent first.
    pub async fn history(&self, voter_id: &str) -> AppResult<Vec<voting_history::Model>> {
        self.voter_repo.get_by_id(voter_id).await?;
        self.voting_repo.find_history_by_voter(voter_id).await
    }

    /// List voters (admin).
    pub async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<voter::Model>> {
        self.voter_repo.list(limit.clamp(1, 500), offset).await
    }

    /// Remove a voter (admin). Election tallies are not adjusted.
    pub async fn remove(&self, voter_id: &str) -> AppResult<()> {
        self.voter_repo.delete(voter_id).await?;

        info!(voter_id = %voter_id, "Voter removed");
        self.action_log
            .record(AdminActionKind::VoterRemoved, None, Some(voter_id), "Voter removed")
            .await;
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
