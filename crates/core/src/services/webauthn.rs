//! Passkey (`WebAuthn`) biometric verification for voters.
//!
//! A completed passkey ceremony counts as the biometric factor: on success the
//! voter is marked biometric-verified exactly like a fingerprint match.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use evote_common::{AppError, AppResult, IdGenerator};
use evote_db::entities::voter_credential;
use evote_db::repositories::VoterCredentialRepository;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use url::Url;
use webauthn_rs::prelude::*;

use super::voter::VoterService;

/// `WebAuthn` relying party configuration.
#[derive(Debug, Clone)]
pub struct WebAuthnConfig {
    /// The relying party ID (the host of the public URL).
    pub rp_id: String,
    /// The relying party name shown by authenticators.
    pub rp_name: String,
    /// The origin URL (e.g., `https://vote.example.org`).
    pub origin: Url,
}

impl WebAuthnConfig {
    /// Create a new `WebAuthn` configuration from a server URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or has no host.
    pub fn from_server_url(server_url: &str, rp_name: &str) -> AppResult<Self> {
        let url = Url::parse(server_url)
            .map_err(|e| AppError::Config(format!("Invalid server URL: {e}")))?;

        let rp_id = url
            .host_str()
            .ok_or_else(|| AppError::Config("Server URL has no host".to_string()))?
            .to_string();

        Ok(Self {
            rp_id,
            rp_name: rp_name.to_string(),
            origin: url,
        })
    }
}

/// A pending ceremony.
#[derive(Debug, Clone)]
struct PendingChallenge {
    state: String,
    expires_at: i64,
}

/// Options for the browser plus the ID that completes the ceremony.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub challenge_id: String,
    pub options: serde_json::Value,
}

/// Credential returned by the browser.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteChallengeInput {
    pub challenge_id: String,
    pub credential: serde_json::Value,
}

/// A registered passkey.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterCredentialResponse {
    pub id: String,
    pub credential_id: String,
    pub last_used_at: Option<String>,
    pub created_at: String,
}

impl From<voter_credential::Model> for VoterCredentialResponse {
    fn from(key: voter_credential::Model) -> Self {
        Self {
            id: key.id,
            credential_id: key.credential_id,
            last_used_at: key.last_used_at.map(|t| t.to_rfc3339()),
            created_at: key.created_at.to_rfc3339(),
        }
    }
}

/// Challenge expiration time in seconds.
const CHALLENGE_EXPIRY_SECS: i64 = 300; // 5 minutes

type ChallengeMap = Arc<RwLock<HashMap<String, PendingChallenge>>>;

/// Service for voter passkey ceremonies.
#[derive(Clone)]
pub struct WebAuthnService {
    webauthn: Arc<Webauthn>,
    credential_repo: VoterCredentialRepository,
    voter_service: VoterService,
    id_gen: IdGenerator,
    registration_challenges: ChallengeMap,
    authentication_challenges: ChallengeMap,
}

impl WebAuthnService {
    /// Create a new `WebAuthn` service.
    ///
    /// # Errors
    /// Returns an error if the relying party configuration is rejected.
    pub fn new(
        config: &WebAuthnConfig,
        credential_repo: VoterCredentialRepository,
        voter_service: VoterService,
    ) -> AppResult<Self> {
        let webauthn = WebauthnBuilder::new(&config.rp_id, &config.origin)
            .map_err(|e| AppError::Config(format!("Failed to create WebAuthn builder: {e}")))?
            .rp_name(&config.rp_name)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build WebAuthn: {e}")))?;

        Ok(Self {
            webauthn: Arc::new(webauthn),
            credential_repo,
            voter_service,
            id_gen: IdGenerator::new(),
            registration_challenges: Arc::new(RwLock::new(HashMap::new())),
            authentication_challenges: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    // ==================== Registration ====================

    /// Begin passkey registration for a voter.
    pub async fn begin_registration(&self, voter_id: &str) -> AppResult<ChallengeResponse> {
        let voter = self.voter_service.get(voter_id).await?;

        let exclude_credentials: Vec<CredentialID> = self
            .credential_repo
            .find_by_voter_id(voter_id)
            .await?
            .iter()
            .filter_map(|k| URL_SAFE_NO_PAD.decode(&k.credential_id).ok())
            .map(CredentialID::from)
            .collect();

        let (ccr, reg_state) = self
            .webauthn
            .start_passkey_registration(
                Uuid::new_v4(),
                &voter.aadhaar_hash,
                &voter.name,
                Some(exclude_credentials),
            )
            .map_err(|e| AppError::Internal(format!("Failed to start registration: {e}")))?;

        let challenge_id = self
            .store(&self.registration_challenges, voter_id, &reg_state)
            .await?;
        let options = serde_json::to_value(&ccr)
            .map_err(|e| AppError::Internal(format!("Failed to serialize options: {e}")))?;

        Ok(ChallengeResponse {
            challenge_id,
            options,
        })
    }

    /// Complete passkey registration and store the credential.
    pub async fn complete_registration(
        &self,
        voter_id: &str,
        input: CompleteChallengeInput,
    ) -> AppResult<VoterCredentialResponse> {
        let reg_state: PasskeyRegistration = self
            .take(&self.registration_challenges, voter_id, &input.challenge_id)
            .await?;

        let reg_response: RegisterPublicKeyCredential = serde_json::from_value(input.credential)
            .map_err(|e| AppError::Validation(format!("Invalid credential response: {e}")))?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&reg_response, &reg_state)
            .map_err(|e| AppError::VerificationFailed(format!("Registration failed: {e}")))?;

        let public_key = serde_json::to_string(&passkey)
            .map_err(|e| AppError::Internal(format!("Failed to serialize passkey: {e}")))?;

        let model = voter_credential::ActiveModel {
            id: Set(self.id_gen.generate()),
            voter_id: Set(voter_id.to_string()),
            credential_id: Set(URL_SAFE_NO_PAD.encode(passkey.cred_id())),
            public_key: Set(public_key),
            counter: Set(0),
            last_used_at: Set(None),
            created_at: Set(Utc::now().into()),
        };
        let key = self.credential_repo.create(model).await?;

        info!(voter_id = %voter_id, "Passkey registered");
        Ok(key.into())
    }

    // ==================== Authentication ====================

    /// Begin passkey authentication for a voter.
    pub async fn begin_authentication(&self, voter_id: &str) -> AppResult<ChallengeResponse> {
        let keys = self.credential_repo.find_by_voter_id(voter_id).await?;
        if keys.is_empty() {
            return Err(AppError::Validation("No passkeys registered".to_string()));
        }

        let passkeys: Vec<Passkey> = keys
            .iter()
            .filter_map(|k| serde_json::from_str(&k.public_key).ok())
            .collect();
        if passkeys.is_empty() {
            return Err(AppError::Internal("Failed to load passkeys".to_string()));
        }

        let (rcr, auth_state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(|e| AppError::Internal(format!("Failed to start authentication: {e}")))?;

        let challenge_id = self
            .store(&self.authentication_challenges, voter_id, &auth_state)
            .await?;
        let options = serde_json::to_value(&rcr)
            .map_err(|e| AppError::Internal(format!("Failed to serialize options: {e}")))?;

        Ok(ChallengeResponse {
            challenge_id,
            options,
        })
    }

    /// Complete passkey authentication; marks the voter biometric-verified.
    pub async fn complete_authentication(
        &self,
        voter_id: &str,
        input: CompleteChallengeInput,
    ) -> AppResult<evote_db::entities::voter::Model> {
        let auth_state: PasskeyAuthentication = self
            .take(&self.authentication_challenges, voter_id, &input.challenge_id)
            .await?;

        let auth_response: PublicKeyCredential = serde_json::from_value(input.credential)
            .map_err(|e| AppError::Validation(format!("Invalid credential response: {e}")))?;

        let auth_result = self
            .webauthn
            .finish_passkey_authentication(&auth_response, &auth_state)
            .map_err(|e| AppError::VerificationFailed(format!("Authentication failed: {e}")))?;

        let credential_id = URL_SAFE_NO_PAD.encode(auth_result.cred_id());
        match self
            .credential_repo
            .find_by_credential_id(&credential_id)
            .await?
        {
            Some(key) if key.voter_id == voter_id => {
                self.credential_repo
                    .update_counter(&key.id, i64::from(auth_result.counter()))
                    .await?;
            }
            _ => {
                return Err(AppError::VerificationFailed(
                    "Passkey does not belong to this voter".to_string(),
                ));
            }
        }

        self.voter_service.set_biometric_verified(voter_id).await
    }

    /// Passkeys registered by a voter.
    pub async fn list_credentials(&self, voter_id: &str) -> AppResult<Vec<VoterCredentialResponse>> {
        let keys = self.credential_repo.find_by_voter_id(voter_id).await?;
        Ok(keys.into_iter().map(Into::into).collect())
    }

    /// Drop expired challenges (called periodically).
    pub async fn cleanup_expired_challenges(&self) {
        let now = Utc::now().timestamp();
        self.registration_challenges
            .write()
            .await
            .retain(|_, c| c.expires_at > now);
        self.authentication_challenges
            .write()
            .await
            .retain(|_, c| c.expires_at > now);
    }

    async fn store<T: Serialize>(
        &self,
        map: &ChallengeMap,
        voter_id: &str,
        state: &T,
    ) -> AppResult<String> {
        let state = serde_json::to_string(state)
            .map_err(|e| AppError::Internal(format!("Failed to serialize state: {e}")))?;
        let challenge_id = self.id_gen.generate();
        map.write().await.insert(
            format!("{voter_id}:{challenge_id}"),
            PendingChallenge {
                state,
                expires_at: Utc::now().timestamp() + CHALLENGE_EXPIRY_SECS,
            },
        );
        Ok(challenge_id)
    }

    async fn take<T: serde::de::DeserializeOwned>(
        &self,
        map: &ChallengeMap,
        voter_id: &str,
        challenge_id: &str,
    ) -> AppResult<T> {
        let pending = map
            .write()
            .await
            .remove(&format!("{voter_id}:{challenge_id}"))
            .ok_or_else(|| AppError::Validation("Invalid or expired challenge".to_string()))?;

        if Utc::now().timestamp() > pending.expires_at {
            return Err(AppError::Validation("Challenge has expired".to_string()));
        }

        serde_json::from_str(&pending.state)
            .map_err(|e| AppError::Internal(format!("Failed to deserialize state: {e}")))
    }
}
