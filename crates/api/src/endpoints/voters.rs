//! Voter registration and verification endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use evote_common::AppResult;
use evote_core::{
    ChallengeResponse, CompleteChallengeInput, OtpIssued, RegisterVoterInput,
    VoterCredentialResponse,
};
use evote_db::entities::{voter, voting_history};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{middleware::AppState, response::ApiResponse};

/// Voter response. OTP and fingerprint hashes are never exposed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterResponse {
    pub id: String,
    pub aadhaar_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub otp_verified: bool,
    pub biometric_verified: bool,
    pub is_verified: bool,
    pub has_voted: serde_json::Value,
    pub locked_until: Option<String>,
    pub created_at: String,
}

impl From<voter::Model> for VoterResponse {
    fn from(v: voter::Model) -> Self {
        Self {
            id: v.id,
            aadhaar_id: v.aadhaar_id,
            name: v.name,
            email: v.email,
            phone: v.phone,
            otp_verified: v.otp_verified,
            biometric_verified: v.biometric_verified,
            is_verified: v.is_verified,
            has_voted: v.has_voted,
            locked_until: v.locked_until.map(|t| t.to_rfc3339()),
            created_at: v.created_at.to_rfc3339(),
        }
    }
}

/// One voting history entry.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryResponse {
    pub election_id: String,
    pub candidate_id: String,
    pub voted_at: String,
    pub is_revote: bool,
    pub blockchain_tx_hash: Option<String>,
}

impl From<voting_history::Model> for HistoryEntryResponse {
    fn from(h: voting_history::Model) -> Self {
        Self {
            election_id: h.election_id,
            candidate_id: h.candidate_id,
            voted_at: h.voted_at.to_rfc3339(),
            is_revote: h.is_revote,
            blockchain_tx_hash: h.blockchain_tx_hash,
        }
    }
}

/// Registration request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(equal = 12))]
    pub aadhaar_id: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

/// Register a voter.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<ApiResponse<VoterResponse>> {
    req.validate()?;

    let voter = state
        .voter_service
        .register(RegisterVoterInput {
            aadhaar_id: req.aadhaar_id,
            name: req.name,
            email: req.email,
            phone: req.phone,
        })
        .await?;

    Ok(ApiResponse::created(voter.into()))
}

/// OTP request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub aadhaar_id: String,
}

/// Issue a one-time code.
async fn send_otp(
    State(state): State<AppState>,
    Json(req): Json<SendOtpRequest>,
) -> AppResult<ApiResponse<OtpIssued>> {
    let issued = state.voter_service.send_otp(&req.aadhaar_id).await?;
    Ok(ApiResponse::ok(issued))
}

/// OTP verification request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub aadhaar_id: String,
    #[validate(length(min = 1, max = 16))]
    pub otp: String,
}

/// Check a one-time code.
async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> AppResult<ApiResponse<VoterResponse>> {
    req.validate()?;

    let voter = state
        .voter_service
        .verify_otp(&req.aadhaar_id, &req.otp)
        .await?;
    Ok(ApiResponse::ok(voter.into()))
}

/// Get a voter.
async fn get_voter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<VoterResponse>> {
    let voter = state.voter_service.get(&id).await?;
    Ok(ApiResponse::ok(voter.into()))
}

/// Get a voter by Aadhaar number.
async fn get_by_aadhaar(
    State(state): State<AppState>,
    Path(aadhaar_id): Path<String>,
) -> AppResult<ApiResponse<VoterResponse>> {
    let voter = state.voter_service.find_by_aadhaar(&aadhaar_id).await?;
    Ok(ApiResponse::ok(voter.into()))
}

/// A voter's history, most recent first.
async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<HistoryEntryResponse>>> {
    let entries = state.voter_service.history(&id).await?;
    Ok(ApiResponse::ok(entries.into_iter().map(Into::into).collect()))
}

/// Simulated fingerprint template.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintRequest {
    #[validate(length(min = 1, max = 10000))]
    pub fingerprint_data: String,
}

/// Enrol a fingerprint template.
async fn register_fingerprint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<FingerprintRequest>,
) -> AppResult<ApiResponse<VoterResponse>> {
    req.validate()?;

    let voter = state
        .voter_service
        .register_fingerprint(&id, &req.fingerprint_data)
        .await?;
    Ok(ApiResponse::ok(voter.into()))
}

/// Match a fingerprint template.
async fn verify_fingerprint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<FingerprintRequest>,
) -> AppResult<ApiResponse<VoterResponse>> {
    req.validate()?;

    let voter = state
        .voter_service
        .verify_fingerprint(&id, &req.fingerprint_data)
        .await?;
    Ok(ApiResponse::ok(voter.into()))
}

async fn webauthn_register_begin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ChallengeResponse>> {
    let response = state.webauthn_service.begin_registration(&id).await?;
    Ok(ApiResponse::ok(response))
}

async fn webauthn_register_complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CompleteChallengeInput>,
) -> AppResult<ApiResponse<VoterCredentialResponse>> {
    let response = state
        .webauthn_service
        .complete_registration(&id, input)
        .await?;
    Ok(ApiResponse::ok(response))
}

async fn webauthn_authenticate_begin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ChallengeResponse>> {
    let response = state.webauthn_service.begin_authentication(&id).await?;
    Ok(ApiResponse::ok(response))
}

/// Passkey authentication counts as the biometric factor.
async fn webauthn_authenticate_complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CompleteChallengeInput>,
) -> AppResult<ApiResponse<VoterResponse>> {
    let voter = state
        .webauthn_service
        .complete_authentication(&id, input)
        .await?;
    Ok(ApiResponse::ok(voter.into()))
}

async fn webauthn_credentials(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<VoterCredentialResponse>>> {
    let keys = state.webauthn_service.list_credentials(&id).await?;
    Ok(ApiResponse::ok(keys))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/aadhaar/{aadhaar_id}", get(get_by_aadhaar))
        .route("/{id}", get(get_voter))
        .route("/{id}/history", get(history))
        .route("/{id}/fingerprint/register", post(register_fingerprint))
        .route("/{id}/fingerprint/verify", post(verify_fingerprint))
        .route("/{id}/webauthn/credentials", get(webauthn_credentials))
        .route("/{id}/webauthn/register/begin", post(webauthn_register_begin))
        .route(
            "/{id}/webauthn/register/complete",
            post(webauthn_register_complete),
        )
        .route(
            "/{id}/webauthn/authenticate/begin",
            post(webauthn_authenticate_begin),
        )
        .route(
            "/{id}/webauthn/authenticate/complete",
            post(webauthn_authenticate_complete),
        )
}
