//! Admin endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use evote_common::AppResult;
use evote_core::{AdminAction, AdminSession, VotingStats};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::voters::VoterResponse;
use crate::{
    extractors::AdminAuth,
    middleware::AppState,
    response::{Ack, ApiResponse},
};

/// Login request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

/// Open an admin session.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<ApiResponse<AdminSession>> {
    req.validate()?;

    let session = state
        .admin_service
        .login(&req.username, &req.password)
        .await?;
    Ok(ApiResponse::ok(session))
}

/// End the current admin session.
async fn logout(
    AdminAuth(token): AdminAuth,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Ack>> {
    state.admin_service.logout(&token.0).await;
    Ok(ApiResponse::ok(Ack::YES))
}

/// Voter list query.
#[derive(Debug, Deserialize)]
pub struct ListVotersQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    100
}

/// List voters.
async fn list_voters(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ListVotersQuery>,
) -> AppResult<ApiResponse<Vec<VoterResponse>>> {
    let voters = state
        .voter_service
        .list(query.limit, query.offset)
        .await?;
    Ok(ApiResponse::ok(voters.into_iter().map(Into::into).collect()))
}

/// Remove a voter. Tallies are not adjusted.
async fn remove_voter(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Ack>> {
    state.voter_service.remove(&id).await?;
    Ok(ApiResponse::ok(Ack::YES))
}

/// Action log query.
#[derive(Debug, Deserialize)]
pub struct ActionsQuery {
    pub since: Option<u64>,
}

/// Action log response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsResponse {
    pub latest_seq: u64,
    pub actions: Vec<AdminAction>,
}

/// Recent admin actions, optionally only those after `since`.
async fn actions(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ActionsQuery>,
) -> AppResult<ApiResponse<ActionsResponse>> {
    let actions = match query.since {
        Some(seq) => state.action_log.since(seq).await,
        None => state.action_log.recent().await,
    };
    Ok(ApiResponse::ok(ActionsResponse {
        latest_seq: state.action_log.latest_seq().await,
        actions,
    }))
}

/// Dashboard counters.
async fn stats(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<VotingStats>> {
    let stats = state.voting_service.stats().await?;
    Ok(ApiResponse::ok(stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/voters", get(list_voters))
        .route("/voters/{id}", delete(remove_voter))
        .route("/actions", get(actions))
        .route("/stats", get(stats))
}
