//! Voting endpoints.
//!
//! Both vote routes feed the same reconciler; they differ only in the shape
//! of the response.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use evote_common::AppResult;
use evote_core::{CastVote, ElectionResults, ResultsViewer, VoteReceipt, VoteStatus};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::voters::HistoryEntryResponse;
use crate::{extractors::MaybeAdmin, middleware::AppState, response::ApiResponse};

/// Cast-vote request.
///
/// `isRevote` and `previousCandidateId` are accepted from older clients but
/// ignored: the server decides both from its own state.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    #[validate(length(min = 1))]
    pub election_id: String,
    #[validate(length(min = 1))]
    pub candidate_id: String,
    #[validate(length(min = 1))]
    pub voter_id: String,
    pub is_revote: Option<bool>,
    pub previous_candidate_id: Option<String>,
}

/// Cast-vote response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteResponse {
    pub success: bool,
    pub vote_count: u64,
    pub election_id: String,
    pub candidate_id: String,
    pub is_revote: bool,
    pub previous_candidate_id: Option<String>,
}

impl From<VoteReceipt> for CastVoteResponse {
    fn from(receipt: VoteReceipt) -> Self {
        Self {
            success: true,
            vote_count: receipt.vote_count,
            election_id: receipt.election_id,
            candidate_id: receipt.candidate_id,
            is_revote: receipt.is_revote,
            previous_candidate_id: receipt.previous_candidate_id,
        }
    }
}

/// Cast or change a vote.
async fn cast_vote(
    State(state): State<AppState>,
    Json(req): Json<CastVoteRequest>,
) -> AppResult<ApiResponse<CastVoteResponse>> {
    req.validate()?;

    let receipt = state
        .voting_service
        .cast_vote(CastVote {
            voter_id: req.voter_id,
            election_id: req.election_id,
            candidate_id: req.candidate_id,
        })
        .await?;

    Ok(ApiResponse::ok(receipt.into()))
}

/// Per-election vote request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ElectionVoteRequest {
    #[validate(length(min = 1))]
    pub voter_id: String,
    #[validate(length(min = 1))]
    pub candidate_id: String,
}

/// Per-election vote response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionVoteResponse {
    pub message: String,
    pub is_revoting: bool,
    pub candidate_id: String,
    pub voting_history: Vec<HistoryEntryResponse>,
    pub has_voted: serde_json::Value,
}

/// Cast or change a vote, answering with the voter's ledger.
async fn vote_in_election(
    State(state): State<AppState>,
    Path(election_id): Path<String>,
    Json(req): Json<ElectionVoteRequest>,
) -> AppResult<ApiResponse<ElectionVoteResponse>> {
    req.validate()?;

    let receipt = state
        .voting_service
        .cast_vote(CastVote {
            voter_id: req.voter_id,
            election_id,
            candidate_id: req.candidate_id,
        })
        .await?;

    let message = if receipt.is_revote {
        "Vote updated successfully"
    } else {
        "Vote cast successfully"
    };
    Ok(ApiResponse::ok(ElectionVoteResponse {
        message: message.to_string(),
        is_revoting: receipt.is_revote,
        candidate_id: receipt.candidate_id,
        voting_history: receipt.voting_history.into_iter().map(Into::into).collect(),
        has_voted: receipt.has_voted,
    }))
}

/// Ranked results; admins may preview before release.
async fn results(
    MaybeAdmin(is_admin): MaybeAdmin,
    State(state): State<AppState>,
    Path(election_id): Path<String>,
) -> AppResult<ApiResponse<ElectionResults>> {
    let viewer = if is_admin {
        ResultsViewer::Admin
    } else {
        ResultsViewer::Public
    };
    let results = state.election_service.results(&election_id, viewer).await?;
    Ok(ApiResponse::ok(results))
}

/// A voter's standing in one election, with the mirror's copy.
async fn vote_status(
    State(state): State<AppState>,
    Path((election_id, voter_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<VoteStatus>> {
    let status = state
        .voting_service
        .vote_status(&voter_id, &election_id)
        .await?;
    Ok(ApiResponse::ok(status))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cast-vote", post(cast_vote))
        .route("/{election_id}/vote", post(vote_in_election))
        .route("/{election_id}/results", get(results))
        .route("/{election_id}/status/{voter_id}", get(vote_status))
}
