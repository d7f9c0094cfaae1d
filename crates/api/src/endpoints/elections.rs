//! Election endpoints.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use evote_common::AppResult;
use evote_core::{CandidateInput, CreateElectionInput, ElectionDetail, UpdateElectionInput};
use evote_db::entities::{candidate, election, election::ElectionStatus};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AdminAuth, MaybeAdmin},
    middleware::AppState,
    response::{Ack, ApiResponse},
};

/// Candidate response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResponse {
    pub id: String,
    pub name: String,
    pub party: String,
    pub photo: Option<String>,
    pub bio: Option<String>,
}

impl From<candidate::Model> for CandidateResponse {
    fn from(c: candidate::Model) -> Self {
        Self {
            id: c.id,
            name: c.name,
            party: c.party,
            photo: c.photo,
            bio: c.bio,
        }
    }
}

/// Election response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub status: ElectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<CandidateResponse>>,
    /// Per-candidate counters; only for admins or once results are released.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<BTreeMap<String, u64>>,
    /// Distinct voters so far.
    pub total_votes: u64,
    pub results_released: bool,
    pub results_released_at: Option<String>,
    pub result_release_message: Option<String>,
    pub result_release_type: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl ElectionResponse {
    fn build(
        election: election::Model,
        candidates: Option<Vec<candidate::Model>>,
        is_admin: bool,
    ) -> AppResult<Self> {
        let show_votes = is_admin || election.results_visible();
        let (votes, choices) = election.tally()?.into_parts();

        Ok(Self {
            total_votes: choices.len() as u64,
            votes: show_votes.then_some(votes),
            candidates: candidates.map(|c| c.into_iter().map(Into::into).collect()),
            start_date: election.start_date.to_rfc3339(),
            end_date: election.end_date.to_rfc3339(),
            results_released_at: election.results_released_at.map(|t| t.to_rfc3339()),
            created_at: election.created_at.to_rfc3339(),
            updated_at: election.updated_at.map(|t| t.to_rfc3339()),
            id: election.id,
            title: election.title,
            description: election.description,
            status: election.status,
            results_released: election.results_released,
            result_release_message: election.result_release_message,
            result_release_type: election.result_release_type,
        })
    }

    fn from_detail(detail: ElectionDetail, is_admin: bool) -> AppResult<Self> {
        Self::build(detail.election, Some(detail.candidates), is_admin)
    }
}

/// Create election request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateElectionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(length(min = 2, max = 100))]
    pub candidates: Vec<CandidateInput>,
}

/// Create an election.
async fn create_election(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateElectionRequest>,
) -> AppResult<ApiResponse<ElectionResponse>> {
    req.validate()?;

    let detail = state
        .election_service
        .create(CreateElectionInput {
            title: req.title,
            description: req.description,
            start_date: req.start_date,
            end_date: req.end_date,
            candidates: req.candidates,
        })
        .await?;

    Ok(ApiResponse::created(ElectionResponse::from_detail(
        detail, true,
    )?))
}

/// List query.
#[derive(Debug, Deserialize)]
pub struct ListElectionsQuery {
    pub status: Option<String>,
}

/// List elections.
async fn list_elections(
    MaybeAdmin(is_admin): MaybeAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListElectionsQuery>,
) -> AppResult<ApiResponse<Vec<ElectionResponse>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ElectionStatus>)
        .transpose()?;

    let elections = state.election_service.list(status).await?;
    let responses = elections
        .into_iter()
        .map(|e| ElectionResponse::build(e, None, is_admin))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::ok(responses))
}

/// Get an election with its candidates.
async fn get_election(
    MaybeAdmin(is_admin): MaybeAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ElectionResponse>> {
    let detail = state.election_service.get(&id).await?;
    Ok(ApiResponse::ok(ElectionResponse::from_detail(
        detail, is_admin,
    )?))
}

/// Update election request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateElectionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(length(min = 2, max = 100))]
    pub candidates: Option<Vec<CandidateInput>>,
}

/// Update an election.
async fn update_election(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateElectionRequest>,
) -> AppResult<ApiResponse<ElectionResponse>> {
    req.validate()?;

    let detail = state
        .election_service
        .update(
            &id,
            UpdateElectionInput {
                title: req.title,
                description: req.description,
                start_date: req.start_date,
                end_date: req.end_date,
                candidates: req.candidates,
            },
        )
        .await?;

    Ok(ApiResponse::ok(ElectionResponse::from_detail(detail, true)?))
}

/// Status change request.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// Move an election to its next status.
async fn set_status(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> AppResult<ApiResponse<ElectionResponse>> {
    let status = req.status.parse::<ElectionStatus>()?;
    let election = state.election_service.set_status(&id, status).await?;
    Ok(ApiResponse::ok(ElectionResponse::build(election, None, true)?))
}

/// Delete an election.
async fn delete_election(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Ack>> {
    state.election_service.delete(&id).await?;
    Ok(ApiResponse::ok(Ack::YES))
}

/// Release results request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResultsRequest {
    #[validate(length(max = 2000))]
    pub release_message: Option<String>,
    #[validate(length(max = 50))]
    pub release_type: Option<String>,
}

/// Publish a closed election's results to voters.
async fn release_results(
    AdminAuth(_): AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReleaseResultsRequest>,
) -> AppResult<ApiResponse<ElectionResponse>> {
    req.validate()?;

    let election = state
        .election_service
        .release_results(&id, req.release_message, req.release_type)
        .await?;
    Ok(ApiResponse::ok(ElectionResponse::build(election, None, true)?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_elections).post(create_election))
        .route(
            "/{id}",
            get(get_election).put(update_election).delete(delete_election),
        )
        .route("/{id}/status", put(set_status))
        .route("/{id}/release-results", put(release_results))
}
