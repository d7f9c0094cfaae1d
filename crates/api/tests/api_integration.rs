//! API integration tests.
//!
//! The router is driven with `oneshot`; every repository gets its own mock
//! database so query order is predictable per table group.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use chrono::{Duration, Utc};
use evote_api::{AppState, app};
use evote_common::config::{AdminConfig, VerificationConfig};
use evote_core::{
    AdminActionLog, AdminAuthService, ElectionService, VoterService, VotingService,
    WebAuthnConfig, WebAuthnService,
};
use evote_db::entities::{candidate, election, election::ElectionStatus, voter, voting_history};
use evote_db::repositories::{
    ElectionRepository, VoterCredentialRepository, VoterRepository, VotingRepository,
};
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "correct horse battery staple";

/// Mock databases, one per repository.
struct Mocks {
    elections: MockDatabase,
    voters: MockDatabase,
    voting: MockDatabase,
}

impl Default for Mocks {
    fn default() -> Self {
        Self {
            elections: MockDatabase::new(DatabaseBackend::Postgres),
            voters: MockDatabase::new(DatabaseBackend::Postgres),
            voting: MockDatabase::new(DatabaseBackend::Postgres),
        }
    }
}

fn admin_config() -> AdminConfig {
    let salt = SaltString::from_b64("c29tZXNhbHRzb21lc2FsdA").unwrap();
    let hash = Argon2::default()
        .hash_password(ADMIN_PASSWORD.as_bytes(), &salt)
        .unwrap()
        .to_string();
    AdminConfig {
        username: "admin".to_string(),
        password_hash: hash,
        session_ttl_secs: 3600,
    }
}

fn create_test_app(mocks: Mocks) -> Router {
    let election_repo = ElectionRepository::new(Arc::new(mocks.elections.into_connection()));
    let voter_repo = VoterRepository::new(Arc::new(mocks.voters.into_connection()));
    let voting_repo = VotingRepository::new(Arc::new(mocks.voting.into_connection()));
    let credential_repo = VoterCredentialRepository::new(Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
    ));

    let action_log = AdminActionLog::new();
    let verification = VerificationConfig::default();

    let election_service = ElectionService::new(election_repo.clone(), action_log.clone());
    let voter_service = VoterService::new(
        voter_repo.clone(),
        voting_repo.clone(),
        verification.clone(),
        action_log.clone(),
    );
    let voting_service = VotingService::new(
        election_repo,
        voter_repo,
        voting_repo,
        action_log.clone(),
        verification.require_verified_voter,
    );
    let webauthn_config =
        WebAuthnConfig::from_server_url("https://vote.example.org", "E-Voting").unwrap();
    let webauthn_service =
        WebAuthnService::new(&webauthn_config, credential_repo, voter_service.clone()).unwrap();

    app(AppState {
        election_service,
        voter_service,
        voting_service,
        webauthn_service,
        admin_service: AdminAuthService::new(admin_config()),
        action_log,
    })
}

fn election_model(status: ElectionStatus, votes: Value, choices: Value) -> election::Model {
    election::Model {
        id: "e1".to_string(),
        title: "Student Council".to_string(),
        description: String::new(),
        start_date: Utc::now().into(),
        end_date: (Utc::now() + Duration::days(1)).into(),
        status,
        votes,
        voter_choices: choices,
        results_released: false,
        results_released_at: None,
        result_release_message: None,
        result_release_type: None,
        version: 3,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

fn candidates() -> Vec<candidate::Model> {
    vec![
        candidate::Model {
            id: "A".to_string(),
            election_id: "e1".to_string(),
            position: 0,
            name: "Asha".to_string(),
            party: "Blue".to_string(),
            photo: None,
            bio: None,
        },
        candidate::Model {
            id: "B".to_string(),
            election_id: "e1".to_string(),
            position: 1,
            name: "Bilal".to_string(),
            party: "Green".to_string(),
            photo: None,
            bio: None,
        },
    ]
}

fn verified_voter(has_voted: Value) -> voter::Model {
    voter::Model {
        id: "v1".to_string(),
        aadhaar_id: "123456789012".to_string(),
        aadhaar_hash: "hash".to_string(),
        name: "Neha".to_string(),
        email: None,
        phone: None,
        otp_hash: None,
        otp_expires_at: None,
        otp_attempts: 0,
        locked_until: None,
        otp_verified: true,
        fingerprint_hash: None,
        biometric_verified: true,
        is_verified: true,
        has_voted,
        schema_version: voter::SCHEMA_VERSION,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

fn history_entry(candidate_id: &str, is_revote: bool) -> voting_history::Model {
    voting_history::Model {
        id: "h1".to_string(),
        voter_id: "v1".to_string(),
        election_id: "e1".to_string(),
        candidate_id: candidate_id.to_string(),
        voted_at: Utc::now().into(),
        is_revote,
        blockchain_tx_hash: None,
    }
}

fn rows(n: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: n,
    }
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            &json!({"username": "admin", "password": ADMIN_PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_app(Mocks::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_login_rejects_wrong_password() {
    let app = create_test_app(Mocks::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            &json!({"username": "admin", "password": "nope"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = create_test_app(Mocks::default());

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/elections/e1/status",
            &json!({"status": "active"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_creates_election() {
    let mut created = election_model(ElectionStatus::Upcoming, json!({}), json!({}));
    created.id = "e-new".to_string();
    let mocks = Mocks {
        elections: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[created]])
            .append_exec_results([rows(2)]),
        ..Mocks::default()
    };
    let app = create_test_app(mocks);
    let token = login(&app).await;

    let mut request = json_request(
        "POST",
        "/api/elections",
        &json!({
            "title": "Student Council",
            "startDate": "2026-11-01T09:00:00Z",
            "endDate": "2026-11-02T17:00:00Z",
            "candidates": [
                {"name": "Asha", "party": "Blue"},
                {"name": "Bilal", "party": "Green"}
            ]
        }),
    );
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "upcoming");
    assert_eq!(body["data"]["candidates"][1]["name"], "Bilal");
    assert_eq!(body["data"]["totalVotes"], 0);
}

#[tokio::test]
async fn test_create_election_validates_body() {
    let app = create_test_app(Mocks::default());
    let token = login(&app).await;

    let mut request = json_request(
        "POST",
        "/api/elections",
        &json!({
            "title": "",
            "startDate": "2026-11-01T09:00:00Z",
            "endDate": "2026-11-02T17:00:00Z",
            "candidates": [{"name": "Solo"}]
        }),
    );
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_list_elections_rejects_unknown_status() {
    let app = create_test_app(Mocks::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/elections?status=paused")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_election_detail_hides_live_counts_from_public() {
    let mocks = Mocks {
        elections: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[election_model(
                ElectionStatus::Active,
                json!({"A": 1, "B": 0}),
                json!({"v1": "A"}),
            )]])
            .append_query_results([candidates()]),
        ..Mocks::default()
    };
    let app = create_test_app(mocks);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/elections/e1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["totalVotes"], 1);
    assert!(body["data"].get("votes").is_none());
    assert_eq!(body["data"]["candidates"][0]["id"], "A");
}

#[tokio::test]
async fn test_register_rejects_short_aadhaar() {
    let app = create_test_app(Mocks::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/voters/register",
            &json!({"aadhaarId": "12345", "name": "Neha"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cast_vote_on_closed_election_is_invalid_state() {
    let mocks = Mocks {
        elections: MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            election_model(ElectionStatus::Closed, json!({"A": 0, "B": 0}), json!({})),
        ]]),
        ..Mocks::default()
    };
    let app = create_test_app(mocks);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/voting/cast-vote",
            &json!({"electionId": "e1", "candidateId": "A", "voterId": "v1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_STATE");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn test_cast_vote_first_vote() {
    let mocks = Mocks {
        elections: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[election_model(
                ElectionStatus::Active,
                json!({"A": 0, "B": 0}),
                json!({}),
            )]])
            .append_query_results([candidates()]),
        voters: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[verified_voter(json!({}))]]),
        voting: MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([rows(1)])
            .append_query_results([Vec::<voting_history::Model>::new()])
            .append_query_results([Vec::<voting_history::Model>::new()])
            .append_query_results([[history_entry("A", false)]])
            .append_query_results([[verified_voter(json!({}))]])
            .append_query_results([[verified_voter(json!({"e1": true}))]])
            .append_query_results([[history_entry("A", false)]]),
    };
    let app = create_test_app(mocks);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/voting/cast-vote",
            &json!({"electionId": "e1", "candidateId": "A", "voterId": "v1"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["voteCount"], 1);
    assert_eq!(body["data"]["electionId"], "e1");
    assert_eq!(body["data"]["candidateId"], "A");
    assert_eq!(body["data"]["isRevote"], false);
}

#[tokio::test]
async fn test_election_vote_route_reports_revote() {
    let mocks = Mocks {
        elections: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[election_model(
                ElectionStatus::Active,
                json!({"A": 1, "B": 0}),
                json!({"v1": "A"}),
            )]])
            .append_query_results([candidates()]),
        voters: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[verified_voter(json!({"e1": true}))]]),
        voting: MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([rows(1)])
            .append_query_results([[history_entry("A", false)]])
            .append_query_results([[history_entry("A", false)]])
            .append_query_results([[history_entry("B", true)]])
            .append_query_results([[verified_voter(json!({"e1": true}))]])
            .append_query_results([[verified_voter(json!({"e1": true}))]])
            .append_query_results([[history_entry("B", true)]]),
    };
    let app = create_test_app(mocks);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/voting/e1/vote",
            &json!({"voterId": "v1", "candidateId": "B"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["isRevoting"], true);
    assert_eq!(body["data"]["candidateId"], "B");
    assert_eq!(body["data"]["hasVoted"]["e1"], true);
    assert_eq!(body["data"]["votingHistory"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["votingHistory"][0]["candidateId"], "B");
}

#[tokio::test]
async fn test_unreleased_results_hidden_from_public() {
    let mocks = Mocks {
        elections: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[election_model(
                ElectionStatus::Closed,
                json!({"A": 0, "B": 2}),
                json!({"v1": "B", "v2": "B"}),
            )]])
            .append_query_results([candidates()]),
        ..Mocks::default()
    };
    let app = create_test_app(mocks);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/voting/e1/results")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_previews_results_before_release() {
    let mocks = Mocks {
        elections: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[election_model(
                ElectionStatus::Closed,
                json!({"A": 0, "B": 2}),
                json!({"v1": "B", "v2": "B"}),
            )]])
            .append_query_results([candidates()]),
        ..Mocks::default()
    };
    let app = create_test_app(mocks);
    let token = login(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/voting/e1/results")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["totalVotes"], 2);
    assert_eq!(body["data"]["results"][0]["candidateId"], "B");
    assert_eq!(body["data"]["results"][0]["percentage"], 100.0);
    assert_eq!(body["data"]["results"][1]["candidateId"], "A");
    assert_eq!(body["data"]["results"][1]["votes"], 0);
}

#[tokio::test]
async fn test_vote_status_without_mirror() {
    let mocks = Mocks {
        voters: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[verified_voter(json!({"e1": true}))]]),
        voting: MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[history_entry("B", true)]]),
        ..Mocks::default()
    };
    let app = create_test_app(mocks);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/voting/e1/status/v1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["hasVoted"], true);
    assert_eq!(body["data"]["candidateId"], "B");
    assert_eq!(body["data"]["blockchain"]["recorded"], false);
}

#[tokio::test]
async fn test_admin_action_log_since() {
    let app = create_test_app(Mocks::default());
    let token = login(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/actions?since=0")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["latestSeq"], 0);
    assert!(body["data"]["actions"].as_array().unwrap().is_empty());
}
