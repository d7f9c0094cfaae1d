//! Client tests against throwaway local servers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use evote_client::{BallotCandidate, ClientError, LocalBallot, VotingClient};
use maplit::btreemap;
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn ballot() -> LocalBallot {
    LocalBallot::new(
        "e1",
        "Council",
        vec![
            BallotCandidate {
                id: "A".to_string(),
                name: "Asha".to_string(),
                party: "Blue".to_string(),
            },
            BallotCandidate {
                id: "B".to_string(),
                name: "Bilal".to_string(),
                party: "Green".to_string(),
            },
        ],
        btreemap! { "A".to_string() => 4, "B".to_string() => 1 },
    )
}

fn client(base_url: &str, timeout_ms: u64) -> VotingClient {
    VotingClient::new(base_url, Duration::from_millis(timeout_ms)).unwrap()
}

#[tokio::test]
async fn test_accepted_vote_adopts_server_count() {
    let router = Router::new().route(
        "/api/voting/cast-vote",
        post(|Json(body): Json<Value>| async move {
            Json(json!({
                "data": {
                    "success": true,
                    "voteCount": 7,
                    "electionId": body["electionId"],
                    "candidateId": body["candidateId"],
                    "isRevote": false,
                    "previousCandidateId": null
                }
            }))
        }),
    );
    let base = spawn(router).await;
    let mut ballot = ballot();

    let accepted = client(&base, 2000)
        .cast_vote(&mut ballot, "v9", "A")
        .await
        .unwrap();

    assert_eq!(accepted.vote_count, 7);
    assert_eq!(accepted.candidate_id, "A");
    assert_eq!(ballot.votes_for("A"), 7);
    assert_eq!(ballot.votes_for("B"), 1);
    assert_eq!(ballot.tally().choice_of("v9"), Some("A"));
}

#[tokio::test]
async fn test_error_body_restores_ballot() {
    let router = Router::new().route(
        "/api/voting/cast-vote",
        post(|| async {
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": {
                        "code": "INVALID_STATE",
                        "message": "Invalid state: Election is not accepting votes",
                        "retryable": false
                    }
                })),
            )
        }),
    );
    let base = spawn(router).await;
    let mut ballot = ballot();
    let before = ballot.clone();

    let err = client(&base, 2000)
        .cast_vote(&mut ballot, "v9", "B")
        .await
        .unwrap_err();

    match &err {
        ClientError::Api { status, code, .. } => {
            assert_eq!(*status, 409);
            assert_eq!(code, "INVALID_STATE");
        }
        other => panic!("Expected Api error, got {other:?}"),
    }
    assert!(!err.is_retryable());
    assert_eq!(ballot, before);
}

#[tokio::test]
async fn test_slow_server_times_out_and_restores() {
    let router = Router::new().route(
        "/api/voting/cast-vote",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Json(json!({"data": {}}))
        }),
    );
    let base = spawn(router).await;
    let mut ballot = ballot();
    let before = ballot.clone();

    let err = client(&base, 50)
        .cast_vote(&mut ballot, "v9", "B")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Timeout));
    assert!(err.is_retryable());
    assert_eq!(ballot, before);
}

#[tokio::test]
async fn test_unreachable_server_restores() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let mut ballot = ballot();
    let before = ballot.clone();

    let err = client(&format!("http://{addr}"), 1000)
        .cast_vote(&mut ballot, "v9", "A")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(_) | ClientError::Timeout
    ));
    assert_eq!(ballot, before);
}

#[tokio::test]
async fn test_unknown_candidate_sends_nothing() {
    // Nothing listens here; a request would fail with a transport error.
    let mut ballot = ballot();

    let err = client("http://127.0.0.1:9", 1000)
        .cast_vote(&mut ballot, "v9", "Z")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::UnknownCandidate(id) if id == "Z"));
    assert_eq!(ballot.votes_for("A"), 4);
}

#[tokio::test]
async fn test_fetch_election_with_hidden_counts() {
    let router = Router::new().route(
        "/api/elections/{id}",
        get(|| async {
            Json(json!({
                "data": {
                    "id": "e1",
                    "title": "Council",
                    "status": "active",
                    "candidates": [
                        {"id": "A", "name": "Asha", "party": "Blue"},
                        {"id": "B", "name": "Bilal", "party": "Green"}
                    ],
                    "totalVotes": 3
                }
            }))
        }),
    );
    let base = spawn(router).await;

    let ballot = client(&base, 2000).fetch_election("e1").await.unwrap();

    assert_eq!(ballot.election_id(), "e1");
    assert_eq!(ballot.candidates().len(), 2);
    assert_eq!(
        ballot.tally().votes(),
        &btreemap! { "A".to_string() => 0, "B".to_string() => 0 }
    );
}

#[tokio::test]
async fn test_sync_voter_then_revote_moves_local_count() {
    let router = Router::new()
        .route(
            "/api/voting/{election_id}/status/{voter_id}",
            get(|| async {
                Json(json!({
                    "data": {
                        "hasVoted": true,
                        "candidateId": "A",
                        "isRevote": false,
                        "blockchain": {"recorded": false}
                    }
                }))
            }),
        )
        .route(
            "/api/voting/cast-vote",
            post(|| async {
                Json(json!({
                    "data": {
                        "success": true,
                        "voteCount": 2,
                        "electionId": "e1",
                        "candidateId": "B",
                        "isRevote": true,
                        "previousCandidateId": "A"
                    }
                }))
            }),
        );
    let base = spawn(router).await;
    let client = client(&base, 2000);
    let mut ballot = ballot();

    let seeded = client.sync_voter(&mut ballot, "v1").await.unwrap();
    assert_eq!(seeded.as_deref(), Some("A"));

    let accepted = client.cast_vote(&mut ballot, "v1", "B").await.unwrap();

    assert!(accepted.is_revote);
    assert_eq!(ballot.votes_for("A"), 3);
    assert_eq!(ballot.votes_for("B"), 2);
}
