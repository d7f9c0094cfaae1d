//! HTTP client for voters.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::ballot::{BallotCandidate, LocalBallot};
use crate::error::ClientError;

/// Server confirmation of a vote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAccepted {
    pub election_id: String,
    pub candidate_id: String,
    pub vote_count: u64,
    #[serde(default)]
    pub is_revote: bool,
    pub previous_candidate_id: Option<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    retryable: bool,
}

#[derive(Deserialize)]
struct ElectionBody {
    id: String,
    title: String,
    #[serde(default)]
    candidates: Vec<CandidateBody>,
    votes: Option<BTreeMap<String, u64>>,
}

#[derive(Deserialize)]
struct CandidateBody {
    id: String,
    name: String,
    #[serde(default)]
    party: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteStatusBody {
    candidate_id: Option<String>,
}

/// Client for the voting API.
#[derive(Clone)]
pub struct VotingClient {
    client: Client,
    base_url: Url,
}

impl VotingClient {
    /// Create a client; every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self { client, base_url })
    }

    /// Load an election into a fresh ballot.
    pub async fn fetch_election(&self, election_id: &str) -> Result<LocalBallot, ClientError> {
        let url = self.url(&format!("api/elections/{election_id}"))?;
        let response = self.client.get(url).send().await?;
        let election: ElectionBody = read_data(response).await?;

        let candidates = election
            .candidates
            .into_iter()
            .map(|c| BallotCandidate {
                id: c.id,
                name: c.name,
                party: c.party,
            })
            .collect();

        Ok(LocalBallot::new(
            election.id,
            election.title,
            candidates,
            election.votes.unwrap_or_default(),
        ))
    }

    /// Teach the ballot the voter's current choice, if any, so a later
    /// local revote moves the right counter.
    pub async fn sync_voter(
        &self,
        ballot: &mut LocalBallot,
        voter_id: &str,
    ) -> Result<Option<String>, ClientError> {
        let url = self.url(&format!(
            "api/voting/{}/status/{voter_id}",
            ballot.election_id()
        ))?;
        let response = self.client.get(url).send().await?;
        let status: VoteStatusBody = read_data(response).await?;

        if let Some(candidate_id) = &status.candidate_id {
            ballot.seed_choice(voter_id, candidate_id);
        }
        Ok(status.candidate_id)
    }

    /// Vote with an optimistic local update.
    ///
    /// The ballot changes before the request is sent. If the server does not
    /// accept the vote in time the ballot is restored and the error returned.
    pub async fn cast_vote(
        &self,
        ballot: &mut LocalBallot,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<VoteAccepted, ClientError> {
        let snapshot = ballot.tally().clone();
        ballot
            .apply(voter_id, candidate_id)
            .map_err(|_| ClientError::UnknownCandidate(candidate_id.to_string()))?;

        match self.post_vote(ballot.election_id(), voter_id, candidate_id).await {
            Ok(accepted) => {
                ballot.set_count(&accepted.candidate_id, accepted.vote_count);
                debug!(
                    election_id = %accepted.election_id,
                    vote_count = accepted.vote_count,
                    "Vote accepted"
                );
                Ok(accepted)
            }
            Err(e) => {
                ballot.restore(snapshot);
                warn!(
                    error = %e,
                    election_id = %ballot.election_id(),
                    "Vote not accepted; local ballot restored"
                );
                Err(e)
            }
        }
    }

    async fn post_vote(
        &self,
        election_id: &str,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<VoteAccepted, ClientError> {
        let url = self.url("api/voting/cast-vote")?;
        let response = self
            .client
            .post(url)
            .json(&json!({
                "electionId": election_id,
                "candidateId": candidate_id,
                "voterId": voter_id,
            }))
            .send()
            .await?;
        read_data(response).await
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }
}

async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        let envelope: Envelope<T> = response.json().await?;
        return Ok(envelope.data);
    }

    let text = response.text().await?;
    Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(ErrorEnvelope { error }) => ClientError::Api {
            status: status.as_u16(),
            code: error.code,
            message: error.message,
            retryable: error.retryable,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            code: "UNKNOWN".to_string(),
            message: text,
            retryable: status.is_server_error(),
        },
    })
}
