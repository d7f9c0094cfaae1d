//! Election service: ballot lifecycle and results.

use chrono::{DateTime, Utc};
use evote_common::{AppError, AppResult, IdGenerator, Tally};
use evote_db::{
    entities::{candidate, election, election::ElectionStatus},
    repositories::ElectionRepository,
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::admin::{AdminActionKind, AdminActionLog};

/// Default `result_release_type`.
pub const DEFAULT_RELEASE_TYPE: &str = "standard";

/// A candidate as supplied by the admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInput {
    pub name: String,
    #[serde(default)]
    pub party: String,
    pub photo: Option<String>,
    pub bio: Option<String>,
}

/// Input for creating an election.
#[derive(Debug, Clone)]
pub struct CreateElectionInput {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub candidates: Vec<CandidateInput>,
}

/// Input for updating an election. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateElectionInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Replaces the whole ballot. Only allowed while `upcoming`.
    pub candidates: Option<Vec<CandidateInput>>,
}

/// An election with its ballot in order.
#[derive(Debug, Clone)]
pub struct ElectionDetail {
    pub election: election::Model,
    pub candidates: Vec<candidate::Model>,
}

impl ElectionDetail {
    /// Decoded tally.
    pub fn tally(&self) -> AppResult<Tally> {
        self.election.tally()
    }
}

/// Who is asking for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsViewer {
    /// May preview once the election is closed, before release.
    Admin,
    /// Needs the election closed and results released.
    Public,
}

/// One candidate's line in the results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub candidate_id: String,
    pub name: String,
    pub party: String,
    pub votes: u64,
    pub percentage: f64,
}

/// Results of a closed election.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub election_id: String,
    pub election_title: String,
    /// Distinct voters who voted.
    pub total_votes: u64,
    pub results: Vec<CandidateResult>,
    pub results_released: bool,
    pub results_released_at: Option<DateTime<Utc>>,
    pub result_release_message: Option<String>,
    pub result_release_type: Option<String>,
}

/// Election service for business logic.
#[derive(Clone)]
pub struct ElectionService {
    election_repo: ElectionRepository,
    action_log: AdminActionLog,
    id_gen: IdGenerator,
}

impl ElectionService {
    /// Create a new election service.
    #[must_use]
    pub const fn new(election_repo: ElectionRepository, action_log: AdminActionLog) -> Self {
        Self {
            election_repo,
            action_log,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create an election in `upcoming` state with a zeroed tally.
    pub async fn create(&self, input: CreateElectionInput) -> AppResult<ElectionDetail> {
        let title = validate_title(&input.title)?;
        validate_dates(input.start_date, input.end_date)?;

        let election_id = self.id_gen.generate();
        let candidates = self.build_candidates(&election_id, input.candidates)?;
        let tally = Tally::new(candidates.iter().map(|c| c.id.clone()));
        let now = Utc::now();

        let model = election::ActiveModel {
            id: Set(election_id.clone()),
            title: Set(title),
            description: Set(input.description.trim().to_string()),
            start_date: Set(input.start_date.into()),
            end_date: Set(input.end_date.into()),
            status: Set(ElectionStatus::Upcoming),
            votes: Set(json!(tally.votes())),
            voter_choices: Set(json!(tally.choices())),
            results_released: Set(false),
            results_released_at: Set(None),
            result_release_message: Set(None),
            result_release_type: Set(None),
            version: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let (election, candidates) = self
            .election_repo
            .create_with_candidates(model, candidates)
            .await?;

        info!(election_id = %election.id, candidates = candidates.len(), "Election created");
        self.action_log
            .record(
                AdminActionKind::ElectionCreated,
                Some(&election.id),
                None,
                format!("Created election \"{}\"", election.title),
            )
            .await;

        Ok(ElectionDetail {
            election,
            candidates,
        })
    }

    /// List elections, optionally by status.
    pub async fn list(&self, status: Option<ElectionStatus>) -> AppResult<Vec<election::Model>> {
        self.election_repo.list(status).await
    }

    /// Get an election with its candidates.
    pub async fn get(&self, id: &str) -> AppResult<ElectionDetail> {
        let election = self.election_repo.get_by_id(id).await?;
        let candidates = self.election_repo.find_candidates(id).await?;
        Ok(ElectionDetail {
            election,
            candidates,
        })
    }

    /// Update metadata, and the ballot while the election is still `upcoming`.
    pub async fn update(&self, id: &str, input: UpdateElectionInput) -> AppResult<ElectionDetail> {
        let current = self.election_repo.get_by_id(id).await?;

        let start = input
            .start_date
            .unwrap_or_else(|| current.start_date.with_timezone(&Utc));
        let end = input
            .end_date
            .unwrap_or_else(|| current.end_date.with_timezone(&Utc));
        validate_dates(start, end)?;
        let title = input.title.as_deref().map(validate_title).transpose()?;

        let expected_version = current.version;
        let current_status = current.status;
        let mut active: election::ActiveModel = current.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(description.trim().to_string());
        }
        active.start_date = Set(start.into());
        active.end_date = Set(end.into());
        active.updated_at = Set(Some(Utc::now().into()));

        let (election, candidates) = match input.candidates {
            Some(new_candidates) => {
                if current_status != ElectionStatus::Upcoming {
                    return Err(AppError::InvalidState(format!(
                        "Candidates can only be changed while the election is upcoming (status: {})",
                        current_status.as_str()
                    )));
                }
                let built = self.build_candidates(id, new_candidates)?;
                let zeroed = Tally::new(built.iter().map(|c| c.id.clone()));
                active.votes = Set(json!(zeroed.votes()));
                active.voter_choices = Set(json!({}));
                self.election_repo
                    .update_with_candidates(active, expected_version, built)
                    .await?
            }
            None => {
                let candidates = self.election_repo.find_candidates(id).await?;
                let election = self.election_repo.update(active, expected_version).await?;
                (election, candidates)
            }
        };

        self.action_log
            .record(
                AdminActionKind::ElectionUpdated,
                Some(id),
                None,
                format!("Updated election \"{}\"", election.title),
            )
            .await;

        Ok(ElectionDetail {
            election,
            candidates,
        })
    }

    /// Move an election forward through `upcoming → active → closed`.
    pub async fn set_status(
        &self,
        id: &str,
        status: ElectionStatus,
    ) -> AppResult<election::Model> {
        let current = self.election_repo.get_by_id(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(AppError::InvalidState(format!(
                "Cannot change election status from {} to {}",
                current.status.as_str(),
                status.as_str()
            )));
        }

        let from = current.status;
        let expected_version = current.version;
        let mut active: election::ActiveModel = current.into();
        active.status = Set(status);
        active.updated_at = Set(Some(Utc::now().into()));
        let election = self.election_repo.update(active, expected_version).await?;

        info!(election_id = %id, from = from.as_str(), to = status.as_str(), "Election status changed");
        self.action_log
            .record(
                AdminActionKind::ElectionStatusChanged,
                Some(id),
                None,
                format!("Status changed to {}", status.as_str()),
            )
            .await;

        Ok(election)
    }

    /// Delete an election. Voters' `has_voted` maps keep their entry.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.election_repo.delete(id).await?;

        info!(election_id = %id, "Election deleted");
        self.action_log
            .record(AdminActionKind::ElectionDeleted, Some(id), None, "Deleted election")
            .await;
        Ok(())
    }

    /// Make a closed election's results visible to voters.
    pub async fn release_results(
        &self,
        id: &str,
        message: Option<String>,
        release_type: Option<String>,
    ) -> AppResult<election::Model> {
        let current = self.election_repo.get_by_id(id).await?;
        if current.status != ElectionStatus::Closed {
            return Err(AppError::InvalidState(
                "Results can only be released for a closed election".to_string(),
            ));
        }

        let expected_version = current.version;
        let mut active: election::ActiveModel = current.into();
        active.results_released = Set(true);
        active.results_released_at = Set(Some(Utc::now().into()));
        active.result_release_message = Set(message);
        active.result_release_type = Set(Some(
            release_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_RELEASE_TYPE.to_string()),
        ));
        active.updated_at = Set(Some(Utc::now().into()));
        let election = self.election_repo.update(active, expected_version).await?;

        info!(election_id = %id, "Results released");
        self.action_log
            .record(AdminActionKind::ResultsReleased, Some(id), None, "Results released")
            .await;

        Ok(election)
    }

    /// Ranked results for a closed election.
    pub async fn results(&self, id: &str, viewer: ResultsViewer) -> AppResult<ElectionResults> {
        let ElectionDetail {
            election,
            candidates,
        } = self.get(id).await?;

        if election.status != ElectionStatus::Closed {
            return Err(AppError::InvalidState(
                "Results are only available once the election is closed".to_string(),
            ));
        }
        if viewer == ResultsViewer::Public && !election.results_released {
            return Err(AppError::InvalidState(
                "Results have not been released yet".to_string(),
            ));
        }

        let mut tally = election.tally()?;
        for c in &candidates {
            if !tally.has_candidate(&c.id) {
                tally.add_candidate(c.id.clone());
            }
        }
        if !tally.is_consistent() && tally.reconcile() {
            warn!(election_id = %id, "Stored counters disagreed with voter choices; recounted");
        }

        Ok(build_results(&election, &candidates, &tally))
    }

    fn build_candidates(
        &self,
        election_id: &str,
        inputs: Vec<CandidateInput>,
    ) -> AppResult<Vec<candidate::Model>> {
        if inputs.len() < 2 {
            return Err(AppError::Validation(
                "An election needs at least 2 candidates".to_string(),
            ));
        }

        inputs
            .into_iter()
            .enumerate()
            .map(|(position, input)| {
                let name = input.name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::Validation(
                        "Candidate names cannot be empty".to_string(),
                    ));
                }
                Ok(candidate::Model {
                    id: self.id_gen.generate(),
                    election_id: election_id.to_string(),
                    position: i32::try_from(position)
                        .map_err(|_| AppError::Validation("Too many candidates".to_string()))?,
                    name,
                    party: input.party.trim().to_string(),
                    photo: input.photo.filter(|p| !p.is_empty()),
                    bio: input.bio.filter(|b| !b.is_empty()),
                })
            })
            .collect()
    }
}

fn build_results(
    election: &election::Model,
    candidates: &[candidate::Model],
    tally: &Tally,
) -> ElectionResults {
    let results = tally
        .rank(candidates.iter().map(|c| c.id.as_str()))
        .into_iter()
        .filter_map(|ranked| {
            candidates
                .iter()
                .find(|c| c.id == ranked.candidate_id)
                .map(|c| CandidateResult {
                    candidate_id: ranked.candidate_id,
                    name: c.name.clone(),
                    party: c.party.clone(),
                    votes: ranked.votes,
                    percentage: ranked.percentage,
                })
        })
        .collect();

    ElectionResults {
        election_id: election.id.clone(),
        election_title: election.title.clone(),
        total_votes: tally.total_voters() as u64,
        results,
        results_released: election.results_released,
        results_released_at: election.results_released_at.map(|t| t.with_timezone(&Utc)),
        result_release_message: election.result_release_message.clone(),
        result_release_type: election.result_release_type.clone(),
    }
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(AppError::Validation(
            "Title must be between 1 and 200 characters".to_string(),
        ));
    }
    Ok(title.to_string())
}

fn validate_dates(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if end <= start {
        return Err(AppError::Validation(
            "End date must be after start date".to_string(),
        ));
    }
    Ok(())
}
