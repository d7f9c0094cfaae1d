//! Vote tally reducer.
//!
//! [`Tally`] is the in-memory form of an election's ballot store: one counter
//! per candidate plus the voter → candidate map needed to undo a previous
//! choice on revote. The set of voters who have voted is the key set of that
//! map; it is not tracked separately, so `total_voters()` and the counters
//! can only drift apart through [`Tally::from_parts`] on bad data, which
//! [`Tally::reconcile`] repairs.
//!
//! The reducer is pure. The server applies it under a per-election lock and
//! persists the result atomically; the client applies it optimistically to
//! its local copy and rolls back on failure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-election vote counters and voter choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    votes: BTreeMap<String, u64>,
    choices: BTreeMap<String, String>,
}

/// What applying a vote did to the tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteEffect {
    /// The voter had not voted in this election before.
    First,
    /// The voter switched from `previous` to the new candidate.
    Changed {
        /// Candidate whose counter was decremented.
        previous: String,
    },
    /// The voter re-submitted the candidate they already chose. Nothing changed.
    Unchanged,
}

impl VoteEffect {
    /// Whether the voter had a choice recorded before this vote.
    #[must_use]
    pub const fn is_revote(&self) -> bool {
        !matches!(self, Self::First)
    }

    /// Whether the tally was modified.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    /// The candidate the voter moved away from, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&str> {
        match self {
            Self::Changed { previous } => Some(previous),
            Self::First | Self::Unchanged => None,
        }
    }
}

/// Tally errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    /// The candidate id is not part of this election.
    #[error("Unknown candidate: {0}")]
    UnknownCandidate(String),
}

/// One row of election results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    /// Candidate id.
    pub candidate_id: String,
    /// Votes received.
    pub votes: u64,
    /// Share of all voters, in percent, rounded to two decimals.
    pub percentage: f64,
}

impl Tally {
    /// A tally with every candidate at zero and no voters.
    pub fn new<I, S>(candidate_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            votes: candidate_ids.into_iter().map(|id| (id.into(), 0)).collect(),
            choices: BTreeMap::new(),
        }
    }

    /// Rebuild a tally from persisted parts. No consistency check is made.
    #[must_use]
    pub const fn from_parts(
        votes: BTreeMap<String, u64>,
        choices: BTreeMap<String, String>,
    ) -> Self {
        Self { votes, choices }
    }

    /// Split into `(votes, choices)` for persistence.
    #[must_use]
    pub fn into_parts(self) -> (BTreeMap<String, u64>, BTreeMap<String, String>) {
        (self.votes, self.choices)
    }

    /// Vote counters keyed by candidate id.
    #[must_use]
    pub const fn votes(&self) -> &BTreeMap<String, u64> {
        &self.votes
    }

    /// Current choice of every voter who has voted.
    #[must_use]
    pub const fn choices(&self) -> &BTreeMap<String, String> {
        &self.choices
    }

    /// Whether `candidate_id` belongs to this tally.
    #[must_use]
    pub fn has_candidate(&self, candidate_id: &str) -> bool {
        self.votes.contains_key(candidate_id)
    }

    /// Register a candidate with zero votes. No-op if already present.
    pub fn add_candidate(&mut self, candidate_id: impl Into<String>) {
        self.votes.entry(candidate_id.into()).or_insert(0);
    }

    /// Votes currently counted for `candidate_id`.
    #[must_use]
    pub fn votes_for(&self, candidate_id: &str) -> u64 {
        self.votes.get(candidate_id).copied().unwrap_or(0)
    }

    /// The candidate `voter_id` currently backs.
    #[must_use]
    pub fn choice_of(&self, voter_id: &str) -> Option<&str> {
        self.choices.get(voter_id).map(String::as_str)
    }

    /// Number of distinct voters who have voted.
    #[must_use]
    pub fn total_voters(&self) -> usize {
        self.choices.len()
    }

    /// Sum of all candidate counters.
    #[must_use]
    pub fn sum_votes(&self) -> u64 {
        self.votes.values().sum()
    }

    /// `sum(votes) == |voters|`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.sum_votes() == self.total_voters() as u64
    }

    /// Apply a vote (first vote or revote) for `voter_id`.
    ///
    /// On error the tally is left untouched.
    pub fn apply(&mut self, voter_id: &str, candidate_id: &str) -> Result<VoteEffect, TallyError> {
        if !self.has_candidate(candidate_id) {
            return Err(TallyError::UnknownCandidate(candidate_id.to_string()));
        }

        let effect = match self.choices.get(voter_id) {
            Some(previous) if previous == candidate_id => return Ok(VoteEffect::Unchanged),
            Some(previous) => {
                let previous = previous.clone();
                if let Some(count) = self.votes.get_mut(&previous) {
                    *count = count.saturating_sub(1);
                }
                VoteEffect::Changed { previous }
            }
            None => VoteEffect::First,
        };

        *self.votes.entry(candidate_id.to_string()).or_insert(0) += 1;
        self.choices
            .insert(voter_id.to_string(), candidate_id.to_string());

        Ok(effect)
    }

    /// Recount every counter from the voter choices.
    ///
    /// Choices pointing at candidates that no longer exist are dropped.
    /// Returns `true` if anything changed.
    pub fn reconcile(&mut self) -> bool {
        let mut recounted: BTreeMap<String, u64> =
            self.votes.keys().map(|id| (id.clone(), 0)).collect();

        let before = self.choices.len();
        self.choices.retain(|_, candidate| recounted.contains_key(candidate));
        let dropped = before != self.choices.len();

        for candidate in self.choices.values() {
            if let Some(count) = recounted.get_mut(candidate) {
                *count += 1;
            }
        }

        let changed = dropped || recounted != self.votes;
        self.votes = recounted;
        changed
    }

    /// Results in ballot order, sorted by votes descending.
    ///
    /// The sort is stable: equal counts keep the order of `candidate_order`.
    pub fn rank<'a, I>(&self, candidate_order: I) -> Vec<RankedCandidate>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let total = self.total_voters() as u64;

        let mut ranked: Vec<RankedCandidate> = candidate_order
            .into_iter()
            .map(|id| {
                let votes = self.votes_for(id);
                RankedCandidate {
                    candidate_id: id.to_string(),
                    votes,
                    percentage: percentage(votes, total),
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
        ranked
    }
}

fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = votes as f64 * 100.0 / total as f64;
    (raw * 100.0).round() / 100.0
}
