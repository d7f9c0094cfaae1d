//! Local copy of one election's tally.

use std::collections::BTreeMap;

use evote_common::{Tally, TallyError, VoteEffect};

/// A candidate as shown on the ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotCandidate {
    pub id: String,
    pub name: String,
    pub party: String,
}

/// One election as the client sees it.
///
/// The tally only knows the choices this client has made or been told
/// about, so it is not expected to be consistent with the server's voter set.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalBallot {
    election_id: String,
    title: String,
    candidates: Vec<BallotCandidate>,
    tally: Tally,
}

impl LocalBallot {
    /// Build a ballot. Candidates missing from `votes` start at zero.
    #[must_use]
    pub fn new(
        election_id: impl Into<String>,
        title: impl Into<String>,
        candidates: Vec<BallotCandidate>,
        mut votes: BTreeMap<String, u64>,
    ) -> Self {
        for c in &candidates {
            votes.entry(c.id.clone()).or_insert(0);
        }
        Self {
            election_id: election_id.into(),
            title: title.into(),
            candidates,
            tally: Tally::from_parts(votes, BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn election_id(&self) -> &str {
        &self.election_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn candidates(&self) -> &[BallotCandidate] {
        &self.candidates
    }

    #[must_use]
    pub const fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Displayed count for a candidate.
    #[must_use]
    pub fn votes_for(&self, candidate_id: &str) -> u64 {
        self.tally.votes_for(candidate_id)
    }

    /// Tell the ballot what a voter already chose, without touching counts
    /// (they already include that vote).
    pub fn seed_choice(&mut self, voter_id: &str, candidate_id: &str) {
        let (votes, mut choices) = std::mem::take(&mut self.tally).into_parts();
        choices.insert(voter_id.to_string(), candidate_id.to_string());
        self.tally = Tally::from_parts(votes, choices);
    }

    pub(crate) fn apply(
        &mut self,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<VoteEffect, TallyError> {
        self.tally.apply(voter_id, candidate_id)
    }

    /// Take the server's word for one candidate's count.
    pub(crate) fn set_count(&mut self, candidate_id: &str, count: u64) {
        let (mut votes, choices) = std::mem::take(&mut self.tally).into_parts();
        votes.insert(candidate_id.to_string(), count);
        self.tally = Tally::from_parts(votes, choices);
    }

    pub(crate) fn restore(&mut self, snapshot: Tally) {
        self.tally = snapshot;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn ballot() -> LocalBallot {
        LocalBallot::new(
            "e1",
            "Council",
            vec![
                BallotCandidate {
                    id: "A".to_string(),
                    name: "Asha".to_string(),
                    party: String::new(),
                },
                BallotCandidate {
                    id: "B".to_string(),
                    name: "Bilal".to_string(),
                    party: String::new(),
                },
            ],
            btreemap! { "A".to_string() => 3 },
        )
    }

    #[test]
    fn test_missing_candidates_start_at_zero() {
        let ballot = ballot();
        assert_eq!(
            ballot.tally().votes(),
            &btreemap! { "A".to_string() => 3, "B".to_string() => 0 }
        );
    }

    #[test]
    fn test_seeded_choice_makes_next_vote_a_revote() {
        let mut ballot = ballot();
        ballot.seed_choice("v1", "A");

        let effect = ballot.apply("v1", "B").unwrap();

        assert_eq!(effect.previous(), Some("A"));
        assert_eq!(ballot.votes_for("A"), 2);
        assert_eq!(ballot.votes_for("B"), 1);
    }

    #[test]
    fn test_set_count_keeps_choices() {
        let mut ballot = ballot();
        ballot.apply("v1", "B").unwrap();
        ballot.set_count("B", 9);

        assert_eq!(ballot.votes_for("B"), 9);
        assert_eq!(ballot.tally().choice_of("v1"), Some("B"));
    }
}
