//! Database entities.

pub mod candidate;
pub mod election;
pub mod voter;
pub mod voter_credential;
pub mod voting_history;

pub use candidate::Entity as Candidate;
pub use election::Entity as Election;
pub use voter::Entity as Voter;
pub use voter_credential::Entity as VoterCredential;
pub use voting_history::Entity as VotingHistory;
