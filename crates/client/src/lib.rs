//! Typed client for the evote HTTP API.
//!
//! [`VotingClient::cast_vote`] updates a [`LocalBallot`] before the server
//! answers so a UI can redraw immediately, and puts the ballot back exactly as
//! it was when the vote is not accepted. A failed vote is always reported as
//! a failure.

pub mod ballot;
pub mod client;
pub mod error;

pub use ballot::{BallotCandidate, LocalBallot};
pub use client::{VoteAccepted, VotingClient};
pub use error::ClientError;
