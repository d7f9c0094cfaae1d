//! Database repositories.

mod election;
mod voter;
mod voter_credential;
mod voting;

pub use election::ElectionRepository;
pub use voter::VoterRepository;
pub use voter_credential::VoterCredentialRepository;
pub use voting::{CommittedVote, VoteCommit, VotingRepository};

use evote_common::AppError;
use sea_orm::{DbErr, TransactionError};

pub(crate) fn db_err(err: DbErr) -> AppError {
    AppError::Database(err.to_string())
}

pub(crate) fn flatten_txn_error(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(e) => db_err(e),
        TransactionError::Transaction(e) => e,
    }
}
