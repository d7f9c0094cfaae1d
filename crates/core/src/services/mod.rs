//! Business logic services.

#![allow(missing_docs)]

pub mod admin;
pub mod blockchain;
pub mod election;
pub mod voter;
pub mod voting;
pub mod webauthn;

pub use admin::{
    ACTION_LOG_CAPACITY, AdminAction, AdminActionKind, AdminActionLog, AdminAuthService,
    AdminSession,
};
pub use blockchain::{
    BlockchainMirror, ChainReceipt, ChainVote, ChainVoteRecord, InMemoryChain, MirrorService,
};
pub use election::{
    CandidateInput, CandidateResult, CreateElectionInput, ElectionDetail, ElectionResults,
    ElectionService, ResultsViewer, UpdateElectionInput,
};
pub use voter::{OtpIssued, RegisterVoterInput, VoterService};
pub use voting::{
    CastVote, ChainStatus, ElectionLocks, VoteReceipt, VoteStatus, VotingService, VotingStats,
};
pub use webauthn::{
    ChallengeResponse, CompleteChallengeInput, VoterCredentialResponse, WebAuthnConfig,
    WebAuthnService,
};
