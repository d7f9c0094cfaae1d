//! Core business logic for evote: elections, voter verification and the
//! vote/revote reconciler.

pub mod services;

pub use services::*;
