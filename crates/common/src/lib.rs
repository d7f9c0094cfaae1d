//! Common utilities and shared types for evote.
//!
//! This crate provides foundational components used across all evote crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error taxonomy via [`AppError`] and [`AppResult`]
//! - **Hashing**: Identifier hashing and one-time code generation
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Tally**: The pure vote/revote reducer shared by the server and the client
//!
//! # Example
//!
//! ```no_run
//! use evote_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Listening on {} as {}", config.server.port, id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod id;
pub mod tally;

pub use config::Config;
pub use crypto::{generate_numeric_code, hash_aadhaar, is_valid_aadhaar, sha256_hex};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use tally::{RankedCandidate, Tally, TallyError, VoteEffect};
