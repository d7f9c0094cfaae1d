//! HTTP API layer for evote.
//!
//! - **Endpoints**: elections, voters and verification, voting, admin
//! - **Extractors**: admin session extraction
//! - **Middleware**: admin bearer-token resolution
//!
//! Built on Axum 0.8. Everything here is mounted under `/api` by the server.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{app, router};
pub use middleware::{AppState, admin_auth_middleware};
