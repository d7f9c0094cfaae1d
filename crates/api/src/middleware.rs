//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use evote_core::{
    AdminActionLog, AdminAuthService, ElectionService, VoterService, VotingService,
    WebAuthnService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub election_service: ElectionService,
    pub voter_service: VoterService,
    pub voting_service: VotingService,
    pub webauthn_service: WebAuthnService,
    pub admin_service: AdminAuthService,
    pub action_log: AdminActionLog,
}

/// A validated admin bearer token, placed in request extensions.
#[derive(Debug, Clone)]
pub struct AdminToken(pub String);

/// Resolve `Authorization: Bearer <token>` against the admin sessions.
///
/// Never rejects by itself; routes that need an admin use the
/// [`AdminAuth`](crate::extractors::AdminAuth) extractor.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && state.admin_service.authenticate(token).await.is_ok()
    {
        let token = AdminToken(token.to_string());
        req.extensions_mut().insert(token);
    }

    next.run(req).await
}
