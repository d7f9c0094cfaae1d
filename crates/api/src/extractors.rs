//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use evote_common::AppError;

use crate::middleware::AdminToken;

/// Authenticated admin extractor.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub AdminToken);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by admin_auth_middleware
        parts
            .extensions
            .get::<AdminToken>()
            .cloned()
            .map(AdminAuth)
            .ok_or(AppError::Unauthorized)
    }
}

/// Whether the caller is an admin, for routes open to everyone.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAdmin(pub bool);

impl<S> FromRequestParts<S> for MaybeAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AdminToken>().is_some()))
    }
}
