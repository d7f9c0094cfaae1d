//! API endpoints.

mod admin;
mod elections;
mod voters;
mod voting;

use axum::{Router, middleware};

use crate::middleware::{AppState, admin_auth_middleware};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/admin", admin::router())
        .nest("/elections", elections::router())
        .nest("/voters", voters::router())
        .nest("/voting", voting::router())
}

/// The API mounted under `/api`, with admin sessions resolved.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
