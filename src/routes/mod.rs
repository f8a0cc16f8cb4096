//! Route definitions for the auth server

mod auth;
mod eth;

use axum::{middleware, routing::get, Router};

use crate::handlers::health_check;
use crate::middleware::{request_tracing, require_auth, security_headers};
use crate::state::AppState;

pub use auth::{auth_routes, session_routes};
pub use eth::eth_routes;

/// Assemble the full application router
///
/// CORS and HSTS depend on deployment settings and are layered on by the binary.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(session_routes())
        .merge(eth_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes())
        .merge(protected)
        .with_state(state)
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_tracing))
}
