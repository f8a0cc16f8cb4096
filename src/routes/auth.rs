//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::state::AppState;

/// Public sign-in routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/nonce", get(auth::get_nonce))
        .route("/auth/verify", post(auth::verify_siwe))
}

/// Routes that need a bearer token
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/me", get(auth::me))
}
