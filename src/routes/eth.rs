//! Chain proxy routes

use axum::{routing::get, Router};

use crate::handlers::eth;
use crate::state::AppState;

/// Create chain proxy routes (protected)
pub fn eth_routes() -> Router<AppState> {
    Router::new()
        .route("/eth/chain", get(eth::get_chain))
        .route("/eth/balance", get(eth::get_balance))
}
