//! API data models

use serde::{Deserialize, Serialize};

pub mod auth;
pub mod eth;

pub use auth::*;
pub use eth::*;

/// Liveness check body
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
