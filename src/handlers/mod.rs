//! API handlers for the auth server

pub mod auth;
pub mod eth;
pub mod health;

pub use auth::*;
pub use eth::*;
pub use health::health_check;
