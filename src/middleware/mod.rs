//! Middleware for the auth server
//!
//! This module provides middleware for request tracing, security headers,
//! and bearer authentication.

pub mod auth;
mod security;
mod tracing;

pub use auth::{require_auth, AuthenticatedWallet};
pub use security::{hsts_header, security_headers};
pub use self::tracing::{request_tracing, REQUEST_ID_HEADER};
