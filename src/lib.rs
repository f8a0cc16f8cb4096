//! SIWE Auth Server Library
//!
//! Sign-In with Ethereum: nonce issuance, message validation, signature
//! recovery and session tokens, plus the HTTP surface around them.

pub mod auth;
pub mod config;
pub mod error;
pub mod eth;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
