//! Application state shared across handlers

use std::sync::Arc;

use crate::auth::{AuthService, TokenVerifier};
use crate::eth::EthGateway;

use axum::extract::FromRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub eth: Arc<dyn EthGateway>,
    /// Statement suggested to clients building a message
    pub siwe_statement: String,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        token_verifier: Arc<dyn TokenVerifier>,
        eth: Arc<dyn EthGateway>,
        siwe_statement: String,
    ) -> Self {
        Self {
            auth_service,
            token_verifier,
            eth,
            siwe_statement,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn TokenVerifier> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_verifier.clone()
    }
}

impl FromRef<AppState> for Arc<dyn EthGateway> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.eth.clone()
    }
}
