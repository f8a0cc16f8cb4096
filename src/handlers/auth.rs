//! Authentication HTTP handlers
//!
//! Endpoints for Sign-In with Ethereum.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use validator::Validate;

use crate::auth::AuthError;
use crate::error::{ApiError, ApiResult, AUTHENTICATION_FAILED};
use crate::middleware::AuthenticatedWallet;
use crate::models::{MeResponse, NonceResponse, VerifyRequest, VerifyResponse};
use crate::state::AppState;

/// GET /auth/nonce - Start a sign-in attempt
pub async fn get_nonce(State(state): State<AppState>) -> ApiResult<Json<NonceResponse>> {
    let auth = &state.auth_service;

    let nonce = auth.new_nonce().map_err(|e| {
        tracing::error!(code = %e.code(), error = %e, "Nonce generation failed");
        ApiError::InternalError(e.to_string())
    })?;

    let constraints = auth.constraints();

    Ok(Json(NonceResponse {
        nonce,
        domain: constraints.domain.clone(),
        uri: constraints.uri.clone(),
        chain_id: constraints.chain_id,
        statement: state.siwe_statement.clone(),
        expires_in: auth.nonce_ttl().num_seconds(),
    }))
}

/// POST /auth/verify - Exchange a signed message for a session token
pub async fn verify_siwe(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<Json<VerifyResponse>> {
    let Json(req) = payload?;
    req.validate()?;

    let login = state
        .auth_service
        .verify_siwe(&req.message, &req.signature)
        .map_err(sign_in_failure)?;

    tracing::info!(address = %login.address, "Wallet signed in");

    Ok(Json(VerifyResponse {
        token: login.token,
        address: login.address,
        token_type: "Bearer".to_string(),
        expires_in: state.auth_service.token_expiry().num_seconds(),
    }))
}

/// GET /me - Identity behind the bearer token
pub async fn me(Extension(wallet): Extension<AuthenticatedWallet>) -> Json<MeResponse> {
    Json(MeResponse {
        address: wallet.address,
    })
}

/// Log the specific failure, answer with a generic one
fn sign_in_failure(err: AuthError) -> ApiError {
    match &err {
        AuthError::NonceGeneration(_) | AuthError::TokenIssuance(_) => {
            tracing::error!(code = %err.code(), error = %err, "Sign-in failed");
        }
        AuthError::NonceReplay | AuthError::SignatureInvalid(_) => {
            tracing::warn!(code = %err.code(), error = %err, "Sign-in rejected");
        }
        _ => {
            tracing::debug!(code = %err.code(), error = %err, "Sign-in rejected");
        }
    }

    ApiError::Unauthorized(AUTHENTICATION_FAILED.to_string())
}
