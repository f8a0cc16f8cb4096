//! Authentication middleware
//!
//! Bearer token verification for the protected route group.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::state::AppState;

/// Wallet that presented a valid session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedWallet {
    /// EIP-55 checksummed
    pub address: String,
}

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthRejection {
    error: AuthRejectionDetails,
}

#[derive(Debug, Serialize)]
struct AuthRejectionDetails {
    code: String,
    message: String,
}

impl AuthRejection {
    fn new(message: &str) -> Self {
        Self {
            error: AuthRejectionDetails {
                code: "UNAUTHORIZED".to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Extractor for authenticated wallets
///
/// Verifies the bearer token from the Authorization header. Every token
/// failure gets the same response; the specific kind is only logged.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(wallet: AuthenticatedWallet) -> impl IntoResponse {
///     format!("Hello, {}", wallet.address)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedWallet
where
    Arc<dyn TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(wallet) = parts.extensions.get::<AuthenticatedWallet>() {
            return Ok(wallet.clone());
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthRejection::new("missing bearer token").into_response())?;

        let verifier = Arc::<dyn TokenVerifier>::from_ref(state);

        let address = verifier.verify(bearer.token()).map_err(|e| {
            tracing::debug!(code = %e.code(), error = %e, "Bearer token rejected");
            AuthRejection::new("invalid token").into_response()
        })?;

        Ok(AuthenticatedWallet { address })
    }
}

/// Middleware guarding the protected route group
///
/// Stores the [`AuthenticatedWallet`] as a request extension for handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let (mut parts, body) = request.into_parts();
    let wallet = AuthenticatedWallet::from_request_parts(&mut parts, &state).await?;

    tracing::debug!(address = %wallet.address, "Authenticated request");

    parts.extensions.insert(wallet);
    Ok(next.run(Request::from_parts(parts, body)).await)
}
