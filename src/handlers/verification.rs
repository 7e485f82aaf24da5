use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use garde::Validate;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    handlers::auth::{build_cookie, AuthResponse},
    models::session::VERIFICATION_COOKIE,
    state::AppState,
};

/// The request payload for a verification challenge.
#[derive(Deserialize, Validate)]
pub struct VerificationRequest {
    /// The solved challenge, as handed back by the client-side widget.
    #[garde(length(min = 1, max = 2048))]
    pub response: String,
}

/// Checks a challenge response and hands out a short-lived verification
/// pass cookie.
///
/// The pass proves "this client solved a challenge recently", never who
/// the client is.
#[axum::debug_handler]
pub async fn submit_challenge(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    cookies: Cookies,
    Json(payload): Json<VerificationRequest>,
) -> Result<Response> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let remote_ip = addr.ip().to_string();
    if !state
        .verification
        .check_challenge(&payload.response, &remote_ip)
        .await?
    {
        tracing::warn!("❌ Verification challenge failed for {}", remote_ip);
        return Err(AppError::Authentication("Verification failed".to_string()));
    }

    let ttl = state.config.pass_ttl_seconds();
    let pass = state.verification.issue_pass(ttl)?;

    cookies.add(build_cookie(
        VERIFICATION_COOKIE,
        pass,
        ttl,
        state.config.is_production(),
    ));

    tracing::info!("✅ Verification pass issued to {}", remote_ip);

    let response = AuthResponse {
        success: true,
        message: "Verification complete".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
