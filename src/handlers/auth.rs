use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::{AppError, Result},
    models::session::{CurrentSession, SESSION_COOKIE},
    services::credentials,
    state::AppState,
};

/// The request payload for login.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    /// The account email.
    #[garde(email)]
    pub email: String,
    /// The account password.
    #[garde(length(min = 8, max = 128))]
    pub password: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// The response payload for session introspection.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub principal_id: i64,
    pub email: String,
    pub is_admin: bool,
}

/// Creates a secure cookie with the given name, value, and max age.
pub fn build_cookie(
    name: &'static str,
    value: String,
    max_age_seconds: i64,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);

    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
    }
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_seconds));
    cookie.set_path("/");

    cookie
}

/// A removal cookie for `name`: empty value, zero max age, same path.
pub fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}

/// Handles login: credential check, then a fresh single session.
///
/// Unknown email and wrong password answer identically.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let email = payload.email.trim().to_lowercase();
    tracing::info!("🔐 Login attempt for {}", email);

    let Some(principal) = state.principals.find_by_email(&email).await? else {
        return Err(AppError::Authentication(
            "Invalid email or password".to_string(),
        ));
    };

    if !credentials::verify_password(&payload.password, &principal.password_hash)? {
        return Err(AppError::Authentication(
            "Invalid email or password".to_string(),
        ));
    }

    let ttl = state.config.session_ttl_seconds();
    let issued = state.sessions.establish(principal.id, ttl).await?;

    cookies.add(build_cookie(
        SESSION_COOKIE,
        issued.token,
        ttl,
        state.config.is_production(),
    ));

    tracing::info!("✅ Principal logged in: {}", principal.id);

    let response = AuthResponse {
        success: true,
        message: "Login successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Rotates the session cookie.
///
/// The marker moves with the new token, so the cookie being replaced is
/// revoked everywhere the moment this succeeds.
#[axum::debug_handler]
pub async fn refresh(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    let presented = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::InvalidToken)?;

    let ttl = state.config.session_ttl_seconds();
    match state.sessions.refresh(&presented, ttl).await? {
        Some(issued) => {
            cookies.add(build_cookie(
                SESSION_COOKIE,
                issued.token,
                ttl,
                state.config.is_production(),
            ));
            tracing::debug!("✅ Session rotated for principal {}", issued.claims.subject_id);

            let response = AuthResponse {
                success: true,
                message: "Session refreshed".to_string(),
            };
            Ok((StatusCode::OK, Json(response)).into_response())
        }
        None => {
            // Dead token: clear it so the client stops replaying it.
            cookies.remove(expired_cookie(SESSION_COOKIE));
            Err(AppError::InvalidToken)
        }
    }
}

/// Handles logout on this device. The cookie dies; the marker stays, since
/// the next login moves it anyway.
#[axum::debug_handler]
pub async fn logout(
    Extension(current): Extension<CurrentSession>,
    cookies: Cookies,
) -> Result<Response> {
    tracing::info!("👋 Logout for principal: {}", current.principal_id);

    cookies.remove(expired_cookie(SESSION_COOKIE));

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Logs the principal out everywhere by rotating the single-session marker
/// to an id no outstanding cookie holds.
#[axum::debug_handler]
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    cookies: Cookies,
) -> Result<Response> {
    state.sessions.revoke_all(current.principal_id).await?;
    cookies.remove(expired_cookie(SESSION_COOKIE));

    tracing::info!("👋 Principal {} logged out everywhere", current.principal_id);

    let response = AuthResponse {
        success: true,
        message: "Logged out everywhere".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Session introspection for the signed-in principal.
#[axum::debug_handler]
pub async fn session_info(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    cookies: Cookies,
) -> Result<Response> {
    let principal = state.principals.find_by_id(current.principal_id).await?;
    let Some(principal) = principal.filter(|p| p.is_active) else {
        // The token outlived the account; treat it like any dead token.
        cookies.remove(expired_cookie(SESSION_COOKIE));
        return Err(AppError::InvalidToken);
    };

    let info = SessionInfo {
        principal_id: principal.id,
        email: principal.email,
        is_admin: principal.is_admin,
    };

    Ok((StatusCode::OK, Json(info)).into_response())
}
