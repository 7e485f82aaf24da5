use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    handlers::auth::expired_cookie,
    models::session::{CurrentSession, SESSION_COOKIE},
    services::session::Verdict,
    state::AppState,
};

/// A middleware that requires an active session.
///
/// A rejected cookie is cleared on the way out so clients stop replaying
/// it. Superseded and forged tokens are cleared the same way and answer
/// with the same status.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `AppError`.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        tracing::warn!("❌ No session cookie found");
        return Err(AppError::InvalidToken);
    };

    match state.sessions.authenticate(&token).await? {
        Verdict::Active(claims) => {
            tracing::debug!("✅ Principal authenticated: {}", claims.subject_id);

            request.extensions_mut().insert(CurrentSession {
                principal_id: claims.subject_id,
                token_id: claims.token_id,
            });

            Ok(next.run(request).await)
        }
        Verdict::Invalid => {
            tracing::warn!("❌ Session cookie rejected");
            cookies.remove(expired_cookie(SESSION_COOKIE));
            Err(AppError::InvalidToken)
        }
        Verdict::Revoked => {
            tracing::warn!("❌ Session cookie superseded by a newer session");
            cookies.remove(expired_cookie(SESSION_COOKIE));
            Err(AppError::Revoked)
        }
    }
}
