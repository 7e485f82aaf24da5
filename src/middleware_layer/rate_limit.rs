use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use sonic_rs::JsonValueTrait;
use std::net::SocketAddr;

use crate::{error::AppError, state::AppState};

/// Login attempts allowed per IP per window.
const LOGIN_IP_LIMIT: i64 = 20;
const LOGIN_IP_WINDOW_SECS: i64 = 900;

/// Failed login attempts allowed per email per window.
const LOGIN_EMAIL_LIMIT: i64 = 5;
const LOGIN_EMAIL_WINDOW_SECS: i64 = 43_200;

/// Refresh calls allowed per IP per window.
const REFRESH_LIMIT: i64 = 60;
const REFRESH_WINDOW_SECS: i64 = 3_600;

/// Verification challenges allowed per IP per window.
const VERIFY_LIMIT: i64 = 10;
const VERIFY_WINDOW_SECS: i64 = 600;

/// Largest request body the login sniffer will buffer. Matches the
/// router-wide body limit.
const MAX_SNIFF_BYTES: usize = 64 * 1024;

/// Extracts the real IP address from the request extensions.
///
/// # Arguments
///
/// * `req` - The incoming request.
///
/// # Returns
///
/// The IP address as a string, or "unknown" if not found.
fn extract_real_ip(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Derives an opaque counter bucket from an email address, so raw
/// addresses never become storage keys.
fn email_bucket(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    hex::encode(&digest[..8])
}

/// A middleware that rate limits login attempts.
///
/// Two windows apply: a per-IP window recorded on every attempt, and a
/// per-email window recorded only when the attempt comes back as a client
/// error. Both refuse the request when the counter store is unreachable.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `AppError`.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    fn extract_email_from_body(body_bytes: &[u8]) -> Option<String> {
        if let Ok(json) = sonic_rs::from_slice::<sonic_rs::Value>(body_bytes) {
            json.get("email").and_then(|v| v.as_str()).map(|s| s.to_string())
        } else {
            None
        }
    }

    let ip = extract_real_ip(&req);
    let ip_key = format!("login:ip:{}", ip);

    let ip_decision = match state
        .limiter
        .consume(&ip_key, LOGIN_IP_WINDOW_SECS, LOGIN_IP_LIMIT)
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!("❌ Rate counter unavailable for login from {}: {}", ip, e);
            return e.into_response();
        }
    };

    if !ip_decision.allowed {
        tracing::warn!("🛑 Login rate exceeded for IP {}", ip);
        return AppError::RateLimited {
            retry_after: state.limiter.seconds_until(ip_decision.reset_at),
        }
        .into_response();
    }

    let (parts, body) = req.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_SNIFF_BYTES)
        .await
        .unwrap_or_default();

    let email = extract_email_from_body(&body_bytes).unwrap_or_else(|| "unknown".to_string());
    let email_key = format!("login:email:{}", email_bucket(&email));

    let email_decision = match state
        .limiter
        .peek(&email_key, LOGIN_EMAIL_WINDOW_SECS, LOGIN_EMAIL_LIMIT)
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!("❌ Rate counter unavailable for login from {}: {}", ip, e);
            return e.into_response();
        }
    };

    if !email_decision.allowed {
        tracing::warn!("🛑 Login rate exceeded for email bucket {}", email_key);
        return AppError::RateLimited {
            retry_after: state.limiter.seconds_until(email_decision.reset_at),
        }
        .into_response();
    }

    let new_req = Request::from_parts(parts, Body::from(body_bytes));

    let response = next.run(new_req).await;

    if response.status().is_client_error() {
        if let Err(e) = state
            .limiter
            .consume(&email_key, LOGIN_EMAIL_WINDOW_SECS, LOGIN_EMAIL_LIMIT)
            .await
        {
            tracing::warn!("❌ Could not record failed login for {}: {}", email, e);
        }
    }

    response
}

/// A middleware that rate limits session refresh attempts.
///
/// Refresh keeps working when the counter store is down; the signature
/// check behind it still gates the request.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `AppError`.
pub async fn rate_limit_refresh(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = extract_real_ip(&req);
    let key = format!("refresh:ip:{}", ip);

    match state
        .limiter
        .consume(&key, REFRESH_WINDOW_SECS, REFRESH_LIMIT)
        .await
    {
        Ok(decision) if !decision.allowed => {
            tracing::warn!("🛑 Refresh rate exceeded for IP {}", ip);
            AppError::RateLimited {
                retry_after: state.limiter.seconds_until(decision.reset_at),
            }
            .into_response()
        }
        Ok(_) => next.run(req).await,
        Err(e) => {
            tracing::warn!("❌ Rate counter unavailable for refresh from {}: {}", ip, e);
            next.run(req).await
        }
    }
}

/// A middleware that rate limits verification challenge submissions.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `AppError`.
pub async fn rate_limit_verification(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = extract_real_ip(&req);
    let key = format!("verify:ip:{}", ip);

    let decision = match state
        .limiter
        .consume(&key, VERIFY_WINDOW_SECS, VERIFY_LIMIT)
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!("❌ Rate counter unavailable for verification from {}: {}", ip, e);
            return e.into_response();
        }
    };

    if !decision.allowed {
        tracing::warn!("🛑 Verification rate exceeded for IP {}", ip);
        return AppError::RateLimited {
            retry_after: state.limiter.seconds_until(decision.reset_at),
        }
        .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_bucket_normalizes_case_and_whitespace() {
        assert_eq!(email_bucket("User@Example.com"), email_bucket("  user@example.com  "));
    }

    #[test]
    fn email_bucket_is_opaque_and_fixed_width() {
        let bucket = email_bucket("someone@example.com");
        assert_eq!(bucket.len(), 16);
        assert!(!bucket.contains('@'));
    }

    #[test]
    fn distinct_emails_get_distinct_buckets() {
        assert_ne!(email_bucket("a@example.com"), email_bucket("b@example.com"));
    }
}
