use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use http::{header, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Builds the HTTP router around `state`.
///
/// Route groups carry their own middleware; the cookie manager, tracing,
/// body limit, and CORS wrap everything.
pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::COOKIE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400));

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10_000)
            .burst_size(50_000)
            .use_headers()
            .finish()
            .unwrap(),
    );

    // Innermost layer is added first; the trust guard always runs on the
    // outside so cross-origin forgeries never reach a counter.
    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_login,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::trust::require_verification_pass,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::trust::guard_mutation,
        ))
        .with_state(state.clone());

    let refresh_routes = Router::new()
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_refresh,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::trust::guard_mutation,
        ))
        .with_state(state.clone());

    let verification_routes = Router::new()
        .route(
            "/api/auth/verification",
            post(handlers::verification::submit_challenge),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_verification,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::trust::guard_mutation,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/logout-all", post(handlers::auth::logout_all))
        .route("/api/auth/session", get(handlers::auth::session_info))
        .layer(tower_governor::GovernorLayer::new(governor_conf.clone()))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::trust::guard_mutation,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(login_routes)
        .merge(refresh_routes)
        .merge(verification_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(1024 * 64))
        .layer(cors)
        .fallback_service(ServeDir::new("public"))
}
