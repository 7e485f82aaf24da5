use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;
use url::Url;

use crate::{
    error::AppError,
    models::session::VERIFICATION_COOKIE,
    state::AppState,
};

/// Normalizes a host value for comparison: first value of a proxy list,
/// scheme and path stripped, lowercased, trailing dot and default ports
/// removed. Bracketed IPv6 literals keep their brackets.
fn normalize_host(raw: &str) -> Option<String> {
    let first = raw.split(',').next().unwrap_or("").trim();
    if first.is_empty() {
        return None;
    }

    let without_scheme = first
        .strip_prefix("https://")
        .or_else(|| first.strip_prefix("http://"))
        .unwrap_or(first);
    let without_path = without_scheme.split('/').next().unwrap_or(without_scheme);
    let lowered = without_path.to_lowercase();

    let (host, port) = if let Some(rest) = lowered.strip_prefix('[') {
        match rest.split_once(']') {
            Some((addr, tail)) => (
                format!("[{}]", addr),
                tail.strip_prefix(':').map(|p| p.to_string()),
            ),
            None => return None,
        }
    } else {
        match lowered.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                (host.to_string(), Some(port.to_string()))
            }
            _ => (lowered.clone(), None),
        }
    };

    let host = host.trim_end_matches('.').to_string();
    if host.is_empty() {
        return None;
    }

    match port.as_deref() {
        None | Some("80") | Some("443") => Some(host),
        Some(port) => Some(format!("{}:{}", host, port)),
    }
}

/// Extracts the comparable host (plus any non-default port) from an
/// `Origin` header value. `"null"` and anything else unparseable yields
/// `None`.
fn origin_host(origin: &str) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.trim_end_matches('.').to_string();

    // `Url::port` already swallows scheme-default ports.
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Whether `host` falls under one of the shared platform suffixes.
fn is_shared_host(host: &str, shared_suffixes: &[String]) -> bool {
    let bare = host.split(':').next().unwrap_or(host);
    shared_suffixes.iter().any(|suffix| {
        let suffix = suffix.trim_start_matches('.').to_lowercase();
        !suffix.is_empty() && (bare == suffix || bare.ends_with(&format!(".{}", suffix)))
    })
}

/// The hosts this deployment answers as, in header order, minus any that
/// sit under a shared platform suffix. A host shared with other tenants
/// cannot vouch for a request.
fn own_hosts(headers: &HeaderMap, uri: &Uri, shared_suffixes: &[String]) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();

    let candidates = [
        headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_host),
        headers
            .get("x-forwarded-host")
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_host),
        uri.host().and_then(normalize_host),
    ];

    for candidate in candidates.into_iter().flatten() {
        if !is_shared_host(&candidate, shared_suffixes) && !hosts.contains(&candidate) {
            hosts.push(candidate);
        }
    }

    hosts
}

/// Decides whether a state-changing request comes from this site.
///
/// `Sec-Fetch-Site` is authoritative when the browser sends it; only the
/// literal `cross-site` rejects. Without it, a request with no `Origin`
/// passes, and one with an `Origin` must match a host this deployment
/// answers as.
pub fn is_trusted_request(headers: &HeaderMap, uri: &Uri, shared_suffixes: &[String]) -> bool {
    if let Some(site) = headers.get("sec-fetch-site").and_then(|v| v.to_str().ok()) {
        return !site.eq_ignore_ascii_case("cross-site");
    }

    let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        // Non-browser clients send neither header.
        return true;
    };

    let Some(origin) = origin_host(origin) else {
        return false;
    };

    own_hosts(headers, uri, shared_suffixes).contains(&origin)
}

/// A middleware that blocks untrusted cross-origin mutations.
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
pub async fn guard_mutation(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::GET
        || req.method() == Method::HEAD
        || req.method() == Method::OPTIONS
    {
        tracing::debug!("✅ Trust exemption: {} request", req.method());
        return next.run(req).await;
    }

    if !is_trusted_request(
        req.headers(),
        req.uri(),
        &state.config.shared_host_suffixes,
    ) {
        tracing::warn!("🛑 Untrusted cross-origin request to {}", req.uri().path());
        return AppError::Forbidden.into_response();
    }

    next.run(req).await
}

/// A middleware that requires a valid verification pass before login.
///
/// Inactive unless `LOGIN_REQUIRES_VERIFICATION` is set. The pass only
/// proves a challenge was solved recently; it says nothing about who is
/// asking.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `AppError`.
pub async fn require_verification_pass(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.login_requires_verification {
        return next.run(req).await;
    }

    let valid = match cookies.get(VERIFICATION_COOKIE) {
        Some(cookie) => match state.verification.has_valid_pass(cookie.value()) {
            Ok(valid) => valid,
            Err(e) => return e.into_response(),
        },
        None => false,
    };

    if !valid {
        tracing::warn!("🛑 Verification pass missing or expired");
        return AppError::VerificationRequired.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn uri() -> Uri {
        "/api/auth/login".parse().unwrap()
    }

    #[test]
    fn fetch_metadata_cross_site_is_rejected() {
        let h = headers(&[
            ("sec-fetch-site", "cross-site"),
            ("host", "app.example.com"),
        ]);
        assert!(!is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn fetch_metadata_same_origin_is_trusted() {
        for site in ["same-origin", "same-site", "none"] {
            let h = headers(&[("sec-fetch-site", site), ("host", "app.example.com")]);
            assert!(is_trusted_request(&h, &uri(), &[]), "{site} should pass");
        }
    }

    #[test]
    fn fetch_metadata_wins_over_origin() {
        // Metadata says same-origin, Origin disagrees: metadata wins.
        let h = headers(&[
            ("sec-fetch-site", "same-origin"),
            ("origin", "https://evil.example.net"),
            ("host", "app.example.com"),
        ]);
        assert!(is_trusted_request(&h, &uri(), &[]));

        let h = headers(&[
            ("sec-fetch-site", "cross-site"),
            ("origin", "https://app.example.com"),
            ("host", "app.example.com"),
        ]);
        assert!(!is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn no_origin_and_no_metadata_is_trusted() {
        let h = headers(&[("host", "app.example.com")]);
        assert!(is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn matching_origin_is_trusted() {
        let h = headers(&[
            ("origin", "https://app.example.com"),
            ("host", "app.example.com"),
        ]);
        assert!(is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn mismatched_origin_is_rejected() {
        let h = headers(&[
            ("origin", "https://evil.example.net"),
            ("host", "app.example.com"),
        ]);
        assert!(!is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn null_origin_is_rejected() {
        let h = headers(&[("origin", "null"), ("host", "app.example.com")]);
        assert!(!is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn forwarded_host_vouches_behind_a_proxy() {
        let h = headers(&[
            ("origin", "https://app.example.com"),
            ("host", "10.0.0.5:8080"),
            ("x-forwarded-host", "app.example.com"),
        ]);
        assert!(is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn forwarded_host_list_uses_first_value() {
        let h = headers(&[
            ("origin", "https://app.example.com"),
            ("host", "10.0.0.5:8080"),
            ("x-forwarded-host", "app.example.com, edge.internal"),
        ]);
        assert!(is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn absolute_request_uri_vouches() {
        let h = headers(&[("origin", "https://app.example.com")]);
        let absolute: Uri = "https://app.example.com/api/auth/login".parse().unwrap();
        assert!(is_trusted_request(&h, &absolute, &[]));
    }

    #[test]
    fn default_ports_compare_equal() {
        let h = headers(&[
            ("origin", "https://app.example.com:443"),
            ("host", "app.example.com"),
        ]);
        assert!(is_trusted_request(&h, &uri(), &[]));

        let h = headers(&[
            ("origin", "http://app.example.com"),
            ("host", "app.example.com:80"),
        ]);
        assert!(is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn explicit_port_must_match() {
        let h = headers(&[
            ("origin", "https://app.example.com:8443"),
            ("host", "app.example.com"),
        ]);
        assert!(!is_trusted_request(&h, &uri(), &[]));

        let h = headers(&[
            ("origin", "https://app.example.com:8443"),
            ("host", "app.example.com:8443"),
        ]);
        assert!(is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn host_case_and_trailing_dot_normalize() {
        let h = headers(&[
            ("origin", "https://app.example.com"),
            ("host", "APP.Example.COM."),
        ]);
        assert!(is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn ipv6_hosts_compare_bracketed() {
        let h = headers(&[("origin", "http://[::1]:3000"), ("host", "[::1]:3000")]);
        assert!(is_trusted_request(&h, &uri(), &[]));
    }

    #[test]
    fn shared_suffix_host_never_vouches() {
        // The deployment is reachable through a shared tunnel domain; an
        // origin on that domain could be any tenant.
        let suffixes = vec!["trycloudflare.com".to_string()];
        let h = headers(&[
            ("origin", "https://tenant.trycloudflare.com"),
            ("host", "tenant.trycloudflare.com"),
        ]);
        assert!(!is_trusted_request(&h, &uri(), &suffixes));

        // The dedicated host still vouches for its own origin.
        let h = headers(&[
            ("origin", "https://app.example.com"),
            ("host", "app.example.com"),
            ("x-forwarded-host", "tenant.trycloudflare.com"),
        ]);
        assert!(is_trusted_request(&h, &uri(), &suffixes));
    }

    #[test]
    fn unparseable_origin_is_rejected() {
        let h = headers(&[("origin", "not a url"), ("host", "app.example.com")]);
        assert!(!is_trusted_request(&h, &uri(), &[]));
    }
}
