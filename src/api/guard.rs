//! Route guard middleware for page navigation.
//!
//! Gates protected page prefixes on the presence of the client-readable auth
//! marker cookie, and bounces already-authenticated visitors away from the
//! login page. This is a coarse pre-check for navigation only; authorization
//! always happens server-side against the `HttpOnly` session cookie.

use axum::{
    extract::{Request, State},
    http::header::COOKIE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use crate::api::handlers::auth::session::MARKER_COOKIE_NAME;

#[derive(Clone, Debug)]
pub struct GuardConfig {
    protected_prefixes: Vec<String>,
    login_path: String,
    home_path: String,
}

impl GuardConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            protected_prefixes: vec!["/dashboard".to_string(), "/admin".to_string()],
            login_path: "/login".to_string(),
            home_path: "/dashboard".to_string(),
        }
    }

    #[must_use]
    pub fn with_protected_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.protected_prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: String) -> Self {
        self.login_path = path;
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: String) -> Self {
        self.home_path = path;
        self
    }

    /// Decide what to do with a request: `None` passes through, `Some(path)`
    /// redirects.
    fn decide(&self, path: &str, has_marker: bool) -> Option<&str> {
        if is_exempt(path) {
            return None;
        }
        if !has_marker && self.protected_prefixes.iter().any(|p| matches_prefix(path, p)) {
            return Some(&self.login_path);
        }
        if has_marker && path == self.login_path {
            return Some(&self.home_path);
        }
        None
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact-or-subpath prefix match: `/admin` covers `/admin` and `/admin/x`,
/// never `/administration`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// API routes, docs, health, and static assets are never evaluated.
fn is_exempt(path: &str) -> bool {
    for prefix in ["/v1", "/api", "/docs", "/health", "/_assets"] {
        if matches_prefix(path, prefix) {
            return true;
        }
    }
    // Anything with a file extension is a static asset.
    path.rsplit('/').next().is_some_and(|seg| seg.contains('.'))
}

fn has_marker_cookie(request: &Request) -> bool {
    let Some(header) = request.headers().get(COOKIE) else {
        return false;
    };
    let Ok(value) = header.to_str() else {
        return false;
    };
    value.split(';').any(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        parts.next().map(str::trim) == Some(MARKER_COOKIE_NAME)
    })
}

/// Axum middleware entry point.
pub async fn guard(
    State(config): State<Arc<GuardConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let has_marker = has_marker_cookie(&request);
    if let Some(target) = config.decide(request.uri().path(), has_marker) {
        return Redirect::to(target).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::{is_exempt, matches_prefix, GuardConfig};

    #[test]
    fn prefix_matching_is_exact_or_subpath() {
        assert!(matches_prefix("/admin", "/admin"));
        assert!(matches_prefix("/admin/users", "/admin"));
        assert!(!matches_prefix("/administration", "/admin"));
        assert!(!matches_prefix("/admi", "/admin"));
    }

    #[test]
    fn api_docs_health_and_assets_are_exempt() {
        assert!(is_exempt("/v1/auth/session"));
        assert!(is_exempt("/api/anything"));
        assert!(is_exempt("/docs"));
        assert!(is_exempt("/health"));
        assert!(is_exempt("/_assets/app.css"));
        assert!(is_exempt("/favicon.ico"));
        assert!(!is_exempt("/dashboard"));
        assert!(!is_exempt("/login"));
    }

    #[test]
    fn protected_path_without_marker_goes_to_login() {
        let config = GuardConfig::new();
        assert_eq!(config.decide("/dashboard", false), Some("/login"));
        assert_eq!(config.decide("/dashboard/grades", false), Some("/login"));
        assert_eq!(config.decide("/admin/users", false), Some("/login"));
    }

    #[test]
    fn protected_path_with_marker_passes() {
        let config = GuardConfig::new();
        assert_eq!(config.decide("/dashboard", true), None);
        assert_eq!(config.decide("/admin", true), None);
    }

    #[test]
    fn login_with_marker_goes_home() {
        let config = GuardConfig::new();
        assert_eq!(config.decide("/login", true), Some("/dashboard"));
        assert_eq!(config.decide("/login", false), None);
    }

    #[test]
    fn unprotected_paths_pass_regardless_of_marker() {
        let config = GuardConfig::new();
        assert_eq!(config.decide("/", false), None);
        assert_eq!(config.decide("/", true), None);
        assert_eq!(config.decide("/pricing", true), None);
    }

    #[test]
    fn api_paths_skip_evaluation_even_when_protected() {
        let config =
            GuardConfig::new().with_protected_prefixes(vec!["/v1".to_string()]);
        assert_eq!(config.decide("/v1/auth/session", false), None);
    }
}
