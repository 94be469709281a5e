//! # Grammatica Account Security Service
//!
//! Backend service for the Grammatica learning platform covering the
//! account-security flow around sign-in events:
//!
//! - **Token issuer:** a new sign-in records a single-use security token and
//!   queues a notification email carrying a "secure my account" link.
//! - **Token redeemer:** following that link revokes every active session for
//!   the owning user, consumes the token, and redirects to a confirmation
//!   page. Unknown, expired, and already-used tokens are deliberately
//!   indistinguishable to the caller.
//! - **Session manager:** exchanges a short-lived identity credential for an
//!   `HttpOnly` session cookie with a fixed validity window, plus a
//!   client-readable marker cookie consumed only by the route guard.
//! - **Route guard:** request-level middleware that bounces unauthenticated
//!   requests away from protected page prefixes and authenticated ones away
//!   from the login page.
//!
//! All state lives in Postgres; the service itself is stateless per request.
//! Raw token values never touch the database, only their SHA-256 hashes.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
