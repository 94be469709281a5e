//! Account security handlers.
//!
//! The flow around a sign-in event:
//!
//! 1. The client establishes a session (`session::create_session`) from a
//!    short-lived identity credential.
//! 2. The client reports the sign-in (`notification::login_notification`),
//!    which records a single-use security token and queues an email with a
//!    "secure my account" link.
//! 3. If that link is followed (`redeem::secure_account`), every session for
//!    the user is revoked and the token consumed, atomically.
//!
//! Raw token values never reach the database; storage works on SHA-256
//! hashes. The security-token store is append-only from this module's
//! perspective: rows flip `used` once and are never deleted.

pub(crate) mod identity;
pub(crate) mod notification;
pub(crate) mod redeem;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use identity::{HttpIdentityVerifier, IdentityVerifier, VerifiedIdentity};
pub use state::{AuthConfig, AuthState, RedeemError};

#[cfg(test)]
pub(crate) mod test_support;
