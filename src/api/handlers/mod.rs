//! Route handlers for the account security API.

pub mod auth;
pub mod health;
pub mod root;
