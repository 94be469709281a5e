//! Identity provider credential verification.
//!
//! Session minting exchanges a short-lived credential obtained by the client
//! at sign-in. Verification is delegated to the identity provider through the
//! [`IdentityVerifier`] trait so handlers stay testable without a network.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::error;

/// Identity confirmed by the provider for a presented credential.
#[derive(Clone, Debug, Deserialize)]
pub struct VerifiedIdentity {
    pub user_id: String,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a short-lived credential.
    ///
    /// `Ok(None)` means the credential was rejected; `Err` means the provider
    /// could not be consulted.
    async fn verify(&self, id_token: &str) -> Result<Option<VerifiedIdentity>>;
}

/// Production verifier that POSTs the credential to the provider's verify
/// endpoint.
#[derive(Clone, Debug)]
pub struct HttpIdentityVerifier {
    client: Client,
    verify_url: String,
}

impl HttpIdentityVerifier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(verify_url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build identity verifier client")?;
        Ok(Self { client, verify_url })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<Option<VerifiedIdentity>> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&serde_json::json!({ "id_token": id_token }))
            .send()
            .await
            .context("identity provider unreachable")?;

        match response.status() {
            StatusCode::OK => {
                let identity: VerifiedIdentity = response
                    .json()
                    .await
                    .context("invalid identity provider response")?;
                Ok(Some(identity))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => {
                error!("identity provider verify failed: {status}");
                Err(anyhow::anyhow!(
                    "identity provider verify failed: {status}"
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_identity_deserializes() {
        let identity: VerifiedIdentity =
            serde_json::from_str(r#"{"user_id":"uid-1"}"#).expect("deserialize failed");
        assert_eq!(identity.user_id, "uid-1");
    }

    #[test]
    fn http_verifier_builds() {
        let verifier = HttpIdentityVerifier::new("https://identity.test/verify".to_string());
        assert!(verifier.is_ok());
    }
}
