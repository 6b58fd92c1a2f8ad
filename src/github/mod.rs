//! Issuance & Revocation Gateway — the GitHub App side of the broker.
//!
//! Turns the app identity (app id + RSA private key) into a short-lived
//! signed assertion, exchanges it for an installation access token, and
//! revokes tokens on request. Holds no mutable state.

pub mod app;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ExchangeError;

pub use app::GitHubApp;

/// What the provider handed back for one successful exchange.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub secret: String,
    /// Expiry the provider reports for the token, if any.
    pub provider_expiry: Option<DateTime<Utc>>,
    /// `all` or `selected`, as reported by the provider.
    pub repository_selection: Option<String>,
}

/// Core API rate-limit bucket for the installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp (seconds) at which the window resets.
    pub reset: i64,
    pub used: u64,
}

/// Abstraction over the upstream identity provider.
///
/// Only `exchange_for_credential` can fail; revocation and rate-limit lookups
/// are best-effort and report failure as `false` / `None`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Mint a fresh installation token, optionally limited to `scope`.
    async fn exchange_for_credential(
        &self,
        scope: Option<&[String]>,
    ) -> Result<IssuedToken, ExchangeError>;

    /// Invalidate a previously issued token. Never errors.
    async fn revoke(&self, secret: &str) -> bool;

    /// Current rate-limit bucket, or `None` if it could not be fetched.
    async fn rate_limit_snapshot(&self) -> Option<RateLimitInfo>;
}

/// Short, log-safe prefix of a bearer secret.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    if secret.chars().count() > 8 {
        format!("{}...", prefix)
    } else {
        "****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret_keeps_prefix_only() {
        assert_eq!(mask_secret("ghs_abcdefghijklmnop"), "ghs_abcd...");
        assert_eq!(mask_secret("short"), "****");
    }

    #[test]
    fn test_rate_limit_info_deserializes() {
        let info: RateLimitInfo = serde_json::from_value(serde_json::json!({
            "limit": 5000, "remaining": 4999, "reset": 1_700_000_000, "used": 1
        }))
        .unwrap();
        assert_eq!(info.remaining, 4999);
    }
}
