/// GitHub App client: JWT assertion minting, installation token exchange,
/// token revocation and rate-limit lookups over the REST API.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{mask_secret, IdentityProvider, IssuedToken, RateLimitInfo};
use crate::config::Config;
use crate::errors::{ConfigError, ExchangeError};

/// GitHub rejects app JWTs that live longer than ten minutes; stay under it.
pub const ASSERTION_TTL_SECS: i64 = 9 * 60;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("installation-token-broker/", env!("CARGO_PKG_VERSION"));

/// Claims of the app assertion (`iss` is the app id).
#[derive(Debug, Serialize, Deserialize)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: Option<DateTime<Utc>>,
    repository_selection: Option<String>,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Deserialize)]
struct RateLimitResources {
    core: RateLimitInfo,
}

pub struct GitHubApp {
    client: reqwest::Client,
    api_url: String,
    app_id: String,
    installation_id: String,
    key: EncodingKey,
}

impl GitHubApp {
    pub fn new(cfg: &Config) -> Result<Self, ConfigError> {
        let key = cfg
            .private_key
            .encoding_key()
            .map_err(|source| ConfigError::PrivateKeyInvalid {
                path: cfg.private_key_path.clone(),
                source,
            })?;

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url: cfg.api_url.as_str().trim_end_matches('/').to_string(),
            app_id: cfg.app_id.clone(),
            installation_id: cfg.installation_id.clone(),
            key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    /// Sign a short-lived RS256 assertion identifying the app.
    pub fn mint_assertion(&self) -> Result<String, jsonwebtoken::errors::Error> {
        self.mint_assertion_at(Utc::now())
    }

    pub fn mint_assertion_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = AppClaims {
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_TTL_SECS,
            iss: self.app_id.clone(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
    }
}

#[async_trait]
impl IdentityProvider for GitHubApp {
    async fn exchange_for_credential(
        &self,
        scope: Option<&[String]>,
    ) -> Result<IssuedToken, ExchangeError> {
        let jwt = self.mint_assertion()?;
        let url = self.endpoint(&format!(
            "app/installations/{}/access_tokens",
            self.installation_id
        ));

        let mut req = self
            .client
            .post(&url)
            .bearer_auth(jwt)
            .header("accept", ACCEPT)
            .header("x-github-api-version", API_VERSION);
        if let Some(repos) = scope {
            req = req.json(&serde_json::json!({ "repositories": repos }));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "installation token exchange rejected");
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AccessTokenResponse = resp
            .json()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;

        debug!(
            token = %mask_secret(&parsed.token),
            provider_expiry = ?parsed.expires_at,
            repository_selection = ?parsed.repository_selection,
            "installation token exchanged"
        );

        Ok(IssuedToken {
            secret: parsed.token,
            provider_expiry: parsed.expires_at,
            repository_selection: parsed.repository_selection,
        })
    }

    async fn revoke(&self, secret: &str) -> bool {
        let result = self
            .client
            .delete(self.endpoint("installation/token"))
            .header("authorization", format!("token {}", secret))
            .header("accept", ACCEPT)
            .header("x-github-api-version", API_VERSION)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(token = %mask_secret(secret), "installation token revoked");
                true
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(
                    token = %mask_secret(secret),
                    status = %status,
                    body = %body,
                    "token revocation rejected"
                );
                false
            }
            Err(e) => {
                warn!(token = %mask_secret(secret), error = %e, "token revocation failed");
                false
            }
        }
    }

    async fn rate_limit_snapshot(&self) -> Option<RateLimitInfo> {
        let issued = match self.exchange_for_credential(None).await {
            Ok(issued) => issued,
            Err(e) => {
                warn!(error = %e, "rate limit check: could not mint a token");
                return None;
            }
        };

        let result = self
            .client
            .get(self.endpoint("rate_limit"))
            .header("authorization", format!("token {}", issued.secret))
            .header("accept", ACCEPT)
            .header("x-github-api-version", API_VERSION)
            .send()
            .await;

        let info = match result {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<RateLimitResponse>().await {
                    Ok(body) => Some(body.resources.core),
                    Err(e) => {
                        warn!(error = %e, "rate limit check: unreadable body");
                        None
                    }
                }
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "rate limit check rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "rate limit check failed");
                None
            }
        };

        // The throwaway token is not tracked anywhere, so always give it back.
        self.revoke(&issued.secret).await;
        info
    }
}
