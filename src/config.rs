use std::fmt;
use std::time::Duration;

use jsonwebtoken::EncodingKey;

use crate::errors::ConfigError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_TOKEN_LIFESPAN_MS: u64 = 300_000;

/// PEM bytes of the app's RSA private key. Validated at load time.
#[derive(Clone)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    pub fn from_pem(pem: Vec<u8>, path: &str) -> Result<Self, ConfigError> {
        EncodingKey::from_rsa_pem(&pem).map_err(|source| ConfigError::PrivateKeyInvalid {
            path: path.to_string(),
            source,
        })?;
        Ok(Self(pem))
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, jsonwebtoken::errors::Error> {
        EncodingKey::from_rsa_pem(&self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub app_id: String,
    pub installation_id: String,
    pub private_key_path: String,
    pub private_key: PrivateKey,
    /// Base URL of the GitHub REST API. Overridable for GHES and tests.
    pub api_url: url::Url,
    /// How often the background sweep runs.
    pub cleanup_interval: Duration,
    /// Local lifespan of every issued token, independent of GitHub's own expiry.
    pub token_lifespan: Duration,
    /// Single allowed CORS origin. Any origin when unset.
    pub cors_allowed_origin: Option<String>,
}

impl Config {
    pub fn token_lifespan_ms(&self) -> u64 {
        u64::try_from(self.token_lifespan.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Load configuration from the process environment (after `.env`, if present).
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a [`Config`] from an arbitrary key lookup. Reads the private key file.
pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let port = match get("PORT") {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name: "PORT",
            reason: format!("'{}' is not a valid port", raw),
        })?,
        None => DEFAULT_PORT,
    };

    let app_id = get("GITHUB_APP_ID").ok_or(ConfigError::Missing("GITHUB_APP_ID"))?;
    let installation_id =
        get("GITHUB_INSTALLATION_ID").ok_or(ConfigError::Missing("GITHUB_INSTALLATION_ID"))?;
    let private_key_path =
        get("GITHUB_PRIVATE_KEY_PATH").ok_or(ConfigError::Missing("GITHUB_PRIVATE_KEY_PATH"))?;

    let pem = std::fs::read(&private_key_path).map_err(|source| {
        ConfigError::PrivateKeyUnreadable {
            path: private_key_path.clone(),
            source,
        }
    })?;
    let private_key = PrivateKey::from_pem(pem, &private_key_path)?;

    let api_raw = get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_url = url::Url::parse(&api_raw).map_err(|e| ConfigError::Invalid {
        name: "GITHUB_API_URL",
        reason: e.to_string(),
    })?;
    if api_url.scheme() != "http" && api_url.scheme() != "https" {
        return Err(ConfigError::Invalid {
            name: "GITHUB_API_URL",
            reason: format!("unsupported scheme '{}'", api_url.scheme()),
        });
    }

    let cleanup_interval = positive_millis(
        "CLEANUP_INTERVAL_MS",
        get("CLEANUP_INTERVAL_MS"),
        DEFAULT_CLEANUP_INTERVAL_MS,
    )?;
    let token_lifespan = positive_millis(
        "TOKEN_LIFESPAN_MS",
        get("TOKEN_LIFESPAN_MS"),
        DEFAULT_TOKEN_LIFESPAN_MS,
    )?;

    Ok(Config {
        port,
        app_id,
        installation_id,
        private_key_path,
        private_key,
        api_url,
        cleanup_interval,
        token_lifespan,
        cors_allowed_origin: get("CORS_ALLOWED_ORIGIN"),
    })
}

fn positive_millis(
    name: &'static str,
    raw: Option<String>,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    let ms = match raw {
        Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("'{}' is not a whole number of milliseconds", raw),
        })?,
        None => default_ms,
    };
    if ms == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}
