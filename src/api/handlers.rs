use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::github::{IdentityProvider, RateLimitInfo};
use crate::models::credential::{CredentialRecord, TokenView};
use crate::AppState;

pub const DEFAULT_OWNER: &str = "default";

// ── Response DTOs ────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub stored_tokens: usize,
    pub token_lifespan_ms: i64,
    pub token_lifespan_minutes: f64,
    pub version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenResponse {
    pub success: bool,
    pub client_id: String,
    pub token_id: u64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Always false: every request gets a freshly minted token.
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Vec<String>>,
}

impl From<CredentialRecord> for IssueTokenResponse {
    fn from(record: CredentialRecord) -> Self {
        Self {
            success: true,
            client_id: record.owner,
            token_id: record.id,
            token: record.secret,
            expires_at: record.expires_at,
            created_at: record.issued_at,
            cached: false,
            repositories: record.scope,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTokensResponse {
    pub success: bool,
    pub total_tokens: usize,
    pub tokens: Vec<TokenView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponse {
    pub success: bool,
    pub removed_count: usize,
    pub revoked_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResponse {
    pub success: bool,
    pub rate_limit: RateLimitInfo,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /health — liveness plus a summary of what is tracked
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let lifespan_ms = state.lifecycle.lifespan().num_milliseconds();
    Json(HealthResponse {
        status: "healthy",
        stored_tokens: state.lifecycle.registry().size().await,
        token_lifespan_ms: lifespan_ms,
        token_lifespan_minutes: lifespan_ms as f64 / 60_000.0,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /token/:owner? — mint an unrestricted token
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    owner: Option<Path<String>>,
) -> Result<Json<IssueTokenResponse>, AppError> {
    let owner = owner.map(|Path(o)| o).unwrap_or_else(|| DEFAULT_OWNER.to_string());
    let record = state.lifecycle.issue(&owner, None).await?;
    Ok(Json(record.into()))
}

/// POST /token/:owner? — mint a token, optionally limited to `repositories`
pub async fn issue_scoped_token(
    State(state): State<Arc<AppState>>,
    owner: Option<Path<String>>,
    body: Bytes,
) -> Result<Json<IssueTokenResponse>, AppError> {
    let owner = owner.map(|Path(o)| o).unwrap_or_else(|| DEFAULT_OWNER.to_string());
    // Validate before anything goes upstream.
    let scope = parse_repositories(&body)?;
    let record = state.lifecycle.issue(&owner, scope).await?;
    Ok(Json(record.into()))
}

/// GET /tokens — every tracked token, stale ones included
pub async fn list_tokens(State(state): State<Arc<AppState>>) -> Json<ListTokensResponse> {
    let tokens = state.lifecycle.list().await;
    Json(ListTokensResponse {
        success: true,
        total_tokens: tokens.len(),
        tokens,
    })
}

/// DELETE /tokens/:identifier? — by token id, else by owner, else everything
pub async fn delete_tokens(
    State(state): State<Arc<AppState>>,
    identifier: Option<Path<String>>,
) -> Json<Value> {
    let Some(Path(identifier)) = identifier else {
        let outcome = state.lifecycle.clear_all().await;
        return Json(json!({
            "success": true,
            "message": format!("Deleted all {} tokens", outcome.count),
            "deletedCount": outcome.count,
            "revokedCount": outcome.revoked_count,
        }));
    };

    if let Ok(id) = identifier.parse::<u64>() {
        let outcome = state.lifecycle.delete_by_id(id).await;
        if outcome.found {
            return Json(json!({
                "success": true,
                "message": format!("Token {} deleted", id),
                "tokenId": id,
                "revoked": outcome.revoked,
            }));
        }
    }

    let outcome = state.lifecycle.delete_by_owner(&identifier).await;
    if outcome.count == 0 {
        return Json(json!({
            "success": false,
            "message": format!("No tokens found for identifier '{}'", identifier),
        }));
    }

    Json(json!({
        "success": true,
        "message": format!("Deleted {} tokens for client '{}'", outcome.count, identifier),
        "clientId": identifier,
        "deletedCount": outcome.count,
        "revokedCount": outcome.revoked_count,
    }))
}

/// POST /sweep — run the expiry sweep now instead of waiting for the timer
pub async fn sweep_now(State(state): State<Arc<AppState>>) -> Json<SweepResponse> {
    let outcome = state.lifecycle.sweep().await;
    Json(SweepResponse {
        success: true,
        removed_count: outcome.removed_count,
        revoked_count: outcome.revoked_count,
    })
}

/// GET /rate-limit — core API rate-limit bucket of the installation
pub async fn rate_limit(State(state): State<Arc<AppState>>) -> Response {
    match state.provider.rate_limit_snapshot().await {
        Some(info) => Json(RateLimitResponse {
            success: true,
            rate_limit: info,
        })
        .into_response(),
        None => Json(json!({
            "success": false,
            "message": "rate limit information is unavailable",
        }))
        .into_response(),
    }
}

/// Extract the optional `repositories` allow-list from a request body.
/// An empty body, a missing key, or `null` all mean unrestricted.
pub fn parse_repositories(body: &[u8]) -> Result<Option<Vec<String>>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("request body is not valid JSON: {}", e)))?;

    match value.get("repositories") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    AppError::Validation("repositories must be an array of strings".into())
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(AppError::Validation(
            "repositories must be an array of strings".into(),
        )),
    }
}
