// Credential model — the unit held by the in-memory registry, plus the
// derived views and outcome types the lifecycle operations report.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Registry-assigned identifier. Monotonic, never recycled.
pub type CredentialId = u64;

/// Optional ordered allow-list of repository names a credential is limited to.
/// `None` means unrestricted.
pub type ScopeRestriction = Option<Vec<String>>;

/// An issued installation token tracked by the broker.
///
/// Records are immutable once stored; the registry only inserts and removes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: CredentialId,
    pub owner: String,
    pub secret: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub scope: ScopeRestriction,
}

impl CredentialRecord {
    /// A record is stale once its local deadline has passed. Stale records stay
    /// in the registry until a sweep or an explicit delete removes them.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Time left before the record goes stale, clamped at zero.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Everything the registry needs to complete a record. The registry assigns
/// `id` and `issued_at`; `expires_at` is `issued_at + valid_for`.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub owner: String,
    pub secret: String,
    pub valid_for: Duration,
    pub scope: ScopeRestriction,
}

/// Read-only projection returned by `TokenLifecycle::list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenView {
    #[serde(rename = "tokenId")]
    pub id: CredentialId,
    #[serde(rename = "clientId")]
    pub owner: String,
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "createdAt")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "isExpired")]
    pub is_stale: bool,
    /// Milliseconds until the record goes stale; zero once it has.
    #[serde(rename = "timeUntilExpiry")]
    pub time_remaining_ms: i64,
}

impl TokenView {
    pub fn from_record(record: &CredentialRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            owner: record.owner.clone(),
            expires_at: record.expires_at,
            issued_at: record.issued_at,
            is_stale: record.is_expired_at(now),
            time_remaining_ms: record.time_remaining(now).num_milliseconds(),
        }
    }
}

/// Result of deleting a single credential by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub found: bool,
    pub revoked: bool,
}

/// Result of a bulk removal (by owner, clear-all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkDeleteOutcome {
    pub count: usize,
    pub revoked_count: usize,
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepOutcome {
    pub removed_count: usize,
    pub revoked_count: usize,
}
