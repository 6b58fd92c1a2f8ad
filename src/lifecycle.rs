//! Lifecycle Coordinator — issues, lists, deletes and sweeps installation tokens.
//!
//! Per-token state is implicit in the registry plus the expiry predicate:
//! `ISSUED → STALE (expires_at passed, still stored) → REMOVED`.
//!
//! Removal always follows the same shape: attempt revocation upstream, record
//! whether it worked, then remove locally no matter what. The registry is the
//! authority on what is tracked; GitHub catches up eventually.

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::errors::{ConfigError, ExchangeError};
use crate::github::IdentityProvider;
use crate::models::credential::{
    BulkDeleteOutcome, CredentialId, CredentialRecord, DeleteOutcome, NewCredential,
    SweepOutcome, TokenView,
};
use crate::store::registry::CredentialRegistry;

pub struct TokenLifecycle {
    registry: Arc<CredentialRegistry>,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    lifespan: Duration,
}

impl TokenLifecycle {
    pub fn new(
        registry: Arc<CredentialRegistry>,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        lifespan: std::time::Duration,
    ) -> Result<Self, ConfigError> {
        let lifespan = Duration::from_std(lifespan)
            .ok()
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| ConfigError::Invalid {
                name: "TOKEN_LIFESPAN_MS",
                reason: "must be a positive duration".into(),
            })?;
        Ok(Self {
            registry,
            provider,
            clock,
            lifespan,
        })
    }

    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    pub fn lifespan(&self) -> Duration {
        self.lifespan
    }

    /// Always performs a fresh exchange; live tokens for the same owner are
    /// never reused.
    pub async fn issue(
        &self,
        owner: &str,
        scope: Option<Vec<String>>,
    ) -> Result<CredentialRecord, ExchangeError> {
        let issued = self
            .provider
            .exchange_for_credential(scope.as_deref())
            .await?;

        let now = self.clock.now();
        // The local lifespan always binds; GitHub's expiry is only reported.
        if let Some(provider_expiry) = issued.provider_expiry {
            if provider_expiry < now + self.lifespan {
                warn!(
                    owner,
                    provider_expiry = %provider_expiry,
                    "provider expiry is sooner than the configured lifespan"
                );
            }
        }

        let record = self
            .registry
            .insert(
                NewCredential {
                    owner: owner.to_string(),
                    secret: issued.secret,
                    valid_for: self.lifespan,
                    scope,
                },
                now,
            )
            .await;

        info!(
            owner,
            token_id = record.id,
            expires_at = %record.expires_at,
            provider_expiry = ?issued.provider_expiry,
            repository_selection = ?issued.repository_selection,
            scoped = record.scope.is_some(),
            "issued installation token"
        );
        Ok(record)
    }

    pub async fn list(&self) -> Vec<TokenView> {
        let now = self.clock.now();
        self.registry
            .list_all()
            .await
            .iter()
            .map(|r| TokenView::from_record(r, now))
            .collect()
    }

    /// Revoke and remove one token. Revocation is attempted even when the
    /// token is already stale.
    pub async fn delete_by_id(&self, id: CredentialId) -> DeleteOutcome {
        let Some(record) = self.registry.get(id).await else {
            return DeleteOutcome::default();
        };

        let revoked = self.provider.revoke(&record.secret).await;
        if !self.registry.delete_by_id(id).await {
            // A concurrent sweep or delete got there first.
            debug!(token_id = id, "token already removed");
        }

        info!(token_id = id, owner = %record.owner, revoked, "deleted token");
        DeleteOutcome {
            found: true,
            revoked,
        }
    }

    /// Revoke and remove every token held by `owner`. Zero matches is a
    /// normal outcome.
    pub async fn delete_by_owner(&self, owner: &str) -> BulkDeleteOutcome {
        let records = self.registry.list_by_owner(owner).await;
        let outcome = self.revoke_and_remove(records).await;
        info!(
            owner,
            count = outcome.count,
            revoked_count = outcome.revoked_count,
            "deleted tokens for owner"
        );
        outcome
    }

    pub async fn clear_all(&self) -> BulkDeleteOutcome {
        let records = self.registry.list_all().await;
        let outcome = self.revoke_and_remove(records).await;
        info!(
            count = outcome.count,
            revoked_count = outcome.revoked_count,
            "cleared all tokens"
        );
        outcome
    }

    /// Revoke and remove every stale token. Calling it twice in a row is a
    /// no-op the second time.
    pub async fn sweep(&self) -> SweepOutcome {
        let expired = self.registry.expired_snapshot(self.clock.now()).await;
        if expired.is_empty() {
            debug!("sweep: nothing expired");
            return SweepOutcome::default();
        }

        let outcome = self.revoke_and_remove(expired).await;
        info!(
            removed_count = outcome.count,
            revoked_count = outcome.revoked_count,
            "swept expired tokens"
        );
        SweepOutcome {
            removed_count: outcome.count,
            revoked_count: outcome.revoked_count,
        }
    }

    /// Revocations run concurrently; the local removal happens afterwards in
    /// one registry step and does not depend on any revocation outcome.
    /// Counts only cover records this call actually removed.
    async fn revoke_and_remove(&self, records: Vec<CredentialRecord>) -> BulkDeleteOutcome {
        if records.is_empty() {
            return BulkDeleteOutcome::default();
        }

        let results = join_all(records.iter().map(|r| async move {
            let revoked = self.provider.revoke(&r.secret).await;
            if !revoked {
                warn!(token_id = r.id, owner = %r.owner, "revocation failed, removing locally anyway");
            }
            (r.id, revoked)
        }))
        .await;

        let ids: Vec<CredentialId> = results.iter().map(|(id, _)| *id).collect();
        let removed = self.registry.delete_many(&ids).await;

        let revoked_count = removed
            .iter()
            .filter(|r| results.iter().any(|(id, ok)| *id == r.id && *ok))
            .count();

        BulkDeleteOutcome {
            count: removed.len(),
            revoked_count,
        }
    }
}
