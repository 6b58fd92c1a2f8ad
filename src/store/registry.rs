//! Credential Registry — in-memory store of issued installation tokens.
//!
//! The registry is policy-free: it knows nothing about revocation, the
//! identity provider, or when to sweep. Every method is either a pure read or
//! a single atomic insert/remove under one lock, so readers never observe a
//! half-applied mutation (an id without a record, a partially cleared map).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::credential::{CredentialId, CredentialRecord, NewCredential};

struct Inner {
    /// Next id to hand out. Only ever increases, so ids are never reused.
    next_id: CredentialId,
    /// Keyed by id; `BTreeMap` keeps enumeration in insertion order.
    records: BTreeMap<CredentialId, CredentialRecord>,
}

/// In-memory registry of issued credentials.
pub struct CredentialRegistry {
    inner: RwLock<Inner>,
}

impl Default for CredentialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                records: BTreeMap::new(),
            }),
        }
    }

    /// Complete and store a record. Assigns a fresh id and `issued_at = now`.
    pub async fn insert(&self, new: NewCredential, now: DateTime<Utc>) -> CredentialRecord {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let record = CredentialRecord {
            id,
            owner: new.owner,
            secret: new.secret,
            issued_at: now,
            expires_at: now + new.valid_for,
            scope: new.scope,
        };
        inner.records.insert(id, record.clone());
        record
    }

    pub async fn get(&self, id: CredentialId) -> Option<CredentialRecord> {
        self.inner.read().await.records.get(&id).cloned()
    }

    pub async fn has(&self, id: CredentialId) -> bool {
        self.inner.read().await.records.contains_key(&id)
    }

    pub async fn size(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn list_all(&self) -> Vec<CredentialRecord> {
        self.inner.read().await.records.values().cloned().collect()
    }

    pub async fn list_by_owner(&self, owner: &str) -> Vec<CredentialRecord> {
        self.inner
            .read()
            .await
            .records
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect()
    }

    /// Records whose deadline is strictly before `now`. Does not remove anything.
    pub async fn expired_snapshot(&self, now: DateTime<Utc>) -> Vec<CredentialRecord> {
        self.inner
            .read()
            .await
            .records
            .values()
            .filter(|r| r.expires_at < now)
            .cloned()
            .collect()
    }

    /// Returns true if a record was removed.
    pub async fn delete_by_id(&self, id: CredentialId) -> bool {
        self.inner.write().await.records.remove(&id).is_some()
    }

    /// Remove every record owned by `owner`; returns what was removed.
    pub async fn delete_by_owner(&self, owner: &str) -> Vec<CredentialRecord> {
        let mut inner = self.inner.write().await;
        let ids: Vec<CredentialId> = inner
            .records
            .values()
            .filter(|r| r.owner == owner)
            .map(|r| r.id)
            .collect();
        ids.iter()
            .filter_map(|id| inner.records.remove(id))
            .collect()
    }

    /// Remove the given ids in one step. Ids that are already gone are skipped,
    /// so only records actually removed by this call are returned.
    pub async fn delete_many(&self, ids: &[CredentialId]) -> Vec<CredentialRecord> {
        let mut inner = self.inner.write().await;
        ids.iter()
            .filter_map(|id| inner.records.remove(id))
            .collect()
    }

    /// Remove everything; returns the removed records.
    pub async fn clear(&self) -> Vec<CredentialRecord> {
        let mut inner = self.inner.write().await;
        std::mem::take(&mut inner.records).into_values().collect()
    }
}
