#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use token_broker::clock::{Clock, ManualClock};
use token_broker::errors::ExchangeError;
use token_broker::github::{IdentityProvider, IssuedToken, RateLimitInfo};
use token_broker::lifecycle::TokenLifecycle;
use token_broker::store::registry::CredentialRegistry;

pub const LIFESPAN_MS: u64 = 300_000;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

/// In-process stand-in for GitHub. Hands out `ghs_fake_<n>` tokens that
/// claim GitHub's usual one-hour expiry.
pub struct FakeProvider {
    clock: Arc<ManualClock>,
    issued: AtomicUsize,
    pub revoke_calls: AtomicUsize,
    pub revoke_ok: AtomicBool,
    pub exchange_ok: AtomicBool,
    pub provider_expiry: Mutex<Option<chrono::Duration>>,
    pub last_scope: Mutex<Option<Vec<String>>>,
    pub revoked: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            issued: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            revoke_ok: AtomicBool::new(true),
            exchange_ok: AtomicBool::new(true),
            provider_expiry: Mutex::new(Some(chrono::Duration::hours(1))),
            last_scope: Mutex::new(None),
            revoked: Mutex::new(Vec::new()),
        }
    }

    pub fn exchanges(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn revokes(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn exchange_for_credential(
        &self,
        scope: Option<&[String]>,
    ) -> Result<IssuedToken, ExchangeError> {
        if !self.exchange_ok.load(Ordering::SeqCst) {
            return Err(ExchangeError::Status {
                status: 401,
                body: r#"{"message":"Bad credentials"}"#.into(),
            });
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_scope.lock().unwrap() = scope.map(|s| s.to_vec());
        let expiry = *self.provider_expiry.lock().unwrap();
        Ok(IssuedToken {
            secret: format!("ghs_fake_{}", n),
            provider_expiry: expiry.map(|d| self.clock.now() + d),
            repository_selection: Some(if scope.is_some() { "selected" } else { "all" }.into()),
        })
    }

    async fn revoke(&self, secret: &str) -> bool {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        let ok = self.revoke_ok.load(Ordering::SeqCst);
        if ok {
            self.revoked.lock().unwrap().push(secret.to_string());
        }
        ok
    }

    async fn rate_limit_snapshot(&self) -> Option<RateLimitInfo> {
        Some(RateLimitInfo {
            limit: 5000,
            remaining: 4990,
            reset: 1_780_000_000,
            used: 10,
        })
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub provider: Arc<FakeProvider>,
    pub registry: Arc<CredentialRegistry>,
    pub lifecycle: Arc<TokenLifecycle>,
}

pub fn harness() -> Harness {
    harness_with_lifespan(LIFESPAN_MS)
}

pub fn harness_with_lifespan(lifespan_ms: u64) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let provider = Arc::new(FakeProvider::new(clock.clone()));
    let registry = Arc::new(CredentialRegistry::new());
    let lifecycle = Arc::new(
        TokenLifecycle::new(
            registry.clone(),
            provider.clone(),
            clock.clone(),
            Duration::from_millis(lifespan_ms),
        )
        .unwrap(),
    );
    Harness {
        clock,
        provider,
        registry,
        lifecycle,
    }
}
