//! Token Broker — issues short-lived GitHub App installation tokens to many
//! clients and tracks them until they are revoked or swept.
//!
//! The binary in `main.rs` wires these modules together; integration tests in
//! `tests/` drive them directly.

use std::sync::Arc;

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod github;
pub mod jobs;
pub mod lifecycle;
pub mod models;
pub mod store;

use github::IdentityProvider;
use lifecycle::TokenLifecycle;

/// Shared application state passed to handlers.
pub struct AppState {
    pub lifecycle: Arc<TokenLifecycle>,
    pub provider: Arc<dyn IdentityProvider>,
}
