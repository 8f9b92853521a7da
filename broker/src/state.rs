//! # Server State
//!
//! Holds the shared application state for the relay broker: the live agent
//! registry and the credential service used to mint and validate bearer
//! tokens. Registry concurrency is handled by [`tunnel_core::registry`]
//! itself (a single read/write lock over the backing map); this module just
//! wires it into axum's `State` extractor.

use std::sync::Arc;

use tunnel_core::auth::CredentialService;
use tunnel_core::registry::Registry;

/// Shared application state, cloned and passed to each request handler.
#[derive(Clone)]
pub struct AppState {
    /// Registry of currently connected agents, keyed by agent identifier.
    pub registry: Arc<Registry>,

    /// Issues and validates operator bearer tokens.
    pub auth: Arc<CredentialService>,
}

impl AppState {
    /// Creates a new empty application state bound to the given signing
    /// secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            auth: Arc::new(CredentialService::new(secret)),
        }
    }
}
