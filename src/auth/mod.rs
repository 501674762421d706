//! Authentication module for managing the dashboard session.
//!
//! This module provides:
//! - `CredentialStore`: pluggable persisted storage for the session triple
//!   (access token, refresh token, cached user profile)
//! - `RenewalCoordinator`: single-flight session-token renewal
//! - `SessionEvent`: lifecycle broadcast consumed by the hosting application
//!
//! The transport only reads credentials; the coordinator is the sole writer.

pub mod credentials;
pub mod renewal;
pub mod session;

pub use credentials::{
    CredentialStore, KeyringStore, MemoryStore, StoreError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
    USER_KEY,
};
pub use renewal::{RenewalCoordinator, SessionEnded};
pub use session::SessionEvent;
