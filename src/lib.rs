//! tilldesk core - client library for the tilldesk point-of-sale
//! administration dashboard.
//!
//! This crate is the piece of the dashboard that talks to the backend: an
//! authenticated REST transport with automatic session-token renewal and
//! request replay, a pluggable credential store, and a tenant-scoped
//! endpoint resolver with a system-level fallback. Rendering and navigation
//! live in the hosting application; it consumes [`ApiClient`] results and
//! subscribes to [`SessionEvent`] to know when the session is gone.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, BizApi, RequestOptions};
pub use auth::{CredentialStore, KeyringStore, MemoryStore, RenewalCoordinator, SessionEvent};
pub use config::Config;
pub use models::{AuthPayload, Envelope};
