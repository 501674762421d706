//! Wire types shared by every API call.
//!
//! The dashboard backend wraps every response in a uniform envelope and the
//! transport passes business payloads through opaquely, so the only models
//! this crate owns are:
//!
//! - `Envelope`: the generic response wrapper
//! - `AuthPayload`, `LoginRequest`, `RefreshRequest`: the authentication
//!   endpoint bodies

pub mod auth;
pub mod envelope;

pub use auth::{AuthPayload, LoginRequest, RefreshRequest};
pub use envelope::Envelope;
