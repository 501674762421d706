//! REST API client module for the dashboard backend.
//!
//! This module provides `ApiClient` for authenticated calls against the
//! configured base endpoint (with transparent session renewal and replay)
//! and `BizApi`, which layers the tenant-scoped/system endpoint fallback
//! on top of it.
//!
//! The API uses bearer token authentication; tokens are renewed through
//! the `/api/auth/refresh` endpoint when the backend rejects them.

pub mod biz;
pub mod client;
pub mod error;

pub use biz::BizApi;
pub use client::{ApiClient, RequestOptions};
pub use error::ApiError;
