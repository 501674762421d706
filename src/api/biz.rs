//! Tenant-scoped resource access with a system-level fallback.
//!
//! Newer backend deployments expose resources under a per-business path;
//! older ones only under the tenant-agnostic system path. `BizApi` offers
//! one logical operation over both: the scoped path is tried first, and the
//! call is retried once against the caller-supplied system path when the
//! scoped endpoint does not implement the resource (404, 405, or 501).
//! Any other failure propagates unchanged, and a success short-circuits.
//!
//! Authentication renewal happens underneath, inside `ApiClient`, so a 401
//! is recovered before this layer ever sees a final status.

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::models::Envelope;

use super::client::RequestOptions;
use super::{ApiClient, ApiError};

/// Scoped-path prefix; the business id and resource path are appended.
const BIZ_PREFIX: &str = "/api/biz";

/// Resolver for the two-tier business/system endpoint topology.
#[derive(Clone)]
pub struct BizApi {
    client: ApiClient,
    biz_id: String,
}

impl BizApi {
    pub fn new(client: ApiClient, biz_id: impl Into<String>) -> Self {
        Self {
            client,
            biz_id: biz_id.into(),
        }
    }

    /// The tenant-scoped form of a resource path.
    fn scoped_path(&self, resource: &str) -> String {
        format!("{}/{}{}", BIZ_PREFIX, self.biz_id, resource)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        system_path: &str,
    ) -> Result<Envelope<T>, ApiError> {
        self.send(Method::GET, resource, system_path, RequestOptions::default(), None)
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        resource: &str,
        system_path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        self.send(
            Method::POST,
            resource,
            system_path,
            RequestOptions::default(),
            Some(serde_json::to_value(body)?),
        )
        .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        resource: &str,
        system_path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        self.send(
            Method::PUT,
            resource,
            system_path,
            RequestOptions::default(),
            Some(serde_json::to_value(body)?),
        )
        .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        resource: &str,
        system_path: &str,
    ) -> Result<Envelope<T>, ApiError> {
        self.send(
            Method::DELETE,
            resource,
            system_path,
            RequestOptions::default(),
            None,
        )
        .await
    }

    /// Scoped attempt first; an unimplemented status retries the system
    /// path with the identical body and options.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        resource: &str,
        system_path: &str,
        options: RequestOptions,
        body: Option<Value>,
    ) -> Result<Envelope<T>, ApiError> {
        let scoped = self.scoped_path(resource);
        match self
            .client
            .request_with(method.clone(), &scoped, options.clone(), body.clone())
            .await
        {
            Err(e) if e.is_unimplemented() => {
                debug!(scoped = %scoped, fallback = %system_path, "scoped endpoint unimplemented, falling back");
                self.client
                    .request_with(method, system_path, options, body)
                    .await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::MemoryStore;

    #[test]
    fn test_scoped_path_embeds_business_id() {
        let client =
            ApiClient::new("https://api.example.com", Arc::new(MemoryStore::new())).unwrap();
        let biz = BizApi::new(client, "biz-42");
        assert_eq!(biz.scoped_path("/invoices"), "/api/biz/biz-42/invoices");
    }
}
