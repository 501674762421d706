//! API client for communicating with the dashboard backend.
//!
//! One `ApiClient` fronts a single configured base endpoint. Every request
//! picks up the stored access token as a bearer credential; a 401 on a
//! first attempt is handed to the renewal coordinator and the request is
//! replayed once with the renewed token. A 401 on a replay is terminal for
//! that call.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::auth::renewal::SessionEnded;
use crate::auth::{
    session, CredentialStore, RenewalCoordinator, SessionEvent, ACCESS_TOKEN_KEY, USER_KEY,
};
use crate::models::{AuthPayload, Envelope, LoginRequest, RefreshRequest};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Matches the dashboard's tolerance for a slow backend before surfacing an error.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Relative path of the login endpoint
const LOGIN_PATH: &str = "/api/auth/login";

/// Relative path of the credential renewal endpoint
const REFRESH_PATH: &str = "/api/auth/refresh";

/// Header the tunneling proxy in front of the API requires on every call
const PROXY_BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

/// Per-call overrides layered on top of the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: header::HeaderMap,
}

/// A captured outbound call, held in memory until it succeeds or is
/// abandoned.
///
/// `retried` marks a request already replayed after a renewal; a second 401
/// on the same request is terminal rather than queueing another renewal.
#[derive(Debug, Clone)]
struct PendingRequest {
    method: Method,
    path: String,
    options: RequestOptions,
    body: Option<Value>,
    retried: bool,
}

/// Client for the dashboard API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    renewal: Arc<RenewalCoordinator>,
}

impl ApiClient {
    /// Create a new API client against the given base endpoint.
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            PROXY_BYPASS_HEADER,
            header::HeaderValue::from_static("true"),
        );

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()?;

        let renewal = Arc::new(RenewalCoordinator::new(store.clone()));

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            renewal,
        })
    }

    /// Subscribe to session lifecycle events. The host navigates to its
    /// sign-in entry point when it sees [`SessionEvent::Ended`].
    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.renewal.subscribe()
    }

    // ===== Authentication =====

    /// Authenticate and persist the issued session credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let envelope: Envelope<AuthPayload> = Self::decode(response).await?;
        let payload = envelope
            .payload
            .ok_or_else(|| ApiError::InvalidResponse("login response missing payload".into()))?;

        session::persist(self.store.as_ref(), &payload).await?;
        info!("signed in");
        Ok(payload)
    }

    /// Drop the local session. Clears every stored credential key; requests
    /// already in flight are left to fail on their own.
    pub async fn logout(&self) {
        session::clear(self.store.as_ref()).await;
        info!("signed out");
    }

    /// The cached profile of the signed-in user, if any.
    pub async fn current_user(&self) -> Result<Option<Value>, ApiError> {
        match self.store.get(USER_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // ===== Request entry points =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        self.request(Method::POST, path, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        self.request(Method::PUT, path, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope<T>, ApiError> {
        self.request_with(method, path, RequestOptions::default(), body)
            .await
    }

    /// Full request entry point with per-call query parameters and headers.
    ///
    /// A 401 on the first attempt goes through the renewal coordinator and
    /// the request is replayed with the renewed token; a 401 on the replay
    /// surfaces as [`ApiError::Unauthorized`].
    pub async fn request_with<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
        body: Option<Value>,
    ) -> Result<Envelope<T>, ApiError> {
        let mut request = PendingRequest {
            method,
            path: path.to_string(),
            options,
            body,
            retried: false,
        };

        let response = self.execute(&request).await?;
        if response.status() == StatusCode::UNAUTHORIZED && !request.retried {
            // Flag the original request before renewing so a replayed 401
            // is terminal instead of queueing another renewal.
            request.retried = true;
            debug!(path = %request.path, "authentication failure, attempting renewal");

            match self.renewal.renew(|refresh| self.exchange_refresh(refresh)).await {
                Ok(_) => {
                    let replay = self.execute(&request).await?;
                    return Self::decode(replay).await;
                }
                Err(SessionEnded) => return Err(ApiError::SessionExpired),
            }
        }

        Self::decode(response).await
    }

    // ===== Internals =====

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue one attempt of a pending request, attaching the stored access
    /// token when present.
    async fn execute(&self, request: &PendingRequest) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.endpoint(&request.path));

        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }
        if !request.options.headers.is_empty() {
            builder = builder.headers(request.options.headers.clone());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(Some(token)) => builder = builder.bearer_auth(token),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read stored access token"),
        }

        builder.send().await.map_err(ApiError::from_transport)
    }

    /// Exchange the refresh token for a new credential pair.
    ///
    /// Bypasses the 401 interception path; a failure here ends the session.
    async fn exchange_refresh(&self, refresh_token: String) -> Result<AuthPayload, ApiError> {
        let response = self
            .http
            .post(self.endpoint(REFRESH_PATH))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let envelope: Envelope<AuthPayload> = Self::decode(response).await?;
        envelope
            .payload
            .ok_or_else(|| ApiError::InvalidResponse("renewal response missing payload".into()))
    }

    /// Decode a final response: 2xx parses the envelope, anything else maps
    /// through the status taxonomy.
    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Envelope<T>, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}
