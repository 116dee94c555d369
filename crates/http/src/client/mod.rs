//! Authflow HTTP client
//!
//! Every request is built from the configured base URL, carries
//! `Authorization: Bearer <token>` when the credential store holds a token,
//! and shares one cookie jar so the backend's refresh cookie travels with it.
//! A 401 triggers one coalesced session refresh followed by exactly one retry.

pub mod credentials;
pub mod error;
pub mod singleflight;

use crate::types::TokenResponse;
use credentials::{CredentialStore, MemoryCredentials};
use error::{ApiError, ClientError};
use reqwest::{Client, ClientBuilder, Response, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use singleflight::SingleFlight;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub use reqwest::Method;

/// Path of the backend's refresh endpoint
pub const REFRESH_TOKEN_PATH: &str = "/api/v1/auth/refresh-token";

const DEFAULT_USER_AGENT: &str = concat!("authflow-client/", env!("CARGO_PKG_VERSION"));

/// Query-string parameters, already stringified
pub type Query<'a> = &'a [(&'a str, &'a str)];

type RefreshOutcome = Result<TokenResponse, Arc<ClientError>>;

/// Request payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// `application/json`
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Encode `body` as JSON
    pub fn json<T: Serialize + ?Sized>(body: &T) -> Result<Self, ClientError> {
        Ok(Self::Json(serde_json::to_value(body)?))
    }

    /// Encode the fields of `body` as form pairs, stringifying each value
    pub fn form<T: Serialize + ?Sized>(body: &T) -> Result<Self, ClientError> {
        let Value::Object(fields) = serde_json::to_value(body)? else {
            return Err(ClientError::Configuration(
                "form body must serialize to an object".into(),
            ));
        };

        let pairs = fields
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        Ok(Self::Form(pairs))
    }
}

/// Authflow API client
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    base_url: String,
    refresh_path: String,
    credentials: Arc<dyn CredentialStore>,
    refresh: SingleFlight<RefreshOutcome>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("refresh_path", &self.inner.refresh_path)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Current access token
    pub fn access_token(&self) -> Option<String> {
        self.inner.credentials.access_token()
    }

    /// Base URL + path + query string
    pub fn build_url(&self, path: &str, query: Query<'_>) -> Result<Url, ClientError> {
        let mut url = Url::parse(&format!("{}{}", self.inner.base_url, path))
            .map_err(|e| ClientError::Configuration(format!("invalid request URL: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// `GET path`
    pub async fn get(&self, path: &str, query: Query<'_>) -> Result<Option<Value>, ClientError> {
        self.send(Method::GET, path, query, RequestBody::Empty).await
    }

    /// `POST path`
    pub async fn post(
        &self,
        path: &str,
        body: RequestBody,
        query: Query<'_>,
    ) -> Result<Option<Value>, ClientError> {
        self.send(Method::POST, path, query, body).await
    }

    /// `PUT path`
    pub async fn put(
        &self,
        path: &str,
        body: RequestBody,
        query: Query<'_>,
    ) -> Result<Option<Value>, ClientError> {
        self.send(Method::PUT, path, query, body).await
    }

    /// `DELETE path`
    pub async fn delete(&self, path: &str, query: Query<'_>) -> Result<Option<Value>, ClientError> {
        self.send(Method::DELETE, path, query, RequestBody::Empty).await
    }

    /// Execute a request, refreshing the session and retrying once on 401.
    ///
    /// Resolves to `None` for 204 and for 2xx bodies that are not JSON.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: RequestBody,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.build_url(path, query)?;
        let bearer = self.access_token();
        let response = self
            .attempt(method.clone(), &url, &body, bearer.clone())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return read_response(response).await;
        }

        match self.access_token() {
            Some(current) if bearer.as_ref() != Some(&current) => {
                debug!(%method, path, "token rotated while the request was in flight, retrying");
            }
            _ => {
                debug!(%method, path, "access token rejected, refreshing session");
                self.refresh_session().await?;
            }
        }

        let retried = self
            .attempt(method, &url, &body, self.access_token())
            .await?;
        read_response(retried).await
    }

    /// Execute a request without the refresh-and-retry protocol
    pub async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: RequestBody,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.build_url(path, query)?;
        let response = self
            .attempt(method, &url, &body, self.access_token())
            .await?;
        read_response(response).await
    }

    /// Mint a new access token from the refresh cookie.
    ///
    /// Concurrent callers share a single network call and observe the same
    /// outcome. On success the token is written to the credential store,
    /// unless the store was cleared while the call was in flight, in which
    /// case the token is dropped and [`ClientError::SessionEnded`] returned.
    /// On any other failure the store is cleared.
    pub async fn refresh_session(&self) -> Result<TokenResponse, ClientError> {
        let this = self.clone();
        self.inner
            .refresh
            .run(move || async move { this.perform_refresh().await.map_err(Arc::new) })
            .await
            .map_err(ClientError::Refresh)
    }

    /// Whether a refresh call is currently outstanding
    pub async fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_in_flight().await
    }

    async fn perform_refresh(&self) -> Result<TokenResponse, ClientError> {
        let credentials = &self.inner.credentials;
        let generation = credentials.generation();

        let outcome = async {
            let url = self.build_url(&self.inner.refresh_path, &[])?;
            let response = self
                .attempt(Method::POST, &url, &RequestBody::Empty, None)
                .await?;
            TokenResponse::from_body(read_response(response).await?)
        }
        .await;

        match outcome {
            Ok(tokens) if credentials.store_if_current(tokens.access_token.clone(), generation) => {
                info!("session refreshed");
                Ok(tokens)
            }
            Ok(_) => {
                debug!("session ended during refresh, discarding new token");
                Err(ClientError::SessionEnded)
            }
            Err(err) => {
                credentials.clear();
                warn!(error = %err, "session refresh failed, credentials cleared");
                Err(err)
            }
        }
    }

    async fn attempt(
        &self,
        method: Method,
        url: &Url,
        body: &RequestBody,
        bearer: Option<String>,
    ) -> Result<Response, ClientError> {
        let mut request = self.inner.client.request(method.clone(), url.clone());

        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Form(pairs) => request.form(pairs),
        };

        let response = request.send().await?;
        debug!(%method, url = %url.path(), status = response.status().as_u16(), "response received");
        Ok(response)
    }
}

async fn read_response(response: Response) -> Result<Option<Value>, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let body = serde_json::from_slice::<Value>(&bytes).ok();

    if !status.is_success() {
        return Err(ApiError::from_response(status, body).into());
    }
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    Ok(body)
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    refresh_path: Option<String>,
    credentials: Option<Arc<dyn CredentialStore>>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Override the refresh endpoint path
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Share a credential store with the session owner
    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url}: {e}")))?;

        let mut client_builder = ClientBuilder::new().cookie_store(true);

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        );

        let client = client_builder.build()?;

        Ok(ApiClient {
            inner: Arc::new(Inner {
                client,
                base_url,
                refresh_path: self
                    .refresh_path
                    .unwrap_or_else(|| REFRESH_TOKEN_PATH.to_string()),
                credentials: self
                    .credentials
                    .unwrap_or_else(|| Arc::new(MemoryCredentials::new())),
                refresh: SingleFlight::new(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_joins_base_path_and_query() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        let url = client
            .build_url("/api/v1/items", &[("page", "2"), ("q", "a b")])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/items?page=2&q=a+b");
    }

    #[test]
    fn build_url_without_query_has_no_question_mark() {
        let client = ApiClient::new("http://localhost:8000").unwrap();
        let url = client.build_url("/api/v1/users/me", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/users/me");
    }

    #[test]
    fn builder_rejects_unparseable_base_url() {
        let result = ApiClient::builder().base_url("not a url").build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn form_body_stringifies_values() {
        #[derive(Serialize)]
        struct Form {
            username: &'static str,
            remember: bool,
            attempts: u8,
        }

        let body = RequestBody::form(&Form {
            username: "a@b.com",
            remember: true,
            attempts: 3,
        })
        .unwrap();

        let RequestBody::Form(mut pairs) = body else {
            panic!("expected a form body");
        };
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("attempts".to_string(), "3".to_string()),
                ("remember".to_string(), "true".to_string()),
                ("username".to_string(), "a@b.com".to_string()),
            ]
        );
    }

    #[test]
    fn form_body_requires_an_object() {
        assert!(matches!(
            RequestBody::form(&["a", "b"]),
            Err(ClientError::Configuration(_))
        ));
    }
}
