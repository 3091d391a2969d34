//! The session state machine.
//!
//! A [`Session`] owns one set of credentials, authenticates lazily against
//! its [`AuthEndpoint`], caches the token and the three service URLs the
//! endpoint hands back, and signs every outbound call with the token.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::error::truncate_body;
use crate::api::headers::{
    X_AUTH_KEY, X_AUTH_TOKEN, X_AUTH_USER, X_CDN_MANAGEMENT_URL, X_SERVER_MANAGEMENT_URL,
    X_STORAGE_URL,
};
use crate::api::{
    Error, HttpRequest, HttpResponse, LastError, ReqwestTransport, Result, Transport,
    TransportError,
};

use super::endpoint::AuthEndpoint;
use super::store::SessionData;

// ============================================================================
// Constants
// ============================================================================

const AUTH_FAILED_MESSAGE: &str =
    "Authentication failed, you need a valid token to use the Rackspace API";

/// Query parameter selecting the response serialization
const FORMAT_PARAM: &str = "format";

/// Default value of the `format` query parameter
const API_FORMAT: &str = "json";

/// Content type applied to request bodies unless the caller sets one
const JSON_CONTENT_TYPE: &str = "application/json";

/// Token and service URLs from one successful authentication exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub token: String,
    pub storage_url: String,
    pub cdn_url: String,
    pub management_url: String,
}

impl AuthInfo {
    /// Read all four values from a 204 authentication response.
    /// A missing header fails the whole exchange.
    fn from_response(response: &HttpResponse) -> std::result::Result<Self, TransportError> {
        let field = |name: HeaderName| {
            response
                .header(&name)
                .map(str::to_string)
                .ok_or_else(|| TransportError::MalformedResponse(format!("missing {} header", name)))
        };

        Ok(Self {
            token: field(X_AUTH_TOKEN)?,
            storage_url: field(X_STORAGE_URL)?,
            cdn_url: field(X_CDN_MANAGEMENT_URL)?,
            management_url: field(X_SERVER_MANAGEMENT_URL)?,
        })
    }
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("token", &"[REDACTED]")
            .field("storage_url", &self.storage_url)
            .field("cdn_url", &self.cdn_url)
            .field("management_url", &self.management_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct AuthState {
    info: AuthInfo,
    obtained_at: DateTime<Utc>,
}

/// Extra headers, query parameters and body for [`Session::call`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    headers: HeaderMap,
    query: BTreeMap<String, String>,
    body: Option<Vec<u8>>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Builder for [`Session`]. Validation happens in [`build`](Self::build).
pub struct SessionBuilder {
    user: String,
    key: String,
    auth_url: String,
    transport: Option<Box<dyn Transport>>,
}

impl SessionBuilder {
    fn new(user: String, key: String) -> Self {
        Self {
            user,
            key,
            auth_url: AuthEndpoint::default().url().to_string(),
            transport: None,
        }
    }

    /// Authentication endpoint URL; must be one of the known endpoints.
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    pub fn auth_endpoint(mut self, endpoint: AuthEndpoint) -> Self {
        self.auth_url = endpoint.url().to_string();
        self
    }

    /// Replace the default reqwest transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Validate the credentials and endpoint. Performs no network I/O.
    pub fn build(self) -> Result<Session> {
        if self.user.is_empty() {
            return Err(Error::InvalidArgument("The user cannot be empty".to_string()));
        }
        if self.key.is_empty() {
            return Err(Error::InvalidArgument("The key cannot be empty".to_string()));
        }
        let auth_endpoint = AuthEndpoint::from_url(&self.auth_url).ok_or_else(|| {
            Error::InvalidArgument("The authentication URL should be valid".to_string())
        })?;
        if HeaderValue::from_str(&self.user).is_err() {
            return Err(Error::InvalidArgument(
                "The user contains characters not allowed in a header".to_string(),
            ));
        }
        if HeaderValue::from_str(&self.key).is_err() {
            return Err(Error::InvalidArgument(
                "The key contains characters not allowed in a header".to_string(),
            ));
        }

        let transport: Box<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Box::new(ReqwestTransport::new()?),
        };

        debug!(user = %self.user, auth_url = auth_endpoint.url(), "Session created");

        Ok(Session {
            user: self.user,
            key: self.key,
            auth_endpoint,
            auth: None,
            last_error: None,
            transport,
        })
    }
}

/// Credentials, cached authentication and error state for one account.
///
/// Accessors that need the token or a service URL authenticate on first use:
/// `token`, `storage_url`, `cdn_url` and `management_url` may each issue the
/// authentication request. Use [`ensure_authenticated`](Self::ensure_authenticated)
/// to do it up front.
///
/// A failed authentication is reported differently depending on the
/// accessor: `storage_url` and `cdn_url` return `Ok(None)`, while `token` and
/// `management_url` return [`Error::Runtime`]. Callers relying on the former
/// must check for `None`.
///
/// Mutating operations take `&mut self` and the session does no internal
/// locking. To share one across tasks wrap it in a mutex, or give each
/// worker its own session.
pub struct Session {
    user: String,
    key: String,
    auth_endpoint: AuthEndpoint,
    auth: Option<AuthState>,
    last_error: Option<LastError>,
    transport: Box<dyn Transport>,
}

impl Session {
    /// Session against the US endpoint using the default transport.
    pub fn new(user: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        Self::builder(user, key).build()
    }

    pub fn builder(user: impl Into<String>, key: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(user.into(), key.into())
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn auth_url(&self) -> &'static str {
        self.auth_endpoint.url()
    }

    pub fn auth_endpoint(&self) -> AuthEndpoint {
        self.auth_endpoint
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn set_transport(&mut self, transport: impl Transport + 'static) {
        self.transport = Box::new(transport);
    }

    /// Cached authentication, without triggering a request
    pub fn auth_info(&self) -> Option<&AuthInfo> {
        self.auth.as_ref().map(|state| &state.info)
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    // ===== Lazy accessors =====

    /// Storage URL, authenticating first if needed.
    /// Returns `Ok(None)` when authentication fails.
    ///
    /// Authentication runs only when nothing is cached. If the endpoint
    /// answered 204 with an empty header, the empty string is cached and
    /// returned as `Some("")` without authenticating again.
    pub async fn storage_url(&mut self) -> Result<Option<String>> {
        if self.auth.is_none() && !self.authenticate().await? {
            return Ok(None);
        }
        Ok(self.auth_info().map(|info| info.storage_url.clone()))
    }

    /// CDN management URL, authenticating first if needed.
    /// Returns `Ok(None)` when authentication fails. An empty header from a
    /// successful exchange is cached like in [`storage_url`](Self::storage_url).
    pub async fn cdn_url(&mut self) -> Result<Option<String>> {
        if self.auth.is_none() && !self.authenticate().await? {
            return Ok(None);
        }
        Ok(self.auth_info().map(|info| info.cdn_url.clone()))
    }

    /// Server management URL, authenticating first if needed.
    /// Fails with [`Error::Runtime`] when authentication fails.
    pub async fn management_url(&mut self) -> Result<String> {
        Ok(self.require_auth().await?.management_url.clone())
    }

    /// Auth token, authenticating first if needed.
    /// Fails with [`Error::Runtime`] when authentication fails.
    pub async fn token(&mut self) -> Result<String> {
        Ok(self.require_auth().await?.token.clone())
    }

    /// Authenticate unless a token is already cached.
    pub async fn ensure_authenticated(&mut self) -> Result<()> {
        self.require_auth().await.map(|_| ())
    }

    async fn require_auth(&mut self) -> Result<&AuthInfo> {
        if self.auth.is_none() && !self.authenticate().await? {
            return Err(Error::Runtime(AUTH_FAILED_MESSAGE.to_string()));
        }
        self.auth_info()
            .ok_or_else(|| Error::Runtime(AUTH_FAILED_MESSAGE.to_string()))
    }

    // ===== Authentication =====

    /// Exchange the credentials for a token and service URLs.
    ///
    /// Returns `Ok(true)` on a 204 response, after replacing the cached
    /// token and URLs. Any other status returns `Ok(false)` and records the
    /// body and status as the last error, leaving cached values untouched.
    /// Transport failures, and a 204 missing one of the expected headers,
    /// are returned as [`Error::Transport`].
    pub async fn authenticate(&mut self) -> Result<bool> {
        let mut headers = HeaderMap::new();
        headers.insert(X_AUTH_USER, header_value(&self.user)?);
        headers.insert(X_AUTH_KEY, header_value(&self.key)?);

        let url = self.auth_endpoint.versioned_url();
        let response = self
            .send(url, Method::GET, headers, BTreeMap::new(), None)
            .await?;

        if response.status == StatusCode::NO_CONTENT {
            let info = AuthInfo::from_response(&response)?;
            info!(
                user = %self.user,
                storage_url = %info.storage_url,
                management_url = %info.management_url,
                "Authenticated"
            );
            self.auth = Some(AuthState {
                info,
                obtained_at: Utc::now(),
            });
            return Ok(true);
        }

        self.record_failure(&response);
        Ok(false)
    }

    /// Drop the cached token and URLs; the next access re-authenticates.
    pub fn invalidate(&mut self) {
        if self.auth.take().is_some() {
            debug!(user = %self.user, "Session invalidated");
        }
    }

    // ===== Authenticated calls =====

    /// Issue a request signed with the session token.
    ///
    /// The token is added as `X-Auth-Token` (authenticating first if needed)
    /// unless `options` carries an `X-Auth-User` header. `format=json` is
    /// added unless `options` sets a non-empty `format`, and a non-empty body
    /// gets `Content-Type: application/json` unless one is set. The last
    /// error is cleared before sending.
    ///
    /// The raw response is returned whatever its status. Callers decide what
    /// counts as failure and may record it with
    /// [`record_failure`](Self::record_failure).
    pub async fn call(
        &mut self,
        url: &str,
        method: Method,
        options: CallOptions,
    ) -> Result<HttpResponse> {
        let CallOptions {
            mut headers,
            query,
            body,
        } = options;

        let has_identity = headers
            .get(X_AUTH_USER)
            .is_some_and(|value| !value.is_empty());
        if !has_identity {
            let token = self.token().await?;
            headers.insert(X_AUTH_TOKEN, header_value(&token)?);
        }

        self.send(url.to_string(), method, headers, query, body).await
    }

    async fn send(
        &mut self,
        url: String,
        method: Method,
        mut headers: HeaderMap,
        mut query: BTreeMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        if query.get(FORMAT_PARAM).map_or(true, |v| v.is_empty()) {
            query.insert(FORMAT_PARAM.to_string(), API_FORMAT.to_string());
        }

        let body = body.filter(|b| !b.is_empty());
        if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }

        let request = HttpRequest {
            method,
            url,
            headers,
            query,
            body,
        };

        self.last_error = None;
        debug!(method = %request.method, url = %request.url, "Dispatching request");

        Ok(self.transport.send(request).await?)
    }

    // ===== Error state =====

    /// Record a failed response as the last error.
    pub fn record_failure(&mut self, response: &HttpResponse) {
        let message = response.text();
        warn!(
            status = response.status_code(),
            body = %truncate_body(&message),
            "Request failed"
        );
        self.last_error = Some(LastError::new(message, response.status_code()));
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|e| e.message.as_str())
    }

    pub fn error_code(&self) -> Option<u16> {
        self.last_error.as_ref().map(|e| e.code)
    }

    /// True when no error is recorded since the last send.
    /// A recorded failure counts even if its body was empty.
    pub fn is_successful(&self) -> bool {
        self.last_error.is_none()
    }

    // ===== Persistence =====

    /// Snapshot of the cached authentication, if any
    pub fn snapshot(&self) -> Option<SessionData> {
        self.auth.as_ref().map(|state| SessionData {
            user: self.user.clone(),
            auth_url: self.auth_url().to_string(),
            auth: state.info.clone(),
            created_at: state.obtained_at,
        })
    }

    /// Install a previously saved session.
    ///
    /// Returns false, leaving the session unchanged, when the data belongs
    /// to another user or endpoint, or has expired.
    pub fn restore(&mut self, data: SessionData) -> bool {
        if data.user != self.user || data.auth_url != self.auth_url() {
            debug!(user = %data.user, auth_url = %data.auth_url, "Cached session belongs to another account");
            return false;
        }
        if data.is_expired() {
            debug!(user = %data.user, "Cached session expired");
            return false;
        }

        debug!(
            user = %self.user,
            minutes_left = data.minutes_until_expiry(),
            "Restored cached session"
        );
        self.auth = Some(AuthState {
            info: data.auth,
            obtained_at: data.created_at,
        });
        true
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("key", &"[REDACTED]")
            .field("auth_endpoint", &self.auth_endpoint)
            .field("auth", &self.auth_info())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| TransportError::InvalidRequest(format!("invalid header value: {}", e)).into())
}
