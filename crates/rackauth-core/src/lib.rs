//! Core library for rackauth.
//!
//! Authenticates against the Rackspace Cloud v1.0 identity endpoints, caches
//! the token together with the storage, CDN and server management URLs, and
//! signs every outbound request with that token.
//!
//! ```rust,no_run
//! use rackauth_core::{CallOptions, Session};
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), rackauth_core::Error> {
//! let mut session = Session::new("myaccount", "0123456789abcdef")?;
//!
//! // First access authenticates; later ones reuse the cached values.
//! if let Some(storage_url) = session.storage_url().await? {
//!     let response = session
//!         .call(&storage_url, Method::GET, CallOptions::new())
//!         .await?;
//!     if !response.status.is_success() {
//!         session.record_failure(&response);
//!     }
//! }
//!
//! if !session.is_successful() {
//!     eprintln!("{:?}: {:?}", session.error_code(), session.error_message());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;

pub use api::{
    Error, HttpRequest, HttpResponse, LastError, ReqwestTransport, Result, Transport,
    TransportError,
};
pub use auth::{
    AuthEndpoint, AuthInfo, CallOptions, CredentialStore, Session, SessionBuilder, SessionData,
    SessionStore,
};
pub use config::Config;
