//! Authentication and session management.
//!
//! This module provides:
//! - `Session`: credentials, lazy token acquisition and the signed-call primitive
//! - `AuthEndpoint`: the closed set of authentication endpoints
//! - `SessionStore`: on-disk cache of an authenticated session (24 hour tokens)
//! - `CredentialStore`: API key storage via the OS keychain

pub mod credentials;
pub mod endpoint;
pub mod session;
pub mod store;

pub use credentials::CredentialStore;
pub use endpoint::{AuthEndpoint, API_VERSION, UK_AUTH_URL, US_AUTH_URL};
pub use session::{AuthInfo, CallOptions, Session, SessionBuilder};
pub use store::{SessionData, SessionStore};
