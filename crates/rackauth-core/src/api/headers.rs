//! Header names used by the v1.0 authentication API.
//!
//! The provider documents them in title case (`X-Auth-Token`, ...); header
//! names are case-insensitive on the wire and `HeaderName` stores them
//! lowercased.

use reqwest::header::HeaderName;

/// Identity header carrying the account name on the authentication request.
pub const X_AUTH_USER: HeaderName = HeaderName::from_static("x-auth-user");

/// Identity header carrying the API key on the authentication request.
pub const X_AUTH_KEY: HeaderName = HeaderName::from_static("x-auth-key");

/// Token header, returned by authentication and sent on every other call.
pub const X_AUTH_TOKEN: HeaderName = HeaderName::from_static("x-auth-token");

pub const X_STORAGE_URL: HeaderName = HeaderName::from_static("x-storage-url");

pub const X_CDN_MANAGEMENT_URL: HeaderName = HeaderName::from_static("x-cdn-management-url");

pub const X_SERVER_MANAGEMENT_URL: HeaderName =
    HeaderName::from_static("x-server-management-url");
