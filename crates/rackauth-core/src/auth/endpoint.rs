use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::Error;

/// US authentication endpoint (the default)
pub const US_AUTH_URL: &str = "https://auth.api.rackspacecloud.com";

/// UK authentication endpoint
pub const UK_AUTH_URL: &str = "https://lon.auth.api.rackspacecloud.com";

/// Version segment appended to the endpoint for the authentication request
pub const API_VERSION: &str = "v1.0";

/// The known authentication endpoints. A session can only be built against
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthEndpoint {
    #[default]
    Us,
    Uk,
}

impl AuthEndpoint {
    pub const ALL: [AuthEndpoint; 2] = [AuthEndpoint::Us, AuthEndpoint::Uk];

    pub fn url(&self) -> &'static str {
        match self {
            AuthEndpoint::Us => US_AUTH_URL,
            AuthEndpoint::Uk => UK_AUTH_URL,
        }
    }

    /// Short region name, as accepted by `FromStr`
    pub fn region(&self) -> &'static str {
        match self {
            AuthEndpoint::Us => "us",
            AuthEndpoint::Uk => "uk",
        }
    }

    /// Match an exact endpoint URL. No normalization is applied, so a
    /// trailing slash or a different scheme does not match.
    pub fn from_url(url: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.url() == url)
    }

    /// URL of the authentication request: `{endpoint}/v1.0`
    pub fn versioned_url(&self) -> String {
        format!("{}/{}", self.url(), API_VERSION)
    }
}

impl fmt::Display for AuthEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url())
    }
}

/// Accepts a region name (`us`, `uk`, any case) or one of the exact
/// endpoint URLs.
impl FromStr for AuthEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(endpoint) = Self::from_url(s) {
            return Ok(endpoint);
        }
        match s.to_ascii_lowercase().as_str() {
            "us" => Ok(AuthEndpoint::Us),
            "uk" => Ok(AuthEndpoint::Uk),
            _ => Err(Error::InvalidArgument(format!(
                "The authentication URL is not valid: {}",
                s
            ))),
        }
    }
}
