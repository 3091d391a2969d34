use anyhow::{bail, Context, Result};
use keyring::Entry;
use tracing::debug;

use super::endpoint::AuthEndpoint;

const SERVICE_NAME: &str = "rackauth";

/// API keys held in the OS keychain.
///
/// An account name can exist on both the US and UK endpoints with different
/// keys, so each entry is stored under the account `<region>:<user>`.
pub struct CredentialStore;

impl CredentialStore {
    pub fn store(endpoint: AuthEndpoint, user: &str, key: &str) -> Result<()> {
        if key.is_empty() {
            bail!("Refusing to store an empty API key for {}", user);
        }
        Self::entry(endpoint, user)?
            .set_password(key)
            .with_context(|| format!("Failed to store API key for {} in keychain", user))?;
        debug!(region = endpoint.region(), user, "Stored API key");
        Ok(())
    }

    /// Stored API key, or `None` when nothing is stored for this account.
    pub fn get_key(endpoint: AuthEndpoint, user: &str) -> Result<Option<String>> {
        match Self::entry(endpoint, user)?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read API key for {} from keychain", user)),
        }
    }

    /// Remove the stored key. Returns false when there was none.
    pub fn delete(endpoint: AuthEndpoint, user: &str) -> Result<bool> {
        match Self::entry(endpoint, user)?.delete_credential() {
            Ok(()) => {
                debug!(region = endpoint.region(), user, "Deleted API key");
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to delete API key for {} from keychain", user)),
        }
    }

    pub fn has_credentials(endpoint: AuthEndpoint, user: &str) -> bool {
        matches!(Self::get_key(endpoint, user), Ok(Some(_)))
    }

    fn account(endpoint: AuthEndpoint, user: &str) -> String {
        format!("{}:{}", endpoint.region(), user)
    }

    fn entry(endpoint: AuthEndpoint, user: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &Self::account(endpoint, user))
            .context("Failed to create keyring entry")
    }
}
