//! Credential lookup capability.
//!
//! Every source adapter resolves its API keys through one [`SettingsProvider`]
//! rather than reaching into storage itself. An absent key is a normal outcome;
//! whether it is fatal is up to the adapter.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Well-known settings keys, one per credentialed source.
pub mod keys {
    /// Shodan host lookup (mandatory)
    pub const SHODAN_API_KEY: &str = "shodan_api_key";
    /// SecurityTrails subdomain listing (optional, second source of `dns_deep`)
    pub const SECURITYTRAILS_API_KEY: &str = "securitytrails_api_key";
    /// VirusTotal (mandatory)
    pub const VIRUSTOTAL_API_KEY: &str = "virustotal_api_key";
    /// AlienVault OTX (optional)
    pub const ALIENVAULT_API_KEY: &str = "alienvault_api_key";
    /// Censys API id (mandatory)
    pub const CENSYS_API_ID: &str = "censys_api_id";
    /// Censys API secret (mandatory)
    pub const CENSYS_API_SECRET: &str = "censys_api_secret";
    /// NIST NVD (optional, raises rate limits)
    pub const NVD_API_KEY: &str = "nvd_api_key";
    /// HackerTarget (optional)
    pub const HACKERTARGET_API_KEY: &str = "hackertarget_api_key";
    /// Hunter.io (mandatory)
    pub const HUNTER_API_KEY: &str = "hunter_api_key";
    /// whoisjson.com (mandatory)
    pub const WHOIS_API_KEY: &str = "whois_api_key";

    /// All known credential keys.
    pub const ALL: [&str; 10] = [
        SHODAN_API_KEY,
        SECURITYTRAILS_API_KEY,
        VIRUSTOTAL_API_KEY,
        ALIENVAULT_API_KEY,
        CENSYS_API_ID,
        CENSYS_API_SECRET,
        NVD_API_KEY,
        HACKERTARGET_API_KEY,
        HUNTER_API_KEY,
        WHOIS_API_KEY,
    ];
}

/// Resolves named configuration values.
///
/// Implementations must treat blank values as absent so that adapters only
/// ever see `Some` for something usable.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Look up a value by key.
    ///
    /// # Errors
    /// Returns error only when the backing store itself fails; a missing key
    /// is `Ok(None)`.
    async fn get_value(&self, key: &str) -> Result<Option<String>>;
}

/// In-memory settings, used by tests and embedders that manage credentials
/// themselves.
#[derive(Debug, Default)]
pub struct StaticSettings {
    values: RwLock<HashMap<String, String>>,
}

impl StaticSettings {
    /// Create an empty settings provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(values
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_settings_lookup() {
        let settings = StaticSettings::new().with(keys::WHOIS_API_KEY, "secret");

        assert_eq!(
            settings.get_value(keys::WHOIS_API_KEY).await.expect("lookup"),
            Some("secret".to_string())
        );
        assert_eq!(settings.get_value(keys::HUNTER_API_KEY).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn test_blank_value_is_absent() {
        let settings = StaticSettings::new().with(keys::SHODAN_API_KEY, "   ");
        assert_eq!(settings.get_value(keys::SHODAN_API_KEY).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn test_remove() {
        let settings = StaticSettings::new().with(keys::NVD_API_KEY, "k");
        settings.remove(keys::NVD_API_KEY);
        assert_eq!(settings.get_value(keys::NVD_API_KEY).await.expect("lookup"), None);
    }
}
