//! AlienVault OTX passive DNS.
//!
//! Works anonymously; a configured key raises the provider's rate limit.

use super::common::{get_json, optional_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::Result;
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROVIDER: &str = "AlienVault";

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://otx.alienvault.com/api/v1";

/// AlienVault OTX passive DNS adapter.
pub struct AlienVaultAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    base_url: String,
}

impl AlienVaultAdapter {
    /// Create an adapter against the production API.
    #[must_use]
    pub fn new(client: Client, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            client,
            settings,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct PassiveDnsResponse {
    #[serde(default)]
    passive_dns: Vec<PassiveDnsEntry>,
}

#[derive(Debug, Deserialize)]
struct PassiveDnsEntry {
    hostname: Option<String>,
    address: Option<String>,
    record_type: Option<String>,
    first: Option<String>,
    last: Option<String>,
}

/// One passive DNS observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassiveDnsRecord {
    /// Observed host name
    pub hostname: Option<String>,
    /// Address or record value it pointed at
    pub address: Option<String>,
    /// Record type, e.g. "A"
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    /// First time the pair was seen
    pub first_seen: Option<String>,
    /// Last time the pair was seen
    pub last_seen: Option<String>,
}

/// Normalized AlienVault result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlienVaultResult {
    /// Domain that was searched
    pub domain: String,
    /// Observations
    pub passive_dns: Vec<PassiveDnsRecord>,
    /// Number of observations
    pub count: usize,
}

#[async_trait]
impl SourceAdapter for AlienVaultAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::AlienVault
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let api_key = optional_setting(&*self.settings, keys::ALIENVAULT_API_KEY).await?;

        ctx.update(format!(
            "Querying AlienVault OTX for passive DNS of {}...",
            ctx.domain()
        ));
        let mut request = self.client.get(format!(
            "{}/indicators/domain/{}/passive_dns",
            self.base_url,
            ctx.domain()
        ));
        if let Some(key) = api_key {
            request = request.header("X-OTX-API-KEY", key);
        }
        let response: PassiveDnsResponse = get_json(PROVIDER, request).await?;

        let records: Vec<PassiveDnsRecord> = response
            .passive_dns
            .into_iter()
            .map(|entry| PassiveDnsRecord {
                hostname: entry.hostname,
                address: entry.address,
                record_type: entry.record_type,
                first_seen: entry.first,
                last_seen: entry.last,
            })
            .collect();

        let result = AlienVaultResult {
            domain: ctx.domain().to_string(),
            count: records.len(),
            passive_dns: records,
        };
        let summary = format!(
            "AlienVault OTX complete. Found {} passive DNS records.",
            result.count
        );
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}
