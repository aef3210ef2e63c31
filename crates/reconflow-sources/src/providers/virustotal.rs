//! VirusTotal subdomain enumeration.

use super::common::{get_json, require_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::Result;
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROVIDER: &str = "VirusTotal";

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://www.virustotal.com/api/v3";

/// VirusTotal relationship-graph adapter.
pub struct VirusTotalAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    base_url: String,
}

impl VirusTotalAdapter {
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
struct SubdomainsResponse {
    #[serde(default)]
    data: Vec<DomainObject>,
}

#[derive(Debug, Deserialize)]
struct DomainObject {
    id: String,
}

/// Normalized VirusTotal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirusTotalResult {
    /// Domain that was searched
    pub domain: String,
    /// Subdomains VirusTotal has observed
    pub subdomains: Vec<String>,
    /// Number of subdomains
    pub count: usize,
}

#[async_trait]
impl SourceAdapter for VirusTotalAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::VirusTotal
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let api_key =
            require_setting(&*self.settings, keys::VIRUSTOTAL_API_KEY, PROVIDER, "API key")
                .await?;

        ctx.update(format!(
            "Querying VirusTotal for subdomains of {}...",
            ctx.domain()
        ));
        let response: SubdomainsResponse = get_json(
            PROVIDER,
            self.client
                .get(format!("{}/domains/{}/subdomains", self.base_url, ctx.domain()))
                .header("x-apikey", api_key),
        )
        .await?;

        let subdomains: Vec<String> = response.data.into_iter().map(|d| d.id).collect();
        let result = VirusTotalResult {
            domain: ctx.domain().to_string(),
            count: subdomains.len(),
            subdomains,
        };
        let summary = format!(
            "VirusTotal scan complete. Found {} subdomains.",
            result.count
        );
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}
