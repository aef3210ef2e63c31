//! Hunter.io organisation email harvesting.

use super::common::{get_json, require_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::Result;
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROVIDER: &str = "Hunter.io";

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.hunter.io/v2";

/// Hunter.io domain search adapter.
pub struct HunterAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    base_url: String,
}

impl HunterAdapter {
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
struct DomainSearchResponse {
    #[serde(default)]
    data: DomainSearchData,
}

#[derive(Debug, Default, Deserialize)]
struct DomainSearchData {
    organization: Option<String>,
    pattern: Option<String>,
    total: Option<u64>,
    #[serde(default)]
    emails: Vec<EmailEntry>,
}

#[derive(Debug, Deserialize)]
struct EmailEntry {
    value: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    confidence: Option<u8>,
    first_name: Option<String>,
    last_name: Option<String>,
    position: Option<String>,
}

/// A harvested address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    /// The address
    pub email: String,
    /// "personal" or "generic"
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Hunter's confidence score, 0-100
    pub confidence: Option<u8>,
    /// Owner's first name
    pub first_name: Option<String>,
    /// Owner's last name
    pub last_name: Option<String>,
    /// Owner's job title
    pub position: Option<String>,
}

/// Normalized Hunter.io result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HunterResult {
    /// Domain that was searched
    pub domain: String,
    /// Organisation owning the domain
    pub organization: Option<String>,
    /// Addresses returned in this response
    pub emails: Vec<EmailRecord>,
    /// Total addresses Hunter knows for the domain
    pub total_emails: u64,
    /// Address pattern, e.g. "{first}.{last}"
    pub pattern: Option<String>,
}

#[async_trait]
impl SourceAdapter for HunterAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::Hunter
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let api_key =
            require_setting(&*self.settings, keys::HUNTER_API_KEY, PROVIDER, "API key").await?;

        ctx.update(format!("Querying Hunter.io for emails at {}...", ctx.domain()));
        let response: DomainSearchResponse = get_json(
            PROVIDER,
            self.client
                .get(format!("{}/domain-search", self.base_url))
                .query(&[("domain", ctx.domain()), ("api_key", api_key.as_str())]),
        )
        .await?;

        let data = response.data;
        let emails: Vec<EmailRecord> = data
            .emails
            .into_iter()
            .map(|e| EmailRecord {
                email: e.value,
                kind: e.kind,
                confidence: e.confidence,
                first_name: e.first_name,
                last_name: e.last_name,
                position: e.position,
            })
            .collect();

        let found = emails.len();
        let result = HunterResult {
            domain: ctx.domain().to_string(),
            organization: data.organization,
            total_emails: data
                .total
                .filter(|total| *total > 0)
                .unwrap_or(found as u64),
            emails,
            pattern: data.pattern,
        };
        let summary = format!("Hunter.io complete. Found {found} emails.");
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}
