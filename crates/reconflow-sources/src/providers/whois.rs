//! Domain registration lookup through whoisjson.com.

use super::common::{get_json, require_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::Result;
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const PROVIDER: &str = "WHOIS";

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://whoisjson.com/api/v1";

/// WHOIS lookup adapter.
pub struct WhoisAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    base_url: String,
}

impl WhoisAdapter {
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

// Registrars answer with inconsistent shapes, so everything past the
// well-known scalar fields stays loosely typed.
#[derive(Debug, Deserialize)]
struct WhoisResponse {
    registrar: Option<Value>,
    creation_date: Option<Value>,
    expiration_date: Option<Value>,
    updated_date: Option<Value>,
    name_servers: Option<Value>,
    status: Option<Value>,
    registrant: Option<Value>,
    dnssec: Option<Value>,
}

/// Normalized registration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisResult {
    /// Domain that was looked up
    pub domain: String,
    /// Registrar name or record
    pub registrar: Option<Value>,
    /// Registration date
    pub creation_date: Option<Value>,
    /// Expiry date
    pub expiration_date: Option<Value>,
    /// Last update
    pub updated_date: Option<Value>,
    /// Authoritative name servers
    pub name_servers: Value,
    /// EPP status codes
    pub status: Value,
    /// Registrant contact
    pub registrant: Value,
    /// DNSSEC state
    pub dnssec: Option<Value>,
}

fn or_empty_array(value: Option<Value>) -> Value {
    value
        .filter(|v| !v.is_null())
        .unwrap_or_else(|| Value::Array(Vec::new()))
}

#[async_trait]
impl SourceAdapter for WhoisAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::Whois
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let api_key =
            require_setting(&*self.settings, keys::WHOIS_API_KEY, PROVIDER, "API key").await?;

        ctx.update(format!("Querying WHOIS for {}...", ctx.domain()));
        let data: WhoisResponse = get_json(
            PROVIDER,
            self.client
                .get(format!("{}/whois", self.base_url))
                .query(&[("domain", ctx.domain())])
                .header("Authorization", format!("Token {api_key}")),
        )
        .await?;

        let result = WhoisResult {
            domain: ctx.domain().to_string(),
            registrar: data.registrar,
            creation_date: data.creation_date,
            expiration_date: data.expiration_date,
            updated_date: data.updated_date,
            name_servers: or_empty_array(data.name_servers),
            status: or_empty_array(data.status),
            registrant: data
                .registrant
                .filter(|v| !v.is_null())
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            dnssec: data.dnssec,
        };
        let summary = format!("WHOIS lookup complete for {}.", ctx.domain());
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}
