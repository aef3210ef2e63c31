//! Shodan host lookup.
//!
//! Resolves the domain first, then asks Shodan what it knows about the
//! address: open ports, operating system, host names and known CVEs.

use super::common::{get_json, require_setting};
use crate::adapter::{JobContext, ScanOutcome, SourceAdapter};
use crate::error::Result;
use crate::resolver::{HostResolver, SystemResolver};
use async_trait::async_trait;
use reconflow_core::settings::keys;
use reconflow_core::{ScanType, SettingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const PROVIDER: &str = "Shodan";

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.shodan.io";

/// Shodan host lookup adapter.
pub struct ShodanAdapter {
    client: Client,
    settings: Arc<dyn SettingsProvider>,
    resolver: Arc<dyn HostResolver>,
    base_url: String,
}

impl ShodanAdapter {
    /// Create an adapter using the system resolver.
    #[must_use]
    pub fn new(client: Client, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            client,
            settings,
            resolver: Arc::new(SystemResolver),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

#[derive(Debug, Deserialize)]
struct HostResponse {
    ip_str: Option<String>,
    #[serde(default)]
    ports: Vec<u16>,
    os: Option<String>,
    #[serde(default)]
    hostnames: Vec<String>,
    #[serde(default)]
    vulns: Value,
}

/// Normalized Shodan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShodanResult {
    /// Address that was looked up
    pub ip: String,
    /// Open ports
    pub ports: Vec<u16>,
    /// Detected operating system
    pub os: Option<String>,
    /// Host names pointing at the address
    pub hostnames: Vec<String>,
    /// CVE identifiers Shodan associates with the host
    pub vulns: Vec<String>,
}

/// Shodan has returned vulns both as a list and as a map keyed by CVE.
fn cve_list(vulns: &Value) -> Vec<String> {
    match vulns {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl SourceAdapter for ShodanAdapter {
    fn scan_type(&self) -> ScanType {
        ScanType::Shodan
    }

    async fn run(&self, ctx: &JobContext) -> Result<ScanOutcome> {
        let api_key =
            require_setting(&*self.settings, keys::SHODAN_API_KEY, PROVIDER, "API key").await?;

        ctx.update(format!("Resolving IP for {}...", ctx.domain()));
        let ip = self.resolver.resolve(ctx.domain()).await?;

        ctx.update(format!("IP found: {ip}. Querying Shodan..."));
        let host: HostResponse = get_json(
            PROVIDER,
            self.client
                .get(format!("{}/shodan/host/{ip}", self.base_url))
                .query(&[("key", api_key.as_str())]),
        )
        .await?;

        let result = ShodanResult {
            ip: host.ip_str.unwrap_or_else(|| ip.to_string()),
            vulns: cve_list(&host.vulns),
            ports: host.ports,
            os: host.os,
            hostnames: host.hostnames,
        };
        let summary = format!(
            "Shodan scan complete. Found {} open ports.",
            result.ports.len()
        );
        Ok(ScanOutcome::from_result(&result)?.with_summary(summary))
    }
}
